use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

use crate::types::SectionKind;

const PREFERENCES_RELATIVE_PATH: &str = "prbar/preferences.toml";

pub const MIN_MAX_ITEMS: i64 = 1;
pub const MAX_MAX_ITEMS: i64 = 100;
pub const DEFAULT_MAX_ITEMS: i64 = 10;

const DEFAULT_PREFERENCES_FILE: &str = r#"# prbar preferences

# Show the number of pull requests next to the menu icon.
showtext = true

# Pull requests listed per section before "... N more" (1-100).
maxitems = 10

# Per section: `show` lists it in the menu, `count` adds it to the title count.
[open]
show = true
count = true

[assigned]
show = true
count = true

[mentioned]
show = true
count = true

[review_requests]
show = true
count = true

[reviewed]
show = true
count = true

[recently_closed]
show = true
count = false
"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CategoryPreferences {
    pub show: bool,
    pub count: bool,
}

impl Default for CategoryPreferences {
    fn default() -> Self {
        Self {
            show: true,
            count: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Preferences {
    #[serde(rename = "showtext")]
    show_text: Option<bool>,
    #[serde(rename = "maxitems")]
    max_items: Option<i64>,
    open: CategoryPreferences,
    assigned: CategoryPreferences,
    mentioned: CategoryPreferences,
    review_requests: CategoryPreferences,
    reviewed: CategoryPreferences,
    recently_closed: CategoryPreferences,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            show_text: None,
            max_items: None,
            open: CategoryPreferences::default(),
            assigned: CategoryPreferences::default(),
            mentioned: CategoryPreferences::default(),
            review_requests: CategoryPreferences::default(),
            reviewed: CategoryPreferences::default(),
            recently_closed: CategoryPreferences {
                show: true,
                count: false,
            },
        }
    }
}

impl Preferences {
    pub fn show_text(&self) -> bool {
        self.show_text.unwrap_or(true)
    }

    /// Items shown per section, clamped to the supported range.
    pub fn max_items(&self) -> usize {
        self.max_items
            .map(|value| value.clamp(MIN_MAX_ITEMS, MAX_MAX_ITEMS))
            .unwrap_or(DEFAULT_MAX_ITEMS) as usize
    }

    pub fn category(&self, kind: SectionKind) -> CategoryPreferences {
        match kind {
            SectionKind::Open => self.open,
            SectionKind::Assigned => self.assigned,
            SectionKind::Mentioned => self.mentioned,
            SectionKind::ReviewRequests => self.review_requests,
            SectionKind::Reviewed => self.reviewed,
            SectionKind::RecentlyClosed => self.recently_closed,
        }
    }

    #[cfg(test)]
    pub fn category_mut(&mut self, kind: SectionKind) -> &mut CategoryPreferences {
        match kind {
            SectionKind::Open => &mut self.open,
            SectionKind::Assigned => &mut self.assigned,
            SectionKind::Mentioned => &mut self.mentioned,
            SectionKind::ReviewRequests => &mut self.review_requests,
            SectionKind::Reviewed => &mut self.reviewed,
            SectionKind::RecentlyClosed => &mut self.recently_closed,
        }
    }

    pub fn shows(&self, kind: SectionKind) -> bool {
        self.category(kind).show
    }

    pub fn counts(&self, kind: SectionKind) -> bool {
        self.category(kind).count
    }

    pub fn set_show_text(&mut self, value: bool) {
        self.show_text = Some(value);
    }

    pub fn set_max_items(&mut self, value: i64) {
        self.max_items = Some(value);
    }
}

/// Command-line values that take precedence over the preferences file.
#[derive(Debug, Clone, Copy, Default)]
pub struct Overrides {
    pub max_items: Option<i64>,
    pub hide_count: bool,
}

impl Overrides {
    pub fn apply(&self, prefs: &mut Preferences) {
        if let Some(max_items) = self.max_items {
            prefs.set_max_items(max_items);
        }
        if self.hide_count {
            prefs.set_show_text(false);
        }
    }
}

fn config_home() -> Result<PathBuf> {
    if let Ok(value) = std::env::var("XDG_CONFIG_HOME") {
        let trimmed = value.trim();
        if !trimmed.is_empty() {
            return Ok(PathBuf::from(trimmed));
        }
    }

    if let Ok(value) = std::env::var("APPDATA") {
        let trimmed = value.trim();
        if !trimmed.is_empty() {
            return Ok(PathBuf::from(trimmed));
        }
    }

    if let Ok(value) = std::env::var("HOME") {
        let trimmed = value.trim();
        if !trimmed.is_empty() {
            return Ok(PathBuf::from(trimmed).join(".config"));
        }
    }

    if let Ok(value) = std::env::var("USERPROFILE") {
        let trimmed = value.trim();
        if !trimmed.is_empty() {
            return Ok(PathBuf::from(trimmed).join(".config"));
        }
    }

    Err(anyhow!(
        "unable to resolve config directory (set XDG_CONFIG_HOME or HOME)"
    ))
}

pub fn preferences_path() -> Result<PathBuf> {
    Ok(config_home()?.join(PREFERENCES_RELATIVE_PATH))
}

pub fn load_preferences() -> Result<Preferences> {
    let path = preferences_path()?;
    read_preferences(&path)
}

fn read_preferences(path: &Path) -> Result<Preferences> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Ok(Preferences::default());
        }
        Err(err) => {
            return Err(err).with_context(|| {
                format!("failed to read preferences: {}", path.display())
            });
        }
    };

    toml::from_str(&content)
        .with_context(|| format!("failed to parse preferences: {}", path.display()))
}

/// Writes a commented default preferences file unless one exists already.
pub fn ensure_preferences_file() -> Result<PathBuf> {
    let path = preferences_path()?;
    if path.exists() {
        return Ok(path);
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| {
            format!("failed to create preferences directory: {}", parent.display())
        })?;
    }

    fs::write(&path, DEFAULT_PREFERENCES_FILE)
        .with_context(|| format!("failed to write preferences: {}", path.display()))?;

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::{
        ensure_preferences_file, load_preferences, preferences_path, CategoryPreferences,
        Overrides, Preferences, DEFAULT_PREFERENCES_FILE,
    };
    use crate::types::SectionKind;
    use std::ffi::OsString;
    use std::fs;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use std::time::{SystemTime, UNIX_EPOCH};

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    struct TempConfigEnv {
        prior: Option<OsString>,
        dir: PathBuf,
    }

    impl TempConfigEnv {
        fn new() -> Self {
            let now = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap()
                .as_nanos();
            let dir = std::env::temp_dir().join(format!("prbar-test-{}", now));
            fs::create_dir_all(&dir).unwrap();

            let prior = std::env::var_os("XDG_CONFIG_HOME");
            std::env::set_var("XDG_CONFIG_HOME", &dir);

            Self { prior, dir }
        }
    }

    impl Drop for TempConfigEnv {
        fn drop(&mut self) {
            if let Some(value) = self.prior.take() {
                std::env::set_var("XDG_CONFIG_HOME", value);
            } else {
                std::env::remove_var("XDG_CONFIG_HOME");
            }

            let _ = fs::remove_dir_all(&self.dir);
        }
    }

    #[test]
    fn defaults_show_everything_and_count_open_work() {
        let prefs = Preferences::default();
        assert!(prefs.show_text());
        assert_eq!(prefs.max_items(), 10);
        for kind in SectionKind::ALL {
            assert!(prefs.shows(kind));
        }
        assert!(prefs.counts(SectionKind::Open));
        assert!(prefs.counts(SectionKind::ReviewRequests));
        assert!(!prefs.counts(SectionKind::RecentlyClosed));
    }

    #[test]
    fn max_items_is_clamped() {
        let mut prefs = Preferences::default();
        prefs.set_max_items(0);
        assert_eq!(prefs.max_items(), 1);
        prefs.set_max_items(-5);
        assert_eq!(prefs.max_items(), 1);
        prefs.set_max_items(500);
        assert_eq!(prefs.max_items(), 100);
        prefs.set_max_items(25);
        assert_eq!(prefs.max_items(), 25);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let prefs: Preferences = toml::from_str(
            r#"
            maxitems = 3

            [assigned]
            show = false
            "#,
        )
        .unwrap();

        assert!(prefs.show_text());
        assert_eq!(prefs.max_items(), 3);
        assert_eq!(
            prefs.category(SectionKind::Assigned),
            CategoryPreferences {
                show: false,
                count: true
            }
        );
        assert!(prefs.shows(SectionKind::Open));
    }

    #[test]
    fn display_and_count_flags_are_independent() {
        let prefs: Preferences = toml::from_str(
            r#"
            showtext = false

            [reviewed]
            show = false
            count = true

            [mentioned]
            show = true
            count = false
            "#,
        )
        .unwrap();

        assert!(!prefs.show_text());
        assert!(!prefs.shows(SectionKind::Reviewed));
        assert!(prefs.counts(SectionKind::Reviewed));
        assert!(prefs.shows(SectionKind::Mentioned));
        assert!(!prefs.counts(SectionKind::Mentioned));
    }

    #[test]
    fn default_file_matches_default_preferences() {
        let prefs: Preferences = toml::from_str(DEFAULT_PREFERENCES_FILE).unwrap();
        assert_eq!(prefs.show_text(), Preferences::default().show_text());
        assert_eq!(prefs.max_items(), Preferences::default().max_items());
        for kind in SectionKind::ALL {
            assert_eq!(prefs.category(kind), Preferences::default().category(kind));
        }
    }

    #[test]
    fn overrides_take_precedence() {
        let mut prefs = Preferences::default();
        Overrides {
            max_items: Some(4),
            hide_count: true,
        }
        .apply(&mut prefs);

        assert_eq!(prefs.max_items(), 4);
        assert!(!prefs.show_text());
    }

    #[test]
    fn load_preferences_returns_defaults_when_missing() {
        let _guard = ENV_LOCK.lock().unwrap();
        let _env = TempConfigEnv::new();

        let prefs = load_preferences().unwrap();
        assert_eq!(prefs, Preferences::default());
    }

    #[test]
    fn load_preferences_reports_invalid_file() {
        let _guard = ENV_LOCK.lock().unwrap();
        let _env = TempConfigEnv::new();

        let path = preferences_path().unwrap();
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "maxitems = \"lots\"").unwrap();

        let err = load_preferences().unwrap_err();
        assert!(err.to_string().contains("failed to parse preferences"));
    }

    #[test]
    fn ensure_preferences_file_writes_once() {
        let _guard = ENV_LOCK.lock().unwrap();
        let _env = TempConfigEnv::new();

        let path = ensure_preferences_file().unwrap();
        assert!(path.ends_with("prbar/preferences.toml"));
        assert_eq!(fs::read_to_string(&path).unwrap(), DEFAULT_PREFERENCES_FILE);

        fs::write(&path, "maxitems = 7\n").unwrap();
        ensure_preferences_file().unwrap();
        assert_eq!(load_preferences().unwrap().max_items(), 7);
    }
}
