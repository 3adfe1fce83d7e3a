mod github;
mod logger;
mod menu;
mod prefs;
mod types;
mod ui;
mod util;

use std::{
    io::{self, Stdout},
    sync::Arc,
    time::Duration,
};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use crossterm::{
    event::{Event, EventStream, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Position, Rect},
    Terminal,
};
use tokio::sync::mpsc;
use tokio_stream::StreamExt;

use crate::{
    github::fetch_my_pull_requests,
    menu::{build_full_list, build_menu, MenuAction, MenuRoot, FULL_LIST_COMMAND},
    prefs::{ensure_preferences_file, load_preferences, Overrides, Preferences},
    types::Section,
    util::{format_relative_time, gh_auth_token, open_in_browser, open_in_editor},
};

#[derive(Parser, Debug)]
#[command(author, version, about = "GitHub pull requests menu")]
struct Args {
    #[arg(long, default_value_t = 60, help = "Seconds between refreshes")]
    interval: u64,
    #[arg(long, help = "Only list pull requests in this repository (owner/name)")]
    repo: Option<String>,
    #[arg(long, help = "Pull requests per section before collapsing (1-100)")]
    max_items: Option<i64>,
    #[arg(long, help = "Hide the pull request count in the title")]
    hide_count: bool,
}

#[derive(Debug)]
enum AppEvent {
    Data(Vec<Section>),
    Error(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Menu,
    FullList,
}

#[derive(Debug, PartialEq, Eq)]
enum InputOutcome {
    Continue,
    Quit,
    Activate(MenuAction),
}

pub struct AppState {
    pub sections: Vec<Section>,
    pub prefs: Preferences,
    pub view: View,
    pub selected: usize,
    pub loading: bool,
    pub status: Option<String>,
    pub last_updated: Option<DateTime<Utc>>,
    pub updated_label: String,
    overrides: Overrides,
}

impl AppState {
    fn new(prefs: Preferences, overrides: Overrides) -> Self {
        Self {
            sections: Vec::new(),
            prefs,
            view: View::Menu,
            selected: 0,
            loading: true,
            status: None,
            last_updated: None,
            updated_label: String::new(),
            overrides,
        }
    }

    pub fn menu(&self) -> MenuRoot {
        match self.view {
            View::Menu => build_menu(&self.sections, &self.prefs, self.loading),
            View::FullList => build_full_list(&self.sections, self.loading),
        }
    }

    fn actionable_count(&self) -> usize {
        self.menu().actionable_items().count()
    }

    fn selected_action(&self) -> Option<MenuAction> {
        self.menu()
            .actionable_items()
            .nth(self.selected)
            .and_then(|item| item.action.clone())
    }

    fn shortcut_action(&self, key: char) -> Option<MenuAction> {
        self.menu()
            .items()
            .find(|item| item.shortcut == Some(key))
            .and_then(|item| item.action.clone())
    }

    fn move_selection(&mut self, delta: isize) {
        let count = self.actionable_count();
        if count == 0 {
            self.selected = 0;
            return;
        }
        let next = self.selected as isize + delta;
        self.selected = next.clamp(0, count as isize - 1) as usize;
    }

    fn clamp_selection(&mut self) {
        let count = self.actionable_count();
        self.selected = self.selected.min(count.saturating_sub(1));
    }

    fn set_view(&mut self, view: View) {
        if self.view != view {
            self.view = view;
            self.selected = 0;
        }
    }

    fn set_data(&mut self, sections: Vec<Section>) {
        self.sections = sections;
        self.loading = false;
        self.last_updated = Some(Utc::now());
        self.reload_preferences();
        self.refresh_relative_time();
        self.clamp_selection();
    }

    fn reload_preferences(&mut self) {
        self.apply_preferences(load_preferences());
    }

    /// Installs freshly read preferences, falling back to defaults when the
    /// file is unreadable. Command-line overrides apply either way.
    fn apply_preferences(&mut self, loaded: Result<Preferences>) {
        let mut prefs = match loaded {
            Ok(prefs) => prefs,
            Err(err) => {
                log::warn!("using default preferences: {:#}", err);
                let message = format!("{:#}", err);
                self.status = message.lines().next().map(str::to_string);
                Preferences::default()
            }
        };
        self.overrides.apply(&mut prefs);
        if prefs != self.prefs {
            log::info!("preferences changed, rebuilding menu");
        }
        self.prefs = prefs;
    }

    fn refresh_relative_time(&mut self) {
        self.updated_label = self
            .last_updated
            .map(|updated| format_relative_time(updated, Utc::now()))
            .unwrap_or_default();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let log_path = match logger::init() {
        Ok(path) => Some(path),
        Err(err) => {
            eprintln!("logging disabled: {:#}", err);
            None
        }
    };
    if let Some(path) = log_path {
        log::info!("logging to {}", path.display());
    }

    let token = gh_auth_token()?;

    enable_raw_mode().context("failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).context("failed to enter alternate screen")?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("failed to create terminal")?;

    let result = run_app(&mut terminal, args, token).await;

    disable_raw_mode().ok();
    execute!(terminal.backend_mut(), LeaveAlternateScreen).ok();
    terminal.show_cursor().ok();

    if let Err(err) = &result {
        log::error!("exiting with error: {:#}", err);
    }
    result
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    args: Args,
    token: String,
) -> Result<()> {
    let client = Arc::new(reqwest::Client::new());
    let token = Arc::new(token);

    let (event_tx, mut event_rx) = mpsc::channel::<AppEvent>(4);
    let (refresh_tx, refresh_rx) = mpsc::channel::<()>(1);

    spawn_poller(
        client,
        token,
        args.interval,
        args.repo.clone(),
        event_tx.clone(),
        refresh_rx,
    );

    let overrides = Overrides {
        max_items: args.max_items,
        hide_count: args.hide_count,
    };
    let mut app = AppState::new(Preferences::default(), overrides);
    app.reload_preferences();

    let mut events = EventStream::new();
    let mut tick = tokio::time::interval(Duration::from_millis(500));

    loop {
        terminal
            .draw(|f| ui::draw(f, &app))
            .context("render failed")?;

        tokio::select! {
            maybe_event = events.next() => {
                if let Some(Ok(event)) = maybe_event {
                    match handle_input(event, &mut app, &refresh_tx) {
                        InputOutcome::Continue => {}
                        InputOutcome::Quit => break,
                        InputOutcome::Activate(action) => {
                            if activate(action, &mut app, &event_tx) {
                                configure(terminal, &mut app);
                                events = EventStream::new();
                                reset_terminal_buffers(terminal);
                            }
                        }
                    }
                }
            }
            Some(app_event) = event_rx.recv() => {
                match app_event {
                    AppEvent::Data(sections) => {
                        app.status = None;
                        app.set_data(sections);
                    }
                    AppEvent::Error(message) => {
                        app.status = Some(clean_error_message(&message));
                        app.loading = false;
                    }
                }
            }
            _ = tick.tick() => {
                app.refresh_relative_time();
            }
        }
    }

    Ok(())
}

/// Ticks every `interval_secs`, starting one period from now; the poller
/// fetches once on its own before waiting.
fn poll_interval(interval_secs: u64) -> tokio::time::Interval {
    let period = Duration::from_secs(interval_secs.max(1));
    tokio::time::interval_at(tokio::time::Instant::now() + period, period)
}

fn spawn_poller(
    client: Arc<reqwest::Client>,
    token: Arc<String>,
    interval_secs: u64,
    repository: Option<String>,
    event_tx: mpsc::Sender<AppEvent>,
    mut refresh_rx: mpsc::Receiver<()>,
) {
    tokio::spawn(async move {
        let mut interval = poll_interval(interval_secs);

        loop {
            log::debug!("fetching pull requests");
            let result = fetch_my_pull_requests(&client, &token, repository.as_deref()).await;
            match result {
                Ok(sections) => {
                    let total: usize = sections.iter().map(Section::len).sum();
                    log::info!("fetched {} pull requests", total);
                    let _ = event_tx.send(AppEvent::Data(sections)).await;
                }
                Err(err) => {
                    log::warn!("fetch failed: {:#}", err);
                    let _ = event_tx.send(AppEvent::Error(err.to_string())).await;
                }
            }

            tokio::select! {
                _ = interval.tick() => {},
                _ = refresh_rx.recv() => {},
            }
        }
    });
}

fn handle_input(event: Event, app: &mut AppState, refresh_tx: &mpsc::Sender<()>) -> InputOutcome {
    let Event::Key(key) = event else {
        return InputOutcome::Continue;
    };
    if key.kind != KeyEventKind::Press {
        return InputOutcome::Continue;
    }

    match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => InputOutcome::Quit,
        KeyCode::Char('q') => InputOutcome::Quit,
        KeyCode::Down | KeyCode::Char('j') => {
            app.move_selection(1);
            InputOutcome::Continue
        }
        KeyCode::Up | KeyCode::Char('k') => {
            app.move_selection(-1);
            InputOutcome::Continue
        }
        KeyCode::Esc => {
            app.set_view(View::Menu);
            InputOutcome::Continue
        }
        KeyCode::Char('R') => {
            let _ = refresh_tx.try_send(());
            app.loading = true;
            app.status = Some("Refreshing...".to_string());
            InputOutcome::Continue
        }
        KeyCode::Enter => match app.selected_action() {
            Some(action) => InputOutcome::Activate(action),
            None => InputOutcome::Continue,
        },
        KeyCode::Char(ch) => match app.shortcut_action(ch) {
            Some(action) => InputOutcome::Activate(action),
            None => InputOutcome::Continue,
        },
        _ => InputOutcome::Continue,
    }
}

/// Runs a menu action. Returns true when the caller must open the preferences
/// editor, which needs the terminal.
fn activate(action: MenuAction, app: &mut AppState, event_tx: &mpsc::Sender<AppEvent>) -> bool {
    log::info!("activating {:?}", action);
    match action {
        MenuAction::OpenUrl(url) => {
            app.status = Some(format!("Opening {}", url));
            let event_tx = event_tx.clone();
            tokio::spawn(async move {
                let result = tokio::task::spawn_blocking(move || open_in_browser(&url)).await;
                let error = match result {
                    Ok(Ok(())) => None,
                    Ok(Err(err)) => Some(err.to_string()),
                    Err(err) => Some(err.to_string()),
                };
                if let Some(message) = error {
                    log::warn!("failed to open browser: {}", message);
                    let _ = event_tx.send(AppEvent::Error(message)).await;
                }
            });
        }
        MenuAction::LaunchCommand { name, launch_type } => {
            if name == FULL_LIST_COMMAND {
                log::debug!("launching {} ({:?})", name, launch_type);
                app.set_view(View::FullList);
            } else {
                app.status = Some(format!("Unknown command: {}", name));
            }
        }
        MenuAction::Configure => return true,
    }
    false
}

fn configure(terminal: &mut Terminal<CrosstermBackend<Stdout>>, app: &mut AppState) {
    let result = ensure_preferences_file().and_then(|path| {
        let mut guard = TuiGuard::suspend(terminal)?;
        let edited = open_in_editor(&path);
        guard.restore()?;
        edited
    });

    match result {
        Ok(()) => {
            app.status = Some("Preferences reloaded".to_string());
            app.reload_preferences();
            app.clamp_selection();
        }
        Err(err) => {
            log::warn!("configure failed: {:#}", err);
            app.status = Some(format!("{:#}", err));
        }
    }
}

fn clean_error_message(message: &str) -> String {
    let mut text = message.trim().to_string();
    let prefixes = [
        "GraphQL error: ",
        "GitHub API error: ",
        "failed to fetch pull requests: ",
    ];

    let mut changed = true;
    while changed {
        changed = false;
        for prefix in prefixes {
            if text.starts_with(prefix) {
                text = text[prefix.len()..].trim().to_string();
                changed = true;
            }
        }
    }

    text
}

struct TuiGuard<'a> {
    terminal: &'a mut Terminal<CrosstermBackend<Stdout>>,
    restored: bool,
}

impl<'a> TuiGuard<'a> {
    fn suspend(terminal: &'a mut Terminal<CrosstermBackend<Stdout>>) -> Result<Self> {
        disable_raw_mode().context("failed to disable raw mode")?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)
            .context("failed to leave alternate screen")?;
        terminal.show_cursor().ok();

        Ok(Self {
            terminal,
            restored: false,
        })
    }

    fn restore(&mut self) -> Result<()> {
        if self.restored {
            return Ok(());
        }

        execute!(self.terminal.backend_mut(), EnterAlternateScreen)
            .context("failed to enter alternate screen")?;
        enable_raw_mode().context("failed to enable raw mode")?;
        self.restored = true;
        Ok(())
    }
}

impl Drop for TuiGuard<'_> {
    fn drop(&mut self) {
        if self.restored {
            return;
        }
        let _ = execute!(self.terminal.backend_mut(), EnterAlternateScreen);
        let _ = enable_raw_mode();
    }
}

fn reset_terminal_buffers(terminal: &mut Terminal<CrosstermBackend<Stdout>>) {
    if let Ok(size) = terminal.size() {
        let area = Rect::from((Position::ORIGIN, size));
        let _ = terminal.resize(area);
    }
    let _ = terminal.clear();
}

#[cfg(test)]
mod tests {
    use super::{
        activate, clean_error_message, handle_input, poll_interval, AppEvent, AppState,
        InputOutcome, View,
    };
    use anyhow::anyhow;
    use std::time::Duration;
    use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyEventState, KeyModifiers};
    use tokio::sync::mpsc;

    use crate::menu::{LaunchType, MenuAction, FULL_LIST_COMMAND};
    use crate::prefs::{Overrides, Preferences};
    use crate::types::{PullRequestSummary, Section, SectionKind};

    fn key(code: KeyCode) -> Event {
        Event::Key(KeyEvent {
            code,
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        })
    }

    fn sample_pr(number: u64) -> PullRequestSummary {
        PullRequestSummary {
            id: format!("pr-{number}"),
            number,
            title: format!("Change {number}"),
            permalink: format!("https://github.com/acme/widgets/pull/{number}"),
            repository: "acme/widgets".to_string(),
            latest_commit: None,
        }
    }

    fn sample_app() -> AppState {
        let mut app = AppState::new(Preferences::default(), Overrides::default());
        app.sections = vec![
            Section::new(SectionKind::Open, vec![Some(sample_pr(1)), None, Some(sample_pr(2))]),
            Section::new(SectionKind::Assigned, Vec::new()),
        ];
        app.loading = false;
        app
    }

    #[test]
    fn enter_activates_selected_pull_request() {
        let mut app = sample_app();
        let (refresh_tx, _refresh_rx) = mpsc::channel(1);

        assert_eq!(handle_input(key(KeyCode::Down), &mut app, &refresh_tx), InputOutcome::Continue);
        assert_eq!(app.selected, 1);
        assert_eq!(
            handle_input(key(KeyCode::Enter), &mut app, &refresh_tx),
            InputOutcome::Activate(MenuAction::OpenUrl(
                "https://github.com/acme/widgets/pull/2".to_string()
            ))
        );
    }

    #[test]
    fn selection_stays_within_actionable_items() {
        let mut app = sample_app();
        let (refresh_tx, _refresh_rx) = mpsc::channel(1);

        handle_input(key(KeyCode::Up), &mut app, &refresh_tx);
        assert_eq!(app.selected, 0);

        for _ in 0..10 {
            handle_input(key(KeyCode::Char('j')), &mut app, &refresh_tx);
        }
        // Two pull requests plus the two trailing entries.
        assert_eq!(app.selected, 3);
        assert_eq!(app.selected_action(), Some(MenuAction::Configure));
    }

    #[test]
    fn shortcut_launches_full_list_command() {
        let mut app = sample_app();
        let (refresh_tx, _refresh_rx) = mpsc::channel(1);

        assert_eq!(
            handle_input(key(KeyCode::Char('o')), &mut app, &refresh_tx),
            InputOutcome::Activate(MenuAction::LaunchCommand {
                name: FULL_LIST_COMMAND,
                launch_type: LaunchType::UserInitiated,
            })
        );
        assert_eq!(handle_input(key(KeyCode::Char('x')), &mut app, &refresh_tx), InputOutcome::Continue);
    }

    #[test]
    fn quit_keys() {
        let mut app = sample_app();
        let (refresh_tx, _refresh_rx) = mpsc::channel(1);

        assert_eq!(handle_input(key(KeyCode::Char('q')), &mut app, &refresh_tx), InputOutcome::Quit);
        let ctrl_c = Event::Key(KeyEvent {
            code: KeyCode::Char('c'),
            modifiers: KeyModifiers::CONTROL,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        });
        assert_eq!(handle_input(ctrl_c, &mut app, &refresh_tx), InputOutcome::Quit);
    }

    #[test]
    fn refresh_key_requests_fetch() {
        let mut app = sample_app();
        let (refresh_tx, mut refresh_rx) = mpsc::channel(1);

        handle_input(key(KeyCode::Char('R')), &mut app, &refresh_tx);
        assert!(app.loading);
        assert_eq!(app.status.as_deref(), Some("Refreshing..."));
        assert!(refresh_rx.try_recv().is_ok());
    }

    #[test]
    fn launch_command_switches_to_full_list_and_esc_returns() {
        let mut app = sample_app();
        app.selected = 2;
        let (event_tx, _event_rx) = mpsc::channel::<AppEvent>(1);
        let (refresh_tx, _refresh_rx) = mpsc::channel(1);

        let needs_editor = activate(
            MenuAction::LaunchCommand {
                name: FULL_LIST_COMMAND,
                launch_type: LaunchType::UserInitiated,
            },
            &mut app,
            &event_tx,
        );
        assert!(!needs_editor);
        assert_eq!(app.view, View::FullList);
        assert_eq!(app.selected, 0);
        // Full list has no trailing entries: only the two pull requests act.
        assert_eq!(app.menu().actionable_items().count(), 2);

        handle_input(key(KeyCode::Esc), &mut app, &refresh_tx);
        assert_eq!(app.view, View::Menu);
    }

    #[test]
    fn unknown_command_reports_status() {
        let mut app = sample_app();
        let (event_tx, _event_rx) = mpsc::channel::<AppEvent>(1);

        activate(
            MenuAction::LaunchCommand {
                name: "something-else",
                launch_type: LaunchType::UserInitiated,
            },
            &mut app,
            &event_tx,
        );
        assert_eq!(app.view, View::Menu);
        assert_eq!(app.status.as_deref(), Some("Unknown command: something-else"));
    }

    #[test]
    fn configure_defers_to_editor() {
        let mut app = sample_app();
        let (event_tx, _event_rx) = mpsc::channel::<AppEvent>(1);

        assert!(activate(MenuAction::Configure, &mut app, &event_tx));
        assert_eq!(app.view, View::Menu);
    }

    #[test]
    fn clamp_selection_after_list_shrinks() {
        let mut app = sample_app();
        app.selected = 3;
        app.sections = vec![Section::new(SectionKind::Open, Vec::new())];
        app.clamp_selection();
        // Only the two trailing entries remain actionable.
        assert_eq!(app.selected, 1);
    }

    #[test]
    fn overrides_are_applied_to_menu() {
        let mut prefs = Preferences::default();
        Overrides {
            max_items: Some(1),
            hide_count: true,
        }
        .apply(&mut prefs);
        let mut app = sample_app();
        app.prefs = prefs;

        let menu = app.menu();
        assert_eq!(menu.title, None);
        let titles: Vec<&str> = menu.sections[0]
            .items
            .iter()
            .map(|item| item.title.as_str())
            .collect();
        assert_eq!(titles, vec!["#1 Change 1", "... 1 more"]);
    }

    #[test]
    fn clean_error_message_strips_prefixes() {
        let message = "GraphQL error: GitHub API error: failed to fetch pull requests: boom";
        assert_eq!(clean_error_message(message), "boom");
    }

    #[test]
    fn unreadable_preferences_fall_back_to_defaults_with_overrides() {
        let mut app = AppState::new(
            Preferences::default(),
            Overrides {
                max_items: Some(1),
                hide_count: true,
            },
        );
        app.sections = vec![Section::new(
            SectionKind::Open,
            vec![Some(sample_pr(1)), Some(sample_pr(2))],
        )];

        app.apply_preferences(Err(anyhow!("bad value\n  |\n1 | maxitems = \"lots\"\n  |   ^^^^^^")
            .context("failed to parse preferences: /tmp/preferences.toml")));

        assert_eq!(app.prefs.max_items(), 1);
        assert!(!app.prefs.show_text());
        assert_eq!(app.menu().title, None);
        assert_eq!(
            app.status.as_deref(),
            Some("failed to parse preferences: /tmp/preferences.toml: bad value")
        );
    }

    #[test]
    fn loaded_preferences_get_overrides() {
        let mut app = AppState::new(
            Preferences::default(),
            Overrides {
                max_items: Some(3),
                hide_count: false,
            },
        );

        app.apply_preferences(Ok(Preferences::default()));

        assert_eq!(app.prefs.max_items(), 3);
        assert!(app.prefs.show_text());
        assert_eq!(app.status, None);
    }

    #[tokio::test]
    async fn poll_interval_waits_a_full_period_before_first_tick() {
        let mut interval = poll_interval(3600);
        let first = tokio::time::timeout(Duration::from_millis(50), interval.tick()).await;
        assert!(first.is_err());
    }
}
