//! Toolkit-neutral menu tree for the pull request menu.
//!
//! Everything here is a pure function of the fetched sections, the
//! preferences and the loading flag. Hosts (see `ui`) only draw the tree and
//! run the [`MenuAction`] of whichever item the user activates.

use crate::{
    prefs::Preferences,
    types::{CheckState, PullRequestSummary, Section},
};

pub const FULL_LIST_COMMAND: &str = "my-pull-requests";
pub const ROOT_TOOLTIP: &str = "GitHub My Open Pull Requests";
pub const EMPTY_SECTION_TITLE: &str = "No Pull Requests";
pub const OPEN_FULL_LIST_TITLE: &str = "Open My Pull Requests";
pub const CONFIGURE_TITLE: &str = "Configure Command";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuIcon {
    Check,
    Xmark,
    Clock,
    PullRequest,
    Terminal,
    Gear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchType {
    UserInitiated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuAction {
    OpenUrl(String),
    LaunchCommand {
        name: &'static str,
        launch_type: LaunchType,
    },
    Configure,
}

impl MenuAction {
    fn launch_full_list() -> Self {
        Self::LaunchCommand {
            name: FULL_LIST_COMMAND,
            launch_type: LaunchType::UserInitiated,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuItem {
    pub title: String,
    pub icon: Option<MenuIcon>,
    pub tooltip: Option<String>,
    pub shortcut: Option<char>,
    pub action: Option<MenuAction>,
}

impl MenuItem {
    fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            icon: None,
            tooltip: None,
            shortcut: None,
            action: None,
        }
    }

    fn icon(mut self, icon: MenuIcon) -> Self {
        self.icon = Some(icon);
        self
    }

    fn tooltip(mut self, tooltip: impl Into<String>) -> Self {
        self.tooltip = Some(tooltip.into());
        self
    }

    fn shortcut(mut self, key: char) -> Self {
        self.shortcut = Some(key);
        self
    }

    fn action(mut self, action: MenuAction) -> Self {
        self.action = Some(action);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuSection {
    pub title: Option<String>,
    pub items: Vec<MenuItem>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuRoot {
    pub title: Option<String>,
    pub icon: MenuIcon,
    pub tooltip: &'static str,
    pub is_loading: bool,
    pub sections: Vec<MenuSection>,
}

impl MenuRoot {
    /// Items in display order, across all sections.
    pub fn items(&self) -> impl Iterator<Item = &MenuItem> + '_ {
        self.sections.iter().flat_map(|section| section.items.iter())
    }

    pub fn actionable_items(&self) -> impl Iterator<Item = &MenuItem> + '_ {
        self.items().filter(|item| item.action.is_some())
    }
}

/// Icon for a pull request, from the check rollup of its latest commit.
pub fn status_icon(pr: &PullRequestSummary) -> MenuIcon {
    let state = pr.latest_commit.and_then(|commit| commit.check_state);
    match state {
        Some(CheckState::Success) => MenuIcon::Check,
        Some(CheckState::Error) | Some(CheckState::Failure) => MenuIcon::Xmark,
        Some(CheckState::Pending) => MenuIcon::Clock,
        _ => MenuIcon::PullRequest,
    }
}

pub fn filtered_sections<'a>(sections: &'a [Section], prefs: &Preferences) -> Vec<&'a Section> {
    sections
        .iter()
        .filter(|section| prefs.shows(section.kind))
        .collect()
}

/// Number of pull requests across the counted categories, or `None` when the
/// title count is turned off.
pub fn title_count(sections: &[Section], prefs: &Preferences) -> Option<usize> {
    if !prefs.show_text() {
        return None;
    }

    let count = sections
        .iter()
        .filter(|section| prefs.counts(section.kind))
        .map(Section::len)
        .sum();
    Some(count)
}

fn pull_request_item(pr: &PullRequestSummary) -> MenuItem {
    MenuItem::new(format!("#{} {}", pr.number, pr.title))
        .icon(status_icon(pr))
        .tooltip(pr.repository.clone())
        .action(MenuAction::OpenUrl(pr.permalink.clone()))
}

fn overflow_item(hidden: usize) -> MenuItem {
    MenuItem::new(format!("... {hidden} more")).action(MenuAction::launch_full_list())
}

fn section_group(section: &Section, max_items: Option<usize>) -> MenuSection {
    if section.is_empty() {
        return MenuSection {
            title: Some(section.kind.title().to_string()),
            items: vec![MenuItem::new(EMPTY_SECTION_TITLE)],
        };
    }

    let mut items: Vec<MenuItem> = section.pull_requests().map(pull_request_item).collect();
    if let Some(max_items) = max_items {
        let hidden = items.len().saturating_sub(max_items);
        if hidden > 0 {
            items.truncate(max_items);
            items.push(overflow_item(hidden));
        }
    }

    MenuSection {
        title: Some(section.kind.title().to_string()),
        items,
    }
}

fn trailing_group() -> MenuSection {
    MenuSection {
        title: None,
        items: vec![
            MenuItem::new(OPEN_FULL_LIST_TITLE)
                .icon(MenuIcon::Terminal)
                .shortcut('o')
                .action(MenuAction::launch_full_list()),
            MenuItem::new(CONFIGURE_TITLE)
                .icon(MenuIcon::Gear)
                .action(MenuAction::Configure),
        ],
    }
}

pub fn build_menu(sections: &[Section], prefs: &Preferences, is_loading: bool) -> MenuRoot {
    let max_items = prefs.max_items();
    let mut groups: Vec<MenuSection> = filtered_sections(sections, prefs)
        .into_iter()
        .map(|section| section_group(section, Some(max_items)))
        .collect();
    groups.push(trailing_group());

    MenuRoot {
        title: title_count(sections, prefs).map(|count| count.to_string()),
        icon: MenuIcon::PullRequest,
        tooltip: ROOT_TOOLTIP,
        is_loading,
        sections: groups,
    }
}

/// The companion full list: every section, uncapped.
pub fn build_full_list(sections: &[Section], is_loading: bool) -> MenuRoot {
    let total: usize = sections.iter().map(Section::len).sum();

    MenuRoot {
        title: Some(total.to_string()),
        icon: MenuIcon::PullRequest,
        tooltip: ROOT_TOOLTIP,
        is_loading,
        sections: sections
            .iter()
            .map(|section| section_group(section, None))
            .collect(),
    }
}
