use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
    Frame,
};

use crate::{
    menu::{MenuIcon, MenuItem, MenuRoot},
    AppState, View,
};

const LEGEND_FULL: &str =
    "↑/↓ j/k move  enter activate  o full list  R refresh  esc back  q quit";
const LEGEND_COMPACT: &str = "↑↓ move  ⏎ activate  o list  R refresh  esc back  q quit";
const LEGEND_TINY: &str = "jk ⏎ o R esc q";
const LEGEND_VARIANTS: [&str; 3] = [LEGEND_FULL, LEGEND_COMPACT, LEGEND_TINY];
const ITEM_INDENT: usize = 2;
const ICON_TITLE_GAP: usize = 1;
const TITLE_TOOLTIP_GAP: usize = 2;
const LOADING_MARKER: &str = "↻";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Row<'a> {
    Header(&'a str),
    Item {
        item: &'a MenuItem,
        action_index: Option<usize>,
    },
    Spacer,
}

/// Flattens the menu into display rows, numbering actionable items in order.
fn menu_rows(menu: &MenuRoot) -> Vec<Row<'_>> {
    let mut rows = Vec::new();
    let mut action_index = 0;

    for (idx, section) in menu.sections.iter().enumerate() {
        if idx > 0 {
            rows.push(Row::Spacer);
        }
        if let Some(title) = section.title.as_deref() {
            rows.push(Row::Header(title));
        }
        for item in &section.items {
            let index = item.action.as_ref().map(|_| {
                let current = action_index;
                action_index += 1;
                current
            });
            rows.push(Row::Item {
                item,
                action_index: index,
            });
        }
    }

    rows
}

fn selected_row(rows: &[Row<'_>], selected: usize) -> Option<usize> {
    rows.iter().position(|row| {
        matches!(row, Row::Item { action_index: Some(index), .. } if *index == selected)
    })
}

pub fn draw(f: &mut Frame, app: &AppState) {
    let menu = app.menu();
    let size = f.area();
    let status_lines = build_status_lines(size.width, app.status.as_deref());
    let status_height = status_lines.len().max(1) as u16;

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(3),
            Constraint::Length(status_height),
        ])
        .split(size);

    draw_header(f, chunks[0], &menu, app);
    draw_menu(f, chunks[1], &menu, app);
    draw_status(f, chunks[2], status_lines);
}

fn draw_header(f: &mut Frame, area: Rect, menu: &MenuRoot, app: &AppState) {
    let (glyph, color) = icon_glyph(menu.icon);
    let mut spans = vec![Span::styled(
        glyph,
        Style::default().fg(color).add_modifier(Modifier::BOLD),
    )];

    if let Some(title) = menu.title.as_deref() {
        spans.push(Span::raw(" "));
        spans.push(Span::styled(
            title.to_string(),
            Style::default().add_modifier(Modifier::BOLD),
        ));
    }
    if menu.is_loading {
        spans.push(Span::raw(" "));
        spans.push(Span::styled(LOADING_MARKER, Style::default().fg(Color::Cyan)));
    }

    spans.push(Span::raw("  "));
    spans.push(Span::styled(
        menu.tooltip,
        Style::default().fg(Color::DarkGray),
    ));

    if !app.updated_label.is_empty() {
        spans.push(Span::styled(
            format!("  updated {} ago", app.updated_label),
            Style::default().fg(Color::DarkGray),
        ));
    }

    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn view_title(view: View) -> &'static str {
    match view {
        View::Menu => "My Pull Requests",
        View::FullList => "All Pull Requests",
    }
}

fn draw_menu(f: &mut Frame, area: Rect, menu: &MenuRoot, app: &AppState) {
    let block = Block::default()
        .title(view_title(app.view))
        .borders(Borders::ALL);
    let width = block.inner(area).width as usize;

    let rows = menu_rows(menu);
    let items: Vec<ListItem> = rows
        .iter()
        .map(|row| ListItem::new(render_row(row, width)))
        .collect();

    let mut state = ListState::default();
    state.select(selected_row(&rows, app.selected));

    let list = List::new(items)
        .block(block)
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED));
    f.render_stateful_widget(list, area, &mut state);
}

fn render_row(row: &Row<'_>, width: usize) -> Line<'static> {
    match row {
        Row::Header(title) => Line::from(Span::styled(
            truncate_with_suffix(title, width),
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )),
        Row::Spacer => Line::from(Span::raw(" ")),
        Row::Item { item, .. } => render_item(item, width),
    }
}

fn render_item(item: &MenuItem, width: usize) -> Line<'static> {
    let mut spans = vec![Span::raw(" ".repeat(ITEM_INDENT))];
    let mut remaining = width.saturating_sub(ITEM_INDENT);

    if let Some(icon) = item.icon {
        let (glyph, color) = icon_glyph(icon);
        spans.push(Span::styled(glyph, Style::default().fg(color)));
        spans.push(Span::raw(" ".repeat(ICON_TITLE_GAP)));
        remaining = remaining.saturating_sub(glyph.chars().count() + ICON_TITLE_GAP);
    }

    let suffix = item
        .shortcut
        .map(|key| format!("[{key}]"))
        .or_else(|| item.tooltip.clone())
        .unwrap_or_default();
    let (title_width, suffix_width) = split_title_width(
        remaining,
        item.title.chars().count(),
        suffix.chars().count(),
    );

    let title_style = if item.action.is_some() {
        Style::default()
    } else {
        Style::default()
            .fg(Color::DarkGray)
            .add_modifier(Modifier::ITALIC)
    };
    let title = truncate_with_suffix(&item.title, title_width);
    let used = title.chars().count();
    spans.push(Span::styled(title, title_style));

    if suffix_width > 0 {
        let gap = remaining.saturating_sub(used + suffix_width);
        spans.push(Span::raw(" ".repeat(gap.max(TITLE_TOOLTIP_GAP))));
        spans.push(Span::styled(
            pad_left(&truncate_with_suffix(&suffix, suffix_width), suffix_width),
            Style::default().fg(Color::DarkGray),
        ));
    }

    Line::from(spans)
}

/// Shares the row between title and tooltip, favoring the title.
fn split_title_width(available: usize, title_len: usize, suffix_len: usize) -> (usize, usize) {
    if suffix_len == 0 || available <= TITLE_TOOLTIP_GAP {
        return (available, 0);
    }

    let without_gap = available - TITLE_TOOLTIP_GAP;
    if title_len + suffix_len <= without_gap {
        return (title_len, suffix_len);
    }

    let suffix_width = suffix_len.min(without_gap / 3);
    (without_gap - suffix_width, suffix_width)
}

fn icon_glyph(icon: MenuIcon) -> (&'static str, Color) {
    match icon {
        MenuIcon::Check => ("✓", Color::Green),
        MenuIcon::Xmark => ("✗", Color::Red),
        MenuIcon::Clock => ("◷", Color::Yellow),
        MenuIcon::PullRequest => ("⇅", Color::Magenta),
        MenuIcon::Terminal => (">", Color::Gray),
        MenuIcon::Gear => ("⚙", Color::Gray),
    }
}

fn draw_status(f: &mut Frame, area: Rect, lines: Vec<String>) {
    let lines: Vec<Line> = lines.into_iter().map(Line::from).collect();
    let paragraph = Paragraph::new(lines).block(Block::default());
    f.render_widget(paragraph, area);
}

fn build_status_lines(width: u16, status: Option<&str>) -> Vec<String> {
    let width = (width as usize).max(1);
    let mut lines = Vec::new();

    let status = status.map(str::trim).filter(|text| !text.is_empty());
    if let Some(status) = status {
        lines.push(truncate_with_suffix(status, width));
    } else {
        lines.push(String::new());
    }

    lines.push(select_legend(width));
    lines
}

fn select_legend(width: usize) -> String {
    LEGEND_VARIANTS
        .iter()
        .find(|legend| legend.chars().count() <= width)
        .map(|legend| legend.to_string())
        .unwrap_or_else(|| truncate_with_suffix(LEGEND_TINY, width))
}

fn pad_left(value: &str, width: usize) -> String {
    format!("{value:>width$}", width = width)
}

fn truncate_with_suffix(value: &str, max: usize) -> String {
    if max == 0 {
        return String::new();
    }

    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= max {
        return value.to_string();
    }

    if max <= 2 {
        return chars.into_iter().take(max).collect();
    }

    let cut = max - 2;
    let mut truncated: String = chars.iter().take(cut).collect();
    if let Some(space) = truncated.rfind(' ') {
        if space >= 4 {
            truncated.truncate(space);
        }
    }
    if truncated.chars().count() > cut {
        truncated = truncated.chars().take(cut).collect();
    }
    truncated.push_str("..");
    truncated
}
