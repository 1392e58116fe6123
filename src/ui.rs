//! Terminal UI using ratatui

use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph, Wrap},
};

use crate::app::{App, AppState, Theme};
use crate::orchestrator::{GalleryStatus, SearchStatus};
use crate::records::DrugRecord;

const CURRENCY: &str = "ریال";
const UNKNOWN_PRICE: &str = "نامشخص";
const UNKNOWN_OWNER: &str = "برند نامشخص";

/// Rows taken by one record in the results list
const RECORD_HEIGHT: usize = 4;

struct Palette {
    text: Color,
    muted: Color,
    accent: Color,
    title: Color,
    link: Color,
    price: Color,
    error: Color,
    selected_bg: Color,
}

impl Palette {
    fn for_theme(theme: Theme) -> Self {
        match theme {
            Theme::Dark => Self {
                text: Color::White,
                muted: Color::Gray,
                accent: Color::Cyan,
                title: Color::Yellow,
                link: Color::Blue,
                price: Color::Green,
                error: Color::Red,
                selected_bg: Color::Rgb(35, 35, 45),
            },
            Theme::Light => Self {
                text: Color::Black,
                muted: Color::DarkGray,
                accent: Color::Blue,
                title: Color::Magenta,
                link: Color::Blue,
                price: Color::Rgb(0, 110, 0),
                error: Color::Red,
                selected_bg: Color::Rgb(220, 225, 240),
            },
        }
    }
}

/// Draw the main UI
pub fn draw_ui(f: &mut Frame, app: &App) {
    let palette = Palette::for_theme(app.theme);
    let area = f.area();

    if app.theme == Theme::Light {
        f.render_widget(Block::default().style(Style::default().bg(Color::White)), area);
    }

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Search input
            Constraint::Length(1), // History
            Constraint::Length(1), // Sort / filter controls
            Constraint::Min(8),    // Results
            Constraint::Length(1), // Pagination
            Constraint::Length(3), // Status + help
        ])
        .split(area);

    draw_search_input(f, app, &palette, chunks[0]);
    draw_history(f, app, &palette, chunks[1]);
    draw_controls(f, app, &palette, chunks[2]);

    if app.has_error() {
        draw_error(f, app, &palette, chunks[3]);
    } else if app.state == AppState::Gallery {
        draw_gallery(f, app, &palette, chunks[3]);
    } else {
        match app.orchestrator.status() {
            SearchStatus::Loading => draw_message(f, &palette, chunks[3], " Status ", "Searching...", palette.title),
            SearchStatus::NoResults => draw_suggestions(f, app, &palette, chunks[3]),
            SearchStatus::Empty => draw_message(
                f,
                &palette,
                chunks[3],
                " Results ",
                "No records on this page",
                palette.muted,
            ),
            SearchStatus::Idle => draw_message(
                f,
                &palette,
                chunks[3],
                " Results ",
                "Enter a drug name above and press Enter",
                palette.muted,
            ),
            SearchStatus::Ready | SearchStatus::Failed(_) => draw_results(f, app, &palette, chunks[3]),
        }
    }

    draw_pagination(f, app, &palette, chunks[4]);
    draw_help_bar(f, app, &palette, chunks[5]);
}

/// Draw search input field
fn draw_search_input(f: &mut Frame, app: &App, palette: &Palette, area: Rect) {
    let is_focused = app.state == AppState::Input;
    let style = if is_focused {
        Style::default().fg(palette.accent).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(palette.muted)
    };

    let input = Paragraph::new(app.input.as_str()).style(style).block(
        Block::default()
            .borders(Borders::ALL)
            .title(Span::styled(
                " Drug search ",
                Style::default().fg(palette.title).add_modifier(Modifier::BOLD),
            ))
            .border_style(style),
    );
    f.render_widget(input, area);

    if is_focused {
        let cursor = app.input.chars().count() as u16;
        f.set_cursor_position((area.x + cursor + 1, area.y + 1));
    }
}

fn draw_history(f: &mut Frame, app: &App, palette: &Palette, area: Rect) {
    let terms = app.orchestrator.history().terms();
    let mut spans = vec![Span::styled(" Recent: ", Style::default().fg(palette.muted))];
    if terms.is_empty() {
        spans.push(Span::styled("-", Style::default().fg(palette.muted)));
    }
    for (i, term) in terms.iter().enumerate() {
        if i > 0 {
            spans.push(Span::styled(" · ", Style::default().fg(palette.muted)));
        }
        spans.push(Span::styled(term.as_str(), Style::default().fg(palette.link)));
    }
    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

/// Active sort, active owner filter and how many owners there are
fn draw_controls(f: &mut Frame, app: &App, palette: &Palette, area: Rect) {
    let view = app.orchestrator.view();
    let owners = view.owner_options().len();
    let line = Line::from(vec![
        Span::styled(" Sort: ", Style::default().fg(palette.muted)),
        Span::styled(view.sort().to_string(), Style::default().fg(palette.accent)),
        Span::styled("   Owner: ", Style::default().fg(palette.muted)),
        Span::styled(
            view.filter().as_stored().to_string(),
            Style::default().fg(palette.accent),
        ),
        Span::styled(format!(" ({} options)", owners), Style::default().fg(palette.muted)),
    ]);
    f.render_widget(Paragraph::new(line), area);
}

/// Draw the filtered and sorted record list
fn draw_results(f: &mut Frame, app: &App, palette: &Palette, area: Rect) {
    let records = app.visible_records();
    let total = app.orchestrator.view().records().len();

    if records.is_empty() {
        let message = if total == 0 {
            "No results"
        } else {
            "No records match the owner filter"
        };
        draw_message(f, palette, area, " Results ", message, palette.muted);
        return;
    }

    let visible_height = area.height.saturating_sub(2) as usize;
    let scroll_offset = app.get_scroll_offset(visible_height, RECORD_HEIGHT);

    let items: Vec<ListItem> = records
        .iter()
        .enumerate()
        .skip(scroll_offset)
        .take(visible_height / RECORD_HEIGHT + 1)
        .map(|(i, record)| record_item(record, i, i == app.selected_index, palette))
        .collect();

    let title = format!(" Results ({} of {}) ", records.len(), total);
    let list = List::new(items).block(
        Block::default()
            .borders(Borders::ALL)
            .title(Span::styled(
                title,
                Style::default().fg(palette.price).add_modifier(Modifier::BOLD),
            ))
            .border_style(Style::default().fg(palette.accent)),
    );
    f.render_widget(list, area);
}

fn record_item<'a>(record: &'a DrugRecord, index: usize, selected: bool, palette: &Palette) -> ListItem<'a> {
    let mut title = vec![
        Span::styled(format!("{:2}. ", index + 1), Style::default().fg(palette.title)),
        Span::styled(
            record.title_local.as_str(),
            Style::default().fg(palette.text).add_modifier(Modifier::BOLD),
        ),
    ];
    if !record.title_latin.is_empty() {
        title.push(Span::styled(
            format!("  ({})", record.title_latin),
            Style::default().fg(palette.muted),
        ));
    }

    let mut facts = vec![
        Span::raw("    "),
        Span::styled(format_price(record.price), Style::default().fg(palette.price)),
        Span::styled("  |  ", Style::default().fg(palette.muted)),
        Span::styled(
            record.owner_name.as_deref().unwrap_or(UNKNOWN_OWNER),
            Style::default().fg(palette.text),
        ),
    ];
    if let Some(generic) = &record.generic_code {
        facts.push(Span::styled("  |  ژنریک: ", Style::default().fg(palette.muted)));
        facts.push(Span::styled(generic.as_str(), Style::default().fg(palette.text)));
    }

    let content = vec![
        Line::from(title),
        Line::from(facts),
        Line::from(vec![
            Span::raw("    "),
            Span::styled(truncate(&record.detail_url, 80), Style::default().fg(palette.link)),
        ]),
        Line::raw(""),
    ];

    let style = if selected {
        Style::default().bg(palette.selected_bg).add_modifier(Modifier::BOLD)
    } else {
        Style::default()
    };
    ListItem::new(content).style(style)
}

fn draw_suggestions(f: &mut Frame, app: &App, palette: &Palette, area: Rect) {
    let suggestions = app.orchestrator.suggestions();

    let mut lines = vec![
        Line::from(Span::styled(
            format!("No results for \"{}\"", app.orchestrator.term()),
            Style::default().fg(palette.title).add_modifier(Modifier::BOLD),
        )),
        Line::raw(""),
    ];
    if !suggestions.is_empty() {
        lines.push(Line::from(Span::styled("Did you mean:", Style::default().fg(palette.muted))));
    }
    for (i, suggestion) in suggestions.iter().enumerate() {
        let style = if i == app.suggestion_index {
            Style::default().fg(palette.link).bg(palette.selected_bg).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(palette.link)
        };
        lines.push(Line::from(Span::styled(format!("  {}", suggestion.text), style)));
    }

    let paragraph = Paragraph::new(lines)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Results ")
                .border_style(Style::default().fg(palette.muted)),
        )
        .wrap(Wrap { trim: true });
    f.render_widget(paragraph, area);
}

fn draw_gallery(f: &mut Frame, app: &App, palette: &Palette, area: Rect) {
    let (title, lines) = match app.orchestrator.gallery_status() {
        GalleryStatus::Closed => (String::new(), Vec::new()),
        GalleryStatus::Loading { title } => (
            title.clone(),
            vec![Line::from(Span::styled("Loading images...", Style::default().fg(palette.title)))],
        ),
        GalleryStatus::Failed { title, message } => (
            title.clone(),
            vec![Line::from(Span::styled(
                format!("Gallery failed: {}", message),
                Style::default().fg(palette.error),
            ))],
        ),
        GalleryStatus::Ready { title, images } if images.is_empty() => (
            title.clone(),
            vec![Line::from(Span::styled("No images", Style::default().fg(palette.muted)))],
        ),
        GalleryStatus::Ready { title, images } => {
            let lines = images
                .iter()
                .enumerate()
                .flat_map(|(i, image)| {
                    let selected = i == app.gallery_index;
                    let marker = if selected { "▶" } else { " " };
                    let style = if selected {
                        Style::default().fg(palette.text).bg(palette.selected_bg).add_modifier(Modifier::BOLD)
                    } else {
                        Style::default().fg(palette.text)
                    };
                    [
                        Line::from(Span::styled(
                            format!("{} {}/{}  {}", marker, i + 1, images.len(), truncate(&image.full_url, 90)),
                            style,
                        )),
                        Line::from(Span::styled(
                            format!("      thumb: {}", truncate(&image.thumb_url, 84)),
                            Style::default().fg(palette.muted),
                        )),
                    ]
                })
                .collect();
            (title.clone(), lines)
        }
    };

    let paragraph = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title(Span::styled(
                format!(" Gallery: {} ", title),
                Style::default().fg(palette.title).add_modifier(Modifier::BOLD),
            ))
            .border_style(Style::default().fg(palette.accent)),
    );
    f.render_widget(paragraph, area);
}

fn draw_pagination(f: &mut Frame, app: &App, palette: &Palette, area: Rect) {
    let links = app.orchestrator.pagination();
    if links.is_empty() || app.state == AppState::Gallery {
        f.render_widget(Paragraph::new(""), area);
        return;
    }

    let current = app.orchestrator.page();
    let mut spans = vec![Span::styled(" Pages: ", Style::default().fg(palette.muted))];
    for link in links {
        let style = if link.target.page == current {
            Style::default().fg(palette.title).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(palette.link)
        };
        spans.push(Span::styled(format!("[{}] ", link.label), style));
    }
    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn draw_message(f: &mut Frame, palette: &Palette, area: Rect, title: &str, message: &str, color: Color) {
    let paragraph = Paragraph::new(message)
        .style(Style::default().fg(color).add_modifier(Modifier::BOLD))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(title.to_string())
                .border_style(Style::default().fg(palette.muted)),
        )
        .wrap(Wrap { trim: true });
    f.render_widget(paragraph, area);
}

/// Draw error message
fn draw_error(f: &mut Frame, app: &App, palette: &Palette, area: Rect) {
    let message = match app.orchestrator.status() {
        SearchStatus::Failed(message) => message.as_str(),
        _ => "Unknown error",
    };

    let paragraph = Paragraph::new(format!(
        "Search failed: {}\n\nPress any key to continue...",
        message
    ))
    .style(Style::default().fg(palette.error))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title(Span::styled(
                " Error ",
                Style::default().fg(palette.error).add_modifier(Modifier::BOLD),
            ))
            .border_style(Style::default().fg(palette.error)),
    )
    .wrap(Wrap { trim: true });
    f.render_widget(paragraph, area);
}

/// Draw status line and help bar
fn draw_help_bar(f: &mut Frame, app: &App, palette: &Palette, area: Rect) {
    let help_text = if app.has_error() {
        "Press any key to continue │ Ctrl+Q: Quit"
    } else {
        match (app.state, app.orchestrator.status()) {
            (AppState::Input, _) => "Enter: Search │ ↑/↓: History │ Esc: Clear │ Ctrl+T: Theme │ Ctrl+Q: Quit",
            (AppState::Gallery, _) => "↑/k ↓/j: Navigate │ Enter: Open image │ Esc: Close │ Ctrl+Q: Quit",
            (AppState::Results, SearchStatus::NoResults) => {
                "↑/k ↓/j: Select │ Enter: Search suggestion │ Esc: New Search │ Ctrl+Q: Quit"
            }
            (AppState::Results, _) => {
                "↑/k ↓/j: Navigate │ s: Sort │ f: Owner │ n/p: Page │ g/Enter: Gallery │ Ctrl+B: Browser │ y: Code │ Esc: New Search"
            }
        }
    };

    let lines = vec![
        Line::from(Span::styled(app.status_message.as_str(), Style::default().fg(palette.text))),
        Line::from(Span::styled(help_text, Style::default().fg(palette.accent))),
    ];
    let paragraph = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::TOP)
            .border_style(Style::default().fg(palette.muted)),
    );
    f.render_widget(paragraph, area);
}

/// Price with thousands separators and currency; absent or zero is unknown
fn format_price(price: Option<u64>) -> String {
    match price {
        Some(price) if price > 0 => format!("{} {}", group_thousands(price), CURRENCY),
        _ => UNKNOWN_PRICE.to_string(),
    }
}

fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    grouped
}

/// Truncate string to max length
fn truncate(s: &str, max_len: usize) -> String {
    let char_count = s.chars().count();

    if char_count <= max_len {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", truncated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_price() {
        assert_eq!(format_price(Some(1_250_000)), "1,250,000 ریال");
        assert_eq!(format_price(Some(999)), "999 ریال");
        assert_eq!(format_price(Some(0)), "نامشخص");
        assert_eq!(format_price(None), "نامشخص");
    }

    #[test]
    fn test_truncate_counts_chars() {
        assert_eq!(truncate("آسپرین", 10), "آسپرین");
        assert_eq!(truncate("abcdefghij", 6), "abc...");
    }
}
