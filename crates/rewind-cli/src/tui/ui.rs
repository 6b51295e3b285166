use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, Paragraph};
use ratatui::Frame;
use rewind_core::hash::{now_ms, short_ref};
use rewind_core::{Boundary, CheckpointRecord, Event, Payload};
use rewind_session::view::{CheckpointListView, ScopeRow};
use rewind_session::Notice;

use super::app::App;

/// Render the full TUI frame.
pub fn render(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(3),    // transcript
            Constraint::Length(1), // status bar
        ])
        .split(f.area());

    render_transcript(f, app, chunks[0]);

    if let Some(view) = app.session.checkpoint_view(now_ms()) {
        render_checkpoint_picker(f, &view, app.session.config().visible_rows, chunks[0]);
    } else if let Some((pending, rows)) = app.session.scope_view() {
        let prefix = app.session.config().snapshot_prefix_chars;
        render_scope_picker(f, &pending, &rows, prefix, chunks[0]);
    }

    render_status_bar(f, app, chunks[1]);
}

fn render_transcript(f: &mut Frame, app: &App, area: Rect) {
    let prefix = app.session.config().snapshot_prefix_chars;
    let snapshot = app
        .session
        .current_snapshot()
        .map(|s| format!(" @ {}", short_ref(s, prefix)))
        .unwrap_or_default();
    let title = format!(" Transcript ({}){snapshot} ", app.session.events().len());
    let block = Block::default().title(title).borders(Borders::ALL);

    let max_preview = area.width.saturating_sub(14) as usize;
    let items: Vec<ListItem> = app
        .session
        .events()
        .iter()
        .skip(app.scroll)
        .map(|ev| {
            let (label, text, style) = event_display(ev, prefix);
            let text = truncate_str(&text, max_preview);
            ListItem::new(Line::from(Span::styled(format!(" {label:<8} {text}"), style)))
        })
        .collect();

    f.render_widget(List::new(items).block(block), area);
}

fn render_checkpoint_picker(
    f: &mut Frame,
    view: &CheckpointListView,
    visible_rows: usize,
    area: Rect,
) {
    // rows + two indicator lines + borders
    let height = (visible_rows.min(view.total) + 4) as u16;
    let popup = popup_rect(area, 80, height);
    f.render_widget(Clear, popup);

    let mut items = Vec::with_capacity(view.rows.len() + 2);
    items.push(indicator(view.more_above, "↑"));
    for row in &view.rows {
        let marker = if row.selected { ">" } else { " " };
        let tag = if row.auto_saved { "auto" } else { "    " };
        let style = if row.selected {
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        };
        let line = format!(" {marker} {}  {tag}  {:<10} {}", row.short_ref, row.age, row.preview);
        items.push(ListItem::new(Line::from(Span::styled(line, style))));
    }
    items.push(indicator(view.more_below, "↓"));

    let block = Block::default()
        .title(format!(" Rewind to checkpoint ({}) ", view.total))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));
    f.render_widget(List::new(items).block(block), popup);
}

fn render_scope_picker(
    f: &mut Frame,
    pending: &CheckpointRecord,
    rows: &[ScopeRow],
    prefix: usize,
    area: Rect,
) {
    let popup = popup_rect(area, 60, rows.len() as u16 * 2 + 2);
    f.render_widget(Clear, popup);

    let items: Vec<ListItem> = rows
        .iter()
        .map(|row| {
            let marker = if row.selected { ">" } else { " " };
            let style = if row.selected {
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            ListItem::new(vec![
                Line::from(Span::styled(format!(" {marker} {}", row.label), style)),
                Line::from(Span::styled(
                    format!("     {}", row.description),
                    Style::default().fg(Color::DarkGray),
                )),
            ])
        })
        .collect();

    let block = Block::default()
        .title(format!(" Restore from {} ", short_ref(&pending.snapshot_ref, prefix)))
        .title_bottom(" Enter:restore  p:preview  Esc:back ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));
    f.render_widget(List::new(items).block(block), popup);
}

fn render_status_bar(f: &mut Frame, app: &App, area: Rect) {
    let mut flags = String::new();
    if app.session.is_degraded() {
        flags.push_str(" [checkpoints off]");
    }
    if app.session.boundary() == Boundary::Before {
        flags.push_str(" [cut before marker]");
    }
    let (text, style) = match app.status.first() {
        Some(first) if first.is_error() => (
            format!(" {}", status_text(&app.status)),
            Style::default().fg(Color::White).bg(Color::Red),
        ),
        Some(_) => (
            format!(" {}{flags}", status_text(&app.status)),
            Style::default().fg(Color::White).bg(Color::DarkGray),
        ),
        None => (
            format!(
                " rewind{flags} | Esc Esc:rewind  n:exchange  s:stream  c:checkpoint  b:boundary  q:quit"
            ),
            Style::default().fg(Color::White).bg(Color::DarkGray),
        ),
    };
    f.render_widget(Paragraph::new(Line::from(Span::styled(text, style))), area);
}

// ── Helpers ──

fn status_text(notices: &[Notice]) -> String {
    notices
        .iter()
        .map(Notice::message)
        .collect::<Vec<_>>()
        .join("  |  ")
}

fn indicator(hidden: usize, arrow: &str) -> ListItem<'static> {
    let text = if hidden > 0 {
        format!("   {arrow} {hidden} more")
    } else {
        String::new()
    };
    ListItem::new(Line::from(Span::styled(
        text,
        Style::default().fg(Color::DarkGray),
    )))
}

/// Horizontally centered box of `percent_x` width and fixed `height`.
fn popup_rect(area: Rect, percent_x: u16, height: u16) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(0),
            Constraint::Length(height.min(area.height)),
            Constraint::Min(0),
        ])
        .split(area);
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1])[1]
}

/// Label, one-line text, and style for a transcript entry.
fn event_display(ev: &Event, prefix: usize) -> (&'static str, String, Style) {
    match &ev.payload {
        Payload::UserMessage { text } => (
            "you",
            first_line(text),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Payload::AssistantMessage { text } => {
            let cursor = if ev.partial { " ▌" } else { "" };
            ("agent", format!("{}{cursor}", first_line(text)), Style::default())
        }
        Payload::SystemNotice { text } => {
            ("notice", first_line(text), Style::default().fg(Color::DarkGray))
        }
        Payload::ToolOutput { tool, text } => (
            "tool",
            format!("{tool}: {}", first_line(text)),
            Style::default().fg(Color::DarkGray),
        ),
        Payload::CheckpointMarker { snapshot_ref } => {
            let auto = if ev.is_auto_saved() { " (auto)" } else { "" };
            (
                "◆ ckpt",
                format!("{}{auto}", short_ref(snapshot_ref, prefix)),
                Style::default().fg(Color::Yellow),
            )
        }
        Payload::CostAccounting(m) => (
            "usage",
            format!("{} in / {} out  ${:.4}", m.tokens_in, m.tokens_out, m.cost_usd),
            Style::default().fg(Color::DarkGray),
        ),
    }
}

fn first_line(s: &str) -> String {
    s.lines().next().unwrap_or(s).to_string()
}

fn truncate_str(s: &str, max_chars: usize) -> String {
    let mut chars = s.chars();
    let truncated: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{truncated}...")
    } else {
        truncated
    }
}
