mod theme;

use crate::app::{AppModel, EventDetailOverlay, ListPane, Pane};
use crate::domain::{CatalogEntry, DisplayRow, MessageRow, PagedList};
use ratatui::prelude::*;
use ratatui::widgets::*;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Rows the loaders have materialized so far.
pub struct RenderSources<'a> {
    pub dialogs: &'a PagedList<CatalogEntry>,
    pub messages: &'a PagedList<MessageRow>,
}

pub fn render(frame: &mut Frame, model: &AppModel, sources: &RenderSources<'_>) {
    let full_area = frame.area();
    if full_area.width == 0 || full_area.height == 0 {
        return;
    }

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(1)])
        .split(full_area);

    let panes = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Ratio(1, 4), Constraint::Ratio(3, 4)])
        .split(rows[0]);

    render_dialogs(frame, panes[0], model, sources.dialogs);
    render_messages(frame, panes[1], model, sources.messages);
    frame.render_widget(status_line(model), rows[1]);

    if model.help_open {
        render_help_overlay(frame, full_area);
    }

    if let Some(detail) = &model.detail {
        render_detail_overlay(frame, full_area, detail);
    }
}

fn render_dialogs(
    frame: &mut Frame,
    area: Rect,
    model: &AppModel,
    dialogs: &PagedList<CatalogEntry>,
) {
    let focused = model.focus == Pane::Dialogs;
    let chunks = search_and_list(area);
    frame.render_widget(
        search_box(&model.dialogs, "Find Dialogs", "Type to filter dialogs…", focused),
        chunks[0],
    );
    if focused && !overlay_open(model) {
        place_query_cursor(frame, chunks[0], &model.dialogs);
    }

    let title = format!("Dialogs ({})", count_label(&model.dialogs, dialogs));
    let block = pane_block(title, focused);
    let pane = &model.dialogs;
    if pane.filter.is_empty() {
        let message = empty_message(pane, dialogs, "Loading dialogs…", "No dialogs.");
        frame.render_widget(Paragraph::new(message).block(block), chunks[1]);
        return;
    }

    let height = usize::from(chunks[1].height.saturating_sub(2));
    let max_width = usize::from(chunks[1].width).saturating_sub(6);
    let open_id = model.open_dialog.as_ref().map(|dialog| dialog.id.as_str());
    let (offset, visible) = visible_window(pane.selected, pane.filter.len(), height);
    let items: Vec<ListItem> = pane.filter.indices()[visible]
        .iter()
        .filter_map(|index| dialogs.get(*index))
        .map(|entry| {
            let style = if Some(entry.id.as_str()) == open_id {
                Style::default().fg(theme::ACCENT)
            } else {
                Style::default().fg(theme::FG)
            };
            ListItem::new(Line::from(Span::styled(
                truncate_end(&single_line(&entry.name), max_width),
                style,
            )))
        })
        .collect();

    let selected = pane.selected.min(pane.filter.len() - 1) - offset;
    render_list(frame, chunks[1], items, block, selected);
}

fn render_messages(
    frame: &mut Frame,
    area: Rect,
    model: &AppModel,
    messages: &PagedList<MessageRow>,
) {
    let focused = model.focus == Pane::Messages;
    let chunks = search_and_list(area);
    frame.render_widget(
        search_box(&model.messages, "Find Messages", "Type to filter messages…", focused),
        chunks[0],
    );
    if focused && !overlay_open(model) {
        place_query_cursor(frame, chunks[0], &model.messages);
    }

    let Some(dialog) = &model.open_dialog else {
        let hint = Paragraph::new("Select a dialog and press Enter.")
            .style(Style::default().fg(theme::DIM))
            .block(pane_block("Messages".to_string(), focused));
        frame.render_widget(hint, chunks[1]);
        return;
    };

    let title = format!(
        "{} ({})",
        single_line(&dialog.name),
        count_label(&model.messages, messages)
    );
    let block = pane_block(title, focused);
    let pane = &model.messages;
    if pane.filter.is_empty() {
        let message = empty_message(pane, messages, "Loading messages…", "No messages.");
        frame.render_widget(Paragraph::new(message).block(block), chunks[1]);
        return;
    }

    let height = usize::from(chunks[1].height.saturating_sub(2));
    let max_width = usize::from(chunks[1].width).saturating_sub(6);
    let (offset, visible) = visible_window(pane.selected, pane.filter.len(), height);
    let items: Vec<ListItem> = pane.filter.indices()[visible]
        .iter()
        .filter_map(|index| messages.get(*index))
        .map(|row| message_list_item(&row.display, max_width))
        .collect();

    let selected = pane.selected.min(pane.filter.len() - 1) - offset;
    render_list(frame, chunks[1], items, block, selected);
}

fn message_list_item(row: &DisplayRow, max_width: usize) -> ListItem<'static> {
    let style = match row {
        DisplayRow::Formatted(_) => Style::default().fg(theme::FG),
        DisplayRow::Raw(_) => Style::default().fg(theme::DIM),
    };
    ListItem::new(Line::from(Span::styled(
        truncate_end(&single_line(row.text()), max_width),
        style,
    )))
}

fn search_and_list(area: Rect) -> std::rc::Rc<[Rect]> {
    Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0)])
        .split(area)
}

fn search_box<'a>(
    pane: &'a ListPane,
    title: &'a str,
    placeholder: &'a str,
    focused: bool,
) -> Paragraph<'a> {
    let text = if pane.query.is_empty() {
        Text::from(Line::from(Span::styled(
            placeholder,
            Style::default().fg(theme::DIM),
        )))
    } else {
        Text::from(pane.query.text())
    };
    Paragraph::new(text).block(pane_block(title.to_string(), focused))
}

fn overlay_open(model: &AppModel) -> bool {
    model.help_open || model.detail.is_some()
}

fn place_query_cursor(frame: &mut Frame, area: Rect, pane: &ListPane) {
    let inner = pane_block(String::new(), true).inner(area);
    if inner.width == 0 || inner.height == 0 {
        return;
    }
    let x_offset = width_before_cursor(pane.query.text(), pane.query.cursor());
    let x = inner
        .x
        .saturating_add(x_offset)
        .min(inner.x.saturating_add(inner.width - 1));
    frame.set_cursor_position(Position { x, y: inner.y });
}

/// Display columns taken by the first `cursor` characters of `text`.
fn width_before_cursor(text: &str, cursor: usize) -> u16 {
    let width: usize = text
        .chars()
        .take(cursor)
        .map(|ch| UnicodeWidthChar::width(ch).unwrap_or(0))
        .sum();
    u16::try_from(width).unwrap_or(u16::MAX)
}

fn pane_block(title: String, focused: bool) -> Block<'static> {
    let border = if focused { theme::ACCENT } else { theme::BORDER };
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border))
        .padding(Padding::horizontal(1))
        .title(title)
}

fn render_list(
    frame: &mut Frame,
    area: Rect,
    items: Vec<ListItem<'static>>,
    block: Block<'static>,
    selected: usize,
) {
    let list = List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .bg(theme::ACCENT_BG)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("▸ ");

    let mut state = ListState::default();
    state.select(Some(selected));
    frame.render_stateful_widget(list, area, &mut state);
}

fn count_label<T>(pane: &ListPane, source: &PagedList<T>) -> String {
    let total = if source.is_exhausted() {
        source.len().to_string()
    } else {
        format!("{}+", source.len())
    };
    if pane.filter.is_active() {
        format!("{}/{total}", pane.filter.len())
    } else {
        total
    }
}

fn empty_message<T>(
    pane: &ListPane,
    source: &PagedList<T>,
    loading: &'static str,
    empty: &'static str,
) -> &'static str {
    if !source.is_exhausted() {
        loading
    } else if pane.filter.is_active() {
        "No matches. Press Esc to clear the filter."
    } else {
        empty
    }
}

fn status_line(model: &AppModel) -> Paragraph<'static> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    if let Some(error) = model.catalog_error.as_ref().or(model.stream_error.as_ref()) {
        spans.push(Span::styled(
            format!("{}  ·  Ctrl+R retries", single_line(error)),
            Style::default().fg(theme::ERROR),
        ));
    } else if let Some(status) = &model.status {
        spans.push(Span::raw(single_line(status)));
    } else {
        spans.push(Span::raw(model.manifest_path.display().to_string()));
    }

    if let Some(notice) = model.notice.as_deref().filter(|notice| !notice.trim().is_empty()) {
        spans.push(Span::raw("  ·  "));
        spans.push(Span::raw(notice.to_string()));
    }
    spans.push(Span::raw("  ·  F1 help"));

    Paragraph::new(Line::from(spans)).style(Style::default().fg(theme::MUTED))
}

fn render_help_overlay(frame: &mut Frame, area: Rect) {
    let popup = centered_rect(64, 60, area);
    frame.render_widget(Clear, popup);

    let text = vec![
        Line::from("Navigation"),
        Line::from("  - Tab: switch between dialogs and messages"),
        Line::from("  - Arrows: move selection"),
        Line::from("  - PgUp/PgDn, Home/End: jump"),
        Line::from("  - Enter: open dialog / show event"),
        Line::from(""),
        Line::from("Search"),
        Line::from("  - Type to filter the focused list"),
        Line::from("  - Esc: clear the filter, then go back"),
        Line::from(""),
        Line::from("Global"),
        Line::from("  - Ctrl+R: retry after a load error"),
        Line::from("  - Ctrl+Q or Ctrl+C: quit"),
        Line::from("  - F1: toggle this help"),
    ];

    let paragraph = Paragraph::new(text).wrap(Wrap { trim: false }).block(
        Block::default()
            .borders(Borders::ALL)
            .padding(Padding::horizontal(1))
            .title("Help (F1 to close)"),
    );
    frame.render_widget(paragraph, popup);
}

fn render_detail_overlay(frame: &mut Frame, area: Rect, detail: &EventDetailOverlay) {
    let popup = centered_rect(80, 80, area);
    frame.render_widget(Clear, popup);

    let paragraph = Paragraph::new(detail.body.as_str())
        .wrap(Wrap { trim: false })
        .scroll((detail.scroll, 0))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(theme::ACCENT))
                .padding(Padding::horizontal(1))
                .title(format!("{} (Esc to close)", detail.title)),
        );
    frame.render_widget(paragraph, popup);
}

/// Slice of a `len`-row list to draw in `height` rows so that `selected` stays visible.
/// Returns the offset of the slice and its range.
fn visible_window(selected: usize, len: usize, height: usize) -> (usize, std::ops::Range<usize>) {
    if len == 0 || height == 0 {
        return (0, 0..0);
    }
    let selected = selected.min(len - 1);
    let offset = (selected + 1).saturating_sub(height);
    (offset, offset..(offset + height).min(len))
}

fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate_end(text: &str, max_width: usize) -> String {
    if max_width == 0 {
        return String::new();
    }
    if UnicodeWidthStr::width(text) <= max_width {
        return text.to_string();
    }
    let ellipsis = "…";
    let available = max_width.saturating_sub(UnicodeWidthStr::width(ellipsis));
    let mut out = String::new();
    let mut width = 0;
    for ch in text.chars() {
        let ch_width = UnicodeWidthChar::width(ch).unwrap_or(0);
        if width + ch_width > available {
            break;
        }
        width += ch_width;
        out.push(ch);
    }
    out.push_str(ellipsis);
    out
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
