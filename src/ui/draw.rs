use anyhow::Result;
use ratatui::backend::Backend;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::symbols::line::NORMAL as LINE;
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph};
use ratatui::{Frame, Terminal};
// Use Popup from tui-widgets to render modals
use tui_widgets::popup::Popup;

use crate::config::RgbColor;
use crate::session::Mode;

use super::app::{App, SettingsField};
use super::panes::Panel;

const HELP_MODAL_FOOTER: &str = "j/k: scroll  Esc/q: close";
const SETTINGS_LABEL_WIDTH: usize = 10;
const SETTINGS_MIN_WIDTH: usize = 56;
const CUSTOM_ENDPOINT_HINT: &str = "LM Studio :1234/v1  Ollama :11434/v1  vLLM :8000/v1";

pub fn render<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<()> {
    terminal.draw(|frame| draw_frame(frame, app))?;
    Ok(())
}

fn draw_frame(frame: &mut Frame<'_>, app: &mut App) {
    let size = frame.area();
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(size);

    draw_header(frame, layout[0], app);
    draw_body(frame, layout[1], app);
    draw_footer(frame, layout[2], app);
    draw_settings_modal(frame, size, app);
    draw_help_modal(frame, size, app);
    draw_converting_modal(frame, size, app);
}

// =============================================================================
// Header
// =============================================================================

/// Top-bar buttons: first binding of each action and its title.
fn header_buttons(app: &App) -> Vec<(String, &'static str)> {
    let global = &app.config().keys.global;
    [
        (&global.help, "HELP"),
        (&global.convert, "CONVERT"),
        (&global.toggle_mode, "MODE"),
        (&global.settings, "LLM"),
        (&global.paste, "PASTE"),
        (&global.copy, "COPY"),
        (&global.export, "EXPORT"),
    ]
    .into_iter()
    .filter_map(|(keys, title)| keys.first().map(|key| (key.clone(), title)))
    .collect()
}

fn draw_header(frame: &mut Frame<'_>, area: Rect, app: &App) {
    let buttons = header_buttons(app);
    let buttons_width: u16 = buttons
        .iter()
        .map(|(key, title)| (key.chars().count() + title.len() + 4) as u16)
        .sum();

    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(0), Constraint::Length(buttons_width)])
        .split(area);

    let header_style = header_text_style(app);
    let mode = app.session.mode();
    let mut spans = vec![
        Span::styled(" CARDSMITH ", selection_style(app).add_modifier(Modifier::BOLD)),
        Span::raw(" "),
        Span::styled(format!("{} MODE", mode.title()), header_style),
        Span::raw(" | "),
        Span::styled(app.session.conversion.describe(), header_style),
    ];
    if mode == Mode::Batch {
        spans.push(Span::raw(" | "));
        spans.push(Span::styled(
            format!("{} CONTACTS", app.session.batch().len()),
            header_style,
        ));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), chunks[0]);

    draw_top_bar_buttons(frame, chunks[1], app, &buttons);
}

fn draw_top_bar_buttons(frame: &mut Frame<'_>, area: Rect, app: &App, buttons: &[(String, &str)]) {
    if buttons.is_empty() || area.width == 0 {
        return;
    }

    let colors = app.ui_colors();
    let button_style = Style::default()
        .fg(color(colors.selection_fg))
        .bg(color(colors.selection_bg))
        .add_modifier(Modifier::BOLD);

    let mut x = area.x;
    for (key, title) in buttons {
        // Format: " F1: HELP " followed by one separator column
        let text = format!(" {}: {} ", key, title);
        let width = text.chars().count() as u16;
        if x + width > area.x + area.width {
            break;
        }

        let button_area = Rect {
            x,
            y: area.y,
            width,
            height: 1,
        };
        frame.render_widget(Paragraph::new(text).style(button_style), button_area);
        x += width + 1;
    }
}

// =============================================================================
// Body
// =============================================================================

fn draw_body(frame: &mut Frame<'_>, area: Rect, app: &App) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);

    match app.session.mode() {
        Mode::Single => draw_input(frame, columns[0], app),
        Mode::Batch => {
            let left = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
                .split(columns[0]);
            draw_input(frame, left[0], app);
            draw_batch_list(frame, left[1], app);
        }
    }
    draw_output(frame, columns[1], app);
}

fn pane_block(app: &App, panel: Panel, title: String) -> Block<'static> {
    let active = app.focus == panel;
    let title_style = if active {
        selection_style(app)
    } else {
        header_text_style(app)
    };
    Block::default()
        .borders(Borders::ALL)
        .border_style(border_style(app, active))
        .title(Span::styled(format!(" {} ", title), title_style))
}

fn draw_input(frame: &mut Frame<'_>, area: Rect, app: &App) {
    let block = pane_block(app, Panel::Input, Panel::Input.title().to_string());
    let inner = block.inner(area);
    frame.render_widget(block, area);

    if inner.width == 0 || inner.height == 0 {
        return;
    }

    let (row, col) = app.editor.cursor();
    let scroll = row.saturating_sub(inner.height.saturating_sub(1) as usize);

    if app.editor.is_empty() {
        let hint = match app.session.mode() {
            Mode::Single => "Type or paste what you know about a person",
            Mode::Batch => "Type one contact, convert it, then the next",
        };
        frame.render_widget(
            Paragraph::new(hint).style(Style::default().add_modifier(Modifier::DIM)),
            inner,
        );
    } else {
        let lines: Vec<Line> = app
            .editor
            .lines()
            .iter()
            .skip(scroll)
            .take(inner.height as usize)
            .map(|line| Line::from(line.clone()))
            .collect();
        frame.render_widget(Paragraph::new(lines), inner);
    }

    let modal_open = app.help_modal.is_some() || app.settings_modal.is_some();
    if app.focus == Panel::Input && !modal_open && !app.is_converting() {
        let prefix: String = app.editor.lines()[row].chars().take(col).collect();
        let column = Span::raw(prefix).width() as u16;
        let x = inner.x.saturating_add(column.min(inner.width.saturating_sub(1)));
        let y = inner.y.saturating_add((row - scroll) as u16);
        frame.set_cursor_position((x, y));
    }
}

fn draw_output(frame: &mut Frame<'_>, area: Rect, app: &App) {
    let title = match app.session.mode() {
        Mode::Single => Panel::Output.title().to_string(),
        Mode::Batch => format!(
            "{} ({} CONTACTS)",
            Panel::Output.title(),
            app.session.batch().len()
        ),
    };
    let block = pane_block(app, Panel::Output, title);

    let output = app.session.output();
    let paragraph = if output.is_empty() {
        Paragraph::new("Converted vCard appears here")
            .style(Style::default().add_modifier(Modifier::DIM))
    } else {
        Paragraph::new(Text::from(output.to_string())).scroll((app.output_scroll, 0))
    };
    frame.render_widget(paragraph.block(block), area);
}

fn draw_batch_list(frame: &mut Frame<'_>, area: Rect, app: &App) {
    let batch = app.session.batch();
    let block = pane_block(
        app,
        Panel::Batch,
        format!("{} ({})", Panel::Batch.title(), batch.len()),
    );

    let items: Vec<ListItem> = if batch.is_empty() {
        vec![ListItem::new(Line::from("No contacts yet"))]
    } else {
        batch
            .records()
            .iter()
            .enumerate()
            .map(|(idx, record)| ListItem::new(format!("{:>3}. {}", idx + 1, record.display_name)))
            .collect()
    };

    let mut state = ListState::default();
    if !batch.is_empty() && app.focus == Panel::Batch {
        state.select(Some(app.batch_selected));
    }

    let list = List::new(items)
        .block(block)
        .highlight_style(selection_style(app))
        .highlight_symbol(" ")
        .repeat_highlight_symbol(false);

    frame.render_stateful_widget(list, area, &mut state);
}

// =============================================================================
// Footer
// =============================================================================

fn first_key(bindings: &[String]) -> String {
    bindings.first().cloned().unwrap_or_default()
}

fn context_help(app: &App) -> String {
    let keys = &app.config().keys;
    match app.focus {
        Panel::Input => format!(
            "Type contact details  {}: convert  {}: next pane",
            first_key(&keys.global.convert),
            first_key(&keys.global.focus_next)
        ),
        Panel::Output => "j/k: scroll  g: top".to_string(),
        Panel::Batch => format!(
            "{}/{}: select  {}: remove  {}: clear all",
            first_key(&keys.batch.next),
            first_key(&keys.batch.prev),
            first_key(&keys.batch.remove),
            first_key(&keys.batch.clear)
        ),
    }
}

fn draw_footer(frame: &mut Frame<'_>, area: Rect, app: &App) {
    let message = if app.settings_modal.is_some() {
        settings_help(app)
    } else if let Some(status) = &app.status {
        status.clone()
    } else {
        context_help(app)
    };
    let colors = app.ui_colors();
    let style = Style::default()
        .fg(color(colors.status_fg))
        .bg(color(colors.status_bg));

    let background = Block::default().style(Style::default().bg(color(colors.status_bg)));
    frame.render_widget(background, area);

    frame.render_widget(Paragraph::new(message).style(style), area);
}

// =============================================================================
// Modals
// =============================================================================

fn settings_help(app: &App) -> String {
    let keys = &app.config().keys.settings;
    format!(
        "{}: next  {}: switch provider  {}: save  {}: cancel",
        first_key(&keys.next),
        first_key(&keys.toggle),
        first_key(&keys.confirm),
        first_key(&keys.cancel)
    )
}

fn draw_settings_modal(frame: &mut Frame<'_>, area: Rect, app: &mut App) {
    let Some(modal) = app.settings_modal.as_ref() else {
        return;
    };

    let content_width = SETTINGS_MIN_WIDTH.min(area.width.saturating_sub(2) as usize);
    let header_style = header_text_style(app);
    let highlight = selection_style(app);

    let mut lines: Vec<Line> = Vec::new();
    let mut cursor = None;
    for field in SettingsField::ALL {
        let focused = modal.focus == field;
        let label = format!("{:<width$}", field.label(), width = SETTINGS_LABEL_WIDTH);
        let label_style = if focused { highlight } else { header_style };

        let value = match modal.input(field) {
            None => {
                let mark = |on: bool| if on { "(*)" } else { "( )" };
                format!(
                    "{} Hosted (Claude)  {} Custom endpoint",
                    mark(!modal.use_custom_endpoint),
                    mark(modal.use_custom_endpoint)
                )
            }
            Some(input) => {
                if focused {
                    let offset = Span::raw(label.as_str()).width() + input.visual_cursor();
                    cursor = Some((lines.len(), offset));
                }
                if field == SettingsField::ApiKey {
                    "*".repeat(input.value().chars().count())
                } else {
                    input.value().to_string()
                }
            }
        };

        let padding = content_width.saturating_sub(label.len() + Span::raw(value.as_str()).width());
        lines.push(Line::from(vec![
            Span::styled(label, label_style),
            Span::raw(value),
            Span::raw(" ".repeat(padding)),
        ]));
    }

    lines.push(Line::from(""));
    let hint = if modal.use_custom_endpoint {
        CUSTOM_ENDPOINT_HINT
    } else {
        "Hosted key comes from the config file or ANTHROPIC_API_KEY"
    };
    lines.push(Line::from(Span::styled(hint, Style::default().add_modifier(Modifier::DIM))));

    let title_line = Line::from(Span::styled(" LLM SETTINGS ", header_style));
    let popup = Popup::new(Text::from(lines))
        .title(title_line)
        .border_style(border_style(app, true));

    frame.render_stateful_widget_ref(popup, area, &mut app.modal_popup);

    if let (Some(popup_area), Some((row, column))) = (app.modal_popup.area(), cursor) {
        let inner = Block::default().borders(Borders::ALL).inner(*popup_area);
        let x = inner.x.saturating_add(column as u16);
        let y = inner.y.saturating_add(row as u16);
        frame.set_cursor_position((x, y));
    }
}

fn draw_help_modal(frame: &mut Frame<'_>, area: Rect, app: &mut App) {
    if app.help_modal.is_none() {
        return;
    }

    // Calculate modal size: 2/3 width, 80% height
    let width = area.width.saturating_mul(2).saturating_div(3).max(40).min(area.width);
    let height = area.height.saturating_mul(4).saturating_div(5).max(10).min(area.height);

    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    let modal_area = Rect::new(x, y, width, height);

    frame.render_widget(Clear, modal_area);

    let header_style = header_text_style(app);
    let border_s = border_style(app, true);

    let sections = app.help_entries();
    let mut lines: Vec<Line> = Vec::new();

    let content_width = width.saturating_sub(4) as usize;
    let action_width = 20usize;

    for (section_idx, section) in sections.iter().enumerate() {
        let header_text = format!(" {} ", section.title);
        let padding_total = content_width.saturating_sub(header_text.len());
        let left_pad = padding_total / 2;
        let right_pad = padding_total - left_pad;
        let header_line = format!(
            "{}{}{}",
            LINE.horizontal.repeat(left_pad),
            header_text,
            LINE.horizontal.repeat(right_pad)
        );
        lines.push(Line::from(Span::styled(header_line, header_style)));

        for entry in &section.entries {
            let action = format!("{:<width$}", entry.action, width = action_width);
            lines.push(Line::from(vec![
                Span::raw(action),
                Span::styled(entry.keys.clone(), header_style),
            ]));
        }

        if section_idx < sections.len() - 1 {
            lines.push(Line::from(""));
        }
    }

    // borders (2) + footer line (1)
    let inner_height = height.saturating_sub(3) as usize;

    let Some(modal) = app.help_modal.as_mut() else {
        return;
    };
    modal.total_lines = lines.len();
    modal.viewport_height = inner_height;

    let max_scroll = modal.total_lines.saturating_sub(modal.viewport_height);
    if modal.scroll > max_scroll {
        modal.scroll = max_scroll;
    }

    let scroll_indicator = match (modal.can_scroll_up(), modal.can_scroll_down()) {
        (true, true) => "▲▼",
        (true, false) => "▲ ",
        (false, true) => " ▼",
        (false, false) => "  ",
    };

    let visible_lines: Vec<Line> = lines
        .into_iter()
        .skip(modal.scroll)
        .take(modal.viewport_height)
        .collect();

    let title = Line::from(vec![
        Span::styled(" HELP ", header_style),
        Span::styled(scroll_indicator, header_style),
    ]);
    let footer = Line::from(Span::styled(format!(" {} ", HELP_MODAL_FOOTER), header_style));

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_s)
        .title(title)
        .title_bottom(footer)
        .title_alignment(Alignment::Center);

    let inner = block.inner(modal_area);
    frame.render_widget(block, modal_area);
    frame.render_widget(Paragraph::new(visible_lines), inner);
}

fn draw_converting_modal(frame: &mut Frame<'_>, area: Rect, app: &App) {
    if !app.is_converting() {
        return;
    }

    let width = 30u16.min(area.width);
    let height = 3u16.min(area.height);

    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    let modal_area = Rect::new(x, y, width, height);

    frame.render_widget(Clear, modal_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style(app, true));

    let inner = block.inner(modal_area);
    frame.render_widget(block, modal_area);

    let text = Paragraph::new("CONVERTING...")
        .alignment(Alignment::Center)
        .style(header_text_style(app));
    frame.render_widget(text, inner);
}

// =============================================================================
// Styles
// =============================================================================

fn selection_style(app: &App) -> Style {
    let colors = app.ui_colors();
    Style::default()
        .fg(color(colors.selection_fg))
        .bg(color(colors.selection_bg))
}

fn border_style(app: &App, active: bool) -> Style {
    let colors = app.ui_colors();
    let style = Style::default().fg(color(colors.border));
    if active {
        style
    } else {
        style.add_modifier(Modifier::DIM)
    }
}

fn header_text_style(app: &App) -> Style {
    let colors = app.ui_colors();
    Style::default().fg(color(colors.separator))
}

fn color(rgb: RgbColor) -> Color {
    Color::Rgb(rgb.r, rgb.g, rgb.b)
}
