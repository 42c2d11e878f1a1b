//! Reusable UI component helpers shared by the frame and the widgets

use ratatui::{
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders},
};

use super::theme;

// Helper functions to get theme colors
pub fn accent() -> Color { theme().accent }
pub fn accent_bright() -> Color { theme().accent_bright }
pub fn inactive() -> Color { theme().inactive }
pub fn success() -> Color { theme().success }
pub fn warning() -> Color { theme().warning }
pub fn danger() -> Color { theme().danger }
pub fn text() -> Color { theme().text }
pub fn text_dim() -> Color { theme().text_dim }
pub fn bg_selected() -> Color { theme().bg_selected }
pub fn header() -> Color { theme().header }
pub fn weekend() -> Color { theme().weekend }
pub fn holiday() -> Color { theme().holiday }

/// Bordered container block; focused widgets get the accent border
pub fn widget_block(title: &str, focused: bool) -> Block<'static> {
    let border_color = if focused { accent() } else { inactive() };
    let title_style = if focused {
        Style::default().fg(accent()).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(inactive())
    };

    Block::default()
        .title(Span::styled(format!(" {} ", title), title_style))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
}

/// Split `text` into spans, drawing every `digit` in `highlight`
pub fn highlight_digits(text: &str, digit: char, base: Style, highlight: Color) -> Vec<Span<'static>> {
    let mut spans = Vec::new();
    let mut run = String::new();

    for c in text.chars() {
        if c == digit {
            if !run.is_empty() {
                spans.push(Span::styled(std::mem::take(&mut run), base));
            }
            spans.push(Span::styled(c.to_string(), base.fg(highlight)));
        } else {
            run.push(c);
        }
    }
    if !run.is_empty() {
        spans.push(Span::styled(run, base));
    }

    spans
}

/// `key label` pairs as a single dim hint line
pub fn hint_line(hints: &[(&str, &str)]) -> Line<'static> {
    let mut spans = Vec::new();
    for (i, (key, label)) in hints.iter().enumerate() {
        if i > 0 {
            spans.push(Span::styled("  ", Style::default()));
        }
        spans.push(Span::styled(key.to_string(), Style::default().fg(accent())));
        spans.push(Span::styled(format!(" {}", label), Style::default().fg(text_dim())));
    }
    Line::from(spans)
}
