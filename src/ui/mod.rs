pub mod components;

use std::sync::OnceLock;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

use crate::app::{App, Popup};
use crate::theme::Theme;
use components::{accent, header, inactive, text, text_dim, warning};

// Palette is fixed once at startup
static THEME: OnceLock<Theme> = OnceLock::new();

/// Install the palette; later calls are ignored
pub fn init_theme(theme: Theme) {
    if THEME.set(theme).is_err() {
        tracing::debug!("Theme already initialised");
    }
}

fn theme() -> &'static Theme {
    THEME.get_or_init(|| Theme::load(None))
}

pub fn draw(f: &mut Frame, app: &App) {
    let area = f.area();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Info line
            Constraint::Min(0),    // Widget grid
            Constraint::Length(1), // Footer
        ])
        .split(area);

    draw_info_line(f, app, chunks[0]);
    draw_grid(f, app, chunks[1]);
    draw_footer(f, app, chunks[2]);

    if app.popup == Popup::Help {
        draw_help_popup(f);
    }
}

/// Cell rects for `count` widgets, `columns` per row
fn grid_cells(area: Rect, count: usize, columns: u16) -> Vec<Rect> {
    let columns = columns.max(1) as usize;
    let rows = count.div_ceil(columns).max(1);

    let row_areas = Layout::default()
        .direction(Direction::Vertical)
        .constraints(vec![Constraint::Ratio(1, rows as u32); rows])
        .split(area);

    row_areas
        .iter()
        .flat_map(|row| {
            Layout::default()
                .direction(Direction::Horizontal)
                .constraints(vec![Constraint::Ratio(1, columns as u32); columns])
                .split(*row)
                .to_vec()
        })
        .take(count)
        .collect()
}

fn draw_grid(f: &mut Frame, app: &App, area: Rect) {
    let cells = grid_cells(area, app.widgets.len(), app.config.columns);
    for (i, (widget, cell)) in app.widgets.iter().zip(cells).enumerate() {
        widget.draw(f, cell, i == app.focused);
    }
}

fn draw_info_line(f: &mut Frame, app: &App, area: Rect) {
    let line = if let Some(ref status) = app.status_message {
        Line::from(Span::styled(status.as_str(), Style::default().fg(warning())))
    } else {
        let focused = app.focused_widget().map(|w| w.title()).unwrap_or_default();
        Line::from(vec![
            Span::styled("起始页", Style::default().fg(accent()).add_modifier(Modifier::BOLD)),
            Span::styled(" │ ", Style::default().fg(inactive())),
            Span::styled(focused, Style::default().fg(text())),
        ])
    };

    f.render_widget(Paragraph::new(line).alignment(Alignment::Center), area);
}

fn draw_footer(f: &mut Frame, app: &App, area: Rect) {
    let mut hints = app.focused_widget().map(|w| w.key_hints()).unwrap_or_default();
    if !app.captures_input() {
        hints.extend([("Tab", "切换"), ("</>", "移动"), ("?", "帮助"), ("q", "退出")]);
    }

    // Responsive: show fewer hints on narrow terminals
    let max_hints = if area.width < 60 { 4 } else if area.width < 100 { 6 } else { hints.len() };

    let hint_spans: Vec<Span> = hints
        .iter()
        .take(max_hints)
        .flat_map(|(key, action)| {
            vec![
                Span::styled(*key, Style::default().fg(accent())),
                Span::styled(format!(" {} │ ", action), Style::default().fg(text_dim())),
            ]
        })
        .collect();

    let footer = Paragraph::new(Line::from(hint_spans)).alignment(Alignment::Center);
    f.render_widget(footer, area);
}

fn help_section(title: &str) -> Line<'static> {
    Line::from(Span::styled(
        format!("═══ {} ═══", title),
        Style::default().fg(header()).add_modifier(Modifier::BOLD),
    ))
}

fn help_entry(key: &str, action: &str) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("  {:<12}", key), Style::default().fg(accent())),
        Span::raw(action.to_string()),
    ])
}

fn help_lines() -> Vec<Line<'static>> {
    vec![
        help_section("全局"),
        help_entry("Tab/S-Tab", "切换组件"),
        help_entry("< > S-←/→", "移动组件位置 (自动保存)"),
        help_entry("R", "刷新全部"),
        help_entry("q Ctrl-C", "退出"),
        Line::from(""),
        help_section("时钟"),
        help_entry("f", "切换 12/24 小时制"),
        Line::from(""),
        help_section("下班倒计时"),
        help_entry("s", "设置工作时间与日薪"),
        help_entry("Enter/Esc", "保存 / 返回"),
        Line::from(""),
        help_section("天气"),
        help_entry("c", "切换预设城市"),
        help_entry("/", "输入城市, Tab 补全"),
        help_entry("r", "重新查询"),
        Line::from(""),
        help_section("热搜"),
        help_entry("s", "切换微博/百度"),
        help_entry("j/k Enter", "选择 / 打开链接"),
        help_entry("r", "刷新"),
        Line::from(""),
        help_section("日历"),
        help_entry("←↑↓→ Enter", "移动 / 选择日期"),
        help_entry("[ ]", "上月 / 下月"),
        help_entry("t", "回到今天"),
        Line::from(""),
        help_section("其他"),
        help_entry("r", "每日一言: 换一句"),
        help_entry("j/k Enter", "快捷方式: 选择 / 打开"),
        Line::from(""),
        Line::from(vec![
            Span::styled("  Press ", Style::default().fg(text_dim())),
            Span::styled("?", Style::default().fg(accent())),
            Span::styled("/", Style::default().fg(text_dim())),
            Span::styled("Esc", Style::default().fg(accent())),
            Span::styled(" to close", Style::default().fg(text_dim())),
        ]),
    ]
}

fn draw_help_popup(f: &mut Frame) {
    let area = f.area();
    let help_text = help_lines();
    let popup_area = popup_rect(
        if area.width < 80 { 95 } else { 60 },
        help_text.len() as u16 + 2,
        area,
    );

    f.render_widget(Clear, popup_area);

    let help = Paragraph::new(help_text)
        .block(
            Block::default()
                .title(Span::styled(" 帮助 ", Style::default().fg(accent())))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(accent())),
        )
        .wrap(Wrap { trim: false });

    f.render_widget(help, popup_area);
}

/// Horizontally `percent_x` of `r`, `height` rows tall (clamped), centered
fn popup_rect(percent_x: u16, height: u16, r: Rect) -> Rect {
    let width = (u32::from(r.width) * u32::from(percent_x.min(100)) / 100) as u16;
    let height = height.min(r.height);
    Rect::new(
        r.x + (r.width - width) / 2,
        r.y + (r.height - height) / 2,
        width,
        height,
    )
}
