use chrono::{DateTime, Datelike, Local, Timelike};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};
use std::time::{Duration, Instant};

use super::{Interval, Widget};
use crate::config::ClockOptions;
use crate::layout::WidgetId;
use crate::theme::Theme;
use crate::ui::components::{accent, hint_line, highlight_digits, text, text_dim, widget_block};

const TICK: Duration = Duration::from_millis(1000);
const WEEKDAYS: [&str; 7] = ["星期一", "星期二", "星期三", "星期四", "星期五", "星期六", "星期日"];

/// Hour as shown on the dial: 12-hour mode maps 0 → 12 and 13..23 → 1..11
pub fn display_hour(hour: u32, use_24_hour: bool) -> u32 {
    if use_24_hour {
        hour
    } else {
        match hour % 12 {
            0 => 12,
            h => h,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClockFace {
    pub hours: String,
    pub minutes: String,
    pub seconds: String,
    pub date: String,
}

impl ClockFace {
    pub fn at(now: &DateTime<Local>, use_24_hour: bool) -> Self {
        Self {
            hours: format!("{:02}", display_hour(now.hour(), use_24_hour)),
            minutes: format!("{:02}", now.minute()),
            seconds: format!("{:02}", now.second()),
            date: format!(
                "{}-{:02}-{:02} {}",
                now.year(),
                now.month(),
                now.day(),
                WEEKDAYS[now.weekday().num_days_from_monday() as usize]
            ),
        }
    }
}

pub struct ClockWidget {
    options: ClockOptions,
    highlight: Color,
    face: ClockFace,
    interval: Interval,
    disposed: bool,
}

impl ClockWidget {
    pub fn new(options: ClockOptions) -> Self {
        let highlight = Theme::parse_hex_color(&options.highlight_color).unwrap_or_else(|| {
            tracing::warn!("Invalid highlight color {:?}", options.highlight_color);
            Color::Rgb(0x9c, 0x27, 0xb0)
        });

        Self {
            options,
            highlight,
            face: ClockFace::default(),
            interval: Interval::new(TICK),
            disposed: false,
        }
    }

    pub fn face(&self) -> &ClockFace {
        &self.face
    }

    pub fn uses_24_hour(&self) -> bool {
        self.options.use_24_hour
    }

    pub fn toggle_format(&mut self) {
        self.options.use_24_hour = !self.options.use_24_hour;
        self.update_time(Local::now());
    }

    fn update_time(&mut self, now: DateTime<Local>) {
        self.face = ClockFace::at(&now, self.options.use_24_hour);
    }
}

impl Widget for ClockWidget {
    fn id(&self) -> WidgetId {
        WidgetId::Clock
    }

    fn title(&self) -> String {
        "时钟".to_string()
    }

    fn mount(&mut self) {
        self.update_time(Local::now());
        self.interval.reset(Instant::now());
    }

    fn refresh(&mut self) {
        self.update_time(Local::now());
    }

    fn dispose(&mut self) {
        self.disposed = true;
    }

    fn tick(&mut self, now: DateTime<Local>) {
        if !self.disposed && self.interval.due(Instant::now()) {
            self.update_time(now);
        }
    }

    fn handle_key(&mut self, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Char('f') => {
                self.toggle_format();
                true
            }
            _ => false,
        }
    }

    fn key_hints(&self) -> Vec<(&'static str, &'static str)> {
        vec![("f", "12/24小时制")]
    }

    fn draw(&self, f: &mut Frame, area: Rect, focused: bool) {
        let block = widget_block(&self.title(), focused);
        let inner = block.inner(area);
        f.render_widget(block, area);

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Min(0),
                Constraint::Length(1), // HH:MM
                Constraint::Length(1), // SS
                Constraint::Length(1), // date
                Constraint::Min(0),
                Constraint::Length(1), // toggle
            ])
            .split(inner);

        let digits = Style::default().fg(text()).add_modifier(Modifier::BOLD);
        let mut hm = highlight_digits(&self.face.hours, '7', digits, self.highlight);
        hm.push(Span::styled(" : ", Style::default().fg(text_dim())));
        hm.extend(highlight_digits(&self.face.minutes, '7', digits, self.highlight));

        let seconds = highlight_digits(&self.face.seconds, '7', Style::default().fg(text_dim()), self.highlight);

        f.render_widget(Paragraph::new(Line::from(hm)).alignment(Alignment::Center), chunks[1]);
        f.render_widget(Paragraph::new(Line::from(seconds)).alignment(Alignment::Center), chunks[2]);
        f.render_widget(
            Paragraph::new(Span::styled(self.face.date.clone(), Style::default().fg(text_dim())))
                .alignment(Alignment::Center),
            chunks[3],
        );

        // Active while in 12-hour mode
        let toggle = if self.options.use_24_hour {
            hint_line(&[("f", "切换12小时制")])
        } else {
            Line::from(Span::styled(
                "f 切换24小时制",
                Style::default().fg(accent()).add_modifier(Modifier::REVERSED),
            ))
        };
        f.render_widget(Paragraph::new(toggle).alignment(Alignment::Center), chunks[5]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_twelve_hour_rule() {
        assert_eq!(display_hour(0, false), 12);
        assert_eq!(display_hour(12, false), 12);
        assert_eq!(display_hour(13, false), 1);
        assert_eq!(display_hour(23, false), 11);
        assert_eq!(display_hour(7, false), 7);
    }

    #[test]
    fn test_twenty_four_hour_passthrough() {
        for h in 0..24 {
            assert_eq!(display_hour(h, true), h);
        }
    }

    #[test]
    fn test_face_is_zero_padded() {
        let now = Local.with_ymd_and_hms(2024, 2, 29, 13, 5, 7).unwrap();

        let face = ClockFace::at(&now, true);
        assert_eq!(face.hours, "13");
        assert_eq!(face.minutes, "05");
        assert_eq!(face.seconds, "07");
        assert_eq!(face.date, "2024-02-29 星期四");

        let face = ClockFace::at(&now, false);
        assert_eq!(face.hours, "01");
    }

    #[test]
    fn test_toggle_flips_and_round_trips() {
        let mut clock = ClockWidget::new(ClockOptions::default());
        clock.mount();
        assert!(clock.uses_24_hour());

        assert!(clock.handle_key(KeyEvent::from(KeyCode::Char('f'))));
        assert!(!clock.uses_24_hour());
        let hour: u32 = clock.face().hours.parse().unwrap();
        assert!((1..=12).contains(&hour));

        clock.toggle_format();
        assert!(clock.uses_24_hour());
    }

    #[test]
    fn test_invalid_highlight_color_falls_back() {
        let clock = ClockWidget::new(ClockOptions {
            use_24_hour: true,
            highlight_color: "purple".to_string(),
        });
        assert_eq!(clock.highlight, Color::Rgb(0x9c, 0x27, 0xb0));
    }
}
