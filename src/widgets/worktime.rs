//! Work-day countdown: time to lunch, time to the end of the day and the
//! money earned so far. A settings page edits the work hours, which are
//! persisted in the settings store.

use chrono::{DateTime, Local, NaiveDate, NaiveTime};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};
use std::time::{Duration, Instant};

use super::{Interval, Widget};
use crate::config::{WorkHours, WorkTimeOptions};
use crate::layout::WidgetId;
use crate::store::{SharedStore, WORK_TIME_KEY};
use crate::ui::components::{
    accent, bg_selected, danger, hint_line, inactive, success, text, text_dim, warning, widget_block,
};

const TICK: Duration = Duration::from_millis(200);
const EMPTY_COUNTDOWN: &str = "--:--:--";
const FIELD_LABELS: [&str; 4] = ["上班时间", "午饭时间", "下班时间", "日薪(元)"];

pub fn parse_hm(s: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M").ok()
}

/// Linear accrual over the working day, clamped to `[0, daily_salary]`
pub fn salary_earned(daily_salary: f64, start: NaiveTime, end: NaiveTime, now: NaiveTime) -> f64 {
    if now < start {
        return 0.0;
    }
    if now >= end {
        return daily_salary;
    }

    let total = (end - start).num_milliseconds() as f64;
    let worked = (now - start).num_milliseconds() as f64;
    daily_salary * (worked / total).clamp(0.0, 1.0)
}

/// Time left until `target`, zero once it has passed
pub fn remaining(target: NaiveTime, now: NaiveTime) -> Duration {
    let ms = (target - now).num_milliseconds().max(0);
    Duration::from_millis(ms as u64)
}

/// `HH:MM:SS`, hours modulo 24
pub fn format_countdown(d: Duration) -> String {
    let secs = d.as_secs();
    format!("{:02}:{:02}:{:02}", (secs / 3600) % 24, (secs / 60) % 60, secs % 60)
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorkSnapshot {
    pub lunch: String,
    pub end: String,
    pub earned: f64,
    pub off_work: bool,
}

impl WorkSnapshot {
    pub fn compute(hours: &WorkHours, now: NaiveTime) -> Self {
        let start = parse_hm(&hours.start);
        let lunch = parse_hm(&hours.lunch);
        let end = parse_hm(&hours.end);

        let countdown = |t: Option<NaiveTime>| {
            t.map(|t| format_countdown(remaining(t, now)))
                .unwrap_or_else(|| EMPTY_COUNTDOWN.to_string())
        };

        let earned = match (start, end) {
            (Some(start), Some(end)) => salary_earned(hours.daily_salary, start, end, now),
            _ => 0.0,
        };

        Self {
            lunch: countdown(lunch),
            end: countdown(end),
            earned,
            off_work: end.map(|e| now >= e).unwrap_or(false),
        }
    }

    pub fn earned_text(&self) -> String {
        format!("¥{:.3}", self.earned)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Display,
    Settings,
}

/// Settings form state: start, lunch, end, daily salary
#[derive(Debug, Clone)]
struct SettingsForm {
    fields: [String; 4],
    selected: usize,
    error: Option<String>,
}

impl SettingsForm {
    fn from_hours(hours: &WorkHours) -> Self {
        Self {
            fields: [
                hours.start.clone(),
                hours.lunch.clone(),
                hours.end.clone(),
                hours.daily_salary.to_string(),
            ],
            selected: 0,
            error: None,
        }
    }

    fn accepts(&self, c: char) -> bool {
        if self.selected == 3 {
            c.is_ascii_digit() || c == '.'
        } else {
            c.is_ascii_digit() || c == ':'
        }
    }

    fn to_hours(&self) -> Option<WorkHours> {
        let daily_salary = self.fields[3].trim().parse::<f64>().ok()?;
        Some(WorkHours {
            start: self.fields[0].clone(),
            lunch: self.fields[1].clone(),
            end: self.fields[2].clone(),
            daily_salary,
        })
    }
}

pub struct WorkTimeWidget {
    hours: WorkHours,
    notify_on_end: bool,
    store: SharedStore,
    page: Page,
    form: SettingsForm,
    snapshot: WorkSnapshot,
    pulse: bool,
    interval: Interval,
    notified_on: Option<NaiveDate>,
    disposed: bool,
}

impl WorkTimeWidget {
    pub fn new(options: WorkTimeOptions, store: SharedStore) -> Self {
        let snapshot = WorkSnapshot::compute(&options.work_hours, Local::now().time());
        Self {
            form: SettingsForm::from_hours(&options.work_hours),
            hours: options.work_hours,
            notify_on_end: options.notify_on_end,
            store,
            page: Page::Display,
            snapshot,
            pulse: false,
            interval: Interval::new(TICK),
            notified_on: None,
            disposed: false,
        }
    }

    pub fn hours(&self) -> &WorkHours {
        &self.hours
    }

    pub fn page(&self) -> Page {
        self.page
    }

    pub fn snapshot(&self) -> &WorkSnapshot {
        &self.snapshot
    }

    fn load_config(&mut self) {
        let Some(saved) = self.store.get(WORK_TIME_KEY) else {
            return;
        };
        match serde_json::from_str::<WorkHours>(&saved) {
            Ok(hours) => self.hours = hours,
            Err(e) => tracing::error!("Failed to parse saved work hours: {}", e),
        }
    }

    fn save_config(&self) -> anyhow::Result<()> {
        let json = serde_json::to_string(&self.hours)?;
        self.store.set(WORK_TIME_KEY, &json)?;
        Ok(())
    }

    fn flip_page(&mut self) {
        self.page = match self.page {
            Page::Display => {
                self.form = SettingsForm::from_hours(&self.hours);
                Page::Settings
            }
            Page::Settings => Page::Display,
        };
        self.update_display(Local::now());
    }

    fn save_settings(&mut self) {
        match self.form.to_hours() {
            Some(hours) => {
                self.hours = hours;
                if let Err(e) = self.save_config() {
                    tracing::error!("Failed to save work hours: {}", e);
                }
                self.page = Page::Display;
                self.update_display(Local::now());
            }
            None => self.form.error = Some("日薪必须是数字".to_string()),
        }
    }

    fn update_display(&mut self, now: DateTime<Local>) {
        let was_off = self.snapshot.off_work;
        self.snapshot = WorkSnapshot::compute(&self.hours, now.time());
        self.pulse = (now.timestamp_millis() / 1000) % 2 == 0;

        if self.snapshot.off_work && !was_off {
            self.on_work_end(now.date_naive());
        }
    }

    fn on_work_end(&mut self, today: NaiveDate) {
        if !self.notify_on_end || self.notified_on == Some(today) {
            return;
        }
        self.notified_on = Some(today);

        let result = notify_rust::Notification::new()
            .summary("startpage")
            .body(&format!("下班啦！今日入账 {}", self.snapshot.earned_text()))
            .show();
        if let Err(e) = result {
            tracing::warn!("Could not send notification: {}", e);
        }
    }

    fn handle_settings_key(&mut self, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Esc => self.flip_page(),
            KeyCode::Enter => self.save_settings(),
            KeyCode::Tab | KeyCode::Down => {
                self.form.selected = (self.form.selected + 1) % FIELD_LABELS.len();
            }
            KeyCode::BackTab | KeyCode::Up => {
                self.form.selected = self.form.selected.checked_sub(1).unwrap_or(FIELD_LABELS.len() - 1);
            }
            KeyCode::Backspace => {
                self.form.fields[self.form.selected].pop();
            }
            KeyCode::Char(c) if self.form.accepts(c) => {
                self.form.error = None;
                self.form.fields[self.form.selected].push(c);
            }
            _ => {}
        }
        true
    }

    fn draw_display(&self, f: &mut Frame, area: Rect) {
        let value = Style::default().fg(text()).add_modifier(Modifier::BOLD);
        let label = Style::default().fg(text_dim());
        let earned_color = if self.snapshot.off_work { success() } else { warning() };

        let lines = vec![
            Line::from(Span::styled("吃！吃！吃！", label)),
            Line::from(Span::styled(self.snapshot.lunch.clone(), value)),
            Line::from(""),
            Line::from(Span::styled("撤！撤！撤！", label)),
            Line::from(Span::styled(self.snapshot.end.clone(), value)),
            Line::from(""),
            Line::from(vec![
                Span::styled("窝囊废 ", label),
                Span::styled(
                    self.snapshot.earned_text(),
                    Style::default().fg(earned_color).add_modifier(Modifier::BOLD),
                ),
            ]),
        ];

        f.render_widget(Paragraph::new(lines).alignment(Alignment::Center), area);
    }

    fn draw_settings(&self, f: &mut Frame, area: Rect) {
        let mut lines: Vec<Line> = FIELD_LABELS
            .iter()
            .zip(self.form.fields.iter())
            .enumerate()
            .map(|(i, (label, value))| {
                let selected = i == self.form.selected;
                let style = if selected {
                    Style::default().fg(text()).bg(bg_selected())
                } else {
                    Style::default().fg(text())
                };
                let cursor = if selected { "_" } else { "" };
                Line::from(vec![
                    Span::styled(format!("{} ", label), Style::default().fg(text_dim())),
                    Span::styled(format!("{}{}", value, cursor), style),
                ])
            })
            .collect();

        lines.push(Line::from(""));
        if let Some(error) = &self.form.error {
            lines.push(Line::from(Span::styled(error.clone(), Style::default().fg(danger()))));
        }
        lines.push(hint_line(&[("Enter", "保存"), ("Esc", "返回")]));

        f.render_widget(Paragraph::new(lines), area);
    }
}

impl Widget for WorkTimeWidget {
    fn id(&self) -> WidgetId {
        WidgetId::WorkTime
    }

    fn title(&self) -> String {
        match self.page {
            Page::Display => "下班倒计时".to_string(),
            Page::Settings => "设置".to_string(),
        }
    }

    fn mount(&mut self) {
        self.load_config();
        self.page = Page::Display;
        self.snapshot = WorkSnapshot::compute(&self.hours, Local::now().time());
        self.interval.reset(Instant::now());
    }

    fn refresh(&mut self) {
        self.update_display(Local::now());
    }

    fn dispose(&mut self) {
        self.disposed = true;
    }

    fn tick(&mut self, now: DateTime<Local>) {
        // Only the display page updates
        if self.disposed || self.page != Page::Display {
            return;
        }
        if self.interval.due(Instant::now()) {
            self.update_display(now);
        }
    }

    fn handle_key(&mut self, key: KeyEvent) -> bool {
        if self.page == Page::Settings {
            return self.handle_settings_key(key);
        }
        match key.code {
            KeyCode::Char('s') => {
                self.flip_page();
                true
            }
            _ => false,
        }
    }

    fn captures_input(&self) -> bool {
        self.page == Page::Settings
    }

    fn key_hints(&self) -> Vec<(&'static str, &'static str)> {
        match self.page {
            Page::Display => vec![("s", "设置")],
            Page::Settings => vec![("Tab", "切换"), ("Enter", "保存"), ("Esc", "返回")],
        }
    }

    fn draw(&self, f: &mut Frame, area: Rect, focused: bool) {
        let mut block = widget_block(&self.title(), focused);
        if self.snapshot.off_work && self.page == Page::Display {
            // Breathing border once the day is over
            let color = if self.pulse { danger() } else { inactive() };
            block = block.border_style(Style::default().fg(color));
        }
        let inner = block.inner(area);
        f.render_widget(block, area);

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(0), Constraint::Length(1)])
            .split(inner);

        match self.page {
            Page::Display => {
                self.draw_display(f, chunks[0]);
                f.render_widget(
                    Paragraph::new(Span::styled("s 设置", Style::default().fg(accent())))
                        .alignment(Alignment::Right),
                    chunks[1],
                );
            }
            Page::Settings => self.draw_settings(f, inner),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::sync::Arc;

    fn t(s: &str) -> NaiveTime {
        NaiveTime::parse_from_str(s, "%H:%M:%S").unwrap()
    }

    #[test]
    fn test_salary_clamps_outside_window() {
        let (start, end) = (t("08:00:00"), t("17:00:00"));
        assert_eq!(salary_earned(250.0, start, end, t("07:59:59")), 0.0);
        assert_eq!(salary_earned(250.0, start, end, t("08:00:00")), 0.0);
        assert_eq!(salary_earned(250.0, start, end, t("17:00:00")), 250.0);
        assert_eq!(salary_earned(250.0, start, end, t("23:00:00")), 250.0);
    }

    #[test]
    fn test_salary_is_linear_and_monotonic() {
        let (start, end) = (t("08:00:00"), t("18:00:00"));
        assert!((salary_earned(300.0, start, end, t("13:00:00")) - 150.0).abs() < 1e-9);

        let mut last = 0.0;
        let mut now = t("07:00:00");
        while now < t("19:00:00") {
            let earned = salary_earned(300.0, start, end, now);
            assert!(earned >= last);
            assert!((0.0..=300.0).contains(&earned));
            last = earned;
            now += chrono::Duration::minutes(7);
        }
    }

    #[test]
    fn test_countdown_formatting() {
        assert_eq!(format_countdown(remaining(t("11:20:00"), t("09:05:30"))), "02:14:30");
        assert_eq!(format_countdown(remaining(t("11:20:00"), t("12:00:00"))), "00:00:00");
        assert_eq!(format_countdown(Duration::from_secs(25 * 3600)), "01:00:00");
    }

    #[test]
    fn test_snapshot_with_bad_times() {
        let hours = WorkHours {
            start: "nope".to_string(),
            lunch: "11:20".to_string(),
            end: "25:99".to_string(),
            daily_salary: 100.0,
        };
        let snapshot = WorkSnapshot::compute(&hours, t("10:20:00"));
        assert_eq!(snapshot.lunch, "01:00:00");
        assert_eq!(snapshot.end, EMPTY_COUNTDOWN);
        assert_eq!(snapshot.earned_text(), "¥0.000");
        assert!(!snapshot.off_work);
    }

    #[test]
    fn test_snapshot_after_end_is_off_work() {
        let snapshot = WorkSnapshot::compute(&WorkHours::default(), t("18:00:00"));
        assert!(snapshot.off_work);
        assert_eq!(snapshot.end, "00:00:00");
        assert_eq!(snapshot.earned_text(), "¥250.000");
    }

    #[test]
    fn test_mount_reloads_persisted_hours() {
        let store: SharedStore = Arc::new(MemoryStore::default());
        store
            .set(
                WORK_TIME_KEY,
                r#"{"start":"09:00","lunch":"12:00","end":"18:00","dailySalary":400.5}"#,
            )
            .unwrap();

        let mut widget = WorkTimeWidget::new(WorkTimeOptions::default(), store);
        widget.mount();
        assert_eq!(widget.hours().start, "09:00");
        assert_eq!(widget.hours().daily_salary, 400.5);
    }

    #[test]
    fn test_corrupt_saved_hours_keep_options() {
        let store: SharedStore = Arc::new(MemoryStore::default());
        store.set(WORK_TIME_KEY, "{broken").unwrap();

        let mut widget = WorkTimeWidget::new(WorkTimeOptions::default(), store);
        widget.mount();
        assert_eq!(widget.hours(), &WorkHours::default());
    }

    #[test]
    fn test_settings_form_saves_to_store() {
        let store: SharedStore = Arc::new(MemoryStore::default());
        let mut widget = WorkTimeWidget::new(WorkTimeOptions::default(), store.clone());
        widget.mount();

        assert!(widget.handle_key(KeyEvent::from(KeyCode::Char('s'))));
        assert_eq!(widget.page(), Page::Settings);
        assert!(widget.captures_input());

        // Rewrite the end time
        widget.handle_key(KeyEvent::from(KeyCode::Tab));
        widget.handle_key(KeyEvent::from(KeyCode::Tab));
        for _ in 0..5 {
            widget.handle_key(KeyEvent::from(KeyCode::Backspace));
        }
        for c in "18:00x".chars() {
            widget.handle_key(KeyEvent::from(KeyCode::Char(c)));
        }
        widget.handle_key(KeyEvent::from(KeyCode::Enter));

        assert_eq!(widget.page(), Page::Display);
        assert_eq!(widget.hours().end, "18:00");

        let saved: WorkHours = serde_json::from_str(&store.get(WORK_TIME_KEY).unwrap()).unwrap();
        assert_eq!(saved, *widget.hours());
    }

    #[test]
    fn test_invalid_salary_keeps_form_open() {
        let store: SharedStore = Arc::new(MemoryStore::default());
        let mut widget = WorkTimeWidget::new(WorkTimeOptions::default(), store.clone());
        widget.mount();

        widget.handle_key(KeyEvent::from(KeyCode::Char('s')));
        widget.handle_key(KeyEvent::from(KeyCode::BackTab));
        for _ in 0..8 {
            widget.handle_key(KeyEvent::from(KeyCode::Backspace));
        }
        widget.handle_key(KeyEvent::from(KeyCode::Char('.')));
        widget.handle_key(KeyEvent::from(KeyCode::Enter));

        assert_eq!(widget.page(), Page::Settings);
        assert_eq!(store.get(WORK_TIME_KEY), None);
    }
}
