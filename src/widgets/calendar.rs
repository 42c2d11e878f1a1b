//! Month calendar with holiday and transfer-workday marks.
//!
//! Date arithmetic is done here by hand: leap years, month lengths and the
//! weekday of a date. chrono is only asked for today's date.

use chrono::{DateTime, Datelike, Local};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Paragraph, Row, Table},
    Frame,
};
use serde::Deserialize;
use serde_json::Value;
use std::fmt;

use super::Widget;
use crate::config::CalendarOptions;
use crate::fetch::{Delivery, FetchError, Fetcher, RequestKind, RequestToken, Source};
use crate::layout::WidgetId;
use crate::ui::components::{
    accent, bg_selected, header, holiday, inactive, text, text_dim, weekend, widget_block,
};

pub const GRID_CELLS: usize = 35;

const DAYS_IN_MONTH: [u32; 12] = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];
const WEEKDAY_NAMES: [&str; 7] = ["日", "一", "二", "三", "四", "五", "六"];

pub fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

pub fn days_in_month(year: i32, month: u32) -> u32 {
    if month == 2 && is_leap_year(year) {
        29
    } else {
        DAYS_IN_MONTH[(month as usize - 1) % 12]
    }
}

/// Day of week, 0 = Sunday (Sakamoto's method)
pub fn weekday(year: i32, month: u32, day: u32) -> u32 {
    const T: [i32; 12] = [0, 3, 2, 5, 0, 3, 5, 1, 4, 6, 2, 4];
    let y = if month < 3 { year - 1 } else { year };
    (y + y / 4 - y / 100 + y / 400 + T[month as usize - 1] + day as i32).rem_euclid(7) as u32
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct CalendarDate {
    pub year: i32,
    pub month: u32,
    pub day: u32,
}

impl CalendarDate {
    pub fn new(year: i32, month: u32, day: u32) -> Self {
        Self { year, month, day }
    }

    pub fn today() -> Self {
        Self::from_local(&Local::now())
    }

    pub fn from_local(now: &DateTime<Local>) -> Self {
        Self::new(now.year(), now.month(), now.day())
    }

    pub fn weekday(&self) -> u32 {
        weekday(self.year, self.month, self.day)
    }

    pub fn is_weekend(&self) -> bool {
        matches!(self.weekday(), 0 | 6)
    }

    /// `(year, month)` of the month before
    pub fn prev_month(year: i32, month: u32) -> (i32, u32) {
        if month == 1 {
            (year - 1, 12)
        } else {
            (year, month - 1)
        }
    }

    pub fn next_month(year: i32, month: u32) -> (i32, u32) {
        if month == 12 {
            (year + 1, 1)
        } else {
            (year, month + 1)
        }
    }
}

impl fmt::Display for CalendarDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}-{:02}", self.year, self.month, self.day)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HolidayKind {
    Holiday,
    Workday,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HolidayEntry {
    pub date: String,
    #[serde(rename = "type")]
    pub kind: HolidayKind,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum HolidayFile {
    Bare(Vec<HolidayEntry>),
    Wrapped { holidays: Vec<HolidayEntry> },
}

/// Accepts a bare array or `{"holidays": [...]}`
pub fn parse_holidays(payload: Value) -> Result<Vec<HolidayEntry>, FetchError> {
    Ok(match serde_json::from_value(payload)? {
        HolidayFile::Bare(entries) => entries,
        HolidayFile::Wrapped { holidays } => holidays,
    })
}

fn lookup(holidays: &[HolidayEntry], date: &CalendarDate) -> Option<HolidayKind> {
    let key = date.to_string();
    holidays.iter().find(|h| h.date == key).map(|h| h.kind)
}

#[derive(Debug, Clone, PartialEq)]
pub struct DayCell {
    pub date: CalendarDate,
    pub outside_month: bool,
    pub weekend: bool,
    pub holiday: bool,
    pub transfer_workday: bool,
    pub today: bool,
    pub selected: bool,
}

/// Lay out `year`/`month` in a 5×7 grid.
///
/// Days that do not fit after the last row wrap into the empty leading
/// cells of the first row, keeping their weekday column. The rest of the
/// leading cells belong to the previous month, trailing cells to the next.
pub fn build_grid(
    year: i32,
    month: u32,
    week_starts_monday: bool,
    today: CalendarDate,
    selected: CalendarDate,
    holidays: &[HolidayEntry],
) -> Vec<DayCell> {
    let dim = days_in_month(year, month) as usize;
    let first = weekday(year, month, 1) as usize;
    let offset = if week_starts_monday { (first + 6) % 7 } else { first };

    let (prev_year, prev_month) = CalendarDate::prev_month(year, month);
    let prev_dim = days_in_month(prev_year, prev_month) as usize;
    let (next_year, next_month) = CalendarDate::next_month(year, month);

    (0..GRID_CELLS)
        .map(|i| {
            let (date, outside_month) = if i < offset {
                let folded = i + GRID_CELLS + 1 - offset;
                if folded <= dim {
                    (CalendarDate::new(year, month, folded as u32), false)
                } else {
                    let day = prev_dim + i + 1 - offset;
                    (CalendarDate::new(prev_year, prev_month, day as u32), true)
                }
            } else {
                let day = i + 1 - offset;
                if day <= dim {
                    (CalendarDate::new(year, month, day as u32), false)
                } else {
                    (CalendarDate::new(next_year, next_month, (day - dim) as u32), true)
                }
            };

            let kind = lookup(holidays, &date);
            DayCell {
                weekend: date.is_weekend(),
                holiday: kind == Some(HolidayKind::Holiday),
                transfer_workday: kind == Some(HolidayKind::Workday),
                today: date == today,
                selected: date == selected,
                date,
                outside_month,
            }
        })
        .collect()
}

pub struct CalendarWidget {
    options: CalendarOptions,
    fetcher: Fetcher,
    year: i32,
    month: u32,
    today: CalendarDate,
    selected: CalendarDate,
    cursor: usize,
    holidays: Vec<HolidayEntry>,
    token: RequestToken,
    disposed: bool,
}

impl CalendarWidget {
    pub fn new(options: CalendarOptions, fetcher: Fetcher) -> Self {
        Self::starting_at(options, fetcher, CalendarDate::today())
    }

    pub fn starting_at(options: CalendarOptions, fetcher: Fetcher, today: CalendarDate) -> Self {
        let mut widget = Self {
            options,
            fetcher,
            year: today.year,
            month: today.month,
            today,
            selected: today,
            cursor: 0,
            holidays: Vec::new(),
            token: RequestToken::default(),
            disposed: false,
        };
        widget.place_cursor();
        widget
    }

    pub fn displayed_month(&self) -> (i32, u32) {
        (self.year, self.month)
    }

    pub fn selected(&self) -> CalendarDate {
        self.selected
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn grid(&self) -> Vec<DayCell> {
        build_grid(
            self.year,
            self.month,
            self.options.week_starts_monday,
            self.today,
            self.selected,
            &self.holidays,
        )
    }

    /// Select the date in cell `index`, following it into an adjacent month
    pub fn select(&mut self, index: usize) {
        let Some(cell) = self.grid().into_iter().nth(index) else {
            return;
        };
        self.selected = cell.date;
        if cell.outside_month {
            self.year = cell.date.year;
            self.month = cell.date.month;
        }
        self.place_cursor();
    }

    pub fn prev_month(&mut self) {
        (self.year, self.month) = CalendarDate::prev_month(self.year, self.month);
        self.place_cursor();
    }

    pub fn next_month(&mut self) {
        (self.year, self.month) = CalendarDate::next_month(self.year, self.month);
        self.place_cursor();
    }

    pub fn go_today(&mut self) {
        self.year = self.today.year;
        self.month = self.today.month;
        self.selected = self.today;
        self.place_cursor();
    }

    /// Cursor on the selected date if shown, otherwise on the 1st
    fn place_cursor(&mut self) {
        let grid = self.grid();
        self.cursor = grid
            .iter()
            .position(|c| c.selected && !c.outside_month)
            .or_else(|| grid.iter().position(|c| !c.outside_month && c.date.day == 1))
            .unwrap_or(0);
    }

    fn move_cursor(&mut self, delta: isize) {
        let next = self.cursor as isize + delta;
        if (0..GRID_CELLS as isize).contains(&next) {
            self.cursor = next as usize;
        }
    }

    fn load_holidays(&mut self) {
        let generation = self.token.issue();
        self.fetcher.request(
            WidgetId::Calendar,
            RequestKind::Holidays,
            generation,
            Source::from_location(&self.options.holidays_path),
        );
    }

    fn weekday_header(&self) -> Vec<&'static str> {
        let start = if self.options.week_starts_monday { 1 } else { 0 };
        (0..7).map(|i| WEEKDAY_NAMES[(start + i) % 7]).collect()
    }

    fn cell_style(&self, cell: &DayCell, index: usize, focused: bool) -> Style {
        let mut style = Style::default().fg(if cell.outside_month {
            inactive()
        } else if cell.holiday {
            holiday()
        } else if cell.weekend && !cell.transfer_workday {
            weekend()
        } else {
            text()
        });

        if cell.today {
            style = style.fg(accent()).add_modifier(Modifier::BOLD | Modifier::UNDERLINED);
        }
        if cell.selected {
            style = style.bg(bg_selected());
        }
        if focused && index == self.cursor {
            style = style.add_modifier(Modifier::REVERSED);
        }
        style
    }

    fn selected_summary(&self) -> String {
        let mut summary = format!(
            "{} 星期{}",
            self.selected,
            WEEKDAY_NAMES[self.selected.weekday() as usize]
        );
        match lookup(&self.holidays, &self.selected) {
            Some(HolidayKind::Holiday) => summary.push_str("  休"),
            Some(HolidayKind::Workday) => summary.push_str("  班"),
            None => {}
        }
        summary
    }
}

impl Widget for CalendarWidget {
    fn id(&self) -> WidgetId {
        WidgetId::Calendar
    }

    fn title(&self) -> String {
        format!("{}年{}月", self.year, self.month)
    }

    fn mount(&mut self) {
        self.load_holidays();
    }

    fn refresh(&mut self) {
        self.place_cursor();
    }

    fn dispose(&mut self) {
        self.disposed = true;
        self.token.invalidate();
    }

    fn tick(&mut self, now: DateTime<Local>) {
        self.today = CalendarDate::from_local(&now);
    }

    fn on_delivery(&mut self, delivery: Delivery) {
        if self.disposed || !self.token.is_current(delivery.generation) {
            return;
        }
        match delivery.result.and_then(parse_holidays) {
            Ok(holidays) => {
                tracing::debug!("Loaded {} holiday entries", holidays.len());
                self.holidays = holidays;
            }
            Err(e) => tracing::error!("加载节假日数据失败: {}", e),
        }
    }

    fn handle_key(&mut self, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Left => self.move_cursor(-1),
            KeyCode::Right => self.move_cursor(1),
            KeyCode::Up => self.move_cursor(-7),
            KeyCode::Down => self.move_cursor(7),
            KeyCode::Enter => self.select(self.cursor),
            KeyCode::Char('[') => self.prev_month(),
            KeyCode::Char(']') => self.next_month(),
            KeyCode::Char('t') => self.go_today(),
            _ => return false,
        }
        true
    }

    fn key_hints(&self) -> Vec<(&'static str, &'static str)> {
        vec![("←↑↓→", "移动"), ("Enter", "选择"), ("[/]", "翻月"), ("t", "今天")]
    }

    fn draw(&self, f: &mut Frame, area: Rect, focused: bool) {
        let block = widget_block(&self.title(), focused);
        let inner = block.inner(area);
        f.render_widget(block, area);

        let chunks = Layout::vertical([Constraint::Min(6), Constraint::Length(1)]).split(inner);

        let header_row = Row::new(
            self.weekday_header()
                .into_iter()
                .map(|name| Span::styled(name, Style::default().fg(header()).add_modifier(Modifier::BOLD))),
        );

        let grid = self.grid();
        let rows: Vec<Row> = grid
            .chunks(7)
            .enumerate()
            .map(|(week, cells)| {
                Row::new(cells.iter().enumerate().map(|(col, cell)| {
                    let mark = if cell.holiday {
                        "休"
                    } else if cell.transfer_workday {
                        "班"
                    } else {
                        ""
                    };
                    Span::styled(
                        format!("{:>2}{}", cell.date.day, mark),
                        self.cell_style(cell, week * 7 + col, focused),
                    )
                }))
            })
            .collect();

        let table = Table::new(rows, [Constraint::Ratio(1, 7); 7]).header(header_row);
        f.render_widget(table, chunks[0]);

        f.render_widget(
            Paragraph::new(Line::from(Span::styled(
                self.selected_summary(),
                Style::default().fg(text_dim()),
            ))),
            chunks[1],
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(year: i32, month: u32) -> Vec<DayCell> {
        let today = CalendarDate::new(2000, 1, 1);
        build_grid(year, month, true, today, today, &[])
    }

    fn current_days(cells: &[DayCell]) -> usize {
        cells.iter().filter(|c| !c.outside_month).count()
    }

    #[test]
    fn test_leap_years() {
        assert!(is_leap_year(2024));
        assert!(is_leap_year(2000));
        assert!(!is_leap_year(1900));
        assert!(!is_leap_year(2025));
        assert_eq!(days_in_month(2024, 2), 29);
        assert_eq!(days_in_month(2025, 2), 28);
        assert_eq!(days_in_month(2025, 4), 30);
    }

    #[test]
    fn test_weekday() {
        assert_eq!(weekday(2024, 2, 1), 4);
        assert_eq!(weekday(2025, 2, 1), 6);
        assert_eq!(weekday(2024, 12, 1), 0);
        assert_eq!(weekday(2026, 1, 1), 4);
    }

    #[test]
    fn test_every_month_has_exact_current_cells() {
        for year in [1999, 2000, 2024, 2025, 2026] {
            for month in 1..=12 {
                let cells = grid(year, month);
                assert_eq!(cells.len(), GRID_CELLS);
                assert_eq!(
                    current_days(&cells),
                    days_in_month(year, month) as usize,
                    "{}-{}",
                    year,
                    month
                );
            }
        }
    }

    #[test]
    fn test_february_leap_and_common() {
        let feb_2024 = grid(2024, 2);
        assert_eq!(current_days(&feb_2024), 29);
        assert_eq!(feb_2024[0].date, CalendarDate::new(2024, 1, 29));
        assert_eq!(feb_2024[3].date, CalendarDate::new(2024, 2, 1));
        assert_eq!(feb_2024[31].date, CalendarDate::new(2024, 2, 29));
        assert_eq!(feb_2024[32].date, CalendarDate::new(2024, 3, 1));

        let feb_2025 = grid(2025, 2);
        assert_eq!(current_days(&feb_2025), 28);
        assert_eq!(feb_2025[32].date, CalendarDate::new(2025, 2, 28));
        assert_eq!(feb_2025[33].date, CalendarDate::new(2025, 3, 1));
    }

    #[test]
    fn test_year_boundaries() {
        let dec = grid(2025, 12);
        assert_eq!(dec[31].date, CalendarDate::new(2026, 1, 1));
        assert!(dec[31].outside_month);

        let jan = grid(2026, 1);
        assert_eq!(jan[0].date, CalendarDate::new(2025, 12, 29));
        assert_eq!(jan[2].date, CalendarDate::new(2025, 12, 31));
        assert!(jan[0].outside_month);
    }

    #[test]
    fn test_overflow_folds_into_first_row() {
        // Dec 2024 starts on a Sunday: the 30th and 31st land on Monday and Tuesday
        let dec = grid(2024, 12);
        assert_eq!(dec[0].date, CalendarDate::new(2024, 12, 30));
        assert_eq!(dec[1].date, CalendarDate::new(2024, 12, 31));
        assert!(!dec[0].outside_month);
        assert_eq!(dec[5].date, CalendarDate::new(2024, 11, 30));
        assert_eq!(dec[6].date, CalendarDate::new(2024, 12, 1));
    }

    #[test]
    fn test_sunday_start() {
        let today = CalendarDate::new(2000, 1, 1);
        let cells = build_grid(2024, 2, false, today, today, &[]);
        assert_eq!(cells[4].date, CalendarDate::new(2024, 2, 1));
        assert_eq!(cells[0].date, CalendarDate::new(2024, 1, 28));
    }

    #[test]
    fn test_holiday_flags() {
        let holidays = parse_holidays(serde_json::json!({
            "holidays": [
                {"date": "2025-01-01", "type": "holiday"},
                {"date": "2025-01-26", "type": "workday"}
            ]
        }))
        .unwrap();
        let today = CalendarDate::new(2025, 1, 15);
        let cells = build_grid(2025, 1, true, today, today, &holidays);

        let new_year = cells.iter().find(|c| c.date == CalendarDate::new(2025, 1, 1)).unwrap();
        assert!(new_year.holiday);
        let sunday = cells.iter().find(|c| c.date == CalendarDate::new(2025, 1, 26)).unwrap();
        assert!(sunday.weekend && sunday.transfer_workday);
        let middle = cells.iter().find(|c| c.date == today).unwrap();
        assert!(middle.today && middle.selected);

        let bare = parse_holidays(serde_json::json!([{"date": "2025-05-01", "type": "holiday"}])).unwrap();
        assert_eq!(bare[0].kind, HolidayKind::Holiday);
    }

    #[tokio::test]
    async fn test_selecting_adjacent_month() {
        let (fetcher, _rx) = Fetcher::new().unwrap();
        let mut widget = CalendarWidget::starting_at(
            CalendarOptions::default(),
            fetcher,
            CalendarDate::new(2026, 1, 15),
        );
        assert_eq!(widget.cursor(), 17);

        widget.select(0);
        assert_eq!(widget.selected(), CalendarDate::new(2025, 12, 29));
        assert_eq!(widget.displayed_month(), (2025, 12));
        assert!(widget.grid()[widget.cursor()].selected);

        widget.handle_key(KeyEvent::from(KeyCode::Char('t')));
        assert_eq!(widget.displayed_month(), (2026, 1));
        assert_eq!(widget.selected(), CalendarDate::new(2026, 1, 15));

        widget.handle_key(KeyEvent::from(KeyCode::Char(']')));
        assert_eq!(widget.displayed_month(), (2026, 2));
        widget.handle_key(KeyEvent::from(KeyCode::Char('[')));
        widget.handle_key(KeyEvent::from(KeyCode::Char('[')));
        assert_eq!(widget.displayed_month(), (2025, 12));
    }

    #[tokio::test]
    async fn test_missing_holiday_file_is_logged() {
        let (fetcher, mut rx) = Fetcher::new().unwrap();
        let options = CalendarOptions {
            holidays_path: "/nonexistent/holidays.json".to_string(),
            ..CalendarOptions::default()
        };
        let mut widget = CalendarWidget::starting_at(options, fetcher, CalendarDate::new(2025, 1, 1));
        widget.mount();
        widget.on_delivery(rx.recv().await.unwrap());
        assert!(widget.grid().iter().all(|c| !c.holiday));
    }
}
