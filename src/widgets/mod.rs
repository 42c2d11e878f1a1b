//! Dashboard widgets.
//!
//! Every widget implements [`Widget`] on its own; there is no shared base
//! type. Options, the settings store and the fetcher are handed over at
//! construction.

pub mod calendar;
pub mod clock;
pub mod hotsearch;
pub mod quote;
pub mod shortcuts;
pub mod weather;
pub mod worktime;

use chrono::{DateTime, Local};
use crossterm::event::KeyEvent;
use ratatui::{layout::Rect, Frame};
use std::time::{Duration, Instant};

use crate::config::AppConfig;
use crate::fetch::{Delivery, Fetcher};
use crate::layout::WidgetId;
use crate::store::SharedStore;

pub trait Widget {
    fn id(&self) -> WidgetId;

    fn title(&self) -> String;

    /// First render and initial requests. Called once by the bootstrap.
    fn mount(&mut self);

    /// Re-issue data requests / recompute the display
    fn refresh(&mut self);

    /// Stop timers; later ticks and deliveries are ignored
    fn dispose(&mut self);

    /// Called on every app loop iteration
    fn tick(&mut self, _now: DateTime<Local>) {}

    /// Returns true if the key was consumed
    fn handle_key(&mut self, _key: KeyEvent) -> bool {
        false
    }

    /// True while a text field is being edited
    fn captures_input(&self) -> bool {
        false
    }

    fn on_delivery(&mut self, _delivery: Delivery) {}

    fn key_hints(&self) -> Vec<(&'static str, &'static str)> {
        Vec::new()
    }

    fn draw(&self, f: &mut Frame, area: Rect, focused: bool);
}

/// Build the widget for `id` from its options
pub fn build(id: WidgetId, config: &AppConfig, fetcher: &Fetcher, store: &SharedStore) -> Box<dyn Widget> {
    match id {
        WidgetId::Clock => Box::new(clock::ClockWidget::new(config.clock.clone())),
        WidgetId::WorkTime => Box::new(worktime::WorkTimeWidget::new(
            config.work_time.clone(),
            store.clone(),
        )),
        WidgetId::Weather => Box::new(weather::WeatherWidget::new(
            config.weather.clone(),
            fetcher.clone(),
        )),
        WidgetId::Shortcuts => Box::new(shortcuts::ShortcutWidget::new(
            config.shortcuts.clone(),
            fetcher.clone(),
        )),
        WidgetId::HotSearch => Box::new(hotsearch::HotSearchWidget::new(
            config.hot_search.clone(),
            fetcher.clone(),
        )),
        WidgetId::Quote => Box::new(quote::QuoteWidget::new(
            config.quote.clone(),
            fetcher.clone(),
        )),
        WidgetId::Calendar => Box::new(calendar::CalendarWidget::new(
            config.calendar.clone(),
            fetcher.clone(),
        )),
    }
}

/// Fixed-period timer checked from `tick`
#[derive(Debug, Clone)]
pub struct Interval {
    period: Duration,
    last: Option<Instant>,
}

impl Interval {
    pub fn new(period: Duration) -> Self {
        Self { period, last: None }
    }

    /// True (and restarts) when the period has elapsed or it never fired
    pub fn due(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now.duration_since(last) < self.period => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }

    /// Restart the period from `now`
    pub fn reset(&mut self, now: Instant) {
        self.last = Some(now);
    }
}

/// Open a link in the default browser, logging failures
pub fn open_link(url: &str) {
    if url.is_empty() || url == "#" {
        return;
    }
    if let Err(e) = webbrowser::open(url) {
        tracing::warn!("Could not open {}: {}", url, e);
    }
}
