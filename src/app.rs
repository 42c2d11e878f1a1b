use anyhow::Result;
use chrono::Local;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::time::Instant;
use tokio::sync::mpsc::{error::TryRecvError, UnboundedReceiver};

use crate::config::AppConfig;
use crate::fetch::{Delivery, Fetcher};
use crate::layout::WidgetOrder;
use crate::store::SharedStore;
use crate::widgets::{self, Widget};

/// Status messages clear after this many seconds
const STATUS_TIMEOUT_SECS: u64 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Popup {
    None,
    Help,
}

pub struct App {
    pub popup: Popup,
    pub config: AppConfig,

    // Widgets in display order, one per grid cell
    pub widgets: Vec<Box<dyn Widget>>,
    pub order: WidgetOrder,
    pub focused: usize,

    // Status message (shown in info line, auto-clears after timeout)
    pub status_message: Option<String>,
    pub status_message_time: Option<Instant>,

    store: SharedStore,
    deliveries: UnboundedReceiver<Delivery>,
}

impl App {
    /// Layout bootstrap: read the persisted order and mount one widget per
    /// container in that order. Must be called inside a tokio runtime.
    pub fn new(config: AppConfig, store: SharedStore) -> Result<Self> {
        let (fetcher, deliveries) = Fetcher::new()?;
        let order = WidgetOrder::load(store.as_ref());

        let mut widgets: Vec<Box<dyn Widget>> = Vec::with_capacity(order.len());
        for id in order.widgets() {
            let mut widget = widgets::build(*id, &config, &fetcher, &store);
            widget.mount();
            tracing::info!("Mounted {:?} into {}", id, id.container_id());
            widgets.push(widget);
        }

        Ok(Self {
            popup: Popup::None,
            config,
            widgets,
            order,
            focused: 0,
            status_message: None,
            status_message_time: None,
            store,
            deliveries,
        })
    }

    fn set_status(&mut self, msg: impl Into<String>) {
        self.status_message = Some(msg.into());
        self.status_message_time = Some(Instant::now());
    }

    pub fn focused_widget(&self) -> Option<&dyn Widget> {
        self.widgets.get(self.focused).map(|w| w.as_ref())
    }

    /// True while the focused widget is editing text; global keys are off
    pub fn captures_input(&self) -> bool {
        self.focused_widget().is_some_and(|w| w.captures_input())
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> Result<()> {
        if self.popup == Popup::Help {
            if matches!(key.code, KeyCode::Esc | KeyCode::Char('?') | KeyCode::Enter | KeyCode::Char('q')) {
                self.popup = Popup::None;
            }
            return Ok(());
        }

        if self.captures_input() {
            if let Some(widget) = self.widgets.get_mut(self.focused) {
                widget.handle_key(key);
            }
            return Ok(());
        }

        let shift = key.modifiers.contains(KeyModifiers::SHIFT);
        match key.code {
            KeyCode::Tab => self.focus_next(),
            KeyCode::BackTab => self.focus_prev(),
            KeyCode::Left if shift => self.move_focused(-1),
            KeyCode::Right if shift => self.move_focused(1),
            KeyCode::Char('<') => self.move_focused(-1),
            KeyCode::Char('>') => self.move_focused(1),
            KeyCode::Char('?') => self.popup = Popup::Help,
            KeyCode::Char('R') => self.refresh_all(),
            _ => {
                if let Some(widget) = self.widgets.get_mut(self.focused) {
                    widget.handle_key(key);
                }
            }
        }
        Ok(())
    }

    fn focus_next(&mut self) {
        if !self.widgets.is_empty() {
            self.focused = (self.focused + 1) % self.widgets.len();
        }
    }

    fn focus_prev(&mut self) {
        if !self.widgets.is_empty() {
            self.focused = self.focused.checked_sub(1).unwrap_or(self.widgets.len() - 1);
        }
    }

    /// Move the focused widget and persist the new order
    pub fn move_focused(&mut self, delta: isize) {
        let target = self.order.shift(self.focused, delta);
        if target == self.focused {
            return;
        }

        let widget = self.widgets.remove(self.focused);
        self.widgets.insert(target, widget);
        self.focused = target;

        match self.order.save(self.store.as_ref()) {
            Ok(()) => self.set_status("布局已保存"),
            Err(e) => {
                tracing::error!("Failed to save widget order: {}", e);
                self.set_status(format!("保存布局失败: {}", e));
            }
        }
    }

    pub fn refresh_all(&mut self) {
        for widget in &mut self.widgets {
            widget.refresh();
        }
        self.set_status("已刷新");
    }

    /// Route finished requests to their widgets
    fn drain_deliveries(&mut self) {
        loop {
            match self.deliveries.try_recv() {
                Ok(delivery) => {
                    match self.widgets.iter_mut().find(|w| w.id() == delivery.widget) {
                        Some(widget) => widget.on_delivery(delivery),
                        None => tracing::warn!("No widget for {:?} delivery", delivery.widget),
                    }
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
    }

    pub fn tick(&mut self) {
        self.drain_deliveries();

        let now = Local::now();
        for widget in &mut self.widgets {
            widget.tick(now);
        }

        // Clear status message after timeout
        if let Some(time) = self.status_message_time {
            if time.elapsed().as_secs() >= STATUS_TIMEOUT_SECS {
                self.status_message = None;
                self.status_message_time = None;
            }
        }
    }

    pub fn shutdown(&mut self) {
        for widget in &mut self.widgets {
            widget.dispose();
        }
        tracing::info!("Disposed {} widgets", self.widgets.len());
    }
}
