//! Widget identities and the persisted mount order of the dashboard grid

use crate::store::{SettingsStore, StoreError, WIDGET_ORDER_KEY};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WidgetId {
    Clock,
    WorkTime,
    Weather,
    Shortcuts,
    HotSearch,
    Quote,
    Calendar,
}

impl WidgetId {
    pub const ALL: [WidgetId; 7] = [
        WidgetId::Clock,
        WidgetId::WorkTime,
        WidgetId::Weather,
        WidgetId::Shortcuts,
        WidgetId::HotSearch,
        WidgetId::Quote,
        WidgetId::Calendar,
    ];

    /// Stable container id, also the persisted form
    pub fn container_id(self) -> &'static str {
        match self {
            WidgetId::Clock => "clockContainer",
            WidgetId::WorkTime => "workTimeContainer",
            WidgetId::Weather => "weatherContainer",
            WidgetId::Shortcuts => "shortcutContainer",
            WidgetId::HotSearch => "hotPointContainer",
            WidgetId::Quote => "quoteContainer",
            WidgetId::Calendar => "calendarContainer",
        }
    }

    pub fn from_container_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|w| w.container_id() == id)
    }
}

/// Ordered container ids, rewritten wholesale on every reorder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetOrder {
    ids: Vec<WidgetId>,
}

impl Default for WidgetOrder {
    fn default() -> Self {
        Self {
            ids: WidgetId::ALL.to_vec(),
        }
    }
}

impl WidgetOrder {
    /// Build an order from container ids. Unknown and duplicate ids are
    /// dropped, widgets missing from the list are appended in default order.
    pub fn from_container_ids<S: AsRef<str>>(ids: &[S]) -> Self {
        let mut order: Vec<WidgetId> = Vec::with_capacity(WidgetId::ALL.len());

        for id in ids {
            match WidgetId::from_container_id(id.as_ref()) {
                Some(widget) if !order.contains(&widget) => order.push(widget),
                Some(_) => {}
                None => tracing::warn!("Container {} not found, skipping", id.as_ref()),
            }
        }

        for widget in WidgetId::ALL {
            if !order.contains(&widget) {
                order.push(widget);
            }
        }

        Self { ids: order }
    }

    /// Load the persisted order, or the default one
    pub fn load(store: &dyn SettingsStore) -> Self {
        let Some(raw) = store.get(WIDGET_ORDER_KEY) else {
            return Self::default();
        };

        match serde_json::from_str::<Vec<String>>(&raw) {
            Ok(ids) => Self::from_container_ids(&ids),
            Err(e) => {
                tracing::warn!("Failed to parse saved widget order: {}", e);
                Self::default()
            }
        }
    }

    pub fn save(&self, store: &dyn SettingsStore) -> Result<(), StoreError> {
        let json = serde_json::to_string(&self.container_ids())?;
        store.set(WIDGET_ORDER_KEY, &json)
    }

    pub fn container_ids(&self) -> Vec<&'static str> {
        self.ids.iter().map(|w| w.container_id()).collect()
    }

    pub fn widgets(&self) -> &[WidgetId] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Move the widget at `index` by `delta` slots (clamped to the ends).
    /// Returns the new index.
    pub fn shift(&mut self, index: usize, delta: isize) -> usize {
        if index >= self.ids.len() {
            return index;
        }
        let target = (index as isize + delta).clamp(0, self.ids.len() as isize - 1) as usize;
        let widget = self.ids.remove(index);
        self.ids.insert(target, widget);
        target
    }
}
