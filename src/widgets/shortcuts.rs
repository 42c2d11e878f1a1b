//! Fixed shortcuts plus the category/nav links from `nav.json`

use crossterm::event::{KeyCode, KeyEvent};
use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};
use serde::Deserialize;
use serde_json::Value;

use super::{open_link, Widget};
use crate::config::ShortcutOptions;
use crate::fetch::{Delivery, FetchError, Fetcher, RequestKind, RequestToken, Source};
use crate::layout::WidgetId;
use crate::ui::components::{accent_bright, bg_selected, header, text, widget_block};

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NavItem {
    pub name: String,
    pub target: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NavCategory {
    pub id: String,
    #[serde(default)]
    pub index: i64,
    #[serde(default)]
    pub children: Vec<NavItem>,
}

/// Categories sorted by their `index`
pub fn parse_categories(payload: Value) -> Result<Vec<NavCategory>, FetchError> {
    let mut categories: Vec<NavCategory> = serde_json::from_value(payload)?;
    categories.sort_by_key(|c| c.index);
    Ok(categories)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    pub label: String,
    pub url: String,
    pub section: Option<String>,
}

pub struct ShortcutWidget {
    options: ShortcutOptions,
    fetcher: Fetcher,
    links: Vec<Link>,
    selected: usize,
    token: RequestToken,
    disposed: bool,
}

impl ShortcutWidget {
    pub fn new(options: ShortcutOptions, fetcher: Fetcher) -> Self {
        let mut widget = Self {
            options,
            fetcher,
            links: Vec::new(),
            selected: 0,
            token: RequestToken::default(),
            disposed: false,
        };
        widget.rebuild(&[]);
        widget
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    fn rebuild(&mut self, categories: &[NavCategory]) {
        self.links = self
            .options
            .shortcuts
            .iter()
            .map(|s| Link {
                label: s.label.clone(),
                url: s.url.clone(),
                section: None,
            })
            .collect();

        for category in categories {
            self.links.extend(category.children.iter().map(|item| Link {
                label: item.name.clone(),
                url: item.target.clone(),
                section: Some(category.id.clone()),
            }));
        }

        self.selected = self.selected.min(self.links.len().saturating_sub(1));
    }

    fn load_nav(&mut self) {
        let generation = self.token.issue();
        self.fetcher.request(
            WidgetId::Shortcuts,
            RequestKind::NavCategories,
            generation,
            Source::from_location(&self.options.nav_path),
        );
    }
}

impl Widget for ShortcutWidget {
    fn id(&self) -> WidgetId {
        WidgetId::Shortcuts
    }

    fn title(&self) -> String {
        "快捷方式".to_string()
    }

    fn mount(&mut self) {
        self.load_nav();
    }

    fn refresh(&mut self) {
        self.load_nav();
    }

    fn dispose(&mut self) {
        self.disposed = true;
        self.token.invalidate();
    }

    fn on_delivery(&mut self, delivery: Delivery) {
        if self.disposed || !self.token.is_current(delivery.generation) {
            return;
        }
        match delivery.result.and_then(parse_categories) {
            Ok(categories) => self.rebuild(&categories),
            Err(e) => tracing::error!("Failed to load nav data: {}", e),
        }
    }

    fn handle_key(&mut self, key: KeyEvent) -> bool {
        let len = self.links.len();
        if len == 0 {
            return false;
        }
        match key.code {
            KeyCode::Char('j') | KeyCode::Down => self.selected = (self.selected + 1) % len,
            KeyCode::Char('k') | KeyCode::Up => {
                self.selected = self.selected.checked_sub(1).unwrap_or(len - 1)
            }
            KeyCode::Enter => open_link(&self.links[self.selected].url),
            _ => return false,
        }
        true
    }

    fn key_hints(&self) -> Vec<(&'static str, &'static str)> {
        vec![("j/k", "选择"), ("Enter", "打开")]
    }

    fn draw(&self, f: &mut Frame, area: Rect, focused: bool) {
        let block = widget_block(&self.title(), focused);
        let inner = block.inner(area);
        f.render_widget(block, area);

        let mut lines = Vec::new();
        let mut selected_line = 0;
        let mut section: Option<&str> = None;

        for (i, link) in self.links.iter().enumerate() {
            if link.section.as_deref() != section {
                section = link.section.as_deref();
                if let Some(name) = section {
                    lines.push(Line::from(Span::styled(
                        format!("── {} ──", name),
                        Style::default().fg(header()).add_modifier(Modifier::BOLD),
                    )));
                }
            }
            let style = if focused && i == self.selected {
                selected_line = lines.len();
                Style::default().fg(text()).bg(bg_selected())
            } else {
                Style::default().fg(text())
            };
            lines.push(Line::from(vec![
                Span::styled(format!(" {} ", link.label), style),
                Span::styled(format!(" {}", link.url), Style::default().fg(accent_bright())),
            ]));
        }

        let scroll = (selected_line + 1).saturating_sub(inner.height as usize) as u16;
        f.render_widget(Paragraph::new(lines).scroll((scroll, 0)), inner);
    }
}
