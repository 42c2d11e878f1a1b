//! Trending topics from weibo or baidu, re-polled on an interval

use chrono::{DateTime, Local};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::{
    layout::{Alignment, Constraint, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Paragraph, Row, Table},
    Frame,
};
use serde::Deserialize;
use serde_json::Value;
use std::time::{Duration, Instant};

use super::{open_link, Interval, Widget};
use crate::config::{HotSearchOptions, HotSource};
use crate::fetch::{display_value, Delivery, FetchError, Fetcher, RequestKind, RequestToken, Source};
use crate::layout::WidgetId;
use crate::ui::components::{
    accent, bg_selected, danger, header, hint_line, text, text_dim, warning, widget_block,
};

pub const ERROR_MESSAGE: &str = "无法加载热搜数据";
pub const ERROR_DETAILS: &str = "请检查网络连接或稍后重试";

#[derive(Debug, Clone, PartialEq)]
pub struct HotItem {
    pub index: String,
    pub title: String,
    pub hot: String,
    pub url: String,
}

#[derive(Debug, Deserialize)]
struct RawHotItem {
    #[serde(default)]
    index: Value,
    title: String,
    #[serde(default)]
    hot: Value,
    #[serde(default)]
    url: String,
}

#[derive(Debug, Deserialize)]
struct HotResponse {
    code: i64,
    data: Option<Vec<RawHotItem>>,
}

/// Accept `{code: 200, data: [...]}` and keep the first `max_items`
pub fn parse_hot_items(payload: Value, max_items: usize) -> Result<Vec<HotItem>, FetchError> {
    let response: HotResponse = serde_json::from_value(payload)?;
    match (response.code, response.data) {
        (200, Some(data)) => Ok(data
            .into_iter()
            .take(max_items)
            .enumerate()
            .map(|(i, raw)| HotItem {
                index: match raw.index {
                    Value::Null => (i + 1).to_string(),
                    v => display_value(&v),
                },
                title: raw.title,
                hot: display_value(&raw.hot),
                url: raw.url,
            })
            .collect()),
        _ => Err(FetchError::Api("Unexpected API response format".to_string())),
    }
}

fn source_title(source: HotSource) -> &'static str {
    match source {
        HotSource::Weibo => "微博热搜榜",
        HotSource::Baidu => "百度热搜榜",
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum HotState {
    Loading,
    Ready(Vec<HotItem>),
    Failed,
}

pub struct HotSearchWidget {
    options: HotSearchOptions,
    fetcher: Fetcher,
    source: HotSource,
    state: HotState,
    selected: usize,
    token: RequestToken,
    poll: Interval,
    disposed: bool,
}

impl HotSearchWidget {
    pub fn new(options: HotSearchOptions, fetcher: Fetcher) -> Self {
        let poll = Interval::new(Duration::from_secs(options.update_interval_secs.max(1)));
        Self {
            source: options.default_source,
            options,
            fetcher,
            state: HotState::Loading,
            selected: 0,
            token: RequestToken::default(),
            poll,
            disposed: false,
        }
    }

    pub fn source(&self) -> HotSource {
        self.source
    }

    pub fn state(&self) -> &HotState {
        &self.state
    }

    fn url(&self) -> &str {
        match self.source {
            HotSource::Weibo => self.options.weibo_url.as_str(),
            HotSource::Baidu => self.options.baidu_url.as_str(),
        }
    }

    pub fn fetch_hot_data(&mut self) {
        let generation = self.token.issue();
        self.fetcher.request(
            WidgetId::HotSearch,
            RequestKind::HotSearch,
            generation,
            Source::from_location(self.url()),
        );
    }

    pub fn switch_source(&mut self) {
        self.source = self.source.other();
        self.state = HotState::Loading;
        self.selected = 0;
        self.fetch_hot_data();
    }

    fn items(&self) -> &[HotItem] {
        match &self.state {
            HotState::Ready(items) => items,
            _ => &[],
        }
    }

    fn draw_error(&self, f: &mut Frame, area: Rect) {
        let lines = vec![
            Line::from(""),
            Line::from(Span::styled("⚠", Style::default().fg(warning()))),
            Line::from(Span::styled(ERROR_MESSAGE, Style::default().fg(danger()))),
            Line::from(Span::styled(ERROR_DETAILS, Style::default().fg(text_dim()))),
            Line::from(""),
            hint_line(&[("r", "重试")]),
        ];
        f.render_widget(Paragraph::new(lines).alignment(Alignment::Center), area);
    }
}

impl Widget for HotSearchWidget {
    fn id(&self) -> WidgetId {
        WidgetId::HotSearch
    }

    fn title(&self) -> String {
        source_title(self.source).to_string()
    }

    fn mount(&mut self) {
        self.fetch_hot_data();
        self.poll.reset(Instant::now());
    }

    fn refresh(&mut self) {
        self.fetch_hot_data();
        self.poll.reset(Instant::now());
    }

    fn dispose(&mut self) {
        self.disposed = true;
        self.token.invalidate();
    }

    fn tick(&mut self, _now: DateTime<Local>) {
        if !self.disposed && self.poll.due(Instant::now()) {
            self.fetch_hot_data();
        }
    }

    fn on_delivery(&mut self, delivery: Delivery) {
        if self.disposed || delivery.kind != RequestKind::HotSearch {
            return;
        }
        if !self.token.is_current(delivery.generation) {
            tracing::debug!("Dropping stale hot search #{}", delivery.generation);
            return;
        }

        match delivery
            .result
            .and_then(|v| parse_hot_items(v, self.options.max_items))
        {
            Ok(items) => {
                self.selected = self.selected.min(items.len().saturating_sub(1));
                self.state = HotState::Ready(items);
            }
            Err(e) => {
                tracing::error!("Fetch hot data failed: {}", e);
                self.state = HotState::Failed;
            }
        }
    }

    fn handle_key(&mut self, key: KeyEvent) -> bool {
        let len = self.items().len();
        match key.code {
            KeyCode::Char('s') => self.switch_source(),
            KeyCode::Char('r') => self.refresh(),
            KeyCode::Char('j') | KeyCode::Down if len > 0 => {
                self.selected = (self.selected + 1) % len;
            }
            KeyCode::Char('k') | KeyCode::Up if len > 0 => {
                self.selected = self.selected.checked_sub(1).unwrap_or(len - 1);
            }
            KeyCode::Enter => {
                if let Some(item) = self.items().get(self.selected) {
                    open_link(&item.url);
                }
            }
            _ => return false,
        }
        true
    }

    fn key_hints(&self) -> Vec<(&'static str, &'static str)> {
        let switch = match self.source {
            HotSource::Weibo => "切换百度",
            HotSource::Baidu => "切换微博",
        };
        vec![("s", switch), ("r", "刷新"), ("Enter", "打开")]
    }

    fn draw(&self, f: &mut Frame, area: Rect, focused: bool) {
        let block = widget_block(&self.title(), focused);
        let inner = block.inner(area);
        f.render_widget(block, area);

        let items = match &self.state {
            HotState::Loading => {
                f.render_widget(
                    Paragraph::new(Span::styled("加载中...", Style::default().fg(text_dim())))
                        .alignment(Alignment::Center),
                    inner,
                );
                return;
            }
            HotState::Failed => {
                self.draw_error(f, inner);
                return;
            }
            HotState::Ready(items) => items,
        };

        // Keep the selection in view
        let visible = inner.height as usize;
        let offset = (self.selected + 1).saturating_sub(visible);

        let rows: Vec<Row> = items
            .iter()
            .enumerate()
            .skip(offset)
            .take(visible)
            .map(|(i, item)| {
                let rank_style = if i < 3 {
                    Style::default().fg(danger()).add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(header())
                };
                let row_style = if focused && i == self.selected {
                    Style::default().bg(bg_selected())
                } else {
                    Style::default()
                };
                Row::new(vec![
                    Span::styled(item.index.clone(), rank_style),
                    Span::styled(item.title.clone(), Style::default().fg(text())),
                    Span::styled(item.hot.clone(), Style::default().fg(accent())),
                ])
                .style(row_style)
            })
            .collect();

        let table = Table::new(
            rows,
            [Constraint::Length(3), Constraint::Min(10), Constraint::Length(10)],
        );
        f.render_widget(table, inner);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_hot_items_truncates() {
        let payload = json!({
            "code": 200,
            "data": [
                {"index": 1, "title": "a", "hot": "100万", "url": "https://s.weibo.com/a"},
                {"index": 2, "title": "b", "hot": 98765, "url": "https://s.weibo.com/b"},
                {"title": "c"}
            ]
        });

        let items = parse_hot_items(payload.clone(), 2).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].hot, "100万");
        assert_eq!(items[1].hot, "98765");

        let all = parse_hot_items(payload, 50).unwrap();
        assert_eq!(all[2].index, "3");
        assert_eq!(all[2].url, "");
    }

    #[test]
    fn test_parse_rejects_bad_code() {
        assert!(parse_hot_items(json!({"code": 500, "data": []}), 50).is_err());
        assert!(parse_hot_items(json!({"code": 200}), 50).is_err());
        assert!(parse_hot_items(json!({"msg": "x"}), 50).is_err());
    }

    fn widget_with_urls(weibo: &str, baidu: &str) -> (HotSearchWidget, tokio::sync::mpsc::UnboundedReceiver<Delivery>) {
        let (fetcher, rx) = Fetcher::new().unwrap();
        let options = HotSearchOptions {
            weibo_url: weibo.to_string(),
            baidu_url: baidu.to_string(),
            ..HotSearchOptions::default()
        };
        (HotSearchWidget::new(options, fetcher), rx)
    }

    #[tokio::test]
    async fn test_failed_fetch_shows_retry_state() {
        let (mut widget, mut rx) = widget_with_urls("/nonexistent/weibo.json", "/nonexistent/baidu.json");
        widget.mount();
        widget.on_delivery(rx.recv().await.unwrap());
        assert_eq!(widget.state(), &HotState::Failed);

        // Retry issues a fresh request
        assert!(widget.handle_key(KeyEvent::from(KeyCode::Char('r'))));
        let retry = rx.recv().await.unwrap();
        assert_eq!(retry.generation, 2);
    }

    #[tokio::test]
    async fn test_switch_source_fetches_other_url() {
        let dir = tempfile::tempdir().unwrap();
        let baidu = dir.path().join("baidu.json");
        std::fs::write(
            &baidu,
            r#"{"code": 200, "data": [{"index": 1, "title": "百度一下", "hot": "4999999", "url": ""}]}"#,
        )
        .unwrap();

        let (mut widget, mut rx) = widget_with_urls("/nonexistent/weibo.json", baidu.to_str().unwrap());
        widget.mount();
        widget.switch_source();
        assert_eq!(widget.source(), HotSource::Baidu);
        assert_eq!(widget.title(), "百度热搜榜");

        // Whichever order they settle in, only the baidu result is current
        for _ in 0..2 {
            widget.on_delivery(rx.recv().await.unwrap());
        }
        match widget.state() {
            HotState::Ready(items) => assert_eq!(items[0].title, "百度一下"),
            other => panic!("unexpected state {:?}", other),
        }
    }
}
