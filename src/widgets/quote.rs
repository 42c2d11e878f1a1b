use crossterm::event::{KeyCode, KeyEvent};
use ratatui::{
    layout::{Alignment, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Paragraph, Wrap},
    Frame,
};
use serde::Deserialize;
use serde_json::Value;

use super::Widget;
use crate::config::QuoteOptions;
use crate::fetch::{Delivery, FetchError, Fetcher, RequestKind, RequestToken, Source};
use crate::layout::WidgetId;
use crate::ui::components::{text, text_dim, widget_block};

#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    pub text: String,
    pub from: String,
}

#[derive(Debug, Deserialize)]
struct Hitokoto {
    hitokoto: String,
    #[serde(default)]
    from: Option<String>,
    #[serde(default)]
    from_who: Option<String>,
}

/// Parse a hitokoto payload: `{hitokoto, from, from_who}`
pub fn parse_quote(payload: Value) -> Result<Quote, FetchError> {
    let raw: Hitokoto = serde_json::from_value(payload)?;
    if raw.hitokoto.trim().is_empty() {
        return Err(FetchError::Api("empty quote".to_string()));
    }

    let from = match (raw.from_who.filter(|w| !w.is_empty()), raw.from.filter(|f| !f.is_empty())) {
        (Some(who), Some(from)) => format!("{}《{}》", who, from),
        (Some(who), None) => who,
        (None, Some(from)) => format!("《{}》", from),
        (None, None) => String::new(),
    };

    Ok(Quote {
        text: raw.hitokoto,
        from,
    })
}

#[derive(Debug, Clone, PartialEq)]
pub enum QuoteState {
    Loading,
    Ready(Quote),
    Fallback,
}

pub struct QuoteWidget {
    options: QuoteOptions,
    fetcher: Fetcher,
    state: QuoteState,
    token: RequestToken,
    disposed: bool,
}

impl QuoteWidget {
    pub fn new(options: QuoteOptions, fetcher: Fetcher) -> Self {
        Self {
            options,
            fetcher,
            state: QuoteState::Loading,
            token: RequestToken::default(),
            disposed: false,
        }
    }

    pub fn state(&self) -> &QuoteState {
        &self.state
    }

    /// The quote currently on screen, fallback included
    pub fn displayed(&self) -> Option<Quote> {
        match &self.state {
            QuoteState::Loading => None,
            QuoteState::Ready(quote) => Some(quote.clone()),
            QuoteState::Fallback => Some(Quote {
                text: self.options.fallback_text.clone(),
                from: format!("《{}》", self.options.fallback_from),
            }),
        }
    }

    fn fetch_quote(&mut self) {
        let generation = self.token.issue();
        self.fetcher.request(
            WidgetId::Quote,
            RequestKind::Quote,
            generation,
            Source::from_location(&self.options.endpoint),
        );
    }
}

impl Widget for QuoteWidget {
    fn id(&self) -> WidgetId {
        WidgetId::Quote
    }

    fn title(&self) -> String {
        "每日一言".to_string()
    }

    fn mount(&mut self) {
        self.fetch_quote();
    }

    fn refresh(&mut self) {
        self.fetch_quote();
    }

    fn dispose(&mut self) {
        self.disposed = true;
        self.token.invalidate();
    }

    fn on_delivery(&mut self, delivery: Delivery) {
        if self.disposed || !self.token.is_current(delivery.generation) {
            return;
        }
        self.state = match delivery.result.and_then(parse_quote) {
            Ok(quote) => QuoteState::Ready(quote),
            Err(e) => {
                tracing::error!("Failed to load quote: {}", e);
                QuoteState::Fallback
            }
        };
    }

    fn handle_key(&mut self, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Char('r') => {
                self.refresh();
                true
            }
            _ => false,
        }
    }

    fn key_hints(&self) -> Vec<(&'static str, &'static str)> {
        vec![("r", "换一句")]
    }

    fn draw(&self, f: &mut Frame, area: Rect, focused: bool) {
        let block = widget_block(&self.title(), focused);

        let lines = match self.displayed() {
            None => vec![Line::from(Span::styled("加载中...", Style::default().fg(text_dim())))],
            Some(quote) => {
                let mut lines = vec![
                    Line::from(""),
                    Line::from(Span::styled(
                        quote.text,
                        Style::default().fg(text()).add_modifier(Modifier::ITALIC),
                    )),
                ];
                if !quote.from.is_empty() {
                    lines.push(Line::from(""));
                    lines.push(
                        Line::from(Span::styled(format!("—— {}", quote.from), Style::default().fg(text_dim())))
                            .alignment(Alignment::Right),
                    );
                }
                lines
            }
        };

        let paragraph = Paragraph::new(lines)
            .block(block)
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true });
        f.render_widget(paragraph, area);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_quote_attribution() {
        let quote = parse_quote(json!({"hitokoto": "知行合一", "from": "传习录", "from_who": "王阳明"})).unwrap();
        assert_eq!(quote.from, "王阳明《传习录》");

        let quote = parse_quote(json!({"hitokoto": "x", "from": "y", "from_who": null})).unwrap();
        assert_eq!(quote.from, "《y》");

        let quote = parse_quote(json!({"hitokoto": "x"})).unwrap();
        assert_eq!(quote.from, "");
    }

    #[test]
    fn test_parse_quote_rejects_empty() {
        assert!(parse_quote(json!({"hitokoto": "  "})).is_err());
        assert!(parse_quote(json!({"text": "x"})).is_err());
    }

    #[tokio::test]
    async fn test_failed_fetch_shows_fallback() {
        let (fetcher, mut rx) = Fetcher::new().unwrap();
        let options = QuoteOptions {
            endpoint: "/nonexistent/quote.json".to_string(),
            ..QuoteOptions::default()
        };
        let mut widget = QuoteWidget::new(options.clone(), fetcher);
        widget.mount();
        assert_eq!(widget.displayed(), None);

        widget.on_delivery(rx.recv().await.unwrap());
        assert_eq!(widget.state(), &QuoteState::Fallback);
        assert_eq!(widget.displayed().unwrap().text, options.fallback_text);
    }
}
