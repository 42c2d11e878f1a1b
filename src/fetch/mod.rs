//! GET plumbing for the widgets.
//!
//! Requests run on the tokio runtime and report back over an mpsc channel
//! that the app drains on every tick, so widgets are only ever touched from
//! the UI task. Every request carries a generation number issued by the
//! widget's [`RequestToken`]; deliveries for an older generation are dropped
//! by the widget.

use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::layout::WidgetId;

/// Timeout for a single GET
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(8);

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("{0}")]
    Request(#[from] reqwest::Error),

    #[error("HTTP错误: {0}")]
    Status(u16),

    #[error("{path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Api(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    Cities,
    Weather,
    HotSearch,
    Quote,
    Holidays,
    NavCategories,
}

/// Where a JSON document comes from
#[derive(Debug, Clone, PartialEq)]
pub enum Source {
    Remote {
        url: String,
        query: Vec<(String, String)>,
    },
    Local(PathBuf),
}

impl Source {
    /// `http(s)://` locations are remote, anything else is a file path
    pub fn from_location(location: &str) -> Self {
        if location.starts_with("http://") || location.starts_with("https://") {
            Source::Remote {
                url: location.to_string(),
                query: Vec::new(),
            }
        } else {
            let path = location.strip_prefix("file://").unwrap_or(location);
            Source::Local(PathBuf::from(path))
        }
    }

    /// Add a query parameter. Ignored for local files.
    pub fn with_query(mut self, key: &str, value: impl Into<String>) -> Self {
        if let Source::Remote { query, .. } = &mut self {
            query.push((key.to_string(), value.into()));
        }
        self
    }
}

/// A finished request, routed back to the widget that issued it
#[derive(Debug)]
pub struct Delivery {
    pub widget: WidgetId,
    pub kind: RequestKind,
    pub generation: u64,
    pub result: Result<Value, FetchError>,
}

/// Per-kind generation counter
#[derive(Debug, Default, Clone)]
pub struct RequestToken {
    issued: u64,
}

impl RequestToken {
    /// Issue a new generation; every earlier one becomes stale
    pub fn issue(&mut self) -> u64 {
        self.issued += 1;
        self.issued
    }

    pub fn is_current(&self, generation: u64) -> bool {
        generation != 0 && generation == self.issued
    }

    /// Make every outstanding generation stale
    pub fn invalidate(&mut self) {
        self.issued += 1;
    }
}

#[derive(Clone)]
pub struct Fetcher {
    client: reqwest::Client,
    tx: UnboundedSender<Delivery>,
}

impl Fetcher {
    pub fn new() -> Result<(Self, UnboundedReceiver<Delivery>), FetchError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("startpage/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let (tx, rx) = mpsc::unbounded_channel();
        Ok((Self { client, tx }, rx))
    }

    /// Spawn a GET for `source`; the result arrives later as a [`Delivery`]
    pub fn request(&self, widget: WidgetId, kind: RequestKind, generation: u64, source: Source) {
        let client = self.client.clone();
        let tx = self.tx.clone();

        tracing::debug!("{:?} request {:?} #{} -> {:?}", widget, kind, generation, source);

        tokio::spawn(async move {
            let result = get_json(&client, &source).await;
            if let Err(e) = &result {
                tracing::warn!("{:?} request {:?} failed: {}", widget, kind, e);
            }

            let delivery = Delivery {
                widget,
                kind,
                generation,
                result,
            };
            if tx.send(delivery).is_err() {
                tracing::debug!("Dropping {:?} delivery, app is gone", kind);
            }
        });
    }
}

/// Non-2xx replies fail with the bare status code
fn check_status(status: reqwest::StatusCode) -> Result<(), FetchError> {
    if status.is_success() {
        Ok(())
    } else {
        Err(FetchError::Status(status.as_u16()))
    }
}

/// Fetch and parse one JSON document
pub async fn get_json(client: &reqwest::Client, source: &Source) -> Result<Value, FetchError> {
    match source {
        Source::Remote { url, query } => {
            let response = client.get(url).query(query).send().await?;
            check_status(response.status())?;
            Ok(response.json::<Value>().await?)
        }
        Source::Local(path) => {
            let content = tokio::fs::read_to_string(path)
                .await
                .map_err(|source| FetchError::Io {
                    path: path.display().to_string(),
                    source,
                })?;
            Ok(serde_json::from_str(&content)?)
        }
    }
}

/// Render a JSON scalar the way it reads in a template (strings unquoted)
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_from_location() {
        assert_eq!(
            Source::from_location("https://v2.xxapi.cn/api/weibohot"),
            Source::Remote {
                url: "https://v2.xxapi.cn/api/weibohot".to_string(),
                query: vec![],
            }
        );
        assert_eq!(
            Source::from_location("data/city.json"),
            Source::Local(PathBuf::from("data/city.json"))
        );
        assert_eq!(
            Source::from_location("file:///tmp/x.json"),
            Source::Local(PathBuf::from("/tmp/x.json"))
        );
    }

    #[test]
    fn test_query_only_applies_to_remote() {
        let local = Source::from_location("w.json").with_query("q", "Weihai");
        assert_eq!(local, Source::Local(PathBuf::from("w.json")));

        let remote = Source::from_location("https://example.com/w").with_query("q", "Weihai");
        match remote {
            Source::Remote { query, .. } => {
                assert_eq!(query, vec![("q".to_string(), "Weihai".to_string())])
            }
            _ => panic!("expected remote source"),
        }
    }

    #[test]
    fn test_request_token_marks_older_generations_stale() {
        let mut token = RequestToken::default();
        assert!(!token.is_current(0));

        let first = token.issue();
        assert!(token.is_current(first));

        let second = token.issue();
        assert!(!token.is_current(first));
        assert!(token.is_current(second));

        token.invalidate();
        assert!(!token.is_current(second));
    }

    #[test]
    fn test_display_value() {
        assert_eq!(display_value(&serde_json::json!("热")), "热");
        assert_eq!(display_value(&serde_json::json!(12345)), "12345");
        assert_eq!(display_value(&Value::Null), "");
    }

    #[tokio::test]
    async fn test_local_fetch_delivers_parsed_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");
        std::fs::write(&path, r#"{"code": 200}"#).unwrap();

        let (fetcher, mut rx) = Fetcher::new().unwrap();
        fetcher.request(
            WidgetId::HotSearch,
            RequestKind::HotSearch,
            7,
            Source::Local(path),
        );

        let delivery = rx.recv().await.unwrap();
        assert_eq!(delivery.widget, WidgetId::HotSearch);
        assert_eq!(delivery.generation, 7);
        assert_eq!(delivery.result.unwrap()["code"], 200);
    }

    #[test]
    fn test_error_status_reports_code() {
        assert!(check_status(reqwest::StatusCode::OK).is_ok());

        let err = check_status(reqwest::StatusCode::NOT_FOUND).unwrap_err();
        assert!(matches!(err, FetchError::Status(404)));
        assert_eq!(err.to_string(), "HTTP错误: 404");
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let client = reqwest::Client::new();
        let result = get_json(&client, &Source::Local(PathBuf::from("/nonexistent/x.json"))).await;
        assert!(matches!(result, Err(FetchError::Io { .. })));
    }
}
