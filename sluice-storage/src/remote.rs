//! Remote document store client.
//!
//! Batches go out as one REST call; the collection feed arrives over a
//! WebSocket that reconnects with jittered exponential backoff.

use crate::{RecordStore, Snapshot, Subscription};
use ::async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sluice_core::{
    CollectionId, ConfigError, RawDocument, RecordId, RecordWrite, Revision, SluiceResult,
    StorageError,
};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::Message;

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Credentials sent with every REST call and WebSocket handshake.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    pub api_key: Option<String>,
    pub bearer_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReconnectConfig {
    pub initial_ms: u64,
    pub max_ms: u64,
    pub multiplier: f64,
    pub jitter_ms: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_ms: 500,
            max_ms: 15_000,
            multiplier: 2.0,
            jitter_ms: 250,
        }
    }
}

impl ReconnectConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.initial_ms == 0 {
            return Err(invalid("reconnect.initial_ms", "must be > 0"));
        }
        if self.max_ms < self.initial_ms {
            return Err(invalid("reconnect.max_ms", "must be >= reconnect.initial_ms"));
        }
        if self.multiplier.is_nan() || self.multiplier < 1.0 {
            return Err(invalid("reconnect.multiplier", "must be >= 1.0"));
        }
        Ok(())
    }

    fn next_backoff(&self, current_ms: u64) -> u64 {
        let next = (current_ms as f64 * self.multiplier) as u64;
        next.min(self.max_ms)
    }
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RemoteStoreConfig {
    pub api_base_url: String,
    pub ws_endpoint: String,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default)]
    pub reconnect: ReconnectConfig,
}

impl RemoteStoreConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let base = self.api_base_url.trim();
        if base.is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "store.api_base_url".to_string(),
            });
        }
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(invalid("store.api_base_url", "must start with http:// or https://"));
        }
        let ws = self.ws_endpoint.trim();
        if ws.is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "store.ws_endpoint".to_string(),
            });
        }
        if !(ws.starts_with("ws://") || ws.starts_with("wss://")) {
            return Err(invalid("store.ws_endpoint", "must start with ws:// or wss://"));
        }
        if self.request_timeout_ms == 0 {
            return Err(invalid("store.request_timeout_ms", "must be > 0"));
        }
        self.reconnect.validate()
    }
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

// ============================================================================
// WIRE FORMAT
// ============================================================================

#[derive(Debug, Serialize)]
struct BatchRequest<'a> {
    writes: Vec<WireWrite<'a>>,
}

#[derive(Debug, Serialize)]
struct WireWrite<'a> {
    id: &'a RecordId,
    fields: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct BatchResponse {
    revision: Revision,
}

/// Frames pushed by the realtime gateway.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ServerFrame {
    Snapshot {
        revision: Revision,
        #[serde(default)]
        documents: Vec<RawDocument>,
    },
    Error {
        message: String,
    },
}

// ============================================================================
// CLIENT
// ============================================================================

#[derive(Clone)]
pub struct RemoteRecordStore {
    client: reqwest::Client,
    base_url: String,
    ws_endpoint: String,
    auth: AuthConfig,
    auth_header: HeaderMap,
    request_timeout: Duration,
    reconnect: ReconnectConfig,
}

impl RemoteRecordStore {
    pub fn new(config: &RemoteStoreConfig) -> SluiceResult<Self> {
        config.validate()?;
        let request_timeout = Duration::from_millis(config.request_timeout_ms);
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| StorageError::Transport {
                reason: e.to_string(),
            })?;
        let auth_header = build_auth_headers(&config.auth)?;

        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            ws_endpoint: config.ws_endpoint.clone(),
            auth: config.auth.clone(),
            auth_header,
            request_timeout,
            reconnect: config.reconnect.clone(),
        })
    }

    fn batch_url(&self, collection: &CollectionId) -> String {
        format!("{}/v1/collections/{}/batch", self.base_url, collection)
    }

    fn feed_url(&self, collection: &CollectionId) -> SluiceResult<String> {
        let mut url = reqwest::Url::parse(&self.ws_endpoint).map_err(|e| {
            ConfigError::InvalidValue {
                field: "store.ws_endpoint".to_string(),
                reason: e.to_string(),
            }
        })?;
        url.query_pairs_mut()
            .append_pair("collection", collection.as_str());
        Ok(url.to_string())
    }
}

#[async_trait]
impl RecordStore for RemoteRecordStore {
    async fn subscribe(&self, collection: &CollectionId) -> SluiceResult<Subscription> {
        let feed = FeedConnector {
            url: self.feed_url(collection)?,
            auth: self.auth.clone(),
            collection: collection.clone(),
            reconnect: self.reconnect.clone(),
        };
        let (sender, mut receiver) = watch::channel(Arc::new(Snapshot::default()));
        let task = tokio::spawn(run_feed(feed, sender));
        let feeder = task.abort_handle();

        match tokio::time::timeout(self.request_timeout, receiver.changed()).await {
            Ok(Ok(())) => Ok(Subscription::with_feeder(receiver, feeder)),
            Ok(Err(_)) => {
                feeder.abort();
                Err(StorageError::SubscriptionClosed.into())
            }
            Err(_) => {
                feeder.abort();
                Err(StorageError::Transport {
                    reason: format!(
                        "no snapshot for {} within {}ms",
                        collection,
                        self.request_timeout.as_millis()
                    ),
                }
                .into())
            }
        }
    }

    async fn batch_write(
        &self,
        collection: &CollectionId,
        writes: Vec<RecordWrite>,
    ) -> SluiceResult<Revision> {
        if writes.is_empty() {
            return Err(StorageError::BatchRejected {
                reason: "empty batch".to_string(),
            }
            .into());
        }

        let body = BatchRequest {
            writes: writes
                .iter()
                .map(|w| WireWrite {
                    id: &w.id,
                    fields: w.patch.to_fields(),
                })
                .collect(),
        };

        let response = self
            .client
            .post(self.batch_url(collection))
            .headers(self.auth_header.clone())
            .json(&body)
            .send()
            .await
            .map_err(|e| StorageError::Transport {
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            tracing::warn!(
                collection = %collection,
                status = status.as_u16(),
                "Batch write rejected by store"
            );
            return Err(StorageError::BatchRejected {
                reason: format!("HTTP {}: {}", status.as_u16(), text),
            }
            .into());
        }

        let committed: BatchResponse = response.json().await.map_err(|e| StorageError::Decode {
            reason: e.to_string(),
        })?;
        tracing::debug!(
            collection = %collection,
            writes = writes.len(),
            revision = %committed.revision,
            "Batch committed"
        );
        Ok(committed.revision)
    }
}

fn build_auth_headers(auth: &AuthConfig) -> Result<HeaderMap, ConfigError> {
    let mut headers = HeaderMap::new();
    if let Some(api_key) = &auth.api_key {
        headers.insert(
            HeaderName::from_static("x-api-key"),
            HeaderValue::from_str(api_key).map_err(|e| ConfigError::InvalidValue {
                field: "store.auth.api_key".to_string(),
                reason: e.to_string(),
            })?,
        );
    }
    if let Some(token) = &auth.bearer_token {
        let value = format!("Bearer {}", token);
        headers.insert(
            HeaderName::from_static("authorization"),
            HeaderValue::from_str(&value).map_err(|e| ConfigError::InvalidValue {
                field: "store.auth.bearer_token".to_string(),
                reason: e.to_string(),
            })?,
        );
    }
    Ok(headers)
}

// ============================================================================
// REALTIME FEED
// ============================================================================

struct FeedConnector {
    url: String,
    auth: AuthConfig,
    collection: CollectionId,
    reconnect: ReconnectConfig,
}

type FeedStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

impl FeedConnector {
    async fn connect(&self) -> Result<FeedStream, StorageError> {
        let mut request =
            self.url
                .as_str()
                .into_client_request()
                .map_err(|e| StorageError::Transport {
                    reason: e.to_string(),
                })?;
        let headers = request.headers_mut();
        if let Some(api_key) = &self.auth.api_key {
            if let Ok(value) = api_key.parse() {
                headers.insert("x-api-key", value);
            }
        }
        if let Some(token) = &self.auth.bearer_token {
            if let Ok(value) = format!("Bearer {}", token).parse() {
                headers.insert("authorization", value);
            }
        }
        let (stream, _) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| StorageError::Transport {
                reason: e.to_string(),
            })?;
        Ok(stream)
    }
}

async fn run_feed(feed: FeedConnector, sender: watch::Sender<Arc<Snapshot>>) {
    let mut backoff = feed.reconnect.initial_ms;
    loop {
        match feed.connect().await {
            Ok(mut stream) => {
                tracing::info!(collection = %feed.collection, "Realtime feed connected");
                backoff = feed.reconnect.initial_ms;

                while let Some(message) = stream.next().await {
                    match message {
                        Ok(Message::Text(text)) => match serde_json::from_str::<ServerFrame>(&text) {
                            Ok(ServerFrame::Snapshot {
                                revision,
                                documents,
                            }) => {
                                tracing::debug!(
                                    collection = %feed.collection,
                                    revision = %revision,
                                    documents = documents.len(),
                                    "Snapshot received"
                                );
                                sender.send_replace(Arc::new(Snapshot::new(revision, documents)));
                            }
                            Ok(ServerFrame::Error { message }) => {
                                tracing::warn!(collection = %feed.collection, message = %message, "Realtime gateway error");
                            }
                            Err(err) => {
                                tracing::warn!(collection = %feed.collection, error = %err, "Failed to decode realtime frame");
                            }
                        },
                        Ok(Message::Close(_)) => break,
                        Ok(_) => {}
                        Err(err) => {
                            tracing::warn!(collection = %feed.collection, error = %err, "Realtime feed error");
                            break;
                        }
                    }
                }
                tracing::info!(collection = %feed.collection, "Realtime feed disconnected");
            }
            Err(err) => {
                tracing::warn!(
                    collection = %feed.collection,
                    error = %err,
                    retry_ms = backoff,
                    "Realtime feed connect failed"
                );
            }
        }

        if sender.is_closed() {
            return;
        }
        let delay = jittered_backoff(backoff, feed.reconnect.jitter_ms);
        tokio::time::sleep(Duration::from_millis(delay)).await;
        backoff = feed.reconnect.next_backoff(backoff);
    }
}

fn jittered_backoff(base_ms: u64, jitter_ms: u64) -> u64 {
    if jitter_ms == 0 {
        return base_ms;
    }
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_nanos(0))
        .subsec_nanos() as u64;
    base_ms.saturating_add(nanos % jitter_ms)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use futures_util::SinkExt;
    use sluice_core::{RecordPatch, SluiceError, Stage};
    use tokio::net::TcpListener;

    fn config(base: &str, ws: &str) -> RemoteStoreConfig {
        RemoteStoreConfig {
            api_base_url: base.to_string(),
            ws_endpoint: ws.to_string(),
            auth: AuthConfig::default(),
            request_timeout_ms: 500,
            reconnect: ReconnectConfig {
                initial_ms: 20,
                max_ms: 100,
                multiplier: 2.0,
                jitter_ms: 0,
            },
        }
    }

    #[test]
    fn test_validate_rejects_bad_urls() {
        let cfg = config("", "ws://localhost/feed");
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::MissingRequired { .. })
        ));

        let cfg = config("ftp://example", "ws://localhost/feed");
        assert!(matches!(cfg.validate(), Err(ConfigError::InvalidValue { .. })));

        let cfg = config("http://localhost", "http://localhost/feed");
        match cfg.validate() {
            Err(ConfigError::InvalidValue { field, .. }) => assert_eq!(field, "store.ws_endpoint"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_validate_reconnect_bounds() {
        let mut cfg = config("http://localhost", "ws://localhost/feed");
        cfg.reconnect.max_ms = 1;
        assert!(cfg.validate().is_err());

        let mut cfg = config("http://localhost", "ws://localhost/feed");
        cfg.reconnect.multiplier = 0.5;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_config_defaults() {
        let cfg: RemoteStoreConfig = serde_json::from_str(
            r#"{"api_base_url":"https://api.test","ws_endpoint":"wss://rt.test/feed"}"#,
        )
        .unwrap();
        assert_eq!(cfg.request_timeout_ms, 10_000);
        assert_eq!(cfg.reconnect, ReconnectConfig::default());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_urls() {
        let store =
            RemoteRecordStore::new(&config("https://api.test/", "wss://rt.test/feed")).unwrap();
        let collection = CollectionId::new("merchants");
        assert_eq!(
            store.batch_url(&collection),
            "https://api.test/v1/collections/merchants/batch"
        );
        assert_eq!(
            store.feed_url(&collection).unwrap(),
            "wss://rt.test/feed?collection=merchants"
        );
    }

    #[test]
    fn test_auth_headers() {
        let headers = build_auth_headers(&AuthConfig {
            api_key: Some("k-123".into()),
            bearer_token: Some("tok".into()),
        })
        .unwrap();
        assert_eq!(headers["x-api-key"], "k-123");
        assert_eq!(headers["authorization"], "Bearer tok");

        let err = build_auth_headers(&AuthConfig {
            api_key: Some("bad\nkey".into()),
            bearer_token: None,
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_backoff() {
        assert_eq!(jittered_backoff(100, 0), 100);
        let jittered = jittered_backoff(100, 50);
        assert!((100..150).contains(&jittered));

        let reconnect = ReconnectConfig {
            initial_ms: 100,
            max_ms: 300,
            multiplier: 2.0,
            jitter_ms: 0,
        };
        assert_eq!(reconnect.next_backoff(100), 200);
        assert_eq!(reconnect.next_backoff(200), 300);
    }

    #[test]
    fn test_decode_frames() {
        let frame: ServerFrame = serde_json::from_str(
            r#"{"type":"snapshot","revision":3,"documents":[{"id":"a","fields":{"stage":"offer"}}]}"#,
        )
        .unwrap();
        match frame {
            ServerFrame::Snapshot {
                revision,
                documents,
            } => {
                assert_eq!(revision, Revision(3));
                assert_eq!(documents[0].id, RecordId::new("a"));
            }
            other => panic!("unexpected {:?}", other),
        }

        let frame: ServerFrame =
            serde_json::from_str(r#"{"type":"error","message":"denied"}"#).unwrap();
        assert!(matches!(frame, ServerFrame::Error { .. }));
    }

    #[test]
    fn test_batch_body_shape() {
        let write = RecordWrite {
            id: RecordId::new("a"),
            patch: RecordPatch {
                stage: Some(Stage::Documents),
                position: Some(0),
                updated_at: Utc::now(),
            },
        };
        let body = BatchRequest {
            writes: vec![WireWrite {
                id: &write.id,
                fields: write.patch.to_fields(),
            }],
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["writes"][0]["id"], "a");
        assert_eq!(value["writes"][0]["fields"]["stage"], "documents");
    }

    #[tokio::test]
    async fn test_empty_batch_rejected_locally() {
        let store =
            RemoteRecordStore::new(&config("http://127.0.0.1:9", "ws://127.0.0.1:9")).unwrap();
        let err = store
            .batch_write(&CollectionId::new("m"), Vec::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SluiceError::Storage(StorageError::BatchRejected { .. })
        ));
    }

    #[tokio::test]
    async fn test_subscribe_unreachable_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let store = RemoteRecordStore::new(&config(
            &format!("http://{}", addr),
            &format!("ws://{}/feed", addr),
        ))
        .unwrap();
        let err = store
            .subscribe(&CollectionId::new("merchants"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SluiceError::Storage(StorageError::Transport { .. })
        ));
    }

    #[tokio::test]
    async fn test_subscribe_receives_pushed_snapshots() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(socket).await.unwrap();
            ws.send(Message::Text(
                r#"{"type":"snapshot","revision":1,"documents":[{"id":"a","fields":{"stage":"lead"}}]}"#
                    .to_string(),
            ))
            .await
            .unwrap();
            ws.send(Message::Text(r#"not json"#.to_string()))
                .await
                .unwrap();
            ws.send(Message::Text(
                r#"{"type":"snapshot","revision":2,"documents":[]}"#.to_string(),
            ))
            .await
            .unwrap();
            // hold the socket open until the client goes away
            while ws.next().await.is_some() {}
        });

        let store = RemoteRecordStore::new(&config(
            &format!("http://{}", addr),
            &format!("ws://{}/feed", addr),
        ))
        .unwrap();
        let mut sub = store.subscribe(&CollectionId::new("merchants")).await.unwrap();

        let mut latest = sub.current();
        while latest.revision < Revision(2) {
            latest = sub.changed().await.unwrap();
        }
        assert!(latest.documents.is_empty());

        drop(sub);
        server.abort();
    }
}
