//! Stage-change notification side-effect.
//!
//! Best effort: a failed call is logged and surfaced as a soft notice by
//! the caller, never retried and never rolled back.

use ::async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sluice_core::{ConfigError, NotifyError, RecordId, SluiceResult, Stage, StageTransition, Timestamp};
use std::time::Duration;

/// Outbound collaborator for confirmed stage transitions.
#[async_trait]
pub trait StatusNotifier: Send + Sync {
    async fn notify_status_change(&self, transition: &StageTransition) -> Result<(), NotifyError>;
}

/// Notifier for hosts without a notification endpoint.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

#[async_trait]
impl StatusNotifier for NoopNotifier {
    async fn notify_status_change(&self, _transition: &StageTransition) -> Result<(), NotifyError> {
        Ok(())
    }
}

fn default_notifier_timeout_ms() -> u64 {
    5_000
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NotifierConfig {
    pub endpoint: String,
    #[serde(default = "default_notifier_timeout_ms")]
    pub timeout_ms: u64,
}

impl NotifierConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let endpoint = self.endpoint.trim();
        if endpoint.is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "notifier.endpoint".to_string(),
            });
        }
        if reqwest::Url::parse(endpoint).is_err() {
            return Err(ConfigError::InvalidValue {
                field: "notifier.endpoint".to_string(),
                reason: "must be an absolute URL".to_string(),
            });
        }
        if self.timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "notifier.timeout_ms".to_string(),
                reason: "must be > 0".to_string(),
            });
        }
        Ok(())
    }
}

/// JSON body posted for every transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChangePayload {
    pub record_id: RecordId,
    pub old_stage: Stage,
    pub new_stage: Stage,
    pub changed_at: Timestamp,
}

impl StatusChangePayload {
    pub fn new(transition: &StageTransition, changed_at: Timestamp) -> Self {
        Self {
            record_id: transition.record_id.clone(),
            old_stage: transition.from,
            new_stage: transition.to,
            changed_at,
        }
    }
}

/// Posts transitions to an HTTP endpoint.
#[derive(Clone)]
pub struct HttpStatusNotifier {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpStatusNotifier {
    pub fn new(config: &NotifierConfig) -> SluiceResult<Self> {
        config.validate()?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| NotifyError::Transport {
                reason: format!("Failed to create HTTP client: {}", e),
            })?;
        Ok(Self {
            client,
            endpoint: config.endpoint.trim().to_string(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl StatusNotifier for HttpStatusNotifier {
    async fn notify_status_change(&self, transition: &StageTransition) -> Result<(), NotifyError> {
        let payload = StatusChangePayload::new(transition, chrono::Utc::now());
        let response = self
            .client
            .post(&self.endpoint)
            .header("User-Agent", "sluice-board/0.1")
            .json(&payload)
            .send()
            .await
            .map_err(|e| NotifyError::Transport {
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
            });
        }
        tracing::debug!(
            record_id = %transition.record_id,
            status = %status,
            "Status change delivered"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_payload_shape() {
        let transition = StageTransition {
            record_id: RecordId::new("m-9"),
            from: Stage::Offer,
            to: Stage::Underwriting,
        };
        let at = chrono::Utc.with_ymd_and_hms(2024, 3, 4, 5, 6, 7).unwrap();
        let value = serde_json::to_value(StatusChangePayload::new(&transition, at)).unwrap();
        assert_eq!(value["recordId"], "m-9");
        assert_eq!(value["oldStage"], "offer");
        assert_eq!(value["newStage"], "underwriting");
        assert!(value["changedAt"].as_str().unwrap().starts_with("2024-03-04T05:06:07"));
    }

    #[test]
    fn test_config_validation() {
        let ok = NotifierConfig {
            endpoint: "https://hooks.example.test/status".to_string(),
            timeout_ms: 1000,
        };
        assert!(ok.validate().is_ok());

        let empty = NotifierConfig {
            endpoint: "  ".to_string(),
            timeout_ms: 1000,
        };
        assert!(matches!(empty.validate(), Err(ConfigError::MissingRequired { .. })));

        let relative = NotifierConfig {
            endpoint: "/status".to_string(),
            timeout_ms: 1000,
        };
        assert!(matches!(relative.validate(), Err(ConfigError::InvalidValue { .. })));

        let zero = NotifierConfig {
            timeout_ms: 0,
            ..ok
        };
        assert!(zero.validate().is_err());
    }

    #[tokio::test]
    async fn test_noop_notifier_succeeds() {
        let transition = StageTransition {
            record_id: RecordId::new("a"),
            from: Stage::Lead,
            to: Stage::Phone,
        };
        assert!(NoopNotifier.notify_status_change(&transition).await.is_ok());
    }

    #[tokio::test]
    async fn test_http_notifier_unreachable_is_transport_error() {
        let notifier = HttpStatusNotifier::new(&NotifierConfig {
            endpoint: "http://127.0.0.1:9/status".to_string(),
            timeout_ms: 500,
        })
        .unwrap();
        let transition = StageTransition {
            record_id: RecordId::new("a"),
            from: Stage::Lead,
            to: Stage::Phone,
        };
        let err = notifier.notify_status_change(&transition).await.unwrap_err();
        assert!(matches!(err, NotifyError::Transport { .. }));
    }
}
