//! Board configuration.

use crate::drag::DragConfig;
use crate::notify::{HttpStatusNotifier, NoopNotifier, NotifierConfig, StatusNotifier};
use serde::{Deserialize, Serialize};
use sluice_core::{CollectionId, ConfigError, SluiceResult};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BoardConfig {
    pub collection: CollectionId,
    #[serde(default)]
    pub drag: DragConfig,
    #[serde(default)]
    pub notifier: Option<NotifierConfig>,
}

impl BoardConfig {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: CollectionId::new(collection),
            drag: DragConfig::default(),
            notifier: None,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.collection.as_str().trim().is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "collection".to_string(),
            });
        }
        self.drag.validate()?;
        if let Some(notifier) = &self.notifier {
            notifier.validate()?;
        }
        Ok(())
    }

    /// HTTP notifier when an endpoint is configured, otherwise a no-op.
    pub fn build_notifier(&self) -> SluiceResult<Arc<dyn StatusNotifier>> {
        match &self.notifier {
            Some(config) => Ok(Arc::new(HttpStatusNotifier::new(config)?)),
            None => Ok(Arc::new(NoopNotifier)),
        }
    }
}
