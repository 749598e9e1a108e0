//! Configuration loading for the sluice board terminal.
//!
//! All fields are required unless explicitly marked optional. The drag
//! activation distance is the only value with a default.

use serde::Deserialize;
use sluice_board::{BoardConfig, DragConfig, NotifierConfig};
use sluice_core::CollectionId;
use sluice_storage::RemoteStoreConfig;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TuiConfig {
    pub collection: CollectionId,
    pub store: StoreConfig,
    pub notifier: Option<NotifierConfig>,
    #[serde(default)]
    pub drag: DragConfig,
    pub refresh_interval_ms: u64,
    pub log_path: PathBuf,
    pub theme: ThemeConfig,
}

/// Where the board's records live.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreConfig {
    Remote(RemoteStoreConfig),
    Memory(MemoryStoreConfig),
}

/// Local store seeded from a JSON array of documents. For demos and offline use.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MemoryStoreConfig {
    pub seed_path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ThemeConfig {
    pub name: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing configuration file path (use --config or SLUICE_TUI_CONFIG)")]
    MissingConfigPath,
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid config value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
    #[error(transparent)]
    Board(#[from] sluice_core::ConfigError),
}

impl TuiConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let path = config_path_from_args().or_else(config_path_from_env);
        let path = path.ok_or(ConfigError::MissingConfigPath)?;
        let config = Self::from_path(&path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.board_config().validate()?;
        match &self.store {
            StoreConfig::Remote(remote) => remote.validate()?,
            StoreConfig::Memory(memory) => {
                if memory.seed_path.as_os_str().is_empty() {
                    return Err(ConfigError::InvalidValue {
                        field: "store.memory.seed_path",
                        reason: "must not be empty".to_string(),
                    });
                }
            }
        }
        if self.refresh_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "refresh_interval_ms",
                reason: "must be > 0".to_string(),
            });
        }
        if self.log_path.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "log_path",
                reason: "must not be empty".to_string(),
            });
        }
        if self.theme.name.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "theme.name",
                reason: "must not be empty".to_string(),
            });
        }
        if self.theme.name.to_ascii_lowercase() != "synthbrute" {
            return Err(ConfigError::InvalidValue {
                field: "theme.name",
                reason: "only 'synthbrute' is supported".to_string(),
            });
        }
        Ok(())
    }

    /// The board-level slice of this config.
    pub fn board_config(&self) -> BoardConfig {
        BoardConfig {
            collection: self.collection.clone(),
            drag: self.drag,
            notifier: self.notifier.clone(),
        }
    }
}

fn config_path_from_env() -> Option<PathBuf> {
    std::env::var("SLUICE_TUI_CONFIG").ok().map(PathBuf::from)
}

fn config_path_from_args() -> Option<PathBuf> {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            return args.next().map(PathBuf::from);
        }
    }
    None
}
