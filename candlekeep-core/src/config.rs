//! Pipeline configuration, loaded from an optional TOML file.
//!
//! Every key has a default matching the on-disk layout the daily job expects,
//! so an empty file (or no file) is a valid configuration.
//!
//! ```toml
//! [continuity]
//! step_secs = 60
//!
//! [onboard]
//! bulk_path = "data/original/btcusd_1-min_data.csv"
//! gap_fill_path = "data/original/missing_ohlc_data.csv"
//! output_path = "data/historical/btcusd_bitstamp_1min.csv"
//! compress = true
//!
//! [update]
//! pair = "btcusd"
//! recent_path = "data/recent/btcusd_bitstamp_1min_latest.csv"
//! ```

use crate::domain::MINUTE_SECS;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

const HISTORICAL_PATH: &str = "data/historical/btcusd_bitstamp_1min.csv";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub continuity: ContinuityConfig,
    pub onboard: OnboardConfig,
    pub update: UpdateConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContinuityConfig {
    /// Required spacing between consecutive candles.
    pub step_secs: i64,
}

impl Default for ContinuityConfig {
    fn default() -> Self {
        Self {
            step_secs: MINUTE_SECS,
        }
    }
}

/// One-off reconciliation of the bulk history with its gap-fill file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OnboardConfig {
    pub bulk_path: PathBuf,
    pub gap_fill_path: PathBuf,
    pub output_path: PathBuf,
    /// Gzip the published file. Appends `.gz` to `output_path` if it lacks it.
    pub compress: bool,
    /// Write `{output}.meta.json` next to the published file.
    pub write_meta: bool,
}

impl Default for OnboardConfig {
    fn default() -> Self {
        Self {
            bulk_path: PathBuf::from("data/original/btcusd_1-min_data.csv"),
            gap_fill_path: PathBuf::from("data/original/missing_ohlc_data.csv"),
            output_path: PathBuf::from(HISTORICAL_PATH),
            compress: false,
            write_meta: true,
        }
    }
}

impl OnboardConfig {
    /// Where the published dataset actually lands.
    pub fn published_path(&self) -> PathBuf {
        if self.compress && !crate::data::is_gzip(&self.output_path) {
            let mut name = self.output_path.as_os_str().to_os_string();
            name.push(".gz");
            PathBuf::from(name)
        } else {
            self.output_path.clone()
        }
    }
}

/// Daily append of newly published candles to the recent file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateConfig {
    pub pair: String,
    /// Historical dataset; only its last timestamp is consulted. Left at its
    /// default, it follows wherever `[onboard]` publishes, `.gz` included.
    pub bulk_path: PathBuf,
    pub recent_path: PathBuf,
    pub base_url: String,
    /// Most candles requested per call; Bitstamp caps this at 1000.
    pub page_limit: usize,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            pair: "btcusd".into(),
            bulk_path: PathBuf::from(HISTORICAL_PATH),
            recent_path: PathBuf::from("data/recent/btcusd_bitstamp_1min_latest.csv"),
            base_url: "https://www.bitstamp.net/api/v2".into(),
            page_limit: 1000,
            timeout_secs: 60,
            max_retries: 3,
        }
    }
}

impl UpdateConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl PipelineConfig {
    /// Load from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse from a TOML string and check value ranges.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let mut config: Self = toml::from_str(content)?;
        config.link_history();
        config.validate()?;
        Ok(config)
    }

    /// Point an unset `update.bulk_path` at the file `onboard` actually
    /// publishes, so enabling compression or moving the output needs one edit.
    pub fn link_history(&mut self) {
        if self.update.bulk_path == Path::new(HISTORICAL_PATH) {
            self.update.bulk_path = self.onboard.published_path();
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.continuity.step_secs <= 0 {
            return Err(ConfigError::Invalid(format!(
                "continuity.step_secs must be positive, got {}",
                self.continuity.step_secs
            )));
        }
        if self.update.page_limit == 0 {
            return Err(ConfigError::Invalid("update.page_limit must be at least 1".into()));
        }
        if self.update.pair.trim().is_empty() {
            return Err(ConfigError::Invalid("update.pair must not be empty".into()));
        }
        Ok(())
    }
}
