//! Metadata sidecar for a published dataset.
//!
//! Written as `{dataset}.meta.json` next to the file it describes, so a
//! consumer can check row count, range and content hash without decoding it.

use crate::domain::Candle;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetMeta {
    pub first_timestamp: Option<i64>,
    pub last_timestamp: Option<i64>,
    pub row_count: usize,
    /// Continuity boundary the dataset was truncated at, if any.
    pub truncated_at: Option<i64>,
    pub gap_count: usize,
    pub data_hash: String,
    pub source: String,
    pub written_at: NaiveDateTime,
}

#[derive(Debug, Error)]
pub enum MetaError {
    #[error("meta I/O on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("meta serialization: {0}")]
    Json(#[from] serde_json::Error),
}

impl DatasetMeta {
    /// Describe `candles` as published, stamped with the current UTC time.
    pub fn describe(candles: &[Candle], truncated_at: Option<i64>, gap_count: usize) -> Self {
        Self {
            first_timestamp: candles.first().map(|c| c.timestamp),
            last_timestamp: candles.last().map(|c| c.timestamp),
            row_count: candles.len(),
            truncated_at,
            gap_count,
            data_hash: content_hash(candles),
            source: "onboard".to_string(),
            written_at: chrono::Utc::now().naive_utc(),
        }
    }

    /// Sidecar path for a dataset: `{dataset}.meta.json`.
    pub fn path_for(dataset: &Path) -> PathBuf {
        let mut name = dataset.file_name().unwrap_or_default().to_os_string();
        name.push(".meta.json");
        dataset.with_file_name(name)
    }

    /// Write the sidecar for `dataset`, replacing any earlier one atomically.
    pub fn write(&self, dataset: &Path) -> Result<PathBuf, MetaError> {
        let path = Self::path_for(dataset);
        let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
        tmp_name.push(".tmp");
        let tmp_path = path.with_file_name(tmp_name);

        let json = serde_json::to_string_pretty(self)?;
        let result = fs::write(&tmp_path, json)
            .and_then(|()| fs::rename(&tmp_path, &path))
            .map_err(|source| MetaError::Io {
                path: path.clone(),
                source,
            });
        if result.is_err() {
            let _ = fs::remove_file(&tmp_path);
        }
        result.map(|()| path)
    }

    /// Delete the sidecar for `dataset`, if there is one. Returns whether a
    /// file was removed.
    pub fn remove(dataset: &Path) -> Result<bool, MetaError> {
        let path = Self::path_for(dataset);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(MetaError::Io { path, source }),
        }
    }

    pub fn read(dataset: &Path) -> Result<Self, MetaError> {
        let path = Self::path_for(dataset);
        let content = fs::read_to_string(&path).map_err(|source| MetaError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// blake3 over the little-endian bytes of every field, in row order.
pub fn content_hash(candles: &[Candle]) -> String {
    let mut hasher = blake3::Hasher::new();
    for c in candles {
        hasher.update(&c.timestamp.to_le_bytes());
        for v in [c.open, c.high, c.low, c.close, c.volume] {
            hasher.update(&v.to_le_bytes());
        }
    }
    hasher.finalize().to_hex().to_string()
}
