//! File-backed JSON cache: one file per key under a dedicated directory.
//!
//! Entries are never evicted; callers decide freshness from `updated_at`.

use actnow_core::CacheError;
use chrono::{DateTime, SubsecRound, TimeDelta, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::PathBuf;
use std::time::Duration;

use crate::types::RegionId;

/// Key holding the last resolved region id.
pub const LOCATION_KEY: &str = "fips-code.json";

/// Key holding the last validated timeseries document for `region`.
pub fn timeseries_key(region: &RegionId) -> String {
    format!("fips-{}-historical-data.json", region)
}

/// A cached payload and the time it was last fetched and validated.
///
/// `updated_at` is stored as epoch milliseconds and kept at millisecond
/// precision so a written entry reads back unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry<T> {
    pub payload: T,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
}

impl<T> CacheEntry<T> {
    /// Entry stamped with the current time.
    pub fn new(payload: T) -> Self {
        Self::at(payload, Utc::now())
    }

    pub fn at(payload: T, updated_at: DateTime<Utc>) -> Self {
        Self {
            payload,
            updated_at: updated_at.trunc_subsecs(3),
        }
    }

    pub fn age(&self, now: DateTime<Utc>) -> TimeDelta {
        now - self.updated_at
    }

    /// Strictly younger than `max_age`.
    pub fn is_fresh(&self, max_age: Duration, now: DateTime<Utc>) -> bool {
        self.age(now) < to_delta(max_age)
    }

    /// Strictly older than `max_age`.
    pub fn is_older_than(&self, max_age: Duration, now: DateTime<Utc>) -> bool {
        self.age(now) > to_delta(max_age)
    }
}

fn to_delta(d: Duration) -> TimeDelta {
    TimeDelta::from_std(d).unwrap_or(TimeDelta::MAX)
}

#[derive(Debug, Clone)]
pub struct FileCache {
    directory: PathBuf,
}

impl FileCache {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.directory.join(key)
    }

    /// Read an entry. A missing file is `Ok(None)`; an undecodable one is
    /// `CacheError::Corrupt`.
    pub async fn read<T: DeserializeOwned>(
        &self,
        key: &str,
    ) -> Result<Option<CacheEntry<T>>, CacheError> {
        let path = self.path_for(key);

        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!("Cache miss for {}", key);
                return Ok(None);
            }
            Err(e) => {
                return Err(CacheError::Read {
                    key: key.to_string(),
                    message: e.to_string(),
                })
            }
        };

        let entry = serde_json::from_str(&contents).map_err(|e| CacheError::Corrupt {
            key: key.to_string(),
            message: e.to_string(),
        })?;

        tracing::debug!("Cache hit for {}", key);
        Ok(Some(entry))
    }

    /// Write an entry, creating the cache directory when needed.
    pub async fn write<T: Serialize>(
        &self,
        key: &str,
        entry: &CacheEntry<T>,
    ) -> Result<(), CacheError> {
        let write_err = |message: String| CacheError::Write {
            key: key.to_string(),
            message,
        };

        tokio::fs::create_dir_all(&self.directory)
            .await
            .map_err(|e| write_err(e.to_string()))?;

        let contents = serde_json::to_string(entry).map_err(|e| write_err(e.to_string()))?;

        tokio::fs::write(self.path_for(key), contents)
            .await
            .map_err(|e| write_err(e.to_string()))?;

        tracing::debug!("Cached {} (updated {})", key, entry.updated_at);
        Ok(())
    }
}
