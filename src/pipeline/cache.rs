//! Stage result cache keyed by input fingerprint.

use moka::future::Cache;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::config::{CacheBackend, CacheConfig, StageConfig};
use crate::error::Stage;

/// Caches validated stage artifacts as JSON, keyed by [`fingerprint`].
///
/// Cloning is cheap and clones share entries.
#[derive(Clone)]
pub struct StageCache {
    entries: Option<Cache<String, String>>,
}

impl StageCache {
    /// Builds the backend selected in `config`.
    #[must_use]
    pub fn from_config(config: &CacheConfig) -> Self {
        match config.backend {
            CacheBackend::None => Self::disabled(),
            CacheBackend::Memory => Self {
                entries: Some(
                    Cache::builder()
                        .max_capacity(config.max_entries)
                        .time_to_live(config.ttl())
                        .build(),
                ),
            },
        }
    }

    /// A cache that never stores anything.
    #[must_use]
    pub fn disabled() -> Self {
        Self { entries: None }
    }

    /// Looks up a cached artifact.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.entries.as_ref()?.get(key).await?;
        match serde_json::from_str(&raw) {
            Ok(value) => {
                let short = &key[..key.len().min(12)];
                debug!(key = short, "stage cache hit");
                Some(value)
            }
            Err(e) => {
                warn!(error = %e, "discarding undecodable cache entry");
                None
            }
        }
    }

    /// Stores an artifact.
    pub async fn insert<T: Serialize>(&self, key: &str, value: &T) {
        let Some(entries) = &self.entries else { return };
        match serde_json::to_string(value) {
            Ok(raw) => entries.insert(key.to_string(), raw).await,
            Err(e) => warn!(error = %e, "failed to serialize stage result for cache"),
        }
    }
}

/// SHA-256 over the stage name, the canonical JSON of `input` and the model
/// parameters, hex-encoded.
///
/// `serde_json` maps keep keys sorted, so equal inputs serialize identically
/// regardless of field construction order.
#[must_use]
pub fn fingerprint<I: Serialize>(
    stage: Stage,
    input: &I,
    model: &str,
    params: &StageConfig,
) -> String {
    let canonical = serde_json::to_value(input)
        .map(|v| v.to_string())
        .unwrap_or_default();

    let mut hasher = Sha256::new();
    hasher.update(stage.as_str().as_bytes());
    hasher.update([0]);
    hasher.update(canonical.as_bytes());
    hasher.update([0]);
    hasher.update(model.as_bytes());
    hasher.update([0]);
    hasher.update(params.system_prompt.as_bytes());
    hasher.update([0]);
    hasher.update(params.max_tokens.to_le_bytes());
    hasher.update(params.temperature.to_bits().to_le_bytes());
    hex::encode(hasher.finalize())
}
