//! Engine configuration

use serde::{Deserialize, Serialize};

/// Default upper bound for a single chunk upload
pub const DEFAULT_MAX_CHUNK_BYTES: usize = 64 * 1024;

/// Default oracle identity trusted for geo callbacks
pub const DEFAULT_ORACLE_ID: &str = "did:vault:oracle";

/// Engine-wide configuration
///
/// The per-chunk bound is what keeps every atomic write to a fixed size, so
/// arbitrarily large payloads arrive as many independent, retryable uploads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultConfig {
    /// Maximum accepted size of one chunk upload in bytes
    pub max_chunk_bytes: usize,
    /// Identity permitted to call the geo verification callback
    pub oracle_id: String,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            max_chunk_bytes: DEFAULT_MAX_CHUNK_BYTES,
            oracle_id: DEFAULT_ORACLE_ID.to_string(),
        }
    }
}
