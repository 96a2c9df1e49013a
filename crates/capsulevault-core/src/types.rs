//! Core types for CapsuleVault

use serde::{Deserialize, Serialize};

use crate::error::{VaultError, VaultResult};

/// Unique identifier for a capsule within one owner's store
///
/// Ids are allocated from a per-owner monotonic counter starting at 1.
/// They are never reused and never decrease.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct CapsuleId(u64);

impl CapsuleId {
    /// Create a CapsuleId from a raw counter value
    pub fn from_u64(n: u64) -> Self {
        Self(n)
    }

    /// Get the raw counter value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for CapsuleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "capsule_{}", self.0)
    }
}

/// Release-policy family of a capsule
///
/// The kind is fixed at creation and decides which write operations the
/// capsule accepts: only Collaborative capsules take contributor files, only
/// FileLocker capsules take explicit access grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CapsuleKind {
    /// Released once the clock passes `unlock_time`
    TimeLock,
    /// Multiple contributors each attach one payload, bounded by a cap
    Collaborative,
    /// Owner hands out per-identity access grants
    FileLocker,
    /// Released once the oracle attests proximity to a target coordinate
    GeoLock,
}

impl CapsuleKind {
    /// Validate an external kind discriminant.
    ///
    /// # Errors
    ///
    /// Returns `VaultError::UnknownKind` for any code outside the four
    /// defined variants.
    pub fn from_code(code: u8) -> VaultResult<Self> {
        match code {
            0 => Ok(CapsuleKind::TimeLock),
            1 => Ok(CapsuleKind::Collaborative),
            2 => Ok(CapsuleKind::FileLocker),
            3 => Ok(CapsuleKind::GeoLock),
            other => Err(VaultError::UnknownKind(other)),
        }
    }

    /// The discriminant this kind travels as outside the engine
    pub fn code(&self) -> u8 {
        match self {
            CapsuleKind::TimeLock => 0,
            CapsuleKind::Collaborative => 1,
            CapsuleKind::FileLocker => 2,
            CapsuleKind::GeoLock => 3,
        }
    }

    /// Get a short type name for this kind
    pub fn type_name(&self) -> &'static str {
        match self {
            CapsuleKind::TimeLock => "TimeLock",
            CapsuleKind::Collaborative => "Collaborative",
            CapsuleKind::FileLocker => "FileLocker",
            CapsuleKind::GeoLock => "GeoLock",
        }
    }
}

impl std::fmt::Display for CapsuleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.type_name())
    }
}

/// Geo-proximity target for a capsule
///
/// Coordinates are integer microdegrees (1e-6 degree units); the radius is
/// in meters. A radius of 0 disables the geo gate entirely.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeoTarget {
    /// Target latitude in microdegrees
    pub lat_micro: i64,
    /// Target longitude in microdegrees
    pub long_micro: i64,
    /// Acceptance radius in meters (0 = geo gate disabled)
    pub radius_m: u64,
}

impl GeoTarget {
    /// Create a geo target
    pub fn new(lat_micro: i64, long_micro: i64, radius_m: u64) -> Self {
        Self {
            lat_micro,
            long_micro,
            radius_m,
        }
    }

    /// A target with the geo gate disabled
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Whether the geo gate participates in unlock evaluation
    pub fn is_enabled(&self) -> bool {
        self.radius_m > 0
    }
}

/// Creation parameters for a capsule
///
/// The secret is opaque ciphertext/shared-code bytes supplied by the caller;
/// the engine stores and compares them, nothing more.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapsuleParams {
    /// Release-policy family
    pub kind: CapsuleKind,
    /// Mime metadata for the assembled payload
    pub mime: String,
    /// Opaque unlock code bytes
    pub secret: Vec<u8>,
    /// Unix timestamp the capsule opens at (0 = time gate disabled)
    pub unlock_time: i64,
    /// Geo-proximity target (radius 0 = geo gate disabled)
    pub geo: GeoTarget,
    /// Maximum number of contributor slots
    pub max_contributors: u32,
    /// Declared total payload size in bytes
    pub declared_size: u64,
}

impl CapsuleParams {
    /// Create params with all gates disabled; set fields to configure policy
    pub fn new(kind: CapsuleKind, mime: impl Into<String>) -> Self {
        Self {
            kind,
            mime: mime.into(),
            secret: Vec::new(),
            unlock_time: 0,
            geo: GeoTarget::disabled(),
            max_contributors: 0,
            declared_size: 0,
        }
    }
}

/// Policy and state snapshot of a capsule
///
/// Returned by the query layer; never exposes secret or payload bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapsuleInfo {
    /// Capsule id
    pub id: CapsuleId,
    /// Release-policy family
    pub kind: CapsuleKind,
    /// Owner identity
    pub owner: String,
    /// Unix timestamp the capsule opens at (0 = disabled)
    pub unlock_time: i64,
    /// Geo-proximity target
    pub geo: GeoTarget,
    /// Maximum number of contributor slots
    pub max_contributors: u32,
    /// Contributor slots currently taken
    pub contributor_count: u32,
    /// Whether the oracle has attested proximity
    pub geo_verified: bool,
    /// Whether all release conditions have been satisfied
    pub unlocked: bool,
    /// Whether the final chunk marker has been set
    pub complete: bool,
}

/// Payload metadata snapshot of a capsule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileInfo {
    /// Mime metadata for the assembled payload
    pub mime: String,
    /// Declared total payload size in bytes
    pub declared_size: u64,
    /// 1 + highest chunk index written so far
    pub total_chunks: u32,
    /// Number of chunk indices actually written (gaps excluded)
    pub stored_chunks: u32,
    /// Whether the final chunk marker has been set
    pub complete: bool,
}

/// Record of a successful unlock, appended to the owner store's log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnlockEvent {
    /// Capsule that was unlocked
    pub capsule_id: CapsuleId,
    /// Identity that passed the full policy
    pub unlocker: String,
    /// Unix timestamp of the unlock
    pub timestamp: i64,
}
