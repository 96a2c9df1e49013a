//! CapsuleVault Core Library
//!
//! Capsule-based conditional-release storage engine.
//!
//! ## Overview
//!
//! A capsule holds one opaque, client-encrypted payload assembled from
//! bounded-size chunks, released only once an owner-defined policy is fully
//! satisfied: upload completeness, access-list authorization, a shared
//! secret, an optional time threshold, and optional oracle-attested geo
//! proximity. Capsule state is sharded into one store per owner identity
//! with an append-only unlock-event log.
//!
//! The engine performs no encryption and manages no keys; secrets and
//! payloads are opaque bytes supplied by callers. Authentication and the
//! ordering of calls belong to the surrounding execution environment.
//!
//! ## Quick Start
//!
//! ```ignore
//! use capsulevault_core::{CapsuleKind, CapsuleParams, CapsuleVault, VaultConfig};
//!
//! let mut vault = CapsuleVault::open("~/.capsulevault/data", VaultConfig::default())?;
//!
//! // Create a time-locked capsule
//! let mut params = CapsuleParams::new(CapsuleKind::TimeLock, "application/pdf");
//! params.secret = vec![0xAB, 0xCD];
//! params.unlock_time = 1_900_000_000;
//! let id = vault.create_capsule("did:vault:alice", params)?;
//!
//! // Upload the payload in chunks, marking the last one final
//! vault.upload_chunk("did:vault:alice", "did:vault:alice", id, 0, part_one, false)?;
//! vault.upload_chunk("did:vault:alice", "did:vault:alice", id, 1, part_two, true)?;
//!
//! // Once the clock passes the threshold, the unlock succeeds
//! vault.request_unlock("did:vault:alice", "did:vault:alice", id, &[0xAB, 0xCD])?;
//! let chunk = vault.file_chunk("did:vault:alice", "did:vault:alice", id, 0)?;
//! ```

pub mod capsule;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod policy;
pub mod storage;
pub mod store;
pub mod types;

// Re-exports
pub use capsule::Capsule;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{VaultConfig, DEFAULT_MAX_CHUNK_BYTES, DEFAULT_ORACLE_ID};
pub use engine::CapsuleVault;
pub use error::{ErrorKind, VaultError, VaultResult};
pub use storage::Storage;
pub use store::OwnerStore;
pub use types::*;
