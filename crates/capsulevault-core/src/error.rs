//! Error types for CapsuleVault

use thiserror::Error;

use crate::types::{CapsuleId, CapsuleKind};

/// Coarse failure category for a [`VaultError`].
///
/// Callers that dispatch on outcome (wire layers, tests) branch on the
/// category; the variant itself carries the human-readable context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Owner store, capsule, or chunk index does not exist
    NotFound,
    /// Caller is not permitted to perform the operation
    PermissionDenied,
    /// An argument was malformed or semantically invalid
    InvalidArgument,
    /// Operation attempted in a state that forbids it
    InvalidState,
    /// A configured limit was exceeded
    ResourceExceeded,
    /// Infrastructure fault in the persistence layer
    Storage,
}

/// Main error type for CapsuleVault operations
#[derive(Error, Debug)]
pub enum VaultError {
    /// No store has been initialized for this owner
    #[error("Owner store not found: {0}")]
    StoreNotFound(String),

    /// Capsule id was not found in the owner's store
    #[error("Capsule not found: {0}")]
    CapsuleNotFound(CapsuleId),

    /// Chunk index was never written
    #[error("Chunk {index} not found in {capsule}")]
    ChunkNotFound {
        /// Capsule the lookup ran against
        capsule: CapsuleId,
        /// Requested chunk index
        index: u32,
    },

    /// The owner's id counter is still zero
    #[error("No capsules created yet for {0}")]
    NoCapsules(String),

    /// Caller is not the capsule owner
    #[error("Caller {0} is not the capsule owner")]
    NotOwner(String),

    /// Requester is absent from the access list (or present with false)
    #[error("{requester} is not authorized for {capsule}")]
    NotAuthorized {
        /// Identity that attempted the operation
        requester: String,
        /// Capsule the operation targeted
        capsule: CapsuleId,
    },

    /// Caller is not the configured oracle identity
    #[error("Caller {0} is not the trusted oracle")]
    NotOracle(String),

    /// Payload retrieval attempted before the capsule was unlocked
    #[error("{0} is still locked")]
    CapsuleLocked(CapsuleId),

    /// Time gate not yet satisfied
    #[error("{capsule} is time-locked until {unlock_time}")]
    TimeLocked {
        /// Capsule the unlock ran against
        capsule: CapsuleId,
        /// Unix timestamp the capsule opens at
        unlock_time: i64,
    },

    /// Geo gate configured but proximity never verified
    #[error("{0} requires geo verification")]
    GeoUnverified(CapsuleId),

    /// Capsule kind code outside the defined variants
    #[error("Unknown capsule kind code: {0}")]
    UnknownKind(u8),

    /// Operation only valid for a different capsule kind
    #[error("Operation requires a {expected} capsule, found {actual}")]
    WrongKind {
        /// Kind the operation is defined for
        expected: CapsuleKind,
        /// Kind of the targeted capsule
        actual: CapsuleKind,
    },

    /// Identity already holds a contribution slot
    #[error("{0} already contributed to this capsule")]
    DuplicateContributor(String),

    /// The owner's own access entry cannot be removed
    #[error("Owner access cannot be revoked")]
    SelfRevoke,

    /// Provided unlock code does not byte-match the stored secret
    #[error("Unlock code does not match")]
    WrongSecret,

    /// Unlock attempted before the final chunk marker was set
    #[error("{0} upload is not complete")]
    Incomplete(CapsuleId),

    /// Chunk payload larger than the configured per-chunk bound
    #[error("Chunk of {size} bytes exceeds the {max} byte limit")]
    ChunkTooLarge {
        /// Size of the rejected payload
        size: usize,
        /// Configured maximum
        max: usize,
    },

    /// Contributor cap already reached
    #[error("Contributor limit of {0} reached")]
    ContributorLimit(u32),

    /// Database creation/opening error
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    /// Transaction error
    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    /// Table error
    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    /// Storage operation error
    #[error("Storage operation error: {0}")]
    StorageOp(#[from] redb::StorageError),

    /// Commit error
    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    /// Error during serialization/deserialization
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// General I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl VaultError {
    /// Map this error onto its coarse category.
    pub fn kind(&self) -> ErrorKind {
        match self {
            VaultError::StoreNotFound(_)
            | VaultError::CapsuleNotFound(_)
            | VaultError::ChunkNotFound { .. }
            | VaultError::NoCapsules(_) => ErrorKind::NotFound,

            VaultError::NotOwner(_)
            | VaultError::NotAuthorized { .. }
            | VaultError::NotOracle(_)
            | VaultError::CapsuleLocked(_)
            | VaultError::TimeLocked { .. }
            | VaultError::GeoUnverified(_) => ErrorKind::PermissionDenied,

            VaultError::UnknownKind(_)
            | VaultError::WrongKind { .. }
            | VaultError::DuplicateContributor(_)
            | VaultError::SelfRevoke
            | VaultError::WrongSecret => ErrorKind::InvalidArgument,

            VaultError::Incomplete(_) => ErrorKind::InvalidState,

            VaultError::ChunkTooLarge { .. } | VaultError::ContributorLimit(_) => {
                ErrorKind::ResourceExceeded
            }

            VaultError::Database(_)
            | VaultError::Transaction(_)
            | VaultError::Table(_)
            | VaultError::StorageOp(_)
            | VaultError::Commit(_)
            | VaultError::Serialization(_)
            | VaultError::Io(_) => ErrorKind::Storage,
        }
    }
}

/// Result type alias using VaultError
pub type VaultResult<T> = Result<T, VaultError>;
