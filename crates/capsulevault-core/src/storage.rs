//! Persistent storage using redb
//!
//! One serialized [`OwnerStore`] per owner identity, written back whole after
//! every successful mutating operation. The engine stays usable without a
//! database (see [`crate::engine::CapsuleVault::in_memory`]); this layer only
//! adds durability across process restarts.

use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use redb::{Database, ReadableTable, TableDefinition};

use crate::error::VaultError;
use crate::store::OwnerStore;

// Table definitions
const STORES_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("owner_stores");

/// Storage layer using redb for ACID-compliant persistence
#[derive(Clone)]
pub struct Storage {
    db: Arc<RwLock<Database>>,
}

impl Storage {
    /// Create a new storage instance at the given path.
    ///
    /// This will:
    /// - Create the database directory if it doesn't exist
    /// - Initialize the database file
    /// - Create all required tables
    pub fn new(path: impl AsRef<Path>) -> Result<Self, VaultError> {
        let path = path.as_ref();

        // Create parent directory if needed
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        // Open/create database
        let db = Database::create(path)?;

        // Initialize all tables
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(STORES_TABLE)?;
        }
        write_txn.commit()?;

        Ok(Self {
            db: Arc::new(RwLock::new(db)),
        })
    }

    /// Write back an owner's store, overwriting any previous snapshot.
    pub fn save_store(&self, owner: &str, store: &OwnerStore) -> Result<(), VaultError> {
        let db = self.db.read();
        let write_txn = db.begin_write()?;
        {
            let mut table = write_txn.open_table(STORES_TABLE)?;
            let data = serde_json::to_vec(store)
                .map_err(|e| VaultError::Serialization(e.to_string()))?;
            table.insert(owner, data.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Load an owner's store.
    ///
    /// Returns `None` if the owner has never been persisted.
    pub fn load_store(&self, owner: &str) -> Result<Option<OwnerStore>, VaultError> {
        let db = self.db.read();
        let read_txn = db.begin_read()?;
        let table = read_txn.open_table(STORES_TABLE)?;

        match table.get(owner)? {
            Some(v) => {
                let store: OwnerStore = serde_json::from_slice(v.value())
                    .map_err(|e| VaultError::Serialization(e.to_string()))?;
                Ok(Some(store))
            }
            None => Ok(None),
        }
    }

    /// List every owner identity with a persisted store.
    pub fn list_owners(&self) -> Result<Vec<String>, VaultError> {
        let db = self.db.read();
        let read_txn = db.begin_read()?;
        let table = read_txn.open_table(STORES_TABLE)?;

        let mut owners = Vec::new();
        for entry in table.iter()? {
            let (key, _) = entry?;
            owners.push(key.value().to_string());
        }
        Ok(owners)
    }
}
