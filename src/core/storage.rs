//! Key-value persistence for conversation state.
//!
//! `StorageBackend` dispatches statically over the file-backed redb store and
//! the in-memory store used as a fallback and in tests.

use enum_dispatch::enum_dispatch;
use redb::{Database, TableDefinition};
use std::collections::HashMap;
use std::fmt::Display;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tracing::{info, warn};

use crate::shared::error::{AppError, AppResult};

/// Key: storage key, Value: serialized payload
const STATE_TABLE: TableDefinition<&str, &str> = TableDefinition::new("chat_state");

#[enum_dispatch]
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> AppResult<Option<String>>;
    fn set(&self, key: &str, value: &str) -> AppResult<()>;
    fn remove(&self, key: &str) -> AppResult<()>;
}

#[enum_dispatch(KeyValueStore)]
pub enum StorageBackend {
    Redb(RedbStorage),
    Memory(InMemoryStorage),
}

impl StorageBackend {
    /// Open the redb file at `path`, falling back to memory if that fails.
    pub fn open_or_memory(path: &Path) -> Self {
        match RedbStorage::open(path) {
            Ok(storage) => {
                info!(path = %path.display(), "opened conversation database");
                StorageBackend::Redb(storage)
            }
            Err(e) => {
                warn!(error = %e, "failed to open conversation database, using in-memory fallback");
                StorageBackend::Memory(InMemoryStorage::new())
            }
        }
    }

    pub fn memory() -> Self {
        StorageBackend::Memory(InMemoryStorage::new())
    }
}

fn db_err<E: Display>(context: &'static str) -> impl Fn(E) -> AppError {
    move |e| AppError::Persistence(format!("{}: {}", context, e))
}

/// Redb-based storage implementation
pub struct RedbStorage {
    db: Database,
}

impl RedbStorage {
    pub fn open(path: &Path) -> AppResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::create(path)
            .map_err(db_err("Failed to create database"))?;

        // Initialize table so reads never hit a missing table
        let write_txn = db
            .begin_write()
            .map_err(db_err("Failed to begin write transaction"))?;
        {
            let _table = write_txn
                .open_table(STATE_TABLE)
                .map_err(db_err("Failed to open table"))?;
        }
        write_txn
            .commit()
            .map_err(db_err("Failed to commit transaction"))?;

        Ok(Self { db })
    }
}

impl KeyValueStore for RedbStorage {
    fn get(&self, key: &str) -> AppResult<Option<String>> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(db_err("Failed to begin read"))?;
        let table = read_txn
            .open_table(STATE_TABLE)
            .map_err(db_err("Failed to open table"))?;
        let value = table
            .get(key)
            .map_err(db_err("Failed to read entry"))?;
        Ok(value.map(|v| v.value().to_string()))
    }

    fn set(&self, key: &str, value: &str) -> AppResult<()> {
        let write_txn = self
            .db
            .begin_write()
            .map_err(db_err("Failed to begin write"))?;
        {
            let mut table = write_txn
                .open_table(STATE_TABLE)
                .map_err(db_err("Failed to open table"))?;
            table
                .insert(key, value)
                .map_err(db_err("Failed to insert"))?;
        }
        write_txn
            .commit()
            .map_err(db_err("Failed to commit"))?;
        Ok(())
    }

    fn remove(&self, key: &str) -> AppResult<()> {
        let write_txn = self
            .db
            .begin_write()
            .map_err(db_err("Failed to begin write"))?;
        {
            let mut table = write_txn
                .open_table(STATE_TABLE)
                .map_err(db_err("Failed to open table"))?;
            table
                .remove(key)
                .map_err(db_err("Failed to remove key"))?;
        }
        write_txn
            .commit()
            .map_err(db_err("Failed to commit"))?;
        Ok(())
    }
}

/// In-memory storage (fallback when the database cannot be opened)
#[derive(Default)]
pub struct InMemoryStorage {
    entries: Mutex<HashMap<String, String>>,
    fail_writes: AtomicBool,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `set` and `remove` fail, as a full or read-only disk would.
    #[cfg(test)]
    pub(crate) fn fail_writes(&self, failing: bool) {
        self.fail_writes.store(failing, Ordering::SeqCst);
    }

    fn check_writable(&self) -> AppResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::Persistence("Storage is read-only".to_string()));
        }
        Ok(())
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("in-memory storage mutex poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}

impl KeyValueStore for InMemoryStorage {
    fn get(&self, key: &str) -> AppResult<Option<String>> {
        Ok(self.entries().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> AppResult<()> {
        self.check_writable()?;
        self.entries().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> AppResult<()> {
        self.check_writable()?;
        self.entries().remove(key);
        Ok(())
    }
}
