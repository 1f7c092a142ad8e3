/*! Saving client state so that it survives restarts.

Stores serialize their state to JSON and hand it to a [StateStorage] under a
fixed key. State is loaded once when a store is created and saved after every
committed change.
*/

use std::{
    collections::HashMap,
    path::Path,
    sync::{Arc, Mutex},
};

use rusqlite::{Connection, OptionalExtension};
use serde::{Serialize, de::DeserializeOwned};

use crate::Error;

/// The storage key for the session store.
pub const SESSION_KEY: &str = "auth-storage";
/// The storage key for the category store.
pub const CATEGORY_KEY: &str = "category-storage";
/// The storage key for the transaction store.
pub const TRANSACTION_KEY: &str = "transaction-storage";

/// A key/value store for serialized client state.
pub trait StateStorage: Send + Sync {
    /// Get the value saved under `key`, if any.
    fn load(&self, key: &str) -> Result<Option<String>, Error>;

    /// Save `value` under `key`, replacing any previous value.
    fn save(&self, key: &str, value: &str) -> Result<(), Error>;

    /// Delete the value saved under `key`. Deleting a missing key is not an error.
    fn remove(&self, key: &str) -> Result<(), Error>;
}

/// Stores client state in a SQLite database.
#[derive(Debug, Clone)]
pub struct SQLiteStateStorage {
    connection: Arc<Mutex<Connection>>,
}

impl SQLiteStateStorage {
    /// Open (or create) the database at `path` and create the state table.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or initialized.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        Self::new(Connection::open(path)?)
    }

    /// Use an existing connection, creating the state table if needed.
    ///
    /// # Errors
    /// Returns an error if the table cannot be created.
    pub fn new(connection: Connection) -> Result<Self, Error> {
        create_state_table(&connection)?;

        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    fn with_connection<T>(
        &self,
        query: impl FnOnce(&Connection) -> Result<T, rusqlite::Error>,
    ) -> Result<T, Error> {
        let connection = self
            .connection
            .lock()
            .map_err(|_| Error::Storage("could not acquire the database lock".to_owned()))?;

        query(&connection).map_err(Error::from)
    }
}

impl StateStorage for SQLiteStateStorage {
    fn load(&self, key: &str) -> Result<Option<String>, Error> {
        self.with_connection(|connection| {
            connection
                .prepare("SELECT value FROM state WHERE key = :key;")?
                .query_row(&[(":key", key)], |row| row.get(0))
                .optional()
        })
    }

    fn save(&self, key: &str, value: &str) -> Result<(), Error> {
        self.with_connection(|connection| {
            connection.execute(
                "INSERT INTO state (key, value) VALUES (?1, ?2)
                    ON CONFLICT(key) DO UPDATE SET value = excluded.value;",
                (key, value),
            )
        })?;

        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), Error> {
        self.with_connection(|connection| {
            connection.execute("DELETE FROM state WHERE key = ?1;", [key])
        })?;

        Ok(())
    }
}

fn create_state_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS state (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );",
        (),
    )?;

    Ok(())
}

/// Keeps client state in memory only, e.g. for tests or a throwaway session.
#[derive(Debug, Default, Clone)]
pub struct MemoryStateStorage {
    values: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStateStorage {
    /// Create an empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    fn values(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, Error> {
        self.values
            .lock()
            .map_err(|_| Error::Storage("could not acquire the state lock".to_owned()))
    }
}

impl StateStorage for MemoryStateStorage {
    fn load(&self, key: &str) -> Result<Option<String>, Error> {
        Ok(self.values()?.get(key).cloned())
    }

    fn save(&self, key: &str, value: &str) -> Result<(), Error> {
        self.values()?.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), Error> {
        self.values()?.remove(key);
        Ok(())
    }
}

/// Load and decode the snapshot under `key`.
///
/// Missing, unreadable and undecodable snapshots all yield `None`, the latter
/// two are logged.
pub(crate) fn load_snapshot<T: DeserializeOwned>(
    storage: &dyn StateStorage,
    key: &str,
) -> Option<T> {
    let raw = match storage.load(key) {
        Ok(raw) => raw?,
        Err(error) => {
            tracing::error!("Could not load saved state \"{key}\": {error}");
            return None;
        }
    };

    match serde_json::from_str(&raw) {
        Ok(snapshot) => Some(snapshot),
        Err(error) => {
            tracing::warn!("Ignoring corrupt saved state \"{key}\": {error}");
            None
        }
    }
}

/// Encode `snapshot` and save it under `key`.
///
/// Failures are logged and otherwise ignored: the in-memory state stays
/// authoritative for the running process.
pub(crate) fn save_snapshot<T: Serialize>(storage: &dyn StateStorage, key: &str, snapshot: &T) {
    let result = serde_json::to_string(snapshot)
        .map_err(Error::from)
        .and_then(|raw| storage.save(key, &raw));

    if let Err(error) = result {
        tracing::error!("Could not save state \"{key}\": {error}");
    }
}

/// Delete the snapshot under `key`, logging any failure.
pub(crate) fn remove_snapshot(storage: &dyn StateStorage, key: &str) {
    if let Err(error) = storage.remove(key) {
        tracing::error!("Could not remove saved state \"{key}\": {error}");
    }
}
