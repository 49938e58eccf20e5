//! Durable storage boundary for the entity store.
//!
//! The whole store state persists as a single serialized blob under a fixed
//! storage key, so a process restart starts from the last mirrored state.

use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

use crate::crm::types::{Account, Lead, Opportunity, Quotation};

/// Fixed key the state blob is stored under.
pub const STORAGE_KEY: &str = "crm-state";

/// Serialized form of every entity map.
///
/// Maps are flattened to lists; the store rebuilds its id-keyed maps on
/// load. Freshness stamps are deliberately absent: a reloaded process
/// treats every segment as stale and revalidates on first read.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreSnapshot {
  #[serde(default)]
  pub accounts: Vec<Account>,
  #[serde(default)]
  pub leads: Vec<Lead>,
  #[serde(default)]
  pub opportunities: Vec<Opportunity>,
  #[serde(default)]
  pub quotations: Vec<Quotation>,
}

/// Trait for durable storage backends.
pub trait Storage: Send + Sync {
  /// Load the last saved snapshot, or `None` if nothing was ever saved.
  fn load(&self) -> Result<Option<StoreSnapshot>>;

  /// Persist the given snapshot, replacing any previous one.
  fn save(&self, snapshot: &StoreSnapshot) -> Result<()>;
}

impl Storage for Box<dyn Storage> {
  fn load(&self) -> Result<Option<StoreSnapshot>> {
    (**self).load()
  }

  fn save(&self, snapshot: &StoreSnapshot) -> Result<()> {
    (**self).save(snapshot)
  }
}

/// Storage implementation that doesn't persist anything.
/// Used when persistence is disabled - all operations are no-ops.
pub struct NoopStorage;

impl Storage for NoopStorage {
  fn load(&self) -> Result<Option<StoreSnapshot>> {
    Ok(None) // Nothing ever saved
  }

  fn save(&self, _snapshot: &StoreSnapshot) -> Result<()> {
    Ok(()) // Discard
  }
}

/// In-memory storage stand-in for tests.
pub struct MemoryStorage {
  blob: Mutex<Option<Vec<u8>>>,
}

impl MemoryStorage {
  pub fn new() -> Self {
    Self {
      blob: Mutex::new(None),
    }
  }
}

impl Default for MemoryStorage {
  fn default() -> Self {
    Self::new()
  }
}

impl Storage for MemoryStorage {
  fn load(&self) -> Result<Option<StoreSnapshot>> {
    let blob = self
      .blob
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    match blob.as_deref() {
      Some(data) => {
        let snapshot = serde_json::from_slice(data)
          .map_err(|e| eyre!("Failed to deserialize snapshot: {}", e))?;
        Ok(Some(snapshot))
      }
      None => Ok(None),
    }
  }

  fn save(&self, snapshot: &StoreSnapshot) -> Result<()> {
    let data =
      serde_json::to_vec(snapshot).map_err(|e| eyre!("Failed to serialize snapshot: {}", e))?;

    let mut blob = self
      .blob
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    *blob = Some(data);

    Ok(())
  }
}

/// SQLite-backed storage implementation.
pub struct SqliteStorage {
  conn: Mutex<Connection>,
}

impl SqliteStorage {
  /// Create a new SQLite storage at the default location.
  pub fn open() -> Result<Self> {
    let path = Self::default_path()?;
    Self::open_at(&path)
  }

  /// Create a new SQLite storage at the given path.
  pub fn open_at(path: &std::path::Path) -> Result<Self> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create storage directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open storage database at {}: {}", path.display(), e))?;

    let storage = Self {
      conn: Mutex::new(conn),
    };
    storage.run_migrations()?;

    Ok(storage)
  }

  /// Get the default database path.
  fn default_path() -> Result<std::path::PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("crmcache").join("cache.db"))
  }

  /// Run database migrations for the state table.
  fn run_migrations(&self) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute_batch(STATE_SCHEMA)
      .map_err(|e| eyre!("Failed to run storage migrations: {}", e))?;

    Ok(())
  }
}

/// Schema for the state table.
const STATE_SCHEMA: &str = r#"
-- One serialized blob per storage key (a single key in practice)
CREATE TABLE IF NOT EXISTS state_blobs (
    storage_key TEXT PRIMARY KEY,
    data BLOB NOT NULL,
    saved_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

impl Storage for SqliteStorage {
  fn load(&self) -> Result<Option<StoreSnapshot>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let mut stmt = conn
      .prepare("SELECT data FROM state_blobs WHERE storage_key = ?")
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let blob: Option<Vec<u8>> = stmt.query_row(params![STORAGE_KEY], |row| row.get(0)).ok();

    match blob {
      Some(data) => {
        let snapshot: StoreSnapshot = serde_json::from_slice(&data)
          .map_err(|e| eyre!("Failed to deserialize snapshot: {}", e))?;
        Ok(Some(snapshot))
      }
      None => Ok(None),
    }
  }

  fn save(&self, snapshot: &StoreSnapshot) -> Result<()> {
    let data =
      serde_json::to_vec(snapshot).map_err(|e| eyre!("Failed to serialize snapshot: {}", e))?;

    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute(
        "INSERT OR REPLACE INTO state_blobs (storage_key, data, saved_at)
         VALUES (?, ?, datetime('now'))",
        params![STORAGE_KEY, data],
      )
      .map_err(|e| eyre!("Failed to save snapshot: {}", e))?;

    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::crm::types::{Lead, LeadSource, LeadStatus};
  use chrono::Utc;

  fn lead(id: &str) -> Lead {
    Lead {
      id: id.to_string(),
      name: format!("Lead {}", id),
      email: format!("{}@example.com", id),
      phone: None,
      source: LeadSource::Web,
      status: LeadStatus::New,
      score: Some(40),
      assigned_to: None,
      notes: None,
      created_at: Utc::now(),
      updated_at: Utc::now(),
    }
  }

  #[test]
  fn noop_storage_loads_nothing() {
    let storage = NoopStorage;
    storage
      .save(&StoreSnapshot {
        leads: vec![lead("l1")],
        ..Default::default()
      })
      .unwrap();
    assert!(storage.load().unwrap().is_none());
  }

  #[test]
  fn memory_storage_round_trips() {
    let storage = MemoryStorage::new();
    assert!(storage.load().unwrap().is_none());

    let snapshot = StoreSnapshot {
      leads: vec![lead("l1"), lead("l2")],
      ..Default::default()
    };
    storage.save(&snapshot).unwrap();

    let loaded = storage.load().unwrap().unwrap();
    assert_eq!(loaded.leads, snapshot.leads);
    assert!(loaded.accounts.is_empty());
  }

  #[test]
  fn sqlite_storage_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.db");

    let snapshot = StoreSnapshot {
      leads: vec![lead("l1")],
      ..Default::default()
    };

    {
      let storage = SqliteStorage::open_at(&path).unwrap();
      storage.save(&snapshot).unwrap();
    }

    // Reopen: the blob survives the connection
    let storage = SqliteStorage::open_at(&path).unwrap();
    let loaded = storage.load().unwrap().unwrap();
    assert_eq!(loaded.leads, snapshot.leads);
  }

  #[test]
  fn save_replaces_previous_blob() {
    let dir = tempfile::tempdir().unwrap();
    let storage = SqliteStorage::open_at(&dir.path().join("cache.db")).unwrap();

    storage
      .save(&StoreSnapshot {
        leads: vec![lead("l1"), lead("l2")],
        ..Default::default()
      })
      .unwrap();
    storage
      .save(&StoreSnapshot {
        leads: vec![lead("l3")],
        ..Default::default()
      })
      .unwrap();

    let loaded = storage.load().unwrap().unwrap();
    assert_eq!(loaded.leads.len(), 1);
    assert_eq!(loaded.leads[0].id, "l3");
  }
}
