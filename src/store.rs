use anyhow::{anyhow, Context, Result};
use rusqlite::{params, Connection};
use std::path::PathBuf;

use crate::models::{ApplicationRecord, CustomField, Profile};

pub const PROFILE_KEY: &str = "profile";
pub const CUSTOM_FIELDS_KEY: &str = "customFields";
pub const HISTORY_KEY: &str = "applicationHistory";

/// Storage is injected into the workflow and history code rather than
/// accessed as ambient state, so tests can substitute an in-memory fake.
pub trait StoragePort {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

pub struct SqliteStore {
    conn: Connection,
    path: PathBuf,
}

impl SqliteStore {
    pub fn open() -> Result<Self> {
        let path = Self::default_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(&path)?;
        Ok(Self { conn, path })
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    fn default_path() -> Result<PathBuf> {
        // Use XDG data directory or fallback
        if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "blitz") {
            Ok(proj_dirs.data_dir().join("blitz.db"))
        } else {
            Ok(PathBuf::from("blitz.db"))
        }
    }

    pub fn init(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            );
            "#,
        )?;
        Ok(())
    }

    pub fn ensure_initialized(&self) -> Result<()> {
        let tables: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='kv'",
            [],
            |row| row.get(0),
        )?;
        if tables == 0 {
            return Err(anyhow!("Store not initialized. Run 'blitz init' first."));
        }
        Ok(())
    }

    #[cfg(test)]
    pub fn in_memory() -> Result<Self> {
        let store = Self {
            conn: Connection::open_in_memory()?,
            path: PathBuf::from(":memory:"),
        };
        store.init()?;
        Ok(store)
    }
}

impl StoragePort for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let result = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", [key], |row| {
                row.get(0)
            });
        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, datetime('now'))
             ON CONFLICT(key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;
        Ok(())
    }
}

/// HashMap-backed fake for tests.
#[cfg(test)]
pub struct MemoryStore {
    entries: std::cell::RefCell<std::collections::HashMap<String, String>>,
}

#[cfg(test)]
impl MemoryStore {
    pub fn new() -> Self {
        Self {
            entries: std::cell::RefCell::new(std::collections::HashMap::new()),
        }
    }
}

#[cfg(test)]
impl StoragePort for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

// --- Typed access over the port ---

pub fn load_profile(store: &dyn StoragePort) -> Result<Option<Profile>> {
    match store.get(PROFILE_KEY)? {
        Some(json) => {
            let profile = serde_json::from_str(&json).context("Failed to parse stored profile")?;
            Ok(Some(profile))
        }
        None => Ok(None),
    }
}

pub fn save_profile(store: &dyn StoragePort, profile: &Profile) -> Result<()> {
    let json = serde_json::to_string(profile)?;
    store.set(PROFILE_KEY, &json)
}

pub fn load_custom_fields(store: &dyn StoragePort) -> Result<Vec<CustomField>> {
    match store.get(CUSTOM_FIELDS_KEY)? {
        Some(json) => {
            serde_json::from_str(&json).context("Failed to parse stored custom fields")
        }
        None => Ok(Vec::new()),
    }
}

pub fn save_custom_fields(store: &dyn StoragePort, fields: &mut Vec<CustomField>) -> Result<()> {
    CustomField::renumber(fields);
    let json = serde_json::to_string(fields)?;
    store.set(CUSTOM_FIELDS_KEY, &json)
}

pub fn load_history(store: &dyn StoragePort) -> Result<Vec<ApplicationRecord>> {
    match store.get(HISTORY_KEY)? {
        Some(json) => {
            serde_json::from_str(&json).context("Failed to parse stored application history")
        }
        None => Ok(Vec::new()),
    }
}

pub fn save_history(store: &dyn StoragePort, records: &[ApplicationRecord]) -> Result<()> {
    let json = serde_json::to_string(records)?;
    store.set(HISTORY_KEY, &json)
}

/// Appends new records with fresh ids (max existing id + 1, counting up).
/// Batch results arrive with positional ids that would collide otherwise.
pub fn append_history(
    store: &dyn StoragePort,
    new_records: Vec<ApplicationRecord>,
) -> Result<Vec<ApplicationRecord>> {
    let mut history = load_history(store)?;
    let mut next_id = history.iter().map(|r| r.id).max().unwrap_or(0) + 1;
    for mut record in new_records {
        record.id = next_id;
        next_id += 1;
        history.push(record);
    }
    save_history(store, &history)?;
    Ok(history)
}

/// Removes exactly the entry with the given id, leaving the order of the
/// rest unchanged. Returns false if no entry matched.
pub fn delete_history_entry(store: &dyn StoragePort, id: i64) -> Result<bool> {
    let mut history = load_history(store)?;
    let before = history.len();
    history.retain(|record| record.id != id);
    if history.len() == before {
        return Ok(false);
    }
    save_history(store, &history)?;
    Ok(true)
}
