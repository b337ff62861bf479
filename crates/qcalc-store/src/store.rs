use std::path::Path;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use qcalc_core::{CalcError, CalcResult, KeyValueStore};

use crate::schema::init_db;

/// SQLite-backed key-value store for history and preferences.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn new(path: &Path) -> CalcResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| CalcError::Storage(format!("cannot create db directory: {e}")))?;
        }
        let conn = Connection::open(path)
            .map_err(|e| CalcError::Storage(format!("cannot open database: {e}")))?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .map_err(|e| CalcError::Storage(e.to_string()))?;
        init_db(&conn)?;
        tracing::debug!("opened store at {}", path.display());
        Ok(Self { conn })
    }

    pub fn in_memory() -> CalcResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| CalcError::Storage(format!("cannot open in-memory db: {e}")))?;
        init_db(&conn)?;
        Ok(Self { conn })
    }

    /// Every stored key with its last update time, sorted by key.
    pub fn keys(&self) -> CalcResult<Vec<(String, Option<String>)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT key, updated_at FROM kv ORDER BY key")
            .map_err(|e| CalcError::Storage(e.to_string()))?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
            .map_err(|e| CalcError::Storage(e.to_string()))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| CalcError::Storage(e.to_string()))
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> CalcResult<Option<String>> {
        self.conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()
            .map_err(|e| CalcError::Storage(e.to_string()))
    }

    fn set(&self, key: &str, value: &str) -> CalcResult<()> {
        self.conn
            .execute(
                "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value,
                                                updated_at = excluded.updated_at",
                params![key, value, Utc::now().to_rfc3339()],
            )
            .map_err(|e| CalcError::Storage(e.to_string()))?;
        Ok(())
    }

    fn remove(&self, key: &str) -> CalcResult<()> {
        self.conn
            .execute("DELETE FROM kv WHERE key = ?1", params![key])
            .map_err(|e| CalcError::Storage(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qcalc_core::history::{load_history, save_history, History, HistoryEntry};
    use qcalc_core::store::keys;

    fn test_store() -> SqliteStore {
        SqliteStore::in_memory().unwrap()
    }

    #[test]
    fn test_set_and_get() {
        let store = test_store();
        store.set(keys::THEME, "light").unwrap();
        assert_eq!(store.get(keys::THEME).unwrap().as_deref(), Some("light"));
    }

    #[test]
    fn test_get_not_found() {
        let store = test_store();
        assert!(store.get("nonexistent").unwrap().is_none());
        assert_eq!(store.get_or("nonexistent", "dark"), "dark");
    }

    #[test]
    fn test_overwrite() {
        let store = test_store();
        store.set("k", "1").unwrap();
        store.set("k", "2").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("2"));
        assert_eq!(store.keys().unwrap().len(), 1);
    }

    #[test]
    fn test_remove() {
        let store = test_store();
        store.set("k", "v").unwrap();
        store.remove("k").unwrap();
        assert!(store.get("k").unwrap().is_none());
        // Removing a missing key is not an error
        store.remove("k").unwrap();
    }

    #[test]
    fn test_keys_carry_timestamps() {
        let store = test_store();
        store.set("b", "2").unwrap();
        store.set("a", "1").unwrap();
        let keys = store.keys().unwrap();
        assert_eq!(keys[0].0, "a");
        assert_eq!(keys[1].0, "b");
        assert!(keys.iter().all(|(_, ts)| ts.is_some()));
    }

    #[test]
    fn test_history_round_trip() {
        let store = test_store();
        let mut history = History::with_limit(10);
        history.add(HistoryEntry::new("sqrt(16)", "4"));
        save_history(&store, &history).unwrap();

        let loaded = load_history(&store, 10);
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.entries()[0].result, "4");
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("qcalc.db");
        {
            let store = SqliteStore::new(&path).unwrap();
            store.set(keys::FROM_CURRENCY, "GBP").unwrap();
        }
        let store = SqliteStore::new(&path).unwrap();
        assert_eq!(store.get(keys::FROM_CURRENCY).unwrap().as_deref(), Some("GBP"));
    }
}
