use rusqlite::Connection;

use qcalc_core::CalcError;

pub fn init_db(conn: &Connection) -> Result<(), CalcError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS kv (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at TEXT
        );
        ",
    )
    .map_err(|e| CalcError::Storage(e.to_string()))?;

    // Migration: databases created before timestamps were tracked
    let has_updated_at: bool = conn
        .prepare("SELECT COUNT(*) FROM pragma_table_info('kv') WHERE name='updated_at'")
        .and_then(|mut s| s.query_row([], |row| row.get(0)))
        .map_err(|e| CalcError::Storage(e.to_string()))?;

    if !has_updated_at {
        conn.execute_batch("ALTER TABLE kv ADD COLUMN updated_at TEXT")
            .map_err(|e| CalcError::Storage(e.to_string()))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_db() {
        let conn = Connection::open_in_memory().unwrap();
        init_db(&conn).unwrap();
        // Second call should be idempotent
        init_db(&conn).unwrap();
    }

    #[test]
    fn test_migrates_table_without_timestamp() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE kv (key TEXT PRIMARY KEY, value TEXT NOT NULL)")
            .unwrap();
        init_db(&conn).unwrap();

        let cols: Vec<String> = {
            let mut stmt = conn
                .prepare("SELECT name FROM pragma_table_info('kv') ORDER BY cid")
                .unwrap();
            stmt.query_map([], |row| row.get(0))
                .unwrap()
                .map(|r| r.unwrap())
                .collect()
        };
        assert_eq!(cols, vec!["key", "value", "updated_at"]);
    }
}
