use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::error::CalcResult;
use crate::store::{keys, KeyValueStore};

pub const DEFAULT_HISTORY_LIMIT: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub expression: String,
    pub result: String,
    pub timestamp: String,
    #[serde(default)]
    pub is_favorite: bool,
}

impl HistoryEntry {
    pub fn new(expression: impl Into<String>, result: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
            result: result.into(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            is_favorite: false,
        }
    }

    pub fn parsed_timestamp(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.timestamp)
            .map(|d| d.with_timezone(&Utc))
            .ok()
    }
}

/// Past calculations, most recent first, capped at `limit` entries.
#[derive(Debug, Clone)]
pub struct History {
    entries: Vec<HistoryEntry>,
    limit: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::with_limit(DEFAULT_HISTORY_LIMIT)
    }
}

impl History {
    pub fn with_limit(limit: usize) -> Self {
        Self {
            entries: Vec::new(),
            limit: limit.max(1),
        }
    }

    pub fn from_entries(mut entries: Vec<HistoryEntry>, limit: usize) -> Self {
        let limit = limit.max(1);
        entries.truncate(limit);
        Self { entries, limit }
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn add(&mut self, entry: HistoryEntry) {
        self.entries.insert(0, entry);
        self.entries.truncate(self.limit);
    }

    /// Flip the favorite flag of every entry recorded at `timestamp`.
    /// Returns the number of entries touched.
    pub fn toggle_favorite(&mut self, timestamp: &str) -> usize {
        let mut touched = 0;
        for entry in self.entries.iter_mut().filter(|e| e.timestamp == timestamp) {
            entry.is_favorite = !entry.is_favorite;
            touched += 1;
        }
        touched
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn find(&self, timestamp: &str) -> Option<&HistoryEntry> {
        self.entries.iter().find(|e| e.timestamp == timestamp)
    }

    /// Entries whose expression or result contains `term` (case-insensitive),
    /// favorites first, then newest first.
    pub fn filtered(&self, term: &str) -> Vec<&HistoryEntry> {
        let needle = term.to_lowercase();
        let mut out: Vec<&HistoryEntry> = self
            .entries
            .iter()
            .filter(|e| {
                e.expression.to_lowercase().contains(&needle)
                    || e.result.to_lowercase().contains(&needle)
            })
            .collect();
        out.sort_by(|a, b| match (a.is_favorite, b.is_favorite) {
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            _ => compare_newest_first(a, b),
        });
        out
    }

    pub fn to_json(&self) -> CalcResult<String> {
        Ok(serde_json::to_string_pretty(&self.entries)?)
    }

    pub fn to_csv(&self) -> String {
        let mut out = String::from("\"Timestamp\",\"Expression\",\"Result\",\"Is Favorite\"\n");
        let rows: Vec<String> = self
            .entries
            .iter()
            .map(|e| {
                format!(
                    "{},{},{},{}",
                    escape_csv(&e.timestamp),
                    escape_csv(&e.expression),
                    escape_csv(&e.result),
                    e.is_favorite
                )
            })
            .collect();
        out.push_str(&rows.join("\n"));
        out
    }
}

fn compare_newest_first(a: &HistoryEntry, b: &HistoryEntry) -> Ordering {
    match (a.parsed_timestamp(), b.parsed_timestamp()) {
        (Some(ta), Some(tb)) => tb.cmp(&ta),
        _ => b.timestamp.cmp(&a.timestamp),
    }
}

fn escape_csv(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Load persisted history. Unreadable data yields an empty history.
pub fn load_history(store: &dyn KeyValueStore, limit: usize) -> History {
    let raw = match store.get(keys::HISTORY) {
        Ok(Some(raw)) => raw,
        Ok(None) => return History::with_limit(limit),
        Err(e) => {
            tracing::warn!("could not read history: {e}");
            return History::with_limit(limit);
        }
    };
    match serde_json::from_str::<Vec<HistoryEntry>>(&raw) {
        Ok(entries) => History::from_entries(entries, limit),
        Err(e) => {
            tracing::warn!("could not parse history: {e}");
            History::with_limit(limit)
        }
    }
}

pub fn save_history(store: &dyn KeyValueStore, history: &History) -> CalcResult<()> {
    let json = serde_json::to_string(history.entries())?;
    store.set(keys::HISTORY, &json)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(i: usize) -> HistoryEntry {
        HistoryEntry {
            expression: format!("{i}+{i}"),
            result: format!("{}", i * 2),
            timestamp: format!("2024-01-01T00:{:02}:{:02}.000Z", i / 60, i % 60),
            is_favorite: false,
        }
    }

    #[test]
    fn test_add_keeps_most_recent_first() {
        let mut h = History::default();
        h.add(entry(1));
        h.add(entry(2));
        assert_eq!(h.entries()[0].expression, "2+2");
        assert_eq!(h.entries()[1].expression, "1+1");
    }

    #[test]
    fn test_cap_keeps_last_hundred() {
        let mut h = History::default();
        for i in 0..150 {
            h.add(entry(i));
        }
        assert_eq!(h.len(), 100);
        assert_eq!(h.entries()[0].expression, "149+149");
        assert_eq!(h.entries()[99].expression, "50+50");
    }

    #[test]
    fn test_toggle_favorite_twice_restores() {
        let mut h = History::default();
        for i in 0..5 {
            h.add(entry(i));
        }
        let before = h.entries().to_vec();
        let ts = before[2].timestamp.clone();
        assert_eq!(h.toggle_favorite(&ts), 1);
        assert!(h.entries()[2].is_favorite);
        h.toggle_favorite(&ts);
        assert_eq!(h.entries(), before.as_slice());
    }

    #[test]
    fn test_toggle_favorite_does_not_reorder() {
        let mut h = History::default();
        for i in 0..5 {
            h.add(entry(i));
        }
        let order: Vec<String> = h.entries().iter().map(|e| e.expression.clone()).collect();
        let ts = h.entries()[3].timestamp.clone();
        h.toggle_favorite(&ts);
        let after: Vec<String> = h.entries().iter().map(|e| e.expression.clone()).collect();
        assert_eq!(order, after);
    }

    #[test]
    fn test_toggle_unknown_timestamp() {
        let mut h = History::default();
        h.add(entry(1));
        assert_eq!(h.toggle_favorite("nope"), 0);
    }

    #[test]
    fn test_filtered_favorites_first() {
        let mut h = History::default();
        for i in 0..4 {
            h.add(entry(i));
        }
        let ts = h.entries()[3].timestamp.clone(); // oldest
        h.toggle_favorite(&ts);
        let out = h.filtered("");
        assert_eq!(out[0].expression, "0+0");
        assert_eq!(out[1].expression, "3+3");
        assert_eq!(out[3].expression, "1+1");
    }

    #[test]
    fn test_filtered_matches_result_case_insensitive() {
        let mut h = History::default();
        h.add(HistoryEntry {
            expression: "SQRT(16)".into(),
            result: "4".into(),
            timestamp: "2024-01-01T00:00:00.000Z".into(),
            is_favorite: false,
        });
        h.add(entry(7));
        assert_eq!(h.filtered("sqrt").len(), 1);
        assert_eq!(h.filtered("14").len(), 1);
        assert!(h.filtered("zzz").is_empty());
    }

    #[test]
    fn test_csv_export_escapes_quotes() {
        let mut h = History::default();
        h.add(HistoryEntry {
            expression: "say \"hi\"".into(),
            result: "1".into(),
            timestamp: "t".into(),
            is_favorite: true,
        });
        let csv = h.to_csv();
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some("\"Timestamp\",\"Expression\",\"Result\",\"Is Favorite\""));
        assert_eq!(lines.next(), Some("\"t\",\"say \"\"hi\"\"\",\"1\",true"));
    }

    #[test]
    fn test_deserialize_without_favorite_flag() {
        let json = r#"[{"expression":"1+1","result":"2","timestamp":"2024-01-01T00:00:00.000Z"}]"#;
        let entries: Vec<HistoryEntry> = serde_json::from_str(json).unwrap();
        assert!(!entries[0].is_favorite);
        let out = serde_json::to_string(&entries[0]).unwrap();
        assert!(out.contains("\"isFavorite\":false"));
    }

    #[test]
    fn test_from_entries_truncates() {
        let entries: Vec<HistoryEntry> = (0..10).map(entry).collect();
        let h = History::from_entries(entries, 3);
        assert_eq!(h.len(), 3);
    }

    #[test]
    fn test_load_save_through_store() {
        let store = crate::store::MemStore::default();
        assert!(load_history(&store, 50).is_empty());

        let mut h = History::with_limit(50);
        h.add(entry(1));
        h.add(entry(2));
        save_history(&store, &h).unwrap();
        assert_eq!(load_history(&store, 50).entries(), h.entries());

        store.set(keys::HISTORY, "not json").unwrap();
        assert!(load_history(&store, 50).is_empty());
    }
}
