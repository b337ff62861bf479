use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CalcResult;
use crate::graphing::ChartType;
use crate::store::{keys, KeyValueStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

impl Theme {
    pub fn toggle(self) -> Self {
        match self {
            Self::Dark => Self::Light,
            Self::Light => Self::Dark,
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dark => write!(f, "dark"),
            Self::Light => write!(f, "light"),
        }
    }
}

impl FromStr for Theme {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dark" => Ok(Self::Dark),
            "light" => Ok(Self::Light),
            _ => Err(format!("invalid theme: {s}")),
        }
    }
}

/// Stored theme; unknown values fall back to dark.
pub fn load_theme(store: &dyn KeyValueStore) -> Theme {
    store
        .get_or(keys::THEME, "dark")
        .parse()
        .unwrap_or_default()
}

pub fn save_theme(store: &dyn KeyValueStore, theme: Theme) -> CalcResult<()> {
    store.set(keys::THEME, &theme.to_string())
}

/// Flip the stored theme and return the new one.
pub fn toggle_theme(store: &dyn KeyValueStore) -> CalcResult<Theme> {
    let next = load_theme(store).toggle();
    save_theme(store, next)?;
    Ok(next)
}

pub fn load_chart_type(store: &dyn KeyValueStore) -> ChartType {
    store
        .get_or(keys::CHART_TYPE, "function")
        .parse()
        .unwrap_or_default()
}

pub fn save_chart_type(store: &dyn KeyValueStore, chart: ChartType) -> CalcResult<()> {
    store.set(keys::CHART_TYPE, &chart.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemStore;

    #[test]
    fn test_theme_defaults_to_dark() {
        let store = MemStore::default();
        assert_eq!(load_theme(&store), Theme::Dark);
        store.set(keys::THEME, "sepia").unwrap();
        assert_eq!(load_theme(&store), Theme::Dark);
    }

    #[test]
    fn test_toggle_persists() {
        let store = MemStore::default();
        assert_eq!(toggle_theme(&store).unwrap(), Theme::Light);
        assert_eq!(store.get(keys::THEME).unwrap().as_deref(), Some("light"));
        assert_eq!(toggle_theme(&store).unwrap(), Theme::Dark);
    }

    #[test]
    fn test_chart_type_round_trip() {
        let store = MemStore::default();
        assert_eq!(load_chart_type(&store), ChartType::Function);
        save_chart_type(&store, ChartType::Pie).unwrap();
        assert_eq!(load_chart_type(&store), ChartType::Pie);
    }
}
