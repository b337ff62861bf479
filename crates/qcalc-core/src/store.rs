use crate::error::CalcResult;

/// Keys the shell persists between sessions.
pub mod keys {
    pub const HISTORY: &str = "calcHistory";
    pub const FROM_CURRENCY: &str = "fromCurrency";
    pub const TO_CURRENCY: &str = "toCurrency";
    pub const THEME: &str = "theme";
    pub const CHART_TYPE: &str = "graphing_activeChartType";
}

/// Flat string key-value storage, the only persistence the shell needs.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> CalcResult<Option<String>>;
    fn set(&self, key: &str, value: &str) -> CalcResult<()>;
    fn remove(&self, key: &str) -> CalcResult<()>;

    /// Read a key, falling back to `default` when it is missing or unreadable.
    fn get_or(&self, key: &str, default: &str) -> String {
        match self.get(key) {
            Ok(Some(v)) => v,
            Ok(None) => default.to_string(),
            Err(e) => {
                tracing::warn!("could not read {key}: {e}");
                default.to_string()
            }
        }
    }
}

#[cfg(test)]
pub(crate) use test_support::MemStore;

#[cfg(test)]
mod test_support {
    use std::cell::RefCell;
    use std::collections::HashMap;

    use super::KeyValueStore;
    use crate::error::CalcResult;

    #[derive(Default)]
    pub(crate) struct MemStore(RefCell<HashMap<String, String>>);

    impl KeyValueStore for MemStore {
        fn get(&self, key: &str) -> CalcResult<Option<String>> {
            Ok(self.0.borrow().get(key).cloned())
        }

        fn set(&self, key: &str, value: &str) -> CalcResult<()> {
            self.0.borrow_mut().insert(key.into(), value.into());
            Ok(())
        }

        fn remove(&self, key: &str) -> CalcResult<()> {
            self.0.borrow_mut().remove(key);
            Ok(())
        }
    }
}
