//! `qcalc` settings, read from TOML. Every key is optional.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use qcalc_core::evaluator::DISPLAY_PRECISION;
use qcalc_core::history::DEFAULT_HISTORY_LIMIT;
use qcalc_core::AngleMode;
use qcalc_remote::gemini::DEFAULT_GEMINI_MODEL;
use qcalc_remote::rates::{DEFAULT_HISTORY_URL, DEFAULT_RATES_URL};

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    pub calculator: CalculatorConfig,
    pub history: HistoryConfig,
    pub currency: CurrencyConfig,
    pub ai: AiConfig,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    /// SQLite file; the platform data dir when unset.
    pub path: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct CalculatorConfig {
    pub angle_mode: AngleMode,
    /// Significant digits shown for results.
    pub precision: usize,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub limit: usize,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct CurrencyConfig {
    pub rates_url: String,
    pub history_url: String,
    pub history_days: u64,
    pub timeout_secs: u64,
}

/// Generative AI explanations.
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct AiConfig {
    pub enabled: bool,
    pub model: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    pub base_url: Option<String>,
    pub timeout_secs: u64,
}

// --- Defaults ---

impl Default for CalculatorConfig {
    fn default() -> Self {
        Self {
            angle_mode: AngleMode::Deg,
            precision: DISPLAY_PRECISION,
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

impl Default for CurrencyConfig {
    fn default() -> Self {
        Self {
            rates_url: DEFAULT_RATES_URL.into(),
            history_url: DEFAULT_HISTORY_URL.into(),
            history_days: qcalc_core::currency::HISTORY_DAYS,
            timeout_secs: 10,
        }
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            model: DEFAULT_GEMINI_MODEL.into(),
            api_key_env: "GEMINI_API_KEY".into(),
            base_url: None,
            timeout_secs: 30,
        }
    }
}

impl AiConfig {
    /// The API key, when AI is enabled and the key variable is set.
    pub fn api_key(&self) -> Option<String> {
        if !self.enabled {
            return None;
        }
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
    }
}

/// Read the config file if there is one, otherwise use defaults.
pub fn load_config() -> Result<Config> {
    match config_path() {
        Some(p) if p.exists() => load_from(&p),
        _ => Ok(Config::default()),
    }
}

pub fn load_from(path: &Path) -> Result<Config> {
    let text =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

/// `$QCALC_CONFIG`, else `~/.config/qcalc/config.toml`.
fn config_path() -> Option<PathBuf> {
    if let Some(p) = std::env::var_os("QCALC_CONFIG") {
        return Some(PathBuf::from(p));
    }
    directories::BaseDirs::new()
        .map(|dirs| dirs.home_dir().join(".config").join("qcalc").join("config.toml"))
}

/// Where `qcalc config` says the settings came from.
pub fn show_config_path() -> String {
    match config_path() {
        Some(p) if p.exists() => format!("{} (loaded)", p.display()),
        Some(p) => format!("{} (missing, defaults in use)", p.display()),
        None => "no home directory, defaults in use".into(),
    }
}
