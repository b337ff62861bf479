//! Network-backed services: exchange rates and AI explanations.

pub mod gemini;
pub mod rates;

pub use gemini::GeminiExplainer;
pub use qcalc_core::explain::DisabledExplainer;
pub use rates::RatesClient;
