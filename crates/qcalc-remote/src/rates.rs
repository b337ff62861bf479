use std::collections::BTreeMap;
use std::time::Duration;

use chrono::NaiveDate;
use serde::Deserialize;

use qcalc_core::currency::{history_points, RatePoint, RatesSnapshot};
use qcalc_core::{CalcError, CalcResult};

pub const DEFAULT_RATES_URL: &str = "https://open.exchangerate-api.com/v6/latest";
pub const DEFAULT_HISTORY_URL: &str = "https://api.frankfurter.app";

/// Client for the latest-rates and rate-history endpoints.
pub struct RatesClient {
    agent: ureq::Agent,
    rates_url: String,
    history_url: String,
}

#[derive(Deserialize)]
struct LatestResponse {
    #[serde(default)]
    result: Option<String>,
    #[serde(flatten)]
    snapshot: RatesSnapshot,
}

#[derive(Deserialize)]
struct HistoryResponse {
    rates: BTreeMap<String, BTreeMap<String, f64>>,
}

impl RatesClient {
    pub fn new(rates_url: impl Into<String>, history_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
            rates_url: rates_url.into(),
            history_url: history_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn latest(&self) -> CalcResult<RatesSnapshot> {
        tracing::debug!("fetching latest rates from {}", self.rates_url);
        let response: LatestResponse = self
            .agent
            .get(&self.rates_url)
            .call()
            .map_err(map_ureq_error)?
            .into_json()
            .map_err(|e| CalcError::Network(format!("invalid rates response: {e}")))?;
        parse_latest(response)
    }

    /// Daily `from -> to` rates between `start` and `end`, oldest first.
    pub fn history(
        &self,
        from: &str,
        to: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> CalcResult<Vec<RatePoint>> {
        let url = history_endpoint(&self.history_url, start, end);
        tracing::debug!("fetching {from}/{to} history from {url}");
        let response: HistoryResponse = self
            .agent
            .get(&url)
            .query("from", from)
            .query("to", to)
            .call()
            .map_err(map_ureq_error)?
            .into_json()
            .map_err(|e| CalcError::Network(format!("invalid history response: {e}")))?;
        history_points(&response.rates, to)
    }
}

fn parse_latest(response: LatestResponse) -> CalcResult<RatesSnapshot> {
    match response.result.as_deref() {
        None | Some("success") => {}
        Some(other) => {
            return Err(CalcError::Network(format!("rates service reported '{other}'")));
        }
    }
    if response.snapshot.rates.is_empty() {
        return Err(CalcError::Network("rates service returned no rates".into()));
    }
    Ok(response.snapshot)
}

fn history_endpoint(base: &str, start: NaiveDate, end: NaiveDate) -> String {
    format!("{base}/{}..{}", start.format("%Y-%m-%d"), end.format("%Y-%m-%d"))
}

fn map_ureq_error(e: ureq::Error) -> CalcError {
    match e {
        ureq::Error::Status(code, resp) => {
            CalcError::Network(format!("HTTP {code} from {}", resp.get_url()))
        }
        ureq::Error::Transport(t) => CalcError::Network(t.to_string()),
    }
}
