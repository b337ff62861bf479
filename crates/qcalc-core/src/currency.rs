//! Currency conversion over a snapshot of exchange rates.
//!
//! Rates are quoted against a single base currency; converting between two
//! codes goes through that base.

use std::collections::BTreeMap;

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{CalcError, CalcResult};
use crate::store::{keys, KeyValueStore};

pub const DEFAULT_FROM: &str = "USD";
pub const DEFAULT_TO: &str = "EUR";
pub const HISTORY_DAYS: u64 = 30;

/// Latest rates as published by the rates endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatesSnapshot {
    pub rates: BTreeMap<String, f64>,
    #[serde(default)]
    pub time_last_update_utc: String,
}

impl RatesSnapshot {
    fn rate(&self, code: &str) -> CalcResult<f64> {
        self.rates
            .get(code)
            .copied()
            .filter(|r| *r > 0.0)
            .ok_or_else(|| CalcError::invalid(format!("No exchange rate available for {code}.")))
    }

    /// Codes in alphabetical order.
    pub fn sorted_codes(&self) -> Vec<&str> {
        self.rates.keys().map(String::as_str).collect()
    }
}

/// Units of `to` per one unit of `from`.
pub fn exchange_rate(snapshot: &RatesSnapshot, from: &str, to: &str) -> CalcResult<f64> {
    Ok(snapshot.rate(to)? / snapshot.rate(from)?)
}

/// Convert `amount` of `from` into `to`, rounded to cents.
pub fn convert(snapshot: &RatesSnapshot, amount: f64, from: &str, to: &str) -> CalcResult<f64> {
    let in_base = amount / snapshot.rate(from)?;
    Ok(round_cents(in_base * snapshot.rate(to)?))
}

/// The amount of `from` needed to obtain `amount` of `to`.
pub fn convert_reverse(snapshot: &RatesSnapshot, amount: f64, from: &str, to: &str) -> CalcResult<f64> {
    convert(snapshot, amount, to, from)
}

fn round_cents(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// `1 USD = 0.9200 EUR`
pub fn rate_text(snapshot: &RatesSnapshot, from: &str, to: &str) -> String {
    match exchange_rate(snapshot, from, to) {
        Ok(rate) => format!("1 {from} = {rate:.4} {to}"),
        Err(_) => "N/A".into(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatePoint {
    pub date: NaiveDate,
    pub rate: f64,
}

/// Start and end dates for a history request ending on `today`.
pub fn history_window(today: NaiveDate, days: u64) -> (NaiveDate, NaiveDate) {
    let start = today.checked_sub_days(Days::new(days)).unwrap_or(today);
    (start, today)
}

/// Turn a `date -> {code -> rate}` map into date-sorted points for `to`.
pub fn history_points(
    rates: &BTreeMap<String, BTreeMap<String, f64>>,
    to: &str,
) -> CalcResult<Vec<RatePoint>> {
    let mut points: Vec<RatePoint> = rates
        .iter()
        .filter_map(|(date, by_code)| {
            let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;
            let rate = *by_code.get(to)?;
            Some(RatePoint { date, rate })
        })
        .collect();
    points.sort_by_key(|p| p.date);
    if points.len() < 2 {
        return Err(CalcError::invalid("Not enough historical data to draw a chart."));
    }
    Ok(points)
}

/// Last-used currency pair, defaulting to USD/EUR.
pub fn load_pair(store: &dyn KeyValueStore) -> (String, String) {
    (
        store.get_or(keys::FROM_CURRENCY, DEFAULT_FROM),
        store.get_or(keys::TO_CURRENCY, DEFAULT_TO),
    )
}

pub fn save_pair(store: &dyn KeyValueStore, from: &str, to: &str) {
    if let Err(e) = store
        .set(keys::FROM_CURRENCY, from)
        .and_then(|_| store.set(keys::TO_CURRENCY, to))
    {
        tracing::warn!("could not save currency pair: {e}");
    }
}

pub fn currency_name(code: &str) -> Option<&'static str> {
    CURRENCY_NAMES
        .binary_search_by(|(c, _)| c.cmp(&code))
        .ok()
        .map(|i| CURRENCY_NAMES[i].1)
}

/// Sorted by code.
pub const CURRENCY_NAMES: &[(&str, &str)] = &[
    ("AED", "United Arab Emirates Dirham"),
    ("AFN", "Afghan Afghani"),
    ("ALL", "Albanian Lek"),
    ("AMD", "Armenian Dram"),
    ("ANG", "Netherlands Antillean Guilder"),
    ("AOA", "Angolan Kwanza"),
    ("ARS", "Argentine Peso"),
    ("AUD", "Australian Dollar"),
    ("AWG", "Aruban Florin"),
    ("AZN", "Azerbaijani Manat"),
    ("BAM", "Bosnia-Herzegovina Convertible Mark"),
    ("BBD", "Barbadian Dollar"),
    ("BDT", "Bangladeshi Taka"),
    ("BGN", "Bulgarian Lev"),
    ("BHD", "Bahraini Dinar"),
    ("BIF", "Burundian Franc"),
    ("BMD", "Bermudan Dollar"),
    ("BND", "Brunei Dollar"),
    ("BOB", "Bolivian Boliviano"),
    ("BRL", "Brazilian Real"),
    ("BSD", "Bahamian Dollar"),
    ("BTN", "Bhutanese Ngultrum"),
    ("BWP", "Botswanan Pula"),
    ("BYN", "Belarusian Ruble"),
    ("BZD", "Belize Dollar"),
    ("CAD", "Canadian Dollar"),
    ("CDF", "Congolese Franc"),
    ("CHF", "Swiss Franc"),
    ("CLP", "Chilean Peso"),
    ("CNY", "Chinese Yuan"),
    ("COP", "Colombian Peso"),
    ("CRC", "Costa Rican Colón"),
    ("CUP", "Cuban Peso"),
    ("CVE", "Cape Verdean Escudo"),
    ("CZK", "Czech Republic Koruna"),
    ("DJF", "Djiboutian Franc"),
    ("DKK", "Danish Krone"),
    ("DOP", "Dominican Peso"),
    ("DZD", "Algerian Dinar"),
    ("EGP", "Egyptian Pound"),
    ("ERN", "Eritrean Nakfa"),
    ("ETB", "Ethiopian Birr"),
    ("EUR", "Euro"),
    ("FJD", "Fijian Dollar"),
    ("FKP", "Falkland Islands Pound"),
    ("GBP", "British Pound Sterling"),
    ("GEL", "Georgian Lari"),
    ("GGP", "Guernsey Pound"),
    ("GHS", "Ghanaian Cedi"),
    ("GIP", "Gibraltar Pound"),
    ("GMD", "Gambian Dalasi"),
    ("GNF", "Guinean Franc"),
    ("GTQ", "Guatemalan Quetzal"),
    ("GYD", "Guyanaese Dollar"),
    ("HKD", "Hong Kong Dollar"),
    ("HNL", "Honduran Lempira"),
    ("HRK", "Croatian Kuna"),
    ("HTG", "Haitian Gourde"),
    ("HUF", "Hungarian Forint"),
    ("IDR", "Indonesian Rupiah"),
    ("ILS", "Israeli New Sheqel"),
    ("IMP", "Manx pound"),
    ("INR", "Indian Rupee"),
    ("IQD", "Iraqi Dinar"),
    ("IRR", "Iranian Rial"),
    ("ISK", "Icelandic Króna"),
    ("JEP", "Jersey Pound"),
    ("JMD", "Jamaican Dollar"),
    ("JOD", "Jordanian Dinar"),
    ("JPY", "Japanese Yen"),
    ("KES", "Kenyan Shilling"),
    ("KGS", "Kyrgystani Som"),
    ("KHR", "Cambodian Riel"),
    ("KMF", "Comorian Franc"),
    ("KPW", "North Korean Won"),
    ("KRW", "South Korean Won"),
    ("KWD", "Kuwaiti Dinar"),
    ("KYD", "Cayman Islands Dollar"),
    ("KZT", "Kazakhstani Tenge"),
    ("LAK", "Laotian Kip"),
    ("LBP", "Lebanese Pound"),
    ("LKR", "Sri Lankan Rupee"),
    ("LRD", "Liberian Dollar"),
    ("LSL", "Lesotho Loti"),
    ("LYD", "Libyan Dinar"),
    ("MAD", "Moroccan Dirham"),
    ("MDL", "Moldovan Leu"),
    ("MGA", "Malagasy Ariary"),
    ("MKD", "Macedonian Denar"),
    ("MMK", "Myanma Kyat"),
    ("MNT", "Mongolian Tugrik"),
    ("MOP", "Macanese Pataca"),
    ("MRU", "Mauritanian Ouguiya"),
    ("MUR", "Mauritian Rupee"),
    ("MVR", "Maldivian Rufiyaa"),
    ("MWK", "Malawian Kwacha"),
    ("MXN", "Mexican Peso"),
    ("MYR", "Malaysian Ringgit"),
    ("MZN", "Mozambican Metical"),
    ("NAD", "Namibian Dollar"),
    ("NGN", "Nigerian Naira"),
    ("NIO", "Nicaraguan Córdoba"),
    ("NOK", "Norwegian Krone"),
    ("NPR", "Nepalese Rupee"),
    ("NZD", "New Zealand Dollar"),
    ("OMR", "Omani Rial"),
    ("PAB", "Panamanian Balboa"),
    ("PEN", "Peruvian Nuevo Sol"),
    ("PGK", "Papua New Guinean Kina"),
    ("PHP", "Philippine Peso"),
    ("PKR", "Pakistani Rupee"),
    ("PLN", "Polish Zloty"),
    ("PYG", "Paraguayan Guarani"),
    ("QAR", "Qatari Rial"),
    ("RON", "Romanian Leu"),
    ("RSD", "Serbian Dinar"),
    ("RUB", "Russian Ruble"),
    ("RWF", "Rwandan Franc"),
    ("SAR", "Saudi Riyal"),
    ("SBD", "Solomon Islands Dollar"),
    ("SCR", "Seychellois Rupee"),
    ("SDG", "Sudanese Pound"),
    ("SEK", "Swedish Krona"),
    ("SGD", "Singapore Dollar"),
    ("SHP", "Saint Helena Pound"),
    ("SLL", "Sierra Leonean Leone"),
    ("SOS", "Somali Shilling"),
    ("SRD", "Surinamese Dollar"),
    ("SSP", "South Sudanese Pound"),
    ("STN", "São Tomé and Príncipe Dobra"),
    ("SVC", "Salvadoran Colón"),
    ("SYP", "Syrian Pound"),
    ("SZL", "Swazi Lilangeni"),
    ("THB", "Thai Baht"),
    ("TJS", "Tajikistani Somoni"),
    ("TMT", "Turkmenistani Manat"),
    ("TND", "Tunisian Dinar"),
    ("TOP", "Tongan Paʻanga"),
    ("TRY", "Turkish Lira"),
    ("TTD", "Trinidad and Tobago Dollar"),
    ("TWD", "New Taiwan Dollar"),
    ("TZS", "Tanzanian Shilling"),
    ("UAH", "Ukrainian Hryvnia"),
    ("UGX", "Ugandan Shilling"),
    ("USD", "United States Dollar"),
    ("UYU", "Uruguayan Peso"),
    ("UZS", "Uzbekistan Som"),
    ("VES", "Venezuelan Bolívar Soberano"),
    ("VND", "Vietnamese Dong"),
    ("VUV", "Vanuatu Vatu"),
    ("WST", "Samoan Tala"),
    ("XAF", "CFA Franc BEAC"),
    ("XCD", "East Caribbean Dollar"),
    ("XDR", "Special Drawing Rights"),
    ("XOF", "CFA Franc BCEAO"),
    ("XPF", "CFP Franc"),
    ("YER", "Yemeni Rial"),
    ("ZAR", "South African Rand"),
    ("ZMW", "Zambian Kwacha"),
    ("ZWL", "Zimbabwean Dollar"),
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemStore;

    fn snapshot() -> RatesSnapshot {
        RatesSnapshot {
            rates: [("USD", 1.0), ("EUR", 0.92), ("JPY", 150.0), ("GBP", 0.8)]
                .into_iter()
                .map(|(c, r)| (c.to_string(), r))
                .collect(),
            time_last_update_utc: "Mon, 01 Jan 2024 00:00:01 +0000".into(),
        }
    }

    #[test]
    fn test_convert_through_base() {
        let s = snapshot();
        assert_eq!(convert(&s, 100.0, "USD", "EUR").unwrap(), 92.0);
        assert_eq!(convert(&s, 92.0, "EUR", "GBP").unwrap(), 80.0);
        assert_eq!(convert_reverse(&s, 92.0, "USD", "EUR").unwrap(), 100.0);
        assert!(convert(&s, 1.0, "USD", "XXX").is_err());
    }

    #[test]
    fn test_rate_text() {
        let s = snapshot();
        assert_eq!(rate_text(&s, "USD", "EUR"), "1 USD = 0.9200 EUR");
        assert_eq!(rate_text(&s, "USD", "ABC"), "N/A");
    }

    #[test]
    fn test_sorted_codes() {
        assert_eq!(snapshot().sorted_codes(), vec!["EUR", "GBP", "JPY", "USD"]);
    }

    #[test]
    fn test_snapshot_deserializes() {
        let json = r#"{"result":"success","time_last_update_utc":"x","rates":{"USD":1,"EUR":0.9}}"#;
        let s: RatesSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(s.rates["EUR"], 0.9);
    }

    #[test]
    fn test_history_points_sorted() {
        let json = r#"{"2024-01-03":{"EUR":0.91},"2024-01-01":{"EUR":0.9},"2024-01-02":{"GBP":0.8}}"#;
        let rates: BTreeMap<String, BTreeMap<String, f64>> = serde_json::from_str(json).unwrap();
        let pts = history_points(&rates, "EUR").unwrap();
        assert_eq!(pts.len(), 2);
        assert!(pts[0].date < pts[1].date);
        assert!(history_points(&rates, "GBP").is_err());
    }

    #[test]
    fn test_history_window() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        let (start, end) = history_window(today, HISTORY_DAYS);
        assert_eq!(start, NaiveDate::from_ymd_opt(2024, 2, 14).unwrap());
        assert_eq!(end, today);
    }

    #[test]
    fn test_pair_defaults_and_persistence() {
        let store = MemStore::default();
        assert_eq!(load_pair(&store), ("USD".to_string(), "EUR".to_string()));
        save_pair(&store, "GBP", "JPY");
        assert_eq!(load_pair(&store), ("GBP".to_string(), "JPY".to_string()));
    }

    #[test]
    fn test_currency_names_sorted() {
        assert!(CURRENCY_NAMES.windows(2).all(|w| w[0].0 < w[1].0));
        assert_eq!(currency_name("EUR"), Some("Euro"));
        assert_eq!(currency_name("ZZZ"), None);
    }
}
