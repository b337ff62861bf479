//! Key-by-key state of the scientific calculator.

use std::collections::VecDeque;

use crate::error::{CalcError, CalcResult};
use crate::evaluator::{format_number, Evaluator, DISPLAY_PRECISION};
use crate::history::HistoryEntry;

pub const TICKER_LEN: usize = 5;

const SEGMENT_BREAKS: &[char] = &['+', '-', '−', '×', '÷', '(', '*', '/'];
const OPERATOR_SYMBOLS: &[&str] = &["+", "−", "-", "×", "÷", "*", "/", "^", "%"];

/// Key text and what the same key enters while `2nd` is active.
const SECOND_FUNCTIONS: &[(&str, &str)] = &[
    ("sin(", "asin("),
    ("cos(", "acos("),
    ("tan(", "atan("),
    ("sinh(", "asinh("),
    ("cosh(", "acosh("),
    ("tanh(", "atanh("),
    ("log10(", "log2("),
    ("log(", "log2("),
    ("sqrt(", "cbrt("),
    ("√(", "∛("),
    ("^2", "^3"),
];

/// The alternate text for a key, or the key itself when it has none.
pub fn second_function(key: &str) -> &str {
    SECOND_FUNCTIONS
        .iter()
        .find(|(primary, _)| *primary == key)
        .map_or(key, |&(_, alt)| alt)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryKey {
    Clear,
    Recall,
    Store,
    Add,
    Subtract,
}

impl std::str::FromStr for MemoryKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "MC" => Ok(Self::Clear),
            "MR" => Ok(Self::Recall),
            "MS" => Ok(Self::Store),
            "M+" => Ok(Self::Add),
            "M-" | "M−" => Ok(Self::Subtract),
            _ => Err(format!("invalid memory key: {s}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Keypad {
    pub expression: String,
    pub current_input: String,
    pub is_result: bool,
    pub error: Option<String>,
    pub memory: Option<f64>,
    pub is_second: bool,
    precision: usize,
    ticker: VecDeque<HistoryEntry>,
    evaluator: Evaluator,
}

impl Default for Keypad {
    fn default() -> Self {
        Self::new(Evaluator::default())
    }
}

impl Keypad {
    pub fn new(evaluator: Evaluator) -> Self {
        Self {
            expression: String::new(),
            current_input: "0".into(),
            is_result: false,
            error: None,
            memory: None,
            is_second: false,
            precision: DISPLAY_PRECISION,
            ticker: VecDeque::with_capacity(TICKER_LEN),
            evaluator,
        }
    }

    /// Significant digits for results and memory recall.
    pub fn with_precision(mut self, precision: usize) -> Self {
        self.precision = precision;
        self
    }

    pub fn evaluator(&self) -> &Evaluator {
        &self.evaluator
    }

    pub fn set_evaluator(&mut self, evaluator: Evaluator) {
        self.evaluator = evaluator;
    }

    /// Last results, newest first.
    pub fn ticker(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.ticker.iter()
    }

    /// Digit, `.`, `E` or a constant. Consumes an active `2nd`.
    pub fn input(&mut self, token: &str) {
        self.error = None;
        let token = self.take_second(token);
        if self.is_result {
            self.expression.clear();
            self.current_input = if token == "." { "0.".into() } else { token.into() };
            self.is_result = false;
            return;
        }
        if self.current_input == "0" && token != "." {
            self.current_input = token.into();
            return;
        }
        let segment = self
            .current_input
            .rsplit(SEGMENT_BREAKS)
            .next()
            .unwrap_or_default();
        if (token == "." && segment.contains('.')) || (token == "E" && segment.contains('E')) {
            return;
        }
        self.current_input.push_str(token);
    }

    /// `display` is the function's opening text, e.g. `sin(`. With `2nd`
    /// active the inverse is entered instead.
    pub fn function(&mut self, display: &str) {
        self.error = None;
        let display = self.take_second(display);
        if self.is_result {
            self.expression = format!("{display}{})", self.current_input);
            self.current_input.clear();
            self.is_result = false;
            return;
        }
        if self.current_input == "0" {
            self.current_input = display.into();
        } else {
            self.current_input.push_str(display);
        }
    }

    pub fn operator(&mut self, op: &str) {
        self.error = None;
        if self.is_result {
            self.expression = format!("{} {op} ", self.current_input);
            self.current_input.clear();
            self.is_result = false;
            return;
        }
        if self.current_input.is_empty() {
            if self.expression.is_empty() {
                return;
            }
            let trimmed = self.expression.trim_end();
            if let Some(last) = trimmed.rsplit(' ').next() {
                if OPERATOR_SYMBOLS.contains(&last) {
                    let keep = trimmed.len() - last.len();
                    self.expression.truncate(keep);
                    self.expression = format!("{} {op} ", self.expression.trim_end());
                    return;
                }
            }
            self.expression = format!("{trimmed} {op} ");
            return;
        }
        self.expression = format!("{}{} {op} ", self.expression, self.current_input);
        self.current_input.clear();
    }

    pub fn backspace(&mut self) {
        if self.is_result {
            self.clear();
            return;
        }
        self.error = None;
        self.current_input.pop();
        if self.current_input.is_empty() && self.expression.is_empty() {
            self.current_input = "0".into();
        }
    }

    pub fn clear(&mut self) {
        self.expression.clear();
        self.current_input = "0".into();
        self.is_result = false;
        self.error = None;
    }

    /// Put a past calculation back on the display for editing.
    pub fn load(&mut self, entry: &HistoryEntry) {
        self.expression.clear();
        self.current_input = entry.expression.clone();
        self.is_result = false;
        self.error = None;
    }

    pub fn toggle_second(&mut self) {
        self.is_second = !self.is_second;
    }

    fn take_second<'a>(&mut self, key: &'a str) -> &'a str {
        if std::mem::take(&mut self.is_second) {
            second_function(key)
        } else {
            key
        }
    }

    pub fn memory(&mut self, key: MemoryKey) {
        match key {
            MemoryKey::Clear => self.memory = None,
            MemoryKey::Recall => {
                if let Some(m) = self.memory {
                    let text = format_number(m, self.precision);
                    if self.is_result || self.current_input == "0" {
                        if self.is_result {
                            self.expression.clear();
                            self.is_result = false;
                        }
                        self.current_input = text;
                    } else {
                        self.current_input.push_str(&text);
                    }
                }
            }
            MemoryKey::Store | MemoryKey::Add | MemoryKey::Subtract => {
                let Some(value) = self.current_value() else {
                    return;
                };
                self.memory = Some(match key {
                    MemoryKey::Store => value,
                    MemoryKey::Add => self.memory.unwrap_or(0.0) + value,
                    _ => self.memory.unwrap_or(0.0) - value,
                });
            }
        }
    }

    fn current_value(&self) -> Option<f64> {
        if self.current_input.is_empty() {
            return None;
        }
        match self.evaluator.evaluate(&self.current_input) {
            Ok(ev) => Some(ev.value),
            Err(e) => {
                tracing::debug!("memory ignored non-numeric input: {e}");
                None
            }
        }
    }

    /// Evaluate `expression + current_input`. On success the returned entry
    /// should be recorded in the history.
    pub fn calculate(&mut self) -> CalcResult<HistoryEntry> {
        let full = format!("{}{}", self.expression, self.current_input);
        if full.trim().is_empty() {
            return Err(CalcError::Syntax("empty expression".into()));
        }
        match self.evaluator.evaluate(&full) {
            Ok(ev) => {
                let display = format_number(ev.value, self.precision);
                let entry = HistoryEntry::new(ev.expression.trim(), display.clone());
                self.expression = format!("{} =", ev.expression.trim());
                self.current_input = display;
                self.is_result = true;
                self.error = None;
                self.ticker.push_front(entry.clone());
                self.ticker.truncate(TICKER_LEN);
                Ok(entry)
            }
            Err(e) => {
                self.error = Some(e.to_string());
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(k: &mut Keypad, seq: &[&str]) {
        for s in seq {
            k.input(s);
        }
    }

    #[test]
    fn test_leading_zero_replaced() {
        let mut k = Keypad::default();
        k.input("7");
        assert_eq!(k.current_input, "7");
        let mut k = Keypad::default();
        k.input(".");
        assert_eq!(k.current_input, "0.");
    }

    #[test]
    fn test_single_decimal_point_per_segment() {
        let mut k = Keypad::default();
        keys(&mut k, &["1", ".", "5", ".", "2"]);
        assert_eq!(k.current_input, "1.52");
    }

    #[test]
    fn test_single_exponent_marker() {
        let mut k = Keypad::default();
        keys(&mut k, &["2", "E", "3", "E"]);
        assert_eq!(k.current_input, "2E3");
    }

    #[test]
    fn test_operator_replaces_trailing_operator() {
        let mut k = Keypad::default();
        k.input("2");
        k.operator("+");
        k.operator("×");
        assert_eq!(k.expression, "2 × ");
        k.input("3");
        let entry = k.calculate().unwrap();
        assert_eq!(entry.result, "6");
        assert_eq!(k.expression, "2 × 3 =");
    }

    #[test]
    fn test_calculate_records_ticker() {
        let mut k = Keypad::default();
        for i in 0..7 {
            k.clear();
            k.input(&i.to_string());
            k.operator("+");
            k.input("1");
            k.calculate().unwrap();
        }
        let ticker: Vec<&HistoryEntry> = k.ticker().collect();
        assert_eq!(ticker.len(), TICKER_LEN);
        assert_eq!(ticker[0].result, "7");
    }

    #[test]
    fn test_result_state_starts_fresh() {
        let mut k = Keypad::default();
        keys(&mut k, &["4"]);
        k.calculate().unwrap();
        k.input("9");
        assert_eq!(k.current_input, "9");
        assert!(k.expression.is_empty());
        assert!(!k.is_result);
    }

    #[test]
    fn test_operator_after_result_continues() {
        let mut k = Keypad::default();
        k.input("4");
        k.calculate().unwrap();
        k.operator("+");
        k.input("1");
        assert_eq!(k.calculate().unwrap().result, "5");
    }

    #[test]
    fn test_function_wraps_result() {
        let mut k = Keypad::default();
        k.input("16");
        k.calculate().unwrap();
        k.function("sqrt(");
        assert_eq!(k.expression, "sqrt(16)");
        assert_eq!(k.calculate().unwrap().result, "4");
    }

    #[test]
    fn test_function_autocloses() {
        let mut k = Keypad::default();
        k.function("√(");
        k.input("9");
        assert_eq!(k.calculate().unwrap().result, "3");
    }

    #[test]
    fn test_failure_sets_error_without_entry() {
        let mut k = Keypad::default();
        k.input("1");
        k.operator("÷");
        k.input("0");
        assert!(k.calculate().is_err());
        assert_eq!(k.error.as_deref(), Some("Error: Cannot divide by zero"));
        assert_eq!(k.ticker().count(), 0);
        assert!(!k.is_result);
    }

    #[test]
    fn test_backspace() {
        let mut k = Keypad::default();
        keys(&mut k, &["1", "2"]);
        k.backspace();
        assert_eq!(k.current_input, "1");
        k.backspace();
        assert_eq!(k.current_input, "0");
        k.calculate().unwrap();
        k.backspace();
        assert_eq!(k.current_input, "0");
        assert!(k.expression.is_empty());
    }

    #[test]
    fn test_memory_keys() {
        let mut k = Keypad::default();
        k.input("5");
        k.memory(MemoryKey::Store);
        k.memory(MemoryKey::Add);
        assert_eq!(k.memory, Some(10.0));
        k.memory(MemoryKey::Subtract);
        assert_eq!(k.memory, Some(5.0));
        k.clear();
        k.memory(MemoryKey::Recall);
        assert_eq!(k.current_input, "5");
        k.memory(MemoryKey::Clear);
        assert_eq!(k.memory, None);
    }

    #[test]
    fn test_load_history_entry() {
        let mut k = Keypad::default();
        let e = HistoryEntry::new("2+2", "4");
        k.load(&e);
        assert_eq!(k.current_input, "2+2");
        assert_eq!(k.calculate().unwrap().result, "4");
    }

    #[test]
    fn test_second_swaps_to_inverse() {
        let mut k = Keypad::default();
        k.toggle_second();
        k.function("sin(");
        assert!(!k.is_second);
        k.input("1");
        assert_eq!(k.current_input, "asin(1");
        assert_eq!(k.calculate().unwrap().result, "90");

        k.clear();
        k.function("sin(");
        k.input("90");
        assert_eq!(k.calculate().unwrap().result, "1");
    }

    #[test]
    fn test_second_applies_to_one_key() {
        let mut k = Keypad::default();
        k.input("2");
        k.toggle_second();
        k.input("^2");
        k.input("^2");
        assert_eq!(k.current_input, "2^3^2");
        assert_eq!(second_function("√("), "∛(");
        assert_eq!(second_function("7"), "7");
    }

    #[test]
    fn test_precision_applies_to_results() {
        let mut k = Keypad::default().with_precision(4);
        k.input("1");
        k.operator("÷");
        k.input("3");
        assert_eq!(k.calculate().unwrap().result, format_number(1.0 / 3.0, 4));
        k.memory(MemoryKey::Store);
        k.clear();
        k.memory(MemoryKey::Recall);
        assert_eq!(k.current_input, format_number(1.0 / 3.0, 4));
        assert_ne!(k.current_input, format_number(1.0 / 3.0, DISPLAY_PRECISION));
    }

    #[test]
    fn test_memory_key_parse() {
        assert_eq!("m+".parse::<MemoryKey>().unwrap(), MemoryKey::Add);
        assert!("MX".parse::<MemoryKey>().is_err());
    }
}
