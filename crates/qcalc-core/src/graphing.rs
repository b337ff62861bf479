use std::fmt;

use meval::Expr;
use serde::{Deserialize, Serialize};

use crate::error::{CalcError, CalcResult};
use crate::evaluator::{balance_parentheses, normalize, Evaluator};

/// Intervals between the first and last plotted sample.
pub const FUNCTION_STEPS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartType {
    #[default]
    Function,
    Scatter,
    Bar,
    Histogram,
    Pie,
}

impl fmt::Display for ChartType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Function => write!(f, "function"),
            Self::Scatter => write!(f, "scatter"),
            Self::Bar => write!(f, "bar"),
            Self::Histogram => write!(f, "histogram"),
            Self::Pie => write!(f, "pie"),
        }
    }
}

impl std::str::FromStr for ChartType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "function" => Ok(Self::Function),
            "scatter" => Ok(Self::Scatter),
            "bar" => Ok(Self::Bar),
            "histogram" => Ok(Self::Histogram),
            "pie" => Ok(Self::Pie),
            _ => Err(format!("invalid chart type: {s}")),
        }
    }
}

/// Round to `digits` significant digits.
pub fn round_significant(value: f64, digits: i32) -> f64 {
    if value == 0.0 || !value.is_finite() {
        return value;
    }
    let magnitude = value.abs().log10().floor() as i32;
    let factor = 10f64.powi(digits - 1 - magnitude);
    (value * factor).round() / factor
}

pub fn parse_range(x_min: &str, x_max: &str) -> CalcResult<(f64, f64)> {
    let (Ok(min), Ok(max)) = (x_min.trim().parse::<f64>(), x_max.trim().parse::<f64>()) else {
        return Err(CalcError::invalid("X Min/Max must be numbers."));
    };
    if !min.is_finite() || !max.is_finite() {
        return Err(CalcError::invalid("X Min/Max must be numbers."));
    }
    if max <= min {
        return Err(CalcError::invalid("X Max must be > X Min."));
    }
    Ok((min, max))
}

/// Sample `expr` (in `x`) over `[x_min, x_max]`. Points where the function
/// is undefined are left out.
pub fn plot_function(
    expr: &str,
    x_min: f64,
    x_max: f64,
    evaluator: &Evaluator,
) -> CalcResult<Vec<Point>> {
    if expr.trim().is_empty() {
        return Err(CalcError::invalid("Please enter a function."));
    }
    if !(x_max > x_min) {
        return Err(CalcError::invalid("X Max must be > X Min."));
    }
    let sanitized = normalize(&balance_parentheses(expr.trim()));
    let parsed: Expr = sanitized
        .parse()
        .map_err(|e| CalcError::Syntax(format!("{e}")))?;

    let step = (x_max - x_min) / FUNCTION_STEPS as f64;
    let mut points = Vec::with_capacity(FUNCTION_STEPS + 1);
    let mut first_error = None;
    for i in 0..=FUNCTION_STEPS {
        let x = round_significant(x_min + step * i as f64, 4);
        match evaluator.evaluate_parsed(&parsed, Some(x)) {
            Ok(y) => points.push(Point { x, y }),
            Err(e) => {
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
    }
    if points.is_empty() {
        return Err(first_error.unwrap_or_else(|| CalcError::invalid("Please enter a function.")));
    }
    tracing::debug!(points = points.len(), "plotted {sanitized}");
    Ok(points)
}

fn data_lines(text: &str) -> impl Iterator<Item = (usize, &str)> {
    text.trim()
        .lines()
        .enumerate()
        .map(|(i, l)| (i + 1, l.trim()))
        .filter(|(_, l)| !l.is_empty())
}

/// One `x, y` pair per line; `,` `;` and whitespace all separate.
pub fn parse_scatter(text: &str) -> CalcResult<Vec<Point>> {
    let mut out = Vec::new();
    for (n, line) in data_lines(text) {
        let parts: Vec<&str> = line
            .split(|c: char| c == ',' || c == ';' || c.is_whitespace())
            .filter(|s| !s.is_empty())
            .collect();
        if parts.len() != 2 {
            return Err(CalcError::invalid(format!(
                "Invalid format on line {n}. Use 'X, Y'."
            )));
        }
        match (parts[0].parse::<f64>(), parts[1].parse::<f64>()) {
            (Ok(x), Ok(y)) => out.push(Point { x, y }),
            _ => return Err(CalcError::invalid(format!("Invalid number on line {n}."))),
        }
    }
    if out.is_empty() {
        return Err(CalcError::invalid("Please enter some data."));
    }
    Ok(out)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledValue {
    pub label: String,
    pub value: f64,
}

/// `Label, Value` per line, used for bar and pie charts.
pub fn parse_labeled(text: &str) -> CalcResult<Vec<LabeledValue>> {
    let mut out = Vec::new();
    for (n, line) in data_lines(text) {
        let parts: Vec<&str> = line.split(',').map(str::trim).collect();
        if parts.len() != 2 {
            return Err(CalcError::invalid(format!(
                "Invalid format on line {n}. Use 'Label, Value'."
            )));
        }
        if parts[0].is_empty() {
            return Err(CalcError::invalid(format!("Missing label on line {n}.")));
        }
        let value = parts[1]
            .parse::<f64>()
            .map_err(|_| CalcError::invalid(format!("Invalid number on line {n}.")))?;
        out.push(LabeledValue {
            label: parts[0].to_string(),
            value,
        });
    }
    if out.is_empty() {
        return Err(CalcError::invalid("Please enter some data."));
    }
    Ok(out)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PieSlice {
    pub label: String,
    pub value: f64,
    pub percent: f64,
}

pub fn pie_slices(data: &[LabeledValue]) -> CalcResult<Vec<PieSlice>> {
    if data.iter().any(|d| d.value < 0.0) {
        return Err(CalcError::invalid("Pie chart values cannot be negative."));
    }
    let total: f64 = data.iter().map(|d| d.value).sum();
    if total <= 0.0 {
        return Err(CalcError::invalid("Pie chart values must add up to more than zero."));
    }
    Ok(data
        .iter()
        .map(|d| PieSlice {
            label: d.label.clone(),
            value: d.value,
            percent: d.value / total * 100.0,
        })
        .collect())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramBin {
    pub label: String,
    pub start: f64,
    pub end: f64,
    pub count: usize,
}

impl HistogramBin {
    pub fn midpoint(&self) -> f64 {
        (self.start + self.end) / 2.0
    }
}

/// Exactly `bins` equal-width bins over `[min, max]`; the maximum lands in
/// the last bin.
pub fn histogram(values: &[f64], bins: usize) -> CalcResult<Vec<HistogramBin>> {
    if bins == 0 {
        return Err(CalcError::invalid("Number of bins must be a positive integer."));
    }
    if values.len() < 2 {
        return Err(CalcError::invalid("Please enter at least two numbers."));
    }
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if min == max {
        return Ok(vec![HistogramBin {
            label: format!("{min:.1}-{max:.1}"),
            start: min,
            end: max,
            count: values.len(),
        }]);
    }

    let width = (max - min) / bins as f64;
    let mut out: Vec<HistogramBin> = (0..bins)
        .map(|i| {
            let start = min + width * i as f64;
            let end = if i + 1 == bins { max } else { start + width };
            HistogramBin {
                label: format!("{start:.1}-{end:.1}"),
                start,
                end,
                count: 0,
            }
        })
        .collect();
    for &v in values {
        let idx = (((v - min) / width).floor() as usize).min(bins - 1);
        out[idx].count += 1;
    }
    Ok(out)
}
