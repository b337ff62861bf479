use serde::Serialize;

use crate::error::{CalcError, CalcResult};
use crate::graphing::{histogram, Point};

/// Numbers separated by commas and/or whitespace.
pub fn parse_numbers(text: &str) -> CalcResult<Vec<f64>> {
    text.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| CalcError::InvalidNumber(s.to_string()))
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub count: usize,
    pub sum: f64,
    pub mean: f64,
    pub median: f64,
    /// Every most frequent value, in ascending order.
    pub modes: Vec<f64>,
    pub std_dev: f64,
    pub variance: f64,
    pub min: f64,
    pub max: f64,
    pub range: f64,
    pub q1: f64,
    pub q3: f64,
    pub iqr: f64,
}

impl Summary {
    pub fn mode_text(&self) -> String {
        self.modes
            .iter()
            .map(|m| m.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn sorted(values: &[f64]) -> Vec<f64> {
    let mut v = values.to_vec();
    v.sort_by(|a, b| a.total_cmp(b));
    v
}

/// Quantile of sorted data with linear interpolation between ranks.
pub fn quantile_sorted(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let index = (sorted.len() - 1) as f64 * p.clamp(0.0, 1.0);
    let lo = index.floor() as usize;
    let hi = index.ceil() as usize;
    let frac = index - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

pub fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

pub fn variance(values: &[f64], sample: bool) -> f64 {
    let m = mean(values);
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    let n = values.len() as f64;
    if sample {
        ss / (n - 1.0)
    } else {
        ss / n
    }
}

pub fn modes(values: &[f64]) -> Vec<f64> {
    let data = sorted(values);
    let mut runs: Vec<(f64, usize)> = Vec::new();
    for v in data {
        match runs.last_mut() {
            Some((last, count)) if *last == v => *count += 1,
            _ => runs.push((v, 1)),
        }
    }
    let best = runs.iter().map(|(_, c)| *c).max().unwrap_or(0);
    runs.into_iter()
        .filter(|(_, c)| *c == best)
        .map(|(v, _)| v)
        .collect()
}

pub fn summary(values: &[f64]) -> CalcResult<Summary> {
    if values.len() < 2 {
        return Err(CalcError::invalid("Please enter at least two numbers."));
    }
    let data = sorted(values);
    let count = data.len();
    let sum: f64 = data.iter().sum();
    let variance = variance(&data, true);
    let min = data[0];
    let max = data[count - 1];
    let q1 = quantile_sorted(&data, 0.25);
    let q3 = quantile_sorted(&data, 0.75);
    Ok(Summary {
        count,
        sum,
        mean: sum / count as f64,
        median: quantile_sorted(&data, 0.5),
        modes: modes(&data),
        std_dev: variance.sqrt(),
        variance,
        min,
        max,
        range: max - min,
        q1,
        q3,
        iqr: q3 - q1,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Deviation {
    pub population: f64,
    pub sample: f64,
    pub population_variance: f64,
    pub sample_variance: f64,
}

pub fn standard_deviation(values: &[f64]) -> CalcResult<Deviation> {
    if values.len() < 2 {
        return Err(CalcError::invalid("Please enter at least two numbers."));
    }
    let population_variance = variance(values, false);
    let sample_variance = variance(values, true);
    Ok(Deviation {
        population: population_variance.sqrt(),
        sample: sample_variance.sqrt(),
        population_variance,
        sample_variance,
    })
}

/// Bin midpoints against bin counts. Uses no more bins than values.
pub fn frequency_polygon(values: &[f64], bins: usize) -> CalcResult<Vec<Point>> {
    Ok(histogram(values, bins.min(values.len()))?
        .iter()
        .map(|b| Point {
            x: b.midpoint(),
            y: b.count as f64,
        })
        .collect())
}

pub const CONFIDENCE_LEVELS: &[(u32, f64)] = &[
    (80, 1.28),
    (85, 1.44),
    (90, 1.645),
    (95, 1.96),
    (98, 2.33),
    (99, 2.576),
];

pub fn z_score(level: u32) -> Option<f64> {
    CONFIDENCE_LEVELS
        .iter()
        .find(|(l, _)| *l == level)
        .map(|(_, z)| *z)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ConfidenceInterval {
    pub lower: f64,
    pub upper: f64,
    pub margin: f64,
    pub z: f64,
}

pub fn confidence_interval(
    mean: f64,
    std_dev: f64,
    n: u64,
    level: u32,
) -> CalcResult<ConfidenceInterval> {
    if n <= 1 || std_dev < 0.0 || !mean.is_finite() || !std_dev.is_finite() {
        return Err(CalcError::invalid("Please enter valid inputs (n > 1, s >= 0)."));
    }
    let z = z_score(level).ok_or_else(|| {
        CalcError::invalid(format!("Unsupported confidence level: {level}%."))
    })?;
    let margin = z * std_dev / (n as f64).sqrt();
    Ok(ConfidenceInterval {
        lower: mean - margin,
        upper: mean + margin,
        margin,
        z,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_parse_numbers() {
        assert_eq!(parse_numbers("1, 2 3,\n4").unwrap(), vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(
            parse_numbers("1, x, 3").unwrap_err().to_string(),
            "'x' is not a valid number."
        );
    }

    #[test]
    fn test_summary() {
        let s = summary(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert_eq!(s.count, 8);
        assert_eq!(s.sum, 40.0);
        assert_eq!(s.mean, 5.0);
        assert_eq!(s.median, 4.5);
        assert_eq!(s.modes, vec![4.0]);
        assert!(approx(s.variance, 32.0 / 7.0));
        assert_eq!(s.range, 7.0);
        assert_eq!(s.q1, 4.0);
        assert_eq!(s.q3, 5.5);
        assert_eq!(s.iqr, 1.5);
    }

    #[test]
    fn test_multiple_modes() {
        let s = summary(&[3.0, 1.0, 1.0, 3.0, 2.0]).unwrap();
        assert_eq!(s.mode_text(), "1, 3");
    }

    #[test]
    fn test_summary_needs_two() {
        assert!(summary(&[1.0]).is_err());
    }

    #[test]
    fn test_deviation_pair() {
        let d = standard_deviation(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert!(approx(d.population, 2.0));
        assert!(approx(d.sample, (32.0f64 / 7.0).sqrt()));
        assert!(approx(d.population_variance, 4.0));
    }

    #[test]
    fn test_frequency_polygon() {
        let pts = frequency_polygon(&[1.0, 2.0, 3.0, 4.0, 5.0], 2).unwrap();
        assert_eq!(pts, vec![Point { x: 2.0, y: 2.0 }, Point { x: 4.0, y: 3.0 }]);
    }

    #[test]
    fn test_frequency_polygon_caps_bins() {
        let pts = frequency_polygon(&[0.0, 10.0], 5).unwrap();
        assert_eq!(pts, vec![Point { x: 2.5, y: 1.0 }, Point { x: 7.5, y: 1.0 }]);
        assert!(frequency_polygon(&[0.0, 10.0], 0).is_err());
    }

    #[test]
    fn test_confidence_interval() {
        let ci = confidence_interval(100.0, 15.0, 25, 95).unwrap();
        assert!(approx(ci.margin, 5.88));
        assert!(approx(ci.lower, 94.12));
        assert!(approx(ci.upper, 105.88));
        assert!(confidence_interval(100.0, 15.0, 1, 95).is_err());
        assert!(confidence_interval(100.0, -1.0, 10, 95).is_err());
        assert!(confidence_interval(100.0, 1.0, 10, 97).is_err());
    }
}
