//! Expression evaluation for the scientific calculator.
//!
//! Input text may contain calculator glyphs (`×`, `÷`, `−`, `π`, `√`, `∛`).
//! It is normalized to ASCII, unmatched `(` are closed, and the result is
//! handed to `meval` with an angle-aware context and a few injected
//! functions (`nPr`, `nCr`, `pmt`, `mean`, `std`).

use std::cell::Cell;
use std::f64::consts::PI;
use std::fmt;

use meval::shunting_yard::RPNError;
use meval::tokenizer::ParseError;
use meval::{Context, Expr, FuncEvalError};
use serde::{Deserialize, Serialize};

use crate::error::{CalcError, CalcResult};
use crate::numbers;

/// Significant digits used when displaying results.
pub const DISPLAY_PRECISION: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AngleMode {
    #[default]
    Deg,
    Rad,
    Grad,
}

impl AngleMode {
    fn to_radians(self, x: f64) -> f64 {
        match self {
            Self::Deg => x * PI / 180.0,
            Self::Rad => x,
            Self::Grad => x * PI / 200.0,
        }
    }

    fn from_radians(self, x: f64) -> f64 {
        match self {
            Self::Deg => x * 180.0 / PI,
            Self::Rad => x,
            Self::Grad => x * 200.0 / PI,
        }
    }
}

impl fmt::Display for AngleMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Deg => write!(f, "deg"),
            Self::Rad => write!(f, "rad"),
            Self::Grad => write!(f, "grad"),
        }
    }
}

impl std::str::FromStr for AngleMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "deg" | "degrees" => Ok(Self::Deg),
            "rad" | "radians" => Ok(Self::Rad),
            "grad" | "gradians" => Ok(Self::Grad),
            _ => Err(format!("invalid angle mode: {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ScientificConstant {
    pub name: &'static str,
    pub symbol: &'static str,
    pub value: f64,
    pub unit: &'static str,
}

pub const SCIENTIFIC_CONSTANTS: &[ScientificConstant] = &[
    ScientificConstant { name: "Speed of Light", symbol: "c", value: 299_792_458.0, unit: "m/s" },
    ScientificConstant { name: "Planck Constant", symbol: "h", value: 6.626_070_15e-34, unit: "J·s" },
    ScientificConstant { name: "Gravitational Constant", symbol: "G", value: 6.674_30e-11, unit: "N·m²/kg²" },
    ScientificConstant { name: "Elementary Charge", symbol: "e", value: 1.602_176_634e-19, unit: "C" },
    ScientificConstant { name: "Electron Mass", symbol: "mₑ", value: 9.109_383_701_5e-31, unit: "kg" },
    ScientificConstant { name: "Proton Mass", symbol: "mₚ", value: 1.672_621_923_69e-27, unit: "kg" },
    ScientificConstant { name: "Avogadro Constant", symbol: "Nₐ", value: 6.022_140_76e23, unit: "mol⁻¹" },
    ScientificConstant { name: "Boltzmann Constant", symbol: "k", value: 1.380_649e-23, unit: "J/K" },
    ScientificConstant { name: "Golden Ratio", symbol: "φ", value: 1.618_033_988_75, unit: "" },
];

/// Replace calculator glyphs with the ASCII the parser understands.
pub fn normalize(expr: &str) -> String {
    expr.replace('π', "pi")
        .replace('√', "sqrt")
        .replace('∛', "cbrt")
        .replace('×', "*")
        .replace('÷', "/")
        .replace('−', "-")
}

/// Append a `)` for every unmatched `(`.
pub fn balance_parentheses(expr: &str) -> String {
    let open = expr.matches('(').count();
    let close = expr.matches(')').count();
    let mut out = expr.to_string();
    if open > close {
        out.push_str(&")".repeat(open - close));
    }
    out
}

#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    /// The balanced expression as the user wrote it (glyphs kept).
    pub expression: String,
    /// The ASCII expression that was evaluated.
    pub sanitized: String,
    pub value: f64,
    pub display: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Evaluator {
    pub angle_mode: AngleMode,
}

impl Evaluator {
    pub fn new(angle_mode: AngleMode) -> Self {
        Self { angle_mode }
    }

    pub fn evaluate(&self, input: &str) -> CalcResult<Evaluation> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(CalcError::Syntax("empty expression".into()));
        }
        let expression = balance_parentheses(trimmed);
        let sanitized = normalize(&expression);
        let value = self.evaluate_raw(&sanitized)?;
        Ok(Evaluation {
            display: format_number(value, DISPLAY_PRECISION),
            expression,
            sanitized,
            value,
        })
    }

    /// Evaluate already-normalized text against the calculator context.
    pub fn evaluate_raw(&self, sanitized: &str) -> CalcResult<f64> {
        let parsed: Expr = sanitized.parse().map_err(map_meval_error)?;
        self.evaluate_parsed(&parsed, None)
    }

    /// Evaluate a parsed expression, optionally binding `x`.
    pub fn evaluate_parsed(&self, expr: &Expr, x: Option<f64>) -> CalcResult<f64> {
        let fault: Cell<Option<&'static str>> = Cell::new(None);
        let mode = self.angle_mode;

        let mut ctx = Context::new();
        ctx.var("pi", PI)
            .var("e", std::f64::consts::E)
            .var("tau", 2.0 * PI)
            .var("phi", 1.618_033_988_75)
            .func("sin", move |a| mode.to_radians(a).sin())
            .func("cos", move |a| mode.to_radians(a).cos())
            .func("tan", move |a| mode.to_radians(a).tan())
            .func("asin", move |a| mode.from_radians(a.asin()))
            .func("acos", move |a| mode.from_radians(a.acos()))
            .func("atan", move |a| mode.from_radians(a.atan()))
            .func("sinh", f64::sinh)
            .func("cosh", f64::cosh)
            .func("tanh", f64::tanh)
            .func("asinh", f64::asinh)
            .func("acosh", f64::acosh)
            .func("atanh", f64::atanh)
            .func("sqrt", f64::sqrt)
            .func("cbrt", f64::cbrt)
            .func("log", f64::ln)
            .func("ln", f64::ln)
            .func("log10", f64::log10)
            .func("log2", f64::log2)
            .func("exp", f64::exp)
            .func("abs", f64::abs)
            .func2("nPr", |n, k| {
                checked_count(n, k, numbers::permutations).unwrap_or_else(|| {
                    fault.set(Some("nPr"));
                    f64::NAN
                })
            })
            .func2("nCr", |n, k| {
                checked_count(n, k, numbers::combinations).unwrap_or_else(|| {
                    fault.set(Some("nCr"));
                    f64::NAN
                })
            })
            .func3("pmt", |rate, years, principal| {
                pmt(rate, years, principal).unwrap_or_else(|| {
                    fault.set(Some("pmt"));
                    f64::NAN
                })
            })
            .funcn("mean", |xs| xs.iter().sum::<f64>() / xs.len() as f64, 1..)
            .funcn("std", sample_std, 2..);
        if let Some(x) = x {
            ctx.var("x", x);
        }

        let value = expr.eval_with_context(ctx).map_err(map_meval_error)?;

        if let Some(name) = fault.get() {
            return Err(CalcError::InvalidArguments(name.into()));
        }
        if value.is_infinite() {
            return Err(CalcError::DivideByZero);
        }
        if value.is_nan() {
            return Err(CalcError::Evaluation("Result is not a number".into()));
        }
        Ok(value)
    }
}

/// `pmt(annualRatePercent, termYears, principal)`: monthly annuity payment.
pub fn pmt(annual_rate_percent: f64, term_years: f64, principal: f64) -> Option<f64> {
    let monthly_rate = annual_rate_percent / 100.0 / 12.0;
    let payments = term_years * 12.0;
    if !principal.is_finite() || !monthly_rate.is_finite() || principal <= 0.0 || term_years <= 0.0 {
        return None;
    }
    if monthly_rate == 0.0 {
        return Some(principal / payments);
    }
    let growth = (1.0 + monthly_rate).powf(payments);
    Some(principal * (monthly_rate * growth) / (growth - 1.0))
}

fn checked_count(n: f64, k: f64, f: fn(u64, u64) -> Option<u128>) -> Option<f64> {
    if n < 0.0 || k < 0.0 || n.fract() != 0.0 || k.fract() != 0.0 || k > n {
        return None;
    }
    f(n as u64, k as u64).map(|v| v as f64)
}

fn sample_std(xs: &[f64]) -> f64 {
    let n = xs.len() as f64;
    let mean = xs.iter().sum::<f64>() / n;
    let var = xs.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0);
    var.sqrt()
}

fn map_meval_error(err: meval::Error) -> CalcError {
    match err {
        meval::Error::UnknownVariable(name) => CalcError::UnknownSymbol(name),
        meval::Error::Function(name, FuncEvalError::UnknownFunction) => {
            CalcError::UnknownSymbol(name)
        }
        meval::Error::Function(name, _) => CalcError::InvalidArguments(name),
        meval::Error::ParseError(ParseError::MissingRParen(_)) => CalcError::MismatchedParentheses,
        meval::Error::ParseError(ParseError::MissingArgument) => {
            CalcError::Syntax("Check operators".into())
        }
        meval::Error::ParseError(other) => CalcError::Syntax(format!("{other}")),
        meval::Error::RPNError(RPNError::MismatchedLParen(_))
        | meval::Error::RPNError(RPNError::MismatchedRParen(_)) => {
            CalcError::MismatchedParentheses
        }
        meval::Error::RPNError(_) => CalcError::Syntax("Check operators".into()),
        other => CalcError::Evaluation(format!("{other}")),
    }
}

/// Format with at most `precision` significant digits, trailing zeros removed.
/// Magnitudes outside `[1e-9, 1e12)` use exponent notation (`1.5e+15`).
pub fn format_number(value: f64, precision: usize) -> String {
    if value == 0.0 {
        return "0".into();
    }
    if value.is_nan() {
        return "NaN".into();
    }
    if value.is_infinite() {
        return if value > 0.0 { "Infinity".into() } else { "-Infinity".into() };
    }
    let precision = precision.max(1);
    let exponent = value.abs().log10().floor() as i32;
    if !(-9..12).contains(&exponent) {
        let formatted = format!("{:.*e}", precision - 1, value);
        let (mantissa, exp) = formatted.split_once('e').unwrap_or((&formatted, "0"));
        let mantissa = trim_zeros(mantissa);
        let exp_num: i32 = exp.parse().unwrap_or(0);
        let sign = if exp_num >= 0 { "+" } else { "-" };
        return format!("{mantissa}e{sign}{}", exp_num.abs());
    }
    let decimals = (precision as i32 - 1 - exponent).max(0) as usize;
    let out = trim_zeros(&format!("{value:.decimals$}"));
    if out == "-0" {
        "0".into()
    } else {
        out
    }
}

fn trim_zeros(s: &str) -> String {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        s.to_string()
    }
}
