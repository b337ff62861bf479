//! Linear and quadratic equation solving.
//!
//! Each side is parsed into a polynomial in `x` (coefficients indexed by
//! power), the right side is subtracted, and the resulting degree decides
//! the method.

use std::fmt;

use serde::Serialize;

use crate::error::{CalcError, CalcResult};
use crate::graphing::{round_significant, Point};

const COEFF_EPSILON: f64 = 1e-12;
const CURVE_STEPS: usize = 100;
const MAX_POWER: u32 = 32;

// ----- polynomial -----

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Polynomial {
    /// `coeffs[i]` multiplies `x^i`.
    coeffs: Vec<f64>,
}

impl Polynomial {
    pub fn constant(c: f64) -> Self {
        Self { coeffs: vec![c] }.trimmed()
    }

    pub fn x() -> Self {
        Self {
            coeffs: vec![0.0, 1.0],
        }
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coeffs
    }

    /// Coefficient of `x^power`, zero when absent.
    pub fn coeff(&self, power: usize) -> f64 {
        self.coeffs.get(power).copied().unwrap_or(0.0)
    }

    pub fn degree(&self) -> usize {
        self.coeffs.len().saturating_sub(1)
    }

    fn trimmed(mut self) -> Self {
        while self.coeffs.len() > 1
            && self.coeffs.last().is_some_and(|c| c.abs() < COEFF_EPSILON)
        {
            self.coeffs.pop();
        }
        if self.coeffs.is_empty() {
            self.coeffs.push(0.0);
        }
        self
    }

    fn as_constant(&self) -> Option<f64> {
        (self.degree() == 0).then(|| self.coeff(0))
    }

    pub fn add(&self, other: &Self) -> Self {
        let len = self.coeffs.len().max(other.coeffs.len());
        Self {
            coeffs: (0..len).map(|i| self.coeff(i) + other.coeff(i)).collect(),
        }
        .trimmed()
    }

    pub fn neg(&self) -> Self {
        Self {
            coeffs: self.coeffs.iter().map(|c| -c).collect(),
        }
    }

    pub fn sub(&self, other: &Self) -> Self {
        self.add(&other.neg())
    }

    pub fn mul(&self, other: &Self) -> Self {
        let mut coeffs = vec![0.0; self.coeffs.len() + other.coeffs.len() - 1];
        for (i, a) in self.coeffs.iter().enumerate() {
            for (j, b) in other.coeffs.iter().enumerate() {
                coeffs[i + j] += a * b;
            }
        }
        Self { coeffs }.trimmed()
    }

    fn scale(&self, k: f64) -> Self {
        Self {
            coeffs: self.coeffs.iter().map(|c| c * k).collect(),
        }
        .trimmed()
    }

    fn pow(&self, n: u32) -> Self {
        (0..n).fold(Self::constant(1.0), |acc, _| acc.mul(self))
    }

    pub fn eval(&self, x: f64) -> f64 {
        self.coeffs.iter().rev().fold(0.0, |acc, c| acc * x + c)
    }
}

impl fmt::Display for Polynomial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (power, &c) in self.coeffs.iter().enumerate().rev() {
            if c.abs() < COEFF_EPSILON && !(first && power == 0) {
                continue;
            }
            let magnitude = c.abs();
            let sign = if c < 0.0 { "-" } else { "+" };
            if first {
                if c < 0.0 {
                    write!(f, "-")?;
                }
            } else {
                write!(f, " {sign} ")?;
            }
            let number = format_root(magnitude);
            match power {
                0 => write!(f, "{number}")?,
                _ => {
                    if (magnitude - 1.0).abs() >= COEFF_EPSILON {
                        write!(f, "{number}")?;
                    }
                    if power == 1 {
                        write!(f, "x")?;
                    } else {
                        write!(f, "x^{power}")?;
                    }
                }
            }
            first = false;
        }
        Ok(())
    }
}

// ----- parser -----

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Num(f64),
    X,
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    LParen,
    RParen,
}

fn tokenize(src: &str) -> CalcResult<Vec<Token>> {
    let chars: Vec<char> = src.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' => {}
            'x' | 'X' => tokens.push(Token::X),
            '+' => tokens.push(Token::Plus),
            '-' | '−' => tokens.push(Token::Minus),
            '*' | '×' | '·' => tokens.push(Token::Star),
            '/' | '÷' => tokens.push(Token::Slash),
            '^' => tokens.push(Token::Caret),
            '(' => tokens.push(Token::LParen),
            ')' => tokens.push(Token::RParen),
            '²' => {
                tokens.push(Token::Caret);
                tokens.push(Token::Num(2.0));
            }
            c if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i + 1 < chars.len() && (chars[i + 1].is_ascii_digit() || chars[i + 1] == '.') {
                    i += 1;
                }
                let text: String = chars[start..=i].iter().collect();
                let value = text
                    .parse::<f64>()
                    .map_err(|_| CalcError::InvalidNumber(text.clone()))?;
                tokens.push(Token::Num(value));
            }
            other => {
                return Err(CalcError::invalid(format!(
                    "Unexpected character '{other}'. Ensure it's a valid polynomial in 'x'."
                )))
            }
        }
        i += 1;
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).copied()
    }

    fn next(&mut self) -> Option<Token> {
        let t = self.peek();
        self.pos += 1;
        t
    }

    fn expr(&mut self) -> CalcResult<Polynomial> {
        let mut acc = self.term()?;
        while let Some(t @ (Token::Plus | Token::Minus)) = self.peek() {
            self.pos += 1;
            let rhs = self.term()?;
            acc = if t == Token::Plus { acc.add(&rhs) } else { acc.sub(&rhs) };
        }
        Ok(acc)
    }

    fn term(&mut self) -> CalcResult<Polynomial> {
        let mut acc = self.unary()?;
        loop {
            match self.peek() {
                Some(Token::Star) => {
                    self.pos += 1;
                    acc = acc.mul(&self.unary()?);
                }
                Some(Token::Slash) => {
                    self.pos += 1;
                    let divisor = self.unary()?;
                    let Some(d) = divisor.as_constant() else {
                        return Err(CalcError::invalid(
                            "Equation is not a recognized polynomial.",
                        ));
                    };
                    if d == 0.0 {
                        return Err(CalcError::DivideByZero);
                    }
                    acc = acc.scale(1.0 / d);
                }
                // Implicit multiplication: `4x`, `2(x+1)`, `(x+1)(x-1)`.
                Some(Token::Num(_) | Token::X | Token::LParen) => {
                    acc = acc.mul(&self.power()?);
                }
                _ => return Ok(acc),
            }
        }
    }

    fn unary(&mut self) -> CalcResult<Polynomial> {
        match self.peek() {
            Some(Token::Minus) => {
                self.pos += 1;
                Ok(self.unary()?.neg())
            }
            Some(Token::Plus) => {
                self.pos += 1;
                self.unary()
            }
            _ => self.power(),
        }
    }

    fn power(&mut self) -> CalcResult<Polynomial> {
        let base = self.primary()?;
        if self.peek() != Some(Token::Caret) {
            return Ok(base);
        }
        self.pos += 1;
        let exponent = self.unary()?;
        let n = exponent
            .as_constant()
            .filter(|e| *e >= 0.0 && e.fract() == 0.0 && *e <= MAX_POWER as f64)
            .ok_or_else(|| CalcError::invalid("Equation is not a recognized polynomial."))?;
        Ok(base.pow(n as u32))
    }

    fn primary(&mut self) -> CalcResult<Polynomial> {
        match self.next() {
            Some(Token::Num(v)) => Ok(Polynomial::constant(v)),
            Some(Token::X) => Ok(Polynomial::x()),
            Some(Token::LParen) => {
                let inner = self.expr()?;
                if self.next() != Some(Token::RParen) {
                    return Err(CalcError::MismatchedParentheses);
                }
                Ok(inner)
            }
            _ => Err(CalcError::Syntax("Check operators".into())),
        }
    }
}

/// Parse an expression in `x` into a polynomial.
pub fn parse_polynomial(src: &str) -> CalcResult<Polynomial> {
    let tokens = tokenize(src)?;
    if tokens.is_empty() {
        return Err(CalcError::Syntax("empty expression".into()));
    }
    let mut parser = Parser { tokens, pos: 0 };
    let poly = parser.expr()?;
    if parser.pos < parser.tokens.len() {
        return Err(match parser.peek() {
            Some(Token::RParen) => CalcError::MismatchedParentheses,
            _ => CalcError::Syntax("Check operators".into()),
        });
    }
    Ok(poly)
}

// ----- solving -----

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Root {
    Real { value: f64 },
    Complex { re: f64, im: f64 },
}

impl fmt::Display for Root {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Real { value } => write!(f, "{}", format_root(value)),
            Self::Complex { re, im } => {
                let re = round5(re);
                let im = round5(im);
                if im == 0.0 {
                    write!(f, "{}", format_root(re))
                } else if re == 0.0 {
                    write!(f, "{}i", format_root(im))
                } else {
                    let sign = if im > 0.0 { '+' } else { '-' };
                    write!(f, "{} {sign} {}i", format_root(re), format_root(im.abs()))
                }
            }
        }
    }
}

fn round5(v: f64) -> f64 {
    let r = (v * 1e5).round() / 1e5;
    if r == 0.0 {
        0.0
    } else {
        r
    }
}

/// Five decimals with trailing zeros trimmed.
pub fn format_root(v: f64) -> String {
    let s = format!("{:.5}", round5(v));
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" {
        "0".into()
    } else {
        s.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EquationKind {
    Linear,
    Quadratic,
}

/// Coefficients as shown in the working: `ax + b = 0` for linear,
/// `ax² + bx + c = 0` for quadratic.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SolvedDetails {
    pub kind: EquationKind,
    pub a: f64,
    pub b: f64,
    pub c: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discriminant: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Solution {
    pub polynomial: Polynomial,
    pub roots: Vec<Root>,
    pub details: SolvedDetails,
    pub curve: Vec<Point>,
}

impl Solution {
    pub fn real_roots(&self) -> Vec<f64> {
        self.roots
            .iter()
            .filter_map(|r| match *r {
                Root::Real { value } => Some(value),
                Root::Complex { re, im } if im == 0.0 => Some(re),
                _ => None,
            })
            .collect()
    }
}

/// Split `lhs = rhs` (or a bare expression meaning `= 0`) into one polynomial.
fn equation_polynomial(equation: &str) -> CalcResult<Polynomial> {
    let trimmed = equation.trim();
    if trimmed.is_empty() {
        return Err(CalcError::invalid("Please enter an equation."));
    }
    if !trimmed.contains('x') {
        return Err(CalcError::invalid(
            "The equation must contain the variable 'x' to solve for.",
        ));
    }
    let parts: Vec<&str> = trimmed.split('=').collect();
    match parts.as_slice() {
        [expr] => parse_polynomial(expr),
        [lhs, rhs] => {
            let (lhs, rhs) = (lhs.trim(), rhs.trim());
            if lhs.is_empty() || rhs.is_empty() {
                return Err(CalcError::invalid(
                    "Invalid equation: Both sides of '=' must have content.",
                ));
            }
            Ok(parse_polynomial(lhs)?.sub(&parse_polynomial(rhs)?))
        }
        _ => Err(CalcError::invalid(
            "Invalid equation format. Please use a single '=' sign.",
        )),
    }
}

pub fn solve(equation: &str) -> CalcResult<Solution> {
    let poly = equation_polynomial(equation)?;
    let degree = poly.degree();
    if degree > 2 {
        return Err(CalcError::UnsupportedDegree(degree));
    }

    let (roots, details) = match degree {
        2 => {
            let (a, b, c) = (poly.coeff(2), poly.coeff(1), poly.coeff(0));
            let discriminant = b * b - 4.0 * a * c;
            let mut roots = Vec::new();
            if discriminant >= 0.0 {
                roots.push(Root::Real {
                    value: (-b + discriminant.sqrt()) / (2.0 * a),
                });
                if discriminant > 0.0 {
                    roots.push(Root::Real {
                        value: (-b - discriminant.sqrt()) / (2.0 * a),
                    });
                }
            } else {
                let re = -b / (2.0 * a);
                let im = (-discriminant).sqrt() / (2.0 * a);
                roots.push(Root::Complex { re, im });
                roots.push(Root::Complex { re, im: -im });
            }
            let details = SolvedDetails {
                kind: EquationKind::Quadratic,
                a,
                b,
                c,
                discriminant: Some(discriminant),
            };
            (roots, details)
        }
        1 => {
            let (a, b) = (poly.coeff(1), poly.coeff(0));
            let details = SolvedDetails {
                kind: EquationKind::Linear,
                a,
                b,
                c: 0.0,
                discriminant: None,
            };
            (vec![Root::Real { value: -b / a }], details)
        }
        _ => {
            let c = poly.coeff(0);
            let msg = if c == 0.0 {
                "Infinite solutions (0 = 0)".to_string()
            } else {
                format!("No solution ({} = 0)", format_root(c))
            };
            return Err(CalcError::invalid(msg));
        }
    };

    let mut solution = Solution {
        polynomial: poly,
        roots,
        details,
        curve: Vec::new(),
    };
    let (x_min, x_max) = curve_range(&solution);
    solution.curve = sample_curve(&solution.polynomial, x_min, x_max);
    tracing::debug!(degree, roots = solution.roots.len(), "solved {equation}");
    Ok(solution)
}

fn curve_range(solution: &Solution) -> (f64, f64) {
    let real = solution.real_roots();
    if !real.is_empty() {
        let min = real.iter().copied().fold(f64::INFINITY, f64::min);
        let max = real.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let range = f64::max(10.0, (max - min) * 1.5);
        return (min - range * 0.5, max + range * 0.5);
    }
    if solution.details.kind == EquationKind::Quadratic {
        let vertex = -solution.details.b / (2.0 * solution.details.a);
        return (vertex - 5.0, vertex + 5.0);
    }
    (-10.0, 10.0)
}

fn sample_curve(poly: &Polynomial, x_min: f64, x_max: f64) -> Vec<Point> {
    let step = (x_max - x_min) / CURVE_STEPS as f64;
    (0..=CURVE_STEPS)
        .filter_map(|i| {
            let x = x_min + step * i as f64;
            let y = poly.eval(x);
            y.is_finite().then(|| Point {
                x: round_significant(x, 4),
                y: round_significant(y, 4),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn real(s: &Solution) -> Vec<f64> {
        let mut r = s.real_roots();
        r.sort_by(|a, b| a.total_cmp(b));
        r
    }

    #[test]
    fn test_linear_scenario() {
        let s = solve("2x - 10 = 0").unwrap();
        assert_eq!(s.details.kind, EquationKind::Linear);
        assert_eq!(real(&s), vec![5.0]);
        assert_eq!(s.roots[0].to_string(), "5");
    }

    #[test]
    fn test_quadratic_two_roots() {
        let s = solve("x^2 - 5x + 6 = 0").unwrap();
        assert_eq!(s.details.kind, EquationKind::Quadratic);
        assert_eq!(s.details.discriminant, Some(1.0));
        assert_eq!(real(&s), vec![2.0, 3.0]);
    }

    #[test]
    fn test_quadratic_double_root() {
        let s = solve("x^2 + 2x + 1 = 0").unwrap();
        assert_eq!(real(&s), vec![-1.0]);
    }

    #[test]
    fn test_quadratic_complex_roots() {
        let s = solve("x^2 + 2x + 5 = 0").unwrap();
        assert!(s.real_roots().is_empty());
        assert_eq!(s.roots[0].to_string(), "-1 + 2i");
        assert_eq!(s.roots[1].to_string(), "-1 - 2i");
        // Vertex-centred window.
        assert_eq!(s.curve.first().unwrap().x, -6.0);
        assert_eq!(s.curve.last().unwrap().x, 4.0);
    }

    #[test]
    fn test_both_sides_and_implicit_multiplication() {
        let s = solve("3(x + 1) = x + 7").unwrap();
        assert_eq!(real(&s), vec![2.0]);
        let s = solve("(x+1)(x-1) = 0").unwrap();
        assert_eq!(real(&s), vec![-1.0, 1.0]);
    }

    #[test]
    fn test_bare_expression_means_zero() {
        let s = solve("x/2 - 4").unwrap();
        assert_eq!(real(&s), vec![8.0]);
    }

    #[test]
    fn test_validation_messages() {
        let msg = |e: &str| solve(e).unwrap_err().to_string();
        assert_eq!(msg("  "), "Please enter an equation.");
        assert_eq!(msg("2 = 2"), "The equation must contain the variable 'x' to solve for.");
        assert_eq!(msg("x = "), "Invalid equation: Both sides of '=' must have content.");
        assert_eq!(msg("x = 1 = 2"), "Invalid equation format. Please use a single '=' sign.");
    }

    #[test]
    fn test_degenerate() {
        assert_eq!(solve("x = x").unwrap_err().to_string(), "Infinite solutions (0 = 0)");
        assert_eq!(solve("x + 1 = x").unwrap_err().to_string(), "No solution (1 = 0)");
    }

    #[test]
    fn test_cubic_unsupported() {
        assert!(matches!(solve("x^3 = 8"), Err(CalcError::UnsupportedDegree(3))));
    }

    #[test]
    fn test_curve_window_around_roots() {
        let s = solve("2x - 10 = 0").unwrap();
        assert_eq!(s.curve.len(), 101);
        assert_eq!(s.curve.first().unwrap().x, 0.0);
        assert_eq!(s.curve.last().unwrap().x, 10.0);
    }

    #[test]
    fn test_polynomial_display() {
        assert_eq!(parse_polynomial("x^2 - 5x + 6").unwrap().to_string(), "x^2 - 5x + 6");
        assert_eq!(parse_polynomial("-2x + 0.5").unwrap().to_string(), "-2x + 0.5");
        assert_eq!(parse_polynomial("0").unwrap().to_string(), "0");
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_polynomial("x / x").is_err());
        assert!(parse_polynomial("(x + 1").is_err());
        assert!(parse_polynomial("x + 1)").is_err());
        assert!(parse_polynomial("x ^ 0.5").is_err());
        assert!(parse_polynomial("sin(x)").is_err());
    }
}
