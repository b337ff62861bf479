//! Integer and fraction helpers behind the number tools.

use std::fmt;

use rand::Rng;
use serde::Serialize;

use crate::error::{CalcError, CalcResult};

// ----- gcd / lcm -----

fn gcd_wide(mut a: u128, mut b: u128) -> u128 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

fn too_large(what: &str) -> CalcError {
    CalcError::OutOfRange(format!("{what} is too large."))
}

pub fn gcd(a: i64, b: i64) -> u64 {
    gcd_wide(a.unsigned_abs() as u128, b.unsigned_abs() as u128) as u64
}

pub fn lcm(a: i64, b: i64) -> CalcResult<i64> {
    if a == 0 || b == 0 {
        return Ok(0);
    }
    let l = (a as i128 / gcd(a, b) as i128 * b as i128).abs();
    i64::try_from(l).map_err(|_| too_large("LCM"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GcdLcm {
    pub gcd: i64,
    pub lcm: i64,
}

/// GCF and LCM over a comma or whitespace separated list of integers.
/// Any token that is not an integer rejects the whole list.
pub fn gcd_lcm(input: &str) -> CalcResult<GcdLcm> {
    let invalid = || CalcError::invalid("Please enter at least two valid integers.");
    let nums = input
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<i64>().map_err(|_| invalid()))
        .collect::<CalcResult<Vec<i64>>>()?;
    if nums.len() < 2 {
        return Err(invalid());
    }
    let g = nums[1..]
        .iter()
        .fold(nums[0].unsigned_abs() as u128, |acc, &n| {
            gcd_wide(acc, n.unsigned_abs() as u128)
        });
    let l = nums[1..].iter().try_fold(nums[0], |acc, &n| lcm(acc, n))?;
    Ok(GcdLcm {
        gcd: i64::try_from(g).map_err(|_| too_large("GCF"))?,
        lcm: l,
    })
}

// ----- primes -----

pub fn is_prime(n: u64) -> bool {
    if n < 2 {
        return false;
    }
    if n < 4 {
        return true;
    }
    if n % 2 == 0 || n % 3 == 0 {
        return false;
    }
    let mut i = 5u64;
    while i.saturating_mul(i) <= n {
        if n % i == 0 || n % (i + 2) == 0 {
            return false;
        }
        i += 6;
    }
    true
}

/// All primes up to and including `limit`.
pub fn primes_up_to(limit: usize) -> Vec<usize> {
    if limit < 2 {
        return Vec::new();
    }
    let mut sieve = vec![true; limit + 1];
    sieve[0] = false;
    sieve[1] = false;
    let mut i = 2;
    while i * i <= limit {
        if sieve[i] {
            let mut j = i * i;
            while j <= limit {
                sieve[j] = false;
                j += i;
            }
        }
        i += 1;
    }
    sieve
        .iter()
        .enumerate()
        .filter_map(|(n, &p)| p.then_some(n))
        .collect()
}

/// Prime factors as `(prime, exponent)` pairs in ascending order.
pub fn prime_factors(n: u64) -> CalcResult<Vec<(u64, u32)>> {
    if n <= 1 {
        return Err(CalcError::invalid("Please enter an integer greater than 1."));
    }
    let mut out = Vec::new();
    let mut rest = n;
    let mut p = 2u64;
    while p.saturating_mul(p) <= rest {
        let mut exp = 0;
        while rest % p == 0 {
            rest /= p;
            exp += 1;
        }
        if exp > 0 {
            out.push((p, exp));
        }
        p += if p == 2 { 1 } else { 2 };
    }
    if rest > 1 {
        out.push((rest, 1));
    }
    Ok(out)
}

/// `2 ^ 4 × 3 ^ 2`
pub fn format_factors(factors: &[(u64, u32)]) -> String {
    factors
        .iter()
        .map(|&(p, e)| if e > 1 { format!("{p} ^ {e}") } else { p.to_string() })
        .collect::<Vec<_>>()
        .join(" × ")
}

// ----- fractions -----

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Fraction {
    pub num: i64,
    pub den: i64,
}

impl Fraction {
    pub fn new(num: i64, den: i64) -> CalcResult<Self> {
        Self::reduced(num as i128, den as i128)
    }

    /// Lowest terms with a positive denominator; fails when a term
    /// does not fit back into `i64`.
    fn reduced(num: i128, den: i128) -> CalcResult<Self> {
        if den == 0 {
            return Err(CalcError::DivideByZero);
        }
        let g = gcd_wide(num.unsigned_abs(), den.unsigned_abs()).max(1) as i128;
        let sign = if den < 0 { -1 } else { 1 };
        Ok(Self {
            num: i64::try_from(sign * num / g).map_err(|_| too_large("Fraction"))?,
            den: i64::try_from(sign * den / g).map_err(|_| too_large("Fraction"))?,
        })
    }

    pub fn to_f64(self) -> f64 {
        self.num as f64 / self.den as f64
    }
}

impl fmt::Display for Fraction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.den == 1 {
            write!(f, "{}", self.num)
        } else {
            write!(f, "{}/{}", self.num, self.den)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FractionOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl std::str::FromStr for FractionOp {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "+" | "add" => Ok(Self::Add),
            "-" | "sub" => Ok(Self::Sub),
            "*" | "×" | "mul" => Ok(Self::Mul),
            "/" | "÷" | "div" => Ok(Self::Div),
            _ => Err(format!("invalid fraction operator: {s}")),
        }
    }
}

pub fn fraction_op(a: Fraction, op: FractionOp, b: Fraction) -> CalcResult<Fraction> {
    let (an, ad, bn, bd) = (a.num as i128, a.den as i128, b.num as i128, b.den as i128);
    let cross = |x: i128, y: i128| x.checked_add(y).ok_or_else(|| too_large("Fraction"));
    match op {
        FractionOp::Add => Fraction::reduced(cross(an * bd, bn * ad)?, ad * bd),
        FractionOp::Sub => Fraction::reduced(cross(an * bd, -(bn * ad))?, ad * bd),
        FractionOp::Mul => Fraction::reduced(an * bn, ad * bd),
        FractionOp::Div => Fraction::reduced(an * bd, ad * bn),
    }
}

// ----- counting -----

/// nPr, exact. `None` when `k > n` or on overflow.
pub fn permutations(n: u64, k: u64) -> Option<u128> {
    if k > n {
        return None;
    }
    (n - k + 1..=n).try_fold(1u128, |acc, v| acc.checked_mul(v as u128))
}

/// nCr, exact. `None` when `k > n` or on overflow.
pub fn combinations(n: u64, k: u64) -> Option<u128> {
    if k > n {
        return None;
    }
    let k = k.min(n - k);
    let mut acc = 1u128;
    for i in 0..k {
        acc = acc.checked_mul((n - i) as u128)? / (i as u128 + 1);
    }
    Some(acc)
}

// ----- rounding / powers -----

pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

pub fn power(base: f64, exponent: f64) -> CalcResult<f64> {
    finite(base.powf(exponent))
}

pub fn nth_root(value: f64, n: f64) -> CalcResult<f64> {
    if n == 0.0 {
        return Err(CalcError::invalid("Root degree cannot be zero."));
    }
    if value < 0.0 {
        // Odd roots of negatives are real.
        if n.fract() == 0.0 && (n as i64) % 2 != 0 {
            return Ok(-(-value).powf(1.0 / n));
        }
        return Err(CalcError::invalid("Even root of a negative number is not real."));
    }
    finite(value.powf(1.0 / n))
}

pub fn log_base(value: f64, base: f64) -> CalcResult<f64> {
    if value <= 0.0 || base <= 0.0 || base == 1.0 {
        return Err(CalcError::invalid("Logarithm requires a positive value and a positive base other than 1."));
    }
    finite(value.ln() / base.ln())
}

fn finite(v: f64) -> CalcResult<f64> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err(CalcError::Evaluation("Result is not a finite number".into()))
    }
}

// ----- ratio -----

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Ratio {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
}

/// Solve `a : b = c : d` for the single missing term.
pub fn solve_ratio(
    a: Option<f64>,
    b: Option<f64>,
    c: Option<f64>,
    d: Option<f64>,
) -> CalcResult<Ratio> {
    let blanks = [a, b, c, d].iter().filter(|v| v.is_none()).count();
    if blanks != 1 {
        return Err(CalcError::invalid("Please leave exactly one field blank to solve."));
    }
    let solved = match (a, b, c, d) {
        (None, Some(b), Some(c), Some(d)) => Ratio { a: b * c / d, b, c, d },
        (Some(a), None, Some(c), Some(d)) => Ratio { a, b: a * d / c, c, d },
        (Some(a), Some(b), None, Some(d)) => Ratio { a, b, c: a * d / b, d },
        (Some(a), Some(b), Some(c), None) => Ratio { a, b, c, d: b * c / a },
        _ => return Err(CalcError::invalid("Please leave exactly one field blank to solve.")),
    };
    for v in [solved.a, solved.b, solved.c, solved.d] {
        finite(v).map_err(|_| CalcError::DivideByZero)?;
    }
    Ok(solved)
}

// ----- percentage -----

/// `x% of y`
pub fn percent_of(percent: f64, of: f64) -> f64 {
    percent / 100.0 * of
}

/// `part is what % of whole`
pub fn what_percent(part: f64, whole: f64) -> CalcResult<f64> {
    if whole == 0.0 {
        return Err(CalcError::DivideByZero);
    }
    Ok(part / whole * 100.0)
}

/// `part is percent% of what`
pub fn percent_whole(part: f64, percent: f64) -> CalcResult<f64> {
    if percent == 0.0 {
        return Err(CalcError::DivideByZero);
    }
    Ok(part / percent * 100.0)
}

// ----- random -----

pub fn random_integers<R: Rng + ?Sized>(
    rng: &mut R,
    min: i64,
    max: i64,
    count: usize,
) -> CalcResult<Vec<i64>> {
    if min > max {
        return Err(CalcError::invalid("Min must be less than or equal to max."));
    }
    if count == 0 {
        return Err(CalcError::invalid("Count must be greater than 0."));
    }
    Ok((0..count).map(|_| rng.gen_range(min..=max)).collect())
}
