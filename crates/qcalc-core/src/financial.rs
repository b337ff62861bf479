//! Loan, savings and tax calculators.
//!
//! Rates are annual percentages unless a name says otherwise. Payments are
//! monthly.

use serde::Serialize;

use crate::error::{CalcError, CalcResult};
use crate::explain::AutoLoanDetails;
use crate::graphing::LabeledValue;

const RATE_PRECISION: f64 = 1e-7;
const RATE_MAX_ITERATIONS: usize = 100;
pub const MAX_TERM_YEARS: u32 = 100;

fn require(cond: bool, msg: &str) -> CalcResult<()> {
    if cond {
        Ok(())
    } else {
        Err(CalcError::invalid(msg))
    }
}

/// Months in a term of `years`, refusing terms past `MAX_TERM_YEARS`.
fn term_months(years: u32) -> CalcResult<u32> {
    if years > MAX_TERM_YEARS {
        return Err(CalcError::OutOfRange(format!(
            "Term must be at most {MAX_TERM_YEARS} years."
        )));
    }
    Ok(years * 12)
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Level monthly payment that repays `principal` over `months`.
pub fn monthly_payment(principal: f64, annual_rate_percent: f64, months: u32) -> f64 {
    let i = annual_rate_percent / 100.0 / 12.0;
    let n = months as f64;
    if i == 0.0 {
        return principal / n;
    }
    let growth = (1.0 + i).powf(n);
    principal * (i * growth) / (growth - 1.0)
}

fn slices(items: &[(&str, f64)]) -> Vec<LabeledValue> {
    items
        .iter()
        .filter(|(_, v)| *v > 0.0)
        .map(|(label, value)| LabeledValue {
            label: label.to_string(),
            value: *value,
        })
        .collect()
}

// ----- loans -----

/// One row per loan year; year 0 is the starting balance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct YearRow {
    pub year: u32,
    pub balance: f64,
    pub principal_paid: f64,
    pub interest_paid: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoanSummary {
    pub monthly_payment: f64,
    pub total_paid: f64,
    pub total_interest: f64,
    pub yearly: Vec<YearRow>,
}

fn yearly_rows(principal: f64, annual_rate_percent: f64, months: u32, payment: f64) -> Vec<YearRow> {
    let i = annual_rate_percent / 100.0 / 12.0;
    let mut rows = vec![YearRow {
        year: 0,
        balance: principal,
        principal_paid: 0.0,
        interest_paid: 0.0,
    }];
    let mut balance = principal;
    let (mut year_principal, mut year_interest) = (0.0, 0.0);
    for month in 1..=months {
        let interest = balance * i;
        let principal_part = payment - interest;
        balance -= principal_part;
        year_interest += interest;
        year_principal += principal_part;
        if month % 12 == 0 || month == months {
            rows.push(YearRow {
                year: month.div_ceil(12),
                balance: if balance > 0.0 { round2(balance) } else { 0.0 },
                principal_paid: round2(year_principal),
                interest_paid: round2(year_interest),
            });
            year_principal = 0.0;
            year_interest = 0.0;
        }
    }
    rows
}

pub fn loan(amount: f64, annual_rate_percent: f64, years: u32) -> CalcResult<LoanSummary> {
    require(
        amount > 0.0 && annual_rate_percent >= 0.0 && years > 0,
        "Please enter a positive amount, a non-negative rate and a positive term.",
    )?;
    let months = term_months(years)?;
    let payment = monthly_payment(amount, annual_rate_percent, months);
    let total_paid = if annual_rate_percent == 0.0 {
        amount
    } else {
        payment * months as f64
    };
    Ok(LoanSummary {
        monthly_payment: payment,
        total_paid,
        total_interest: total_paid - amount,
        yearly: yearly_rows(amount, annual_rate_percent, months, payment),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MonthRow {
    pub month: u32,
    pub payment: f64,
    pub principal: f64,
    pub interest: f64,
    pub balance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Amortization {
    pub monthly_payment: f64,
    pub total_paid: f64,
    pub total_interest: f64,
    pub schedule: Vec<MonthRow>,
}

pub fn amortization_schedule(
    amount: f64,
    annual_rate_percent: f64,
    years: u32,
) -> CalcResult<Amortization> {
    require(
        amount > 0.0 && annual_rate_percent >= 0.0 && years > 0,
        "Please enter a positive amount, a non-negative rate and a positive term.",
    )?;
    let months = term_months(years)?;
    let i = annual_rate_percent / 100.0 / 12.0;
    let payment = monthly_payment(amount, annual_rate_percent, months);
    let mut balance = amount;
    let schedule = (1..=months)
        .map(|month| {
            let interest = balance * i;
            let principal = payment - interest;
            balance -= principal;
            MonthRow {
                month,
                payment,
                principal,
                interest,
                balance: balance.max(0.0),
            }
        })
        .collect();
    let total_paid = payment * months as f64;
    Ok(Amortization {
        monthly_payment: payment,
        total_paid,
        total_interest: total_paid - amount,
        schedule,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RateSolution {
    pub apr: f64,
    pub total_paid: f64,
    pub total_interest: f64,
}

/// Find the APR that makes `payment` repay `principal` in `years`.
pub fn solve_interest_rate(principal: f64, payment: f64, years: u32) -> CalcResult<RateSolution> {
    require(
        principal > 0.0 && payment > 0.0 && years > 0,
        "Please enter valid positive numbers for all fields.",
    )?;
    let n = term_months(years)? as f64;
    require(
        payment * n > principal,
        "Monthly payment is too low to cover the principal. The loan will never be paid off.",
    )?;

    // Bisection on the monthly rate.
    let (mut low, mut high) = (0.0f64, 1.0f64);
    let mut mid = 0.0;
    for _ in 0..RATE_MAX_ITERATIONS {
        mid = (low + high) / 2.0;
        if high - low < RATE_PRECISION {
            break;
        }
        let growth = (1.0 + mid).powf(n);
        let computed = principal * (mid * growth) / (growth - 1.0);
        if computed > payment {
            high = mid;
        } else {
            low = mid;
        }
    }
    if !mid.is_finite() {
        return Err(CalcError::invalid("Could not calculate the interest rate."));
    }
    let total_paid = payment * n;
    Ok(RateSolution {
        apr: mid * 12.0 * 100.0,
        total_paid,
        total_interest: total_paid - principal,
    })
}

// ----- mortgage -----

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MortgageInput {
    pub home_price: f64,
    pub down_payment: f64,
    pub years: u32,
    pub annual_rate_percent: f64,
    pub annual_tax: f64,
    pub annual_insurance: f64,
    pub pmi_rate_percent: f64,
}

/// Cumulative totals at the end of each year.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MortgageYear {
    pub year: u32,
    pub balance: f64,
    pub interest_total: f64,
    pub principal_total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Mortgage {
    pub loan_amount: f64,
    pub monthly_principal_interest: f64,
    pub monthly_tax: f64,
    pub monthly_insurance: f64,
    pub monthly_pmi: f64,
    pub total_monthly: f64,
    pub total_interest: f64,
    pub breakdown: Vec<LabeledValue>,
    pub yearly: Vec<MortgageYear>,
}

pub fn down_payment_percent(home_price: f64, down_payment: f64) -> f64 {
    if home_price > 0.0 {
        down_payment / home_price * 100.0
    } else {
        0.0
    }
}

pub fn mortgage(input: &MortgageInput) -> CalcResult<Mortgage> {
    require(
        input.home_price.is_finite() && input.down_payment.is_finite() && input.years > 0,
        "Please enter valid numbers for all fields.",
    )?;
    let months = term_months(input.years)?;
    let loan_amount = input.home_price - input.down_payment;
    let monthly_tax = input.annual_tax / 12.0;
    let monthly_insurance = input.annual_insurance / 12.0;

    if loan_amount <= 0.0 {
        return Ok(Mortgage {
            loan_amount: 0.0,
            monthly_principal_interest: 0.0,
            monthly_tax,
            monthly_insurance,
            monthly_pmi: 0.0,
            total_monthly: monthly_tax + monthly_insurance,
            total_interest: 0.0,
            breakdown: slices(&[
                ("Property Tax", monthly_tax),
                ("Home Insurance", monthly_insurance),
            ]),
            yearly: Vec::new(),
        });
    }

    let i = input.annual_rate_percent / 100.0 / 12.0;
    let pi = monthly_payment(loan_amount, input.annual_rate_percent, months);
    let monthly_pmi = if down_payment_percent(input.home_price, input.down_payment) < 20.0 {
        loan_amount * (input.pmi_rate_percent / 100.0) / 12.0
    } else {
        0.0
    };

    let mut yearly = vec![MortgageYear {
        year: 0,
        balance: loan_amount,
        interest_total: 0.0,
        principal_total: 0.0,
    }];
    let mut balance = loan_amount;
    let mut interest_total = 0.0;
    for year in 1..=input.years {
        for _ in 0..12 {
            let interest = balance * i;
            balance -= pi - interest;
            interest_total += interest;
        }
        let remaining = balance.max(0.0);
        yearly.push(MortgageYear {
            year,
            balance: remaining,
            interest_total,
            principal_total: loan_amount - remaining,
        });
    }

    Ok(Mortgage {
        loan_amount,
        monthly_principal_interest: pi,
        monthly_tax,
        monthly_insurance,
        monthly_pmi,
        total_monthly: pi + monthly_tax + monthly_insurance + monthly_pmi,
        total_interest: interest_total,
        breakdown: slices(&[
            ("Principal & Interest", pi),
            ("Property Tax", monthly_tax),
            ("Home Insurance", monthly_insurance),
            ("PMI", monthly_pmi),
        ]),
        yearly,
    })
}

// ----- auto loan -----

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AutoLoanInput {
    pub vehicle_price: f64,
    pub down_payment: f64,
    pub trade_in: f64,
    pub fees: f64,
    pub sales_tax_percent: f64,
    pub annual_rate_percent: f64,
    pub years: u32,
}

impl AutoLoanInput {
    pub fn details(&self, loan_amount: f64) -> AutoLoanDetails {
        AutoLoanDetails {
            loan_amount,
            interest_rate: self.annual_rate_percent,
            term_years: self.years as f64,
            vehicle_price: self.vehicle_price,
            down_payment: self.down_payment,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AutoLoan {
    pub loan_amount: f64,
    pub tax_amount: f64,
    pub monthly_payment: f64,
    pub total_paid: f64,
    pub total_interest: f64,
    pub breakdown: Vec<LabeledValue>,
    pub yearly: Vec<YearRow>,
}

pub fn auto_loan(input: &AutoLoanInput) -> CalcResult<AutoLoan> {
    require(
        input.vehicle_price > 0.0 && input.annual_rate_percent >= 0.0 && input.years > 0,
        "Please enter a positive price, a non-negative rate and a positive term.",
    )?;
    let taxable = (input.vehicle_price - input.trade_in).max(0.0);
    let tax_amount = taxable * input.sales_tax_percent / 100.0;
    let total_cost = input.vehicle_price + tax_amount + input.fees;
    let principal = (total_cost - input.down_payment - input.trade_in).max(0.0);

    if principal == 0.0 {
        return Ok(AutoLoan {
            loan_amount: 0.0,
            tax_amount,
            monthly_payment: 0.0,
            total_paid: 0.0,
            total_interest: 0.0,
            breakdown: slices(&[
                ("Vehicle Price", input.vehicle_price),
                ("Sales Tax", tax_amount),
                ("Fees", input.fees),
            ]),
            yearly: Vec::new(),
        });
    }

    let summary = loan(principal, input.annual_rate_percent, input.years)?;
    Ok(AutoLoan {
        loan_amount: principal,
        tax_amount,
        monthly_payment: summary.monthly_payment,
        total_paid: summary.total_paid,
        total_interest: summary.total_interest,
        breakdown: slices(&[
            ("Vehicle Price", input.vehicle_price),
            ("Sales Tax", tax_amount),
            ("Fees", input.fees),
            ("Total Interest", summary.total_interest.max(0.0)),
        ]),
        yearly: summary.yearly,
    })
}

// ----- growth -----

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GrowthRow {
    /// Year index, or age for retirement projections.
    pub year: u32,
    pub principal: f64,
    pub contributions: f64,
    pub interest: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Growth {
    pub future_value: f64,
    pub total_contributions: f64,
    pub total_interest: f64,
    pub yearly: Vec<GrowthRow>,
}

/// Future value of `principal` plus `contribution` per period.
pub fn future_value(principal: f64, contribution: f64, rate_per_period: f64, periods: f64) -> f64 {
    let principal_part = principal * (1.0 + rate_per_period).powf(periods);
    if rate_per_period > 0.0 {
        principal_part + contribution * (((1.0 + rate_per_period).powf(periods) - 1.0) / rate_per_period)
    } else {
        principal_part + contribution * periods
    }
}

fn growth(
    principal: f64,
    contribution: f64,
    annual_rate_percent: f64,
    years: u32,
    periods_per_year: u32,
    first_label: u32,
) -> Growth {
    let rate = annual_rate_percent / 100.0 / periods_per_year as f64;
    let yearly: Vec<GrowthRow> = (0..=years)
        .map(|year| {
            let periods = periods_per_year as f64 * year as f64;
            let value = future_value(principal, contribution, rate, periods);
            let contributions = contribution * periods;
            GrowthRow {
                year: first_label + year,
                principal,
                contributions,
                interest: (value - principal - contributions).max(0.0),
            }
        })
        .collect();
    let periods = periods_per_year as f64 * years as f64;
    let future_value = future_value(principal, contribution, rate, periods);
    let total_contributions = principal + contribution * periods;
    Growth {
        future_value,
        total_contributions,
        total_interest: future_value - total_contributions,
        yearly,
    }
}

pub fn investment(
    principal: f64,
    contribution: f64,
    annual_rate_percent: f64,
    years: u32,
    periods_per_year: u32,
) -> CalcResult<Growth> {
    require(
        years > 0 && periods_per_year > 0 && principal.is_finite() && contribution.is_finite(),
        "Please enter a positive term and compounding frequency.",
    )?;
    term_months(years)?;
    Ok(growth(principal, contribution, annual_rate_percent, years, periods_per_year, 0))
}

/// Monthly compounding from `current_age` until `retirement_age`; rows are
/// labelled by age.
pub fn retirement(
    current_age: u32,
    retirement_age: u32,
    savings: f64,
    monthly_contribution: f64,
    annual_rate_percent: f64,
) -> CalcResult<Growth> {
    require(
        retirement_age > current_age,
        "Retirement age must be greater than current age.",
    )?;
    term_months(retirement_age - current_age)?;
    Ok(growth(
        savings,
        monthly_contribution,
        annual_rate_percent,
        retirement_age - current_age,
        12,
        current_age,
    ))
}

// ----- simple interest -----

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Years,
    Months,
    Days,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SimpleInterest {
    pub interest: f64,
    pub total: f64,
}

pub fn simple_interest(
    principal: f64,
    annual_rate_percent: f64,
    time: f64,
    unit: TimeUnit,
) -> CalcResult<SimpleInterest> {
    require(
        principal > 0.0 && annual_rate_percent >= 0.0 && time > 0.0,
        "Please enter a positive principal and time, and a non-negative rate.",
    )?;
    let years = match unit {
        TimeUnit::Years => time,
        TimeUnit::Months => time / 12.0,
        TimeUnit::Days => time / 365.0,
    };
    let interest = principal * annual_rate_percent / 100.0 * years;
    Ok(SimpleInterest {
        interest,
        total: principal + interest,
    })
}

// ----- payment solver -----

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "solved", content = "value", rename_all = "camelCase")]
pub enum PaymentUnknown {
    Payment(f64),
    Amount(f64),
    TermYears(f64),
}

/// Leave exactly one of the four inputs `None` and solve for it.
pub fn solve_payment_unknown(
    amount: Option<f64>,
    annual_rate_percent: Option<f64>,
    term_years: Option<f64>,
    payment: Option<f64>,
) -> CalcResult<PaymentUnknown> {
    let blanks = [amount, annual_rate_percent, term_years, payment]
        .iter()
        .filter(|v| v.is_none())
        .count();
    require(blanks == 1, "Please leave exactly one field blank to calculate.")?;

    match (amount, annual_rate_percent, term_years, payment) {
        (Some(p), Some(r), Some(t), None) => {
            let i = r / 100.0 / 12.0;
            let n = t * 12.0;
            let m = if i == 0.0 {
                p / n
            } else {
                p * (i * (1.0 + i).powf(n)) / ((1.0 + i).powf(n) - 1.0)
            };
            finite(m).map(PaymentUnknown::Payment)
        }
        (None, Some(r), Some(t), Some(m)) => {
            let i = r / 100.0 / 12.0;
            let n = t * 12.0;
            let p = if i == 0.0 {
                m * n
            } else {
                m * ((1.0 + i).powf(n) - 1.0) / (i * (1.0 + i).powf(n))
            };
            finite(p).map(PaymentUnknown::Amount)
        }
        (Some(p), Some(r), None, Some(m)) => {
            let i = r / 100.0 / 12.0;
            if i == 0.0 {
                require(m > 0.0, "Payment is too low to cover interest.")?;
                return Ok(PaymentUnknown::TermYears(p / m / 12.0));
            }
            require(p * i < m, "Payment is too low to cover interest.")?;
            let n = -(1.0 - p * i / m).ln() / (1.0 + i).ln();
            finite(n / 12.0).map(PaymentUnknown::TermYears)
        }
        _ => Err(CalcError::invalid(
            "Rate calculation is complex and best handled in the dedicated Interest Rate Calculator for now.",
        )),
    }
}

fn finite(v: f64) -> CalcResult<f64> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err(CalcError::invalid("Calculation failed. Check your inputs."))
    }
}

// ----- inflation -----

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InflationMode {
    /// What today's amount will cost in the future.
    Future,
    /// What today's amount was worth in the past.
    Past,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Inflation {
    pub value: f64,
    pub change: f64,
}

pub fn inflation(amount: f64, annual_rate_percent: f64, years: u32, mode: InflationMode) -> Inflation {
    let factor = (1.0 + annual_rate_percent / 100.0).powi(years as i32);
    match mode {
        InflationMode::Future => {
            let value = amount * factor;
            Inflation {
                value,
                change: value - amount,
            }
        }
        InflationMode::Past => {
            let value = amount / factor;
            Inflation {
                value,
                change: amount - value,
            }
        }
    }
}

// ----- income tax -----

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilingStatus {
    Single,
    MarriedFilingJointly,
}

struct Bracket {
    rate: f64,
    from: f64,
    to: Option<f64>,
}

const fn bracket(rate: f64, from: f64, to: Option<f64>) -> Bracket {
    Bracket { rate, from, to }
}

const SINGLE_2024: &[Bracket] = &[
    bracket(0.10, 0.0, Some(11_600.0)),
    bracket(0.12, 11_601.0, Some(47_150.0)),
    bracket(0.22, 47_151.0, Some(100_525.0)),
    bracket(0.24, 100_526.0, Some(191_950.0)),
    bracket(0.32, 191_951.0, Some(243_725.0)),
    bracket(0.35, 243_726.0, Some(609_350.0)),
    bracket(0.37, 609_351.0, None),
];

const JOINT_2024: &[Bracket] = &[
    bracket(0.10, 0.0, Some(23_200.0)),
    bracket(0.12, 23_201.0, Some(94_300.0)),
    bracket(0.22, 94_301.0, Some(201_050.0)),
    bracket(0.24, 201_051.0, Some(383_900.0)),
    bracket(0.32, 383_901.0, Some(487_450.0)),
    bracket(0.35, 487_451.0, Some(731_200.0)),
    bracket(0.37, 731_201.0, None),
];

impl FilingStatus {
    fn brackets(self) -> &'static [Bracket] {
        match self {
            Self::Single => SINGLE_2024,
            Self::MarriedFilingJointly => JOINT_2024,
        }
    }

    pub fn standard_deduction(self) -> f64 {
        match self {
            Self::Single => 14_600.0,
            Self::MarriedFilingJointly => 29_200.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TaxBand {
    pub rate_percent: f64,
    pub from: f64,
    /// `None` for the open top bracket.
    pub to: Option<f64>,
    pub tax: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IncomeTax {
    pub taxable_income: f64,
    pub total_tax: f64,
    pub effective_rate: f64,
    pub marginal_rate: f64,
    pub breakdown: Vec<TaxBand>,
}

/// US federal income tax, 2024 brackets with the standard deduction.
pub fn income_tax(gross_income: f64, status: FilingStatus) -> CalcResult<IncomeTax> {
    require(gross_income.is_finite(), "Please enter a valid income.")?;
    let taxable_income = (gross_income - status.standard_deduction()).max(0.0);
    let mut remaining = taxable_income;
    let mut total_tax = 0.0;
    let mut marginal = 0.0;
    let mut breakdown = Vec::new();
    for b in status.brackets() {
        if remaining <= 0.0 {
            break;
        }
        let width = match b.to {
            Some(to) => to - b.from + 1.0,
            None => f64::INFINITY,
        };
        let in_bracket = remaining.min(width);
        let tax = in_bracket * b.rate;
        total_tax += tax;
        remaining -= in_bracket;
        marginal = b.rate;
        breakdown.push(TaxBand {
            rate_percent: b.rate * 100.0,
            from: b.from,
            to: b.to,
            tax,
        });
    }
    let effective_rate = if gross_income > 0.0 {
        total_tax / gross_income * 100.0
    } else {
        0.0
    };
    Ok(IncomeTax {
        taxable_income,
        total_tax,
        effective_rate,
        marginal_rate: marginal * 100.0,
        breakdown,
    })
}

// ----- sales tax -----

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SalesTax {
    pub net: f64,
    pub tax: f64,
    pub gross: f64,
}

/// Tax added on top of a pre-tax price.
pub fn sales_tax(net: f64, rate_percent: f64) -> SalesTax {
    let tax = net * rate_percent / 100.0;
    SalesTax {
        net,
        tax,
        gross: net + tax,
    }
}

/// Split a tax-inclusive price into base and tax.
pub fn reverse_sales_tax(gross: f64, rate_percent: f64) -> SalesTax {
    let net = gross / (1.0 + rate_percent / 100.0);
    SalesTax {
        net,
        tax: gross - net,
        gross,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64, eps: f64) -> bool {
        (a - b).abs() < eps
    }

    #[test]
    fn test_monthly_payment() {
        // 25k at 6.5% over 5 years.
        assert!(approx(monthly_payment(25_000.0, 6.5, 60), 489.15, 0.01));
        assert_eq!(monthly_payment(12_000.0, 0.0, 12), 1000.0);
    }

    #[test]
    fn test_zero_interest_loan() {
        let l = loan(12_000.0, 0.0, 1).unwrap();
        assert_eq!(l.monthly_payment, 1000.0);
        assert_eq!(l.total_interest, 0.0);
        assert_eq!(l.yearly.last().unwrap().balance, 0.0);
    }

    #[test]
    fn test_loan_yearly_rows() {
        let l = loan(25_000.0, 6.5, 5).unwrap();
        assert_eq!(l.yearly.len(), 6);
        assert_eq!(l.yearly[0].balance, 25_000.0);
        assert_eq!(l.yearly[5].balance, 0.0);
        let principal: f64 = l.yearly.iter().map(|r| r.principal_paid).sum();
        assert!(approx(principal, 25_000.0, 0.05));
        let interest: f64 = l.yearly.iter().map(|r| r.interest_paid).sum();
        assert!(approx(interest, l.total_interest, 0.05));
        assert!(loan(0.0, 5.0, 5).is_err());
        assert!(loan(100.0, -1.0, 5).is_err());
    }

    #[test]
    fn test_term_limits() {
        let err = loan(25_000.0, 6.5, u32::MAX).unwrap_err();
        assert!(matches!(err, CalcError::OutOfRange(_)));
        assert_eq!(err.to_string(), "Term must be at most 100 years.");
        assert!(amortization_schedule(10_000.0, 5.0, u32::MAX).is_err());
        assert!(solve_interest_rate(10_000.0, 500.0, u32::MAX).is_err());
        assert!(investment(1_000.0, 0.0, 5.0, u32::MAX, 12).is_err());
        assert!(retirement(0, u32::MAX, 0.0, 100.0, 5.0).is_err());
        assert_eq!(loan(25_000.0, 6.5, MAX_TERM_YEARS).unwrap().yearly.len(), 101);
    }

    #[test]
    fn test_amortization_schedule() {
        let a = amortization_schedule(10_000.0, 5.0, 1).unwrap();
        assert_eq!(a.schedule.len(), 12);
        assert!(approx(a.schedule[0].interest, 41.67, 0.01));
        assert!(a.schedule[11].balance < 0.01);
    }

    #[test]
    fn test_solve_interest_rate_recovers_apr() {
        let payment = monthly_payment(20_000.0, 6.0, 60);
        let r = solve_interest_rate(20_000.0, payment, 5).unwrap();
        assert!(approx(r.apr, 6.0, 1e-3));
    }

    #[test]
    fn test_solve_interest_rate_payment_too_low() {
        assert_eq!(
            solve_interest_rate(20_000.0, 100.0, 5).unwrap_err().to_string(),
            "Monthly payment is too low to cover the principal. The loan will never be paid off."
        );
    }

    #[test]
    fn test_mortgage_with_pmi() {
        let m = mortgage(&MortgageInput {
            home_price: 400_000.0,
            down_payment: 40_000.0,
            years: 30,
            annual_rate_percent: 6.0,
            annual_tax: 4_800.0,
            annual_insurance: 1_200.0,
            pmi_rate_percent: 0.5,
        })
        .unwrap();
        assert_eq!(m.loan_amount, 360_000.0);
        assert!(approx(m.monthly_principal_interest, 2158.38, 0.01));
        assert_eq!(m.monthly_tax, 400.0);
        assert_eq!(m.monthly_pmi, 150.0);
        assert_eq!(m.breakdown.len(), 4);
        assert_eq!(m.yearly.len(), 31);
        assert!(m.yearly[30].balance < 1.0);
    }

    #[test]
    fn test_mortgage_no_pmi_at_twenty_percent() {
        let m = mortgage(&MortgageInput {
            home_price: 100_000.0,
            down_payment: 20_000.0,
            years: 15,
            annual_rate_percent: 5.0,
            annual_tax: 0.0,
            annual_insurance: 0.0,
            pmi_rate_percent: 1.0,
        })
        .unwrap();
        assert_eq!(m.monthly_pmi, 0.0);
        assert_eq!(m.breakdown.len(), 1);
    }

    #[test]
    fn test_mortgage_paid_in_cash() {
        let m = mortgage(&MortgageInput {
            home_price: 100_000.0,
            down_payment: 100_000.0,
            years: 30,
            annual_rate_percent: 5.0,
            annual_tax: 1_200.0,
            annual_insurance: 600.0,
            pmi_rate_percent: 1.0,
        })
        .unwrap();
        assert_eq!(m.loan_amount, 0.0);
        assert_eq!(m.total_monthly, 150.0);
        assert!(m.yearly.is_empty());
    }

    #[test]
    fn test_auto_loan() {
        let input = AutoLoanInput {
            vehicle_price: 30_000.0,
            down_payment: 5_000.0,
            trade_in: 2_000.0,
            fees: 500.0,
            sales_tax_percent: 7.0,
            annual_rate_percent: 0.0,
            years: 5,
        };
        let a = auto_loan(&input).unwrap();
        assert!(approx(a.tax_amount, 1_960.0, 1e-9));
        assert!(approx(a.loan_amount, 25_460.0, 1e-9));
        assert!(approx(a.monthly_payment, 25_460.0 / 60.0, 1e-9));
        assert_eq!(a.total_interest, 0.0);
        assert_eq!(input.details(a.loan_amount).term_years, 5.0);
    }

    #[test]
    fn test_auto_loan_fully_covered() {
        let a = auto_loan(&AutoLoanInput {
            vehicle_price: 10_000.0,
            down_payment: 20_000.0,
            trade_in: 0.0,
            fees: 0.0,
            sales_tax_percent: 0.0,
            annual_rate_percent: 5.0,
            years: 3,
        })
        .unwrap();
        assert_eq!(a.loan_amount, 0.0);
        assert_eq!(a.breakdown.len(), 1);
    }

    #[test]
    fn test_investment() {
        let g = investment(1_000.0, 100.0, 0.0, 2, 12).unwrap();
        assert_eq!(g.future_value, 3_400.0);
        assert_eq!(g.total_interest, 0.0);
        assert_eq!(g.yearly.len(), 3);
        let g = investment(10_000.0, 0.0, 5.0, 10, 1).unwrap();
        assert!(approx(g.future_value, 16_288.95, 0.01));
    }

    #[test]
    fn test_retirement_labels_by_age() {
        let g = retirement(30, 65, 10_000.0, 500.0, 7.0).unwrap();
        assert_eq!(g.yearly.first().unwrap().year, 30);
        assert_eq!(g.yearly.last().unwrap().year, 65);
        assert!(g.future_value > g.total_contributions);
        assert!(retirement(65, 65, 0.0, 0.0, 5.0).is_err());
    }

    #[test]
    fn test_simple_interest_units() {
        let y = simple_interest(1_000.0, 5.0, 2.0, TimeUnit::Years).unwrap();
        assert!(approx(y.interest, 100.0, 1e-9));
        let m = simple_interest(1_000.0, 5.0, 6.0, TimeUnit::Months).unwrap();
        assert!(approx(m.interest, 25.0, 1e-9));
        let d = simple_interest(1_000.0, 5.0, 365.0, TimeUnit::Days).unwrap();
        assert!(approx(d.total, 1_050.0, 1e-9));
    }

    #[test]
    fn test_payment_solver() {
        let p = solve_payment_unknown(Some(25_000.0), Some(6.5), Some(5.0), None).unwrap();
        let PaymentUnknown::Payment(m) = p else { panic!("expected payment") };
        assert!(approx(m, 489.15, 0.01));

        let a = solve_payment_unknown(None, Some(6.5), Some(5.0), Some(m)).unwrap();
        assert!(matches!(a, PaymentUnknown::Amount(v) if approx(v, 25_000.0, 1e-6)));

        let t = solve_payment_unknown(Some(25_000.0), Some(6.5), None, Some(m)).unwrap();
        assert!(matches!(t, PaymentUnknown::TermYears(v) if approx(v, 5.0, 1e-6)));
    }

    #[test]
    fn test_payment_solver_errors() {
        let msg = |r: CalcResult<PaymentUnknown>| r.unwrap_err().to_string();
        assert_eq!(
            msg(solve_payment_unknown(Some(1.0), None, None, Some(1.0))),
            "Please leave exactly one field blank to calculate."
        );
        assert_eq!(
            msg(solve_payment_unknown(Some(1_000.0), None, Some(1.0), Some(100.0))),
            "Rate calculation is complex and best handled in the dedicated Interest Rate Calculator for now."
        );
        assert_eq!(
            msg(solve_payment_unknown(Some(100_000.0), Some(12.0), None, Some(500.0))),
            "Payment is too low to cover interest."
        );
    }

    #[test]
    fn test_inflation() {
        let f = inflation(1_000.0, 3.0, 10, InflationMode::Future);
        assert!(approx(f.value, 1_343.92, 0.01));
        let p = inflation(1_000.0, 3.0, 10, InflationMode::Past);
        assert!(approx(p.value, 744.09, 0.01));
        assert!(approx(p.change, 1_000.0 - p.value, 1e-9));
    }

    #[test]
    fn test_income_tax_single() {
        let t = income_tax(80_000.0, FilingStatus::Single).unwrap();
        assert_eq!(t.taxable_income, 65_400.0);
        // 11600*.10 + 35550*.12 + 18250*.22
        assert!(approx(t.total_tax, 1_160.0 + 4_266.0 + 4_015.0, 1e-6));
        assert_eq!(t.marginal_rate, 22.0);
        assert_eq!(t.breakdown.len(), 3);
    }

    #[test]
    fn test_income_tax_below_deduction() {
        let t = income_tax(10_000.0, FilingStatus::MarriedFilingJointly).unwrap();
        assert_eq!(t.total_tax, 0.0);
        assert_eq!(t.effective_rate, 0.0);
        assert!(t.breakdown.is_empty());
    }

    #[test]
    fn test_income_tax_top_bracket_open() {
        let t = income_tax(2_000_000.0, FilingStatus::Single).unwrap();
        assert_eq!(t.marginal_rate, 37.0);
        assert_eq!(t.breakdown.last().unwrap().to, None);
    }

    #[test]
    fn test_sales_tax_both_ways() {
        let f = sales_tax(100.0, 8.5);
        assert!(approx(f.tax, 8.5, 1e-9));
        assert!(approx(f.gross, 108.5, 1e-9));
        let r = reverse_sales_tax(107.0, 7.0);
        assert!(approx(r.net, 100.0, 1e-9));
        assert!(approx(r.tax, 7.0, 1e-9));
    }
}
