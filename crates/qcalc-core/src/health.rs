//! Body and fitness calculators. Every function takes metric inputs;
//! convert imperial readings with the helpers below first.

use std::fmt;
use std::str::FromStr;

use chrono::{Duration, NaiveDate};
use serde::Serialize;

use crate::error::{CalcError, CalcResult};
use crate::graphing::LabeledValue;

const LB_TO_KG: f64 = 0.453592;
const KG_TO_LB: f64 = 2.20462;
const INCH_TO_CM: f64 = 2.54;
const OZ_TO_L: f64 = 0.0295735;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnitSystem {
    #[default]
    Metric,
    Imperial,
}

impl fmt::Display for UnitSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Metric => write!(f, "metric"),
            Self::Imperial => write!(f, "imperial"),
        }
    }
}

impl FromStr for UnitSystem {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "metric" => Ok(Self::Metric),
            "imperial" => Ok(Self::Imperial),
            _ => Err(format!("invalid unit system: {s}")),
        }
    }
}

impl UnitSystem {
    pub fn weight_to_kg(self, weight: f64) -> f64 {
        match self {
            Self::Metric => weight,
            Self::Imperial => weight * LB_TO_KG,
        }
    }

    pub fn length_to_cm(self, length: f64) -> f64 {
        match self {
            Self::Metric => length,
            Self::Imperial => length * INCH_TO_CM,
        }
    }

    pub fn distance_label(self) -> &'static str {
        match self {
            Self::Metric => "km",
            Self::Imperial => "mi",
        }
    }
}

pub fn feet_inches_to_cm(feet: f64, inches: f64) -> f64 {
    (feet * 12.0 + inches) * INCH_TO_CM
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gender {
    Male,
    Female,
}

impl FromStr for Gender {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "male" | "m" => Ok(Self::Male),
            "female" | "f" => Ok(Self::Female),
            _ => Err(format!("invalid gender: {s}")),
        }
    }
}

fn require(cond: bool, msg: &str) -> CalcResult<()> {
    if cond {
        Ok(())
    } else {
        Err(CalcError::invalid(msg))
    }
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

// ----- body composition -----

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bmi {
    pub value: f64,
    pub category: &'static str,
}

pub fn bmi_category(bmi: f64) -> &'static str {
    if bmi < 18.5 {
        "Underweight"
    } else if bmi < 25.0 {
        "Normal weight"
    } else if bmi < 30.0 {
        "Overweight"
    } else {
        "Obesity"
    }
}

/// BMI rounded to one decimal.
pub fn bmi(weight_kg: f64, height_cm: f64) -> CalcResult<Bmi> {
    require(
        weight_kg > 0.0 && height_cm > 0.0,
        "Weight and height must be positive numbers.",
    )?;
    let m = height_cm / 100.0;
    let value = weight_kg / (m * m);
    Ok(Bmi {
        value: round1(value),
        category: bmi_category(value),
    })
}

/// US Navy body-fat percentage, never below 2 %.
pub fn body_fat_navy(
    gender: Gender,
    height_cm: f64,
    waist_cm: f64,
    neck_cm: f64,
    hip_cm: Option<f64>,
) -> CalcResult<f64> {
    require(
        height_cm > 0.0 && waist_cm > 0.0 && neck_cm > 0.0,
        "Height, waist and neck must be positive numbers.",
    )?;
    let bfp = match gender {
        Gender::Male => {
            require(waist_cm > neck_cm, "Waist must be larger than neck.")?;
            86.010 * (waist_cm - neck_cm).log10() - 70.041 * height_cm.log10() + 36.76
        }
        Gender::Female => {
            let hip = hip_cm.filter(|h| *h > 0.0).ok_or_else(|| {
                CalcError::invalid("Hip measurement is required for women.")
            })?;
            require(waist_cm + hip > neck_cm, "Waist plus hip must exceed neck.")?;
            163.205 * (waist_cm + hip - neck_cm).log10() - 97.684 * height_cm.log10() - 78.387
        }
    };
    Ok(round1(bfp.max(2.0)))
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LeanMass {
    pub lean_mass: f64,
    pub fat_mass: f64,
}

/// Works in whatever weight unit is passed in.
pub fn lean_body_mass(weight: f64, body_fat_percent: f64) -> CalcResult<LeanMass> {
    require(
        weight > 0.0 && (0.0..100.0).contains(&body_fat_percent),
        "Weight must be positive and body fat between 0 and 100%.",
    )?;
    let fat_mass = weight * body_fat_percent / 100.0;
    Ok(LeanMass {
        lean_mass: weight - fat_mass,
        fat_mass,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IdealWeight {
    /// Formula name and result in kg.
    pub formulas: Vec<LabeledValue>,
    pub healthy_bmi_min_kg: f64,
    pub healthy_bmi_max_kg: f64,
    pub formula_min_kg: f64,
    pub formula_max_kg: f64,
}

pub fn ideal_weight(gender: Gender, height_cm: f64) -> CalcResult<IdealWeight> {
    require(height_cm > 0.0, "Height must be a positive number.")?;
    let over_5ft = (height_cm / INCH_TO_CM - 60.0).max(0.0);
    let table: [(&str, f64, f64); 4] = match gender {
        Gender::Male => [
            ("G.J. Hamwi (1964)", 48.0, 2.7),
            ("B.J. Devine (1974)", 50.0, 2.3),
            ("J.D. Robinson (1983)", 52.0, 1.9),
            ("D.R. Miller (1983)", 56.2, 1.41),
        ],
        Gender::Female => [
            ("G.J. Hamwi (1964)", 45.5, 2.2),
            ("B.J. Devine (1974)", 45.5, 2.3),
            ("J.D. Robinson (1983)", 49.0, 1.7),
            ("D.R. Miller (1983)", 53.1, 1.36),
        ],
    };
    let formulas: Vec<LabeledValue> = table
        .iter()
        .map(|(name, base, per_inch)| LabeledValue {
            label: name.to_string(),
            value: base + per_inch * over_5ft,
        })
        .collect();
    let m = height_cm / 100.0;
    Ok(IdealWeight {
        formula_min_kg: formulas.iter().map(|f| f.value).fold(f64::INFINITY, f64::min),
        formula_max_kg: formulas.iter().map(|f| f.value).fold(f64::NEG_INFINITY, f64::max),
        formulas,
        healthy_bmi_min_kg: 18.5 * m * m,
        healthy_bmi_max_kg: 24.9 * m * m,
    })
}

/// `min - max kg` or `min - max lbs`, one decimal.
pub fn format_weight_range(min_kg: f64, max_kg: f64, units: UnitSystem) -> String {
    match units {
        UnitSystem::Metric => format!("{min_kg:.1} - {max_kg:.1} kg"),
        UnitSystem::Imperial => format!("{:.1} - {:.1} lbs", min_kg * KG_TO_LB, max_kg * KG_TO_LB),
    }
}

// ----- heart rate -----

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HeartRateZone {
    pub name: &'static str,
    pub low_percent: u32,
    pub high_percent: u32,
    pub low_bpm: u32,
    pub high_bpm: u32,
}

const ZONES: [(&str, u32, u32); 5] = [
    ("Zone 1: Very Light", 50, 60),
    ("Zone 2: Light", 60, 70),
    ("Zone 3: Moderate", 70, 80),
    ("Zone 4: Hard", 80, 90),
    ("Zone 5: Maximum", 90, 100),
];

/// Maximum heart rate (220 − age) and the five training zones.
pub fn heart_rate_zones(age: u32) -> CalcResult<(u32, Vec<HeartRateZone>)> {
    require(age > 0 && age < 220, "Please enter a valid age.")?;
    let max_hr = 220 - age;
    let bpm = |pct: u32| (max_hr as f64 * pct as f64 / 100.0).round() as u32;
    let zones = ZONES
        .iter()
        .map(|&(name, lo, hi)| HeartRateZone {
            name,
            low_percent: lo,
            high_percent: hi,
            low_bpm: bpm(lo),
            high_bpm: bpm(hi),
        })
        .collect();
    Ok((max_hr, zones))
}

// ----- calories -----

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActivityLevel {
    Sedentary,
    #[default]
    Light,
    Moderate,
    Active,
    ExtraActive,
}

impl ActivityLevel {
    pub fn factor(self) -> f64 {
        match self {
            Self::Sedentary => 1.2,
            Self::Light => 1.375,
            Self::Moderate => 1.55,
            Self::Active => 1.725,
            Self::ExtraActive => 1.9,
        }
    }
}

impl FromStr for ActivityLevel {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "sedentary" => Ok(Self::Sedentary),
            "light" => Ok(Self::Light),
            "moderate" => Ok(Self::Moderate),
            "active" | "very" | "veryactive" => Ok(Self::Active),
            "extra" | "extraactive" => Ok(Self::ExtraActive),
            _ => Err(format!("invalid activity level: {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalorieGoals {
    pub bmr: i64,
    pub maintenance: i64,
    pub mild_loss: i64,
    pub loss: i64,
    pub mild_gain: i64,
    pub gain: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Goal {
    #[default]
    Maintenance,
    MildLoss,
    Loss,
    MildGain,
    Gain,
}

impl FromStr for Goal {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "maintenance" | "maintain" => Ok(Self::Maintenance),
            "mildloss" => Ok(Self::MildLoss),
            "loss" => Ok(Self::Loss),
            "mildgain" => Ok(Self::MildGain),
            "gain" => Ok(Self::Gain),
            _ => Err(format!("invalid goal: {s}")),
        }
    }
}

impl CalorieGoals {
    pub fn target(&self, goal: Goal) -> i64 {
        match goal {
            Goal::Maintenance => self.maintenance,
            Goal::MildLoss => self.mild_loss,
            Goal::Loss => self.loss,
            Goal::MildGain => self.mild_gain,
            Goal::Gain => self.gain,
        }
    }
}

/// Mifflin–St Jeor BMR scaled by activity.
pub fn calories(
    gender: Gender,
    age: u32,
    weight_kg: f64,
    height_cm: f64,
    activity: ActivityLevel,
) -> CalcResult<CalorieGoals> {
    require(
        age > 0 && weight_kg > 0.0 && height_cm > 0.0,
        "Age, weight and height must be positive numbers.",
    )?;
    let base = 10.0 * weight_kg + 6.25 * height_cm - 5.0 * age as f64;
    let bmr = match gender {
        Gender::Male => base + 5.0,
        Gender::Female => base - 161.0,
    };
    let maintenance = (bmr * activity.factor()).round() as i64;
    Ok(CalorieGoals {
        bmr: bmr.round() as i64,
        maintenance,
        mild_loss: maintenance - 250,
        loss: maintenance - 500,
        mild_gain: maintenance + 250,
        gain: maintenance + 500,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MacroPlan {
    #[default]
    Balanced,
    LowCarb,
    HighProtein,
}

impl FromStr for MacroPlan {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "balanced" => Ok(Self::Balanced),
            "lowcarb" => Ok(Self::LowCarb),
            "highprotein" => Ok(Self::HighProtein),
            _ => Err(format!("invalid macro plan: {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Macros {
    pub protein_g: i64,
    pub carbs_g: i64,
    pub fat_g: i64,
}

pub fn macros(target_calories: i64, plan: MacroPlan) -> Macros {
    let (p, c, f) = match plan {
        MacroPlan::Balanced => (0.30, 0.40, 0.30),
        MacroPlan::LowCarb => (0.40, 0.25, 0.35),
        MacroPlan::HighProtein => (0.40, 0.30, 0.30),
    };
    let kcal = target_calories as f64;
    Macros {
        protein_g: (kcal * p / 4.0).round() as i64,
        carbs_g: (kcal * c / 4.0).round() as i64,
        fat_g: (kcal * f / 9.0).round() as i64,
    }
}

// ----- pace -----

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "solved", content = "value", rename_all = "lowercase")]
pub enum PaceResult {
    /// Seconds per distance unit.
    Pace(f64),
    /// Total seconds.
    Time(f64),
    Distance(f64),
}

impl PaceResult {
    pub fn describe(&self, units: UnitSystem) -> String {
        let label = units.distance_label();
        match *self {
            Self::Pace(secs) => {
                let total = secs.round() as u64;
                format!("Pace: {}:{:02} / {label}", total / 60, total % 60)
            }
            Self::Time(secs) => {
                let total = secs.round() as u64;
                format!(
                    "Time: {}:{:02}:{:02}",
                    total / 3600,
                    (total % 3600) / 60,
                    total % 60
                )
            }
            Self::Distance(d) => format!("Distance: {d:.2} {label}"),
        }
    }
}

/// Any two of distance, total time and pace give the third. Pace wins when
/// distance and time are both present.
pub fn pace(distance: Option<f64>, time_secs: Option<f64>, pace_secs: Option<f64>) -> CalcResult<PaceResult> {
    let positive = |v: Option<f64>| v.filter(|x| *x > 0.0);
    match (positive(distance), positive(time_secs), positive(pace_secs)) {
        (Some(d), Some(t), _) => Ok(PaceResult::Pace(t / d)),
        (Some(d), None, Some(p)) => Ok(PaceResult::Time(p * d)),
        (None, Some(t), Some(p)) => Ok(PaceResult::Distance(t / p)),
        _ => Err(CalcError::invalid(
            "Enter any two of distance, time and pace.",
        )),
    }
}

// ----- hydration -----

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WaterIntake {
    pub ounces: f64,
    pub liters: f64,
    pub glasses: f64,
}

/// Two thirds of an ounce per pound plus 12 oz per full 30 minutes of
/// exercise.
pub fn water_intake(weight_kg: f64, exercise_minutes: f64) -> CalcResult<WaterIntake> {
    require(
        weight_kg > 0.0 && exercise_minutes >= 0.0,
        "Weight must be positive and exercise non-negative.",
    )?;
    let base = weight_kg * KG_TO_LB * 2.0 / 3.0;
    let exercise = (exercise_minutes / 30.0).floor() * 12.0;
    let ounces = base + exercise;
    Ok(WaterIntake {
        ounces,
        liters: ounces * OZ_TO_L,
        glasses: ounces / 8.0,
    })
}

// ----- pregnancy -----

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PregnancyMethod {
    LastPeriod,
    Conception,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pregnancy {
    pub due_date: NaiveDate,
    pub weeks: i64,
    pub days: i64,
    pub trimester: u8,
}

/// Due date from the last period (+280 days) or conception (+266 days),
/// with gestational age counted from `date` to `today`.
pub fn pregnancy(method: PregnancyMethod, date: NaiveDate, today: NaiveDate) -> Pregnancy {
    let offset = match method {
        PregnancyMethod::LastPeriod => 280,
        PregnancyMethod::Conception => 266,
    };
    let elapsed = (today - date).num_days();
    let weeks = elapsed.div_euclid(7);
    let trimester = if weeks < 14 {
        1
    } else if weeks < 28 {
        2
    } else {
        3
    };
    Pregnancy {
        due_date: date + Duration::days(offset),
        weeks,
        days: elapsed.rem_euclid(7),
        trimester,
    }
}

// ----- alcohol -----

const GRAMS_PER_DRINK: f64 = 14.0;
const ELIMINATION_PER_HOUR: f64 = 0.015;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bac {
    pub value: f64,
    pub status: &'static str,
}

pub fn bac_status(bac: f64) -> &'static str {
    if bac < 0.02 {
        "Sober"
    } else if bac < 0.08 {
        "Impairment Likely"
    } else if bac < 0.15 {
        "Legally Intoxicated"
    } else {
        "High Risk"
    }
}

/// Widmark estimate, floored at zero.
pub fn bac(gender: Gender, weight_kg: f64, drinks: u32, hours: f64) -> CalcResult<Bac> {
    require(
        weight_kg > 0.0 && hours >= 0.0,
        "Weight must be positive and hours non-negative.",
    )?;
    let r = match gender {
        Gender::Male => 0.68,
        Gender::Female => 0.55,
    };
    let grams = drinks as f64 * GRAMS_PER_DRINK;
    let raw = grams / (weight_kg * 1000.0 * r) * 100.0 - hours * ELIMINATION_PER_HOUR;
    let value = raw.max(0.0);
    Ok(Bac {
        value,
        status: bac_status(value),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64, eps: f64) -> bool {
        (a - b).abs() < eps
    }

    #[test]
    fn test_bmi_scenario() {
        let b = bmi(70.0, 175.0).unwrap();
        assert_eq!(b.value, 22.9);
        assert_eq!(b.category, "Normal weight");
        assert!(bmi(0.0, 175.0).is_err());
    }

    #[test]
    fn test_bmi_categories() {
        assert_eq!(bmi_category(18.4), "Underweight");
        assert_eq!(bmi_category(25.0), "Overweight");
        assert_eq!(bmi_category(30.0), "Obesity");
    }

    #[test]
    fn test_imperial_conversion() {
        let cm = feet_inches_to_cm(5.0, 9.0);
        assert!(approx(cm, 175.26, 1e-9));
        assert!(approx(UnitSystem::Imperial.weight_to_kg(155.0), 70.307, 1e-3));
        assert_eq!("Imperial".parse::<UnitSystem>().unwrap(), UnitSystem::Imperial);
    }

    #[test]
    fn test_body_fat_navy() {
        let male = body_fat_navy(Gender::Male, 175.0, 85.0, 38.0, None).unwrap();
        assert_eq!(male, 23.5);
        let female = body_fat_navy(Gender::Female, 165.0, 75.0, 33.0, Some(97.0)).unwrap();
        assert!(female > 2.0);
        assert!(body_fat_navy(Gender::Female, 165.0, 75.0, 33.0, None).is_err());
    }

    #[test]
    fn test_body_fat_floor() {
        assert_eq!(body_fat_navy(Gender::Male, 200.0, 40.0, 39.0, None).unwrap(), 2.0);
    }

    #[test]
    fn test_ideal_weight() {
        // 152.4 cm is exactly five feet.
        let w = ideal_weight(Gender::Male, 152.4).unwrap();
        assert!(approx(w.formulas[0].value, 48.0, 1e-9));
        assert!(approx(w.formula_min_kg, 48.0, 1e-9));
        assert!(approx(w.formula_max_kg, 56.2, 1e-9));
        assert_eq!(
            format_weight_range(50.0, 60.0, UnitSystem::Metric),
            "50.0 - 60.0 kg"
        );
    }

    #[test]
    fn test_heart_rate_zones() {
        let (max, zones) = heart_rate_zones(30).unwrap();
        assert_eq!(max, 190);
        assert_eq!(zones.len(), 5);
        assert_eq!((zones[0].low_bpm, zones[0].high_bpm), (95, 114));
        assert_eq!(zones[4].high_bpm, 190);
    }

    #[test]
    fn test_calories_and_macros() {
        let g = calories(Gender::Male, 30, 70.0, 175.0, ActivityLevel::Light).unwrap();
        assert_eq!(g.bmr, 1649);
        assert_eq!(g.maintenance, 2267);
        assert_eq!(g.target(Goal::Loss), 1767);
        let m = macros(2000, MacroPlan::Balanced);
        assert_eq!((m.protein_g, m.carbs_g, m.fat_g), (150, 200, 67));
    }

    #[test]
    fn test_pace_solves_missing_value() {
        let p = pace(Some(5.0), Some(1500.0), None).unwrap();
        assert_eq!(p.describe(UnitSystem::Metric), "Pace: 5:00 / km");
        let t = pace(Some(10.0), None, Some(330.0)).unwrap();
        assert_eq!(t.describe(UnitSystem::Metric), "Time: 0:55:00");
        let d = pace(None, Some(3600.0), Some(480.0)).unwrap();
        assert_eq!(d.describe(UnitSystem::Imperial), "Distance: 7.50 mi");
        assert!(pace(Some(5.0), None, None).is_err());
    }

    #[test]
    fn test_lean_mass_and_water() {
        let l = lean_body_mass(70.0, 15.0).unwrap();
        assert!(approx(l.lean_mass, 59.5, 1e-9));
        assert!(lean_body_mass(70.0, 100.0).is_err());
        let w = water_intake(70.0, 30.0).unwrap();
        assert!(approx(w.ounces, 70.0 * KG_TO_LB * 2.0 / 3.0 + 12.0, 1e-9));
    }

    #[test]
    fn test_pregnancy() {
        let lmp = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let today = NaiveDate::from_ymd_opt(2024, 4, 1).unwrap();
        let p = pregnancy(PregnancyMethod::LastPeriod, lmp, today);
        assert_eq!(p.due_date, NaiveDate::from_ymd_opt(2024, 10, 7).unwrap());
        assert_eq!((p.weeks, p.days), (13, 0));
        assert_eq!(p.trimester, 1);
        let c = pregnancy(PregnancyMethod::Conception, lmp, today);
        assert_eq!(c.due_date, NaiveDate::from_ymd_opt(2024, 9, 23).unwrap());
    }

    #[test]
    fn test_bac() {
        let b = bac(Gender::Male, 75.0, 2, 2.0).unwrap();
        assert!(approx(b.value, 28.0 / 51_000.0 * 100.0 - 0.03, 1e-12));
        assert_eq!(b.status, "Impairment Likely");
        let high = bac(Gender::Female, 55.0, 6, 0.0).unwrap();
        assert_eq!(high.status, "High Risk");
        assert_eq!(bac(Gender::Male, 80.0, 0, 3.0).unwrap().value, 0.0);
    }
}
