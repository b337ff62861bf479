//! Unit and number-base conversion.

use std::fmt;

use serde::Serialize;

use crate::error::{CalcError, CalcResult};

/// Significant digits shown for unit conversions.
pub const UNIT_PRECISION: usize = 6;

// ----- units -----

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitCategory {
    Length,
    Mass,
    Temperature,
    Time,
    DataStorage,
}

impl UnitCategory {
    pub const ALL: [UnitCategory; 5] = [
        Self::Length,
        Self::Mass,
        Self::Temperature,
        Self::Time,
        Self::DataStorage,
    ];

    /// Unit names with their size in the category's base unit. Temperature
    /// is not linear and carries no factors.
    pub fn factors(self) -> &'static [(&'static str, f64)] {
        match self {
            Self::Length => &[
                ("Meter", 1.0),
                ("Kilometer", 1000.0),
                ("Centimeter", 0.01),
                ("Millimeter", 0.001),
                ("Mile", 1609.34),
                ("Yard", 0.9144),
                ("Foot", 0.3048),
                ("Inch", 0.0254),
            ],
            Self::Mass => &[
                ("Kilogram", 1.0),
                ("Gram", 0.001),
                ("Milligram", 1e-6),
                ("Pound", 0.453592),
                ("Ounce", 0.0283495),
                ("Tonne", 1000.0),
            ],
            Self::Temperature => &[],
            Self::Time => &[
                ("Second", 1.0),
                ("Minute", 60.0),
                ("Hour", 3600.0),
                ("Day", 86400.0),
                ("Week", 604800.0),
                ("Month", 2.628e6),
                ("Year", 3.154e7),
            ],
            Self::DataStorage => &[
                ("Byte", 1.0),
                ("Kilobyte", 1024.0),
                ("Megabyte", 1_048_576.0),
                ("Gigabyte", 1_073_741_824.0),
                ("Terabyte", 1_099_511_627_776.0),
            ],
        }
    }

    pub fn units(self) -> Vec<&'static str> {
        match self {
            Self::Temperature => vec!["Celsius", "Fahrenheit", "Kelvin"],
            _ => self.factors().iter().map(|(name, _)| *name).collect(),
        }
    }

    fn find_unit(self, name: &str) -> CalcResult<&'static str> {
        self.units()
            .into_iter()
            .find(|u| u.eq_ignore_ascii_case(name))
            .ok_or_else(|| CalcError::invalid(format!("Unknown {self} unit: {name}")))
    }
}

impl fmt::Display for UnitCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Length => write!(f, "Length"),
            Self::Mass => write!(f, "Mass"),
            Self::Temperature => write!(f, "Temperature"),
            Self::Time => write!(f, "Time"),
            Self::DataStorage => write!(f, "Data Storage"),
        }
    }
}

impl std::str::FromStr for UnitCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(['-', '_', ' '], "").as_str() {
            "length" => Ok(Self::Length),
            "mass" => Ok(Self::Mass),
            "temperature" | "temp" => Ok(Self::Temperature),
            "time" => Ok(Self::Time),
            "datastorage" | "data" => Ok(Self::DataStorage),
            _ => Err(format!("invalid unit category: {s}")),
        }
    }
}

fn to_celsius(value: f64, unit: &str) -> f64 {
    match unit {
        "Fahrenheit" => (value - 32.0) * 5.0 / 9.0,
        "Kelvin" => value - 273.15,
        _ => value,
    }
}

fn from_celsius(celsius: f64, unit: &str) -> f64 {
    match unit {
        "Fahrenheit" => celsius * 9.0 / 5.0 + 32.0,
        "Kelvin" => celsius + 273.15,
        _ => celsius,
    }
}

pub fn convert_units(category: UnitCategory, value: f64, from: &str, to: &str) -> CalcResult<f64> {
    let from = category.find_unit(from)?;
    let to = category.find_unit(to)?;
    if category == UnitCategory::Temperature {
        if from == to {
            return Ok(value);
        }
        return Ok(from_celsius(to_celsius(value, from), to));
    }
    let factor = |unit: &str| {
        category
            .factors()
            .iter()
            .find(|(name, _)| *name == unit)
            .map(|(_, f)| *f)
            .unwrap_or(1.0)
    };
    Ok(value * factor(from) / factor(to))
}

/// Fixed `precision` significant digits, switching to exponent notation for
/// very small or large magnitudes (`1.00000e+21`).
pub fn to_precision(value: f64, precision: usize) -> String {
    if !value.is_finite() {
        return value.to_string();
    }
    let precision = precision.clamp(1, 100);
    if value == 0.0 {
        return if precision > 1 {
            format!("0.{}", "0".repeat(precision - 1))
        } else {
            "0".into()
        };
    }
    let sci = format!("{:.*e}", precision - 1, value);
    let (mantissa, exp) = sci.split_once('e').unwrap_or((&sci, "0"));
    let exponent: i32 = exp.parse().unwrap_or(0);
    if exponent < -6 || exponent >= precision as i32 {
        let sign = if exponent < 0 { '-' } else { '+' };
        return format!("{mantissa}e{sign}{}", exponent.abs());
    }
    let decimals = (precision as i32 - 1 - exponent).max(0) as usize;
    format!("{value:.decimals$}")
}

// ----- number bases -----

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberBase {
    Bin,
    Oct,
    Dec,
    Hex,
}

impl NumberBase {
    pub fn radix(self) -> u32 {
        match self {
            Self::Bin => 2,
            Self::Oct => 8,
            Self::Dec => 10,
            Self::Hex => 16,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Bin => "Binary",
            Self::Oct => "Octal",
            Self::Dec => "Decimal",
            Self::Hex => "Hexadecimal",
        }
    }
}

impl std::str::FromStr for NumberBase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "bin" | "binary" | "2" => Ok(Self::Bin),
            "oct" | "octal" | "8" => Ok(Self::Oct),
            "dec" | "decimal" | "10" => Ok(Self::Dec),
            "hex" | "hexadecimal" | "16" => Ok(Self::Hex),
            _ => Err(format!("invalid base: {s}")),
        }
    }
}

/// The same value rendered in every base. All fields are empty for empty
/// input.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct BaseValues {
    pub bin: String,
    pub oct: String,
    pub dec: String,
    pub hex: String,
}

impl BaseValues {
    pub fn get(&self, base: NumberBase) -> &str {
        match base {
            NumberBase::Bin => &self.bin,
            NumberBase::Oct => &self.oct,
            NumberBase::Dec => &self.dec,
            NumberBase::Hex => &self.hex,
        }
    }
}

/// Parse unsigned digits in `base`, keeping the low 64 bits and reading
/// them as a two's-complement signed value.
pub fn parse_in_base(input: &str, base: NumberBase) -> CalcResult<i64> {
    let radix = base.radix();
    let mut acc: u64 = 0;
    for c in input.chars() {
        let digit = c.to_digit(radix).ok_or_else(|| {
            CalcError::invalid(format!("Invalid character for {} number.", base.name()))
        })?;
        acc = acc.wrapping_mul(radix as u64).wrapping_add(digit as u64);
    }
    Ok(acc as i64)
}

/// Signed rendering: negative values get a leading `-` on the magnitude.
pub fn format_in_base(value: i64, base: NumberBase) -> String {
    let magnitude = value.unsigned_abs();
    let digits = match base {
        NumberBase::Bin => format!("{magnitude:b}"),
        NumberBase::Oct => format!("{magnitude:o}"),
        NumberBase::Dec => magnitude.to_string(),
        NumberBase::Hex => format!("{magnitude:x}"),
    };
    if value < 0 {
        format!("-{digits}")
    } else {
        digits
    }
}

pub fn convert_base(input: &str, base: NumberBase) -> CalcResult<BaseValues> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(BaseValues::default());
    }
    let value = parse_in_base(input, base)?;
    Ok(BaseValues {
        bin: format_in_base(value, NumberBase::Bin),
        oct: format_in_base(value, NumberBase::Oct),
        dec: format_in_base(value, NumberBase::Dec),
        hex: format_in_base(value, NumberBase::Hex),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length() {
        let ft = convert_units(UnitCategory::Length, 1.0, "Meter", "Foot").unwrap();
        assert_eq!(to_precision(ft, UNIT_PRECISION), "3.28084");
        let km = convert_units(UnitCategory::Length, 1.0, "mile", "kilometer").unwrap();
        assert_eq!(to_precision(km, UNIT_PRECISION), "1.60934");
    }

    #[test]
    fn test_data_storage() {
        let mb = convert_units(UnitCategory::DataStorage, 1.0, "Gigabyte", "Megabyte").unwrap();
        assert_eq!(mb, 1024.0);
    }

    #[test]
    fn test_temperature() {
        let f = convert_units(UnitCategory::Temperature, 100.0, "Celsius", "Fahrenheit").unwrap();
        assert_eq!(to_precision(f, 6), "212.000");
        let k = convert_units(UnitCategory::Temperature, 32.0, "Fahrenheit", "Kelvin").unwrap();
        assert_eq!(to_precision(k, 6), "273.150");
        let same = convert_units(UnitCategory::Temperature, 5.0, "Kelvin", "Kelvin").unwrap();
        assert_eq!(same, 5.0);
    }

    #[test]
    fn test_unknown_unit() {
        assert!(convert_units(UnitCategory::Mass, 1.0, "Stone", "Gram").is_err());
    }

    #[test]
    fn test_to_precision() {
        assert_eq!(to_precision(1.0, 6), "1.00000");
        assert_eq!(to_precision(123456789.0, 6), "1.23457e+8");
        assert_eq!(to_precision(0.00001234, 6), "0.0000123400");
        assert_eq!(to_precision(1.5e-7, 3), "1.50e-7");
        assert_eq!(to_precision(999999.7, 6), "1.00000e+6");
        assert_eq!(to_precision(0.0, 3), "0.00");
    }

    #[test]
    fn test_category_parse() {
        assert_eq!("data storage".parse::<UnitCategory>().unwrap(), UnitCategory::DataStorage);
        assert_eq!(UnitCategory::DataStorage.to_string(), "Data Storage");
    }

    #[test]
    fn test_base_conversion() {
        let v = convert_base("1010", NumberBase::Bin).unwrap();
        assert_eq!(v.dec, "10");
        assert_eq!(v.oct, "12");
        assert_eq!(v.hex, "a");
        let v = convert_base("FF", NumberBase::Hex).unwrap();
        assert_eq!(v.bin, "11111111");
    }

    #[test]
    fn test_base_rejects_bad_digit() {
        assert_eq!(
            convert_base("102", NumberBase::Bin).unwrap_err().to_string(),
            "Invalid character for Binary number."
        );
        assert!(convert_base("-5", NumberBase::Dec).is_err());
        assert!(convert_base("g", NumberBase::Hex).is_err());
    }

    #[test]
    fn test_base_wraps_to_signed_64() {
        let v = convert_base("ffffffffffffffff", NumberBase::Hex).unwrap();
        assert_eq!(v.dec, "-1");
        assert_eq!(v.hex, "-1");
        let v = convert_base("18446744073709551616", NumberBase::Dec).unwrap();
        assert_eq!(v.dec, "0");
        let v = convert_base("8000000000000000", NumberBase::Hex).unwrap();
        assert_eq!(v.dec, "-9223372036854775808");
        assert_eq!(v.hex, "-8000000000000000");
    }

    #[test]
    fn test_base_round_trip() {
        for n in [0i64, 1, 42, 255, 65535, i64::MAX, -7, i64::MIN] {
            for base in [NumberBase::Bin, NumberBase::Oct, NumberBase::Dec, NumberBase::Hex] {
                let text = format_in_base(n, base);
                let parsed = match text.strip_prefix('-') {
                    Some(digits) => parse_in_base(digits, base).unwrap().wrapping_neg(),
                    None => parse_in_base(&text, base).unwrap(),
                };
                assert_eq!(parsed, n, "{n} in base {}", base.radix());
            }
        }
    }

    #[test]
    fn test_empty_clears() {
        assert_eq!(convert_base("", NumberBase::Dec).unwrap(), BaseValues::default());
    }
}
