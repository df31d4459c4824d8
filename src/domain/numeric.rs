//! Conversions between exact decimals and binary floats.
//!
//! Money is stored and compared as [`Decimal`] only. Floats appear solely in
//! the intermediate, explicitly rounded ceiling step of amortization, and
//! every crossing goes through the textual form of the number rather than
//! `mantissa * 10^scale` arithmetic, which truncates large coefficients.

use crate::error::{LoanError, Result};
use rust_decimal::Decimal;
use std::str::FromStr;

/// Significant digits an `f64` is guaranteed to carry through a round trip.
pub const SAFE_SIGNIFICANT_DIGITS: u32 = 15;

/// Converts a decimal to the nearest `f64`, parsing its digit string.
///
/// An absent value is reported as an error, never read as zero.
pub fn to_binary_float(value: Option<Decimal>) -> Result<f64> {
    let value = value.ok_or_else(|| LoanError::Conversion("decimal value is absent".to_string()))?;
    f64::from_str(&value.to_string())
        .map_err(|e| LoanError::Conversion(format!("cannot convert {value} to float: {e}")))
}

/// Converts a float to a decimal from its shortest round-trip text, without
/// forcing any rounding.
pub fn from_binary_float(value: f64) -> Result<Decimal> {
    if !value.is_finite() {
        return Err(LoanError::Conversion(format!(
            "cannot represent {value} as a decimal"
        )));
    }
    let text = value.to_string();
    Decimal::from_str_exact(&text)
        .map_err(|e| LoanError::Conversion(format!("cannot convert {text} to decimal: {e}")))
}

/// Smallest whole-unit value that is not below `value`.
pub fn ceil_to_unit(value: f64) -> f64 {
    value.ceil()
}

/// Whether `value` survives a trip through `f64` unchanged.
pub fn is_within_safe_precision(value: Decimal) -> bool {
    significant_digits(value) <= SAFE_SIGNIFICANT_DIGITS
}

fn significant_digits(value: Decimal) -> u32 {
    let mut mantissa = value.normalize().mantissa().unsigned_abs();
    let mut digits = 0;
    while mantissa > 0 {
        mantissa /= 10;
        digits += 1;
    }
    digits
}
