//! Token unit conversion between base units and decimal strings

use num_bigint::BigUint;
use num_traits::Zero;
use tokenlock_core::ProtocolError;

/// Render a base-unit amount as a decimal string (display only).
///
/// Trailing fractional zeros are trimmed, keeping at least one digit.
pub fn format_units(amount: &BigUint, decimals: u32) -> String {
    let digits = amount.to_str_radix(10);
    let decimals = decimals as usize;
    if decimals == 0 {
        return digits;
    }

    let padded = format!("{:0>width$}", digits, width = decimals + 1);
    let (whole, frac) = padded.split_at(padded.len() - decimals);
    let frac = frac.trim_end_matches('0');

    if frac.is_empty() {
        format!("{}.0", whole)
    } else {
        format!("{}.{}", whole, frac)
    }
}

/// Parse a decimal string into base units
pub fn parse_units(input: &str, decimals: u32) -> Result<BigUint, ProtocolError> {
    let input = input.trim();
    let invalid = |message: &str| ProtocolError::InvalidAmount {
        message: format!("{} ({:?})", message, input),
    };

    let mut parts = input.split('.');
    let whole = parts.next().unwrap_or_default();
    let frac = parts.next().unwrap_or_default();
    if parts.next().is_some() {
        return Err(invalid("more than one decimal point"));
    }
    if whole.is_empty() && frac.is_empty() {
        return Err(invalid("amount is empty"));
    }
    if !whole.chars().chain(frac.chars()).all(|c| c.is_ascii_digit()) {
        return Err(invalid("amount must be a non-negative decimal number"));
    }
    if frac.len() > decimals as usize {
        return Err(invalid(&format!("more than {} decimal places", decimals)));
    }

    let scaled = format!(
        "{}{:0<width$}",
        whole,
        frac,
        width = decimals as usize
    );
    let scaled = if scaled.is_empty() { "0" } else { scaled.as_str() };

    BigUint::parse_bytes(scaled.as_bytes(), 10).ok_or_else(|| invalid("amount is not a number"))
}

/// Parse a lock deposit amount; zero is rejected
pub fn parse_lock_amount(input: &str, decimals: u32) -> Result<BigUint, ProtocolError> {
    let amount = parse_units(input, decimals)?;
    if amount.is_zero() {
        return Err(ProtocolError::InvalidAmount {
            message: "amount must be greater than zero".to_string(),
        });
    }
    Ok(amount)
}
