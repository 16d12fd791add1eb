use num_bigint::BigUint;
use num_traits::{One, Zero};

use crate::error::InvalidAmount;

/// The largest representable uint256 value, used for open-ended approvals.
pub fn max_uint256() -> BigUint {
    (BigUint::one() << 256usize) - BigUint::one()
}

/// Parse a human decimal string into a fixed-point integer scaled by
/// `10^decimals`.
///
/// Rounds toward zero: fractional digits beyond `decimals` are truncated.
/// Rejects empty, non-numeric, and negative input.
pub fn parse_units(input: &str, decimals: u32) -> Result<BigUint, InvalidAmount> {
    let input = input.trim();
    if input.is_empty() {
        return Err(InvalidAmount::Empty);
    }
    if input.starts_with('-') {
        return Err(InvalidAmount::Negative(input.to_string()));
    }

    let (int_part, frac_part) = match input.split_once('.') {
        Some((i, f)) => (i, f),
        None => (input, ""),
    };

    // A lone "." carries no digits; "1.2.3" fails the digit scan below.
    if int_part.is_empty() && frac_part.is_empty() {
        return Err(InvalidAmount::NotANumber(input.to_string()));
    }
    if !int_part.chars().all(|c| c.is_ascii_digit())
        || !frac_part.chars().all(|c| c.is_ascii_digit())
    {
        return Err(InvalidAmount::NotANumber(input.to_string()));
    }

    let mut value = if int_part.is_empty() {
        BigUint::zero()
    } else {
        int_part
            .parse::<BigUint>()
            .map_err(|_| InvalidAmount::NotANumber(input.to_string()))?
    };
    value *= BigUint::from(10u32).pow(decimals);

    // Truncate excess fractional digits (round toward zero), pad the rest.
    let frac_digits = &frac_part[..frac_part.len().min(decimals as usize)];
    if !frac_digits.is_empty() {
        let mut frac = frac_digits
            .parse::<BigUint>()
            .map_err(|_| InvalidAmount::NotANumber(input.to_string()))?;
        frac *= BigUint::from(10u32).pow(decimals - frac_digits.len() as u32);
        value += frac;
    }

    Ok(value)
}

/// Format a fixed-point integer as a decimal string, trimming trailing
/// zeros after the decimal point.
pub fn format_units(amount: &BigUint, decimals: u32) -> String {
    let s = amount.to_string();
    let decimals = decimals as usize;

    if decimals == 0 {
        return s;
    }

    if s.len() <= decimals {
        let zeros = decimals - s.len();
        let mut result = String::from("0.");
        result.extend(std::iter::repeat_n('0', zeros));
        result.push_str(&s);
        let trimmed = result.trim_end_matches('0');
        if trimmed.ends_with('.') {
            return format!("{trimmed}0");
        }
        return trimmed.to_string();
    }

    let (integer_part, decimal_part) = s.split_at(s.len() - decimals);
    let trimmed = decimal_part.trim_end_matches('0');
    if trimmed.is_empty() {
        integer_part.to_string()
    } else {
        format!("{integer_part}.{trimmed}")
    }
}

/// Format a fixed-point integer with exactly `places` decimal places,
/// truncating toward zero.
pub fn format_fixed(amount: &BigUint, decimals: u32, places: usize) -> String {
    let base = BigUint::from(10u32).pow(decimals);
    let integer = amount / &base;
    let remainder = amount % &base;

    if places == 0 {
        return integer.to_string();
    }

    let mut frac = format!("{:0>width$}", remainder.to_string(), width = decimals as usize);
    if frac.len() > places {
        frac.truncate(places);
    } else {
        frac.extend(std::iter::repeat_n('0', places - frac.len()));
    }
    format!("{integer}.{frac}")
}
