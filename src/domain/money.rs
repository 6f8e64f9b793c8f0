use std::fmt;

/// Money is a fixed-point decimal with two fractional digits, stored as integer cents.
/// €90.00 = 9000 cents.
pub type Cents = i64;

/// Smallest amount that can be moved: 0.01.
pub const MIN_AMOUNT: Cents = 1;

/// Format cents as a decimal string.
/// Example: 9000 -> "90.00", -1 -> "-0.01"
pub fn format_cents(cents: Cents) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs_cents = cents.unsigned_abs();
    format!("{}{}.{:02}", sign, abs_cents / 100, abs_cents % 100)
}

/// Parse a decimal string into cents.
/// Example: "90.00" -> 9000, "10.5" -> 1050, ".50" -> 50
///
/// Sub-cent precision is rejected rather than truncated.
pub fn parse_cents(input: &str) -> Result<Cents, ParseCentsError> {
    let input = input.trim();
    let (negative, digits) = match input.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, input.strip_prefix('+').unwrap_or(input)),
    };

    let (units_str, fraction_str) = match digits.split_once('.') {
        Some((units, fraction)) => (units, fraction),
        None => (digits, ""),
    };

    if units_str.is_empty() && fraction_str.is_empty() {
        return Err(ParseCentsError::InvalidFormat);
    }
    if !units_str.chars().all(|c| c.is_ascii_digit())
        || !fraction_str.chars().all(|c| c.is_ascii_digit())
    {
        return Err(ParseCentsError::InvalidFormat);
    }
    if fraction_str.len() > 2 {
        return Err(ParseCentsError::TooPrecise);
    }

    let units: i64 = if units_str.is_empty() {
        0
    } else {
        units_str.parse().map_err(|_| ParseCentsError::Overflow)?
    };
    let fraction: i64 = match fraction_str.len() {
        0 => 0,
        // "5" after the point means 50 cents
        1 => fraction_str.parse::<i64>().map_err(|_| ParseCentsError::InvalidFormat)? * 10,
        _ => fraction_str.parse().map_err(|_| ParseCentsError::InvalidFormat)?,
    };

    let cents = units
        .checked_mul(100)
        .and_then(|c| c.checked_add(fraction))
        .ok_or(ParseCentsError::Overflow)?;
    Ok(if negative { -cents } else { cents })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseCentsError {
    InvalidFormat,
    TooPrecise,
    Overflow,
}

impl fmt::Display for ParseCentsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseCentsError::InvalidFormat => write!(f, "invalid money format"),
            ParseCentsError::TooPrecise => write!(f, "amounts have at most two decimal places"),
            ParseCentsError::Overflow => write!(f, "amount is too large"),
        }
    }
}

impl std::error::Error for ParseCentsError {}
