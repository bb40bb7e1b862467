// Locale-tolerant number parsing for electoral cells.

use std::fmt::Display;

use serde::Serialize;

#[derive(Eq, PartialEq, Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum NumericError {
    Malformed,
    Negative,
    NotIntegral,
    /// A lone comma followed by three digits, which may group thousands.
    Ambiguous,
}

impl Display for NumericError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            NumericError::Malformed => "not a number",
            NumericError::Negative => "negative count",
            NumericError::NotIntegral => "not a whole number",
            NumericError::Ambiguous => "comma may be a decimal or a thousands separator",
        };
        write!(f, "{}", s)
    }
}

fn clean(cell: &str) -> String {
    cell.chars()
        .filter(|c| !c.is_whitespace() && *c != '%' && *c != '\u{a0}')
        .collect()
}

// Rewrites the cell with '.' as the only decimal separator.
fn to_decimal(s: &str) -> Result<String, NumericError> {
    let commas = s.matches(',').count();
    let dots = s.matches('.').count();
    match (commas, dots) {
        (0, 0) | (0, 1) => Ok(s.to_string()),
        (1, 0) => Ok(s.replace(',', ".")),
        (c, d) if c > 0 && d > 0 => {
            // Both present: the rightmost one is the decimal separator.
            let last_comma = s.rfind(',').unwrap_or(0);
            let last_dot = s.rfind('.').unwrap_or(0);
            let (group, decimal) = if last_comma > last_dot {
                (".", ',')
            } else {
                (",", '.')
            };
            let decimals = s.matches(decimal).count();
            if decimals != 1 {
                return Err(NumericError::Malformed);
            }
            Ok(s.replace(group, "").replace(',', "."))
        }
        _ => Err(NumericError::Malformed),
    }
}

fn is_grouped(s: &str) -> bool {
    let digits = s.trim_start_matches('-');
    let parts: Vec<&str> = digits.split(|c| c == '.' || c == ',').collect();
    if parts.len() < 2 {
        return false;
    }
    let sep_consistent = !(digits.contains('.') && digits.contains(','));
    sep_consistent
        && !parts[0].is_empty()
        && parts[0].len() <= 3
        && parts.iter().all(|p| p.chars().all(|c| c.is_ascii_digit()))
        && parts[1..].iter().all(|p| p.len() == 3)
}

/// Parses a percentage cell. Empty cells are `Ok(None)`.
///
/// '.' and ',' are both accepted as decimal separator. With both present, the
/// rightmost is the decimal separator and the other one groups thousands.
/// A lone comma is a decimal separator unless it could also be grouping
/// thousands ("1,234"), in which case the cell is refused.
pub fn parse_percentage(cell: &str) -> Result<Option<f64>, NumericError> {
    let s = clean(cell);
    if s.is_empty() {
        return Ok(None);
    }
    if !s.contains('.') && s.matches(',').count() == 1 && is_grouped(&s) {
        return Err(NumericError::Ambiguous);
    }
    let normalized = to_decimal(&s)?;
    let value: f64 = normalized.parse().map_err(|_| NumericError::Malformed)?;
    if !value.is_finite() {
        return Err(NumericError::Malformed);
    }
    Ok(Some(value))
}

/// Parses a vote count. Empty cells are `Ok(None)`.
///
/// A value such as "12.345" or "1,234,567" is read as a grouped integer;
/// anything else must be a decimal number with no fractional part.
pub fn parse_count(cell: &str) -> Result<Option<u64>, NumericError> {
    let s = clean(cell);
    if s.is_empty() {
        return Ok(None);
    }
    if is_grouped(&s) {
        if s.starts_with('-') {
            return Err(NumericError::Negative);
        }
        let digits: String = s.chars().filter(|c| c.is_ascii_digit()).collect();
        return digits
            .parse::<u64>()
            .map(Some)
            .map_err(|_| NumericError::Malformed);
    }
    let value: f64 = to_decimal(&s)?
        .parse()
        .map_err(|_| NumericError::Malformed)?;
    if !value.is_finite() {
        return Err(NumericError::Malformed);
    }
    if value < 0.0 {
        return Err(NumericError::Negative);
    }
    if value.fract() != 0.0 || value > u64::MAX as f64 {
        return Err(NumericError::NotIntegral);
    }
    Ok(Some(value as u64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentages() {
        assert_eq!(parse_percentage("55.5"), Ok(Some(55.5)));
        assert_eq!(parse_percentage("55,5"), Ok(Some(55.5)));
        assert_eq!(parse_percentage(" 48,0 % "), Ok(Some(48.0)));
        assert_eq!(parse_percentage("1.234,5"), Ok(Some(1234.5)));
        assert_eq!(parse_percentage("1,234.5"), Ok(Some(1234.5)));
        assert_eq!(parse_percentage("100"), Ok(Some(100.0)));
        assert_eq!(parse_percentage("-3"), Ok(Some(-3.0)));
        assert_eq!(parse_percentage(""), Ok(None));
        assert_eq!(parse_percentage("  "), Ok(None));
        assert_eq!(parse_percentage("abc"), Err(NumericError::Malformed));
        assert_eq!(parse_percentage("1,2,3"), Err(NumericError::Malformed));
        assert_eq!(parse_percentage("1.2.3"), Err(NumericError::Malformed));
        assert_eq!(parse_percentage("inf"), Err(NumericError::Malformed));
        assert_eq!(parse_percentage("NaN"), Err(NumericError::Malformed));
    }

    #[test]
    fn lone_comma_with_three_decimals_is_refused() {
        assert_eq!(parse_percentage("1,234"), Err(NumericError::Ambiguous));
        assert_eq!(parse_percentage("55,500"), Err(NumericError::Ambiguous));
        assert_eq!(parse_percentage("55,50"), Ok(Some(55.5)));
        assert_eq!(parse_percentage("0,5"), Ok(Some(0.5)));
        assert_eq!(parse_percentage("1.234"), Ok(Some(1.234)));
    }

    #[test]
    fn percentage_round_trip() {
        for j in 0..=200 {
            let v = j as f64 / 2.0;
            assert_eq!(parse_percentage(&v.to_string()), Ok(Some(v)));
            assert_eq!(
                parse_percentage(&v.to_string().replace('.', ",")),
                Ok(Some(v))
            );
        }
    }

    #[test]
    fn counts() {
        assert_eq!(parse_count("1234"), Ok(Some(1234)));
        assert_eq!(parse_count("12.345"), Ok(Some(12345)));
        assert_eq!(parse_count("1,234,567"), Ok(Some(1234567)));
        assert_eq!(parse_count("1 234"), Ok(Some(1234)));
        assert_eq!(parse_count("12.0"), Ok(Some(12)));
        assert_eq!(parse_count(""), Ok(None));
        assert_eq!(parse_count("12.5"), Err(NumericError::NotIntegral));
        assert_eq!(parse_count("-4"), Err(NumericError::Negative));
        assert_eq!(parse_count("-1.000"), Err(NumericError::Negative));
        assert_eq!(parse_count("x"), Err(NumericError::Malformed));
    }
}
