//! `--age FROM[:TO]` parsing.
//!
//! Both parts are durations made of `<n><unit>` groups (`w`, `d`, `h`, `m`),
//! for example `1d`, `2h30m` or `1w3d`. `TO` defaults to now.

use crate::error::GalasaError;

const MINUTES_PER_HOUR: u64 = 60;
const MINUTES_PER_DAY: u64 = 24 * MINUTES_PER_HOUR;
const MINUTES_PER_WEEK: u64 = 7 * MINUTES_PER_DAY;

/// Returns `(from_minutes, to_minutes)` relative to now.
pub fn parse_age(age: &str) -> Result<(u64, u64), GalasaError> {
    let invalid = |reason: &str| GalasaError::InvalidAge {
        age: age.to_string(),
        reason: reason.to_string(),
    };

    let (from_part, to_part) = match age.split_once(':') {
        Some((from, to)) => (from, Some(to)),
        None => (age, None),
    };

    let from = parse_duration_minutes(from_part).map_err(|r| invalid(&r))?;
    let to = match to_part {
        Some(part) => parse_duration_minutes(part).map_err(|r| invalid(&r))?,
        None => 0,
    };

    if from == 0 {
        return Err(invalid("The FROM part must be greater than zero."));
    }
    if from <= to {
        return Err(invalid(
            "The FROM part must be further in the past than the TO part.",
        ));
    }
    Ok((from, to))
}

fn parse_duration_minutes(text: &str) -> Result<u64, String> {
    let text = text.trim();
    if text.is_empty() {
        return Err("Expected a duration such as 1d, 6h or 2h30m.".to_string());
    }

    let mut total: u64 = 0;
    let mut digits = String::new();
    for ch in text.chars() {
        if ch.is_ascii_digit() {
            digits.push(ch);
            continue;
        }
        let unit = match ch.to_ascii_lowercase() {
            'w' => MINUTES_PER_WEEK,
            'd' => MINUTES_PER_DAY,
            'h' => MINUTES_PER_HOUR,
            'm' => 1,
            other => return Err(format!("Unknown time unit '{}'. Use w, d, h or m.", other)),
        };
        if digits.is_empty() {
            return Err(format!("Time unit '{}' has no number before it.", ch));
        }
        let n: u64 = digits
            .parse()
            .map_err(|_| format!("'{}' is too large.", digits))?;
        total = n
            .checked_mul(unit)
            .and_then(|m| total.checked_add(m))
            .ok_or_else(|| "The duration is too large.".to_string())?;
        digits.clear();
    }
    if !digits.is_empty() {
        return Err(format!("'{}' is missing a time unit (w, d, h or m).", digits));
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_only_defaults_to_now() {
        assert_eq!(parse_age("1d").unwrap(), (MINUTES_PER_DAY, 0));
        assert_eq!(parse_age("45m").unwrap(), (45, 0));
    }

    #[test]
    fn combined_units_add_up() {
        assert_eq!(parse_age("2h30m").unwrap(), (150, 0));
        assert_eq!(
            parse_age("1w1d:12h").unwrap(),
            (MINUTES_PER_WEEK + MINUTES_PER_DAY, 12 * MINUTES_PER_HOUR)
        );
    }

    #[test]
    fn from_must_be_older_than_to() {
        let err = parse_age("1h:2h").unwrap_err();
        assert!(matches!(err, GalasaError::InvalidAge { .. }));
        assert!(parse_age("1h:1h").is_err());
    }

    #[test]
    fn malformed_values_are_rejected() {
        for bad in ["", "0m", "10", "d", "5y", "1d:", ":1d"] {
            assert!(parse_age(bad).is_err(), "{:?} should be rejected", bad);
        }
    }
}
