//! Port specification parsing.
//!
//! Turns user input such as `"80, 443; 8000-8010"` into a sorted,
//! duplicate-free list of ports. Malformed tokens are dropped one by one,
//! never failing the whole input.

use std::collections::BTreeSet;
use std::ops::RangeInclusive;

use thiserror::Error;
use tracing::trace;

/// Smallest valid port number.
pub const MIN_PORT: u16 = 1;

/// Largest valid port number.
pub const MAX_PORT: u16 = u16::MAX;

/// Reasons a single token is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PortSpecError {
    /// The token (or one end of a range) is empty.
    #[error("empty port token")]
    Empty,

    /// The token is not an integer.
    #[error("'{0}' is not a number")]
    NotANumber(String),

    /// The number falls outside 1-65535.
    #[error("{0} is outside the valid port range 1-65535")]
    OutOfRange(i64),

    /// A range with its start above its end.
    #[error("range {start}-{end} is reversed")]
    Reversed { start: u16, end: u16 },
}

/// Check whether a number is a usable port.
pub fn validate_port(value: i64) -> Result<u16, PortSpecError> {
    if value < MIN_PORT as i64 || value > MAX_PORT as i64 {
        return Err(PortSpecError::OutOfRange(value));
    }
    Ok(value as u16)
}

fn parse_number(text: &str) -> Result<u16, PortSpecError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(PortSpecError::Empty);
    }
    let value: i64 = text
        .parse()
        .map_err(|_| PortSpecError::NotANumber(text.to_string()))?;
    validate_port(value)
}

/// Parse one token: either a single port or an inclusive `start-end` range.
pub fn parse_range(token: &str) -> Result<RangeInclusive<u16>, PortSpecError> {
    let token = token.trim();
    if token.is_empty() {
        return Err(PortSpecError::Empty);
    }

    if !token.contains('-') {
        let port = parse_number(token)?;
        return Ok(port..=port);
    }

    let mut ends = token.split('-');
    let (Some(start), Some(end), None) = (ends.next(), ends.next(), ends.next()) else {
        return Err(PortSpecError::NotANumber(token.to_string()));
    };

    let start = parse_number(start)?;
    let end = parse_number(end)?;
    if start > end {
        return Err(PortSpecError::Reversed { start, end });
    }
    Ok(start..=end)
}

/// Parse a full port specification.
///
/// Tokens are separated by commas, semicolons or whitespace. The result is
/// ascending and contains each port once.
pub fn parse(input: &str) -> Vec<u16> {
    let mut ports = BTreeSet::new();

    for token in input
        .split(|c: char| c == ',' || c == ';' || c.is_whitespace())
        .filter(|t| !t.is_empty())
    {
        match parse_range(token) {
            Ok(range) => ports.extend(range),
            Err(e) => trace!(token = token, error = %e, "Skipping port token"),
        }
    }

    ports.into_iter().collect()
}

/// True when the input yields at least one port.
pub fn is_valid_input(input: &str) -> bool {
    !parse(input).is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_deduplicates() {
        assert_eq!(parse("80,80,443"), vec![80, 443]);
        assert_eq!(parse("443 80 80-81; 81"), vec![80, 81, 443]);
    }

    #[test]
    fn test_parse_range() {
        assert_eq!(parse("8000-8002"), vec![8000, 8001, 8002]);
        assert_eq!(parse("9000-8999"), Vec::<u16>::new());
        assert_eq!(parse("65534-65535"), vec![65534, 65535]);
    }

    #[test]
    fn test_parse_drops_out_of_range() {
        assert_eq!(parse("0,70000,443"), vec![443]);
        assert_eq!(parse("0-10"), Vec::<u16>::new());
        assert_eq!(parse("65535-65536"), Vec::<u16>::new());
    }

    #[test]
    fn test_parse_skips_malformed_tokens() {
        assert_eq!(parse("abc, 22, 1-2-3, 80-, -5, x-9"), vec![22]);
        assert!(parse("").is_empty());
        assert!(parse("  \t ").is_empty());
    }

    #[test]
    fn test_parse_output_is_strictly_ascending() {
        let ports = parse("9000 1 500-502 3 1 501");
        assert!(ports.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_parse_range_errors() {
        assert_eq!(
            parse_range("10-5"),
            Err(PortSpecError::Reversed { start: 10, end: 5 })
        );
        assert_eq!(parse_range("70000"), Err(PortSpecError::OutOfRange(70000)));
        assert_eq!(parse_range("80-"), Err(PortSpecError::Empty));
        assert!(matches!(parse_range("http"), Err(PortSpecError::NotANumber(_))));
    }

    #[test]
    fn test_is_valid_input() {
        assert!(!is_valid_input(""));
        assert!(!is_valid_input("abc"));
        assert!(is_valid_input("443"));
        assert!(is_valid_input("abc 443"));
    }
}
