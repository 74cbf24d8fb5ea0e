//! Short human duration strings ("10s", "10m", "2h", "4d").
//!
//! The same grammar backs both grant expiry and every place a duration is
//! shown to a human, so the two can never disagree.

use regex::Regex;
use std::sync::LazyLock;

static DURATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-9]+)\s*([smhdSMHD])$").expect("duration regex is valid")
});

/// Unit of a parsed duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Unit {
    Second,
    Minute,
    Hour,
    Day,
}

impl Unit {
    fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_lowercase() {
            's' => Some(Self::Second),
            'm' => Some(Self::Minute),
            'h' => Some(Self::Hour),
            'd' => Some(Self::Day),
            _ => None,
        }
    }

    fn millis(self) -> u64 {
        match self {
            Self::Second => 1_000,
            Self::Minute => 60_000,
            Self::Hour => 3_600_000,
            Self::Day => 86_400_000,
        }
    }

    fn word(self) -> &'static str {
        match self {
            Self::Second => "second",
            Self::Minute => "minute",
            Self::Hour => "hour",
            Self::Day => "day",
        }
    }
}

fn split(text: &str) -> Option<(u64, Unit)> {
    let caps = DURATION_RE.captures(text)?;
    let value: u64 = caps.get(1)?.as_str().parse().ok()?;
    let unit = Unit::from_char(caps.get(2)?.as_str().chars().next()?)?;
    Some((value, unit))
}

/// Parse `<integer><unit>` into milliseconds.
///
/// Zero is accepted (`"0s"` is `Some(0)`); callers that need a positive
/// duration must check for it themselves. Values that overflow `u64`
/// milliseconds are rejected.
pub fn parse_duration(text: &str) -> Option<u64> {
    let (value, unit) = split(text)?;
    value.checked_mul(unit.millis())
}

/// Render a duration string for humans: `"2h"` becomes `"2 hours"`.
///
/// Input that does not parse is returned unchanged.
pub fn pretty_duration(text: &str) -> String {
    match split(text) {
        Some((value, unit)) => {
            let plural = if value == 1 { "" } else { "s" };
            format!("{} {}{}", value, unit.word(), plural)
        }
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_each_unit() {
        assert_eq!(parse_duration("10s"), Some(10_000));
        assert_eq!(parse_duration("10m"), Some(600_000));
        assert_eq!(parse_duration("2h"), Some(7_200_000));
        assert_eq!(parse_duration("4d"), Some(345_600_000));
    }

    #[test]
    fn rejects_bad_shapes() {
        assert_eq!(parse_duration("abc"), None);
        assert_eq!(parse_duration("10x"), None);
        assert_eq!(parse_duration("10"), None);
        assert_eq!(parse_duration("h"), None);
        assert_eq!(parse_duration("-5m"), None);
        assert_eq!(parse_duration("1.5h"), None);
        assert_eq!(parse_duration(""), None);
    }

    #[test]
    fn unit_is_case_insensitive_and_may_be_spaced() {
        assert_eq!(parse_duration("10M"), Some(600_000));
        assert_eq!(parse_duration("3 d"), Some(259_200_000));
    }

    #[test]
    fn zero_parses_to_zero() {
        assert_eq!(parse_duration("0s"), Some(0));
    }

    #[test]
    fn overflow_is_rejected() {
        assert_eq!(parse_duration("99999999999999999999d"), None);
        assert_eq!(parse_duration("18446744073709551615d"), None);
    }

    #[test]
    fn pluralizes_iff_not_one() {
        assert_eq!(pretty_duration("1h"), "1 hour");
        assert_eq!(pretty_duration("2h"), "2 hours");
        assert_eq!(pretty_duration("1s"), "1 second");
        assert_eq!(pretty_duration("0m"), "0 minutes");
        assert_eq!(pretty_duration("30D"), "30 days");
    }

    #[test]
    fn pretty_passes_through_garbage() {
        assert_eq!(pretty_duration("forever"), "forever");
        assert_eq!(pretty_duration("10x"), "10x");
    }
}
