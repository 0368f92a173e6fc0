//! Duration parsing utilities.

use std::time::Duration;

use anyhow::Context;

const UNITS: [(&str, u64); 3] = [("h", 3600), ("m", 60), ("s", 1)];

/// Parse a duration string like "1h", "30m", "300s", "300" into seconds.
/// Supports:
/// - Plain numbers (interpreted as seconds): "300"
/// - Seconds suffix: "300s"
/// - Minutes suffix: "30m"
/// - Hours suffix: "1h"
pub fn parse_duration_to_secs(s: &str) -> anyhow::Result<u64> {
    let s = s.trim();
    if s.is_empty() {
        anyhow::bail!("Empty duration string");
    }

    let (num_str, multiplier) = UNITS
        .iter()
        .find_map(|(suffix, multiplier)| s.strip_suffix(*suffix).map(|n| (n, *multiplier)))
        .unwrap_or((s, 1));

    let value: u64 = num_str
        .trim()
        .parse()
        .with_context(|| format!("Invalid duration value: {s}"))?;
    value
        .checked_mul(multiplier)
        .with_context(|| format!("Duration out of range: {s}"))
}

/// Parse a duration string into a [`Duration`]; used as a clap value parser.
pub fn parse_duration(s: &str) -> anyhow::Result<Duration> {
    parse_duration_to_secs(s).map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_units() {
        assert_eq!(parse_duration_to_secs("300").unwrap(), 300);
        assert_eq!(parse_duration_to_secs("45s").unwrap(), 45);
        assert_eq!(parse_duration_to_secs("30m").unwrap(), 1800);
        assert_eq!(parse_duration_to_secs(" 2h ").unwrap(), 7200);
        assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
    }

    #[test]
    fn test_parse_rejects_invalid() {
        assert!(parse_duration_to_secs("").is_err());
        assert!(parse_duration_to_secs("-5s").is_err());
        assert!(parse_duration_to_secs("5d").is_err());
        assert!(parse_duration_to_secs("abc").is_err());
    }
}
