//! Fundamental market-risk heuristics.
//!
//! Pure scoring of a token snapshot into four bucketed risk contributions
//! (liquidity, volatility, age, volume), each 0-5, summed into a 0-20 raw
//! total. Thresholds are hand-tuned for the Ethereum memecoin segment:
//! thin liquidity, violent 24h swings, very young pairs, and thin volume
//! all push the total up. Deterministic, no side effects.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::feeds::{parse_display_value, TokenSnapshot};

static AGE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+)(mo|[smhdy])").expect("Invalid age pattern regex"));

/// Bucketed risk contributions for one snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RiskFactors {
    pub liquidity_risk: u8,
    pub volatility_risk: u8,
    pub age_risk: u8,
    pub volume_risk: u8,
    pub total_raw_risk: u8,
}

impl RiskFactors {
    /// Rescale the 0-20 raw total onto the 1-10 scale used for blending
    pub fn fundamental_risk(&self) -> f64 {
        ((self.total_raw_risk as f64 / 20.0) * 10.0).clamp(1.0, 10.0)
    }
}

/// Parse a magnitude string ("$3,000", "1.2m", "420K") into a number.
/// `k`/`m`/`b` suffixes multiply by 1e3/1e6/1e9; unparseable input is zero.
pub fn parse_numeric_value(text: &str) -> f64 {
    if text.is_empty() || text == "N/A" || text == "-" {
        return 0.0;
    }

    let cleaned: String = text
        .to_lowercase()
        .chars()
        .filter(|c| !matches!(c, ',' | '$') && !c.is_whitespace())
        .collect();

    let multiplier = if cleaned.contains('k') {
        1_000.0
    } else if cleaned.contains('m') {
        1_000_000.0
    } else if cleaned.contains('b') {
        1_000_000_000.0
    } else {
        1.0
    };

    let digits: String = cleaned
        .chars()
        .filter(|c| !matches!(c, 'k' | 'm' | 'b'))
        .collect();

    digits.parse::<f64>().map(|n| n * multiplier).unwrap_or(0.0)
}

/// Parse an age string of the form `<integer><unit>` (unit in s/m/h/d/mo/y)
/// into seconds. Unparseable input is treated as infinitely old, which
/// lands in the lowest age-risk bucket.
pub fn parse_age_seconds(text: &str) -> f64 {
    if text.is_empty() || text == "N/A" {
        return f64::MAX;
    }

    let captures = match AGE_PATTERN.captures(text) {
        Some(captures) => captures,
        None => return f64::MAX,
    };

    let value: f64 = match captures[1].parse() {
        Ok(value) => value,
        Err(_) => return f64::MAX,
    };

    match &captures[2] {
        "s" => value,
        "m" => value * 60.0,
        "h" => value * 3_600.0,
        "d" => value * 86_400.0,
        "mo" => value * 2_592_000.0,
        "y" => value * 31_536_000.0,
        _ => f64::MAX,
    }
}

/// Score a snapshot through the four threshold ladders
pub fn score_snapshot(snapshot: &TokenSnapshot) -> RiskFactors {
    let liquidity = parse_numeric_value(snapshot.liquidity.as_deref().unwrap_or("0"));
    let volume = parse_numeric_value(snapshot.volume.as_deref().unwrap_or("0"));
    let age_seconds = parse_age_seconds(snapshot.age.as_deref().unwrap_or("1d"));
    let change_24h = parse_display_value(snapshot.change_24h.as_deref().unwrap_or("0")).abs();

    let liquidity_risk: u8 = if liquidity < 5_000.0 {
        5
    } else if liquidity < 20_000.0 {
        4
    } else if liquidity < 50_000.0 {
        3
    } else if liquidity < 100_000.0 {
        2
    } else if liquidity < 500_000.0 {
        1
    } else {
        0
    };

    let volatility_risk: u8 = if change_24h > 500.0 {
        5
    } else if change_24h > 200.0 {
        4
    } else if change_24h > 100.0 {
        3
    } else if change_24h > 50.0 {
        2
    } else if change_24h > 20.0 {
        1
    } else {
        0
    };

    let age_hours = age_seconds / 3_600.0;
    let age_risk: u8 = if age_hours < 1.0 {
        5
    } else if age_hours < 6.0 {
        4
    } else if age_hours < 24.0 {
        3
    } else if age_hours < 168.0 {
        2
    } else if age_hours < 720.0 {
        1
    } else {
        0
    };

    let volume_risk: u8 = if volume < 1_000.0 {
        5
    } else if volume < 10_000.0 {
        4
    } else if volume < 50_000.0 {
        3
    } else if volume < 100_000.0 {
        2
    } else if volume < 500_000.0 {
        1
    } else {
        0
    };

    RiskFactors {
        liquidity_risk,
        volatility_risk,
        age_risk,
        volume_risk,
        total_raw_risk: liquidity_risk + volatility_risk + age_risk + volume_risk,
    }
}

// ============================================================================
// TESTS
// ============================================================================
