//! Time expressions for query windows: `now`, `now-6h`, `now+15m`, RFC 3339
//! timestamps and epoch seconds.

use crate::prtg::error::{PrtgError, Result};
use crate::types::TimeRange;
use chrono::{DateTime, Utc};

fn invalid(expr: &str, reason: String) -> PrtgError {
    PrtgError::invalid_query(
        format!("Invalid time expression {:?}", expr),
        vec![reason],
    )
}

/// Parses `expr` relative to `now`, returning epoch milliseconds.
pub fn parse_millis(expr: &str, now: DateTime<Utc>) -> Result<i64> {
    let expr = expr.trim();
    let now_ms = now.timestamp_millis();

    if let Some(offset) = expr.strip_prefix("now") {
        let offset = offset.trim();
        if offset.is_empty() {
            return Ok(now_ms);
        }

        let (sign, amount) = if let Some(amount) = offset.strip_prefix('-') {
            (-1, amount)
        } else if let Some(amount) = offset.strip_prefix('+') {
            (1, amount)
        } else {
            return Err(invalid(expr, "expected now-<duration> or now+<duration>".into()));
        };

        let duration = humantime::parse_duration(amount.trim())
            .map_err(|e| invalid(expr, e.to_string()))?;
        let millis = i64::try_from(duration.as_millis())
            .map_err(|_| invalid(expr, "duration out of range".into()))?;
        return now_ms
            .checked_add(sign * millis)
            .ok_or_else(|| invalid(expr, "time out of range".into()));
    }

    if let Ok(secs) = expr.parse::<i64>() {
        return Ok(secs.saturating_mul(1000));
    }

    DateTime::parse_from_rfc3339(expr)
        .map(|dt| dt.timestamp_millis())
        .map_err(|e| invalid(expr, e.to_string()))
}

/// Milliseconds to whole seconds, rounding up.
pub fn millis_to_secs(ms: i64) -> i64 {
    ms.div_euclid(1000) + i64::from(ms.rem_euclid(1000) != 0)
}

/// Parses `expr` relative to `now`, returning epoch seconds (rounded up).
pub fn parse_secs(expr: &str, now: DateTime<Utc>) -> Result<i64> {
    parse_millis(expr, now).map(millis_to_secs)
}

/// Window between two expressions evaluated at the same instant
pub fn parse_range(from: &str, to: &str, now: DateTime<Utc>) -> Result<TimeRange> {
    Ok(TimeRange::new(parse_secs(from, now)?, parse_secs(to, now)?))
}
