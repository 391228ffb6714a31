//! Decides whether a stored access token can still be used.

use std::sync::Arc;

use chrono::{DateTime, NaiveDateTime};

use crate::clock::Clock;

/// Tokens within this many seconds of expiry are treated as expired.
pub const SAFETY_MARGIN_SECS: i64 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryDecision {
    Valid,
    RefreshRequired,
    /// Expiry was absent or could not be parsed.
    UnknownTreatAsExpired,
}

impl ExpiryDecision {
    pub fn needs_refresh(self) -> bool {
        !matches!(self, Self::Valid)
    }
}

/// Normalize a stored expiry to unix seconds.
///
/// Accepts integer or fractional unix seconds and ISO-8601 timestamps. Naive
/// timestamps without an offset are read as UTC. Fractional seconds are
/// floored.
pub fn parse_expiry(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(secs) = raw.parse::<i64>() {
        return Some(secs);
    }
    if let Ok(secs) = raw.parse::<f64>() {
        if secs.is_finite() && secs >= i64::MIN as f64 && secs <= i64::MAX as f64 {
            return Some(secs.floor() as i64);
        }
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.timestamp());
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc().timestamp())
}

/// Decide for an already-normalized expiry instant.
pub fn evaluate_instant(expires_at: i64, now: i64) -> ExpiryDecision {
    if now >= expires_at.saturating_sub(SAFETY_MARGIN_SECS) {
        ExpiryDecision::RefreshRequired
    } else {
        ExpiryDecision::Valid
    }
}

/// Decide for a raw stored expiry at the given instant.
pub fn evaluate(expires_at: Option<&str>, now: i64) -> ExpiryDecision {
    match expires_at.and_then(parse_expiry) {
        Some(instant) => evaluate_instant(instant, now),
        None => ExpiryDecision::UnknownTreatAsExpired,
    }
}

/// [`evaluate`] bound to a clock.
#[derive(Clone)]
pub struct ExpiryEvaluator {
    clock: Arc<dyn Clock>,
}

impl ExpiryEvaluator {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    pub fn evaluate(&self, expires_at: Option<&str>) -> ExpiryDecision {
        evaluate(expires_at, self.clock.now())
    }

    /// Seconds until literal expiry (negative once expired).
    pub fn remaining(&self, expires_at: i64) -> i64 {
        expires_at.saturating_sub(self.clock.now())
    }
}
