use chrono::{DateTime, Utc};

/// Delay before the next attempt: `base_ms × multiple^(attempts-1)`.
///
/// `attempts` is 1-based. The result saturates instead of overflowing.
pub fn backoff_delay(base_ms: u64, multiple: f64, attempts: u32) -> u64 {
    let exponent = attempts.saturating_sub(1).min(i32::MAX as u32) as i32;
    let delay = base_ms as f64 * multiple.powi(exponent);
    if delay.is_nan() || delay <= 0.0 {
        0
    } else {
        // float-to-int casts saturate at u64::MAX
        delay.round() as u64
    }
}

/// Parses a `Retry-After` value into milliseconds.
///
/// Accepts delay-seconds (fractions allowed) or an HTTP-date, which is
/// measured from `now` and clamped at zero.
pub fn retry_after_ms(value: &str, now: DateTime<Utc>) -> Option<u64> {
    let value = value.trim();
    if let Ok(seconds) = value.parse::<f64>() {
        if seconds.is_finite() && seconds >= 0.0 {
            return Some((seconds * 1_000.0).round() as u64);
        }
        return None;
    }
    let at = DateTime::parse_from_rfc2822(value).ok()?.with_timezone(&Utc);
    Some(u64::try_from((at - now).num_milliseconds()).unwrap_or(0))
}
