//! Reconnect backoff policy.
//!
//! Pure functions over [`ReconnectConfig`]: the delay before a given retry
//! and whether the policy allows another attempt. Deterministic modulo the
//! jitter draw.

use rand::Rng;

use kso_core::config::ReconnectConfig;

/// The delay in milliseconds before reconnect attempt `retry_count`
/// (1-based).
///
/// `min(base × multiplier^(retry_count − 1), max)`, then spread uniformly
/// across `±jitter` and rounded to an integer.
pub fn next_interval(config: &ReconnectConfig, retry_count: u32) -> u64 {
    let exponent = retry_count.saturating_sub(1);
    let raw = config.base_interval_ms as f64 * config.multiplier.powi(exponent as i32);
    let capped = raw.min(config.max_interval_ms as f64);

    if config.jitter > 0.0 {
        let low = capped * (1.0 - config.jitter);
        let high = capped * (1.0 + config.jitter);
        rand::thread_rng().gen_range(low..=high).round() as u64
    } else {
        capped.round() as u64
    }
}

/// Whether the policy allows another reconnect attempt after `retry_count`
/// attempts so far.
///
/// False when auto-reconnect is off; unconditionally true when `max_retry`
/// is negative (unlimited); otherwise true while `retry_count < max_retry`.
/// A `max_retry` of 0 therefore permits no retries at all.
pub fn should_reconnect(config: &ReconnectConfig, retry_count: u32) -> bool {
    if !config.auto_reconnect {
        return false;
    }
    if config.max_retry < 0 {
        return true;
    }
    (retry_count as i64) < config.max_retry as i64
}
