//! Mapping of transport failures and HTTP statuses onto [`BrokerError`].

use std::time::Duration;

use agentbroker_core::BrokerError;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::StatusCode;

/// Classify a reqwest failure.
pub fn map_reqwest_error(err: reqwest::Error) -> BrokerError {
    if err.is_timeout() {
        return BrokerError::timeout(err.to_string());
    }
    if err.is_decode() {
        return BrokerError::upstream(err.status().map(|s| s.as_u16()), err.to_string());
    }
    if err.is_builder() {
        return BrokerError::configuration(err.to_string());
    }
    BrokerError::network(err.to_string())
}

/// Classify a non-success response.
///
/// | Status | Error |
/// |---|---|
/// | 429 | `RateLimit`, with the `Retry-After` hint |
/// | 5xx | `Upstream` |
/// | other 4xx | `Validation` |
pub fn status_error(status: StatusCode, headers: &HeaderMap, body: &str) -> BrokerError {
    let message = if body.trim().is_empty() {
        status.to_string()
    } else {
        format!("{status}: {}", truncate(body.trim(), 512))
    };
    if status == StatusCode::TOO_MANY_REQUESTS {
        return BrokerError::rate_limited(message, retry_after(headers));
    }
    if status.is_client_error() {
        return BrokerError::validation(message);
    }
    BrokerError::upstream(Some(status.as_u16()), message)
}

/// `Retry-After` in delta-seconds. HTTP-date values are ignored.
pub fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
