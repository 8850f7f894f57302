//! Shared HTTP client for the passive collaborators.

use crate::error::{AttemptResult, ProbeError};
use reqwest::redirect::Policy;
use std::time::Duration;

/// User agent sent when the settings do not override it.
pub const DEFAULT_USER_AGENT: &str = concat!("perimeter/", env!("CARGO_PKG_VERSION"));

/// Build a client with the given user agent and whole-request timeout.
///
/// Redirects are followed up to ten hops.
pub fn build_client(user_agent: &str, timeout: Duration) -> AttemptResult<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .connect_timeout(timeout)
        .redirect(Policy::limited(10))
        .build()
        .map_err(|e| ProbeError::ConnectionFailed(format!("HTTP client: {e}")))
}

/// Classify a request error.
pub fn classify(err: &reqwest::Error) -> ProbeError {
    if err.is_timeout() {
        ProbeError::NetworkTimeout
    } else if err.is_decode() || err.is_body() {
        ProbeError::MalformedResponse(err.to_string())
    } else {
        ProbeError::UpstreamUnreachable(err.to_string())
    }
}
