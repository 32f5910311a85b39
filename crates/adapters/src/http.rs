//! Shared HTTP plumbing for the platform API adapters

use ad_publisher_domain::{PlatformCredentials, PlatformError, PlatformId};
use reqwest::{Client, StatusCode};
use std::time::Duration;

/// Default client-side timeout. The orchestrator's per-attempt timeout is
/// normally the tighter bound.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Longest slice of a response body quoted in error messages
const MAX_BODY_IN_MESSAGE: usize = 300;

pub(crate) fn build_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!("ad-publisher/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// Credentials are mandatory for every real API call
pub(crate) fn require_credentials<'a>(
    platform: &PlatformId,
    credentials: Option<&'a PlatformCredentials>,
) -> Result<&'a PlatformCredentials, PlatformError> {
    credentials.ok_or_else(|| {
        PlatformError::Unauthorized(format!("no credentials on file for {}", platform))
    })
}

/// Account id (page, organization) the post is made as
pub(crate) fn require_account_id<'a>(
    platform: &PlatformId,
    credentials: &'a PlatformCredentials,
) -> Result<&'a str, PlatformError> {
    credentials
        .account_id
        .as_deref()
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| {
            PlatformError::Unauthorized(format!("no account id configured for {}", platform))
        })
}

/// Map a transport-level failure (no HTTP status) to the error taxonomy
pub(crate) fn map_transport_error(error: reqwest::Error) -> PlatformError {
    if error.is_timeout() {
        PlatformError::Timeout(error.to_string())
    } else if error.is_connect() || error.is_request() || error.is_body() {
        PlatformError::TransientNetwork(error.to_string())
    } else if error.is_decode() {
        PlatformError::Unknown(format!("unreadable response: {}", error))
    } else {
        PlatformError::Unknown(error.to_string())
    }
}

/// Map a non-success HTTP status to the error taxonomy
pub(crate) fn classify_status(status: StatusCode, body: &str) -> PlatformError {
    let message = format!("HTTP {}: {}", status.as_u16(), truncate(body));
    match status.as_u16() {
        401 | 403 => PlatformError::Unauthorized(message),
        429 => PlatformError::RateLimited(message),
        408 | 504 => PlatformError::Timeout(message),
        400 | 422 => PlatformError::Rejected(message),
        500..=599 => PlatformError::TransientNetwork(message),
        _ => PlatformError::Unknown(message),
    }
}

pub(crate) fn truncate(body: &str) -> &str {
    let body = body.trim();
    match body.char_indices().nth(MAX_BODY_IN_MESSAGE) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}
