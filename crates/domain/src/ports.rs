//! Port definitions (traits) for external dependencies
//!
//! These traits define the boundaries between the domain and external systems.
//! Adapters implement these traits to connect to real infrastructure.

use async_trait::async_trait;
use secrecy::SecretString;
use thiserror::Error;
use time::OffsetDateTime;

use crate::model::{
    AdCreative, AdRecord, PlatformId, PublishErrorKind, PublishHistoryEntry, PublishReport,
    PublishedPost,
};
use crate::policy::MediaPolicy;

/// Error type for a single platform publish attempt
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlatformError {
    #[error("Authentication failed: {0}")]
    Unauthorized(String),
    #[error("Rate limited: {0}")]
    RateLimited(String),
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Timed out: {0}")]
    Timeout(String),
    #[error("Network error: {0}")]
    TransientNetwork(String),
    #[error("Rejected by platform: {0}")]
    Rejected(String),
    #[error("Unexpected error: {0}")]
    Unknown(String),
}

impl PlatformError {
    /// Build an error of the given kind
    pub fn new(kind: PublishErrorKind, message: impl Into<String>) -> Self {
        let message = message.into();
        match kind {
            PublishErrorKind::Unauthorized => PlatformError::Unauthorized(message),
            PublishErrorKind::RateLimited => PlatformError::RateLimited(message),
            PublishErrorKind::ValidationError => PlatformError::Validation(message),
            PublishErrorKind::Timeout => PlatformError::Timeout(message),
            PublishErrorKind::TransientNetworkError => PlatformError::TransientNetwork(message),
            PublishErrorKind::PlatformRejected => PlatformError::Rejected(message),
            PublishErrorKind::Unknown => PlatformError::Unknown(message),
        }
    }

    pub fn kind(&self) -> PublishErrorKind {
        match self {
            PlatformError::Unauthorized(_) => PublishErrorKind::Unauthorized,
            PlatformError::RateLimited(_) => PublishErrorKind::RateLimited,
            PlatformError::Validation(_) => PublishErrorKind::ValidationError,
            PlatformError::Timeout(_) => PublishErrorKind::Timeout,
            PlatformError::TransientNetwork(_) => PublishErrorKind::TransientNetworkError,
            PlatformError::Rejected(_) => PublishErrorKind::PlatformRejected,
            PlatformError::Unknown(_) => PublishErrorKind::Unknown,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }
}

/// Auth material for one owner on one platform
#[derive(Debug, Clone)]
pub struct PlatformCredentials {
    /// OAuth access token (user, page or organization scoped)
    pub access_token: SecretString,
    /// Platform account the post is made as (page id, organization id, ...)
    pub account_id: Option<String>,
}

/// Port for publishing a creative to one platform
///
/// Implementations make at most one external call per `publish` and never
/// retry internally; retry policy belongs to the orchestrator.
#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    /// Platform this adapter publishes to
    fn platform(&self) -> &PlatformId;

    /// Media and text constraints checked before any network call
    fn policy(&self) -> &MediaPolicy;

    /// Publish the creative. `credentials` is `None` when the owner has none
    /// on file for this platform.
    async fn publish(
        &self,
        creative: &AdCreative,
        credentials: Option<&PlatformCredentials>,
    ) -> Result<PublishedPost, PlatformError>;
}

/// Error type for credential lookups
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("Credential backend error: {0}")]
    Backend(String),
    #[error("Malformed credentials for {platform}: {message}")]
    Malformed { platform: String, message: String },
}

/// Port for read-only credential lookup keyed by owner and platform
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn lookup(
        &self,
        owner_id: &str,
        platform: &PlatformId,
    ) -> Result<Option<PlatformCredentials>, CredentialError>;
}

/// Error type for ad store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Port for the ad record persistence the publish flow needs
#[async_trait]
pub trait AdStore: Send + Sync {
    /// Get the stored state of an ad
    async fn get_ad(&self, ad_id: &str) -> Result<Option<AdRecord>, StoreError>;

    /// Transition an ad to published, creating the record if unseen
    async fn mark_published(
        &self,
        ad_id: &str,
        campaign_id: &str,
        published_at: OffsetDateTime,
    ) -> Result<(), StoreError>;

    /// Append a report to the ad's publish history
    async fn record_report(&self, report: &PublishReport) -> Result<(), StoreError>;

    /// Publish history for an ad, newest first
    async fn history(&self, ad_id: &str) -> Result<Vec<PublishHistoryEntry>, StoreError>;
}

/// Port for time/clock operations (enables deterministic testing)
pub trait Clock: Send + Sync {
    /// Get the current time
    fn now(&self) -> OffsetDateTime;
}

/// Real clock implementation
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_roundtrip() {
        let kinds = [
            PublishErrorKind::Unauthorized,
            PublishErrorKind::RateLimited,
            PublishErrorKind::ValidationError,
            PublishErrorKind::Timeout,
            PublishErrorKind::TransientNetworkError,
            PublishErrorKind::PlatformRejected,
            PublishErrorKind::Unknown,
        ];
        for kind in kinds {
            assert_eq!(PlatformError::new(kind, "m").kind(), kind);
        }
    }

    #[test]
    fn test_only_transient_and_rate_limited_retry() {
        assert!(PlatformError::TransientNetwork("reset".into()).is_retryable());
        assert!(PlatformError::RateLimited("429".into()).is_retryable());
        assert!(!PlatformError::Unauthorized("401".into()).is_retryable());
        assert!(!PlatformError::Validation("video".into()).is_retryable());
        assert!(!PlatformError::Rejected("policy".into()).is_retryable());
        assert!(!PlatformError::Timeout("15s".into()).is_retryable());
        assert!(!PlatformError::Unknown("?".into()).is_retryable());
    }
}
