//! Domain models and value objects

use regex::Regex;
use serde::{Deserialize, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use std::time::Duration;
use thiserror::Error;
use time::OffsetDateTime;
use url::Url;
use uuid::Uuid;

use crate::registry::AdapterRegistry;

static PLATFORM_ID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9_]*$").expect("valid platform id pattern"));

/// Identifiers of the platforms served by the bundled adapters
pub mod platforms {
    pub const X: &str = "x";
    pub const FACEBOOK: &str = "facebook";
    pub const LINKEDIN: &str = "linkedin";
}

/// Identifier of a publishing platform (e.g., "x", "facebook")
///
/// The set is open: any id matching `[a-z][a-z0-9_]*` is well-formed, and it
/// becomes publishable once an adapter is registered for it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PlatformId(String);

impl PlatformId {
    /// Parse a platform id, normalizing case and surrounding whitespace
    pub fn parse(raw: &str) -> Result<Self, InvalidPlatformId> {
        let normalized = raw.trim().to_ascii_lowercase();
        if PLATFORM_ID_PATTERN.is_match(&normalized) {
            Ok(Self(normalized))
        } else {
            Err(InvalidPlatformId {
                id: raw.to_string(),
            })
        }
    }

    /// Build an id from a compile-time constant.
    ///
    /// # Panics
    ///
    /// Panics if `id` is not a well-formed platform id.
    pub fn from_static(id: &'static str) -> Self {
        match Self::parse(id) {
            Ok(platform) => platform,
            Err(error) => panic!("{}", error),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlatformId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for PlatformId {
    type Err = InvalidPlatformId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for PlatformId {
    type Error = InvalidPlatformId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PlatformId> for String {
    fn from(value: PlatformId) -> Self {
        value.0
    }
}

/// A platform id that failed validation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid platform id '{id}': must match [a-z][a-z0-9_]*")]
pub struct InvalidPlatformId {
    pub id: String,
}

/// Kind of creative being published
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AdType {
    #[default]
    Text,
    Image,
    Video,
}

impl AdType {
    pub fn as_str(self) -> &'static str {
        match self {
            AdType::Text => "text",
            AdType::Image => "image",
            AdType::Video => "video",
        }
    }
}

impl fmt::Display for AdType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AdType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(AdType::Text),
            "image" => Ok(AdType::Image),
            "video" => Ok(AdType::Video),
            other => Err(format!("unknown ad type '{}'", other)),
        }
    }
}

/// A publish request as submitted by a caller, before validation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdSubmission {
    /// Ad copy
    #[serde(default)]
    pub creative_content: String,
    /// Image URL, already resolved upstream
    #[serde(default)]
    pub image_url: Option<String>,
    /// Video URL, already resolved upstream
    #[serde(default)]
    pub video_url: Option<String>,
    pub ad_type: AdType,
    pub owner_id: String,
    pub campaign_id: String,
    pub ad_id: String,
    /// Target platform ids in caller order
    pub platforms: Vec<String>,
}

/// The platform-relevant part of an ad: what adapters get to see
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdCreative {
    pub content: String,
    pub image_url: Option<String>,
    pub video_url: Option<String>,
    pub ad_type: AdType,
}

impl AdCreative {
    /// The media URL matching the ad type, if any
    pub fn media_url(&self) -> Option<&str> {
        match self.ad_type {
            AdType::Text => None,
            AdType::Image => self.image_url.as_deref(),
            AdType::Video => self.video_url.as_deref(),
        }
    }
}

/// Errors that reject a whole publish call before any platform is contacted
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "error", rename_all = "snake_case")]
pub enum PublishCallError {
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },
    #[error("Unsupported platform(s): {}", join_ids(.platforms))]
    UnsupportedPlatform { platforms: Vec<PlatformId> },
}

impl PublishCallError {
    pub fn invalid(message: impl Into<String>) -> Self {
        PublishCallError::InvalidArgument {
            message: message.into(),
        }
    }
}

fn join_ids(ids: &[PlatformId]) -> String {
    ids.iter()
        .map(PlatformId::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// A validated publish request
///
/// Only constructible against an [`AdapterRegistry`], so every target is
/// known to have an adapter at construction time.
#[derive(Debug, Clone)]
pub struct PublishRequest {
    creative: AdCreative,
    owner_id: String,
    campaign_id: String,
    ad_id: String,
    targets: Vec<PlatformId>,
}

impl PublishRequest {
    /// Validate a submission and bind it to the registered platforms.
    ///
    /// Duplicate platform ids collapse to their first occurrence.
    pub fn new(
        submission: AdSubmission,
        registry: &AdapterRegistry,
    ) -> Result<Self, PublishCallError> {
        if submission.platforms.is_empty() {
            return Err(PublishCallError::invalid(
                "at least one target platform is required",
            ));
        }

        let owner_id = required_field("owner_id", &submission.owner_id)?;
        let campaign_id = required_field("campaign_id", &submission.campaign_id)?;
        let ad_id = required_field("ad_id", &submission.ad_id)?;

        let image_url = optional_url("image_url", submission.image_url)?;
        let video_url = optional_url("video_url", submission.video_url)?;

        match submission.ad_type {
            AdType::Text if submission.creative_content.trim().is_empty() => {
                return Err(PublishCallError::invalid(
                    "creative_content is required for text ads",
                ));
            }
            AdType::Image if image_url.is_none() => {
                return Err(PublishCallError::invalid(
                    "image_url is required for image ads",
                ));
            }
            AdType::Video if video_url.is_none() => {
                return Err(PublishCallError::invalid(
                    "video_url is required for video ads",
                ));
            }
            _ => {}
        }

        let mut targets: Vec<PlatformId> = Vec::with_capacity(submission.platforms.len());
        for raw in &submission.platforms {
            let platform =
                PlatformId::parse(raw).map_err(|e| PublishCallError::invalid(e.to_string()))?;
            if !targets.contains(&platform) {
                targets.push(platform);
            }
        }

        let unsupported: Vec<PlatformId> = targets
            .iter()
            .filter(|platform| !registry.contains(platform))
            .cloned()
            .collect();
        if !unsupported.is_empty() {
            return Err(PublishCallError::UnsupportedPlatform {
                platforms: unsupported,
            });
        }

        Ok(Self {
            creative: AdCreative {
                content: submission.creative_content,
                image_url,
                video_url,
                ad_type: submission.ad_type,
            },
            owner_id,
            campaign_id,
            ad_id,
            targets,
        })
    }

    pub fn creative(&self) -> &AdCreative {
        &self.creative
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    pub fn campaign_id(&self) -> &str {
        &self.campaign_id
    }

    pub fn ad_id(&self) -> &str {
        &self.ad_id
    }

    /// Target platforms, deduplicated, in caller order
    pub fn targets(&self) -> &[PlatformId] {
        &self.targets
    }
}

fn required_field(name: &str, value: &str) -> Result<String, PublishCallError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(PublishCallError::invalid(format!("{} must not be empty", name)));
    }
    Ok(trimmed.to_string())
}

fn optional_url(name: &str, value: Option<String>) -> Result<Option<String>, PublishCallError> {
    let Some(value) = value else {
        return Ok(None);
    };
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    if parse_http_url(trimmed).is_none() {
        return Err(PublishCallError::invalid(format!(
            "{} must be an absolute http(s) URL, got '{}'",
            name, trimmed
        )));
    }
    Ok(Some(trimmed.to_string()))
}

/// Parse an absolute `http`/`https` URL that names a host and carries no
/// credentials. Inputs the URL parser would silently repair (embedded
/// whitespace, missing or extra slashes after the scheme) are rejected.
pub fn parse_http_url(raw: &str) -> Option<Url> {
    if raw.chars().any(char::is_whitespace) {
        return None;
    }

    let url = Url::parse(raw).ok()?;
    let scheme = url.scheme();
    if !matches!(scheme, "http" | "https") {
        return None;
    }

    let authority = raw.get(scheme.len()..)?.strip_prefix("://")?;
    if authority.starts_with(['/', '\\']) {
        return None;
    }
    if !url.username().is_empty() || url.password().is_some() {
        return None;
    }

    url.host_str().filter(|host| !host.is_empty())?;
    Some(url)
}

/// Classified reason a platform publish failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishErrorKind {
    /// Platform credentials invalid or expired for this owner
    Unauthorized,
    RateLimited,
    /// Creative incompatible with the platform; detected before any call
    ValidationError,
    Timeout,
    TransientNetworkError,
    /// Platform-specific business rule failure
    PlatformRejected,
    Unknown,
}

impl PublishErrorKind {
    /// Whether another attempt could change the outcome
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            PublishErrorKind::TransientNetworkError | PublishErrorKind::RateLimited
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PublishErrorKind::Unauthorized => "unauthorized",
            PublishErrorKind::RateLimited => "rate_limited",
            PublishErrorKind::ValidationError => "validation_error",
            PublishErrorKind::Timeout => "timeout",
            PublishErrorKind::TransientNetworkError => "transient_network_error",
            PublishErrorKind::PlatformRejected => "platform_rejected",
            PublishErrorKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for PublishErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PublishErrorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let kind = match s.trim() {
            "unauthorized" => PublishErrorKind::Unauthorized,
            "rate_limited" => PublishErrorKind::RateLimited,
            "validation_error" => PublishErrorKind::ValidationError,
            "timeout" => PublishErrorKind::Timeout,
            "transient_network_error" => PublishErrorKind::TransientNetworkError,
            "platform_rejected" => PublishErrorKind::PlatformRejected,
            "unknown" => PublishErrorKind::Unknown,
            other => return Err(format!("unknown error kind '{}'", other)),
        };
        Ok(kind)
    }
}

/// Result of a successful platform publish
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedPost {
    /// Platform-specific post ID
    pub id: String,
    /// URL to the published content, if available
    pub url: Option<String>,
}

/// Final result of publishing to one platform
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlatformOutcome {
    platform: PlatformId,
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    external_post_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    post_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_kind: Option<PublishErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_message: Option<String>,
    attempts: u32,
    #[serde(rename = "latency_ms", serialize_with = "serialize_millis")]
    latency: Duration,
}

impl PlatformOutcome {
    pub fn succeeded(
        platform: PlatformId,
        post: PublishedPost,
        attempts: u32,
        latency: Duration,
    ) -> Self {
        Self {
            platform,
            success: true,
            external_post_id: Some(post.id),
            post_url: post.url,
            error_kind: None,
            error_message: None,
            attempts,
            latency,
        }
    }

    pub fn failed(
        platform: PlatformId,
        kind: PublishErrorKind,
        message: impl Into<String>,
        attempts: u32,
        latency: Duration,
    ) -> Self {
        Self {
            platform,
            success: false,
            external_post_id: None,
            post_url: None,
            error_kind: Some(kind),
            error_message: Some(message.into()),
            attempts,
            latency,
        }
    }

    pub fn platform(&self) -> &PlatformId {
        &self.platform
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn external_post_id(&self) -> Option<&str> {
        self.external_post_id.as_deref()
    }

    pub fn post_url(&self) -> Option<&str> {
        self.post_url.as_deref()
    }

    pub fn error_kind(&self) -> Option<PublishErrorKind> {
        self.error_kind
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// Adapter invocations made for this platform
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn latency(&self) -> Duration {
        self.latency
    }
}

fn serialize_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
}

/// Aggregate result of one publish call across all requested platforms
#[derive(Debug, Clone, Serialize)]
pub struct PublishReport {
    report_id: Uuid,
    ad_id: String,
    campaign_id: String,
    outcomes: Vec<PlatformOutcome>,
    any_succeeded: bool,
    all_succeeded: bool,
    #[serde(with = "time::serde::rfc3339")]
    completed_at: OffsetDateTime,
}

impl PublishReport {
    /// Assemble a report; the aggregate flags are derived from `outcomes`
    pub fn new(
        ad_id: impl Into<String>,
        campaign_id: impl Into<String>,
        outcomes: Vec<PlatformOutcome>,
        completed_at: OffsetDateTime,
    ) -> Self {
        let any_succeeded = outcomes.iter().any(PlatformOutcome::is_success);
        let all_succeeded = outcomes.iter().all(PlatformOutcome::is_success);
        Self {
            report_id: Uuid::new_v4(),
            ad_id: ad_id.into(),
            campaign_id: campaign_id.into(),
            outcomes,
            any_succeeded,
            all_succeeded,
            completed_at,
        }
    }

    pub fn report_id(&self) -> Uuid {
        self.report_id
    }

    pub fn ad_id(&self) -> &str {
        &self.ad_id
    }

    pub fn campaign_id(&self) -> &str {
        &self.campaign_id
    }

    /// One outcome per requested platform, in request order
    pub fn outcomes(&self) -> &[PlatformOutcome] {
        &self.outcomes
    }

    pub fn any_succeeded(&self) -> bool {
        self.any_succeeded
    }

    pub fn all_succeeded(&self) -> bool {
        self.all_succeeded
    }

    pub fn completed_at(&self) -> OffsetDateTime {
        self.completed_at
    }

    pub fn outcome(&self, platform: &PlatformId) -> Option<&PlatformOutcome> {
        self.outcomes.iter().find(|o| &o.platform == platform)
    }

    /// Platforms to resubmit for a "retry failed only" action
    pub fn failed_platforms(&self) -> Vec<PlatformId> {
        self.outcomes
            .iter()
            .filter(|o| !o.success)
            .map(|o| o.platform.clone())
            .collect()
    }

    pub fn succeeded_platforms(&self) -> Vec<PlatformId> {
        self.outcomes
            .iter()
            .filter(|o| o.success)
            .map(|o| o.platform.clone())
            .collect()
    }

    /// SHA-256 over the report content, ignoring ids, timings and timestamps
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.ad_id.as_bytes());
        hasher.update([0]);
        hasher.update(self.campaign_id.as_bytes());
        for outcome in &self.outcomes {
            hasher.update([0]);
            hasher.update(outcome.platform.as_str().as_bytes());
            hasher.update([u8::from(outcome.success)]);
            hasher.update(outcome.external_post_id.as_deref().unwrap_or("").as_bytes());
            hasher.update([0]);
            hasher.update(outcome.error_kind.map(|k| k.as_str()).unwrap_or("").as_bytes());
            hasher.update([0]);
            hasher.update(outcome.error_message.as_deref().unwrap_or("").as_bytes());
            hasher.update(outcome.attempts.to_be_bytes());
        }
        format!("{:x}", hasher.finalize())
    }
}

/// Lifecycle status of an ad record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AdStatus {
    #[default]
    Draft,
    Published,
}

impl AdStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AdStatus::Draft => "draft",
            AdStatus::Published => "published",
        }
    }
}

impl FromStr for AdStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(AdStatus::Draft),
            "published" => Ok(AdStatus::Published),
            other => Err(format!("unknown ad status '{}'", other)),
        }
    }
}

/// Stored state of an ad, as far as publishing is concerned
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdRecord {
    pub ad_id: String,
    pub campaign_id: String,
    pub status: AdStatus,
    #[serde(with = "time::serde::rfc3339::option")]
    pub published_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// A stored publish report
#[derive(Debug, Clone, Serialize)]
pub struct PublishHistoryEntry {
    pub report_id: Uuid,
    pub ad_id: String,
    pub any_succeeded: bool,
    pub all_succeeded: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub completed_at: OffsetDateTime,
    /// The report as serialized at the time of publishing
    pub report: serde_json::Value,
}

/// What the ad state updater did with a report
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum StateUpdate {
    /// Ad marked published
    Published {
        #[serde(with = "time::serde::rfc3339")]
        published_at: OffsetDateTime,
    },
    /// No platform succeeded, status left as it was
    Unchanged,
    /// Posts went to the approval queue; history recorded, status left as it was
    Queued,
    /// Caller chose not to record state
    Skipped,
    /// Status write failed; the report is still valid
    Failed { error: String },
}

/// Report plus the state transition it triggered
#[derive(Debug, Clone, Serialize)]
pub struct PublishSummary {
    pub report: PublishReport,
    pub state_update: StateUpdate,
}
