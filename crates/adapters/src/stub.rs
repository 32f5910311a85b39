//! Scripted adapter for offline runs, demos and tests

use ad_publisher_domain::{
    AdCreative, MediaPolicy, PlatformAdapter, PlatformCredentials, PlatformError, PlatformId,
    PublishErrorKind, PublishedPost,
};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// What a stub adapter answers with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StubBehavior {
    #[default]
    Succeed,
    Fail(PublishErrorKind),
}

impl FromStr for StubBehavior {
    type Err = String;

    /// `success`, or any error kind name such as `rate_limited`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "success" | "succeed" => Ok(StubBehavior::Succeed),
            other => other.parse().map(StubBehavior::Fail),
        }
    }
}

impl fmt::Display for StubBehavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StubBehavior::Succeed => f.write_str("success"),
            StubBehavior::Fail(kind) => write!(f, "{}", kind),
        }
    }
}

/// Adapter that never leaves the process
///
/// Post ids are derived from the creative, so publishing the same ad twice
/// yields the same id.
pub struct StubAdapter {
    platform: PlatformId,
    policy: MediaPolicy,
    behavior: StubBehavior,
    delay: Duration,
    calls: AtomicUsize,
    published: Mutex<Vec<AdCreative>>,
}

impl StubAdapter {
    pub fn new(platform: PlatformId, behavior: StubBehavior) -> Self {
        Self {
            platform,
            policy: MediaPolicy::default(),
            behavior,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            published: Mutex::new(vec![]),
        }
    }

    pub fn succeeding(platform: PlatformId) -> Self {
        Self::new(platform, StubBehavior::Succeed)
    }

    pub fn failing(platform: PlatformId, kind: PublishErrorKind) -> Self {
        Self::new(platform, StubBehavior::Fail(kind))
    }

    /// Use the real platform's media policy so validation behaves the same
    pub fn with_policy(mut self, policy: MediaPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Simulated network latency per call
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Number of publish calls made so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Creatives that were accepted
    pub fn published(&self) -> Vec<AdCreative> {
        self.published
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn post_id(&self, creative: &AdCreative) -> String {
        let mut hasher = Sha256::new();
        hasher.update(creative.ad_type.as_str().as_bytes());
        hasher.update([0]);
        hasher.update(creative.content.as_bytes());
        hasher.update([0]);
        hasher.update(creative.media_url().unwrap_or_default().as_bytes());
        let digest = format!("{:x}", hasher.finalize());
        format!("stub_{}_{}", self.platform, &digest[..12])
    }
}

#[async_trait]
impl PlatformAdapter for StubAdapter {
    fn platform(&self) -> &PlatformId {
        &self.platform
    }

    fn policy(&self) -> &MediaPolicy {
        &self.policy
    }

    async fn publish(
        &self,
        creative: &AdCreative,
        _credentials: Option<&PlatformCredentials>,
    ) -> Result<PublishedPost, PlatformError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.policy.check(creative, &creative.content)?;

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        match self.behavior {
            StubBehavior::Succeed => {
                self.published
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .push(creative.clone());
                let id = self.post_id(creative);
                Ok(PublishedPost {
                    url: Some(format!("https://{}.stub.invalid/posts/{}", self.platform, id)),
                    id,
                })
            }
            StubBehavior::Fail(kind) => Err(PlatformError::new(
                kind,
                format!("stub {} configured to fail", self.platform),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ad_publisher_domain::AdType;

    fn creative(content: &str) -> AdCreative {
        AdCreative {
            content: content.to_string(),
            image_url: None,
            video_url: None,
            ad_type: AdType::Text,
        }
    }

    #[tokio::test]
    async fn test_success_is_deterministic() {
        let stub = StubAdapter::succeeding(PlatformId::from_static("x"));

        let first = stub.publish(&creative("Hello"), None).await.unwrap();
        let second = stub.publish(&creative("Hello"), None).await.unwrap();
        let other = stub.publish(&creative("Bye"), None).await.unwrap();

        assert_eq!(first, second);
        assert_ne!(first.id, other.id);
        assert!(first.id.starts_with("stub_x_"));
        assert_eq!(stub.calls(), 3);
        assert_eq!(stub.published().len(), 3);
    }

    #[tokio::test]
    async fn test_failure_uses_configured_kind() {
        let stub = StubAdapter::failing(
            PlatformId::from_static("facebook"),
            PublishErrorKind::RateLimited,
        );

        let error = stub.publish(&creative("Hello"), None).await.unwrap_err();

        assert_eq!(error.kind(), PublishErrorKind::RateLimited);
        assert!(stub.published().is_empty());
    }

    #[tokio::test]
    async fn test_policy_applies_before_behavior() {
        let stub = StubAdapter::succeeding(PlatformId::from_static("linkedin")).with_policy(
            MediaPolicy {
                supported_ad_types: vec![AdType::Text],
                max_text_chars: Some(3),
                requires_text: true,
            },
        );

        let error = stub.publish(&creative("Too long"), None).await.unwrap_err();

        assert_eq!(error.kind(), PublishErrorKind::ValidationError);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_is_simulated() {
        let stub = StubAdapter::succeeding(PlatformId::from_static("x"))
            .with_delay(Duration::from_millis(250));
        let start = tokio::time::Instant::now();

        stub.publish(&creative("Hello"), None).await.unwrap();

        assert_eq!(start.elapsed(), Duration::from_millis(250));
    }

    #[test]
    fn test_behavior_parsing() {
        assert_eq!("success".parse::<StubBehavior>(), Ok(StubBehavior::Succeed));
        assert_eq!(
            "unauthorized".parse::<StubBehavior>(),
            Ok(StubBehavior::Fail(PublishErrorKind::Unauthorized))
        );
        assert!("explode".parse::<StubBehavior>().is_err());
        assert_eq!(StubBehavior::Fail(PublishErrorKind::Timeout).to_string(), "timeout");
    }
}
