//! Publish use case - fans one ad out to its target platforms

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use futures::future::join_all;
use tokio::time::{Duration, Instant, sleep, timeout, timeout_at};

use crate::{
    model::{
        AdCreative, AdSubmission, PlatformId, PlatformOutcome, PublishCallError,
        PublishErrorKind, PublishReport, PublishRequest,
    },
    ports::{Clock, CredentialStore, PlatformAdapter, PlatformError},
    registry::AdapterRegistry,
};

/// Retry policy applied uniformly to every platform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt, for retryable errors only
    pub max_retries: u32,
    /// Fixed delay before each retry
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 1,
            backoff: Duration::from_millis(500),
        }
    }
}

/// Configuration for the publish orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishConfig {
    /// Budget for a single adapter invocation
    pub platform_timeout: Duration,
    pub retry: RetryPolicy,
    /// Ceiling for a whole platform task; derived from the other settings
    /// when `None`
    pub overall_timeout: Option<Duration>,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            platform_timeout: Duration::from_secs(15),
            retry: RetryPolicy::default(),
            overall_timeout: None,
        }
    }
}

impl PublishConfig {
    const DEADLINE_GRACE: Duration = Duration::from_secs(5);

    /// Effective ceiling for one platform task, retries included
    pub fn overall_deadline(&self) -> Duration {
        self.overall_timeout.unwrap_or_else(|| {
            let attempts = self.retry.max_retries.saturating_add(1);
            self.platform_timeout
                .saturating_mul(attempts)
                .saturating_add(self.retry.backoff.saturating_mul(self.retry.max_retries))
                .saturating_add(Self::DEADLINE_GRACE)
        })
    }
}

/// Publish orchestrator
pub struct PublishOrchestrator<Cr, Cl>
where
    Cr: CredentialStore + ?Sized + 'static,
    Cl: Clock + ?Sized,
{
    registry: Arc<AdapterRegistry>,
    credentials: Arc<Cr>,
    clock: Arc<Cl>,
    config: PublishConfig,
}

impl<Cr, Cl> PublishOrchestrator<Cr, Cl>
where
    Cr: CredentialStore + ?Sized + 'static,
    Cl: Clock + ?Sized,
{
    pub fn new(
        registry: Arc<AdapterRegistry>,
        credentials: Arc<Cr>,
        clock: Arc<Cl>,
        config: PublishConfig,
    ) -> Self {
        Self {
            registry,
            credentials,
            clock,
            config,
        }
    }

    pub fn registry(&self) -> &AdapterRegistry {
        &self.registry
    }

    pub fn config(&self) -> &PublishConfig {
        &self.config
    }

    /// Validate a submission and publish it.
    ///
    /// Fails only for malformed submissions or unregistered platforms, in
    /// which case no adapter has been invoked.
    pub async fn publish_ad(
        &self,
        submission: AdSubmission,
    ) -> Result<PublishReport, PublishCallError> {
        let request = PublishRequest::new(submission, &self.registry)?;
        self.publish(request).await
    }

    /// Publish a validated request to every target platform concurrently
    pub async fn publish(
        &self,
        request: PublishRequest,
    ) -> Result<PublishReport, PublishCallError> {
        let adapters = self.resolve(&request)?;

        tracing::info!(
            ad_id = %request.ad_id(),
            campaign_id = %request.campaign_id(),
            ad_type = %request.creative().ad_type,
            platforms = ?request.targets().iter().map(PlatformId::as_str).collect::<Vec<_>>(),
            "Publishing ad"
        );

        let creative = Arc::new(request.creative().clone());
        let owner_id: Arc<str> = Arc::from(request.owner_id());
        let deadline = Instant::now() + self.config.overall_deadline();

        let (platforms, handles): (Vec<_>, Vec<_>) = adapters
            .into_iter()
            .map(|adapter| {
                let platform = adapter.platform().clone();
                let task = PlatformTask {
                    adapter,
                    creative: Arc::clone(&creative),
                    owner_id: Arc::clone(&owner_id),
                    credentials: Arc::clone(&self.credentials),
                    config: self.config,
                };
                (platform, tokio::spawn(task.run(deadline)))
            })
            .unzip();

        let outcomes = join_all(handles)
            .await
            .into_iter()
            .zip(platforms)
            .map(|(joined, platform)| match joined {
                Ok(outcome) => outcome,
                Err(error) => {
                    tracing::error!(platform = %platform, error = %error, "Publish task aborted");
                    PlatformOutcome::failed(
                        platform,
                        PublishErrorKind::Unknown,
                        format!("Publish task aborted: {}", error),
                        0,
                        Duration::ZERO,
                    )
                }
            })
            .collect();

        let report = PublishReport::new(
            request.ad_id(),
            request.campaign_id(),
            outcomes,
            self.clock.now(),
        );

        tracing::info!(
            ad_id = %report.ad_id(),
            any_succeeded = report.any_succeeded(),
            all_succeeded = report.all_succeeded(),
            failed = ?report.failed_platforms().iter().map(PlatformId::as_str).collect::<Vec<_>>(),
            "Publish complete"
        );

        Ok(report)
    }

    /// Look up every target's adapter; all-or-nothing
    fn resolve(
        &self,
        request: &PublishRequest,
    ) -> Result<Vec<Arc<dyn PlatformAdapter>>, PublishCallError> {
        let mut adapters = Vec::with_capacity(request.targets().len());
        let mut missing = Vec::new();

        for platform in request.targets() {
            match self.registry.get(platform) {
                Some(adapter) => adapters.push(Arc::clone(adapter)),
                None => missing.push(platform.clone()),
            }
        }

        if missing.is_empty() {
            Ok(adapters)
        } else {
            Err(PublishCallError::UnsupportedPlatform { platforms: missing })
        }
    }
}

/// Everything one platform's task owns
struct PlatformTask<Cr: CredentialStore + ?Sized> {
    adapter: Arc<dyn PlatformAdapter>,
    creative: Arc<AdCreative>,
    owner_id: Arc<str>,
    credentials: Arc<Cr>,
    config: PublishConfig,
}

impl<Cr: CredentialStore + ?Sized> PlatformTask<Cr> {
    async fn run(self, deadline: Instant) -> PlatformOutcome {
        let started = Instant::now();
        let attempts = AtomicU32::new(0);

        match timeout_at(deadline, self.attempt(&attempts, started)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                let platform = self.adapter.platform().clone();
                tracing::warn!(platform = %platform, "Publish deadline exceeded");
                PlatformOutcome::failed(
                    platform,
                    PublishErrorKind::Timeout,
                    "Publish deadline exceeded",
                    attempts.load(Ordering::Relaxed),
                    started.elapsed(),
                )
            }
        }
    }

    async fn attempt(&self, attempts: &AtomicU32, started: Instant) -> PlatformOutcome {
        let platform = self.adapter.platform();

        let credentials = match self.credentials.lookup(&self.owner_id, platform).await {
            Ok(credentials) => credentials,
            Err(error) => {
                tracing::error!(platform = %platform, error = %error, "Credential lookup failed");
                return PlatformOutcome::failed(
                    platform.clone(),
                    PublishErrorKind::Unknown,
                    format!("Credential lookup failed: {}", error),
                    0,
                    started.elapsed(),
                );
            }
        };

        loop {
            let attempt = attempts.fetch_add(1, Ordering::Relaxed) + 1;

            let result = match timeout(
                self.config.platform_timeout,
                self.adapter.publish(&self.creative, credentials.as_ref()),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(PlatformError::Timeout(format!(
                    "No response within {:?}",
                    self.config.platform_timeout
                ))),
            };

            match result {
                Ok(post) => {
                    tracing::info!(
                        platform = %platform,
                        attempt = attempt,
                        post_id = %post.id,
                        "Published to platform"
                    );
                    return PlatformOutcome::succeeded(
                        platform.clone(),
                        post,
                        attempt,
                        started.elapsed(),
                    );
                }
                Err(error) if error.is_retryable() && attempt <= self.config.retry.max_retries => {
                    tracing::warn!(
                        platform = %platform,
                        attempt = attempt,
                        error_kind = %error.kind(),
                        error = %error,
                        backoff_ms = self.config.retry.backoff.as_millis() as u64,
                        "Retryable publish failure, backing off"
                    );
                    sleep(self.config.retry.backoff).await;
                }
                Err(error) => {
                    tracing::warn!(
                        platform = %platform,
                        attempt = attempt,
                        error_kind = %error.kind(),
                        error = %error,
                        "Publish failed"
                    );
                    return PlatformOutcome::failed(
                        platform.clone(),
                        error.kind(),
                        error.to_string(),
                        attempt,
                        started.elapsed(),
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AdType, PublishedPost};
    use crate::policy::MediaPolicy;
    use crate::ports::{CredentialError, PlatformCredentials};
    use async_trait::async_trait;
    use secrecy::SecretString;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;
    use time::OffsetDateTime;

    #[derive(Debug, Clone)]
    enum Step {
        Succeed,
        Fail(PublishErrorKind),
        /// Sleep, then succeed
        Delay(Duration),
        Panic,
    }

    /// Adapter that plays back a script, repeating the last step
    struct ScriptedAdapter {
        platform: PlatformId,
        policy: MediaPolicy,
        script: Mutex<VecDeque<Step>>,
        calls: AtomicUsize,
    }

    impl ScriptedAdapter {
        fn new(platform: &'static str, script: Vec<Step>) -> Arc<Self> {
            Arc::new(Self {
                platform: PlatformId::from_static(platform),
                policy: MediaPolicy::default(),
                script: Mutex::new(script.into()),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn next_step(&self) -> Step {
            let mut script = self.script.lock().unwrap();
            if script.len() > 1 {
                script.pop_front().unwrap()
            } else {
                script.front().cloned().unwrap_or(Step::Succeed)
            }
        }
    }

    #[async_trait]
    impl PlatformAdapter for ScriptedAdapter {
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
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            let post = PublishedPost {
                id: format!("{}-{}", self.platform, creative.content.len()),
                url: None,
            };
            match self.next_step() {
                Step::Succeed => Ok(post),
                Step::Fail(kind) => Err(PlatformError::new(kind, format!("call {}", call))),
                Step::Delay(delay) => {
                    sleep(delay).await;
                    Ok(post)
                }
                Step::Panic => panic!("adapter exploded"),
            }
        }
    }

    struct FakeCredentials {
        fail: bool,
    }

    #[async_trait]
    impl CredentialStore for FakeCredentials {
        async fn lookup(
            &self,
            _owner_id: &str,
            _platform: &PlatformId,
        ) -> Result<Option<PlatformCredentials>, CredentialError> {
            if self.fail {
                return Err(CredentialError::Backend("vault sealed".to_string()));
            }
            Ok(Some(PlatformCredentials {
                access_token: SecretString::new("token".into()),
                account_id: None,
            }))
        }
    }

    struct FakeClock;

    impl Clock for FakeClock {
        fn now(&self) -> OffsetDateTime {
            OffsetDateTime::UNIX_EPOCH
        }
    }

    fn orchestrator(
        adapters: &[Arc<ScriptedAdapter>],
        config: PublishConfig,
    ) -> PublishOrchestrator<FakeCredentials, FakeClock> {
        orchestrator_with_credentials(adapters, config, FakeCredentials { fail: false })
    }

    fn orchestrator_with_credentials(
        adapters: &[Arc<ScriptedAdapter>],
        config: PublishConfig,
        credentials: FakeCredentials,
    ) -> PublishOrchestrator<FakeCredentials, FakeClock> {
        let mut registry = AdapterRegistry::new();
        for adapter in adapters {
            registry.register(Arc::clone(adapter) as Arc<dyn PlatformAdapter>);
        }
        PublishOrchestrator::new(
            Arc::new(registry),
            Arc::new(credentials),
            Arc::new(FakeClock),
            config,
        )
    }

    fn submission(platforms: &[&str]) -> AdSubmission {
        AdSubmission {
            creative_content: "Spring sale: 20% off".to_string(),
            image_url: None,
            video_url: None,
            ad_type: AdType::Text,
            owner_id: "owner-1".to_string(),
            campaign_id: "campaign-1".to_string(),
            ad_id: "ad-1".to_string(),
            platforms: platforms.iter().map(|p| p.to_string()).collect(),
        }
    }

    fn kinds(report: &PublishReport) -> Vec<Option<PublishErrorKind>> {
        report.outcomes().iter().map(|o| o.error_kind()).collect()
    }

    #[tokio::test]
    async fn test_outcomes_follow_request_order() {
        let x = ScriptedAdapter::new("x", vec![Step::Delay(Duration::from_millis(30))]);
        let facebook = ScriptedAdapter::new("facebook", vec![Step::Succeed]);
        let linkedin = ScriptedAdapter::new(
            "linkedin",
            vec![Step::Fail(PublishErrorKind::PlatformRejected)],
        );
        let orchestrator = orchestrator(
            &[x.clone(), facebook.clone(), linkedin.clone()],
            PublishConfig::default(),
        );

        let report = orchestrator
            .publish_ad(submission(&["linkedin", "x", "facebook"]))
            .await
            .unwrap();

        let order: Vec<&str> = report
            .outcomes()
            .iter()
            .map(|o| o.platform().as_str())
            .collect();
        assert_eq!(order, vec!["linkedin", "x", "facebook"]);
        assert_eq!(report.ad_id(), "ad-1");
        assert_eq!(report.campaign_id(), "campaign-1");
        assert!(report.any_succeeded());
        assert!(!report.all_succeeded());
        assert_eq!(
            kinds(&report),
            vec![Some(PublishErrorKind::PlatformRejected), None, None]
        );
        assert_eq!(report.outcomes()[1].external_post_id(), Some("x-20"));
    }

    #[tokio::test]
    async fn test_unsupported_platform_rejects_without_dispatch() {
        let x = ScriptedAdapter::new("x", vec![Step::Succeed]);
        let orchestrator = orchestrator(&[x.clone()], PublishConfig::default());

        let result = orchestrator.publish_ad(submission(&["x", "mastodon"])).await;

        assert_eq!(
            result.unwrap_err(),
            PublishCallError::UnsupportedPlatform {
                platforms: vec![PlatformId::from_static("mastodon")]
            }
        );
        assert_eq!(x.calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_platforms_is_invalid_argument() {
        let x = ScriptedAdapter::new("x", vec![Step::Succeed]);
        let orchestrator = orchestrator(&[x.clone()], PublishConfig::default());

        let result = orchestrator.publish_ad(submission(&[])).await;

        assert!(matches!(
            result,
            Err(PublishCallError::InvalidArgument { .. })
        ));
        assert_eq!(x.calls(), 0);
    }

    #[tokio::test]
    async fn test_malformed_fields_are_invalid_argument() {
        let x = ScriptedAdapter::new("x", vec![Step::Succeed]);
        let orchestrator = orchestrator(&[x.clone()], PublishConfig::default());

        let mut image_without_url = submission(&["x"]);
        image_without_url.ad_type = AdType::Image;
        let mut bad_url = submission(&["x"]);
        bad_url.image_url = Some("not a url".to_string());
        let mut no_ad_id = submission(&["x"]);
        no_ad_id.ad_id = "  ".to_string();
        let bad_platform = submission(&["x", "Not Valid"]);

        for case in [image_without_url, bad_url, no_ad_id, bad_platform] {
            let result = orchestrator.publish_ad(case).await;
            assert!(matches!(
                result,
                Err(PublishCallError::InvalidArgument { .. })
            ));
        }
        assert_eq!(x.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mixed_success_unauthorized_and_timeout() {
        let a = ScriptedAdapter::new("x", vec![Step::Succeed]);
        let b = ScriptedAdapter::new("facebook", vec![Step::Fail(PublishErrorKind::Unauthorized)]);
        let c = ScriptedAdapter::new("linkedin", vec![Step::Delay(Duration::from_secs(60))]);
        let config = PublishConfig {
            platform_timeout: Duration::from_secs(15),
            ..Default::default()
        };
        let orchestrator = orchestrator(&[a.clone(), b.clone(), c.clone()], config);

        let report = orchestrator
            .publish_ad(submission(&["x", "facebook", "linkedin"]))
            .await
            .unwrap();

        assert_eq!(report.outcomes().len(), 3);
        assert!(report.any_succeeded());
        assert!(!report.all_succeeded());

        let unauthorized = &report.outcomes()[1];
        assert_eq!(unauthorized.error_kind(), Some(PublishErrorKind::Unauthorized));
        assert_eq!(unauthorized.attempts(), 1);
        assert_eq!(b.calls(), 1);

        let timed_out = &report.outcomes()[2];
        assert_eq!(timed_out.error_kind(), Some(PublishErrorKind::Timeout));
        assert!(!timed_out.is_success());
        assert_eq!(timed_out.external_post_id(), None);
        assert_eq!(timed_out.latency(), Duration::from_secs(15));
        assert_eq!(c.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_error_retried_once_then_succeeds() {
        let x = ScriptedAdapter::new(
            "x",
            vec![
                Step::Fail(PublishErrorKind::TransientNetworkError),
                Step::Succeed,
            ],
        );
        let orchestrator = orchestrator(&[x.clone()], PublishConfig::default());

        let report = orchestrator.publish_ad(submission(&["x"])).await.unwrap();

        let outcome = &report.outcomes()[0];
        assert!(outcome.is_success());
        assert_eq!(outcome.attempts(), 2);
        assert_eq!(x.calls(), 2);
        assert!(outcome.latency() >= Duration::from_millis(500));
        assert!(report.all_succeeded());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_retried_at_most_once() {
        let x = ScriptedAdapter::new("x", vec![Step::Fail(PublishErrorKind::RateLimited)]);
        let orchestrator = orchestrator(&[x.clone()], PublishConfig::default());

        let report = orchestrator.publish_ad(submission(&["x"])).await.unwrap();

        let outcome = &report.outcomes()[0];
        assert_eq!(outcome.error_kind(), Some(PublishErrorKind::RateLimited));
        assert_eq!(outcome.attempts(), 2);
        assert_eq!(x.calls(), 2);
        assert!(!report.any_succeeded());
    }

    #[tokio::test]
    async fn test_non_retryable_errors_are_final() {
        for kind in [
            PublishErrorKind::Unauthorized,
            PublishErrorKind::ValidationError,
            PublishErrorKind::PlatformRejected,
            PublishErrorKind::Unknown,
        ] {
            let x = ScriptedAdapter::new("x", vec![Step::Fail(kind), Step::Succeed]);
            let orchestrator = orchestrator(&[x.clone()], PublishConfig::default());

            let report = orchestrator.publish_ad(submission(&["x"])).await.unwrap();

            assert_eq!(report.outcomes()[0].error_kind(), Some(kind));
            assert_eq!(x.calls(), 1, "{} must not be retried", kind);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_platforms_run_concurrently() {
        let delay = Duration::from_secs(2);
        let adapters = [
            ScriptedAdapter::new("x", vec![Step::Delay(delay)]),
            ScriptedAdapter::new("facebook", vec![Step::Delay(delay)]),
            ScriptedAdapter::new("linkedin", vec![Step::Delay(delay)]),
        ];
        let orchestrator = orchestrator(&adapters, PublishConfig::default());

        let started = Instant::now();
        let report = orchestrator
            .publish_ad(submission(&["x", "facebook", "linkedin"]))
            .await
            .unwrap();
        let elapsed = started.elapsed();

        assert!(report.all_succeeded());
        assert!(elapsed >= delay);
        assert!(elapsed < delay * 2, "took {:?}, expected about {:?}", elapsed, delay);
    }

    #[tokio::test]
    async fn test_identical_input_yields_identical_report() {
        let adapters = [
            ScriptedAdapter::new("x", vec![Step::Succeed]),
            ScriptedAdapter::new("facebook", vec![Step::Fail(PublishErrorKind::PlatformRejected)]),
        ];
        let orchestrator = orchestrator(&adapters, PublishConfig::default());

        let first = orchestrator
            .publish_ad(submission(&["x", "facebook"]))
            .await
            .unwrap();
        let second = orchestrator
            .publish_ad(submission(&["x", "facebook"]))
            .await
            .unwrap();

        assert_ne!(first.report_id(), second.report_id());
        assert_eq!(first.fingerprint(), second.fingerprint());
    }

    #[tokio::test]
    async fn test_duplicate_platforms_published_once() {
        let x = ScriptedAdapter::new("x", vec![Step::Succeed]);
        let orchestrator = orchestrator(&[x.clone()], PublishConfig::default());

        let report = orchestrator
            .publish_ad(submission(&["x", "X", " x"]))
            .await
            .unwrap();

        assert_eq!(report.outcomes().len(), 1);
        assert_eq!(x.calls(), 1);
    }

    #[tokio::test]
    async fn test_credential_lookup_failure_is_platform_level() {
        let x = ScriptedAdapter::new("x", vec![Step::Succeed]);
        let orchestrator = orchestrator_with_credentials(
            &[x.clone()],
            PublishConfig::default(),
            FakeCredentials { fail: true },
        );

        let report = orchestrator.publish_ad(submission(&["x"])).await.unwrap();

        let outcome = &report.outcomes()[0];
        assert_eq!(outcome.error_kind(), Some(PublishErrorKind::Unknown));
        assert_eq!(outcome.attempts(), 0);
        assert_eq!(x.calls(), 0);
    }

    #[tokio::test]
    async fn test_panicking_adapter_does_not_affect_siblings() {
        let x = ScriptedAdapter::new("x", vec![Step::Panic]);
        let facebook = ScriptedAdapter::new("facebook", vec![Step::Succeed]);
        let orchestrator = orchestrator(&[x, facebook], PublishConfig::default());

        let report = orchestrator
            .publish_ad(submission(&["x", "facebook"]))
            .await
            .unwrap();

        assert_eq!(
            kinds(&report),
            vec![Some(PublishErrorKind::Unknown), None]
        );
        assert!(report.any_succeeded());
    }

    #[tokio::test(start_paused = true)]
    async fn test_overall_deadline_bounds_slow_platform() {
        let x = ScriptedAdapter::new("x", vec![Step::Delay(Duration::from_secs(10))]);
        let config = PublishConfig {
            platform_timeout: Duration::from_secs(15),
            overall_timeout: Some(Duration::from_secs(2)),
            ..Default::default()
        };
        let orchestrator = orchestrator(&[x], config);

        let report = orchestrator.publish_ad(submission(&["x"])).await.unwrap();

        let outcome = &report.outcomes()[0];
        assert_eq!(outcome.error_kind(), Some(PublishErrorKind::Timeout));
        assert_eq!(outcome.attempts(), 1);
        assert_eq!(outcome.latency(), Duration::from_secs(2));
    }

    #[test]
    fn test_default_deadline_covers_retries() {
        let config = PublishConfig::default();
        assert_eq!(config.overall_deadline(), Duration::from_millis(35_500));

        let explicit = PublishConfig {
            overall_timeout: Some(Duration::from_secs(1)),
            ..Default::default()
        };
        assert_eq!(explicit.overall_deadline(), Duration::from_secs(1));
    }
}
