//! Builds adapters and stores from configuration

use ad_publisher_adapters::{
    credentials::EnvCredentialStore,
    facebook::{FacebookAdapter, FacebookAdapterConfig},
    linkedin::{LinkedInAdapter, LinkedInAdapterConfig},
    outbox::{OutboxAdapter, OutboxWriter},
    stub::{StubAdapter, StubBehavior},
    x::{DEFAULT_MAX_CHARS, XAdapter, XAdapterConfig},
};
use ad_publisher_domain::{
    AdType, AdapterRegistry, MediaPolicy, PlatformAdapter, PlatformId, platforms,
};
use anyhow::{Context, Result};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{AppConfig, PlatformConfig, PlatformMode};

/// Every platform this binary knows how to reach, with its settings
pub fn known_platforms(config: &AppConfig) -> [(PlatformId, &PlatformConfig); 3] {
    [
        (PlatformId::from_static(platforms::X), &config.platforms.x),
        (
            PlatformId::from_static(platforms::FACEBOOK),
            &config.platforms.facebook,
        ),
        (
            PlatformId::from_static(platforms::LINKEDIN),
            &config.platforms.linkedin,
        ),
    ]
}

/// Media policy of the real platform, shared by its stub and outbox stand-ins
pub fn media_policy(platform: &PlatformId, settings: &PlatformConfig) -> MediaPolicy {
    match platform.as_str() {
        platforms::X => XAdapter::media_policy(settings.max_chars.unwrap_or(DEFAULT_MAX_CHARS)),
        platforms::FACEBOOK => FacebookAdapter::media_policy(),
        platforms::LINKEDIN => LinkedInAdapter::media_policy(),
        _ => MediaPolicy::default(),
    }
}

/// Register an adapter for every enabled platform. With an outbox, every
/// platform queues to it instead of publishing.
pub fn build_registry(
    config: &AppConfig,
    outbox: Option<&OutboxWriter>,
) -> Result<AdapterRegistry> {
    let mut registry = AdapterRegistry::new();

    for (platform, settings) in known_platforms(config) {
        if !settings.enabled {
            tracing::debug!(platform = %platform, "Platform disabled");
            continue;
        }

        let policy = media_policy(&platform, settings);
        let adapter: Arc<dyn PlatformAdapter> = match outbox {
            Some(writer) => Arc::new(OutboxAdapter::new(writer.clone(), platform.clone(), policy)),
            None => match settings.mode {
                PlatformMode::Stub => Arc::new(build_stub(&platform, settings, policy)?),
                PlatformMode::Api => build_api_adapter(&platform, settings)?,
            },
        };

        let mode = if outbox.is_some() {
            "outbox"
        } else {
            settings.mode.as_str()
        };
        tracing::debug!(platform = %platform, mode, "Registered adapter");
        registry.register(adapter);
    }

    Ok(registry)
}

fn build_stub(
    platform: &PlatformId,
    settings: &PlatformConfig,
    policy: MediaPolicy,
) -> Result<StubAdapter> {
    let behavior: StubBehavior = settings
        .stub_outcome
        .parse()
        .map_err(anyhow::Error::msg)
        .with_context(|| format!("Invalid stub_outcome for {}", platform))?;

    Ok(StubAdapter::new(platform.clone(), behavior)
        .with_policy(policy)
        .with_delay(Duration::from_millis(settings.stub_delay_ms)))
}

fn build_api_adapter(
    platform: &PlatformId,
    settings: &PlatformConfig,
) -> Result<Arc<dyn PlatformAdapter>> {
    let adapter: Arc<dyn PlatformAdapter> = match platform.as_str() {
        platforms::X => {
            let mut adapter_config = XAdapterConfig::default();
            if let Some(base_url) = &settings.base_url {
                adapter_config.base_url = base_url.clone();
            }
            if let Some(max_chars) = settings.max_chars {
                adapter_config.max_chars = max_chars;
            }
            Arc::new(XAdapter::new(adapter_config).context("Failed to build X client")?)
        }
        platforms::FACEBOOK => {
            let mut adapter_config = FacebookAdapterConfig::default();
            if let Some(base_url) = &settings.base_url {
                adapter_config.base_url = base_url.clone();
            }
            if let Some(api_version) = &settings.api_version {
                adapter_config.api_version = api_version.clone();
            }
            Arc::new(
                FacebookAdapter::new(adapter_config)
                    .context("Failed to build Facebook client")?,
            )
        }
        platforms::LINKEDIN => {
            let mut adapter_config = LinkedInAdapterConfig::default();
            if let Some(base_url) = &settings.base_url {
                adapter_config.base_url = base_url.clone();
            }
            if let Some(api_version) = &settings.api_version {
                adapter_config.api_version = api_version.clone();
            }
            Arc::new(
                LinkedInAdapter::new(adapter_config)
                    .context("Failed to build LinkedIn client")?,
            )
        }
        other => anyhow::bail!("No API adapter for platform {}", other),
    };
    Ok(adapter)
}

pub fn credential_store(config: &AppConfig) -> EnvCredentialStore {
    EnvCredentialStore::new(config.credentials.env_prefix.clone())
}

/// One line of the platform listing
#[derive(Debug, Serialize)]
pub struct PlatformStatus {
    pub platform: PlatformId,
    pub enabled: bool,
    pub mode: &'static str,
    /// Platform-wide token present; owner-specific tokens are not checked
    pub shared_token: bool,
    /// Empty when the platform is disabled
    pub ad_types: Vec<AdType>,
    pub max_text_chars: Option<usize>,
}

/// Describe every known platform, reading media rules from the registered
/// adapters
pub fn platform_statuses(config: &AppConfig) -> Result<Vec<PlatformStatus>> {
    let registry = build_registry(config, None)?;
    let credentials = credential_store(config);

    let statuses = known_platforms(config)
        .into_iter()
        .map(|(platform, settings)| {
            let policy = registry.get(&platform).map(|adapter| adapter.policy());
            PlatformStatus {
                enabled: settings.enabled,
                mode: settings.mode.as_str(),
                shared_token: credentials.has_platform_token(&platform),
                ad_types: policy
                    .map(|policy| policy.supported_ad_types.clone())
                    .unwrap_or_default(),
                max_text_chars: policy.and_then(|policy| policy.max_text_chars),
                platform,
            }
        })
        .collect();

    Ok(statuses)
}
