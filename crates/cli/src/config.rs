//! Configuration loading and management

use ad_publisher_adapters::credentials::DEFAULT_ENV_PREFIX;
use ad_publisher_domain::usecases::{PublishConfig, RetryPolicy};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub publish: PublishSettings,

    #[serde(default)]
    pub credentials: CredentialsConfig,

    #[serde(default)]
    pub platforms: PlatformsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_state_db_path")]
    pub state_db_path: PathBuf,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Update ad status and history after publishing
    #[serde(default = "default_true")]
    pub record_state: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishSettings {
    #[serde(default = "default_platform_timeout")]
    pub platform_timeout_secs: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_ms: u64,

    /// Ceiling per platform task; derived from the settings above if unset
    #[serde(default)]
    pub overall_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialsConfig {
    #[serde(default = "default_env_prefix")]
    pub env_prefix: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlatformsConfig {
    #[serde(default)]
    pub x: PlatformConfig,

    #[serde(default)]
    pub facebook: PlatformConfig,

    #[serde(default)]
    pub linkedin: PlatformConfig,
}

/// How a platform is reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlatformMode {
    #[default]
    Api,
    Stub,
}

impl PlatformMode {
    pub fn as_str(self) -> &'static str {
        match self {
            PlatformMode::Api => "api",
            PlatformMode::Stub => "stub",
        }
    }
}

/// Per-platform settings; unset values fall back to the platform's defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub mode: PlatformMode,

    #[serde(default)]
    pub base_url: Option<String>,

    /// Graph API version (facebook) or LinkedIn-Version header (linkedin)
    #[serde(default)]
    pub api_version: Option<String>,

    /// Post length limit (x)
    #[serde(default)]
    pub max_chars: Option<usize>,

    /// Stub answer: `success` or an error kind such as `rate_limited`
    #[serde(default = "default_stub_outcome")]
    pub stub_outcome: String,

    #[serde(default)]
    pub stub_delay_ms: u64,
}

// Default value functions
fn default_state_db_path() -> PathBuf {
    PathBuf::from("./ad-publisher.sqlite")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_platform_timeout() -> u64 {
    15
}

fn default_max_retries() -> u32 {
    1
}

fn default_retry_backoff() -> u64 {
    500
}

fn default_env_prefix() -> String {
    DEFAULT_ENV_PREFIX.to_string()
}

fn default_stub_outcome() -> String {
    "success".to_string()
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            state_db_path: default_state_db_path(),
            log_level: default_log_level(),
            record_state: default_true(),
        }
    }
}

impl Default for PublishSettings {
    fn default() -> Self {
        Self {
            platform_timeout_secs: default_platform_timeout(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff(),
            overall_timeout_secs: None,
        }
    }
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            env_prefix: default_env_prefix(),
        }
    }
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            mode: PlatformMode::default(),
            base_url: None,
            api_version: None,
            max_chars: None,
            stub_outcome: default_stub_outcome(),
            stub_delay_ms: 0,
        }
    }
}

impl PublishSettings {
    pub fn to_publish_config(&self) -> PublishConfig {
        PublishConfig {
            platform_timeout: Duration::from_secs(self.platform_timeout_secs),
            retry: RetryPolicy {
                max_retries: self.max_retries,
                backoff: Duration::from_millis(self.retry_backoff_ms),
            },
            overall_timeout: self.overall_timeout_secs.map(Duration::from_secs),
        }
    }
}

impl AppConfig {
    /// Load configuration from file and environment
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        // Try default config path if none specified
        let default_path = PathBuf::from("./config.toml");
        let path = config_path.unwrap_or(&default_path);

        if path.exists() {
            builder = builder.add_source(config::File::from(path));
        } else if config_path.is_some() {
            // User specified a path that doesn't exist
            anyhow::bail!("Config file not found: {}", path.display());
        }

        // Add environment variable overrides
        builder = builder.add_source(
            config::Environment::with_prefix("AD_PUBLISHER")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Generate example configuration as TOML string
    pub fn example_toml() -> String {
        r#"# ad-publisher configuration

[general]
state_db_path = "./ad-publisher.sqlite"
log_level = "info"
# Update ad status and publish history after each publish
record_state = true

[publish]
platform_timeout_secs = 15
max_retries = 1
retry_backoff_ms = 500
# Defaults to timeout * (retries + 1) + backoff * retries + 5s
# overall_timeout_secs = 40

[credentials]
# Tokens are read from {PREFIX}_{PLATFORM}_{OWNER}_TOKEN, falling back to
# {PREFIX}_{PLATFORM}_TOKEN. Page/organization ids from ..._ACCOUNT_ID.
env_prefix = "AD_PUBLISHER"

[platforms.x]
enabled = true
mode = "api"  # api, stub
# base_url = "https://api.twitter.com"
max_chars = 280

[platforms.facebook]
enabled = true
mode = "api"
# base_url = "https://graph.facebook.com"
api_version = "v19.0"

[platforms.linkedin]
enabled = true
mode = "stub"
# Stub answer: success, unauthorized, rate_limited, validation_error, timeout,
# transient_network_error, platform_rejected, unknown
stub_outcome = "success"
stub_delay_ms = 200
# api_version = "202401"
"#
        .to_string()
    }
}
