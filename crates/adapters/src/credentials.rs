//! Credential store implementations
//!
//! Environment variables follow `{PREFIX}_{PLATFORM}_{OWNER}_TOKEN`, falling
//! back to the platform-wide `{PREFIX}_{PLATFORM}_TOKEN`. The account id
//! (page or organization) resolves the same way from `..._ACCOUNT_ID`.

use ad_publisher_domain::{CredentialError, CredentialStore, PlatformCredentials, PlatformId};
use async_trait::async_trait;
use secrecy::SecretString;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

pub const DEFAULT_ENV_PREFIX: &str = "AD_PUBLISHER";

type EnvSource = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Credentials read from environment variables
#[derive(Clone)]
pub struct EnvCredentialStore {
    prefix: String,
    source: EnvSource,
}

impl EnvCredentialStore {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self::with_source(prefix, Arc::new(|key: &str| std::env::var(key).ok()))
    }

    /// Read variables from a custom source instead of the process environment
    pub fn with_source(prefix: impl Into<String>, source: EnvSource) -> Self {
        Self {
            prefix: normalize(&prefix.into()),
            source,
        }
    }

    /// Variable names checked for a token, most specific first
    pub fn token_vars(&self, owner_id: &str, platform: &PlatformId) -> [String; 2] {
        self.candidates(owner_id, platform, "TOKEN")
    }

    /// Variable names checked for an account id, most specific first
    pub fn account_id_vars(&self, owner_id: &str, platform: &PlatformId) -> [String; 2] {
        self.candidates(owner_id, platform, "ACCOUNT_ID")
    }

    /// Platform-wide token variable, shared by owners without their own
    pub fn platform_token_var(&self, platform: &PlatformId) -> String {
        format!("{}_{}_TOKEN", self.prefix, normalize(platform.as_str()))
    }

    pub fn has_platform_token(&self, platform: &PlatformId) -> bool {
        self.read(&self.platform_token_var(platform)).is_some()
    }

    fn candidates(&self, owner_id: &str, platform: &PlatformId, suffix: &str) -> [String; 2] {
        let platform = normalize(platform.as_str());
        [
            format!("{}_{}_{}_{}", self.prefix, platform, normalize(owner_id), suffix),
            format!("{}_{}_{}", self.prefix, platform, suffix),
        ]
    }

    fn read(&self, key: &str) -> Option<String> {
        (self.source)(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn first_of(&self, keys: &[String]) -> Option<String> {
        keys.iter().find_map(|key| self.read(key))
    }
}

impl std::fmt::Debug for EnvCredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvCredentialStore")
            .field("prefix", &self.prefix)
            .finish()
    }
}

/// Uppercase, with anything outside `[A-Z0-9]` turned into `_`
fn normalize(raw: &str) -> String {
    raw.trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}

#[async_trait]
impl CredentialStore for EnvCredentialStore {
    async fn lookup(
        &self,
        owner_id: &str,
        platform: &PlatformId,
    ) -> Result<Option<PlatformCredentials>, CredentialError> {
        let Some(token) = self.first_of(&self.token_vars(owner_id, platform)) else {
            tracing::debug!(owner_id, platform = %platform, "No token in environment");
            return Ok(None);
        };

        if token.chars().any(char::is_whitespace) {
            return Err(CredentialError::Malformed {
                platform: platform.to_string(),
                message: "token contains whitespace".to_string(),
            });
        }

        Ok(Some(PlatformCredentials {
            access_token: SecretString::new(token.into()),
            account_id: self.first_of(&self.account_id_vars(owner_id, platform)),
        }))
    }
}

/// Credentials held in memory, for tests and embedding
#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    by_owner: RwLock<HashMap<(String, PlatformId), PlatformCredentials>>,
    platform_wide: RwLock<HashMap<PlatformId, PlatformCredentials>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, owner_id: &str, platform: PlatformId, credentials: PlatformCredentials) {
        self.by_owner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert((owner_id.to_string(), platform), credentials);
    }

    /// Credentials used for any owner without their own
    pub fn insert_platform_wide(&self, platform: PlatformId, credentials: PlatformCredentials) {
        self.platform_wide
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(platform, credentials);
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn lookup(
        &self,
        owner_id: &str,
        platform: &PlatformId,
    ) -> Result<Option<PlatformCredentials>, CredentialError> {
        let by_owner = self
            .by_owner
            .read()
            .map_err(|e| CredentialError::Backend(e.to_string()))?;
        if let Some(credentials) = by_owner.get(&(owner_id.to_string(), platform.clone())) {
            return Ok(Some(credentials.clone()));
        }

        let platform_wide = self
            .platform_wide
            .read()
            .map_err(|e| CredentialError::Backend(e.to_string()))?;
        Ok(platform_wide.get(platform).cloned())
    }
}
