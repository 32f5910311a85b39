//! LinkedIn Posts API adapter publishing as an organization

use ad_publisher_domain::{
    AdCreative, AdType, MediaPolicy, PlatformAdapter, PlatformCredentials, PlatformError,
    PlatformId, PublishedPost, platforms,
};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::Serialize;
use std::time::Duration;

use crate::http;

pub const DEFAULT_BASE_URL: &str = "https://api.linkedin.com";
pub const DEFAULT_API_VERSION: &str = "202401";
pub const MAX_COMMENTARY_CHARS: usize = 3_000;

#[derive(Debug, Clone)]
pub struct LinkedInAdapterConfig {
    pub base_url: String,
    /// Value of the `LinkedIn-Version` header (YYYYMM)
    pub api_version: String,
    pub request_timeout: Duration,
}

impl Default for LinkedInAdapterConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            request_timeout: http::DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

pub struct LinkedInAdapter {
    client: Client,
    platform: PlatformId,
    policy: MediaPolicy,
    base_url: String,
    api_version: String,
}

impl LinkedInAdapter {
    pub fn new(config: LinkedInAdapterConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: http::build_client(config.request_timeout)?,
            platform: PlatformId::from_static(platforms::LINKEDIN),
            policy: Self::media_policy(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_version: config.api_version,
        })
    }

    /// Video needs LinkedIn's multi-step upload flow, which is not supported
    pub fn media_policy() -> MediaPolicy {
        MediaPolicy {
            supported_ad_types: vec![AdType::Text, AdType::Image],
            max_text_chars: Some(MAX_COMMENTARY_CHARS),
            requires_text: true,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreatePostRequest<'a> {
    author: String,
    commentary: &'a str,
    visibility: &'static str,
    distribution: Distribution,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<PostContent<'a>>,
    lifecycle_state: &'static str,
    is_reshare_disabled_by_author: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Distribution {
    feed_distribution: &'static str,
    target_entities: Vec<String>,
    third_party_distribution_channels: Vec<String>,
}

#[derive(Serialize)]
struct PostContent<'a> {
    article: Article<'a>,
}

#[derive(Serialize)]
struct Article<'a> {
    source: &'a str,
    title: &'a str,
}

#[async_trait]
impl PlatformAdapter for LinkedInAdapter {
    fn platform(&self) -> &PlatformId {
        &self.platform
    }

    fn policy(&self) -> &MediaPolicy {
        &self.policy
    }

    async fn publish(
        &self,
        creative: &AdCreative,
        credentials: Option<&PlatformCredentials>,
    ) -> Result<PublishedPost, PlatformError> {
        self.policy.check(creative, &creative.content)?;
        let credentials = http::require_credentials(&self.platform, credentials)?;
        let organization_id = http::require_account_id(&self.platform, credentials)?;

        let commentary = creative.content.trim();
        let request = CreatePostRequest {
            author: format!("urn:li:organization:{}", organization_id),
            commentary,
            visibility: "PUBLIC",
            distribution: Distribution {
                feed_distribution: "MAIN_FEED",
                target_entities: vec![],
                third_party_distribution_channels: vec![],
            },
            content: creative.media_url().map(|source| PostContent {
                article: Article {
                    source,
                    title: commentary,
                },
            }),
            lifecycle_state: "PUBLISHED",
            is_reshare_disabled_by_author: false,
        };

        let response = self
            .client
            .post(format!("{}/rest/posts", self.base_url))
            .header(
                "Authorization",
                format!("Bearer {}", credentials.access_token.expose_secret()),
            )
            .header("LinkedIn-Version", &self.api_version)
            .header("X-Restli-Protocol-Version", "2.0.0")
            .json(&request)
            .send()
            .await
            .map_err(http::map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(http::classify_status(status, &body));
        }

        // The created post URN comes back in a header; the body is empty
        let urn = response
            .headers()
            .get("x-restli-id")
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| {
                PlatformError::Unknown("LinkedIn accepted the post but sent no post id".to_string())
            })?;

        Ok(PublishedPost {
            url: Some(format!("https://www.linkedin.com/feed/update/{}", urn)),
            id: urn,
        })
    }
}
