//! Facebook Graph API adapter publishing to a page
//!
//! Text ads go to the page feed, image ads to `/photos` and video ads to
//! `/videos`. The page id comes from the credentials' account id and the
//! access token must be a page token.

use ad_publisher_domain::{
    AdCreative, AdType, MediaPolicy, PlatformAdapter, PlatformCredentials, PlatformError,
    PlatformId, PublishedPost, platforms,
};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::http;

pub const DEFAULT_BASE_URL: &str = "https://graph.facebook.com";
pub const DEFAULT_API_VERSION: &str = "v19.0";
pub const MAX_POST_CHARS: usize = 63_206;

#[derive(Debug, Clone)]
pub struct FacebookAdapterConfig {
    pub base_url: String,
    pub api_version: String,
    pub request_timeout: Duration,
}

impl Default for FacebookAdapterConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            request_timeout: http::DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

pub struct FacebookAdapter {
    client: Client,
    platform: PlatformId,
    policy: MediaPolicy,
    base_url: String,
    api_version: String,
}

impl FacebookAdapter {
    pub fn new(config: FacebookAdapterConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: http::build_client(config.request_timeout)?,
            platform: PlatformId::from_static(platforms::FACEBOOK),
            policy: Self::media_policy(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_version: config.api_version,
        })
    }

    /// Pages accept every ad type; photos and videos may go out without a caption
    pub fn media_policy() -> MediaPolicy {
        MediaPolicy {
            supported_ad_types: vec![AdType::Text, AdType::Image, AdType::Video],
            max_text_chars: Some(MAX_POST_CHARS),
            requires_text: false,
        }
    }

    fn endpoint(&self, page_id: &str, ad_type: AdType) -> String {
        let edge = match ad_type {
            AdType::Text => "feed",
            AdType::Image => "photos",
            AdType::Video => "videos",
        };
        format!("{}/{}/{}/{}", self.base_url, self.api_version, page_id, edge)
    }
}

#[derive(Serialize, Default)]
struct GraphPostRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    caption: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    file_url: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
}

impl<'a> GraphPostRequest<'a> {
    fn for_creative(creative: &'a AdCreative) -> Self {
        let text = Some(creative.content.trim()).filter(|t| !t.is_empty());
        match creative.ad_type {
            AdType::Text => Self {
                message: text,
                ..Default::default()
            },
            AdType::Image => Self {
                url: creative.image_url.as_deref(),
                caption: text,
                ..Default::default()
            },
            AdType::Video => Self {
                file_url: creative.video_url.as_deref(),
                description: text,
                ..Default::default()
            },
        }
    }
}

#[derive(Deserialize)]
struct GraphPostResponse {
    id: String,
    /// Set for photos: the feed story wrapping the uploaded photo
    #[serde(default)]
    post_id: Option<String>,
}

#[derive(Deserialize)]
struct GraphErrorEnvelope {
    error: GraphError,
}

#[derive(Deserialize)]
struct GraphError {
    message: String,
    #[serde(default)]
    code: Option<i64>,
}

/// Graph API errors carry their own codes, which are more telling than the
/// HTTP status
fn classify_graph_error(status: StatusCode, body: &str) -> PlatformError {
    let Ok(envelope) = serde_json::from_str::<GraphErrorEnvelope>(body) else {
        return http::classify_status(status, body);
    };
    let error = envelope.error;
    let message = match error.code {
        Some(code) => format!("Graph error {}: {}", code, error.message),
        None => format!("Graph error: {}", error.message),
    };

    match error.code {
        Some(190 | 102) => PlatformError::Unauthorized(message),
        Some(4 | 17 | 32 | 613) => PlatformError::RateLimited(message),
        Some(1 | 2) => PlatformError::TransientNetwork(message),
        _ if status.is_server_error() => PlatformError::TransientNetwork(message),
        _ => PlatformError::Rejected(message),
    }
}

#[async_trait]
impl PlatformAdapter for FacebookAdapter {
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
        let page_id = http::require_account_id(&self.platform, credentials)?;

        let response = self
            .client
            .post(self.endpoint(page_id, creative.ad_type))
            .header(
                "Authorization",
                format!("Bearer {}", credentials.access_token.expose_secret()),
            )
            .json(&GraphPostRequest::for_creative(creative))
            .send()
            .await
            .map_err(http::map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_graph_error(status, &body));
        }

        let created: GraphPostResponse = response
            .json()
            .await
            .map_err(|e| PlatformError::Unknown(format!("unexpected Graph response: {}", e)))?;

        let id = created.post_id.unwrap_or(created.id);
        Ok(PublishedPost {
            url: Some(format!("https://www.facebook.com/{}", id)),
            id,
        })
    }
}
