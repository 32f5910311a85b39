//! X (Twitter) API v2 adapter for publishing posts

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

pub const DEFAULT_BASE_URL: &str = "https://api.twitter.com";
pub const DEFAULT_MAX_CHARS: usize = 280;

#[derive(Debug, Clone)]
pub struct XAdapterConfig {
    pub base_url: String,
    pub max_chars: usize,
    pub request_timeout: Duration,
}

impl Default for XAdapterConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            max_chars: DEFAULT_MAX_CHARS,
            request_timeout: http::DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// X API adapter creating posts with the user's OAuth 2.0 token
pub struct XAdapter {
    client: Client,
    platform: PlatformId,
    policy: MediaPolicy,
    base_url: String,
}

impl XAdapter {
    pub fn new(config: XAdapterConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: http::build_client(config.request_timeout)?,
            platform: PlatformId::from_static(platforms::X),
            policy: Self::media_policy(config.max_chars),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// X takes every ad type; media is shared as a link in the post text
    pub fn media_policy(max_chars: usize) -> MediaPolicy {
        MediaPolicy {
            supported_ad_types: vec![AdType::Text, AdType::Image, AdType::Video],
            max_text_chars: Some(max_chars),
            requires_text: true,
        }
    }
}

/// Post text as sent: the creative content followed by the media link
pub fn compose_text(creative: &AdCreative) -> String {
    let content = creative.content.trim();
    match creative.media_url() {
        Some(url) if content.is_empty() => url.to_string(),
        Some(url) => format!("{}\n\n{}", content, url),
        None => content.to_string(),
    }
}

#[derive(Serialize)]
struct CreateTweetRequest<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct CreateTweetResponse {
    data: TweetData,
}

#[derive(Deserialize)]
struct TweetData {
    id: String,
}

#[async_trait]
impl PlatformAdapter for XAdapter {
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
        let text = compose_text(creative);
        self.policy.check(creative, &text)?;
        let credentials = http::require_credentials(&self.platform, credentials)?;

        let url = format!("{}/2/tweets", self.base_url);

        let response = self
            .client
            .post(&url)
            .header(
                "Authorization",
                format!("Bearer {}", credentials.access_token.expose_secret()),
            )
            .json(&CreateTweetRequest { text: &text })
            .send()
            .await
            .map_err(http::map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            // X answers duplicate posts with 403; that is content, not auth
            if status == StatusCode::FORBIDDEN && body.to_lowercase().contains("duplicate") {
                return Err(PlatformError::Rejected(format!(
                    "duplicate content: {}",
                    http::truncate(&body)
                )));
            }
            return Err(http::classify_status(status, &body));
        }

        let tweet: CreateTweetResponse = response.json().await.map_err(|e| {
            PlatformError::Unknown(format!("unexpected create-post response: {}", e))
        })?;

        Ok(PublishedPost {
            url: Some(format!("https://x.com/i/status/{}", tweet.data.id)),
            id: tweet.data.id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ad_publisher_domain::PublishErrorKind;
    use secrecy::SecretString;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn credentials() -> PlatformCredentials {
        PlatformCredentials {
            access_token: SecretString::new("test-token".into()),
            account_id: None,
        }
    }

    fn creative(ad_type: AdType, content: &str, media: Option<&str>) -> AdCreative {
        AdCreative {
            content: content.to_string(),
            image_url: if ad_type == AdType::Image { media.map(String::from) } else { None },
            video_url: if ad_type == AdType::Video { media.map(String::from) } else { None },
            ad_type,
        }
    }

    fn adapter(base_url: String, max_chars: usize) -> XAdapter {
        XAdapter::new(XAdapterConfig {
            base_url,
            max_chars,
            ..Default::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_publish_text_success() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/2/tweets"))
            .and(header("Authorization", "Bearer test-token"))
            .and(body_json(serde_json::json!({ "text": "Summer sale" })))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "data": { "id": "1790000000000000000", "text": "Summer sale" }
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let adapter = adapter(mock_server.uri(), 280);
        let post = adapter
            .publish(&creative(AdType::Text, "Summer sale", None), Some(&credentials()))
            .await
            .unwrap();

        assert_eq!(post.id, "1790000000000000000");
        assert_eq!(
            post.url.as_deref(),
            Some("https://x.com/i/status/1790000000000000000")
        );
    }

    #[tokio::test]
    async fn test_publish_image_appends_link() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/2/tweets"))
            .and(body_json(serde_json::json!({
                "text": "New arrivals\n\nhttps://cdn.example.com/a.png"
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "data": { "id": "42" }
            })))
            .mount(&mock_server)
            .await;

        let adapter = adapter(mock_server.uri(), 280);
        let post = adapter
            .publish(
                &creative(
                    AdType::Image,
                    "New arrivals",
                    Some("https://cdn.example.com/a.png"),
                ),
                Some(&credentials()),
            )
            .await
            .unwrap();

        assert_eq!(post.id, "42");
    }

    #[tokio::test]
    async fn test_content_too_long_never_calls_api() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201))
            .expect(0)
            .mount(&mock_server)
            .await;

        let adapter = adapter(mock_server.uri(), 10);
        let result = adapter
            .publish(
                &creative(AdType::Text, "This is far too long for ten", None),
                Some(&credentials()),
            )
            .await;

        assert_eq!(result.unwrap_err().kind(), PublishErrorKind::ValidationError);
    }

    #[tokio::test]
    async fn test_missing_credentials_is_unauthorized() {
        let adapter = adapter("http://127.0.0.1:9".to_string(), 280);
        let result = adapter
            .publish(&creative(AdType::Text, "Hello", None), None)
            .await;

        assert_eq!(result.unwrap_err().kind(), PublishErrorKind::Unauthorized);
    }

    #[tokio::test]
    async fn test_publish_rate_limited() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/2/tweets"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&mock_server)
            .await;

        let adapter = adapter(mock_server.uri(), 280);
        let result = adapter
            .publish(&creative(AdType::Text, "Hello", None), Some(&credentials()))
            .await;

        assert_eq!(result.unwrap_err().kind(), PublishErrorKind::RateLimited);
    }

    #[tokio::test]
    async fn test_expired_token_is_unauthorized() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/2/tweets"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Unauthorized"))
            .mount(&mock_server)
            .await;

        let adapter = adapter(mock_server.uri(), 280);
        let result = adapter
            .publish(&creative(AdType::Text, "Hello", None), Some(&credentials()))
            .await;

        assert_eq!(result.unwrap_err().kind(), PublishErrorKind::Unauthorized);
    }

    #[tokio::test]
    async fn test_duplicate_content_is_rejected() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/2/tweets"))
            .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
                "detail": "You are not allowed to create a Tweet with duplicate content."
            })))
            .mount(&mock_server)
            .await;

        let adapter = adapter(mock_server.uri(), 280);
        let result = adapter
            .publish(&creative(AdType::Text, "Hello", None), Some(&credentials()))
            .await;

        assert_eq!(result.unwrap_err().kind(), PublishErrorKind::PlatformRejected);
    }

    #[tokio::test]
    async fn test_server_error_is_transient() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/2/tweets"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&mock_server)
            .await;

        let adapter = adapter(mock_server.uri(), 280);
        let result = adapter
            .publish(&creative(AdType::Text, "Hello", None), Some(&credentials()))
            .await;

        assert_eq!(
            result.unwrap_err().kind(),
            PublishErrorKind::TransientNetworkError
        );
    }

    #[test]
    fn test_compose_text_media_only() {
        let text = compose_text(&creative(
            AdType::Video,
            "  ",
            Some("https://cdn.example.com/v.mp4"),
        ));
        assert_eq!(text, "https://cdn.example.com/v.mp4");
    }
}
