//! Outbox adapter for require-approval mode.
//!
//! Instead of posting, every accepted creative is appended as one JSON line
//! to an outbox file for a human to review and send.

use ad_publisher_domain::{
    AdCreative, AdType, MediaPolicy, PlatformAdapter, PlatformCredentials, PlatformError,
    PlatformId, PublishedPost,
};
use async_trait::async_trait;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum OutboxError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Shared append-only JSONL writer; clones write to the same file
#[derive(Debug, Clone)]
pub struct OutboxWriter {
    path: PathBuf,
    file: Arc<Mutex<tokio::fs::File>>,
}

impl OutboxWriter {
    pub async fn new(path: PathBuf) -> Result<Self, OutboxError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        Ok(Self {
            path,
            file: Arc::new(Mutex::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn append(&self, entry: &OutboxEntry<'_>) -> Result<(), OutboxError> {
        let line = serde_json::to_string(entry)?;
        let mut file = self.file.lock().await;
        file.write_all(line.as_bytes()).await?;
        file.write_all(b"\n").await?;
        file.flush().await?;
        Ok(())
    }
}

/// Stands in for a platform adapter, queueing instead of publishing
#[derive(Debug, Clone)]
pub struct OutboxAdapter {
    writer: OutboxWriter,
    platform: PlatformId,
    policy: MediaPolicy,
}

impl OutboxAdapter {
    /// `policy` should be the real platform's, so queued entries are ones the
    /// platform would accept
    pub fn new(writer: OutboxWriter, platform: PlatformId, policy: MediaPolicy) -> Self {
        Self {
            writer,
            platform,
            policy,
        }
    }
}

#[derive(Serialize)]
struct OutboxEntry<'a> {
    entry_id: String,
    platform: &'a str,
    ad_type: AdType,
    content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    media_url: Option<&'a str>,
    #[serde(with = "time::serde::rfc3339")]
    queued_at: OffsetDateTime,
}

#[async_trait]
impl PlatformAdapter for OutboxAdapter {
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
        self.policy.check(creative, &creative.content)?;

        let entry = OutboxEntry {
            entry_id: Uuid::new_v4().to_string(),
            platform: self.platform.as_str(),
            ad_type: creative.ad_type,
            content: &creative.content,
            media_url: creative.media_url(),
            queued_at: OffsetDateTime::now_utc(),
        };

        self.writer
            .append(&entry)
            .await
            .map_err(|error| PlatformError::Unknown(format!("Outbox write failed: {}", error)))?;

        tracing::info!(
            platform = %self.platform,
            entry_id = %entry.entry_id,
            outbox = %self.writer.path().display(),
            "Queued ad for approval"
        );

        Ok(PublishedPost {
            id: entry.entry_id,
            url: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ad_publisher_domain::PublishErrorKind;
    use serde_json::Value;
    use tempfile::TempDir;

    #[tokio::test]
    async fn outbox_adapter_writes_jsonl_entry() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("queue").join("outbox.jsonl");

        let writer = OutboxWriter::new(path.clone()).await.expect("writer");
        let adapter = OutboxAdapter::new(
            writer,
            PlatformId::from_static("facebook"),
            MediaPolicy::default(),
        );

        let creative = AdCreative {
            content: "Spring collection".to_string(),
            image_url: Some("https://cdn.example.com/spring.jpg".to_string()),
            video_url: None,
            ad_type: AdType::Image,
        };

        let post = adapter.publish(&creative, None).await.expect("publish");
        assert!(!post.id.is_empty());
        assert!(post.url.is_none());

        let contents = tokio::fs::read_to_string(&path).await.expect("read outbox");
        let line = contents.trim();
        let value: Value = serde_json::from_str(line).expect("valid json");

        assert_eq!(value["entry_id"], post.id.as_str());
        assert_eq!(value["platform"], "facebook");
        assert_eq!(value["ad_type"], "image");
        assert_eq!(value["content"], "Spring collection");
        assert_eq!(value["media_url"], "https://cdn.example.com/spring.jpg");
    }

    #[tokio::test]
    async fn outbox_adapter_applies_platform_policy() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("outbox.jsonl");

        let writer = OutboxWriter::new(path.clone()).await.expect("writer");
        let adapter = OutboxAdapter::new(
            writer,
            PlatformId::from_static("linkedin"),
            MediaPolicy {
                supported_ad_types: vec![AdType::Text, AdType::Image],
                max_text_chars: None,
                requires_text: true,
            },
        );

        let creative = AdCreative {
            content: "Watch".to_string(),
            image_url: None,
            video_url: Some("https://cdn.example.com/v.mp4".to_string()),
            ad_type: AdType::Video,
        };

        let error = adapter.publish(&creative, None).await.unwrap_err();
        assert_eq!(error.kind(), PublishErrorKind::ValidationError);

        let contents = tokio::fs::read_to_string(&path).await.expect("read outbox");
        assert!(contents.is_empty());
    }
}
