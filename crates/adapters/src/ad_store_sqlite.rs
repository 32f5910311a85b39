//! SQLite ad store implementation

use ad_publisher_domain::{
    AdRecord, AdStatus, AdStore, PublishHistoryEntry, PublishReport, StoreError,
};
use async_trait::async_trait;
use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};
use std::path::Path;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use uuid::Uuid;

/// SQLite-backed ad store
pub struct SqliteAdStore {
    pool: SqlitePool,
}

impl SqliteAdStore {
    /// Create a new SQLite ad store, initializing the database if needed
    pub async fn new(db_path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db_path = db_path.as_ref();

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StoreError::Database(format!("Failed to create directory: {}", e))
                })?;
            }
        }

        let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&db_url)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let store = Self { pool };
        store.run_migrations().await?;

        Ok(store)
    }

    /// Create an in-memory SQLite store (for testing)
    pub async fn in_memory() -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let store = Self { pool };
        store.run_migrations().await?;

        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS ads (
                ad_id TEXT PRIMARY KEY,
                campaign_id TEXT NOT NULL,
                status TEXT NOT NULL,
                published_at TEXT,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS publish_history (
                report_id TEXT PRIMARY KEY,
                ad_id TEXT NOT NULL,
                any_succeeded INTEGER NOT NULL,
                all_succeeded INTEGER NOT NULL,
                report_json TEXT NOT NULL,
                completed_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_publish_history_ad
            ON publish_history(ad_id)
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }
}

fn format_time(at: OffsetDateTime) -> Result<String, StoreError> {
    at.format(&Rfc3339)
        .map_err(|e| StoreError::Serialization(e.to_string()))
}

fn parse_time(raw: &str) -> Result<OffsetDateTime, StoreError> {
    OffsetDateTime::parse(raw, &Rfc3339).map_err(|e| StoreError::Serialization(e.to_string()))
}

#[async_trait]
impl AdStore for SqliteAdStore {
    async fn get_ad(&self, ad_id: &str) -> Result<Option<AdRecord>, StoreError> {
        let row: Option<(String, String, String, Option<String>, String)> = sqlx::query_as(
            "SELECT ad_id, campaign_id, status, published_at, updated_at FROM ads WHERE ad_id = ?",
        )
        .bind(ad_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        match row {
            Some((ad_id, campaign_id, status, published_at, updated_at)) => {
                let status: AdStatus = status.parse().map_err(StoreError::Serialization)?;
                let published_at = published_at.as_deref().map(parse_time).transpose()?;

                Ok(Some(AdRecord {
                    ad_id,
                    campaign_id,
                    status,
                    published_at,
                    updated_at: parse_time(&updated_at)?,
                }))
            }
            None => Ok(None),
        }
    }

    async fn mark_published(
        &self,
        ad_id: &str,
        campaign_id: &str,
        published_at: OffsetDateTime,
    ) -> Result<(), StoreError> {
        let published_at_str = format_time(published_at)?;

        sqlx::query(
            r#"
            INSERT INTO ads (ad_id, campaign_id, status, published_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(ad_id) DO UPDATE SET
                status = excluded.status,
                published_at = COALESCE(ads.published_at, excluded.published_at),
                updated_at = excluded.updated_at
            "#,
        )
        .bind(ad_id)
        .bind(campaign_id)
        .bind(AdStatus::Published.as_str())
        .bind(&published_at_str)
        .bind(&published_at_str)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }

    async fn record_report(&self, report: &PublishReport) -> Result<(), StoreError> {
        let report_json =
            serde_json::to_string(report).map_err(|e| StoreError::Serialization(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO publish_history
            (report_id, ad_id, any_succeeded, all_succeeded, report_json, completed_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(report.report_id().to_string())
        .bind(report.ad_id())
        .bind(report.any_succeeded())
        .bind(report.all_succeeded())
        .bind(&report_json)
        .bind(format_time(report.completed_at())?)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }

    async fn history(&self, ad_id: &str) -> Result<Vec<PublishHistoryEntry>, StoreError> {
        let rows: Vec<(String, String, bool, bool, String, String)> = sqlx::query_as(
            r#"
            SELECT report_id, ad_id, any_succeeded, all_succeeded, report_json, completed_at
            FROM publish_history
            WHERE ad_id = ?
            ORDER BY rowid DESC
            "#,
        )
        .bind(ad_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        rows.into_iter()
            .map(
                |(report_id, ad_id, any_succeeded, all_succeeded, report_json, completed_at)| {
                    Ok(PublishHistoryEntry {
                        report_id: Uuid::parse_str(&report_id)
                            .map_err(|e| StoreError::Serialization(e.to_string()))?,
                        ad_id,
                        any_succeeded,
                        all_succeeded,
                        completed_at: parse_time(&completed_at)?,
                        report: serde_json::from_str(&report_json)
                            .map_err(|e| StoreError::Serialization(e.to_string()))?,
                    })
                },
            )
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ad_publisher_domain::{PlatformId, PlatformOutcome, PublishErrorKind, PublishedPost};
    use std::time::Duration;
    use tempfile::TempDir;
    use time::macros::datetime;

    fn report(ad_id: &str, success: bool, completed_at: OffsetDateTime) -> PublishReport {
        let outcome = if success {
            PlatformOutcome::succeeded(
                PlatformId::from_static("x"),
                PublishedPost {
                    id: "123".to_string(),
                    url: None,
                },
                1,
                Duration::from_millis(40),
            )
        } else {
            PlatformOutcome::failed(
                PlatformId::from_static("x"),
                PublishErrorKind::RateLimited,
                "slow down",
                2,
                Duration::from_millis(900),
            )
        };
        PublishReport::new(ad_id, "camp-1", vec![outcome], completed_at)
    }

    #[tokio::test]
    async fn test_mark_published_creates_record() {
        let store = SqliteAdStore::in_memory().await.unwrap();
        let at = datetime!(2024-05-01 12:00 UTC);

        assert!(store.get_ad("ad-1").await.unwrap().is_none());
        store.mark_published("ad-1", "camp-1", at).await.unwrap();

        let ad = store.get_ad("ad-1").await.unwrap().unwrap();
        assert_eq!(ad.status, AdStatus::Published);
        assert_eq!(ad.campaign_id, "camp-1");
        assert_eq!(ad.published_at, Some(at));
    }

    #[tokio::test]
    async fn test_republish_keeps_first_publish_time() {
        let store = SqliteAdStore::in_memory().await.unwrap();
        let first = datetime!(2024-05-01 12:00 UTC);
        let second = datetime!(2024-05-02 08:30 UTC);

        store.mark_published("ad-1", "camp-1", first).await.unwrap();
        store.mark_published("ad-1", "camp-1", second).await.unwrap();

        let ad = store.get_ad("ad-1").await.unwrap().unwrap();
        assert_eq!(ad.published_at, Some(first));
        assert_eq!(ad.updated_at, second);
    }

    #[tokio::test]
    async fn test_history_newest_first() {
        let store = SqliteAdStore::in_memory().await.unwrap();
        let failed = report("ad-1", false, datetime!(2024-05-01 12:00 UTC));
        let succeeded = report("ad-1", true, datetime!(2024-05-01 12:05 UTC));
        let unrelated = report("ad-2", true, datetime!(2024-05-01 12:10 UTC));

        store.record_report(&failed).await.unwrap();
        store.record_report(&succeeded).await.unwrap();
        store.record_report(&unrelated).await.unwrap();

        let history = store.history("ad-1").await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].report_id, succeeded.report_id());
        assert!(history[0].any_succeeded);
        assert_eq!(history[1].report_id, failed.report_id());
        assert!(!history[1].all_succeeded);
        assert_eq!(history[1].report["outcomes"][0]["error_kind"], "rate_limited");
    }

    #[tokio::test]
    async fn test_file_backed_store_persists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("ads.db");
        let at = datetime!(2024-05-01 12:00 UTC);

        {
            let store = SqliteAdStore::new(&path).await.unwrap();
            store.mark_published("ad-9", "camp-3", at).await.unwrap();
        }

        let reopened = SqliteAdStore::new(&path).await.unwrap();
        let ad = reopened.get_ad("ad-9").await.unwrap().unwrap();
        assert_eq!(ad.status, AdStatus::Published);
    }
}
