//! In-memory ad store for testing and offline mode

use ad_publisher_domain::{
    AdRecord, AdStatus, AdStore, PublishHistoryEntry, PublishReport, StoreError,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;
use time::OffsetDateTime;

/// In-memory ad store implementation
pub struct InMemoryAdStore {
    ads: RwLock<HashMap<String, AdRecord>>,
    history: RwLock<Vec<PublishHistoryEntry>>,
}

impl InMemoryAdStore {
    pub fn new() -> Self {
        Self {
            ads: RwLock::new(HashMap::new()),
            history: RwLock::new(Vec::new()),
        }
    }
}

impl Default for InMemoryAdStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AdStore for InMemoryAdStore {
    async fn get_ad(&self, ad_id: &str) -> Result<Option<AdRecord>, StoreError> {
        let ads = self
            .ads
            .read()
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(ads.get(ad_id).cloned())
    }

    async fn mark_published(
        &self,
        ad_id: &str,
        campaign_id: &str,
        published_at: OffsetDateTime,
    ) -> Result<(), StoreError> {
        let mut ads = self
            .ads
            .write()
            .map_err(|e| StoreError::Database(e.to_string()))?;
        let first_published = ads
            .get(ad_id)
            .and_then(|ad| ad.published_at)
            .unwrap_or(published_at);
        ads.insert(
            ad_id.to_string(),
            AdRecord {
                ad_id: ad_id.to_string(),
                campaign_id: campaign_id.to_string(),
                status: AdStatus::Published,
                published_at: Some(first_published),
                updated_at: published_at,
            },
        );
        Ok(())
    }

    async fn record_report(&self, report: &PublishReport) -> Result<(), StoreError> {
        let snapshot =
            serde_json::to_value(report).map_err(|e| StoreError::Serialization(e.to_string()))?;
        let mut history = self
            .history
            .write()
            .map_err(|e| StoreError::Database(e.to_string()))?;
        history.push(PublishHistoryEntry {
            report_id: report.report_id(),
            ad_id: report.ad_id().to_string(),
            any_succeeded: report.any_succeeded(),
            all_succeeded: report.all_succeeded(),
            completed_at: report.completed_at(),
            report: snapshot,
        });
        Ok(())
    }

    async fn history(&self, ad_id: &str) -> Result<Vec<PublishHistoryEntry>, StoreError> {
        let history = self
            .history
            .read()
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(history
            .iter()
            .rev()
            .filter(|entry| entry.ad_id == ad_id)
            .cloned()
            .collect())
    }
}
