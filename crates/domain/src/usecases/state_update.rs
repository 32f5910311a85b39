//! Ad state update - applies a publish report to the stored ad

use std::sync::Arc;

use crate::model::{PublishReport, StateUpdate};
use crate::ports::AdStore;

/// Applies the "any platform succeeded means published" rule to the ad store
pub struct AdStateUpdater<S: AdStore + ?Sized> {
    store: Arc<S>,
    queue_only: bool,
}

impl<S: AdStore + ?Sized> AdStateUpdater<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            queue_only: false,
        }
    }

    /// Successful outcomes only mean "queued for approval": record history but
    /// never mark the ad published
    pub fn queue_only(mut self) -> Self {
        self.queue_only = true;
        self
    }

    /// Apply a report. Best-effort: store failures come back as
    /// [`StateUpdate::Failed`], never as an error.
    pub async fn apply(&self, report: &PublishReport) -> StateUpdate {
        let update = if !report.any_succeeded() {
            tracing::info!(
                ad_id = %report.ad_id(),
                "No platform accepted the ad, status left unchanged"
            );
            StateUpdate::Unchanged
        } else if self.queue_only {
            tracing::info!(
                ad_id = %report.ad_id(),
                "Ad queued for approval, status left unchanged"
            );
            StateUpdate::Queued
        } else {
            match self
                .store
                .mark_published(report.ad_id(), report.campaign_id(), report.completed_at())
                .await
            {
                Ok(()) => {
                    tracing::info!(ad_id = %report.ad_id(), "Ad marked published");
                    StateUpdate::Published {
                        published_at: report.completed_at(),
                    }
                }
                Err(e) => {
                    tracing::error!(
                        ad_id = %report.ad_id(),
                        error = %e,
                        "Failed to mark ad published"
                    );
                    StateUpdate::Failed {
                        error: e.to_string(),
                    }
                }
            }
        };

        if let Err(e) = self.store.record_report(report).await {
            tracing::warn!(
                ad_id = %report.ad_id(),
                report_id = %report.report_id(),
                error = %e,
                "Failed to record publish history"
            );
        }

        update
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        AdRecord, AdStatus, PlatformId, PlatformOutcome, PublishErrorKind, PublishHistoryEntry,
        PublishedPost,
    };
    use crate::ports::StoreError;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;
    use time::OffsetDateTime;

    #[derive(Default)]
    struct FakeAdStore {
        ads: Mutex<HashMap<String, AdRecord>>,
        reports: Mutex<Vec<String>>,
        broken: bool,
    }

    #[async_trait]
    impl AdStore for FakeAdStore {
        async fn get_ad(&self, ad_id: &str) -> Result<Option<AdRecord>, StoreError> {
            Ok(self.ads.lock().unwrap().get(ad_id).cloned())
        }

        async fn mark_published(
            &self,
            ad_id: &str,
            campaign_id: &str,
            published_at: OffsetDateTime,
        ) -> Result<(), StoreError> {
            if self.broken {
                return Err(StoreError::Database("disk full".to_string()));
            }
            self.ads.lock().unwrap().insert(
                ad_id.to_string(),
                AdRecord {
                    ad_id: ad_id.to_string(),
                    campaign_id: campaign_id.to_string(),
                    status: AdStatus::Published,
                    published_at: Some(published_at),
                    updated_at: published_at,
                },
            );
            Ok(())
        }

        async fn record_report(&self, report: &PublishReport) -> Result<(), StoreError> {
            if self.broken {
                return Err(StoreError::Database("disk full".to_string()));
            }
            self.reports
                .lock()
                .unwrap()
                .push(report.report_id().to_string());
            Ok(())
        }

        async fn history(&self, _ad_id: &str) -> Result<Vec<PublishHistoryEntry>, StoreError> {
            Ok(vec![])
        }
    }

    fn report(success: bool) -> PublishReport {
        let platform = PlatformId::from_static("x");
        let outcome = if success {
            PlatformOutcome::succeeded(
                platform,
                PublishedPost {
                    id: "1".to_string(),
                    url: None,
                },
                1,
                Duration::from_millis(5),
            )
        } else {
            PlatformOutcome::failed(
                platform,
                PublishErrorKind::Unauthorized,
                "expired",
                1,
                Duration::from_millis(5),
            )
        };
        PublishReport::new("ad-1", "c-1", vec![outcome], OffsetDateTime::UNIX_EPOCH)
    }

    #[tokio::test]
    async fn test_success_marks_ad_published() {
        let store = Arc::new(FakeAdStore::default());
        let updater = AdStateUpdater::new(Arc::clone(&store));

        let update = updater.apply(&report(true)).await;

        assert_eq!(
            update,
            StateUpdate::Published {
                published_at: OffsetDateTime::UNIX_EPOCH
            }
        );
        let ad = store.get_ad("ad-1").await.unwrap().unwrap();
        assert_eq!(ad.status, AdStatus::Published);
        assert_eq!(ad.published_at, Some(OffsetDateTime::UNIX_EPOCH));
        assert_eq!(store.reports.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_total_failure_leaves_status_alone() {
        let store = Arc::new(FakeAdStore::default());
        let updater = AdStateUpdater::new(Arc::clone(&store));

        let update = updater.apply(&report(false)).await;

        assert_eq!(update, StateUpdate::Unchanged);
        assert!(store.get_ad("ad-1").await.unwrap().is_none());
        assert_eq!(store.reports.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_store_failure_is_reported_not_raised() {
        let store = Arc::new(FakeAdStore {
            broken: true,
            ..Default::default()
        });
        let updater = AdStateUpdater::new(store);

        let update = updater.apply(&report(true)).await;

        assert!(matches!(update, StateUpdate::Failed { ref error } if error.contains("disk full")));
    }

    #[tokio::test]
    async fn test_queued_posts_record_history_only() {
        let store = Arc::new(FakeAdStore::default());
        let updater = AdStateUpdater::new(Arc::clone(&store)).queue_only();

        let update = updater.apply(&report(true)).await;

        assert_eq!(update, StateUpdate::Queued);
        assert!(store.get_ad("ad-1").await.unwrap().is_none());
        assert_eq!(store.reports.lock().unwrap().len(), 1);
    }
}
