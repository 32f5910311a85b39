//! Publish-and-record use case - what a caller runs end to end

use crate::model::{AdSubmission, PublishCallError, PublishSummary, StateUpdate};
use crate::ports::{AdStore, Clock, CredentialStore};
use crate::usecases::{AdStateUpdater, PublishOrchestrator};

/// Publishes an ad, then hands the report to the state updater (if any)
pub struct PublishAdUseCase<Cr, Cl, S>
where
    Cr: CredentialStore + ?Sized + 'static,
    Cl: Clock + ?Sized,
    S: AdStore + ?Sized,
{
    orchestrator: PublishOrchestrator<Cr, Cl>,
    updater: Option<AdStateUpdater<S>>,
}

impl<Cr, Cl, S> PublishAdUseCase<Cr, Cl, S>
where
    Cr: CredentialStore + ?Sized + 'static,
    Cl: Clock + ?Sized,
    S: AdStore + ?Sized,
{
    pub fn new(
        orchestrator: PublishOrchestrator<Cr, Cl>,
        updater: Option<AdStateUpdater<S>>,
    ) -> Self {
        Self {
            orchestrator,
            updater,
        }
    }

    pub fn orchestrator(&self) -> &PublishOrchestrator<Cr, Cl> {
        &self.orchestrator
    }

    /// Publish, then update ad state once every platform has finished
    pub async fn execute(
        &self,
        submission: AdSubmission,
    ) -> Result<PublishSummary, PublishCallError> {
        let report = self.orchestrator.publish_ad(submission).await?;

        let state_update = match &self.updater {
            Some(updater) => updater.apply(&report).await,
            None => StateUpdate::Skipped,
        };

        Ok(PublishSummary {
            report,
            state_update,
        })
    }
}
