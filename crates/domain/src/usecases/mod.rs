//! Application use cases / business logic

pub mod publish;
pub mod publish_ad;
pub mod state_update;

pub use publish::{PublishConfig, PublishOrchestrator, RetryPolicy};
pub use publish_ad::PublishAdUseCase;
pub use state_update::AdStateUpdater;
