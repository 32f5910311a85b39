//! ad-publisher adapters crate
//!
//! Infrastructure adapters implementing the domain ports:
//! - `x`, `facebook`, `linkedin`: platform API adapters
//! - `stub`: scripted adapter that never leaves the process
//! - `outbox`: require-approval adapter writing JSONL
//! - `credentials`: environment and in-memory credential stores
//! - `store`: SQLite and in-memory ad stores

mod ad_store_memory;
mod ad_store_sqlite;
mod http;

pub mod credentials;
pub mod facebook;
pub mod linkedin;
pub mod outbox;
pub mod stub;
pub mod x;

pub use http::DEFAULT_REQUEST_TIMEOUT;

/// Re-exports for ad store adapters
pub mod store {
    pub use crate::ad_store_memory::InMemoryAdStore;
    pub use crate::ad_store_sqlite::SqliteAdStore;
}
