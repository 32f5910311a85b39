//! ad-publisher domain crate
//!
//! This crate contains the core domain logic following hexagonal architecture:
//! - `model`: Domain entities and value objects
//! - `ports`: Trait definitions for external dependencies (adapters)
//! - `policy`: Per-platform media and text constraints
//! - `registry`: Platform id to adapter lookup
//! - `usecases`: Publish orchestration and ad state updates

pub mod model;
pub mod policy;
pub mod ports;
pub mod registry;
pub mod usecases;

pub use model::*;
pub use policy::{MediaPolicy, PolicyViolation};
pub use ports::*;
pub use registry::AdapterRegistry;
