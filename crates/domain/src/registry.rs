//! Registry mapping platform ids to their adapters

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::model::PlatformId;
use crate::ports::PlatformAdapter;

/// Platform adapters available to the orchestrator, populated at start-up
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: HashMap<PlatformId, Arc<dyn PlatformAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter under its own platform id, returning any adapter
    /// it replaced
    pub fn register(
        &mut self,
        adapter: Arc<dyn PlatformAdapter>,
    ) -> Option<Arc<dyn PlatformAdapter>> {
        let platform = adapter.platform().clone();
        let previous = self.adapters.insert(platform.clone(), adapter);
        if previous.is_some() {
            tracing::warn!(platform = %platform, "Replaced previously registered adapter");
        }
        previous
    }

    /// Builder-style [`register`](Self::register)
    pub fn with_adapter(mut self, adapter: Arc<dyn PlatformAdapter>) -> Self {
        self.register(adapter);
        self
    }

    pub fn get(&self, platform: &PlatformId) -> Option<&Arc<dyn PlatformAdapter>> {
        self.adapters.get(platform)
    }

    pub fn contains(&self, platform: &PlatformId) -> bool {
        self.adapters.contains_key(platform)
    }

    /// Registered platform ids, sorted
    pub fn platforms(&self) -> Vec<&PlatformId> {
        let mut ids: Vec<_> = self.adapters.keys().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

impl fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("platforms", &self.platforms())
            .finish()
    }
}
