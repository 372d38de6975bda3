//! Document manager configuration.

/// Configuration for a [`DocumentManager`](crate::DocumentManager).
#[derive(Clone, Debug)]
pub struct ManagerConfig {
    /// Resident documents allowed before eviction starts.
    pub max_cached_documents: usize,
    /// Capacity of the lifecycle event channel.
    pub event_capacity: usize,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            max_cached_documents: 4,
            event_capacity: 100,
        }
    }
}

/// Builder for [`ManagerConfig`].
pub struct ManagerConfigBuilder {
    config: ManagerConfig,
}

impl ManagerConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: ManagerConfig::default(),
        }
    }

    pub fn max_cached_documents(mut self, max: usize) -> Self {
        self.config.max_cached_documents = max;
        self
    }

    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.config.event_capacity = capacity;
        self
    }

    pub fn build(self) -> ManagerConfig {
        self.config
    }
}

impl Default for ManagerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
