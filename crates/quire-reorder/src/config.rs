//! Reorderer configuration.

use crate::Version;
use std::time::Duration;

/// Configuration for a [`Reorderer`](crate::Reorderer).
#[derive(Clone, Debug)]
pub struct ReordererConfig {
    /// The first version the reorderer expects to dispatch.
    pub first_version: Version,
    /// How long a gap may stay open before the timeout callback fires.
    pub timeout: Duration,
    /// Whether gap timeouts start enabled.
    pub timeout_enabled: bool,
}

impl Default for ReordererConfig {
    fn default() -> Self {
        Self {
            first_version: 0,
            timeout: Duration::from_secs(1),
            timeout_enabled: true,
        }
    }
}

/// Builder for [`ReordererConfig`].
pub struct ReordererConfigBuilder {
    config: ReordererConfig,
}

impl ReordererConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: ReordererConfig::default(),
        }
    }

    pub fn first_version(mut self, version: Version) -> Self {
        self.config.first_version = version;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn timeout_enabled(mut self, enabled: bool) -> Self {
        self.config.timeout_enabled = enabled;
        self
    }

    pub fn build(self) -> ReordererConfig {
        self.config
    }
}

impl Default for ReordererConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
