//! Registry configuration

/// Configuration for the viewer registry
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Chunks that may wait in one viewer's outgoing queue before the viewer
    /// is evicted as too slow
    pub viewer_queue_capacity: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            viewer_queue_capacity: 256,
        }
    }
}

impl RegistryConfig {
    /// Set the per-viewer queue capacity (at least one chunk)
    pub fn viewer_queue_capacity(mut self, capacity: usize) -> Self {
        self.viewer_queue_capacity = capacity.max(1);
        self
    }
}
