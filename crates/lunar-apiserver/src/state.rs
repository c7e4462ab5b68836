use crate::{ApiError, Result};
use lunar_runtime::{JobTracker, Orchestrator};
use std::sync::Arc;

/// Pools the API refuses to touch unless configured otherwise
pub const DEFAULT_PRIVATE_POOLS: &[&str] = &["rpool", "zpool"];

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,

    /// Tracker for asynchronous destroys
    pub jobs: Arc<JobTracker>,

    /// System pools that are never managed through the API
    pub private_pools: Vec<String>,
}

impl AppState {
    pub fn new(orchestrator: Arc<Orchestrator>, jobs: Arc<JobTracker>) -> Self {
        Self {
            orchestrator,
            jobs,
            private_pools: DEFAULT_PRIVATE_POOLS.iter().map(|p| p.to_string()).collect(),
        }
    }

    pub fn with_private_pools(self, private_pools: Vec<String>) -> Self {
        Self {
            private_pools,
            ..self
        }
    }

    /// Reject requests against a private pool
    pub fn ensure_public_pool(&self, pool: &str) -> Result<()> {
        if self.private_pools.iter().any(|p| p == pool) {
            return Err(ApiError::Forbidden(format!(
                "pool {} is private and cannot be managed through the API",
                pool
            )));
        }
        Ok(())
    }
}
