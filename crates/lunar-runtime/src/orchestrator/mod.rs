//! Cross-subsystem lifecycle of projects, volumes, snapshots and exports
//!
//! A volume is a dataset of kind volume plus the logical unit bound to its
//! raw device. Neither subsystem knows about the other, so every operation
//! that touches both is sequenced here:
//!
//! - the unit is deleted (and its deletion observed) before the dataset goes
//! - a rollback deletes the unit keeping its views, rolls the dataset back and
//!   recreates the unit under the same identifier and alias
//! - listing and destroying serialize on the context's listing lock
//!
//! Operations return freshly fetched records. Nothing is patched locally.

mod groups;
mod projects;
mod volumes;

use crate::error::{Result, RuntimeError};
use crate::itadm::IscsiAdmin;
use crate::stmf::TargetFramework;
use crate::zfs::DatasetManager;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

/// Value of the service flag property on datasets this daemon created
pub const MANAGED_SERVICE_FLAG: &str = "managed_by_lunar";

/// How long to wait for a deleted unit to leave the framework's listings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettlePolicy {
    pub poll_interval: Duration,
    pub timeout: Duration,
}

impl Default for SettlePolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            timeout: Duration::from_secs(10),
        }
    }
}

/// State shared by every orchestrator operation
///
/// Cloning shares the listing lock. Separate contexts are fully isolated.
#[derive(Debug, Clone, Default)]
pub struct OrchestratorContext {
    listing: Arc<Mutex<()>>,
    pub settle: SettlePolicy,
}

impl OrchestratorContext {
    pub fn new(settle: SettlePolicy) -> Self {
        Self {
            listing: Arc::new(Mutex::new(())),
            settle,
        }
    }
}

/// Resource lifecycle orchestrator over the three subsystems
pub struct Orchestrator {
    datasets: Arc<dyn DatasetManager>,
    targets: Arc<dyn TargetFramework>,
    iscsi: Arc<dyn IscsiAdmin>,
    context: OrchestratorContext,
}

impl Orchestrator {
    pub fn new(
        datasets: Arc<dyn DatasetManager>,
        targets: Arc<dyn TargetFramework>,
        iscsi: Arc<dyn IscsiAdmin>,
        context: OrchestratorContext,
    ) -> Self {
        Self {
            datasets,
            targets,
            iscsi,
            context,
        }
    }

    pub fn context(&self) -> &OrchestratorContext {
        &self.context
    }

    /// Delete a unit and wait until listings no longer report it
    ///
    /// Holds the listing lock throughout, so a concurrent listing sees the
    /// unit either whole or gone.
    async fn delete_unit_and_settle(&self, id: &str, keep_views: bool) -> Result<()> {
        let _listing = self.context.listing.lock().await;
        self.targets.delete_logical_unit(id, keep_views).await?;

        let policy = self.context.settle;
        let deadline = tokio::time::Instant::now() + policy.timeout;
        loop {
            let units = self.targets.list_logical_units().await?;
            if !units.iter().any(|lu| lu.id == id) {
                debug!("Logical unit {} settled", id);
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(RuntimeError::SettleTimeout {
                    lu: id.to_string(),
                    waited_ms: policy.timeout.as_millis() as u64,
                });
            }
            tokio::time::sleep(policy.poll_interval).await;
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::itadm::MockIscsiAdmin;
    use crate::stmf::MockTargetFramework;
    use crate::zfs::MockDatasetManager;
    use lunar_core::{ByteSize, ProjectPath, ProjectRequest};

    pub const MIB: u64 = 1024 * 1024;

    pub struct Harness {
        pub zfs: Arc<MockDatasetManager>,
        pub stmf: Arc<MockTargetFramework>,
        pub orchestrator: Orchestrator,
        pub project: ProjectPath,
    }

    /// Orchestrator over mocks with `tank/dom` in place
    pub async fn harness_with(
        configure: impl FnOnce(MockTargetFramework) -> MockTargetFramework,
    ) -> Harness {
        let zfs = Arc::new(MockDatasetManager::with_pools(&["tank"]));
        zfs.create_filesystem("tank/dom", 0, &Vec::new()).await.unwrap();
        let stmf = Arc::new(configure(MockTargetFramework::new(zfs.clone())));
        let context = OrchestratorContext::new(SettlePolicy {
            poll_interval: Duration::from_millis(5),
            timeout: Duration::from_millis(500),
        });
        let orchestrator = Orchestrator::new(
            zfs.clone(),
            stmf.clone(),
            Arc::new(MockIscsiAdmin::new()),
            context,
        );
        Harness {
            zfs,
            stmf,
            orchestrator,
            project: ProjectPath::new("tank", "dom", "proj"),
        }
    }

    pub async fn harness() -> Harness {
        harness_with(|stmf| stmf).await
    }

    /// Harness with the project created (quota 500 MiB)
    pub async fn harness_with_project() -> Harness {
        let h = harness().await;
        let request = ProjectRequest {
            quota: Some(ByteSize(500 * MIB)),
            ..Default::default()
        };
        h.orchestrator
            .create_project(&h.project, &request)
            .await
            .unwrap();
        h
    }
}
