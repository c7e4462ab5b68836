mod cli;
mod mock;

pub use cli::ItadmCli;
pub use mock::MockIscsiAdmin;

use crate::error::Result;
use async_trait::async_trait;
use lunar_core::{Target, TargetPortGroup, TargetRequest};

/// The iSCSI target administrator
#[async_trait]
pub trait IscsiAdmin: Send + Sync {
    async fn list_target_port_groups(&self) -> Result<Vec<TargetPortGroup>>;

    async fn get_target_port_group(&self, name: &str) -> Result<TargetPortGroup>;

    /// Create a portal group listening on `portals` (`address[:port]`)
    async fn create_target_port_group(
        &self,
        name: &str,
        portals: &[String],
    ) -> Result<TargetPortGroup>;

    /// Delete a portal group; `force` deletes it even while targets use it
    async fn delete_target_port_group(&self, name: &str, force: bool) -> Result<()>;

    async fn list_targets(&self) -> Result<Vec<Target>>;

    async fn get_target(&self, iqn: &str) -> Result<Target>;

    /// Create a target; without an IQN the administrator generates one
    async fn create_target(&self, request: &TargetRequest) -> Result<Target>;

    /// Delete a target; `force` takes it offline first
    async fn delete_target(&self, iqn: &str, force: bool) -> Result<()>;
}
