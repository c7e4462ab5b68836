mod cli;
mod mock;

pub use cli::StmfCli;
pub use mock::MockTargetFramework;

use crate::error::{Result, RuntimeError};
use async_trait::async_trait;
use lunar_core::{HostGroup, LogicalUnit, TargetGroup, View};

/// Cluster administration binary that fronts group changes in HA mode
pub const DEFAULT_HA_ADMIN: &str = "/opt/HAC/RSF-1/bin/stmfha";

/// Block size passed to `create-lu` unless overridden
pub const DEFAULT_LU_BLOCK_SIZE: u32 = 4096;

/// Target framework configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StmfConfig {
    /// Route group mutations and configuration backups through `ha_admin`
    pub ha_enabled: bool,
    pub ha_admin: String,
}

impl Default for StmfConfig {
    fn default() -> Self {
        Self {
            ha_enabled: false,
            ha_admin: DEFAULT_HA_ADMIN.to_string(),
        }
    }
}

/// Options for `create-lu`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LuOptions {
    pub block_size: u32,
    /// Re-assert an existing identifier (used when recreating after rollback)
    pub guid: Option<String>,
    pub alias: Option<String>,
    pub serial: Option<String>,
}

impl Default for LuOptions {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_LU_BLOCK_SIZE,
            guid: None,
            alias: None,
            serial: None,
        }
    }
}

impl LuOptions {
    pub fn with_guid(self, guid: impl Into<String>) -> Self {
        Self {
            guid: Some(guid.into()),
            ..self
        }
    }

    pub fn with_alias(self, alias: impl Into<String>) -> Self {
        Self {
            alias: Some(alias.into()),
            ..self
        }
    }

    pub fn with_serial(self, serial: impl Into<String>) -> Self {
        Self {
            serial: Some(serial.into()),
            ..self
        }
    }
}

/// The SCSI target-mode framework
///
/// Logical units, their views, and host/target groups. Group arguments that
/// are empty mean the wildcard group.
#[async_trait]
pub trait TargetFramework: Send + Sync {
    async fn list_logical_units(&self) -> Result<Vec<LogicalUnit>>;

    async fn get_logical_unit(&self, id: &str) -> Result<LogicalUnit>;

    /// Create a unit on the raw device of volume `dataset`
    async fn create_logical_unit(&self, dataset: &str, options: &LuOptions) -> Result<LogicalUnit>;

    /// Delete a unit; with `keep_views` its views survive for a unit recreated under the same id
    async fn delete_logical_unit(&self, id: &str, keep_views: bool) -> Result<()>;

    async fn online_logical_unit(&self, id: &str) -> Result<()>;

    async fn offline_logical_unit(&self, id: &str) -> Result<()>;

    /// Change the alias and/or the size recorded in the unit's metadata
    async fn modify_logical_unit(&self, id: &str, alias: Option<&str>, size: Option<u64>)
        -> Result<()>;

    async fn add_view(
        &self,
        id: &str,
        host_group: &str,
        target_group: &str,
        lun: Option<u16>,
    ) -> Result<()>;

    async fn list_views(&self, id: &str) -> Result<Vec<View>>;

    async fn remove_view(&self, id: &str, entry: u16) -> Result<()>;

    async fn remove_all_views(&self, id: &str) -> Result<()>;

    async fn list_host_groups(&self) -> Result<Vec<HostGroup>>;

    async fn get_host_group(&self, name: &str) -> Result<HostGroup>;

    async fn create_host_group(&self, name: &str) -> Result<()>;

    async fn delete_host_group(&self, name: &str) -> Result<()>;

    /// Add an initiator; `force` allows membership in several groups
    async fn add_host_group_member(&self, group: &str, member: &str, force: bool) -> Result<()>;

    async fn remove_host_group_member(&self, group: &str, member: &str) -> Result<()>;

    async fn list_target_groups(&self) -> Result<Vec<TargetGroup>>;

    async fn get_target_group(&self, name: &str) -> Result<TargetGroup>;

    async fn create_target_group(&self, name: &str) -> Result<()>;

    async fn delete_target_group(&self, name: &str) -> Result<()>;

    async fn add_target_group_member(&self, group: &str, member: &str) -> Result<()>;

    async fn remove_target_group_member(&self, group: &str, member: &str) -> Result<()>;

    /// Save the framework configuration for `pool` (cluster deployments only)
    async fn backup_configuration(&self, pool: &str) -> Result<()>;

    /// The unit backed by volume `dataset`
    async fn find_by_backing_store(&self, dataset: &str) -> Result<LogicalUnit> {
        self.list_logical_units()
            .await?
            .into_iter()
            .find(|lu| lu.backing_store == dataset)
            .ok_or_else(|| RuntimeError::not_found("LogicalUnit", dataset))
    }

    /// The first unit carrying `alias`
    async fn find_by_alias(&self, alias: &str) -> Result<LogicalUnit> {
        self.list_logical_units()
            .await?
            .into_iter()
            .find(|lu| lu.alias == alias)
            .ok_or_else(|| RuntimeError::not_found("LogicalUnit", alias))
    }
}
