use super::Orchestrator;
use crate::error::Result;
use lunar_core::{
    validate_component, validate_group_name, HostGroup, LunarError, Target, TargetGroup,
    TargetPortGroup, TargetPortGroupRequest, TargetRequest,
};
use tracing::info;

impl Orchestrator {
    pub async fn list_host_groups(&self) -> Result<Vec<HostGroup>> {
        self.targets.list_host_groups().await
    }

    pub async fn get_host_group(&self, name: &str) -> Result<HostGroup> {
        self.targets.get_host_group(name).await
    }

    /// Create a host group; the wildcard name is refused before any call
    pub async fn create_host_group(&self, name: &str) -> Result<HostGroup> {
        validate_group_name("HostGroup", name)?;
        self.targets.create_host_group(name).await?;
        info!("Host group created: {}", name);
        self.targets.get_host_group(name).await
    }

    pub async fn delete_host_group(&self, name: &str) -> Result<()> {
        self.targets.delete_host_group(name).await?;
        info!("Host group deleted: {}", name);
        Ok(())
    }

    /// Add an initiator; `force` lets it stay in other host groups
    pub async fn add_host_group_member(
        &self,
        name: &str,
        member: &str,
        force: bool,
    ) -> Result<HostGroup> {
        validate_component("HostGroupMember", member)?;
        self.targets.add_host_group_member(name, member, force).await?;
        info!("Added {} to host group {}", member, name);
        self.targets.get_host_group(name).await
    }

    pub async fn remove_host_group_member(&self, name: &str, member: &str) -> Result<HostGroup> {
        self.targets.remove_host_group_member(name, member).await?;
        info!("Removed {} from host group {}", member, name);
        self.targets.get_host_group(name).await
    }

    pub async fn list_target_groups(&self) -> Result<Vec<TargetGroup>> {
        self.targets.list_target_groups().await
    }

    pub async fn get_target_group(&self, name: &str) -> Result<TargetGroup> {
        self.targets.get_target_group(name).await
    }

    /// Create a target group; the wildcard name is refused before any call
    pub async fn create_target_group(&self, name: &str) -> Result<TargetGroup> {
        validate_group_name("TargetGroup", name)?;
        self.targets.create_target_group(name).await?;
        info!("Target group created: {}", name);
        self.targets.get_target_group(name).await
    }

    pub async fn delete_target_group(&self, name: &str) -> Result<()> {
        self.targets.delete_target_group(name).await?;
        info!("Target group deleted: {}", name);
        Ok(())
    }

    pub async fn add_target_group_member(&self, name: &str, member: &str) -> Result<TargetGroup> {
        validate_component("TargetGroupMember", member)?;
        self.targets.add_target_group_member(name, member).await?;
        info!("Added {} to target group {}", member, name);
        self.targets.get_target_group(name).await
    }

    pub async fn remove_target_group_member(
        &self,
        name: &str,
        member: &str,
    ) -> Result<TargetGroup> {
        self.targets.remove_target_group_member(name, member).await?;
        info!("Removed {} from target group {}", member, name);
        self.targets.get_target_group(name).await
    }

    pub async fn list_target_port_groups(&self) -> Result<Vec<TargetPortGroup>> {
        self.iscsi.list_target_port_groups().await
    }

    pub async fn get_target_port_group(&self, name: &str) -> Result<TargetPortGroup> {
        self.iscsi.get_target_port_group(name).await
    }

    pub async fn create_target_port_group(
        &self,
        name: &str,
        request: &TargetPortGroupRequest,
    ) -> Result<TargetPortGroup> {
        validate_component("TargetPortGroup", name)?;
        if request.portals.is_empty() {
            return Err(LunarError::validation_failed(
                "TargetPortGroup",
                "at least one portal is required",
                "Supply portals as \"address[:port]\" strings",
            )
            .into());
        }
        let tpg = self
            .iscsi
            .create_target_port_group(name, &request.portals)
            .await?;
        info!("Target port group created: {}", name);
        Ok(tpg)
    }

    pub async fn delete_target_port_group(&self, name: &str, force: bool) -> Result<()> {
        self.iscsi.delete_target_port_group(name, force).await?;
        info!("Target port group deleted: {} (force: {})", name, force);
        Ok(())
    }

    pub async fn list_iscsi_targets(&self) -> Result<Vec<Target>> {
        self.iscsi.list_targets().await
    }

    pub async fn get_iscsi_target(&self, iqn: &str) -> Result<Target> {
        self.iscsi.get_target(iqn).await
    }

    pub async fn create_iscsi_target(&self, request: &TargetRequest) -> Result<Target> {
        let target = self.iscsi.create_target(request).await?;
        info!("Target created: {}", target.iqn);
        Ok(target)
    }

    pub async fn delete_iscsi_target(&self, iqn: &str, force: bool) -> Result<()> {
        self.iscsi.delete_target(iqn, force).await?;
        info!("Target deleted: {} (force: {})", iqn, force);
        Ok(())
    }
}
