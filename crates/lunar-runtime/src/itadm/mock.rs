use crate::error::{Result, RuntimeError};
use crate::itadm::IscsiAdmin;
use async_trait::async_trait;
use lunar_core::{Target, TargetPortGroup, TargetRequest};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Default)]
struct State {
    port_groups: BTreeMap<String, Vec<String>>,
    targets: BTreeMap<String, Target>,
}

/// In-memory iSCSI administrator for testing on non-illumos platforms
#[derive(Clone, Default)]
pub struct MockIscsiAdmin {
    state: Arc<RwLock<State>>,
}

impl MockIscsiAdmin {
    pub fn new() -> Self {
        Self::default()
    }
}

fn itadm_failure(command: String, message: impl Into<String>) -> RuntimeError {
    RuntimeError::command_failed(command, 1, message)
}

fn port_group(name: &str, portals: &[String]) -> TargetPortGroup {
    TargetPortGroup {
        name: name.to_string(),
        portal_count: portals.len() as u64,
        portals: portals.to_vec(),
    }
}

#[async_trait]
impl IscsiAdmin for MockIscsiAdmin {
    async fn list_target_port_groups(&self) -> Result<Vec<TargetPortGroup>> {
        let state = self.state.read().await;
        Ok(state
            .port_groups
            .iter()
            .map(|(name, portals)| port_group(name, portals))
            .collect())
    }

    async fn get_target_port_group(&self, name: &str) -> Result<TargetPortGroup> {
        let state = self.state.read().await;
        state
            .port_groups
            .get(name)
            .map(|portals| port_group(name, portals))
            .ok_or_else(|| RuntimeError::not_found("TargetPortGroup", name))
    }

    async fn create_target_port_group(
        &self,
        name: &str,
        portals: &[String],
    ) -> Result<TargetPortGroup> {
        let mut state = self.state.write().await;
        if state.port_groups.contains_key(name) {
            return Err(RuntimeError::already_exists("TargetPortGroup", name));
        }
        if portals.is_empty() {
            return Err(itadm_failure(
                format!("itadm create-tpg {}", name),
                "itadm: at least one portal address is required",
            ));
        }
        state.port_groups.insert(name.to_string(), portals.to_vec());
        Ok(port_group(name, portals))
    }

    async fn delete_target_port_group(&self, name: &str, force: bool) -> Result<()> {
        let mut state = self.state.write().await;
        if !state.port_groups.contains_key(name) {
            return Err(RuntimeError::not_found("TargetPortGroup", name));
        }
        let tag = format!("{}=", name);
        let in_use = state.targets.values().any(|t| t.tpg_tags.starts_with(&tag));
        if in_use && !force {
            return Err(itadm_failure(
                format!("itadm delete-tpg {}", name),
                format!("itadm: Target Portal Group {} is in use", name),
            ));
        }
        state.port_groups.remove(name);
        Ok(())
    }

    async fn list_targets(&self) -> Result<Vec<Target>> {
        Ok(self.state.read().await.targets.values().cloned().collect())
    }

    async fn get_target(&self, iqn: &str) -> Result<Target> {
        self.state
            .read()
            .await
            .targets
            .get(iqn)
            .cloned()
            .ok_or_else(|| RuntimeError::not_found("Target", iqn))
    }

    async fn create_target(&self, request: &TargetRequest) -> Result<Target> {
        let mut state = self.state.write().await;

        let iqn = match request.iqn.as_deref().filter(|i| !i.is_empty()) {
            Some(iqn) => iqn.to_string(),
            None => format!("iqn.2010-08.org.illumos:02:{}", Uuid::new_v4()),
        };
        if state.targets.contains_key(&iqn) {
            return Err(RuntimeError::already_exists("Target", iqn));
        }

        let tpg_tags = match request.tpg.as_deref().filter(|t| !t.is_empty()) {
            Some(tpg) if !state.port_groups.contains_key(tpg) => {
                return Err(RuntimeError::not_found("TargetPortGroup", tpg));
            }
            Some(tpg) => format!("{}=2", tpg),
            None => "default".to_string(),
        };

        let target = Target {
            iqn: iqn.clone(),
            state: "online".to_string(),
            session_count: 0,
            alias: request.alias.clone().unwrap_or_else(|| "-".to_string()),
            auth: "none (defaults)".to_string(),
            chap_user: "-".to_string(),
            chap_secret: "unset".to_string(),
            tpg_tags,
        };
        state.targets.insert(iqn, target.clone());
        Ok(target)
    }

    async fn delete_target(&self, iqn: &str, _force: bool) -> Result<()> {
        self.state
            .write()
            .await
            .targets
            .remove(iqn)
            .map(|_| ())
            .ok_or_else(|| RuntimeError::not_found("Target", iqn))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_target_requires_existing_port_group() {
        let itadm = MockIscsiAdmin::new();
        let request = TargetRequest {
            tpg: Some("tpg1".to_string()),
            ..Default::default()
        };
        assert!(itadm.create_target(&request).await.unwrap_err().is_not_found());

        itadm
            .create_target_port_group("tpg1", &["10.0.0.1:3260".to_string()])
            .await
            .unwrap();
        let target = itadm.create_target(&request).await.unwrap();
        assert!(target.iqn.starts_with("iqn.2010-08.org.illumos:02:"));
        assert_eq!(target.tpg_tags, "tpg1=2");

        // port group is pinned by the target unless forced
        assert!(itadm.delete_target_port_group("tpg1", false).await.is_err());
        itadm.delete_target(&target.iqn, false).await.unwrap();
        itadm.delete_target_port_group("tpg1", false).await.unwrap();
        assert!(itadm.list_target_port_groups().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_iqn() {
        let itadm = MockIscsiAdmin::new();
        let request = TargetRequest {
            iqn: Some("iqn.2010-08.org.illumos:02:one".to_string()),
            ..Default::default()
        };
        itadm.create_target(&request).await.unwrap();
        assert!(matches!(
            itadm.create_target(&request).await.unwrap_err(),
            RuntimeError::AlreadyExists { .. }
        ));
        assert_eq!(itadm.list_targets().await.unwrap().len(), 1);
    }
}
