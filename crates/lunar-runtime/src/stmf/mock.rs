use crate::error::{Result, RuntimeError};
use crate::stmf::{LuOptions, TargetFramework};
use crate::zfs::{DatasetManager, MockDatasetManager};
use async_trait::async_trait;
use lunar_core::{
    device_path, or_wildcard, DatasetKind, HostGroup, LogicalUnit, OperationalStatus,
    TargetGroup, View, WILDCARD_GROUP,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

const DELETING: &str = "Deleting";

#[derive(Debug, Clone)]
struct Unit {
    lu: LogicalUnit,
    views: Vec<View>,
    /// Set while a delete is committing: listings left before it disappears
    deleting: Option<usize>,
}

impl Unit {
    fn record(&self) -> LogicalUnit {
        LogicalUnit {
            view_count: self.views.len() as u64,
            ..self.lu.clone()
        }
    }
}

#[derive(Debug, Default)]
struct State {
    units: BTreeMap<String, Unit>,
    /// Views saved by `delete-lu -k`, restored when the id is reused
    kept_views: HashMap<String, Vec<View>>,
    host_groups: BTreeMap<String, Vec<String>>,
    target_groups: BTreeMap<String, Vec<String>>,
    next_guid: u64,
    backups: Vec<String>,
}

impl State {
    fn live_unit(&mut self, id: &str) -> Result<&mut Unit> {
        self.units
            .get_mut(id)
            .filter(|u| u.deleting.is_none())
            .ok_or_else(|| RuntimeError::not_found("LogicalUnit", id))
    }

    fn lun_in_use(&self, host_group: &str, lun: u16) -> bool {
        self.units
            .values()
            .flat_map(|u| u.views.iter())
            .any(|v| v.host_group == host_group && v.lun == lun)
    }
}

fn stmf_failure(command: impl Into<String>, message: impl Into<String>) -> RuntimeError {
    RuntimeError::command_failed(command, 1, message)
}

fn lowest_unused<I: IntoIterator<Item = u16>>(used: I) -> u16 {
    let used: Vec<u16> = used.into_iter().collect();
    (0..=u16::MAX).find(|n| !used.contains(n)).unwrap_or(u16::MAX)
}

/// In-memory target framework for testing on non-illumos platforms
///
/// Backing stores are checked against a `MockDatasetManager`, and a volume
/// stays busy there while a unit is bound to it. A delete can be slowed down
/// and made to linger in listings to reproduce an uncommitted deletion.
pub struct MockTargetFramework {
    state: Arc<RwLock<State>>,
    datasets: Arc<MockDatasetManager>,
    delete_delay: Duration,
    linger_listings: usize,
    fail_backup: bool,
}

impl MockTargetFramework {
    pub fn new(datasets: Arc<MockDatasetManager>) -> Self {
        Self {
            state: Arc::new(RwLock::new(State::default())),
            datasets,
            delete_delay: Duration::ZERO,
            linger_listings: 0,
            fail_backup: false,
        }
    }

    /// Keep a deleted unit in a half-deleted state for `delay` before it commits
    pub fn with_delete_delay(self, delay: Duration) -> Self {
        Self {
            delete_delay: delay,
            ..self
        }
    }

    /// Keep reporting a deleted unit in the next `listings` unit listings
    pub fn with_linger(self, listings: usize) -> Self {
        Self {
            linger_listings: listings,
            ..self
        }
    }

    /// Make `backup_configuration` fail
    pub fn with_failing_backup(self) -> Self {
        Self {
            fail_backup: true,
            ..self
        }
    }

    /// Pools whose configuration was backed up, in order
    pub async fn backups(&self) -> Vec<String> {
        self.state.read().await.backups.clone()
    }

    async fn release(&self, datasets: Vec<String>) {
        for ds in datasets {
            self.datasets.set_busy(&ds, false).await;
        }
    }
}

#[async_trait]
impl TargetFramework for MockTargetFramework {
    async fn list_logical_units(&self) -> Result<Vec<LogicalUnit>> {
        let (units, committed) = {
            let mut state = self.state.write().await;
            let units: Vec<LogicalUnit> = state.units.values().map(Unit::record).collect();

            let mut committed = Vec::new();
            for unit in state.units.values_mut() {
                if let Some(left) = unit.deleting.as_mut() {
                    *left = left.saturating_sub(1);
                    if *left == 0 {
                        committed.push(unit.lu.id.clone());
                    }
                }
            }
            let mut released = Vec::new();
            for id in committed {
                if let Some(unit) = state.units.remove(&id) {
                    released.push(unit.lu.backing_store);
                }
            }
            (units, released)
        };
        self.release(committed).await;
        Ok(units)
    }

    async fn get_logical_unit(&self, id: &str) -> Result<LogicalUnit> {
        let mut state = self.state.write().await;
        Ok(state.live_unit(id)?.record())
    }

    async fn create_logical_unit(&self, dataset: &str, options: &LuOptions) -> Result<LogicalUnit> {
        let device = device_path(dataset);
        let command = format!("stmfadm create-lu {}", device);

        if self.datasets.kind_of(dataset).await != Some(DatasetKind::Volume) {
            return Err(stmf_failure(
                command,
                format!("stmfadm: could not open {}: No such file or directory", device),
            ));
        }
        let size = self
            .datasets
            .properties(dataset)
            .await?
            .as_volume()
            .map(|v| v.volsize)
            .unwrap_or_default();
        let block_size = u16::try_from(options.block_size).map_err(|_| {
            stmf_failure(command.clone(), format!("stmfadm: invalid block size {}", options.block_size))
        })?;

        let lu = {
            let mut state = self.state.write().await;
            if state.units.values().any(|u| u.lu.backing_store == dataset) {
                return Err(stmf_failure(command, "stmfadm: data file in use"));
            }

            let id = match &options.guid {
                Some(guid) if state.units.contains_key(guid) => {
                    return Err(stmf_failure(command, "stmfadm: guid in use"));
                }
                Some(guid) => guid.clone(),
                None => {
                    state.next_guid += 1;
                    format!("600144F0{:024X}", state.next_guid)
                }
            };

            let views = state.kept_views.remove(&id).unwrap_or_default();
            let lu = LogicalUnit {
                id: id.clone(),
                operational_status: OperationalStatus::Online,
                provider_name: "sbd".to_string(),
                alias: options.alias.clone().unwrap_or_else(|| device.clone()),
                view_count: 0,
                data_file: device.clone(),
                backing_store: dataset.to_string(),
                meta_file: "not set".to_string(),
                size,
                block_size,
                management_url: "not set".to_string(),
                vendor_id: "SUN".to_string(),
                product_id: "COMSTAR".to_string(),
                serial_number: options.serial.clone().unwrap_or_else(|| "not set".to_string()),
                write_protect: "Disabled".to_string(),
                write_cache_mode_select: "Enabled".to_string(),
                writeback_cache: "Enabled".to_string(),
                access_state: "Active".to_string(),
            };
            let unit = Unit {
                lu,
                views,
                deleting: None,
            };
            let record = unit.record();
            state.units.insert(id, unit);
            record
        };

        self.datasets.set_busy(dataset, true).await;
        debug!("Mock: created logical unit {} on {}", lu.id, dataset);
        Ok(lu)
    }

    async fn delete_logical_unit(&self, id: &str, keep_views: bool) -> Result<()> {
        {
            let mut state = self.state.write().await;
            let unit = state.live_unit(id)?;
            unit.deleting = Some(self.linger_listings);
            unit.lu.access_state = DELETING.to_string();
            let views = std::mem::take(&mut unit.views);
            if keep_views {
                state.kept_views.insert(id.to_string(), views);
            } else {
                state.kept_views.remove(id);
            }
        }

        if !self.delete_delay.is_zero() {
            tokio::time::sleep(self.delete_delay).await;
        }

        if self.linger_listings == 0 {
            let released = {
                let mut state = self.state.write().await;
                state.units.remove(id).map(|u| u.lu.backing_store)
            };
            self.release(released.into_iter().collect()).await;
        }
        debug!("Mock: deleted logical unit {} (keep views: {})", id, keep_views);
        Ok(())
    }

    async fn online_logical_unit(&self, id: &str) -> Result<()> {
        let mut state = self.state.write().await;
        state.live_unit(id)?.lu.operational_status = OperationalStatus::Online;
        Ok(())
    }

    async fn offline_logical_unit(&self, id: &str) -> Result<()> {
        let mut state = self.state.write().await;
        state.live_unit(id)?.lu.operational_status = OperationalStatus::Offline;
        Ok(())
    }

    async fn modify_logical_unit(
        &self,
        id: &str,
        alias: Option<&str>,
        size: Option<u64>,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        let unit = state.live_unit(id)?;
        if let Some(alias) = alias {
            unit.lu.alias = alias.to_string();
        }
        if let Some(size) = size {
            unit.lu.size = size;
        }
        Ok(())
    }

    async fn add_view(
        &self,
        id: &str,
        host_group: &str,
        target_group: &str,
        lun: Option<u16>,
    ) -> Result<()> {
        let host_group = or_wildcard(host_group).to_string();
        let target_group = or_wildcard(target_group).to_string();

        let mut state = self.state.write().await;
        if host_group != WILDCARD_GROUP && !state.host_groups.contains_key(&host_group) {
            return Err(RuntimeError::not_found("HostGroup", host_group));
        }
        if target_group != WILDCARD_GROUP && !state.target_groups.contains_key(&target_group) {
            return Err(RuntimeError::not_found("TargetGroup", target_group));
        }

        let lun = match lun {
            Some(n) if state.lun_in_use(&host_group, n) => {
                return Err(stmf_failure(
                    format!("stmfadm add-view -n {} {}", n, id),
                    "stmfadm: LUN already in use",
                ));
            }
            Some(n) => n,
            None => {
                let used: Vec<u16> = state
                    .units
                    .values()
                    .flat_map(|u| u.views.iter())
                    .filter(|v| v.host_group == host_group)
                    .map(|v| v.lun)
                    .collect();
                lowest_unused(used)
            }
        };

        let unit = state.live_unit(id)?;
        if unit
            .views
            .iter()
            .any(|v| v.host_group == host_group && v.target_group == target_group)
        {
            return Err(stmf_failure(
                format!("stmfadm add-view {}", id),
                "stmfadm: view entry exists",
            ));
        }
        let entry_number = lowest_unused(unit.views.iter().map(|v| v.entry_number));
        unit.views.push(View {
            entry_number,
            host_group,
            target_group,
            lun,
        });
        unit.views.sort_by_key(|v| v.entry_number);
        Ok(())
    }

    async fn list_views(&self, id: &str) -> Result<Vec<View>> {
        let mut state = self.state.write().await;
        Ok(state.live_unit(id)?.views.clone())
    }

    async fn remove_view(&self, id: &str, entry: u16) -> Result<()> {
        let mut state = self.state.write().await;
        let unit = state.live_unit(id)?;
        let before = unit.views.len();
        unit.views.retain(|v| v.entry_number != entry);
        if unit.views.len() == before {
            return Err(RuntimeError::not_found("View", format!("{}/{}", id, entry)));
        }
        Ok(())
    }

    async fn remove_all_views(&self, id: &str) -> Result<()> {
        let mut state = self.state.write().await;
        state.live_unit(id)?.views.clear();
        Ok(())
    }

    async fn list_host_groups(&self) -> Result<Vec<HostGroup>> {
        let state = self.state.read().await;
        Ok(state
            .host_groups
            .iter()
            .map(|(name, members)| HostGroup {
                name: name.clone(),
                members: members.clone(),
            })
            .collect())
    }

    async fn get_host_group(&self, name: &str) -> Result<HostGroup> {
        let state = self.state.read().await;
        state
            .host_groups
            .get(name)
            .map(|members| HostGroup {
                name: name.to_string(),
                members: members.clone(),
            })
            .ok_or_else(|| RuntimeError::not_found("HostGroup", name))
    }

    async fn create_host_group(&self, name: &str) -> Result<()> {
        let mut state = self.state.write().await;
        if state.host_groups.contains_key(name) {
            return Err(RuntimeError::already_exists("HostGroup", name));
        }
        state.host_groups.insert(name.to_string(), Vec::new());
        Ok(())
    }

    async fn delete_host_group(&self, name: &str) -> Result<()> {
        let mut state = self.state.write().await;
        state
            .host_groups
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| RuntimeError::not_found("HostGroup", name))
    }

    async fn add_host_group_member(&self, group: &str, member: &str, force: bool) -> Result<()> {
        let mut state = self.state.write().await;
        if !state.host_groups.contains_key(group) {
            return Err(RuntimeError::not_found("HostGroup", group));
        }
        let elsewhere = state
            .host_groups
            .iter()
            .any(|(name, members)| name != group && members.iter().any(|m| m == member));
        if elsewhere && !force {
            return Err(stmf_failure(
                format!("stmfadm add-hg-member -g {} {}", group, member),
                format!("stmfadm: {}: already exists in another host group", member),
            ));
        }

        let members = state
            .host_groups
            .get_mut(group)
            .ok_or_else(|| RuntimeError::not_found("HostGroup", group))?;
        if members.iter().any(|m| m == member) {
            return Err(RuntimeError::already_exists("HostGroupMember", member));
        }
        members.push(member.to_string());
        Ok(())
    }

    async fn remove_host_group_member(&self, group: &str, member: &str) -> Result<()> {
        let mut state = self.state.write().await;
        let members = state
            .host_groups
            .get_mut(group)
            .ok_or_else(|| RuntimeError::not_found("HostGroup", group))?;
        let before = members.len();
        members.retain(|m| m != member);
        if members.len() == before {
            return Err(RuntimeError::not_found("HostGroupMember", member));
        }
        Ok(())
    }

    async fn list_target_groups(&self) -> Result<Vec<TargetGroup>> {
        let state = self.state.read().await;
        Ok(state
            .target_groups
            .iter()
            .map(|(name, members)| TargetGroup {
                name: name.clone(),
                members: members.clone(),
            })
            .collect())
    }

    async fn get_target_group(&self, name: &str) -> Result<TargetGroup> {
        let state = self.state.read().await;
        state
            .target_groups
            .get(name)
            .map(|members| TargetGroup {
                name: name.to_string(),
                members: members.clone(),
            })
            .ok_or_else(|| RuntimeError::not_found("TargetGroup", name))
    }

    async fn create_target_group(&self, name: &str) -> Result<()> {
        let mut state = self.state.write().await;
        if state.target_groups.contains_key(name) {
            return Err(RuntimeError::already_exists("TargetGroup", name));
        }
        state.target_groups.insert(name.to_string(), Vec::new());
        Ok(())
    }

    async fn delete_target_group(&self, name: &str) -> Result<()> {
        let mut state = self.state.write().await;
        state
            .target_groups
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| RuntimeError::not_found("TargetGroup", name))
    }

    async fn add_target_group_member(&self, group: &str, member: &str) -> Result<()> {
        let mut state = self.state.write().await;
        let members = state
            .target_groups
            .get_mut(group)
            .ok_or_else(|| RuntimeError::not_found("TargetGroup", group))?;
        if members.iter().any(|m| m == member) {
            return Err(RuntimeError::already_exists("TargetGroupMember", member));
        }
        members.push(member.to_string());
        Ok(())
    }

    async fn remove_target_group_member(&self, group: &str, member: &str) -> Result<()> {
        let mut state = self.state.write().await;
        let members = state
            .target_groups
            .get_mut(group)
            .ok_or_else(|| RuntimeError::not_found("TargetGroup", group))?;
        let before = members.len();
        members.retain(|m| m != member);
        if members.len() == before {
            return Err(RuntimeError::not_found("TargetGroupMember", member));
        }
        Ok(())
    }

    async fn backup_configuration(&self, pool: &str) -> Result<()> {
        if self.fail_backup {
            return Err(stmf_failure(
                format!("stmfha backup {}", pool),
                "stmfha: cluster service unavailable",
            ));
        }
        self.state.write().await.backups.push(pool.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zfs::{DestroyOptions, VolumeSpec};

    async fn setup() -> (Arc<MockDatasetManager>, MockTargetFramework) {
        let zfs = Arc::new(MockDatasetManager::with_pools(&["tank"]));
        zfs.create_filesystem("tank/proj", 0, &Vec::new()).await.unwrap();
        zfs.create_volume("tank/proj/vol1", &VolumeSpec::new(1 << 20))
            .await
            .unwrap();
        let stmf = MockTargetFramework::new(zfs.clone());
        (zfs, stmf)
    }

    #[tokio::test]
    async fn test_backing_store_must_be_a_volume() {
        let (_zfs, stmf) = setup().await;
        let err = stmf
            .create_logical_unit("tank/proj", &LuOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, RuntimeError::CommandFailed { .. }));

        let lu = stmf
            .create_logical_unit("tank/proj/vol1", &LuOptions::default().with_alias("vol1"))
            .await
            .unwrap();
        assert_eq!(lu.size, 1 << 20);
        assert_eq!(lu.block_size, 4096);
        assert_eq!(lu.alias, "vol1");
        assert_eq!(lu.id.len(), 32);
    }

    #[tokio::test]
    async fn test_bound_volume_is_busy_until_unit_deleted() {
        let (zfs, stmf) = setup().await;
        let lu = stmf
            .create_logical_unit("tank/proj/vol1", &LuOptions::default())
            .await
            .unwrap();
        assert!(zfs
            .destroy("tank/proj/vol1", DestroyOptions::default())
            .await
            .is_err());

        stmf.delete_logical_unit(&lu.id, false).await.unwrap();
        zfs.destroy("tank/proj/vol1", DestroyOptions::default())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_view_count_tracks_views() {
        let (_zfs, stmf) = setup().await;
        stmf.create_host_group("hg1").await.unwrap();
        let lu = stmf
            .create_logical_unit("tank/proj/vol1", &LuOptions::default())
            .await
            .unwrap();

        stmf.add_view(&lu.id, "hg1", "", None).await.unwrap();
        stmf.add_view(&lu.id, "", "", Some(5)).await.unwrap();
        let views = stmf.list_views(&lu.id).await.unwrap();
        assert_eq!(views.len(), 2);
        assert_eq!(views[0].target_group, WILDCARD_GROUP);
        assert_eq!(views[0].lun, 0);
        assert_eq!(views[1].host_group, WILDCARD_GROUP);
        assert_eq!(views[1].lun, 5);
        assert_eq!(stmf.get_logical_unit(&lu.id).await.unwrap().view_count, 2);

        // same group pair twice
        assert!(stmf.add_view(&lu.id, "hg1", "", None).await.is_err());
        // unknown group
        assert!(stmf
            .add_view(&lu.id, "nope", "", None)
            .await
            .unwrap_err()
            .is_not_found());

        stmf.remove_view(&lu.id, 0).await.unwrap();
        assert_eq!(stmf.get_logical_unit(&lu.id).await.unwrap().view_count, 1);
        stmf.remove_all_views(&lu.id).await.unwrap();
        assert!(stmf.list_views(&lu.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_keep_views_restores_on_same_guid() {
        let (_zfs, stmf) = setup().await;
        let lu = stmf
            .create_logical_unit("tank/proj/vol1", &LuOptions::default().with_alias("vol1"))
            .await
            .unwrap();
        stmf.add_view(&lu.id, "", "", None).await.unwrap();

        stmf.delete_logical_unit(&lu.id, true).await.unwrap();
        assert!(stmf.get_logical_unit(&lu.id).await.unwrap_err().is_not_found());

        let again = stmf
            .create_logical_unit(
                "tank/proj/vol1",
                &LuOptions::default().with_guid(lu.id.clone()).with_alias("vol1"),
            )
            .await
            .unwrap();
        assert_eq!(again.id, lu.id);
        assert_eq!(again.view_count, 1);
    }

    #[tokio::test]
    async fn test_lingering_delete_is_listed_then_committed() {
        let (_zfs, stmf) = setup().await;
        let stmf = stmf.with_linger(2);
        let lu = stmf
            .create_logical_unit("tank/proj/vol1", &LuOptions::default())
            .await
            .unwrap();
        stmf.delete_logical_unit(&lu.id, false).await.unwrap();

        let first = stmf.list_logical_units().await.unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].access_state, DELETING);
        assert!(stmf.get_logical_unit(&lu.id).await.is_err());

        assert_eq!(stmf.list_logical_units().await.unwrap().len(), 1);
        assert!(stmf.list_logical_units().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_host_group_membership() {
        let (_zfs, stmf) = setup().await;
        stmf.create_host_group("hg1").await.unwrap();
        stmf.create_host_group("hg2").await.unwrap();
        assert!(matches!(
            stmf.create_host_group("hg1").await.unwrap_err(),
            RuntimeError::AlreadyExists { .. }
        ));

        let iqn = "iqn.1986-03.com.sun:01:host1";
        stmf.add_host_group_member("hg1", iqn, false).await.unwrap();
        assert!(stmf.add_host_group_member("hg2", iqn, false).await.is_err());
        stmf.add_host_group_member("hg2", iqn, true).await.unwrap();

        assert_eq!(stmf.get_host_group("hg2").await.unwrap().members, vec![iqn]);
        stmf.remove_host_group_member("hg1", iqn).await.unwrap();
        assert!(stmf
            .remove_host_group_member("hg1", iqn)
            .await
            .unwrap_err()
            .is_not_found());
        stmf.delete_host_group("hg1").await.unwrap();
        assert_eq!(stmf.list_host_groups().await.unwrap().len(), 1);
    }
}
