use super::{Orchestrator, MANAGED_SERVICE_FLAG};
use crate::error::{Result, RuntimeError};
use crate::stmf::LuOptions;
use crate::zfs::{DestroyOptions, VolumeSpec};
use lunar_core::{
    or_wildcard, parent_path, validate_component, validate_size, CloneVolumeRequest,
    CreateVolumeRequest, Dataset, DatasetKind, ExportRequest, LogicalUnit, LunarError,
    ProjectPath, ResizeVolumeRequest, View, DEFAULT_VOLBLOCKSIZE, SERVICE_FLAG_PROPERTY,
};
use tracing::{info, warn};
use uuid::Uuid;

/// Value the framework prints for an unset serial number
const UNSET_SERIAL: &str = "not set";

fn snapshot_dataset(volume: &LogicalUnit, snapshot: &str) -> String {
    format!("{}@{}", volume.backing_store, snapshot)
}

fn pool_of(dataset: &str) -> &str {
    dataset.split('/').next().unwrap_or(dataset)
}

impl Orchestrator {
    /// Save the framework configuration; failure is logged and swallowed
    async fn backup_best_effort(&self, pool: &str) {
        if let Err(e) = self.targets.backup_configuration(pool).await {
            warn!("Configuration backup for pool {} failed: {}", pool, e);
        }
    }

    /// Volumes whose backing dataset sits directly under the project
    pub async fn list_volumes(&self, project: &ProjectPath) -> Result<Vec<LogicalUnit>> {
        let units = {
            let _listing = self.context.listing.lock().await;
            self.targets.list_logical_units().await?
        };
        Ok(units
            .into_iter()
            .filter(|lu| lu.belongs_to(project))
            .collect())
    }

    /// The unit `id`, provided it belongs to the project
    pub async fn get_volume(&self, project: &ProjectPath, id: &str) -> Result<LogicalUnit> {
        let lu = self.targets.get_logical_unit(id).await?;
        if !lu.belongs_to(project) {
            return Err(RuntimeError::not_found("Volume", id));
        }
        Ok(lu)
    }

    /// Create the backing volume, then the logical unit on its device
    ///
    /// A unit creation failure leaves the new volume in place.
    pub async fn create_volume(
        &self,
        project: &ProjectPath,
        request: &CreateVolumeRequest,
    ) -> Result<LogicalUnit> {
        validate_component("Volume", &request.alias)?;
        validate_size("Volume", request.volsize.bytes())?;

        if !self.datasets.exists(&project.dataset()).await? {
            return Err(RuntimeError::not_found("Project", project.to_string()));
        }

        let serial = request
            .serial
            .clone()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let options = &request.options;
        let volblocksize = options
            .volblocksize
            .map(|b| b.bytes())
            .unwrap_or(DEFAULT_VOLBLOCKSIZE);
        let mut spec = VolumeSpec::new(request.volsize.bytes())
            .sparse(options.thin)
            .property("volblocksize", volblocksize.to_string());
        if let Some(compression) = options.compression.as_deref().filter(|c| !c.is_empty()) {
            spec = spec.property("compression", compression);
        }
        if let Some(dedup) = options.dedup.as_deref().filter(|d| !d.is_empty()) {
            spec = spec.property("dedup", dedup);
        }
        if let Some(reservation) = options.reservation.filter(|r| r.bytes() > 0) {
            spec = spec.property("reservation", reservation.to_string());
        }
        spec = spec.property(SERVICE_FLAG_PROPERTY, MANAGED_SERVICE_FLAG);

        let name = project.volume_dataset(&request.alias);
        self.datasets.create_volume(&name, &spec).await?;

        let mut lu_options = LuOptions::default()
            .with_alias(request.alias.as_str())
            .with_serial(serial);
        if let Some(guid) = request.guid.as_deref().filter(|g| !g.is_empty()) {
            lu_options = lu_options.with_guid(guid);
        }
        let lu = self.targets.create_logical_unit(&name, &lu_options).await?;
        info!("Volume created: {} as logical unit {}", name, lu.id);

        self.backup_best_effort(&project.pool).await;
        Ok(lu)
    }

    /// Delete the unit, wait for the deletion to settle, then destroy the volume
    ///
    /// A volume with snapshots (and so any clone of it) is refused before the
    /// unit is touched. The dataset destroy itself is never recursive.
    pub async fn destroy_volume(&self, project: &ProjectPath, id: &str) -> Result<()> {
        let lu = self.get_volume(project, id).await?;
        self.ensure_no_snapshots(&lu.backing_store).await?;

        self.delete_unit_and_settle(&lu.id, false).await?;
        self.datasets
            .destroy(&lu.backing_store, DestroyOptions::default())
            .await?;
        info!("Volume destroyed: {} (logical unit {})", lu.backing_store, lu.id);
        Ok(())
    }

    async fn ensure_no_snapshots(&self, volume: &str) -> Result<()> {
        let snapshots = self
            .datasets
            .list(DatasetKind::Snapshot, volume, true, Some(1))
            .await?;
        if snapshots.is_empty() {
            return Ok(());
        }
        let names: Vec<&str> = snapshots.iter().map(|s| s.name.as_str()).collect();
        Err(LunarError::validation_failed(
            "Volume",
            format!("{} has snapshots: {}", volume, names.join(", ")),
            "Destroy the snapshots (and any clones of them) before destroying the volume",
        )
        .into())
    }

    /// Grow a volume and record the new size in the unit's metadata
    pub async fn resize_volume(
        &self,
        project: &ProjectPath,
        id: &str,
        request: &ResizeVolumeRequest,
    ) -> Result<LogicalUnit> {
        let requested = request.volsize.bytes();
        validate_size("Volume", requested)?;
        let lu = self.get_volume(project, id).await?;

        let current = self.volsize(&lu.backing_store).await?;
        if requested < current {
            return Err(LunarError::validation_failed(
                "Volume",
                format!(
                    "cannot shrink {} from {} to {} bytes",
                    lu.backing_store, current, requested
                ),
                "Volumes can only grow; request a size at least as large as the current one",
            )
            .into());
        }

        self.datasets
            .set_property(&lu.backing_store, "volsize", &requested.to_string())
            .await?;
        // the dataset manager may round the size up to the block size
        let volsize = self.volsize(&lu.backing_store).await?;
        self.targets
            .modify_logical_unit(&lu.id, None, Some(volsize))
            .await?;

        info!("Volume resized: {} to {} bytes", lu.backing_store, volsize);
        self.targets.get_logical_unit(&lu.id).await
    }

    async fn volsize(&self, dataset: &str) -> Result<u64> {
        self.datasets
            .properties(dataset)
            .await?
            .as_volume()
            .map(|v| v.volsize)
            .ok_or_else(|| RuntimeError::not_found("Volume", dataset))
    }

    pub async fn online_volume(&self, project: &ProjectPath, id: &str) -> Result<LogicalUnit> {
        let lu = self.get_volume(project, id).await?;
        self.targets.online_logical_unit(&lu.id).await?;
        info!("Logical unit {} online", lu.id);
        self.targets.get_logical_unit(&lu.id).await
    }

    pub async fn offline_volume(&self, project: &ProjectPath, id: &str) -> Result<LogicalUnit> {
        let lu = self.get_volume(project, id).await?;
        self.targets.offline_logical_unit(&lu.id).await?;
        info!("Logical unit {} offline", lu.id);
        self.targets.get_logical_unit(&lu.id).await
    }

    /// Set the compression algorithm of the backing volume
    pub async fn set_volume_compression(
        &self,
        project: &ProjectPath,
        id: &str,
        compression: &str,
    ) -> Result<Dataset> {
        validate_component("Compression", compression)?;
        let lu = self.get_volume(project, id).await?;
        self.datasets
            .set_property(&lu.backing_store, "compression", compression)
            .await?;
        self.datasets.get(&lu.backing_store).await
    }

    pub async fn create_snapshot(
        &self,
        project: &ProjectPath,
        id: &str,
        snapshot: &str,
    ) -> Result<Dataset> {
        validate_component("Snapshot", snapshot)?;
        let lu = self.get_volume(project, id).await?;
        let created = self.datasets.snapshot(&lu.backing_store, snapshot).await?;
        info!("Snapshot created: {}", created.name);
        Ok(created)
    }

    pub async fn list_snapshots(&self, project: &ProjectPath, id: &str) -> Result<Vec<Dataset>> {
        let lu = self.get_volume(project, id).await?;
        let listed = self
            .datasets
            .list(DatasetKind::Snapshot, &lu.backing_store, true, Some(1))
            .await?;

        let mut snapshots = Vec::with_capacity(listed.len());
        for snapshot in listed {
            snapshots.push(self.datasets.get(&snapshot.name).await?);
        }
        Ok(snapshots)
    }

    pub async fn get_snapshot(
        &self,
        project: &ProjectPath,
        id: &str,
        snapshot: &str,
    ) -> Result<Dataset> {
        let lu = self.get_volume(project, id).await?;
        self.datasets.get(&snapshot_dataset(&lu, snapshot)).await
    }

    /// Destroy one snapshot; fails while clones depend on it
    pub async fn destroy_snapshot(
        &self,
        project: &ProjectPath,
        id: &str,
        snapshot: &str,
    ) -> Result<()> {
        let lu = self.get_volume(project, id).await?;
        let name = snapshot_dataset(&lu, snapshot);
        self.datasets.destroy(&name, DestroyOptions::default()).await?;
        info!("Snapshot destroyed: {}", name);
        Ok(())
    }

    /// Roll a volume back to a snapshot, keeping the unit's identity and views
    ///
    /// The unit is recreated under its old identifier and alias even when the
    /// rollback itself fails; the rollback error is returned in that case.
    pub async fn rollback_volume(
        &self,
        project: &ProjectPath,
        id: &str,
        snapshot: &str,
    ) -> Result<LogicalUnit> {
        let lu = self.get_volume(project, id).await?;
        let name = snapshot_dataset(&lu, snapshot);
        if !self.datasets.exists(&name).await? {
            return Err(RuntimeError::not_found("Snapshot", name));
        }

        let mut options = LuOptions::default()
            .with_guid(lu.id.as_str())
            .with_alias(lu.alias.as_str());
        if !lu.serial_number.is_empty() && lu.serial_number != UNSET_SERIAL {
            options = options.with_serial(lu.serial_number.as_str());
        }

        self.delete_unit_and_settle(&lu.id, true).await?;
        let rolled_back = self.datasets.rollback(&name).await;
        let recreated = self
            .targets
            .create_logical_unit(&lu.backing_store, &options)
            .await;

        rolled_back?;
        let recreated = recreated?;
        info!("Volume {} rolled back to {}", lu.backing_store, name);
        Ok(recreated)
    }

    /// Clone a snapshot next to its volume and give the clone its own unit
    pub async fn clone_snapshot(
        &self,
        project: &ProjectPath,
        id: &str,
        snapshot: &str,
        request: &CloneVolumeRequest,
    ) -> Result<LogicalUnit> {
        validate_component("Volume", &request.alias)?;
        let lu = self.get_volume(project, id).await?;

        let parent = parent_path(&lu.backing_store).ok_or_else(|| {
            RuntimeError::internal_error(format!("volume {} has no parent", lu.backing_store))
        })?;
        let clone = format!("{}/{}", parent, request.alias);
        let properties = vec![(
            SERVICE_FLAG_PROPERTY.to_string(),
            MANAGED_SERVICE_FLAG.to_string(),
        )];
        self.datasets
            .clone_snapshot(&snapshot_dataset(&lu, snapshot), &clone, &properties)
            .await?;

        let serial = request
            .serial
            .clone()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let options = LuOptions::default()
            .with_alias(request.alias.as_str())
            .with_serial(serial);
        let cloned = self.targets.create_logical_unit(&clone, &options).await?;
        info!(
            "Snapshot {}@{} cloned to {} as logical unit {}",
            lu.backing_store, snapshot, clone, cloned.id
        );

        self.backup_best_effort(pool_of(&clone)).await;
        Ok(cloned)
    }

    /// Bind the unit to a host group / target group pair
    pub async fn export_volume(
        &self,
        project: &ProjectPath,
        id: &str,
        request: &ExportRequest,
    ) -> Result<View> {
        let lu = self.get_volume(project, id).await?;
        self.targets
            .add_view(&lu.id, &request.hostgroup, &request.targetgroup, request.lun)
            .await?;

        let view = self
            .targets
            .list_views(&lu.id)
            .await?
            .into_iter()
            .find(|v| v.matches(&request.hostgroup, &request.targetgroup))
            .ok_or_else(|| RuntimeError::not_found("View", view_key(&lu.id, request)))?;
        info!(
            "Logical unit {} exported to {}/{} as LUN {}",
            lu.id, view.host_group, view.target_group, view.lun
        );
        Ok(view)
    }

    /// Remove the view bound to the request's group pair
    pub async fn unexport_volume(
        &self,
        project: &ProjectPath,
        id: &str,
        request: &ExportRequest,
    ) -> Result<LogicalUnit> {
        let lu = self.get_volume(project, id).await?;
        let view = self
            .list_views_of(&lu)
            .await?
            .into_iter()
            .find(|v| v.matches(&request.hostgroup, &request.targetgroup))
            .ok_or_else(|| RuntimeError::not_found("View", view_key(&lu.id, request)))?;

        self.targets.remove_view(&lu.id, view.entry_number).await?;
        info!(
            "Logical unit {} unexported from {}/{}",
            lu.id, view.host_group, view.target_group
        );
        self.targets.get_logical_unit(&lu.id).await
    }

    pub async fn unexport_all(&self, project: &ProjectPath, id: &str) -> Result<LogicalUnit> {
        let lu = self.get_volume(project, id).await?;
        if lu.view_count > 0 {
            self.targets.remove_all_views(&lu.id).await?;
            info!("Logical unit {} unexported everywhere", lu.id);
        }
        self.targets.get_logical_unit(&lu.id).await
    }

    pub async fn list_exports(&self, project: &ProjectPath, id: &str) -> Result<Vec<View>> {
        let lu = self.get_volume(project, id).await?;
        self.list_views_of(&lu).await
    }

    async fn list_views_of(&self, lu: &LogicalUnit) -> Result<Vec<View>> {
        if lu.view_count == 0 {
            return Ok(Vec::new());
        }
        self.targets.list_views(&lu.id).await
    }
}

fn view_key(id: &str, request: &ExportRequest) -> String {
    format!(
        "{}/{}/{}",
        id,
        or_wildcard(&request.hostgroup),
        or_wildcard(&request.targetgroup)
    )
}
