use crate::error::{Result, RuntimeError};
use crate::zfs::{DatasetManager, DestroyOptions, PropertyList, VolumeSpec};
use async_trait::async_trait;
use lunar_core::{
    decode_properties, parent_path, Dataset, DatasetKind, DatasetProperties, DecodeRules,
    PropertyMap,
};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug, Clone)]
struct Entry {
    kind: DatasetKind,
    /// Snapshot this dataset was cloned from
    origin: Option<String>,
    /// Creation order, used to find "more recent" snapshots
    txg: u64,
    properties: PropertyMap,
}

#[derive(Debug, Default)]
struct State {
    datasets: BTreeMap<String, Entry>,
    txg: u64,
    busy: HashSet<String>,
}

impl State {
    fn next_txg(&mut self) -> u64 {
        self.txg += 1;
        self.txg
    }

    fn descendants(&self, name: &str) -> Vec<String> {
        self.datasets
            .keys()
            .filter(|k| k.as_str() != name && is_within(k, name))
            .cloned()
            .collect()
    }

    fn require_parent(&self, name: &str, verb: &str) -> Result<()> {
        let parent_ok = parent_path(name)
            .and_then(|p| self.datasets.get(p))
            .map(|e| e.kind == DatasetKind::Filesystem)
            .unwrap_or(false);
        if parent_ok {
            Ok(())
        } else {
            Err(zfs_failure(
                format!("zfs {} {}", verb, name),
                format!("cannot create '{}': parent does not exist", name),
            ))
        }
    }

    fn require_absent(&self, name: &str) -> Result<()> {
        if self.datasets.contains_key(name) {
            Err(RuntimeError::already_exists("Dataset", name))
        } else {
            Ok(())
        }
    }
}

/// `name` is `base` or lives below it (children and snapshots)
fn is_within(name: &str, base: &str) -> bool {
    name == base
        || name
            .strip_prefix(base)
            .map(|rest| rest.starts_with('/') || rest.starts_with('@'))
            .unwrap_or(false)
}

/// Depth of `name` below `base`; a snapshot of `base` is at depth 1
fn depth_below(name: &str, base: &str) -> u32 {
    let rest = &name[base.len()..];
    let slashes = rest.matches('/').count() as u32;
    let snap = if rest.contains('@') { 1 } else { 0 };
    slashes + snap
}

fn zfs_failure(command: String, message: String) -> RuntimeError {
    RuntimeError::command_failed(command, 1, message)
}

fn base_properties(kind: DatasetKind, txg: u64) -> PropertyMap {
    let mut props = PropertyMap::new();
    props.insert("type".to_string(), kind.as_str().to_string());
    props.insert("creation".to_string(), (1_546_300_800 + txg).to_string());
    props.insert("used".to_string(), "0".to_string());
    props.insert("referenced".to_string(), "0".to_string());
    props.insert("compressratio".to_string(), "1.00x".to_string());
    if kind != DatasetKind::Snapshot {
        props.insert("available".to_string(), "0".to_string());
        props.insert("compression".to_string(), "off".to_string());
        props.insert("dedup".to_string(), "off".to_string());
        props.insert("reservation".to_string(), "0".to_string());
        props.insert("refreservation".to_string(), "0".to_string());
        props.insert("origin".to_string(), "-".to_string());
    }
    props
}

fn apply_properties(target: &mut PropertyMap, properties: &PropertyList) {
    for (name, value) in properties {
        target.insert(name.to_lowercase(), value.clone());
    }
}

/// In-memory dataset manager for testing on non-illumos platforms
///
/// Enforces the rules the orchestrator relies on: a parent must exist, a
/// clone pins its origin snapshot, children need `-r`, dependents need `-R`,
/// rollback refuses when newer snapshots exist, and a volume held open by a
/// logical unit is busy.
pub struct MockDatasetManager {
    state: Arc<RwLock<State>>,
    rules: DecodeRules,
}

impl MockDatasetManager {
    /// Create a manager with the given pools as root filesystems
    pub fn with_pools(pools: &[&str]) -> Self {
        let mut state = State::default();
        for pool in pools {
            let txg = state.next_txg();
            state.datasets.insert(
                pool.to_string(),
                Entry {
                    kind: DatasetKind::Filesystem,
                    origin: None,
                    txg,
                    properties: base_properties(DatasetKind::Filesystem, txg),
                },
            );
        }
        Self {
            state: Arc::new(RwLock::new(state)),
            rules: DecodeRules::default(),
        }
    }

    pub fn with_rules(self, rules: DecodeRules) -> Self {
        Self { rules, ..self }
    }

    /// Kind of an existing dataset
    pub async fn kind_of(&self, name: &str) -> Option<DatasetKind> {
        self.state.read().await.datasets.get(name).map(|e| e.kind)
    }

    /// Mark a dataset as held open (by a logical unit)
    pub async fn set_busy(&self, name: &str, busy: bool) {
        let mut state = self.state.write().await;
        if busy {
            state.busy.insert(name.to_string());
        } else {
            state.busy.remove(name);
        }
    }

    /// All dataset names, sorted
    pub async fn names(&self) -> Vec<String> {
        self.state.read().await.datasets.keys().cloned().collect()
    }
}

#[async_trait]
impl DatasetManager for MockDatasetManager {
    async fn list(
        &self,
        kind: DatasetKind,
        base: &str,
        recursive: bool,
        depth: Option<u32>,
    ) -> Result<Vec<Dataset>> {
        let state = self.state.read().await;
        if !base.is_empty() && !state.datasets.contains_key(base) {
            return Err(RuntimeError::not_found("Dataset", base));
        }

        let limit = match (recursive, depth) {
            (_, Some(d)) => d,
            (true, None) => u32::MAX,
            (false, None) => 0,
        };

        Ok(state
            .datasets
            .iter()
            .filter(|(name, entry)| {
                entry.kind == kind
                    && (base.is_empty() || (is_within(name, base) && depth_below(name, base) <= limit))
            })
            .map(|(name, entry)| Dataset::new(name.clone(), entry.kind))
            .collect())
    }

    async fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.state.read().await.datasets.contains_key(name))
    }

    async fn create_filesystem(
        &self,
        name: &str,
        quota: u64,
        properties: &PropertyList,
    ) -> Result<Dataset> {
        {
            let mut state = self.state.write().await;
            state.require_absent(name)?;
            state.require_parent(name, "create")?;

            let txg = state.next_txg();
            let mut props = base_properties(DatasetKind::Filesystem, txg);
            props.insert("quota".to_string(), quota.to_string());
            apply_properties(&mut props, properties);

            state.datasets.insert(
                name.to_string(),
                Entry {
                    kind: DatasetKind::Filesystem,
                    origin: None,
                    txg,
                    properties: props,
                },
            );
        }
        debug!("Mock: created filesystem {}", name);
        self.get(name).await
    }

    async fn create_volume(&self, name: &str, spec: &VolumeSpec) -> Result<Dataset> {
        {
            let mut state = self.state.write().await;
            state.require_absent(name)?;
            state.require_parent(name, "create")?;

            let txg = state.next_txg();
            let mut props = base_properties(DatasetKind::Volume, txg);
            props.insert("volsize".to_string(), spec.size.to_string());
            props.insert("volblocksize".to_string(), "8192".to_string());
            if !spec.sparse {
                props.insert("refreservation".to_string(), spec.size.to_string());
            }
            apply_properties(&mut props, &spec.properties);

            state.datasets.insert(
                name.to_string(),
                Entry {
                    kind: DatasetKind::Volume,
                    origin: None,
                    txg,
                    properties: props,
                },
            );
        }
        debug!("Mock: created volume {}", name);
        self.get(name).await
    }

    async fn clone_snapshot(
        &self,
        snapshot: &str,
        clone: &str,
        properties: &PropertyList,
    ) -> Result<Dataset> {
        {
            let mut state = self.state.write().await;
            let snap = state
                .datasets
                .get(snapshot)
                .filter(|e| e.kind == DatasetKind::Snapshot)
                .cloned()
                .ok_or_else(|| RuntimeError::not_found("Dataset", snapshot))?;
            state.require_absent(clone)?;
            state.require_parent(clone, "clone")?;

            let source_kind = snapshot
                .split_once('@')
                .and_then(|(ds, _)| state.datasets.get(ds))
                .map(|e| e.kind)
                .unwrap_or(DatasetKind::Filesystem);

            let txg = state.next_txg();
            let mut props = base_properties(source_kind, txg);
            for key in ["volsize", "volblocksize", "compression", "quota"] {
                if let Some(v) = snap.properties.get(key) {
                    props.insert(key.to_string(), v.clone());
                }
            }
            props.insert("origin".to_string(), snapshot.to_string());
            apply_properties(&mut props, properties);

            state.datasets.insert(
                clone.to_string(),
                Entry {
                    kind: source_kind,
                    origin: Some(snapshot.to_string()),
                    txg,
                    properties: props,
                },
            );
        }
        debug!("Mock: cloned {} into {}", snapshot, clone);
        self.get(clone).await
    }

    async fn snapshot(&self, dataset: &str, snapshot: &str) -> Result<Dataset> {
        let snap = format!("{}@{}", dataset, snapshot);
        {
            let mut state = self.state.write().await;
            let source = state
                .datasets
                .get(dataset)
                .filter(|e| e.kind != DatasetKind::Snapshot)
                .cloned()
                .ok_or_else(|| RuntimeError::not_found("Dataset", dataset))?;
            state.require_absent(&snap)?;

            let txg = state.next_txg();
            let mut props = base_properties(DatasetKind::Snapshot, txg);
            // frozen copies used by rollback and clone
            for key in [
                "volsize",
                "volblocksize",
                "compression",
                "quota",
                "custom:alias",
                "custom:sflag",
            ] {
                if let Some(v) = source.properties.get(key) {
                    props.insert(key.to_string(), v.clone());
                }
            }

            state.datasets.insert(
                snap.clone(),
                Entry {
                    kind: DatasetKind::Snapshot,
                    origin: None,
                    txg,
                    properties: props,
                },
            );
        }
        debug!("Mock: created snapshot {}", snap);
        self.get(&snap).await
    }

    async fn rollback(&self, snapshot: &str) -> Result<()> {
        let mut state = self.state.write().await;
        let snap = state
            .datasets
            .get(snapshot)
            .filter(|e| e.kind == DatasetKind::Snapshot)
            .cloned()
            .ok_or_else(|| RuntimeError::not_found("Dataset", snapshot))?;
        let (dataset, _) = snapshot
            .split_once('@')
            .ok_or_else(|| RuntimeError::not_found("Dataset", snapshot))?;

        let prefix = format!("{}@", dataset);
        let newer: Vec<String> = state
            .datasets
            .iter()
            .filter(|(k, e)| k.starts_with(&prefix) && e.txg > snap.txg)
            .map(|(k, _)| k.clone())
            .collect();
        if !newer.is_empty() {
            return Err(zfs_failure(
                format!("zfs rollback {}", snapshot),
                format!(
                    "cannot rollback to '{}': more recent snapshots or bookmarks exist\nuse '-r' to force deletion of the following snapshots and bookmarks:\n{}",
                    snapshot,
                    newer.join("\n")
                ),
            ));
        }

        if let Some(entry) = state.datasets.get_mut(dataset) {
            if let Some(size) = snap.properties.get("volsize") {
                entry.properties.insert("volsize".to_string(), size.clone());
            }
        }
        debug!("Mock: rolled back to {}", snapshot);
        Ok(())
    }

    async fn rename(&self, from: &str, to: &str) -> Result<()> {
        let mut state = self.state.write().await;
        if !state.datasets.contains_key(from) {
            return Err(RuntimeError::not_found("Dataset", from));
        }
        state.require_absent(to)?;
        if !from.contains('@') {
            state.require_parent(to, "rename")?;
        }

        let moved: Vec<String> = state
            .datasets
            .keys()
            .filter(|k| is_within(k, from))
            .cloned()
            .collect();
        for old in moved {
            let new = format!("{}{}", to, &old[from.len()..]);
            if let Some(entry) = state.datasets.remove(&old) {
                state.datasets.insert(new.clone(), entry);
            }
            for entry in state.datasets.values_mut() {
                if entry.origin.as_deref() == Some(old.as_str()) {
                    entry.origin = Some(new.clone());
                    entry.properties.insert("origin".to_string(), new.clone());
                }
            }
            if state.busy.remove(&old) {
                state.busy.insert(new);
            }
        }
        debug!("Mock: renamed {} -> {}", from, to);
        Ok(())
    }

    async fn promote(&self, name: &str) -> Result<()> {
        let mut state = self.state.write().await;
        let origin = state
            .datasets
            .get(name)
            .ok_or_else(|| RuntimeError::not_found("Dataset", name))?
            .origin
            .clone()
            .ok_or_else(|| {
                zfs_failure(
                    format!("zfs promote {}", name),
                    format!("cannot promote '{}': not a cloned filesystem", name),
                )
            })?;

        let (source, snap) = origin
            .split_once('@')
            .map(|(s, n)| (s.to_string(), n.to_string()))
            .ok_or_else(|| RuntimeError::internal_error(format!("bad origin '{}'", origin)))?;
        let moved_snap = format!("{}@{}", name, snap);

        if let Some(entry) = state.datasets.remove(&origin) {
            state.datasets.insert(moved_snap.clone(), entry);
        }
        for (k, entry) in state.datasets.iter_mut() {
            if k == name {
                entry.origin = None;
                entry.properties.insert("origin".to_string(), "-".to_string());
            } else if k == &source || entry.origin.as_deref() == Some(origin.as_str()) {
                entry.origin = Some(moved_snap.clone());
                entry.properties.insert("origin".to_string(), moved_snap.clone());
            }
        }
        debug!("Mock: promoted {}", name);
        Ok(())
    }

    async fn destroy(&self, name: &str, options: DestroyOptions) -> Result<()> {
        let mut state = self.state.write().await;
        let kind = state
            .datasets
            .get(name)
            .map(|e| e.kind)
            .ok_or_else(|| RuntimeError::not_found("Dataset", name))?;
        let command = format!("zfs destroy {}", name);

        let mut doomed: BTreeSet<String> = BTreeSet::new();
        doomed.insert(name.to_string());

        let children = state.descendants(name);
        if !children.is_empty() && !(options.recursive || options.dependents) {
            return Err(zfs_failure(
                command,
                format!(
                    "cannot destroy '{}': {} has children\nuse '-r' to destroy the following datasets:\n{}",
                    name,
                    kind,
                    children.join("\n")
                ),
            ));
        }
        doomed.extend(children);

        loop {
            let clones: Vec<String> = state
                .datasets
                .iter()
                .filter(|(k, e)| {
                    !doomed.contains(k.as_str())
                        && e.origin.as_ref().map(|o| doomed.contains(o)).unwrap_or(false)
                })
                .map(|(k, _)| k.clone())
                .collect();
            if clones.is_empty() {
                break;
            }
            if !options.dependents {
                return Err(zfs_failure(
                    command,
                    format!(
                        "cannot destroy '{}': snapshot has dependent clones\nuse '-R' to destroy the following datasets:\n{}",
                        name,
                        clones.join("\n")
                    ),
                ));
            }
            for clone in clones {
                let below = state.descendants(&clone);
                doomed.insert(clone);
                doomed.extend(below);
            }
        }

        if let Some(busy) = doomed.iter().find(|d| state.busy.contains(d.as_str())) {
            return Err(zfs_failure(
                command,
                format!("cannot destroy '{}': dataset is busy", busy),
            ));
        }

        for d in &doomed {
            state.datasets.remove(d);
        }
        debug!("Mock: destroyed {:?}", doomed);
        Ok(())
    }

    async fn properties(&self, name: &str) -> Result<DatasetProperties> {
        let state = self.state.read().await;
        let entry = state
            .datasets
            .get(name)
            .ok_or_else(|| RuntimeError::not_found("Dataset", name))?;

        let mut map = entry.properties.clone();
        if entry.kind == DatasetKind::Snapshot {
            let clones: Vec<&str> = state
                .datasets
                .iter()
                .filter(|(_, e)| e.origin.as_deref() == Some(name))
                .map(|(k, _)| k.as_str())
                .collect();
            map.insert("clones".to_string(), clones.join(","));
        }

        // render as the tool would print it: an empty value is an empty cell
        let rows: Vec<Vec<String>> = map
            .into_iter()
            .map(|(k, v)| if v.is_empty() { vec![k] } else { vec![k, v] })
            .collect();
        let command = format!("zfs get -Hp -o property,value all {}", name);
        Ok(decode_properties(&rows, &self.rules, &command)?)
    }

    async fn set_property(&self, name: &str, property: &str, value: &str) -> Result<()> {
        let mut state = self.state.write().await;
        let entry = state
            .datasets
            .get_mut(name)
            .ok_or_else(|| RuntimeError::not_found("Dataset", name))?;
        entry
            .properties
            .insert(property.to_lowercase(), value.to_string());
        debug!("Mock: set {}={} on {}", property, value, name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn project() -> MockDatasetManager {
        let zfs = MockDatasetManager::with_pools(&["tank"]);
        zfs.create_filesystem("tank/dom", 0, &Vec::new()).await.unwrap();
        zfs.create_filesystem("tank/dom/proj", 500 * 1024 * 1024, &Vec::new())
            .await
            .unwrap();
        zfs
    }

    #[tokio::test]
    async fn test_parent_must_exist() {
        let zfs = MockDatasetManager::with_pools(&["tank"]);
        let err = zfs
            .create_volume("tank/missing/vol", &VolumeSpec::new(1024))
            .await
            .unwrap_err();
        assert!(matches!(err, RuntimeError::CommandFailed { .. }));
    }

    #[tokio::test]
    async fn test_duplicate_is_already_exists() {
        let zfs = project().await;
        zfs.create_volume("tank/dom/proj/v", &VolumeSpec::new(1024))
            .await
            .unwrap();
        let err = zfs
            .create_volume("tank/dom/proj/v", &VolumeSpec::new(1024))
            .await
            .unwrap_err();
        assert!(matches!(err, RuntimeError::AlreadyExists { .. }));
    }

    #[tokio::test]
    async fn test_volume_properties_round_through_decoder() {
        let zfs = project().await;
        let spec = VolumeSpec::new(256 * 1024 * 1024)
            .property("compression", "lz4")
            .property("custom:alias", "vol1");
        let ds = zfs.create_volume("tank/dom/proj/vol1", &spec).await.unwrap();
        let props = ds.properties.unwrap();
        let vol = props.as_volume().unwrap();
        assert_eq!(vol.volsize, 256 * 1024 * 1024);
        assert_eq!(vol.volblocksize, 8192);
        assert_eq!(vol.compression, "lz4");
        assert_eq!(vol.alias, "vol1");
        assert_eq!(vol.refreservation, 256 * 1024 * 1024);
    }

    #[tokio::test]
    async fn test_list_depth_and_kind() {
        let zfs = project().await;
        zfs.create_volume("tank/dom/proj/v1", &VolumeSpec::new(1024))
            .await
            .unwrap();
        zfs.snapshot("tank/dom/proj/v1", "s1").await.unwrap();

        let projects = zfs
            .list(DatasetKind::Filesystem, "tank/dom", true, Some(1))
            .await
            .unwrap();
        let names: Vec<_> = projects.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["tank/dom", "tank/dom/proj"]);

        let snaps = zfs
            .list(DatasetKind::Snapshot, "tank/dom/proj/v1", true, Some(1))
            .await
            .unwrap();
        assert_eq!(snaps.len(), 1);
        assert_eq!(snaps[0].name, "tank/dom/proj/v1@s1");

        let err = zfs
            .list(DatasetKind::Volume, "tank/nope", true, None)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_snapshot_clone_destroy_ordering() {
        let zfs = project().await;
        zfs.create_volume("tank/dom/proj/v1", &VolumeSpec::new(1024))
            .await
            .unwrap();
        zfs.snapshot("tank/dom/proj/v1", "s1").await.unwrap();
        zfs.clone_snapshot("tank/dom/proj/v1@s1", "tank/dom/proj/c1", &Vec::new())
            .await
            .unwrap();

        let snap = zfs.get("tank/dom/proj/v1@s1").await.unwrap();
        assert_eq!(
            snap.properties.unwrap().as_snapshot().unwrap().clones,
            "tank/dom/proj/c1"
        );

        // snapshot is pinned by the clone
        let err = zfs
            .destroy("tank/dom/proj/v1@s1", DestroyOptions::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("dependent clones"));

        // volume has a snapshot child
        let err = zfs
            .destroy("tank/dom/proj/v1", DestroyOptions::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("has children"));

        zfs.destroy("tank/dom/proj/c1", DestroyOptions::default())
            .await
            .unwrap();
        let snap = zfs.get("tank/dom/proj/v1@s1").await.unwrap();
        assert_eq!(snap.properties.unwrap().as_snapshot().unwrap().clones, "none");

        zfs.destroy("tank/dom/proj/v1@s1", DestroyOptions::default())
            .await
            .unwrap();
        zfs.destroy("tank/dom/proj/v1", DestroyOptions::default())
            .await
            .unwrap();
        assert!(!zfs.exists("tank/dom/proj/v1").await.unwrap());
    }

    #[tokio::test]
    async fn test_destroy_dependents_takes_clones() {
        let zfs = project().await;
        zfs.create_volume("tank/dom/proj/v1", &VolumeSpec::new(1024))
            .await
            .unwrap();
        zfs.snapshot("tank/dom/proj/v1", "s1").await.unwrap();
        zfs.clone_snapshot("tank/dom/proj/v1@s1", "tank/dom/proj/c1", &Vec::new())
            .await
            .unwrap();

        let err = zfs
            .destroy(
                "tank/dom/proj",
                DestroyOptions {
                    recursive: true,
                    dependents: false,
                },
            )
            .await;
        // clone lives inside the hierarchy, so -r covers it
        assert!(err.is_ok());
        assert_eq!(zfs.names().await, vec!["tank", "tank/dom"]);
    }

    #[tokio::test]
    async fn test_busy_volume_cannot_be_destroyed() {
        let zfs = project().await;
        zfs.create_volume("tank/dom/proj/v1", &VolumeSpec::new(1024))
            .await
            .unwrap();
        zfs.set_busy("tank/dom/proj/v1", true).await;
        let err = zfs
            .destroy("tank/dom/proj/v1", DestroyOptions::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("busy"));

        zfs.set_busy("tank/dom/proj/v1", false).await;
        zfs.destroy("tank/dom/proj/v1", DestroyOptions::default())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_rollback_restores_size_and_refuses_newer_snapshots() {
        let zfs = project().await;
        zfs.create_volume("tank/dom/proj/v1", &VolumeSpec::new(1024))
            .await
            .unwrap();
        zfs.snapshot("tank/dom/proj/v1", "s1").await.unwrap();
        zfs.set_property("tank/dom/proj/v1", "volsize", "2048")
            .await
            .unwrap();

        zfs.rollback("tank/dom/proj/v1@s1").await.unwrap();
        let props = zfs.properties("tank/dom/proj/v1").await.unwrap();
        assert_eq!(props.as_volume().unwrap().volsize, 1024);

        zfs.snapshot("tank/dom/proj/v1", "s2").await.unwrap();
        let err = zfs.rollback("tank/dom/proj/v1@s1").await.unwrap_err();
        assert!(err.to_string().contains("more recent snapshots"));
    }

    #[tokio::test]
    async fn test_rename_and_promote() {
        let zfs = project().await;
        zfs.create_volume("tank/dom/proj/v1", &VolumeSpec::new(1024))
            .await
            .unwrap();
        zfs.snapshot("tank/dom/proj/v1", "s1").await.unwrap();
        zfs.clone_snapshot("tank/dom/proj/v1@s1", "tank/dom/proj/c1", &Vec::new())
            .await
            .unwrap();

        zfs.promote("tank/dom/proj/c1").await.unwrap();
        assert!(zfs.exists("tank/dom/proj/c1@s1").await.unwrap());
        // former origin now depends on the promoted clone's snapshot
        let err = zfs
            .destroy("tank/dom/proj/c1@s1", DestroyOptions::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("dependent clones"));

        zfs.rename("tank/dom/proj/c1", "tank/dom/proj/main")
            .await
            .unwrap();
        assert!(zfs.exists("tank/dom/proj/main@s1").await.unwrap());
        let v1 = zfs.get("tank/dom/proj/v1").await.unwrap();
        assert_eq!(
            v1.properties.unwrap().as_volume().unwrap().origin,
            "tank/dom/proj/main@s1"
        );
    }
}
