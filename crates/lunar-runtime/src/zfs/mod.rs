mod cli;
mod mock;

pub use cli::ZfsCli;
pub use mock::MockDatasetManager;

use crate::error::Result;
use async_trait::async_trait;
use lunar_core::{Dataset, DatasetKind, DatasetProperties};

/// Ordered `-o property=value` options
pub type PropertyList = Vec<(String, String)>;

/// Parameters for a new volume dataset
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VolumeSpec {
    /// `volsize` in bytes
    pub size: u64,
    /// Sparse volume without a refreservation (`-s`)
    pub sparse: bool,
    pub properties: PropertyList,
}

impl VolumeSpec {
    pub fn new(size: u64) -> Self {
        Self {
            size,
            ..Default::default()
        }
    }

    pub fn sparse(self, sparse: bool) -> Self {
        Self { sparse, ..self }
    }

    pub fn property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.push((name.into(), value.into()));
        self
    }
}

/// Flags for `zfs destroy`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DestroyOptions {
    /// Destroy children and snapshots (`-r`)
    pub recursive: bool,
    /// Also destroy dependents outside the hierarchy, such as clones (`-R`)
    pub dependents: bool,
}

/// The volume/filesystem manager
///
/// `ZfsCli` drives the `zfs` command. `MockDatasetManager` keeps the
/// hierarchy in memory and enforces the same dependency rules.
#[async_trait]
pub trait DatasetManager: Send + Sync {
    /// List datasets of `kind` under `base` (names and kinds only)
    async fn list(
        &self,
        kind: DatasetKind,
        base: &str,
        recursive: bool,
        depth: Option<u32>,
    ) -> Result<Vec<Dataset>>;

    /// Whether a dataset with this name exists
    async fn exists(&self, name: &str) -> Result<bool>;

    /// Create a filesystem with a mandatory quota
    async fn create_filesystem(
        &self,
        name: &str,
        quota: u64,
        properties: &PropertyList,
    ) -> Result<Dataset>;

    /// Create a volume
    async fn create_volume(&self, name: &str, spec: &VolumeSpec) -> Result<Dataset>;

    /// Clone a snapshot into a new dataset
    async fn clone_snapshot(
        &self,
        snapshot: &str,
        clone: &str,
        properties: &PropertyList,
    ) -> Result<Dataset>;

    /// Take `dataset@snapshot`
    async fn snapshot(&self, dataset: &str, snapshot: &str) -> Result<Dataset>;

    /// Roll the owning dataset back to `snapshot` (full `ds@snap` name)
    async fn rollback(&self, snapshot: &str) -> Result<()>;

    async fn rename(&self, from: &str, to: &str) -> Result<()>;

    /// Reverse the clone/origin relationship
    async fn promote(&self, name: &str) -> Result<()>;

    async fn destroy(&self, name: &str, options: DestroyOptions) -> Result<()>;

    /// Full property dump decoded into the type-specific record
    async fn properties(&self, name: &str) -> Result<DatasetProperties>;

    async fn set_property(&self, name: &str, property: &str, value: &str) -> Result<()>;

    /// A dataset with its properties populated
    async fn get(&self, name: &str) -> Result<Dataset> {
        let properties = self.properties(name).await?;
        Ok(Dataset::new(name, properties.kind()).with_properties(properties))
    }
}
