pub mod hosts;
pub mod jobs;
pub mod projects;
pub mod snapshots;
pub mod targets;
pub mod volumes;

use lunar_core::ProjectPath;
use serde::Deserialize;

/// `/domains/{domain}/pools/{pool}`
#[derive(Debug, Deserialize)]
pub struct PoolParams {
    pub domain: String,
    pub pool: String,
}

/// `/domains/{domain}/pools/{pool}/projects/{project}`
#[derive(Debug, Deserialize)]
pub struct ProjectParams {
    pub domain: String,
    pub pool: String,
    pub project: String,
}

impl ProjectParams {
    pub fn path(&self) -> ProjectPath {
        ProjectPath::new(&self.pool, &self.domain, &self.project)
    }
}

/// `.../projects/{project}/volumes/{volume}`, where `volume` is the logical unit id
#[derive(Debug, Deserialize)]
pub struct VolumeParams {
    pub domain: String,
    pub pool: String,
    pub project: String,
    pub volume: String,
}

impl VolumeParams {
    pub fn path(&self) -> ProjectPath {
        ProjectPath::new(&self.pool, &self.domain, &self.project)
    }
}

#[derive(Debug, Deserialize)]
pub struct SnapshotParams {
    pub domain: String,
    pub pool: String,
    pub project: String,
    pub volume: String,
    pub snapshot: String,
}

impl SnapshotParams {
    pub fn path(&self) -> ProjectPath {
        ProjectPath::new(&self.pool, &self.domain, &self.project)
    }
}

/// Group name plus member, for the add/remove routes
#[derive(Debug, Deserialize)]
pub struct MemberParams {
    pub name: String,
    pub member: String,
}
