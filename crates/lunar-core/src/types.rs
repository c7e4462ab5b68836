use crate::error::{LunarError, Result};
use crate::properties::{FilesystemProperties, SnapshotProperties, VolumeProperties};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Raw-device prefix under which the dataset manager exposes volumes
pub const ZVOL_RDSK_PREFIX: &str = "/dev/zvol/rdsk/";

/// Name of the implicit wildcard host/target group
pub const WILDCARD_GROUP: &str = "All";

/// Kind of dataset in the volume manager hierarchy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetKind {
    Filesystem,
    Volume,
    Snapshot,
}

impl DatasetKind {
    /// Name used by the dataset manager's `type` property and `-t` flag
    pub fn as_str(&self) -> &'static str {
        match self {
            DatasetKind::Filesystem => "filesystem",
            DatasetKind::Volume => "volume",
            DatasetKind::Snapshot => "snapshot",
        }
    }

    /// Parse from the `type` property value
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "filesystem" => Some(DatasetKind::Filesystem),
            "volume" => Some(DatasetKind::Volume),
            "snapshot" => Some(DatasetKind::Snapshot),
            _ => None,
        }
    }
}

impl std::fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Type-specific property set of a dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DatasetProperties {
    Filesystem(FilesystemProperties),
    Volume(VolumeProperties),
    Snapshot(SnapshotProperties),
}

impl DatasetProperties {
    pub fn kind(&self) -> DatasetKind {
        match self {
            DatasetProperties::Filesystem(_) => DatasetKind::Filesystem,
            DatasetProperties::Volume(_) => DatasetKind::Volume,
            DatasetProperties::Snapshot(_) => DatasetKind::Snapshot,
        }
    }

    pub fn as_volume(&self) -> Option<&VolumeProperties> {
        match self {
            DatasetProperties::Volume(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_filesystem(&self) -> Option<&FilesystemProperties> {
        match self {
            DatasetProperties::Filesystem(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_snapshot(&self) -> Option<&SnapshotProperties> {
        match self {
            DatasetProperties::Snapshot(p) => Some(p),
            _ => None,
        }
    }
}

/// A named unit in the dataset manager's hierarchy
///
/// Identity is `name`, a slash-separated path (`pool/domain/project/leaf`)
/// with an `@snapshot` suffix for snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub name: String,
    pub kind: DatasetKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<DatasetProperties>,
}

impl Dataset {
    pub fn new(name: impl Into<String>, kind: DatasetKind) -> Self {
        Self {
            name: name.into(),
            kind,
            properties: None,
        }
    }

    /// Attach a freshly decoded property set, returning the new record
    pub fn with_properties(self, properties: DatasetProperties) -> Self {
        Self {
            kind: properties.kind(),
            properties: Some(properties),
            ..self
        }
    }

    /// Last path component (snapshot suffix included)
    pub fn leaf(&self) -> &str {
        leaf_name(&self.name)
    }

    /// Snapshot part after `@`, if this is a snapshot
    pub fn snapshot_name(&self) -> Option<&str> {
        self.name.split_once('@').map(|(_, snap)| snap)
    }
}

/// Last component of a dataset path
pub fn leaf_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Parent of a dataset path (`None` for a pool root)
pub fn parent_path(path: &str) -> Option<&str> {
    let base = path.split_once('@').map(|(ds, _)| ds).unwrap_or(path);
    base.rsplit_once('/').map(|(parent, _)| parent)
}

/// Address of a project dataset: `pool/domain/project`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectPath {
    pub pool: String,
    pub domain: String,
    pub project: String,
}

impl ProjectPath {
    pub fn new(
        pool: impl Into<String>,
        domain: impl Into<String>,
        project: impl Into<String>,
    ) -> Self {
        Self {
            pool: pool.into(),
            domain: domain.into(),
            project: project.into(),
        }
    }

    /// Dataset path of the domain containing this project
    pub fn domain_dataset(&self) -> String {
        format!("{}/{}", self.pool, self.domain)
    }

    /// Dataset path of the project itself
    pub fn dataset(&self) -> String {
        format!("{}/{}/{}", self.pool, self.domain, self.project)
    }

    /// Dataset path of a volume directly under this project
    pub fn volume_dataset(&self, volume: &str) -> String {
        format!("{}/{}", self.dataset(), volume)
    }
}

impl std::fmt::Display for ProjectPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.dataset())
    }
}

/// A filesystem dataset that groups volumes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub name: String,
    pub dataset: String,
    pub properties: FilesystemProperties,
}

/// Operational state of a logical unit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationalStatus {
    Online,
    #[default]
    Offline,
}

impl OperationalStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Online" => Some(OperationalStatus::Online),
            "Offline" => Some(OperationalStatus::Offline),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationalStatus::Online => "Online",
            OperationalStatus::Offline => "Offline",
        }
    }
}

impl std::fmt::Display for OperationalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// SCSI logical unit as reported by `stmfadm list-lu -v`
///
/// `id` is the GUID assigned by the target framework and is independent of
/// the backing dataset's name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogicalUnit {
    pub id: String,
    pub operational_status: OperationalStatus,
    pub provider_name: String,
    pub alias: String,
    pub view_count: u64,
    pub data_file: String,
    /// Dataset name derived from `data_file`
    pub backing_store: String,
    pub meta_file: String,
    pub size: u64,
    pub block_size: u16,
    pub management_url: String,
    pub vendor_id: String,
    pub product_id: String,
    pub serial_number: String,
    pub write_protect: String,
    pub write_cache_mode_select: String,
    pub writeback_cache: String,
    pub access_state: String,
}

impl LogicalUnit {
    /// Project dataset the backing volume lives in
    pub fn project_dataset(&self) -> Option<&str> {
        parent_path(&self.backing_store)
    }

    /// Whether the backing volume sits directly under `project`
    pub fn belongs_to(&self, project: &ProjectPath) -> bool {
        self.project_dataset() == Some(project.dataset().as_str())
    }
}

/// Dataset name for a raw-device data file path
pub fn backing_store_from_data_file(data_file: &str) -> String {
    data_file
        .strip_prefix(ZVOL_RDSK_PREFIX)
        .unwrap_or(data_file)
        .to_string()
}

/// Raw-device path for a volume dataset
pub fn device_path(dataset: &str) -> String {
    format!("{}{}", ZVOL_RDSK_PREFIX, dataset)
}

/// Binding of a logical unit to a host group / target group pair
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct View {
    pub entry_number: u16,
    pub host_group: String,
    pub target_group: String,
    pub lun: u16,
}

impl View {
    /// Whether this view binds the given group pair (empty means wildcard)
    pub fn matches(&self, host_group: &str, target_group: &str) -> bool {
        self.host_group == or_wildcard(host_group) && self.target_group == or_wildcard(target_group)
    }
}

/// Replace an empty group name with the wildcard group
pub fn or_wildcard(group: &str) -> &str {
    if group.is_empty() {
        WILDCARD_GROUP
    } else {
        group
    }
}

/// Named set of initiators
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostGroup {
    pub name: String,
    pub members: Vec<String>,
}

/// Named set of target ports
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetGroup {
    pub name: String,
    pub members: Vec<String>,
}

/// Named set of network portals an iSCSI target listens on
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetPortGroup {
    pub name: String,
    pub portal_count: u64,
    pub portals: Vec<String>,
}

/// iSCSI target as reported by `itadm list-target -v`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Target {
    pub iqn: String,
    pub state: String,
    pub session_count: u64,
    pub alias: String,
    pub auth: String,
    pub chap_user: String,
    pub chap_secret: String,
    pub tpg_tags: String,
}

/// Status text written while a job is running
pub const JOB_STATUS_IN_PROGRESS: &str = "In Progress";
/// Status text written when a job finishes without error
pub const JOB_STATUS_SUCCEEDED: &str = "Completed Successfully";

/// Lifecycle of an asynchronous job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "message")]
pub enum JobStatus {
    InProgress,
    Succeeded,
    Failed(String),
}

impl JobStatus {
    /// Free-text status as persisted in `{uuid}.status` files
    pub fn as_text(&self) -> &str {
        match self {
            JobStatus::InProgress => JOB_STATUS_IN_PROGRESS,
            JobStatus::Succeeded => JOB_STATUS_SUCCEEDED,
            JobStatus::Failed(message) => message,
        }
    }

    /// Inverse of `as_text`: anything that is not one of the two literals is a failure message
    pub fn from_text(text: &str) -> Self {
        match text.trim_end() {
            JOB_STATUS_IN_PROGRESS => JobStatus::InProgress,
            JOB_STATUS_SUCCEEDED => JobStatus::Succeeded,
            other => JobStatus::Failed(other.to_string()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::InProgress)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_text())
    }
}

/// Handle for a long-running destructive operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: Uuid,
    pub description: String,
    pub status: JobStatus,
    pub submitted_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            description: description.into(),
            status: JobStatus::InProgress,
            submitted_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Record a terminal status
    pub fn finish(self, status: JobStatus) -> Self {
        Self {
            status,
            finished_at: Some(Utc::now()),
            ..self
        }
    }
}

/// Parse a `type` property value or fail with a decode error
pub fn parse_dataset_kind(value: &str, command: &str) -> Result<DatasetKind> {
    DatasetKind::parse(value).ok_or_else(|| {
        LunarError::decode_failed(
            "Dataset",
            command,
            format!("unknown dataset type '{}'", value),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dataset_kind_round_trip() {
        for kind in [
            DatasetKind::Filesystem,
            DatasetKind::Volume,
            DatasetKind::Snapshot,
        ] {
            assert_eq!(DatasetKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(DatasetKind::parse("bookmark"), None);
    }

    #[test]
    fn test_path_helpers() {
        assert_eq!(leaf_name("tank/dom/proj/vol1"), "vol1");
        assert_eq!(leaf_name("tank"), "tank");
        assert_eq!(parent_path("tank/dom/proj/vol1"), Some("tank/dom/proj"));
        assert_eq!(parent_path("tank/dom/proj/vol1@snap"), Some("tank/dom/proj"));
        assert_eq!(parent_path("tank"), None);
    }

    #[test]
    fn test_project_path() {
        let project = ProjectPath::new("tank", "dom", "proj");
        assert_eq!(project.domain_dataset(), "tank/dom");
        assert_eq!(project.dataset(), "tank/dom/proj");
        assert_eq!(project.volume_dataset("vol1"), "tank/dom/proj/vol1");
    }

    #[test]
    fn test_backing_store_from_data_file() {
        assert_eq!(
            backing_store_from_data_file("/dev/zvol/rdsk/tank/dom/proj/vol1"),
            "tank/dom/proj/vol1"
        );
        assert_eq!(backing_store_from_data_file("/var/lu.img"), "/var/lu.img");
        assert_eq!(device_path("tank/v"), "/dev/zvol/rdsk/tank/v");
    }

    #[test]
    fn test_view_matches_wildcard() {
        let view = View {
            entry_number: 0,
            host_group: "All".to_string(),
            target_group: "tg1".to_string(),
            lun: 3,
        };
        assert!(view.matches("", "tg1"));
        assert!(view.matches("All", "tg1"));
        assert!(!view.matches("hg1", "tg1"));
    }

    #[test]
    fn test_job_status_text() {
        assert_eq!(JobStatus::InProgress.as_text(), "In Progress");
        assert_eq!(JobStatus::Succeeded.as_text(), "Completed Successfully");
        assert_eq!(
            JobStatus::from_text("Completed Successfully\n"),
            JobStatus::Succeeded
        );
        assert_eq!(
            JobStatus::from_text("cannot destroy: dataset is busy"),
            JobStatus::Failed("cannot destroy: dataset is busy".to_string())
        );
        assert!(!JobStatus::InProgress.is_terminal());
    }

    #[test]
    fn test_job_finish_sets_timestamp() {
        let job = Job::new("destroy volume");
        assert!(job.finished_at.is_none());
        let done = job.finish(JobStatus::Succeeded);
        assert_eq!(done.status, JobStatus::Succeeded);
        assert!(done.finished_at.is_some());
    }
}
