//! Lunar Core - domain records and output decoders for the Lunar storage daemon
//!
//! This crate provides:
//! - Typed records for datasets, logical units, views, groups, targets and jobs
//! - The line tokenizer and block/property decoders for tool output
//! - Request payloads and name validation
//! - Error types with miette diagnostics
//!
//! Nothing here performs I/O.

pub mod error;
pub mod properties;
pub mod records;
pub mod requests;
pub mod sizes;
pub mod tabular;
pub mod types;
pub mod validation;

// Re-export commonly used types
pub use error::{LunarError, Result};
pub use properties::{
    decode_properties, fold_properties, map_properties, DecodeRules, FilesystemProperties,
    PropertyMap, SnapshotProperties, VolumeProperties, ALIAS_PROPERTY, SERVICE_FLAG_PROPERTY,
};
pub use records::{
    created_identifier, decode_host_groups, decode_logical_units, decode_target_groups,
    decode_target_port_groups, decode_targets, decode_views,
};
pub use requests::{
    CloneVolumeRequest, CreateVolumeRequest, ExportRequest, ProjectRequest, ResizeVolumeRequest,
    TargetPortGroupRequest, TargetRequest, VolumeOptions, DEFAULT_VOLBLOCKSIZE,
};
pub use sizes::{parse_size, ByteSize};
pub use tabular::{
    normalize_assignments, split_pair, split_pairs, tokenize, tokenize_line, Delimiter,
};
pub use types::{
    backing_store_from_data_file, device_path, leaf_name, or_wildcard, parent_path, Dataset,
    DatasetKind, DatasetProperties, HostGroup, Job, JobStatus, LogicalUnit, OperationalStatus,
    Project, ProjectPath, Target, TargetGroup, TargetPortGroup, View, JOB_STATUS_IN_PROGRESS,
    JOB_STATUS_SUCCEEDED, WILDCARD_GROUP, ZVOL_RDSK_PREFIX,
};
pub use validation::{validate_component, validate_group_name, validate_size};
