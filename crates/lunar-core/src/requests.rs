//! Request payloads accepted by the orchestrator
//!
//! Empty strings and absent fields are equivalent: both mean "use the
//! tool's default" (or, for groups, the wildcard group).

use crate::sizes::ByteSize;
use serde::{Deserialize, Serialize};

/// Default `volblocksize` for new volumes
pub const DEFAULT_VOLBLOCKSIZE: u64 = 8192;

/// Dataset-level options for a new volume
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volblocksize: Option<ByteSize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reservation: Option<ByteSize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dedup: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compression: Option<String>,
    /// Sparse volume (`zfs create -s`)
    #[serde(default)]
    pub thin: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateVolumeRequest {
    #[serde(default)]
    pub alias: String,
    #[serde(default)]
    pub volsize: ByteSize,
    /// Re-assert a known LU identifier instead of letting the framework assign one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial: Option<String>,
    #[serde(default)]
    pub options: VolumeOptions,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloneVolumeRequest {
    #[serde(default)]
    pub alias: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResizeVolumeRequest {
    #[serde(default)]
    pub volsize: ByteSize,
}

/// View binding request; `lun: None` lets the framework pick the next free LUN
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportRequest {
    #[serde(default)]
    pub hostgroup: String,
    #[serde(default)]
    pub targetgroup: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lun: Option<u16>,
}

/// Project create/modify payload; only supplied fields are applied on modify
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quota: Option<ByteSize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refquota: Option<ByteSize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reservation: Option<ByteSize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refreservation: Option<ByteSize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compression: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dedup: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub atime: Option<String>,
}

impl ProjectRequest {
    /// `property=value` pairs for every supplied optional property (quota excluded)
    pub fn optional_properties(&self) -> Vec<(&'static str, String)> {
        let mut props = Vec::new();
        let sizes = [
            ("refquota", self.refquota),
            ("reservation", self.reservation),
            ("refreservation", self.refreservation),
        ];
        for (name, value) in sizes {
            if let Some(v) = value {
                props.push((name, v.to_string()));
            }
        }
        let texts = [
            ("custom:alias", &self.alias),
            ("compression", &self.compression),
            ("dedup", &self.dedup),
            ("atime", &self.atime),
        ];
        for (name, value) in texts {
            if let Some(v) = value.as_deref().filter(|v| !v.is_empty()) {
                props.push((name, v.to_string()));
            }
        }
        props
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetPortGroupRequest {
    #[serde(default)]
    pub portals: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iqn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "tpgs")]
    pub tpg: Option<String>,
}
