//! Generic `property value` dump mapping
//!
//! `zfs get -Hp -o property,value all <ds>` prints one row per property. Rows
//! are folded into a map keyed by lower-cased property name, then projected
//! onto the record shape for the dataset's reported `type` through a static
//! table per kind.

use crate::error::{LunarError, Result};
use crate::types::{parse_dataset_kind, DatasetKind, DatasetProperties};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// User property carrying a human-readable alias
pub const ALIAS_PROPERTY: &str = "custom:alias";
/// User property carrying the management-ownership marker
pub const SERVICE_FLAG_PROPERTY: &str = "custom:sflag";

/// Folded property dump, keyed by lower-cased property name
pub type PropertyMap = BTreeMap<String, String>;

/// Output-format irregularities applied while folding a dump
///
/// Some tool versions print a property with no value as an empty cell
/// instead of a placeholder. Properties listed in `empty_as_none` get the
/// canonical `none` in that case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodeRules {
    pub empty_as_none: Vec<String>,
}

impl Default for DecodeRules {
    fn default() -> Self {
        Self {
            empty_as_none: vec!["clones".to_string()],
        }
    }
}

impl DecodeRules {
    pub fn new<I, S>(empty_as_none: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            empty_as_none: empty_as_none.into_iter().map(Into::into).collect(),
        }
    }

    fn substitutes_none(&self, property: &str) -> bool {
        self.empty_as_none.iter().any(|p| p == property)
    }
}

/// Fold `[property, value]` rows into a map
///
/// Rows come from [`split_pairs`](crate::tabular::split_pairs), so a value
/// arrives as one verbatim cell; stray extra cells are appended with a single
/// space. The two custom user properties are renamed onto their record field
/// names.
pub fn fold_properties(rows: &[Vec<String>], rules: &DecodeRules) -> PropertyMap {
    let mut map = PropertyMap::new();
    for row in rows {
        let Some(name) = row.first() else {
            continue;
        };
        let name = name.to_lowercase();
        let value = row[1..].join(" ");

        let key = match name.as_str() {
            ALIAS_PROPERTY => "alias".to_string(),
            SERVICE_FLAG_PROPERTY => "service_flag".to_string(),
            _ => name,
        };

        let value = if value.is_empty() && rules.substitutes_none(&key) {
            "none".to_string()
        } else {
            value
        };

        map.insert(key, value);
    }
    map
}

/// Parse an unsigned size/count property; `-` and empty mean zero
pub fn coerce_uint(property: &str, value: &str) -> Result<u64> {
    match value {
        "" | "-" => Ok(0),
        v => v
            .parse::<u64>()
            .map_err(|e| LunarError::invalid_field(property, value, e.to_string())),
    }
}

/// Parse a ratio property printed as `<float>x`; `-` and empty mean zero
pub fn coerce_ratio(property: &str, value: &str) -> Result<f64> {
    match value {
        "" | "-" => Ok(0.0),
        v => v
            .strip_suffix('x')
            .unwrap_or(v)
            .parse::<f64>()
            .map_err(|e| LunarError::invalid_field(property, value, e.to_string())),
    }
}

enum Coercion<T> {
    Uint(fn(&mut T, u64)),
    Ratio(fn(&mut T, f64)),
    Text(fn(&mut T, String)),
}

struct PropertyField<T: 'static> {
    name: &'static str,
    coerce: Coercion<T>,
}

macro_rules! field {
    (uint $f:ident) => {
        PropertyField {
            name: stringify!($f),
            coerce: Coercion::Uint(|p, v| p.$f = v),
        }
    };
    (ratio $f:ident) => {
        PropertyField {
            name: stringify!($f),
            coerce: Coercion::Ratio(|p, v| p.$f = v),
        }
    };
    (text $f:ident) => {
        PropertyField {
            name: stringify!($f),
            coerce: Coercion::Text(|p, v| p.$f = v),
        }
    };
}

fn project<T: Default>(map: &PropertyMap, table: &[PropertyField<T>]) -> Result<T> {
    let mut record = T::default();
    for field in table {
        let value = map.get(field.name).map(String::as_str).unwrap_or("");
        match &field.coerce {
            Coercion::Uint(set) => set(&mut record, coerce_uint(field.name, value)?),
            Coercion::Ratio(set) => set(&mut record, coerce_ratio(field.name, value)?),
            Coercion::Text(set) => set(&mut record, value.to_string()),
        }
    }
    Ok(record)
}

/// Properties of a filesystem dataset
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilesystemProperties {
    pub creation: String,
    pub used: u64,
    pub available: u64,
    pub referenced: u64,
    pub compressratio: f64,
    pub mounted: String,
    pub origin: String,
    pub quota: u64,
    pub reservation: u64,
    pub recordsize: u64,
    pub mountpoint: String,
    pub sharenfs: String,
    pub checksum: String,
    pub compression: String,
    pub atime: String,
    pub devices: String,
    pub exec: String,
    pub setuid: String,
    pub readonly: String,
    pub zoned: String,
    pub snapdir: String,
    pub aclmode: String,
    pub aclinherit: String,
    pub canmount: String,
    pub xattr: String,
    pub copies: u64,
    pub version: String,
    pub utf8only: String,
    pub normalization: String,
    pub casesensitivity: String,
    pub vscan: String,
    pub nbmand: String,
    pub sharesmb: String,
    pub refquota: u64,
    pub refreservation: u64,
    pub primarycache: String,
    pub secondarycache: String,
    pub usedbysnapshots: u64,
    pub usedbydataset: u64,
    pub usedbychildren: u64,
    pub usedbyrefreservation: u64,
    pub logbias: String,
    pub dedup: String,
    pub mlslabel: String,
    pub sync: String,
    pub alias: String,
    pub service_flag: String,
}

static FILESYSTEM_FIELDS: &[PropertyField<FilesystemProperties>] = &[
    field!(text creation),
    field!(uint used),
    field!(uint available),
    field!(uint referenced),
    field!(ratio compressratio),
    field!(text mounted),
    field!(text origin),
    field!(uint quota),
    field!(uint reservation),
    field!(uint recordsize),
    field!(text mountpoint),
    field!(text sharenfs),
    field!(text checksum),
    field!(text compression),
    field!(text atime),
    field!(text devices),
    field!(text exec),
    field!(text setuid),
    field!(text readonly),
    field!(text zoned),
    field!(text snapdir),
    field!(text aclmode),
    field!(text aclinherit),
    field!(text canmount),
    field!(text xattr),
    field!(uint copies),
    field!(text version),
    field!(text utf8only),
    field!(text normalization),
    field!(text casesensitivity),
    field!(text vscan),
    field!(text nbmand),
    field!(text sharesmb),
    field!(uint refquota),
    field!(uint refreservation),
    field!(text primarycache),
    field!(text secondarycache),
    field!(uint usedbysnapshots),
    field!(uint usedbydataset),
    field!(uint usedbychildren),
    field!(uint usedbyrefreservation),
    field!(text logbias),
    field!(text dedup),
    field!(text mlslabel),
    field!(text sync),
    field!(text alias),
    field!(text service_flag),
];

/// Properties of a volume dataset
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VolumeProperties {
    pub creation: String,
    pub used: u64,
    pub available: u64,
    pub referenced: u64,
    pub compressratio: f64,
    pub reservation: u64,
    pub volsize: u64,
    pub volblocksize: u64,
    pub checksum: String,
    pub compression: String,
    pub origin: String,
    pub readonly: String,
    pub copies: u64,
    pub refreservation: u64,
    pub primarycache: String,
    pub secondarycache: String,
    pub usedbysnapshots: u64,
    pub usedbydataset: u64,
    pub usedbychildren: u64,
    pub usedbyrefreservation: u64,
    pub logbias: String,
    pub dedup: String,
    pub mlslabel: String,
    pub sync: String,
    pub alias: String,
    pub service_flag: String,
}

static VOLUME_FIELDS: &[PropertyField<VolumeProperties>] = &[
    field!(text creation),
    field!(uint used),
    field!(uint available),
    field!(uint referenced),
    field!(ratio compressratio),
    field!(uint reservation),
    field!(uint volsize),
    field!(uint volblocksize),
    field!(text checksum),
    field!(text compression),
    field!(text origin),
    field!(text readonly),
    field!(uint copies),
    field!(uint refreservation),
    field!(text primarycache),
    field!(text secondarycache),
    field!(uint usedbysnapshots),
    field!(uint usedbydataset),
    field!(uint usedbychildren),
    field!(uint usedbyrefreservation),
    field!(text logbias),
    field!(text dedup),
    field!(text mlslabel),
    field!(text sync),
    field!(text alias),
    field!(text service_flag),
];

/// Properties of a snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotProperties {
    pub creation: String,
    pub used: u64,
    pub referenced: u64,
    pub compressratio: f64,
    pub devices: String,
    pub exec: String,
    pub setuid: String,
    pub xattr: String,
    pub version: String,
    pub utf8only: String,
    pub normalization: String,
    pub casesensitivity: String,
    pub nbmand: String,
    pub primarycache: String,
    pub secondarycache: String,
    pub defer_destroy: String,
    pub userrefs: String,
    pub mlslabel: String,
    pub clones: String,
    pub alias: String,
    pub service_flag: String,
}

static SNAPSHOT_FIELDS: &[PropertyField<SnapshotProperties>] = &[
    field!(text creation),
    field!(uint used),
    field!(uint referenced),
    field!(ratio compressratio),
    field!(text devices),
    field!(text exec),
    field!(text setuid),
    field!(text xattr),
    field!(text version),
    field!(text utf8only),
    field!(text normalization),
    field!(text casesensitivity),
    field!(text nbmand),
    field!(text primarycache),
    field!(text secondarycache),
    field!(text defer_destroy),
    field!(text userrefs),
    field!(text mlslabel),
    field!(text clones),
    field!(text alias),
    field!(text service_flag),
];

/// Project a folded map onto the record for its `type` property
pub fn map_properties(map: &PropertyMap, command: &str) -> Result<DatasetProperties> {
    let kind = map
        .get("type")
        .ok_or_else(|| LunarError::decode_failed("Dataset", command, "no 'type' property"))?;

    match parse_dataset_kind(kind, command)? {
        DatasetKind::Filesystem => {
            project(map, FILESYSTEM_FIELDS).map(DatasetProperties::Filesystem)
        }
        DatasetKind::Volume => project(map, VOLUME_FIELDS).map(DatasetProperties::Volume),
        DatasetKind::Snapshot => project(map, SNAPSHOT_FIELDS).map(DatasetProperties::Snapshot),
    }
}

/// Fold and project a `zfs get -Hp -o property,value` dump split into pairs
pub fn decode_properties(
    rows: &[Vec<String>],
    rules: &DecodeRules,
    command: &str,
) -> Result<DatasetProperties> {
    map_properties(&fold_properties(rows, rules), command)
}
