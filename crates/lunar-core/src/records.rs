//! Block record decoding for verbose tool listings
//!
//! `stmfadm` prints each record as a sentinel row followed by a fixed run of
//! `label: value` rows. `itadm` prints a header row, a record row and a run of
//! indented attribute rows closed by a known last attribute.

use crate::error::{LunarError, Result};
use crate::types::{
    backing_store_from_data_file, HostGroup, LogicalUnit, OperationalStatus, Target,
    TargetGroup, TargetPortGroup, View,
};

/// One row of a fixed-position block
pub struct BlockField<T: 'static> {
    pub label: &'static str,
    /// Present only on some tool versions; consumed only when the label matches
    pub optional: bool,
    pub apply: fn(&mut T, &str) -> Result<()>,
}

/// Shape of a fixed-position block record
pub struct BlockLayout<T: 'static> {
    pub record: &'static str,
    pub sentinel: &'static str,
    pub open: fn(&str) -> Result<T>,
    pub fields: &'static [BlockField<T>],
}

/// Value of a `label: value` row, rejoining values that contained the delimiter
pub fn row_value(row: &[String]) -> String {
    row.get(1..).map(|rest| rest.join(":")).unwrap_or_default()
}

fn label_is(row: &[String], label: &str) -> bool {
    row.first()
        .map(|first| first.eq_ignore_ascii_case(label))
        .unwrap_or(false)
}

/// Decode every block opened by `layout.sentinel`
///
/// Rows outside a block are ignored. Running out of rows inside a block or a
/// field that fails to parse fails the whole decode.
pub fn decode_blocks<T>(
    rows: &[Vec<String>],
    layout: &BlockLayout<T>,
    command: &str,
) -> Result<Vec<T>> {
    let mut records = Vec::new();
    let mut i = 0;

    while i < rows.len() {
        if !label_is(&rows[i], layout.sentinel) {
            i += 1;
            continue;
        }

        let mut record = (layout.open)(&row_value(&rows[i]))?;
        i += 1;

        for field in layout.fields {
            let Some(row) = rows.get(i) else {
                return Err(LunarError::decode_failed(
                    layout.record,
                    command,
                    format!("block truncated before '{}'", field.label),
                ));
            };

            if field.optional && !label_is(row, field.label) {
                continue;
            }

            (field.apply)(&mut record, &row_value(row))?;
            i += 1;
        }

        records.push(record);
    }

    Ok(records)
}

fn parse_u16(field: &str, value: &str) -> Result<u16> {
    value
        .parse::<u16>()
        .map_err(|e| LunarError::invalid_field(field, value, e.to_string()))
}

fn parse_u64(field: &str, value: &str) -> Result<u64> {
    value
        .parse::<u64>()
        .map_err(|e| LunarError::invalid_field(field, value, e.to_string()))
}

static LOGICAL_UNIT_FIELDS: &[BlockField<LogicalUnit>] = &[
    BlockField {
        label: "Operational Status",
        optional: false,
        apply: |lu, v| {
            lu.operational_status = OperationalStatus::parse(v).ok_or_else(|| {
                LunarError::invalid_field("Operational Status", v, "expected Online or Offline")
            })?;
            Ok(())
        },
    },
    BlockField {
        label: "Provider Name",
        optional: false,
        apply: |lu, v| {
            lu.provider_name = v.to_string();
            Ok(())
        },
    },
    BlockField {
        label: "Alias",
        optional: false,
        apply: |lu, v| {
            lu.alias = v.to_string();
            Ok(())
        },
    },
    BlockField {
        label: "View Entry Count",
        optional: false,
        apply: |lu, v| {
            lu.view_count = parse_u64("View Entry Count", v)?;
            Ok(())
        },
    },
    BlockField {
        label: "Data File",
        optional: false,
        apply: |lu, v| {
            lu.data_file = v.to_string();
            lu.backing_store = backing_store_from_data_file(v);
            Ok(())
        },
    },
    BlockField {
        label: "Meta File",
        optional: false,
        apply: |lu, v| {
            lu.meta_file = v.to_string();
            Ok(())
        },
    },
    BlockField {
        label: "Size",
        optional: false,
        apply: |lu, v| {
            lu.size = parse_u64("Size", v)?;
            Ok(())
        },
    },
    BlockField {
        label: "Block Size",
        optional: false,
        apply: |lu, v| {
            lu.block_size = parse_u16("Block Size", v)?;
            Ok(())
        },
    },
    BlockField {
        label: "Management URL",
        optional: false,
        apply: |lu, v| {
            lu.management_url = v.to_string();
            Ok(())
        },
    },
    BlockField {
        label: "Vendor ID",
        optional: false,
        apply: |lu, v| {
            lu.vendor_id = v.to_string();
            Ok(())
        },
    },
    BlockField {
        label: "Product ID",
        optional: false,
        apply: |lu, v| {
            lu.product_id = v.to_string();
            Ok(())
        },
    },
    BlockField {
        label: "Serial Num",
        optional: false,
        apply: |lu, v| {
            lu.serial_number = v.to_string();
            Ok(())
        },
    },
    BlockField {
        label: "Write Protect",
        optional: false,
        apply: |lu, v| {
            lu.write_protect = v.to_string();
            Ok(())
        },
    },
    // not printed by older stmfadm builds
    BlockField {
        label: "Write Cache Mode Select",
        optional: true,
        apply: |lu, v| {
            lu.write_cache_mode_select = v.to_string();
            Ok(())
        },
    },
    BlockField {
        label: "Writeback Cache",
        optional: false,
        apply: |lu, v| {
            lu.writeback_cache = v.to_string();
            Ok(())
        },
    },
    BlockField {
        label: "Access State",
        optional: false,
        apply: |lu, v| {
            lu.access_state = v.to_string();
            Ok(())
        },
    },
];

static LOGICAL_UNIT_LAYOUT: BlockLayout<LogicalUnit> = BlockLayout {
    record: "LogicalUnit",
    sentinel: "LU Name",
    open: |id| {
        Ok(LogicalUnit {
            id: id.to_string(),
            ..Default::default()
        })
    },
    fields: LOGICAL_UNIT_FIELDS,
};

/// Decode `stmfadm list-lu -v` output
pub fn decode_logical_units(rows: &[Vec<String>], command: &str) -> Result<Vec<LogicalUnit>> {
    decode_blocks(rows, &LOGICAL_UNIT_LAYOUT, command)
}

static VIEW_FIELDS: &[BlockField<View>] = &[
    BlockField {
        label: "Host group",
        optional: false,
        apply: |view, v| {
            view.host_group = v.to_string();
            Ok(())
        },
    },
    BlockField {
        label: "Target Group",
        optional: false,
        apply: |view, v| {
            view.target_group = v.to_string();
            Ok(())
        },
    },
    BlockField {
        label: "LUN",
        optional: false,
        apply: |view, v| {
            view.lun = parse_u16("LUN", v)?;
            Ok(())
        },
    },
];

static VIEW_LAYOUT: BlockLayout<View> = BlockLayout {
    record: "View",
    sentinel: "View Entry",
    open: |entry| {
        Ok(View {
            entry_number: parse_u16("View Entry", entry)?,
            ..Default::default()
        })
    },
    fields: VIEW_FIELDS,
};

/// Decode `stmfadm list-view -l <lu>` output
pub fn decode_views(rows: &[Vec<String>], command: &str) -> Result<Vec<View>> {
    decode_blocks(rows, &VIEW_LAYOUT, command)
}

/// Group name followed by any number of `Member:` rows
fn decode_member_groups(rows: &[Vec<String>], sentinel: &str) -> Vec<(String, Vec<String>)> {
    let mut groups: Vec<(String, Vec<String>)> = Vec::new();
    for row in rows {
        if label_is(row, sentinel) {
            groups.push((row_value(row), Vec::new()));
        } else if label_is(row, "Member") {
            if let Some((_, members)) = groups.last_mut() {
                members.push(row_value(row));
            }
        }
    }
    groups
}

/// Decode `stmfadm list-hg -v` output
pub fn decode_host_groups(rows: &[Vec<String>]) -> Vec<HostGroup> {
    decode_member_groups(rows, "Host Group")
        .into_iter()
        .map(|(name, members)| HostGroup { name, members })
        .collect()
}

/// Decode `stmfadm list-tg -v` output
pub fn decode_target_groups(rows: &[Vec<String>]) -> Vec<TargetGroup> {
    decode_member_groups(rows, "Target Group")
        .into_iter()
        .map(|(name, members)| TargetGroup { name, members })
        .collect()
}

fn is_header(row: &[String]) -> bool {
    row.first().map(|t| t == "TARGET").unwrap_or(false)
}

/// Decode `itadm list-tpg -v` output (whitespace tokenized)
pub fn decode_target_port_groups(
    rows: &[Vec<String>],
    command: &str,
) -> Result<Vec<TargetPortGroup>> {
    let mut groups = Vec::new();
    let mut current: Option<TargetPortGroup> = None;

    for row in rows.iter().filter(|r| !r.is_empty() && !is_header(r)) {
        if row[0] == "portals:" {
            let mut tpg = current.take().ok_or_else(|| {
                LunarError::decode_failed("TargetPortGroup", command, "portals row without a group")
            })?;
            tpg.portals = row[1..]
                .join("")
                .split(',')
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect();
            groups.push(tpg);
            continue;
        }

        let count = row.get(1).ok_or_else(|| {
            LunarError::decode_failed(
                "TargetPortGroup",
                command,
                format!("missing portal count for '{}'", row[0]),
            )
        })?;
        current = Some(TargetPortGroup {
            name: row[0].clone(),
            portal_count: parse_u64("PORTAL COUNT", count)?,
            portals: Vec::new(),
        });
    }

    Ok(groups)
}

/// Decode normalized `itadm list-target -v` output (whitespace tokenized)
pub fn decode_targets(rows: &[Vec<String>], command: &str) -> Result<Vec<Target>> {
    let mut targets = Vec::new();
    let mut current: Option<Target> = None;

    for row in rows.iter().filter(|r| !r.is_empty() && !is_header(r)) {
        let value = row[1..].join(" ");
        let label = row[0].as_str();

        if !label.ends_with(':') {
            if row.len() < 3 {
                return Err(LunarError::decode_failed(
                    "Target",
                    command,
                    format!("target row for '{}' has {} columns", label, row.len()),
                ));
            }
            current = Some(Target {
                iqn: label.to_string(),
                state: row[1].clone(),
                session_count: parse_u64("SESSIONS", &row[2])?,
                ..Default::default()
            });
            continue;
        }

        let target = current.as_mut().ok_or_else(|| {
            LunarError::decode_failed("Target", command, format!("'{}' row without a target", label))
        })?;

        match label {
            "alias:" => target.alias = value,
            "auth:" => target.auth = value,
            "targetchapuser:" => target.chap_user = value,
            "targetchapsecret:" => target.chap_secret = value,
            "tpg-tags:" => {
                target.tpg_tags = value;
                if let Some(done) = current.take() {
                    targets.push(done);
                }
            }
            _ => {}
        }
    }

    Ok(targets)
}

/// Second token of the first row, as printed by `create-lu` and `create-target`
pub fn created_identifier(rows: &[Vec<String>], record: &str, command: &str) -> Result<String> {
    rows.iter()
        .find(|r| !r.is_empty())
        .and_then(|r| r.get(1))
        .cloned()
        .ok_or_else(|| {
            LunarError::decode_failed(record, command, "no identifier in creation output")
        })
}
