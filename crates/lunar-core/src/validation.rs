use crate::error::{LunarError, Result};
use crate::types::WILDCARD_GROUP;

/// Validate a single path component (alias, project, snapshot or group name)
pub fn validate_component(resource_type: &str, name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(LunarError::validation_failed(
            resource_type,
            "name must not be empty",
            "Supply a non-empty name",
        ));
    }

    if let Some(bad) = name.chars().find(|c| matches!(c, '/' | '@')) {
        return Err(LunarError::validation_failed(
            resource_type,
            format!("name '{}' contains '{}'", name, bad),
            "Names are single dataset path components and cannot contain '/' or '@'",
        ));
    }

    if name.chars().any(char::is_whitespace) {
        return Err(LunarError::validation_failed(
            resource_type,
            format!("name '{}' contains whitespace", name),
            "Tool arguments are passed verbatim; use '-', '_' or '.' as separators",
        ));
    }

    Ok(())
}

/// Validate a host group or target group name for creation
pub fn validate_group_name(resource_type: &str, name: &str) -> Result<()> {
    if name == WILDCARD_GROUP {
        return Err(LunarError::reserved_name(name));
    }
    validate_component(resource_type, name)
}

/// Reject a zero size
pub fn validate_size(resource_type: &str, size: u64) -> Result<()> {
    if size == 0 {
        return Err(LunarError::validation_failed(
            resource_type,
            "size must be greater than zero",
            "Specify the size in bytes",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_component() {
        assert!(validate_component("Volume", "vol1").is_ok());
        assert!(validate_component("Volume", "").is_err());
        assert!(validate_component("Volume", "a/b").is_err());
        assert!(validate_component("Snapshot", "a@b").is_err());
        assert!(validate_component("Volume", "my vol").is_err());
    }

    #[test]
    fn test_reserved_group_name() {
        let err = validate_group_name("HostGroup", "All").unwrap_err();
        assert!(matches!(err, LunarError::ReservedName { .. }));
        assert!(validate_group_name("HostGroup", "all-hosts").is_ok());
    }

    #[test]
    fn test_validate_size() {
        assert!(validate_size("Volume", 0).is_err());
        assert!(validate_size("Volume", 1).is_ok());
    }
}
