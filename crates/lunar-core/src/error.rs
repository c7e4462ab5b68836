// Allow unused assignments for diagnostic fields - they're used by the macros
#![allow(unused_assignments)]

use miette::Diagnostic;
use thiserror::Error;

/// Core error type for decoding tool output and validating requests
#[derive(Error, Debug, Diagnostic)]
pub enum LunarError {
    /// Tool output did not have the expected block or property shape
    #[error("Failed to decode {record} from `{command}` output: {reason}")]
    #[diagnostic(
        code(lunar::decode_failed),
        help("The administration tool printed output in a layout this daemon does not understand. Compare the tool version against the supported output format")
    )]
    DecodeFailed {
        #[allow(unused)]
        record: String,
        #[allow(unused)]
        command: String,
        #[allow(unused)]
        reason: String,
    },

    /// A numeric or ratio field could not be parsed
    #[error("Invalid value '{value}' for field '{field}': {reason}")]
    #[diagnostic(
        code(lunar::invalid_field),
        help("Numeric fields must be base-10 integers within range; ratios are printed as '<float>x'")
    )]
    InvalidField {
        #[allow(unused)]
        field: String,
        #[allow(unused)]
        value: String,
        #[allow(unused)]
        reason: String,
    },

    /// Caller-supplied input violates a precondition
    #[error("Validation failed for {resource_type}: {details}")]
    #[diagnostic(code(lunar::validation_failed), help("{help_text}"))]
    ValidationFailed {
        #[allow(unused)]
        resource_type: String,
        #[allow(unused)]
        details: String,
        #[allow(unused)]
        help_text: String,
    },

    /// Attempt to create a group with the reserved wildcard name
    #[error("Group name '{name}' is reserved")]
    #[diagnostic(
        code(lunar::reserved_name),
        help("'All' denotes the implicit wildcard group and cannot be created explicitly. Pick another name")
    )]
    ReservedName {
        #[allow(unused)]
        name: String,
    },
}

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, LunarError>;

impl LunarError {
    /// Create a DecodeFailed error
    pub fn decode_failed(
        record: impl Into<String>,
        command: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::DecodeFailed {
            record: record.into(),
            command: command.into(),
            reason: reason.into(),
        }
    }

    /// Create an InvalidField error
    pub fn invalid_field(
        field: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidField {
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Create a ValidationFailed error
    pub fn validation_failed(
        resource_type: impl Into<String>,
        details: impl Into<String>,
        help_text: impl Into<String>,
    ) -> Self {
        Self::ValidationFailed {
            resource_type: resource_type.into(),
            details: details.into(),
            help_text: help_text.into(),
        }
    }

    /// Create a ReservedName error
    pub fn reserved_name(name: impl Into<String>) -> Self {
        Self::ReservedName { name: name.into() }
    }

    /// Whether this error was raised by request validation rather than by decoding
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            LunarError::ValidationFailed { .. } | LunarError::ReservedName { .. }
        )
    }
}
