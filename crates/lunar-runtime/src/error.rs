use miette::Diagnostic;
use thiserror::Error;

/// Runtime error type for subsystem invocations, orchestration and jobs
#[derive(Error, Debug, Diagnostic)]
pub enum RuntimeError {
    /// External program could not run or exited non-zero
    #[error("Command '{command}' failed with exit code {exit_code}: {}", .stderr.trim())]
    #[diagnostic(code(lunar::runtime::command_failed), help("stderr: {stderr}"))]
    CommandFailed {
        #[allow(unused)]
        command: String,
        #[allow(unused)]
        exit_code: i32,
        #[allow(unused)]
        stderr: String,
    },

    /// A referenced record does not exist
    #[error("{kind} not found: {name}")]
    #[diagnostic(
        code(lunar::runtime::not_found),
        help("List the {kind} collection to see which records exist")
    )]
    NotFound {
        #[allow(unused)]
        kind: String,
        #[allow(unused)]
        name: String,
    },

    /// A record with this identity already exists
    #[error("{kind} already exists: {name}")]
    #[diagnostic(
        code(lunar::runtime::already_exists),
        help("Delete the existing {kind} first, or pick a different name")
    )]
    AlreadyExists {
        #[allow(unused)]
        kind: String,
        #[allow(unused)]
        name: String,
    },

    /// The target framework kept listing a deleted logical unit
    #[error("Logical unit {lu} still listed {waited_ms}ms after deletion")]
    #[diagnostic(
        code(lunar::runtime::settle_timeout),
        help("The target framework has not committed the deletion yet. The backing volume was left in place; retry the destroy once `stmfadm list-lu` no longer shows the unit")
    )]
    SettleTimeout {
        #[allow(unused)]
        lu: String,
        #[allow(unused)]
        waited_ms: u64,
    },

    /// No job with this identifier
    #[error("Job not found: {id}")]
    #[diagnostic(
        code(lunar::runtime::job_not_found),
        help("Job identifiers are returned by destructive requests with 202 Accepted")
    )]
    JobNotFound {
        #[allow(unused)]
        id: String,
    },

    /// Job status could not be read or written
    #[error("Job store error: {message}")]
    #[diagnostic(
        code(lunar::runtime::job_store),
        help("Check that the job directory exists and is writable by the daemon")
    )]
    JobStore {
        #[allow(unused)]
        message: String,
    },

    /// Core library error
    #[error(transparent)]
    #[diagnostic(transparent)]
    Core(#[from] lunar_core::LunarError),

    /// Internal error
    #[error("Internal runtime error: {message}")]
    #[diagnostic(
        code(lunar::runtime::internal_error),
        help("This is likely a bug in lunar-runtime. Please report it with the full error details")
    )]
    InternalError {
        #[allow(unused)]
        message: String,
    },
}

/// Result type alias for runtime operations
pub type Result<T> = std::result::Result<T, RuntimeError>;

impl RuntimeError {
    pub fn command_failed(
        command: impl Into<String>,
        exit_code: i32,
        stderr: impl Into<String>,
    ) -> Self {
        Self::CommandFailed {
            command: command.into(),
            exit_code,
            stderr: stderr.into(),
        }
    }

    pub fn not_found(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind: kind.into(),
            name: name.into(),
        }
    }

    pub fn already_exists(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self::AlreadyExists {
            kind: kind.into(),
            name: name.into(),
        }
    }

    pub fn job_not_found(id: impl Into<String>) -> Self {
        Self::JobNotFound { id: id.into() }
    }

    pub fn job_store(message: impl Into<String>) -> Self {
        Self::JobStore {
            message: message.into(),
        }
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::InternalError {
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            RuntimeError::NotFound { .. } | RuntimeError::JobNotFound { .. }
        )
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, RuntimeError::Core(e) if e.is_validation())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lunar_core::LunarError;

    #[test]
    fn test_command_failed_carries_diagnostics() {
        let err = RuntimeError::command_failed(
            "zfs destroy tank/a@s",
            1,
            "cannot destroy 'tank/a@s': snapshot has dependent clones\n",
        );
        let msg = err.to_string();
        assert!(msg.contains("zfs destroy tank/a@s"));
        assert!(msg.contains("dependent clones"));
        assert!(!msg.ends_with('\n'));
    }

    #[test]
    fn test_classification() {
        assert!(RuntimeError::not_found("LogicalUnit", "600144F0").is_not_found());
        assert!(RuntimeError::job_not_found("x").is_not_found());

        let err: RuntimeError = LunarError::reserved_name("All").into();
        assert!(err.is_validation());
        let err: RuntimeError = LunarError::decode_failed("View", "stmfadm", "bad").into();
        assert!(!err.is_validation());
    }
}
