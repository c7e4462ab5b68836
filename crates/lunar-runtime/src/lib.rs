// Allow unused assignments for diagnostic fields - they're used by the thiserror/miette macros
#![allow(unused_assignments)]

//! Lunar Runtime - subsystem adapters, orchestration and jobs
//!
//! This crate provides:
//! - The process invoker (`CommandRunner`) and the `zfs`, `stmfadm` and
//!   `itadm` adapters behind the `DatasetManager`, `TargetFramework` and
//!   `IscsiAdmin` traits, each with an in-memory implementation
//! - The `Orchestrator` sequencing volume operations across subsystems
//! - The `JobTracker` for asynchronous destructive operations

pub mod command;
pub mod error;
pub mod itadm;
pub mod jobs;
pub mod orchestrator;
pub mod stmf;
pub mod zfs;

#[cfg(test)]
mod testing;

// Re-export primary types
pub use command::{CommandOutput, CommandRunner, SystemRunner};
pub use error::{Result, RuntimeError};
pub use itadm::{IscsiAdmin, ItadmCli, MockIscsiAdmin};
pub use jobs::{FileJobStore, JobStore, JobTracker, MemoryJobStore};
pub use orchestrator::{Orchestrator, OrchestratorContext, SettlePolicy, MANAGED_SERVICE_FLAG};
pub use stmf::{LuOptions, MockTargetFramework, StmfCli, StmfConfig, TargetFramework};
pub use zfs::{DatasetManager, DestroyOptions, MockDatasetManager, VolumeSpec, ZfsCli};
