//! Lunar API Server - REST surface of the storage daemon
//!
//! This crate provides:
//! - Axum-based HTTP server with optional basic authentication
//! - Project, volume, snapshot, host group and target endpoints
//! - 202 Accepted job handles for destructive volume/snapshot operations
//! - Mapping of runtime errors onto HTTP status codes

pub mod error;
pub mod handlers;
pub mod response;
pub mod server;
pub mod state;

// Re-export commonly used types
pub use error::{ApiError, Result};
pub use server::{ApiServer, BasicCredentials, Config};
pub use state::{AppState, DEFAULT_PRIVATE_POOLS};
