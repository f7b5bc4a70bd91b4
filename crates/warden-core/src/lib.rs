//! Warden Core — shared ACL model, configuration, and collaborator traits.
//!
//! This crate provides the platform-facing surface of the Warden ACL engine.
//! It has no persistence dependencies (dependency level 0); the engine
//! implementations live in `warden-acl`.
//!
//! # Modules
//!
//! - [`model`]: Object identities, SIDs, permission masks, entries, snapshots
//! - [`config`]: ACL configuration toggles
//! - [`metrics`]: Operation metrics recording
//! - [`refresh`]: Post-commit cache refresh notification
//! - [`error`]: Error types and Result alias

#![warn(missing_docs)]
#![warn(clippy::all)]
#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod metrics;
pub mod model;
pub mod refresh;

// Re-export key types at crate root for convenience
pub use config::AclConfig;
pub use error::{Error, Result};
pub use metrics::{MetricsRecorder, NoopMetrics};
pub use model::{masks, AclEntry, AclSnapshot, ObjectIdentity, Permission, Sid};
pub use refresh::RefreshPublisher;
