//! KDL configuration parsing for maestrod.
//!
//! This crate handles parsing of:
//! - Daemon/server settings (concurrency cap, backend target, workspace)
//! - Project entries (build-tool config path, deploy branches)
//! - Runtime mounts materialized as worker volumes

pub mod error;
pub mod system;

pub use error::{ConfigError, ConfigResult};
pub use system::{Config, Mount, MountKind, Project, Server};
