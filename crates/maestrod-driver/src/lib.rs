//! Backend adapters for maestrod.
//!
//! Each adapter implements [`maestrod_core::Driver`]; which one the daemon
//! uses is a configuration-time choice.

pub mod kubernetes;
pub mod resources;

pub use kubernetes::KubernetesDriver;

use std::sync::Arc;

use maestrod_config::Config;
use maestrod_core::{Driver, Error, Result};

/// Build the driver selected by the configuration's `runtime` setting.
pub fn from_config(config: &Config) -> Result<Arc<dyn Driver>> {
    match config.server.runtime.as_str() {
        "kubernetes" => Ok(Arc::new(KubernetesDriver::new(
            &config.server,
            config.mounts.clone(),
        )?)),
        other => Err(Error::Internal(format!("unsupported runtime: {}", other))),
    }
}
