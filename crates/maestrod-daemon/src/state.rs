//! Application state.

use std::sync::Arc;

use maestrod_config::Config;
use maestrod_core::Driver;
use maestrod_scheduler::{BuildQueue, RunningSet};
use tokio::sync::Mutex;

/// The scheduler's owned containers, guarded as one unit so that a full
/// admission cycle is the mutual-exclusion boundary.
#[derive(Default)]
pub struct SchedulerState {
    pub queue: BuildQueue,
    pub running: RunningSet,
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub driver: Arc<dyn Driver>,
    pub scheduler: Arc<Mutex<SchedulerState>>,
}

impl AppState {
    pub fn new(config: Config, driver: Arc<dyn Driver>) -> Self {
        Self {
            config: Arc::new(config),
            driver,
            scheduler: Arc::new(Mutex::new(SchedulerState::default())),
        }
    }
}
