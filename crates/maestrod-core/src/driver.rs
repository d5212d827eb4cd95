//! Driver trait for backend adapters.
//!
//! A driver turns an admitted build into a provisioned, isolated execution
//! environment on some orchestration backend.

use async_trait::async_trait;

use crate::Result;

/// Trait for compute backends that run build workers.
///
/// Implementations must be safe to call concurrently for distinct worker
/// names, and must hold no build-specific state between calls beyond what is
/// needed to reach the backend.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Name of this backend.
    fn name(&self) -> &'static str;

    /// Provision whatever the backend needs so that a worker named `name`
    /// starts running the build tool with `args`, mounting `conf_target`
    /// (read/write) and `host_volume`.
    ///
    /// Every provisioning step is individually idempotent, so a retried call
    /// converges instead of duplicating resources. Partial provisioning is
    /// left behind on error; cleanup is the explicit [`destroy_worker`]
    /// operation, not automatic rollback.
    ///
    /// [`destroy_worker`]: Driver::destroy_worker
    async fn run(
        &self,
        name: &str,
        conf_target: &str,
        host_volume: &str,
        args: &[String],
    ) -> Result<()>;

    /// Tear down the worker for `(project, branch)`.
    async fn destroy_worker(&self, project: &str, branch: &str) -> Result<()>;

    /// Whether the worker named `name` still exists on the backend.
    ///
    /// Reconciliation uses this to observe build completion: a worker that
    /// is gone has finished, one way or the other.
    async fn worker_exists(&self, name: &str) -> Result<bool>;
}
