//! Build requests and running-build identity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A request to build one commit of a project branch.
///
/// Immutable once enqueued. `prev_commit` is empty for the first build of a
/// branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildRequest {
    pub project: String,
    pub branch: String,
    #[serde(default)]
    pub prev_commit: String,
    pub curr_commit: String,
}

impl BuildRequest {
    pub fn new(
        project: impl Into<String>,
        branch: impl Into<String>,
        prev_commit: impl Into<String>,
        curr_commit: impl Into<String>,
    ) -> Self {
        Self {
            project: project.into(),
            branch: branch.into(),
            prev_commit: prev_commit.into(),
            curr_commit: curr_commit.into(),
        }
    }

    /// The identity under which at most one build may be in flight.
    pub fn key(&self) -> BuildKey {
        BuildKey {
            project: self.project.clone(),
            branch: self.branch.clone(),
        }
    }

    /// Deterministic worker identity for this request.
    ///
    /// Re-running the same logical build yields the same name, so a retried
    /// dispatch converges on the same backend resources. Backend adapters
    /// sanitize this for their own naming rules.
    pub fn worker_name(&self) -> String {
        format!("{}-{}-{}", self.project, self.branch, self.curr_commit)
    }
}

/// The `(project, branch)` pair identifying an in-flight build.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BuildKey {
    pub project: String,
    pub branch: String,
}

impl std::fmt::Display for BuildKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.project, self.branch)
    }
}

/// A build that has been admitted and dispatched to the backend.
///
/// Created when dispatch succeeds; removed only when reconciliation observes
/// that the backend's compute unit is gone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunningBuild {
    pub project: String,
    pub branch: String,
    pub curr_commit: String,
    pub started_at: DateTime<Utc>,
}

impl RunningBuild {
    pub fn key(&self) -> BuildKey {
        BuildKey {
            project: self.project.clone(),
            branch: self.branch.clone(),
        }
    }

    /// Worker identity, identical to the admitted request's.
    pub fn worker_name(&self) -> String {
        format!("{}-{}-{}", self.project, self.branch, self.curr_commit)
    }
}

impl From<&BuildRequest> for RunningBuild {
    fn from(req: &BuildRequest) -> Self {
        Self {
            project: req.project.clone(),
            branch: req.branch.clone(),
            curr_commit: req.curr_commit.clone(),
            started_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_name_is_stable() {
        let req = BuildRequest::new("org/app", "main", "", "abc123");
        assert_eq!(req.worker_name(), "org/app-main-abc123");
        assert_eq!(req.worker_name(), req.worker_name());
        assert_eq!(RunningBuild::from(&req).worker_name(), req.worker_name());
    }

    #[test]
    fn key_ignores_commits() {
        let a = BuildRequest::new("org/app", "main", "", "c1");
        let b = BuildRequest::new("org/app", "main", "c1", "c2");
        assert_eq!(a.key(), b.key());
    }
}
