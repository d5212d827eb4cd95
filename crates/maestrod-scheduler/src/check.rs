//! One admission cycle.

use maestrod_config::Config;
use maestrod_core::{BuildRequest, Driver, Error, Result};
use tracing::{debug, info};

use crate::{BuildQueue, RunningSet};

/// Run one admission cycle: reconcile running builds against the backend,
/// admit at most one queued request under the concurrency cap, and dispatch
/// it through the driver.
///
/// Callers must not run two cycles concurrently against the same queue and
/// running set. A request whose dispatch fails is not re-enqueued: dispatch
/// is at-most-once, and the error is surfaced to the caller.
pub async fn check(
    config: &Config,
    queue: &mut BuildQueue,
    running: &mut RunningSet,
    driver: &dyn Driver,
) -> Result<()> {
    running.watch(driver).await;

    let Some(next) = queue.pop(running, config.server.max_builds) else {
        debug!(
            queued = queue.len(),
            running = running.len(),
            "nothing to admit"
        );
        return Ok(());
    };

    let project = config
        .project(&next.project)
        .ok_or_else(|| Error::UnknownProject(next.project.clone()))?;
    let deploy = project.deploys_branch(&next.branch);
    let conf_dir = conf_dir(&project.conf_path);
    let args = worker_args(&next, deploy, &project.conf_path, &config.server.workspace_dir);

    info!(
        project = %next.project,
        branch = %next.branch,
        commit = %next.curr_commit,
        deploy,
        "dispatching build"
    );
    driver
        .run(&next.worker_name(), &conf_dir, &conf_dir, &args)
        .await?;
    running.insert(&next);
    Ok(())
}

/// Directory containing a project's build-tool config, mounted into workers.
fn conf_dir(conf_path: &str) -> String {
    match conf_path.rsplit_once('/') {
        Some(("", _)) | None => "/".to_string(),
        Some((dir, _)) => dir.to_string(),
    }
}

/// Command line for the worker's build-tool process.
fn worker_args(
    req: &BuildRequest,
    deploy: bool,
    conf_path: &str,
    workspace_dir: &str,
) -> Vec<String> {
    vec![
        "maestro".to_string(),
        format!("--branch={}", req.branch),
        format!("--deploy={}", deploy),
        format!("--prev-commit={}", req.prev_commit),
        format!("--curr-commit={}", req.curr_commit),
        format!("--config={}", conf_path),
        format!("--clone-path={}", workspace_dir),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use maestrod_config::{Project, Server};
    use std::collections::HashSet;
    use std::sync::Mutex;

    /// Recording driver whose workers never finish on their own.
    struct RecordingDriver {
        alive: Mutex<HashSet<String>>,
        fail_run: bool,
        runs: Mutex<Vec<(String, String, Vec<String>)>>,
    }

    impl RecordingDriver {
        fn new() -> Self {
            Self {
                alive: Mutex::new(HashSet::new()),
                fail_run: false,
                runs: Mutex::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            Self {
                fail_run: true,
                ..Self::new()
            }
        }

        fn finish_worker(&self, name: &str) {
            self.alive.lock().unwrap().remove(name);
        }
    }

    #[async_trait]
    impl Driver for RecordingDriver {
        fn name(&self) -> &'static str {
            "recording"
        }

        async fn run(
            &self,
            name: &str,
            conf_target: &str,
            _host_volume: &str,
            args: &[String],
        ) -> Result<()> {
            if self.fail_run {
                return Err(Error::UnexpectedStatus {
                    action: "create maestro worker".to_string(),
                    status: 403,
                    body: "forbidden".to_string(),
                });
            }
            self.alive.lock().unwrap().insert(name.to_string());
            self.runs.lock().unwrap().push((
                name.to_string(),
                conf_target.to_string(),
                args.to_vec(),
            ));
            Ok(())
        }

        async fn destroy_worker(&self, _project: &str, _branch: &str) -> Result<()> {
            Ok(())
        }

        async fn worker_exists(&self, name: &str) -> Result<bool> {
            Ok(self.alive.lock().unwrap().contains(name))
        }
    }

    fn config(max_builds: usize) -> Config {
        Config {
            server: Server {
                runtime: "kubernetes".to_string(),
                target_host: "https://k8s.internal:6443".to_string(),
                bearer_token: None,
                max_builds,
                workspace_dir: "/var/lib/maestrod/workspace".to_string(),
                maestro_version: "0.3.1".to_string(),
                listen_addr: "0.0.0.0:8484".to_string(),
                check_interval_secs: 10,
                request_timeout_secs: 30,
            },
            projects: vec![
                Project {
                    name: "org/web".to_string(),
                    conf_path: "/etc/maestro/org-web/maestro.toml".to_string(),
                    deploy_branches: vec!["main".to_string(), "production".to_string()],
                },
                Project {
                    name: "org/api".to_string(),
                    conf_path: "/etc/maestro/org-api/maestro.toml".to_string(),
                    deploy_branches: vec![],
                },
            ],
            mounts: vec![],
        }
    }

    fn req(project: &str, branch: &str, prev: &str, curr: &str) -> BuildRequest {
        BuildRequest::new(project, branch, prev, curr)
    }

    #[tokio::test]
    async fn test_check_dispatches_and_tracks() {
        let config = config(5);
        let driver = RecordingDriver::new();
        let mut queue = BuildQueue::new();
        let mut running = RunningSet::new();
        queue.enqueue(req("org/web", "main", "a1", "b2"));

        check(&config, &mut queue, &mut running, &driver)
            .await
            .unwrap();

        assert!(queue.is_empty());
        assert_eq!(running.len(), 1);

        let runs = driver.runs.lock().unwrap();
        let (name, conf_target, args) = &runs[0];
        assert_eq!(name, "org/web-main-b2");
        assert_eq!(conf_target, "/etc/maestro/org-web");
        assert_eq!(
            args,
            &vec![
                "maestro".to_string(),
                "--branch=main".to_string(),
                "--deploy=true".to_string(),
                "--prev-commit=a1".to_string(),
                "--curr-commit=b2".to_string(),
                "--config=/etc/maestro/org-web/maestro.toml".to_string(),
                "--clone-path=/var/lib/maestrod/workspace".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_check_deploy_flag_off_for_other_branches() {
        let config = config(5);
        let driver = RecordingDriver::new();
        let mut queue = BuildQueue::new();
        let mut running = RunningSet::new();
        queue.enqueue(req("org/web", "feature/ui", "", "c3"));

        check(&config, &mut queue, &mut running, &driver)
            .await
            .unwrap();

        let runs = driver.runs.lock().unwrap();
        assert!(runs[0].2.contains(&"--deploy=false".to_string()));
    }

    #[tokio::test]
    async fn test_check_empty_queue_is_not_an_error() {
        let config = config(5);
        let driver = RecordingDriver::new();
        let mut queue = BuildQueue::new();
        let mut running = RunningSet::new();

        check(&config, &mut queue, &mut running, &driver)
            .await
            .unwrap();
        assert!(running.is_empty());
    }

    #[tokio::test]
    async fn test_check_same_key_blocked_until_worker_finishes() {
        let config = config(5);
        let driver = RecordingDriver::new();
        let mut queue = BuildQueue::new();
        let mut running = RunningSet::new();
        queue.enqueue(req("org/web", "main", "", "c1"));
        queue.enqueue(req("org/web", "main", "c1", "c2"));

        check(&config, &mut queue, &mut running, &driver)
            .await
            .unwrap();
        assert_eq!(running.len(), 1);
        assert_eq!(queue.len(), 1);

        // c1 still running: c2 is not admitted.
        check(&config, &mut queue, &mut running, &driver)
            .await
            .unwrap();
        assert_eq!(queue.len(), 1);
        assert_eq!(driver.runs.lock().unwrap().len(), 1);

        // Once the backend reports c1's worker gone, reconciliation frees
        // the key and c2 is admitted in the same cycle.
        driver.finish_worker("org/web-main-c1");
        check(&config, &mut queue, &mut running, &driver)
            .await
            .unwrap();
        assert!(queue.is_empty());
        assert_eq!(running.len(), 1);
        assert_eq!(driver.runs.lock().unwrap()[1].0, "org/web-main-c2");
    }

    #[tokio::test]
    async fn test_check_respects_global_cap() {
        let config = config(1);
        let driver = RecordingDriver::new();
        let mut queue = BuildQueue::new();
        let mut running = RunningSet::new();
        queue.enqueue(req("org/web", "main", "", "c1"));
        queue.enqueue(req("org/api", "main", "", "c2"));

        check(&config, &mut queue, &mut running, &driver)
            .await
            .unwrap();
        check(&config, &mut queue, &mut running, &driver)
            .await
            .unwrap();

        // Different key, but the cap is full.
        assert_eq!(running.len(), 1);
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test]
    async fn test_check_unknown_project_is_dropped_with_error() {
        let config = config(5);
        let driver = RecordingDriver::new();
        let mut queue = BuildQueue::new();
        let mut running = RunningSet::new();
        queue.enqueue(req("org/ghost", "main", "", "c1"));

        let err = check(&config, &mut queue, &mut running, &driver)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnknownProject(name) if name == "org/ghost"));

        // The request is lost, not re-enqueued.
        assert!(queue.is_empty());
        assert!(running.is_empty());
        assert!(driver.runs.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_check_dispatch_failure_is_not_requeued() {
        let config = config(5);
        let driver = RecordingDriver::failing();
        let mut queue = BuildQueue::new();
        let mut running = RunningSet::new();
        queue.enqueue(req("org/web", "main", "", "c1"));

        let err = check(&config, &mut queue, &mut running, &driver)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnexpectedStatus { status: 403, .. }));

        // At-most-once dispatch: the popped request is lost and the build is
        // not considered running.
        assert!(queue.is_empty());
        assert!(running.is_empty());
    }

    #[test]
    fn test_conf_dir() {
        assert_eq!(conf_dir("/etc/maestro/org-web/maestro.toml"), "/etc/maestro/org-web");
        assert_eq!(conf_dir("/maestro.toml"), "/");
        assert_eq!(conf_dir("maestro.toml"), "/");
    }
}
