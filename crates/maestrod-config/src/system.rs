//! Daemon configuration parsing.

use crate::{ConfigError, ConfigResult};
use kdl::{KdlDocument, KdlNode};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Daemon-wide configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: Server,
    pub projects: Vec<Project>,
    pub mounts: Vec<Mount>,
}

/// Server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Server {
    /// Which backend runtime to drive (e.g. "kubernetes").
    pub runtime: String,
    /// Base URL of the backend API.
    pub target_host: String,
    /// Bearer token forwarded to the backend API, if any.
    pub bearer_token: Option<String>,
    /// Global cap on concurrently running builds.
    pub max_builds: usize,
    /// Directory workers clone sources into.
    pub workspace_dir: String,
    /// Image tag of the build tool to run in workers.
    pub maestro_version: String,
    /// Address the daemon's HTTP API listens on.
    pub listen_addr: String,
    /// Seconds between admission cycles.
    pub check_interval_secs: u64,
    /// Bound on any single backend request.
    pub request_timeout_secs: u64,
}

/// A project eligible for building.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub name: String,
    /// Path to the project's build-tool configuration file.
    pub conf_path: String,
    /// Branches whose builds should also deploy.
    pub deploy_branches: Vec<String>,
}

impl Project {
    pub fn deploys_branch(&self, branch: &str) -> bool {
        self.deploy_branches.iter().any(|b| b == branch)
    }
}

/// A runtime mount materialized as a volume in every worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mount {
    pub name: String,
    pub kind: MountKind,
    /// Path on the volume's source (host path, or export path for NFS).
    pub path: String,
    /// NFS server address, for [`MountKind::Nfs`].
    pub server: Option<String>,
    pub read_only: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MountKind {
    HostPath,
    Nfs,
}

impl Config {
    /// Load and parse a configuration file.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let text = std::fs::read_to_string(path)?;
        parse_config(&text)
    }

    /// Look up a project by name.
    pub fn project(&self, name: &str) -> Option<&Project> {
        self.projects.iter().find(|p| p.name == name)
    }
}

/// Parse daemon configuration from KDL text.
pub fn parse_config(kdl: &str) -> ConfigResult<Config> {
    let doc: KdlDocument = kdl.parse()?;

    let mut server = None;
    let mut projects: Vec<Project> = Vec::new();
    let mut mounts: Vec<Mount> = Vec::new();

    for node in doc.nodes() {
        match node.name().value() {
            "server" => {
                server = Some(parse_server(node)?);
            }
            "project" => {
                let project = parse_project(node)?;
                if projects.iter().any(|p| p.name == project.name) {
                    return Err(ConfigError::Duplicate(format!(
                        "project '{}'",
                        project.name
                    )));
                }
                projects.push(project);
            }
            "mount" => {
                let mount = parse_mount(node)?;
                if mounts.iter().any(|m| m.name == mount.name) {
                    return Err(ConfigError::Duplicate(format!("mount '{}'", mount.name)));
                }
                mounts.push(mount);
            }
            _ => {} // Ignore unknown nodes
        }
    }

    let server = server.ok_or_else(|| ConfigError::MissingField("server".to_string()))?;

    Ok(Config {
        server,
        projects,
        mounts,
    })
}

fn parse_server(node: &KdlNode) -> ConfigResult<Server> {
    let runtime = get_child_string(node, "runtime")
        .ok_or_else(|| ConfigError::MissingField("server runtime".to_string()))?;
    let target_host = get_child_string(node, "target-host")
        .ok_or_else(|| ConfigError::MissingField("server target-host".to_string()))?;
    let max_builds = get_child_int(node, "max-builds")
        .ok_or_else(|| ConfigError::MissingField("server max-builds".to_string()))?;
    if max_builds < 1 {
        return Err(ConfigError::InvalidValue {
            field: "max-builds".to_string(),
            message: format!("must be at least 1, got {}", max_builds),
        });
    }
    let workspace_dir = get_child_string(node, "workspace-dir")
        .ok_or_else(|| ConfigError::MissingField("server workspace-dir".to_string()))?;
    let maestro_version = get_child_string(node, "maestro-version")
        .ok_or_else(|| ConfigError::MissingField("server maestro-version".to_string()))?;

    Ok(Server {
        runtime,
        target_host,
        bearer_token: get_child_string(node, "bearer-token"),
        max_builds: max_builds as usize,
        workspace_dir,
        maestro_version,
        listen_addr: get_child_string(node, "listen-addr")
            .unwrap_or_else(|| "0.0.0.0:8484".to_string()),
        check_interval_secs: get_child_int(node, "check-interval-secs").unwrap_or(10) as u64,
        request_timeout_secs: get_child_int(node, "request-timeout-secs").unwrap_or(30) as u64,
    })
}

fn parse_project(node: &KdlNode) -> ConfigResult<Project> {
    let name = get_first_string_arg(node)
        .ok_or_else(|| ConfigError::MissingField("project name".to_string()))?;
    let conf_path = get_string_prop(node, "conf-path")
        .or_else(|| get_child_string(node, "conf-path"))
        .ok_or_else(|| ConfigError::MissingField(format!("conf-path for project '{}'", name)))?;

    let mut deploy_branches = Vec::new();
    if let Some(children) = node.children() {
        for child in children.nodes() {
            if child.name().value() == "deploy-branches" {
                deploy_branches.extend(get_all_string_args(child));
            }
        }
    }

    Ok(Project {
        name,
        conf_path,
        deploy_branches,
    })
}

fn parse_mount(node: &KdlNode) -> ConfigResult<Mount> {
    let name = get_first_string_arg(node)
        .ok_or_else(|| ConfigError::MissingField("mount name".to_string()))?;

    let kind_str = get_child_string(node, "kind")
        .ok_or_else(|| ConfigError::MissingField(format!("kind for mount '{}'", name)))?;
    let kind = match kind_str.as_str() {
        "host-path" => MountKind::HostPath,
        "nfs" => MountKind::Nfs,
        other => {
            return Err(ConfigError::InvalidValue {
                field: format!("kind for mount '{}'", name),
                message: format!("unknown mount kind: {}", other),
            });
        }
    };

    let path = get_child_string(node, "path")
        .ok_or_else(|| ConfigError::MissingField(format!("path for mount '{}'", name)))?;

    let server = get_child_string(node, "server");
    if kind == MountKind::Nfs && server.is_none() {
        return Err(ConfigError::MissingField(format!(
            "server for nfs mount '{}'",
            name
        )));
    }

    Ok(Mount {
        name,
        kind,
        path,
        server,
        read_only: get_child_bool(node, "read-only").unwrap_or(false),
    })
}

// Helper functions for extracting values from KDL nodes

fn get_first_string_arg(node: &KdlNode) -> Option<String> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .and_then(|e| e.value().as_string())
        .map(|s| s.to_string())
}

fn get_all_string_args(node: &KdlNode) -> Vec<String> {
    node.entries()
        .iter()
        .filter(|e| e.name().is_none())
        .filter_map(|e| e.value().as_string())
        .map(|s| s.to_string())
        .collect()
}

fn get_string_prop(node: &KdlNode, name: &str) -> Option<String> {
    node.get(name)
        .and_then(|v| v.as_string())
        .map(|s| s.to_string())
}

fn child_node<'a>(node: &'a KdlNode, name: &str) -> Option<&'a KdlNode> {
    node.children()?
        .nodes()
        .iter()
        .find(|c| c.name().value() == name)
}

fn get_child_string(node: &KdlNode, name: &str) -> Option<String> {
    child_node(node, name).and_then(get_first_string_arg)
}

fn get_child_int(node: &KdlNode, name: &str) -> Option<i128> {
    child_node(node, name)?
        .entries()
        .iter()
        .find(|e| e.name().is_none())
        .and_then(|e| e.value().as_integer())
}

fn get_child_bool(node: &KdlNode, name: &str) -> Option<bool> {
    child_node(node, name)?
        .entries()
        .iter()
        .find(|e| e.name().is_none())
        .and_then(|e| e.value().as_bool())
}
