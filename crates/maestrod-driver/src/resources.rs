//! Kubernetes-style resource documents.
//!
//! The backend speaks plain JSON over HTTP: every resource carries `kind`,
//! `apiVersion` and `metadata`, creation is a POST answered with 201,
//! deletion a DELETE answered with 200.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metadata {
    pub name: String,
    pub namespace: String,
}

/// A logical workspace namespace.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Namespace {
    pub kind: String,
    pub api_version: String,
    pub metadata: Metadata,
}

impl Namespace {
    pub fn new(name: &str) -> Self {
        Self {
            kind: "Namespace".to_string(),
            api_version: "v1".to_string(),
            metadata: Metadata {
                name: name.to_string(),
                namespace: name.to_string(),
            },
        }
    }
}

/// Service identity a worker runs under.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceAccount {
    pub kind: String,
    pub api_version: String,
    pub metadata: Metadata,
}

impl ServiceAccount {
    pub fn new(name: &str, namespace: &str) -> Self {
        Self {
            kind: "ServiceAccount".to_string(),
            api_version: "v1".to_string(),
            metadata: Metadata {
                name: name.to_string(),
                namespace: namespace.to_string(),
            },
        }
    }
}

/// One worker compute unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pod {
    pub kind: String,
    pub api_version: String,
    pub metadata: Metadata,
    pub spec: PodSpec,
}

impl Pod {
    pub fn new(name: &str, namespace: &str, volumes: Vec<Volume>, container: Container) -> Self {
        Self {
            kind: "Pod".to_string(),
            api_version: "v1".to_string(),
            metadata: Metadata {
                name: name.to_string(),
                namespace: namespace.to_string(),
            },
            spec: PodSpec {
                volumes,
                containers: vec![container],
                // Build outcome is observed via reconciliation, not process
                // supervision.
                restart_policy: Some("Never".to_string()),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodSpec {
    pub volumes: Vec<Volume>,
    pub containers: Vec<Container>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restart_policy: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Container {
    pub name: String,
    pub image: String,
    pub command: Vec<String>,
    pub volume_mounts: Vec<VolumeMount>,
    pub security_context: SecurityContext,
}

impl Container {
    /// The single build-tool container of a worker pod.
    pub fn maestro(version: &str, command: Vec<String>, volume_mounts: Vec<VolumeMount>) -> Self {
        Self {
            name: "maestro".to_string(),
            image: format!("maestro:{}", version),
            command,
            volume_mounts,
            security_context: SecurityContext::default(),
        }
    }
}

/// Minimal, unprivileged security context.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecurityContext {
    pub privileged: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeMount {
    pub name: String,
    pub mount_path: String,
    pub read_only: bool,
}

/// A pod volume with exactly one source.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Volume {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_path: Option<HostPathSource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nfs: Option<NfsSource>,
}

impl Volume {
    pub fn host_path(name: &str, path: &str) -> Self {
        Self {
            name: name.to_string(),
            host_path: Some(HostPathSource {
                path: path.to_string(),
            }),
            nfs: None,
        }
    }

    pub fn nfs(name: &str, server: &str, path: &str, read_only: bool) -> Self {
        Self {
            name: name.to_string(),
            host_path: None,
            nfs: Some(NfsSource {
                server: server.to_string(),
                path: path.to_string(),
                read_only,
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostPathSource {
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NfsSource {
    pub server: String,
    pub path: String,
    pub read_only: bool,
}

/// Body of a deletion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteOptions {
    pub kind: String,
    pub api_version: String,
    pub grace_period_seconds: u32,
}

impl DeleteOptions {
    pub fn with_grace_period(seconds: u32) -> Self {
        Self {
            kind: "DeleteOptions".to_string(),
            api_version: "v1".to_string(),
            grace_period_seconds: seconds,
        }
    }
}
