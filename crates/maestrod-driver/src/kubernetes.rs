//! Kubernetes backend adapter.

use std::time::Duration;

use async_trait::async_trait;
use maestrod_config::{Mount, MountKind, Server};
use maestrod_core::{Driver, Error, Result};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use tracing::debug;

use crate::resources::{
    Container, DeleteOptions, Namespace, Pod, ServiceAccount, Volume, VolumeMount,
};

/// Namespace every worker runs in.
const WORKSPACE_NAMESPACE: &str = "maestro";

/// Length limit for worker resource names.
const MAX_NAME_LEN: usize = 58;

/// Driver provisioning workers as pods against a Kubernetes-style API.
pub struct KubernetesDriver {
    host: String,
    maestro_version: String,
    bearer_token: Option<String>,
    mounts: Vec<Mount>,
    client: Client,
}

impl KubernetesDriver {
    pub fn new(server: &Server, mounts: Vec<Mount>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(server.request_timeout_secs))
            .build()
            .map_err(|e| Error::Backend(e.to_string()))?;
        Ok(Self {
            host: server.target_host.trim_end_matches('/').to_string(),
            maestro_version: server.maestro_version.clone(),
            bearer_token: server.bearer_token.clone(),
            mounts,
            client,
        })
    }

    /// Adapter with a caller-supplied client.
    pub fn with_client(
        client: Client,
        host: impl Into<String>,
        maestro_version: impl Into<String>,
        mounts: Vec<Mount>,
    ) -> Self {
        Self {
            host: host.into(),
            maestro_version: maestro_version.into(),
            bearer_token: None,
            mounts,
            client,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.host, path)
    }

    fn with_auth(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.bearer_token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn create<T: Serialize>(&self, path: &str, action: &str, body: &T) -> Result<()> {
        let res = self
            .with_auth(self.client.post(self.url(path)))
            .json(body)
            .send()
            .await
            .map_err(|e| Error::Backend(e.to_string()))?;
        read_res(res, action, StatusCode::CREATED).await
    }

    async fn destroy<T: Serialize>(&self, path: &str, action: &str, body: &T) -> Result<()> {
        let res = self
            .with_auth(self.client.delete(self.url(path)))
            .json(body)
            .send()
            .await
            .map_err(|e| Error::Backend(e.to_string()))?;
        read_res(res, action, StatusCode::OK).await
    }

    /// Existence check: 404 means absent, 200 means present, anything else
    /// is an adapter-level error.
    async fn exists(&self, path: &str) -> Result<bool> {
        let res = self
            .with_auth(self.client.get(self.url(path)))
            .send()
            .await
            .map_err(|e| Error::Backend(e.to_string()))?;
        match res.status() {
            StatusCode::NOT_FOUND => Ok(false),
            StatusCode::OK => Ok(true),
            status => {
                let body = res.text().await.unwrap_or_default();
                Err(Error::UnexpectedStatus {
                    action: "check existence".to_string(),
                    status: status.as_u16(),
                    body,
                })
            }
        }
    }

    /// Create the workspace namespace if it does not exist.
    pub async fn ensure_namespace(&self) -> Result<()> {
        let path = format!("/api/v1/namespaces/{}", WORKSPACE_NAMESPACE);
        if self.exists(&path).await? {
            return Ok(());
        }
        self.create(
            "/api/v1/namespaces",
            "create namespace",
            &Namespace::new(WORKSPACE_NAMESPACE),
        )
        .await
    }

    /// Create the worker's service account if it does not exist.
    pub async fn ensure_service_account(&self, name: &str) -> Result<()> {
        let path = format!(
            "/api/v1/namespaces/{}/serviceaccounts/{}",
            WORKSPACE_NAMESPACE, name
        );
        if self.exists(&path).await? {
            return Ok(());
        }
        self.create(
            &format!("/api/v1/namespaces/{}/serviceaccounts", WORKSPACE_NAMESPACE),
            "create service account",
            &ServiceAccount::new(name, WORKSPACE_NAMESPACE),
        )
        .await
    }

    /// One volume per configured mount, plus the conf volume named from the
    /// worker identity.
    fn build_volumes(
        &self,
        worker: &str,
        conf_target: &str,
        host_volume: &str,
    ) -> Vec<(Volume, VolumeMount)> {
        let mut volumes = Vec::with_capacity(self.mounts.len() + 1);

        let conf_name = sanitize_name(&format!("{}-conf", worker));
        volumes.push((
            Volume::host_path(&conf_name, host_volume),
            VolumeMount {
                name: conf_name.clone(),
                mount_path: conf_target.to_string(),
                read_only: false,
            },
        ));

        for mount in &self.mounts {
            let volume = match mount.kind {
                MountKind::HostPath => Volume::host_path(&mount.name, &mount.path),
                MountKind::Nfs => Volume::nfs(
                    &mount.name,
                    mount.server.as_deref().unwrap_or_default(),
                    &mount.path,
                    mount.read_only,
                ),
            };
            volumes.push((
                volume,
                VolumeMount {
                    name: mount.name.clone(),
                    mount_path: mount.path.clone(),
                    read_only: mount.read_only,
                },
            ));
        }

        volumes
    }
}

#[async_trait]
impl Driver for KubernetesDriver {
    fn name(&self) -> &'static str {
        "kubernetes"
    }

    async fn run(
        &self,
        name: &str,
        conf_target: &str,
        host_volume: &str,
        args: &[String],
    ) -> Result<()> {
        let worker = sanitize_name(name);

        self.ensure_namespace().await?;
        self.ensure_service_account(&worker).await?;

        let (volumes, volume_mounts): (Vec<Volume>, Vec<VolumeMount>) = self
            .build_volumes(&worker, conf_target, host_volume)
            .into_iter()
            .unzip();
        let container = Container::maestro(&self.maestro_version, args.to_vec(), volume_mounts);
        let pod = Pod::new(&worker, WORKSPACE_NAMESPACE, volumes, container);

        debug!(worker = %worker, "creating worker pod");
        self.create(
            &format!("/api/v1/namespaces/{}/pods", WORKSPACE_NAMESPACE),
            "create maestro worker",
            &pod,
        )
        .await
    }

    async fn destroy_worker(&self, project: &str, branch: &str) -> Result<()> {
        let pod_name = sanitize_name(&format!("{}-{}", project, branch));
        debug!(worker = %pod_name, "deleting worker pod");
        self.destroy(
            &format!(
                "/api/v1/namespaces/{}/pods/{}",
                WORKSPACE_NAMESPACE, pod_name
            ),
            "delete maestro worker",
            &DeleteOptions::with_grace_period(5),
        )
        .await
    }

    async fn worker_exists(&self, name: &str) -> Result<bool> {
        let worker = sanitize_name(name);
        self.exists(&format!(
            "/api/v1/namespaces/{}/pods/{}",
            WORKSPACE_NAMESPACE, worker
        ))
        .await
    }
}

async fn read_res(res: Response, action: &str, expect: StatusCode) -> Result<()> {
    let status = res.status();
    let body = res
        .text()
        .await
        .map_err(|e| Error::Backend(e.to_string()))?;
    if status != expect {
        return Err(Error::UnexpectedStatus {
            action: action.to_string(),
            status: status.as_u16(),
            body,
        });
    }
    Ok(())
}

/// Backend-safe resource name: path separators and underscores become
/// dashes, lowercased, truncated to the backend's length limit. Purely a
/// function of the input, so the same raw name always maps to the same
/// resource.
pub fn sanitize_name(name: &str) -> String {
    name.replace(['/', '_'], "-")
        .to_ascii_lowercase()
        .chars()
        .take(MAX_NAME_LEN)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_replaces_illegal_characters() {
        assert_eq!(sanitize_name("org/app_v2-main-abc"), "org-app-v2-main-abc");
        assert_eq!(sanitize_name("Org/App-Main-ABC"), "org-app-main-abc");
    }

    #[test]
    fn test_sanitize_is_deterministic() {
        let raw = "org/very_long/name-main-0123456789abcdef";
        assert_eq!(sanitize_name(raw), sanitize_name(raw));
    }

    #[test]
    fn test_sanitize_truncates() {
        let raw = "p".repeat(100);
        let sanitized = sanitize_name(&raw);
        assert_eq!(sanitized.len(), MAX_NAME_LEN);
        // Truncation is a pure function of the name, not of call order.
        assert_eq!(sanitize_name(&raw), sanitized);
    }

    #[test]
    fn test_sanitize_short_names_untouched() {
        assert_eq!(sanitize_name("app-main-c1"), "app-main-c1");
    }
}
