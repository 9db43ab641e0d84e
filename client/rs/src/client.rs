use anyhow::Context;
use serde::{Serialize, de::DeserializeOwned};

use crate::entities::{
  NoData,
  config::GlobalConfig,
  container::{
    ContainerAction, ContainerActionRequest, ContainerConfig,
    ContainerDescriptor, ContainerQuery,
  },
  error::{Error, ErrorBody},
  repository::{CreateRepositoryRequest, Repository},
  server::{LogsQuery, LogsResponse, StatusResponse},
  service::ServiceInstance,
  worktree::{
    CreateWorktreeRequest, CreateWorktreeResponse, Worktree,
    WorktreeQuery,
  },
};

/// Typed client for the control plane HTTP API.
#[derive(Clone)]
pub struct VibemanClient {
  address: String,
  client: reqwest::Client,
}

impl VibemanClient {
  pub fn new(address: impl Into<String>) -> VibemanClient {
    VibemanClient {
      address: address.into().trim_end_matches('/').to_string(),
      client: Default::default(),
    }
  }

  pub fn address(&self) -> &str {
    &self.address
  }

  pub async fn status(&self) -> anyhow::Result<StatusResponse> {
    self.get("/api/status", &()).await
  }

  pub async fn get_config(&self) -> anyhow::Result<GlobalConfig> {
    self.get("/api/config", &()).await
  }

  pub async fn shutdown(&self) -> anyhow::Result<NoData> {
    self.post("/api/shutdown", &NoData {}).await
  }

  // REPOSITORIES

  pub async fn list_repositories(
    &self,
  ) -> anyhow::Result<Vec<Repository>> {
    self.get("/api/repositories", &()).await
  }

  pub async fn create_repository(
    &self,
    request: &CreateRepositoryRequest,
  ) -> anyhow::Result<Repository> {
    self.post("/api/repositories", request).await
  }

  pub async fn get_repository(
    &self,
    id: &str,
  ) -> anyhow::Result<Repository> {
    self.get(&format!("/api/repositories/{id}"), &()).await
  }

  pub async fn delete_repository(
    &self,
    id: &str,
  ) -> anyhow::Result<()> {
    self.delete(&format!("/api/repositories/{id}"), &()).await
  }

  // WORKTREES

  pub async fn list_worktrees(
    &self,
    query: &WorktreeQuery,
  ) -> anyhow::Result<Vec<Worktree>> {
    self.get("/api/worktrees", query).await
  }

  pub async fn create_worktree(
    &self,
    request: &CreateWorktreeRequest,
  ) -> anyhow::Result<CreateWorktreeResponse> {
    self.post("/api/worktrees", request).await
  }

  pub async fn get_worktree(
    &self,
    id: &str,
  ) -> anyhow::Result<Worktree> {
    self.get(&format!("/api/worktrees/{id}"), &()).await
  }

  pub async fn delete_worktree(
    &self,
    id: &str,
    force: bool,
  ) -> anyhow::Result<()> {
    self
      .delete(
        &format!("/api/worktrees/{id}"),
        &[("force", force.to_string())],
      )
      .await
  }

  pub async fn start_worktree(
    &self,
    id: &str,
  ) -> anyhow::Result<Worktree> {
    self
      .post(&format!("/api/worktrees/{id}/start"), &NoData {})
      .await
  }

  pub async fn stop_worktree(
    &self,
    id: &str,
  ) -> anyhow::Result<Worktree> {
    self
      .post(&format!("/api/worktrees/{id}/stop"), &NoData {})
      .await
  }

  pub async fn worktree_logs(
    &self,
    id: &str,
    lines: Option<usize>,
  ) -> anyhow::Result<LogsResponse> {
    self
      .get(&format!("/api/worktrees/{id}/logs"), &LogsQuery { lines })
      .await
  }

  // SERVICES

  pub async fn list_services(
    &self,
  ) -> anyhow::Result<Vec<ServiceInstance>> {
    self.get("/api/services", &()).await
  }

  pub async fn start_service(
    &self,
    name: &str,
  ) -> anyhow::Result<ServiceInstance> {
    self
      .post(&format!("/api/services/{name}/start"), &NoData {})
      .await
  }

  pub async fn stop_service(
    &self,
    name: &str,
  ) -> anyhow::Result<ServiceInstance> {
    self
      .post(&format!("/api/services/{name}/stop"), &NoData {})
      .await
  }

  pub async fn service_logs(
    &self,
    name: &str,
    lines: Option<usize>,
  ) -> anyhow::Result<LogsResponse> {
    self
      .get(&format!("/api/services/{name}/logs"), &LogsQuery { lines })
      .await
  }

  // CONTAINERS

  pub async fn list_containers(
    &self,
    query: &ContainerQuery,
  ) -> anyhow::Result<Vec<ContainerDescriptor>> {
    self.get("/api/containers", query).await
  }

  pub async fn create_container(
    &self,
    config: &ContainerConfig,
  ) -> anyhow::Result<ContainerDescriptor> {
    self.post("/api/containers", config).await
  }

  pub async fn get_container(
    &self,
    id: &str,
  ) -> anyhow::Result<ContainerDescriptor> {
    self.get(&format!("/api/containers/{id}"), &()).await
  }

  pub async fn delete_container(&self, id: &str) -> anyhow::Result<()> {
    self.delete(&format!("/api/containers/{id}"), &()).await
  }

  pub async fn container_action(
    &self,
    id: &str,
    action: ContainerAction,
  ) -> anyhow::Result<ContainerDescriptor> {
    self
      .post(
        &format!("/api/containers/{id}/action"),
        &ContainerActionRequest { action },
      )
      .await
  }

  pub async fn container_logs(
    &self,
    id: &str,
    lines: Option<usize>,
  ) -> anyhow::Result<LogsResponse> {
    self
      .get(&format!("/api/containers/{id}/logs"), &LogsQuery { lines })
      .await
  }

  // INNER

  async fn get<R: DeserializeOwned>(
    &self,
    endpoint: &str,
    query: &impl Serialize,
  ) -> anyhow::Result<R> {
    let res = self
      .client
      .get(format!("{}{endpoint}", self.address))
      .query(query)
      .send()
      .await
      .with_context(|| {
        format!("failed to reach vibeman server at {}", self.address)
      })?;
    handle_response(res).await
  }

  async fn post<R: DeserializeOwned>(
    &self,
    endpoint: &str,
    body: &impl Serialize,
  ) -> anyhow::Result<R> {
    let res = self
      .client
      .post(format!("{}{endpoint}", self.address))
      .json(body)
      .send()
      .await
      .with_context(|| {
        format!("failed to reach vibeman server at {}", self.address)
      })?;
    handle_response(res).await
  }

  async fn delete<R: DeserializeOwned>(
    &self,
    endpoint: &str,
    query: &impl Serialize,
  ) -> anyhow::Result<R> {
    let res = self
      .client
      .delete(format!("{}{endpoint}", self.address))
      .query(query)
      .send()
      .await
      .with_context(|| {
        format!("failed to reach vibeman server at {}", self.address)
      })?;
    handle_response(res).await
  }
}

async fn handle_response<R: DeserializeOwned>(
  res: reqwest::Response,
) -> anyhow::Result<R> {
  let status = res.status();
  if status.is_success() {
    if status == reqwest::StatusCode::NO_CONTENT {
      // DELETE endpoints return no body
      return serde_json::from_str("null")
        .or_else(|_| serde_json::from_str("{}"))
        .context("endpoint returned no content for typed response");
    }
    let bytes =
      res.bytes().await.context("failed to read response body")?;
    serde_json::from_slice(&bytes).with_context(|| {
      format!(
        "failed to parse response body: {}",
        String::from_utf8_lossy(&bytes)
      )
    })
  } else {
    let bytes =
      res.bytes().await.context("failed to read error body")?;
    let error = match serde_json::from_slice::<ErrorBody>(&bytes) {
      Ok(body) => body.into_error(),
      Err(_) => Error::new(
        crate::entities::error::ErrorKind::Unknown,
        format!(
          "server returned {status}: {}",
          String::from_utf8_lossy(&bytes)
        ),
      ),
    };
    Err(error.into())
  }
}
