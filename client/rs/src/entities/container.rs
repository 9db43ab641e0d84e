use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Label keys applied to every managed container.
pub const LABEL_REPOSITORY: &str = "vibeman.repository";
pub const LABEL_ENVIRONMENT: &str = "vibeman.environment";
pub const LABEL_TYPE: &str = "vibeman.type";
pub const LABEL_MANAGED: &str = "vibeman.managed";

#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  Display,
  EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ContainerType {
  #[default]
  Worktree,
  Service,
  Ai,
}

/// Create-time container configuration handed to the runtime.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContainerConfig {
  /// Container name, `<repo>-<env>` / `<repo>-<env>-ai` for managed
  /// containers. Compose services keep their declared service name.
  pub name: String,
  #[serde(default)]
  pub image: String,
  #[serde(default)]
  pub command: Vec<String>,
  /// Repository this container belongs to (label value).
  #[serde(default)]
  pub repository: String,
  /// Environment (worktree) name (label value).
  #[serde(default)]
  pub environment: String,
  #[serde(default)]
  pub container_type: ContainerType,
  #[serde(default)]
  pub env_vars: IndexMap<String, String>,
  /// `[host_ip:]host_port:container_port[/tcp|/udp]`
  #[serde(default)]
  pub ports: Vec<String>,
  /// `host_path:container_path[:ro]`
  #[serde(default)]
  pub volumes: Vec<String>,
  #[serde(default)]
  pub working_dir: Option<String>,
  /// When set, the runtime goes through compose instead of `create`.
  #[serde(default)]
  pub compose_file: Option<String>,
  /// Compose services to start. Empty starts all services; non-empty
  /// adds `--no-deps`.
  #[serde(default)]
  pub services: Vec<String>,
}

/// What the runtime reports back for a container. Not persisted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContainerDescriptor {
  pub id: String,
  pub name: String,
  #[serde(default)]
  pub image: String,
  /// Raw engine status string, eg `Up 2 minutes`.
  #[serde(default)]
  pub status: String,
  #[serde(default)]
  pub container_type: ContainerType,
  #[serde(default)]
  pub repository: String,
  #[serde(default)]
  pub environment: String,
  #[serde(default)]
  pub env_vars: Vec<String>,
  #[serde(default)]
  pub ports: Vec<String>,
  #[serde(default)]
  pub created_at: String,
}

impl ContainerDescriptor {
  /// Engine list output may truncate ids. Two ids refer to the same
  /// container when either is a prefix of the other.
  pub fn id_matches(&self, id: &str) -> bool {
    !id.is_empty()
      && !self.id.is_empty()
      && (self.id.starts_with(id) || id.starts_with(&self.id))
  }

  pub fn is_running(&self) -> bool {
    self.status.starts_with("Up")
      || self.status.eq_ignore_ascii_case("running")
  }
}

/// Filters for `GET /api/containers`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContainerQuery {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub repository: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub worktree: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub status: Option<String>,
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ContainerAction {
  Start,
  Stop,
  Restart,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerActionRequest {
  pub action: ContainerAction,
}

/// The typed classification of engine failures. `NetworkError` and
/// `VolumeError` are retryable; nothing retries implicitly.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  AsRefStr,
  EnumString,
)]
pub enum ContainerErrorKind {
  /// The engine binary itself is missing / not responding.
  RuntimeNotFound,
  ContainerNotFound,
  ImageNotFound,
  PermissionDenied,
  /// Includes port already allocated.
  NetworkError,
  VolumeError,
  /// Name collision, missing required fields.
  ConfigError,
  ExecError,
  Unknown,
}

impl ContainerErrorKind {
  pub fn is_retryable(&self) -> bool {
    matches!(
      self,
      ContainerErrorKind::NetworkError
        | ContainerErrorKind::VolumeError
    )
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn truncated_id_matches_both_directions() {
    let container = ContainerDescriptor {
      id: "4fa6e0f0c678".to_string(),
      ..Default::default()
    };
    assert!(container.id_matches(
      "4fa6e0f0c6786287e131c3852c58a2e01cc697a93bdcb62885538ab146647d37"
    ));
    assert!(container.id_matches("4fa6e0f0"));
    assert!(!container.id_matches("5fa6e0f0"));
    assert!(!container.id_matches(""));
  }

  #[test]
  fn container_action_wire_format() {
    let req: ContainerActionRequest =
      serde_json::from_str(r#"{"action":"restart"}"#).unwrap();
    assert_eq!(req.action, ContainerAction::Restart);
  }
}
