use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::logger::LogConfig;

/// Global daemon configuration, loaded from
/// `<xdg_config>/vibeman/config.toml`.
#[derive(
  Debug, Clone, Default, PartialEq, Serialize, Deserialize,
)]
pub struct GlobalConfig {
  #[serde(default)]
  pub server: ServerConfig,
  #[serde(default)]
  pub storage: StorageConfig,
  #[serde(default)]
  pub terminal: TerminalConfig,
  #[serde(default)]
  pub logging: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
  #[serde(default = "default_port")]
  pub port: u16,
  #[serde(default = "default_webui_port")]
  pub webui_port: u16,
}

fn default_port() -> u16 {
  8080
}

fn default_webui_port() -> u16 {
  8081
}

impl Default for ServerConfig {
  fn default() -> Self {
    ServerConfig {
      port: default_port(),
      webui_port: default_webui_port(),
    }
  }
}

#[derive(
  Debug, Clone, Default, PartialEq, Serialize, Deserialize,
)]
pub struct StorageConfig {
  /// Where cloned repositories land. Defaults to
  /// `~/vibeman/repositories`.
  #[serde(default)]
  pub repositories_path: Option<String>,
  /// Default root for worktree directories. Defaults to
  /// `~/vibeman/worktrees`.
  #[serde(default)]
  pub worktrees_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerminalConfig {
  /// Origins allowed to open the terminal websocket. Empty list
  /// restricts to same-host origins.
  #[serde(default)]
  pub allowed_origins: Vec<String>,
  /// Close the socket after this long without any client message.
  #[serde(default = "default_idle_timeout")]
  pub idle_timeout_secs: u64,
}

fn default_idle_timeout() -> u64 {
  600
}

impl Default for TerminalConfig {
  fn default() -> Self {
    TerminalConfig {
      allowed_origins: Vec::new(),
      idle_timeout_secs: default_idle_timeout(),
    }
  }
}

/// `<xdg_config>/vibeman/services.toml` - the shared backing services
/// available to repositories.
#[derive(
  Debug, Clone, Default, PartialEq, Serialize, Deserialize,
)]
pub struct ServicesConfig {
  #[serde(default)]
  pub services: IndexMap<String, super::service::ServiceConfig>,
}

/// Per-repository configuration: `vibeman.toml` at the repo root.
/// A copy (with any worktree-level overrides applied) is written into
/// each worktree at creation.
#[derive(
  Debug, Clone, Default, PartialEq, Serialize, Deserialize,
)]
pub struct RepositoryConfig {
  #[serde(default)]
  pub repository: RepositorySection,
}

#[derive(
  Debug, Clone, Default, PartialEq, Serialize, Deserialize,
)]
pub struct RepositorySection {
  #[serde(default)]
  pub name: String,
  #[serde(default)]
  pub description: String,
  #[serde(default)]
  pub git: GitSection,
  #[serde(default)]
  pub worktrees: WorktreesSection,
  #[serde(default)]
  pub container: ContainerSection,
  /// Shared services this repo uses, by name from `services.toml`.
  #[serde(default)]
  pub services: IndexMap<String, RepoServiceConfig>,
  #[serde(default)]
  pub ai: AiSection,
}

#[derive(
  Debug, Clone, Default, PartialEq, Serialize, Deserialize,
)]
pub struct GitSection {
  /// Base branch for new worktrees when the request doesn't give one.
  #[serde(default)]
  pub default_branch: Option<String>,
  /// Prefix for generated branch names, eg `feature/`.
  #[serde(default)]
  pub worktree_prefix: Option<String>,
}

#[derive(
  Debug, Clone, Default, PartialEq, Serialize, Deserialize,
)]
pub struct WorktreesSection {
  /// Root directory for this repo's worktrees. Overrides the global
  /// storage default.
  #[serde(default)]
  pub directory: Option<String>,
}

#[derive(
  Debug, Clone, Default, PartialEq, Serialize, Deserialize,
)]
pub struct ContainerSection {
  /// Compose file (relative to the worktree) for the worktree's own
  /// containers.
  #[serde(default)]
  pub compose_file: Option<String>,
  /// Compose services to start for the worktree. Empty means all.
  #[serde(default)]
  pub services: Vec<String>,
  /// Run once inside a fresh worktree after required services are up.
  #[serde(default)]
  pub worktree_init: Option<String>,
  #[serde(default)]
  pub env: IndexMap<String, String>,
}

#[derive(
  Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize,
)]
pub struct RepoServiceConfig {
  /// Started automatically during worktree setup.
  #[serde(default)]
  pub required: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiSection {
  #[serde(default = "default_ai_enabled")]
  pub enabled: bool,
  /// Override the default AI container image.
  #[serde(default)]
  pub image: Option<String>,
  #[serde(default)]
  pub env: IndexMap<String, String>,
}

fn default_ai_enabled() -> bool {
  true
}

impl Default for AiSection {
  fn default() -> Self {
    AiSection {
      enabled: default_ai_enabled(),
      image: None,
      env: IndexMap::new(),
    }
  }
}
