//! # Vibeman Config
//!
//! Loads and saves the three configuration surfaces:
//! the global daemon config (`<xdg_config>/vibeman/config.toml`),
//! the shared services declarations (`<xdg_config>/vibeman/services.toml`),
//! and per-repository `vibeman.toml` files.
//!
//! Missing files load as defaults. Saving always goes through
//! [toml::to_string_pretty], so a save -> load -> save round trip is
//! byte-identical.

use std::path::Path;

use anyhow::Context;
use serde::{Serialize, de::DeserializeOwned};
use vibeman_client::entities::config::{
  GlobalConfig, RepositoryConfig, ServicesConfig,
};

mod paths;

pub use paths::VibemanPaths;

/// File name of the per-repository config, at the repo root and
/// copied into each worktree.
pub const REPO_CONFIG_FILE: &str = "vibeman.toml";

pub fn load_global_config(
  paths: &VibemanPaths,
) -> anyhow::Result<GlobalConfig> {
  load_or_default(&paths.config_file())
}

pub fn save_global_config(
  paths: &VibemanPaths,
  config: &GlobalConfig,
) -> anyhow::Result<()> {
  save(&paths.config_file(), config)
}

pub fn load_services_config(
  paths: &VibemanPaths,
) -> anyhow::Result<ServicesConfig> {
  load_or_default(&paths.services_file())
}

/// Load the `vibeman.toml` under `dir` (a repo root or a worktree).
/// A missing file is not an error, the defaults apply.
pub fn load_repository_config(
  dir: &Path,
) -> anyhow::Result<RepositoryConfig> {
  load_or_default(&dir.join(REPO_CONFIG_FILE))
}

pub fn save_repository_config(
  dir: &Path,
  config: &RepositoryConfig,
) -> anyhow::Result<()> {
  save(&dir.join(REPO_CONFIG_FILE), config)
}

fn load_or_default<T: DeserializeOwned + Default>(
  path: &Path,
) -> anyhow::Result<T> {
  if !path.exists() {
    return Ok(T::default());
  }
  let contents = std::fs::read_to_string(path)
    .with_context(|| format!("failed to read config at {path:?}"))?;
  toml::from_str(&contents)
    .with_context(|| format!("failed to parse config at {path:?}"))
}

fn save<T: Serialize>(path: &Path, config: &T) -> anyhow::Result<()> {
  if let Some(parent) = path.parent() {
    std::fs::create_dir_all(parent).with_context(|| {
      format!("failed to initialize config directory {parent:?}")
    })?;
  }
  let contents = toml::to_string_pretty(config)
    .context("failed to serialize config")?;
  std::fs::write(path, contents)
    .with_context(|| format!("failed to write config to {path:?}"))
}

#[cfg(test)]
mod tests {
  use vibeman_client::entities::config::RepoServiceConfig;

  use super::*;

  #[test]
  fn missing_files_load_as_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = load_repository_config(dir.path()).unwrap();
    assert_eq!(config, RepositoryConfig::default());
  }

  #[test]
  fn save_load_save_is_byte_identical() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = RepositoryConfig::default();
    config.repository.name = "myrepo".to_string();
    config.repository.git.worktree_prefix =
      Some("feature/".to_string());
    config.repository.container.services =
      vec!["web".to_string(), "worker".to_string()];
    config
      .repository
      .services
      .insert("postgres".to_string(), RepoServiceConfig {
        required: true,
      });

    save_repository_config(dir.path(), &config).unwrap();
    let first =
      std::fs::read_to_string(dir.path().join(REPO_CONFIG_FILE))
        .unwrap();

    let loaded = load_repository_config(dir.path()).unwrap();
    assert_eq!(loaded, config);

    save_repository_config(dir.path(), &loaded).unwrap();
    let second =
      std::fs::read_to_string(dir.path().join(REPO_CONFIG_FILE))
        .unwrap();
    assert_eq!(first, second);
  }

  #[test]
  fn parses_repo_config_sections() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
      dir.path().join(REPO_CONFIG_FILE),
      r#"
[repository]
name = "api"
description = "backend api"

[repository.git]
default_branch = "develop"
worktree_prefix = "wt/"

[repository.worktrees]
directory = "/srv/worktrees/api"

[repository.container]
compose_file = "docker-compose.yaml"
services = ["app"]
worktree_init = "npm install"

[repository.services.postgres]
required = true

[repository.ai]
image = "vibeman/ai:latest"
"#,
    )
    .unwrap();
    let config = load_repository_config(dir.path()).unwrap();
    let repo = config.repository;
    assert_eq!(repo.name, "api");
    assert_eq!(repo.git.default_branch.as_deref(), Some("develop"));
    assert_eq!(
      repo.worktrees.directory.as_deref(),
      Some("/srv/worktrees/api")
    );
    assert_eq!(
      repo.container.worktree_init.as_deref(),
      Some("npm install")
    );
    assert!(repo.services.get("postgres").unwrap().required);
    assert!(repo.ai.enabled);
    assert_eq!(repo.ai.image.as_deref(), Some("vibeman/ai:latest"));
  }
}
