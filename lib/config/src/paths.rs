use std::path::{Path, PathBuf};

use anyhow::Context;
use directories::{ProjectDirs, UserDirs};

/// Resolved filesystem layout for the daemon's own files.
///
/// Config lives under the XDG config dir, mutable state (database,
/// logs) under the XDG state dir. `VIBEMAN_CONFIG_DIR` /
/// `VIBEMAN_STATE_DIR` override both, which the tests lean on.
#[derive(Debug, Clone, PartialEq)]
pub struct VibemanPaths {
  pub config_dir: PathBuf,
  pub state_dir: PathBuf,
}

impl VibemanPaths {
  pub fn resolve() -> anyhow::Result<VibemanPaths> {
    let dirs = ProjectDirs::from("", "", "vibeman")
      .context("failed to resolve user directories")?;
    let config_dir = match std::env::var_os("VIBEMAN_CONFIG_DIR") {
      Some(dir) => PathBuf::from(dir),
      None => dirs.config_dir().to_path_buf(),
    };
    let state_dir = match std::env::var_os("VIBEMAN_STATE_DIR") {
      Some(dir) => PathBuf::from(dir),
      None => dirs
        .state_dir()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| dirs.data_local_dir().to_path_buf()),
    };
    Ok(VibemanPaths {
      config_dir,
      state_dir,
    })
  }

  pub fn config_file(&self) -> PathBuf {
    self.config_dir.join("config.toml")
  }

  pub fn services_file(&self) -> PathBuf {
    self.config_dir.join("services.toml")
  }

  pub fn database_file(&self) -> PathBuf {
    self.state_dir.join("vibeman.db")
  }

  pub fn logs_root(&self) -> PathBuf {
    self.state_dir.join("logs")
  }

  /// Log directory for one worktree.
  pub fn worktree_log_dir(
    &self,
    repo: &str,
    worktree: &str,
  ) -> PathBuf {
    self.logs_root().join(repo).join(worktree)
  }

  /// Fallback roots under the user home when storage paths are not
  /// configured.
  pub fn default_worktrees_root() -> anyhow::Result<PathBuf> {
    Ok(home_dir()?.join("vibeman").join("worktrees"))
  }

  pub fn default_repositories_root() -> anyhow::Result<PathBuf> {
    Ok(home_dir()?.join("vibeman").join("repositories"))
  }
}

fn home_dir() -> anyhow::Result<PathBuf> {
  UserDirs::new()
    .context("failed to resolve user home directory")
    .map(|dirs| dirs.home_dir().to_path_buf())
}
