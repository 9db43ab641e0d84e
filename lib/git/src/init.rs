use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use command::run_vibeman_command;

use crate::{canonical, run_git};

/// Initialize `path` as a fresh git repository.
pub async fn init_repository(path: &Path) -> anyhow::Result<()> {
  tokio::fs::create_dir_all(path).await.with_context(|| {
    format!("failed to initialize repo directory {path:?}")
  })?;
  run_git(path, "init").await?;
  Ok(())
}

/// Whether `path` is inside a git repository work tree.
pub async fn is_repository(path: &Path) -> bool {
  if !path.is_dir() {
    return false;
  }
  crate::git_check(path, "rev-parse --git-dir").await
}

/// Clone `url` to `path`. The destination must not already exist.
/// Returns the canonicalized repo path.
#[tracing::instrument(level = "debug")]
pub async fn clone_repository(
  url: &str,
  path: &Path,
) -> anyhow::Result<PathBuf> {
  if path.exists() {
    return Err(anyhow!("clone destination {path:?} already exists"));
  }
  if let Some(parent) = path.parent() {
    tokio::fs::create_dir_all(parent).await.with_context(|| {
      format!("failed to initialize clone parent directory {parent:?}")
    })?;
  }
  let log = run_vibeman_command(
    "Clone Repo",
    None,
    format!("git clone {url} {}", path.display()),
  )
  .await;
  if !log.success {
    // git leaves a partial directory behind on some failures
    let _ = std::fs::remove_dir_all(path);
    return Err(
      anyhow!("{}", log.combined())
        .context(format!("failed to clone {url}")),
    );
  }
  canonical(path)
}
