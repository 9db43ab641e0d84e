//! # Vibeman Git
//!
//! Git operations behind the worktree lifecycle: repo detection and
//! cloning, worktree add / remove, branch queries, dirty / unpushed
//! detection. Everything shells out to the `git` binary and returns
//! typed results; paths coming back out are always canonicalized so
//! worktree path equality survives tmpdir symlinks.

use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use command::run_vibeman_command;

mod branch;
mod commit;
mod init;
mod status;
mod worktree;

pub use branch::*;
pub use commit::*;
pub use init::*;
pub use status::*;
pub use worktree::*;

/// Run one git command in `path`, failing with the command's output
/// when git reports an error. Returns stdout.
pub(crate) async fn run_git(
  path: &Path,
  command: impl AsRef<str>,
) -> anyhow::Result<String> {
  let command = command.as_ref();
  let log =
    run_vibeman_command("git", path, format!("git {command}")).await;
  if log.success {
    Ok(log.stdout)
  } else {
    Err(anyhow!("{}", log.combined())
      .context(format!("git {command} failed in {path:?}")))
  }
}

/// Like [run_git], but only reports whether git succeeded.
pub(crate) async fn git_check(
  path: &Path,
  command: impl AsRef<str>,
) -> bool {
  run_vibeman_command(
    "git",
    path,
    format!("git {}", command.as_ref()),
  )
  .await
  .success
}

/// Resolve symlinks so path comparisons are reliable, eg across
/// `/var` vs `/private/var` on macOS.
pub fn canonical(path: &Path) -> anyhow::Result<PathBuf> {
  path
    .canonicalize()
    .with_context(|| format!("failed to canonicalize path {path:?}"))
}

/// Reject ref / branch names that could not have come from a sane
/// request before they reach a command line.
pub(crate) fn validate_ref_name(name: &str) -> anyhow::Result<()> {
  if name.is_empty() {
    return Err(anyhow!("ref name cannot be empty"));
  }
  if name.starts_with('-') || name.ends_with('/') {
    return Err(anyhow!("invalid ref name: {name}"));
  }
  if name
    .chars()
    .any(|c| c.is_whitespace() || "~^:?*[\\;|&$`'\"<>(){}".contains(c))
  {
    return Err(anyhow!("invalid characters in ref name: {name}"));
  }
  Ok(())
}

#[cfg(test)]
pub(crate) mod test_utils {
  use super::*;

  /// `git init` a scratch repo with one commit on `main`.
  pub async fn scratch_repo(dir: &Path) -> PathBuf {
    let repo = dir.join("repo");
    std::fs::create_dir_all(&repo).unwrap();
    run_git(&repo, "init -b main").await.unwrap();
    run_git(&repo, "config user.email test@vibeman.dev")
      .await
      .unwrap();
    run_git(&repo, "config user.name vibeman-test").await.unwrap();
    std::fs::write(repo.join("README.md"), "# scratch\n").unwrap();
    run_git(&repo, "add -A").await.unwrap();
    run_git(&repo, "commit -m initial").await.unwrap();
    canonical(&repo).unwrap()
  }
}
