use std::path::Path;

use anyhow::Context;

use crate::{git_check, run_git};

/// Stage everything and commit. Tolerates there being nothing to
/// commit. Sets a repo-local committer identity when none is
/// configured (fresh containers).
#[tracing::instrument(level = "debug", skip(message))]
pub async fn add_and_commit(
  repo_path: &Path,
  message: &str,
) -> anyhow::Result<()> {
  ensure_git_identity(repo_path).await;

  run_git(repo_path, "add -A")
    .await
    .context("failed to stage changes")?;

  let message = message.replace('\'', "'\\''");
  let log = command::run_vibeman_command(
    "Commit",
    repo_path,
    format!("git commit -m '{message}'"),
  )
  .await;
  if !log.success && !log.stdout.contains("nothing to commit") {
    return Err(
      anyhow::anyhow!("{}", log.combined())
        .context("failed to commit"),
    );
  }
  Ok(())
}

async fn ensure_git_identity(repo_path: &Path) {
  if !git_check(repo_path, "config user.email").await {
    let _ = run_git(
      repo_path,
      "config user.email vibeman@localhost",
    )
    .await;
  }
  if !git_check(repo_path, "config user.name").await {
    let _ = run_git(repo_path, "config user.name vibeman").await;
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::test_utils::scratch_repo;

  #[tokio::test]
  async fn commits_changes_and_tolerates_clean_tree() {
    let dir = tempfile::tempdir().unwrap();
    let repo = scratch_repo(dir.path()).await;

    std::fs::write(repo.join("file.txt"), "contents\n").unwrap();
    add_and_commit(&repo, "add file").await.unwrap();
    assert!(!crate::has_uncommitted_changes(&repo).await.unwrap());

    // a second run with nothing to commit is not an error
    add_and_commit(&repo, "noop").await.unwrap();
  }
}
