use std::path::Path;

use crate::run_git;

/// Any staged, unstaged or untracked changes in the working tree.
pub async fn has_uncommitted_changes(
  repo_path: &Path,
) -> anyhow::Result<bool> {
  let stdout = run_git(repo_path, "status --porcelain").await?;
  Ok(!stdout.trim().is_empty())
}

/// Commits that exist locally but not on the remote.
///
/// With an upstream configured this is `@{u}..HEAD`. Without one but
/// with remotes present, any commit unreachable from every remote
/// branch counts. A repo with no remotes at all has nowhere to push,
/// so nothing is "unpushed".
pub async fn has_unpushed_commits(
  repo_path: &Path,
) -> anyhow::Result<bool> {
  if let Ok(stdout) =
    run_git(repo_path, "rev-list --count @{u}..HEAD").await
  {
    return Ok(parse_count(&stdout) > 0);
  }
  let remotes = run_git(repo_path, "remote").await?;
  if remotes.trim().is_empty() {
    return Ok(false);
  }
  let stdout =
    run_git(repo_path, "rev-list --count HEAD --not --remotes")
      .await?;
  Ok(parse_count(&stdout) > 0)
}

fn parse_count(stdout: &str) -> u64 {
  stdout.trim().parse().unwrap_or(0)
}
