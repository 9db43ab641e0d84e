use std::path::Path;

use anyhow::{Context, anyhow};

use crate::{run_git, validate_ref_name};

/// The branch new worktrees base on: origin's HEAD when the repo has
/// one, otherwise the first of `main` / `master` that exists.
pub async fn get_default_branch(
  repo_path: &Path,
) -> anyhow::Result<String> {
  if let Ok(stdout) = run_git(
    repo_path,
    "symbolic-ref refs/remotes/origin/HEAD --short",
  )
  .await
  {
    let branch = stdout.trim();
    if let Some(branch) = branch.strip_prefix("origin/") {
      return Ok(branch.to_string());
    }
  }
  let branches = get_branches(repo_path).await?;
  for candidate in ["main", "master"] {
    if branches.iter().any(|b| b == candidate) {
      return Ok(candidate.to_string());
    }
  }
  Err(anyhow!(
    "could not determine default branch for {repo_path:?}"
  ))
}

pub async fn get_current_branch(
  repo_path: &Path,
) -> anyhow::Result<String> {
  let stdout = run_git(repo_path, "branch --show-current").await?;
  let branch = stdout.trim();
  if branch.is_empty() {
    return Err(anyhow!("HEAD is detached in {repo_path:?}"));
  }
  Ok(branch.to_string())
}

pub async fn get_branches(
  repo_path: &Path,
) -> anyhow::Result<Vec<String>> {
  let stdout = run_git(
    repo_path,
    "branch --format '%(refname:short)'",
  )
  .await?;
  Ok(
    stdout
      .lines()
      .map(str::trim)
      .filter(|line| !line.is_empty())
      .map(str::to_string)
      .collect(),
  )
}

pub async fn switch_branch(
  repo_path: &Path,
  branch: &str,
) -> anyhow::Result<()> {
  validate_ref_name(branch)?;
  run_git(repo_path, format!("switch {branch}"))
    .await
    .with_context(|| format!("failed to switch to {branch}"))?;
  Ok(())
}

/// Whether `branch` has been merged into the current HEAD of
/// `repo_path`.
pub async fn is_branch_merged(
  repo_path: &Path,
  branch: &str,
) -> anyhow::Result<bool> {
  validate_ref_name(branch)?;
  let stdout = run_git(
    repo_path,
    "branch --merged --format '%(refname:short)'",
  )
  .await?;
  Ok(stdout.lines().any(|line| line.trim() == branch))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::test_utils::scratch_repo;

  #[tokio::test]
  async fn default_branch_falls_back_to_main() {
    let dir = tempfile::tempdir().unwrap();
    let repo = scratch_repo(dir.path()).await;
    assert_eq!(get_default_branch(&repo).await.unwrap(), "main");
  }

  #[tokio::test]
  async fn branch_queries() {
    let dir = tempfile::tempdir().unwrap();
    let repo = scratch_repo(dir.path()).await;
    run_git(&repo, "branch side").await.unwrap();

    assert_eq!(get_current_branch(&repo).await.unwrap(), "main");
    let mut branches = get_branches(&repo).await.unwrap();
    branches.sort();
    assert_eq!(branches, vec!["main", "side"]);

    switch_branch(&repo, "side").await.unwrap();
    assert_eq!(get_current_branch(&repo).await.unwrap(), "side");
    assert!(switch_branch(&repo, "missing").await.is_err());
  }

  #[tokio::test]
  async fn merged_detection() {
    let dir = tempfile::tempdir().unwrap();
    let repo = scratch_repo(dir.path()).await;
    // a branch pointing at HEAD counts as merged
    run_git(&repo, "branch done").await.unwrap();
    assert!(is_branch_merged(&repo, "done").await.unwrap());

    // diverge it
    run_git(&repo, "switch done").await.unwrap();
    std::fs::write(repo.join("side.txt"), "side\n").unwrap();
    run_git(&repo, "add -A").await.unwrap();
    run_git(&repo, "commit -m side-change").await.unwrap();
    run_git(&repo, "switch main").await.unwrap();
    assert!(!is_branch_merged(&repo, "done").await.unwrap());
  }
}
