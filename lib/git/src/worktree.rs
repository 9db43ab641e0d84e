use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};

use crate::{canonical, git_check, run_git, validate_ref_name};

/// One entry of `git worktree list`.
#[derive(Debug, Clone, PartialEq)]
pub struct GitWorktree {
  pub path: PathBuf,
  pub head: String,
  /// None for a detached HEAD.
  pub branch: Option<String>,
}

/// Add a git worktree at `worktree_path` checked out to `branch`.
///
/// The target directory must not exist. When the branch doesn't exist
/// yet it is created from `base` (or the current HEAD). Partial
/// failures are rolled back so no orphan worktree entries remain.
/// Returns the canonicalized worktree path.
#[tracing::instrument(level = "debug")]
pub async fn create_worktree(
  repo_path: &Path,
  branch: &str,
  worktree_path: &Path,
  base: Option<&str>,
) -> anyhow::Result<PathBuf> {
  validate_ref_name(branch)?;
  if let Some(base) = base {
    validate_ref_name(base)?;
  }
  if worktree_path.exists() {
    return Err(anyhow!(
      "worktree target {worktree_path:?} already exists"
    ));
  }
  if let Some(parent) = worktree_path.parent() {
    tokio::fs::create_dir_all(parent).await.with_context(|| {
      format!(
        "failed to initialize worktrees directory {parent:?}"
      )
    })?;
  }

  let branch_exists = git_check(
    repo_path,
    format!("show-ref --verify --quiet refs/heads/{branch}"),
  )
  .await;

  let command = if branch_exists {
    format!("worktree add {} {branch}", worktree_path.display())
  } else {
    let base = base.unwrap_or("HEAD");
    format!(
      "worktree add -b {branch} {} {base}",
      worktree_path.display()
    )
  };

  if let Err(e) = run_git(repo_path, command).await {
    // Roll back any partial state: a half-created directory and the
    // stale administrative entry.
    let _ = std::fs::remove_dir_all(worktree_path);
    let _ = run_git(repo_path, "worktree prune").await;
    return Err(e.context(format!(
      "failed to create worktree for branch {branch}"
    )));
  }

  canonical(worktree_path)
}

/// Remove the worktree at `worktree_path` from `repo_path`'s
/// bookkeeping. Tolerates the directory already being gone.
#[tracing::instrument(level = "debug")]
pub async fn remove_worktree(
  repo_path: &Path,
  worktree_path: &Path,
) -> anyhow::Result<()> {
  let res = run_git(
    repo_path,
    format!("worktree remove --force {}", worktree_path.display()),
  )
  .await;
  if res.is_err() {
    // The directory may have been deleted out from under git; prune
    // clears the leftover entry.
    run_git(repo_path, "worktree prune")
      .await
      .context("failed to prune worktrees")?;
  }
  Ok(())
}

/// Parse `git worktree list --porcelain`. The first entry is the main
/// working tree.
pub async fn list_worktrees(
  repo_path: &Path,
) -> anyhow::Result<Vec<GitWorktree>> {
  let stdout =
    run_git(repo_path, "worktree list --porcelain").await?;
  let mut worktrees = Vec::new();
  let mut current: Option<GitWorktree> = None;
  for line in stdout.lines() {
    if let Some(path) = line.strip_prefix("worktree ") {
      if let Some(worktree) = current.take() {
        worktrees.push(worktree);
      }
      current = Some(GitWorktree {
        path: canonical(Path::new(path))
          .unwrap_or_else(|_| PathBuf::from(path)),
        head: String::new(),
        branch: None,
      });
    } else if let Some(head) = line.strip_prefix("HEAD ") {
      if let Some(worktree) = current.as_mut() {
        worktree.head = head.to_string();
      }
    } else if let Some(branch) = line.strip_prefix("branch ") {
      if let Some(worktree) = current.as_mut() {
        worktree.branch = Some(
          branch.strip_prefix("refs/heads/").unwrap_or(branch)
            .to_string(),
        );
      }
    }
  }
  if let Some(worktree) = current {
    worktrees.push(worktree);
  }
  Ok(worktrees)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::test_utils::scratch_repo;

  #[tokio::test]
  async fn create_list_remove_worktree() {
    let dir = tempfile::tempdir().unwrap();
    let repo = scratch_repo(dir.path()).await;
    let wt_path = dir.path().join("worktrees").join("feature-x");

    let created =
      create_worktree(&repo, "feature/x", &wt_path, None)
        .await
        .unwrap();
    assert!(created.join("README.md").exists());

    let listed = list_worktrees(&repo).await.unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(
      listed[1].branch.as_deref(),
      Some("feature/x"),
    );
    assert_eq!(listed[1].path, created);

    remove_worktree(&repo, &created).await.unwrap();
    assert!(!created.exists());
    assert_eq!(list_worktrees(&repo).await.unwrap().len(), 1);
  }

  #[tokio::test]
  async fn create_refuses_existing_target() {
    let dir = tempfile::tempdir().unwrap();
    let repo = scratch_repo(dir.path()).await;
    let wt_path = dir.path().join("taken");
    std::fs::create_dir_all(&wt_path).unwrap();
    assert!(
      create_worktree(&repo, "feature/y", &wt_path, None)
        .await
        .is_err()
    );
  }

  #[tokio::test]
  async fn create_failure_leaves_no_orphan_entries() {
    let dir = tempfile::tempdir().unwrap();
    let repo = scratch_repo(dir.path()).await;
    let wt_path = dir.path().join("wt-bad-base");
    // base branch doesn't exist -> the add fails and rolls back
    assert!(
      create_worktree(&repo, "feature/z", &wt_path, Some("nope"))
        .await
        .is_err()
    );
    assert!(!wt_path.exists());
    assert_eq!(list_worktrees(&repo).await.unwrap().len(), 1);
  }

  #[tokio::test]
  async fn create_reuses_existing_branch() {
    let dir = tempfile::tempdir().unwrap();
    let repo = scratch_repo(dir.path()).await;
    run_git(&repo, "branch existing").await.unwrap();
    let wt_path = dir.path().join("wt-existing");
    create_worktree(&repo, "existing", &wt_path, None)
      .await
      .unwrap();
    let listed = list_worktrees(&repo).await.unwrap();
    assert_eq!(listed[1].branch.as_deref(), Some("existing"));
  }
}
