//! Orchestrates worktree lifecycle across git, the container
//! runtime, the service manager, the log aggregator and the store.

mod create;
mod lifecycle;
mod remove;

pub use create::create_worktree;
pub use lifecycle::{start_worktree, stop_worktree};
pub use remove::remove_worktree;

use vibeman_client::entities::error::{Error, ErrorKind};

/// Image used for AI containers when the repo config doesn't name
/// one.
pub const DEFAULT_AI_IMAGE: &str = "vibeman/ai:latest";

pub fn ai_container_name(repo: &str, worktree: &str) -> String {
  format!("{repo}-{worktree}-ai")
}

/// Worktree names become directory and container names, so they stay
/// strict: nonempty, no separators, no whitespace.
pub fn validate_worktree_name(name: &str) -> Result<(), Error> {
  if name.is_empty() {
    return Err(Error::invalid_input("worktree name cannot be empty"));
  }
  if name.chars().any(|c| c == '/' || c == '\\' || c.is_whitespace())
  {
    return Err(Error::invalid_input(format!(
      "worktree name {name:?} must not contain path separators or whitespace"
    )));
  }
  Ok(())
}

pub(crate) fn config_error(e: anyhow::Error) -> Error {
  Error::new(ErrorKind::ConfigError, format!("{e:#}"))
}

pub(crate) fn git_error(e: anyhow::Error) -> Error {
  Error::new(ErrorKind::GitError, format!("{e:#}"))
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use config::VibemanPaths;
  use db::Database;
  use vibeman_client::entities::{
    config::{GlobalConfig, ServicesConfig},
    container::ContainerType,
    error::ErrorKind,
    new_id, repository,
    worktree::{CreateWorktreeRequest, WorktreeStatus},
  };

  use super::*;
  use crate::server::{App, AppState, test_support::TestRuntime};

  /// `git init` a scratch repo with one commit.
  async fn scratch_repo(
    dir: &std::path::Path,
  ) -> std::path::PathBuf {
    let repo = dir.join("repo");
    git::init_repository(&repo).await.unwrap();
    std::fs::write(repo.join("README.md"), "# scratch\n").unwrap();
    git::add_and_commit(&repo, "initial").await.unwrap();
    git::canonical(&repo).unwrap()
  }

  /// An App wired to a runtime double, an in-memory store, and a
  /// real scratch git repository under a tempdir.
  async fn scratch_app(
    dir: &std::path::Path,
  ) -> (AppState, Arc<TestRuntime>, repository::Repository) {
    let repo_path = scratch_repo(dir).await;

    let mut config = GlobalConfig::default();
    config.storage.worktrees_path = Some(
      dir.join("worktrees").to_string_lossy().to_string(),
    );
    let paths = VibemanPaths {
      config_dir: dir.join("config"),
      state_dir: dir.join("state"),
    };
    let runtime = Arc::new(TestRuntime::default());
    let app = App::assemble(
      config,
      ServicesConfig::default(),
      paths,
      Database::open_in_memory().unwrap(),
      runtime.clone(),
    );

    let ts = vibeman_client::entities::vibeman_timestamp();
    let repo = repository::Repository {
      id: new_id(),
      name: "api".to_string(),
      path: repo_path.to_string_lossy().to_string(),
      description: String::new(),
      created_at: ts,
      updated_at: ts,
    };
    app.db.create_repository(&repo).await.unwrap();
    (app, runtime, repo)
  }

  fn request(repo_id: &str, name: &str) -> CreateWorktreeRequest {
    CreateWorktreeRequest {
      repository_id: repo_id.to_string(),
      name: name.to_string(),
      skip_setup: true,
      ..Default::default()
    }
  }

  #[test]
  fn worktree_name_validation() {
    validate_worktree_name("feature-x").unwrap();
    assert!(validate_worktree_name("").is_err());
    assert!(validate_worktree_name("a/b").is_err());
    assert!(validate_worktree_name("a\\b").is_err());
    assert!(validate_worktree_name("has space").is_err());
  }

  #[tokio::test]
  async fn create_and_force_remove_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let (app, _runtime, repo) = scratch_app(dir.path()).await;

    let res =
      create_worktree(&app, request(&repo.id, "feature-x"))
        .await
        .unwrap();
    assert_eq!(res.worktree.status, WorktreeStatus::Stopped);
    assert_eq!(res.worktree.branch, "feature-x");
    let path = std::path::PathBuf::from(&res.path);
    assert!(path.join("CLAUDE.md").exists());
    assert!(path.join("vibeman.toml").exists());
    assert!(path.ends_with("feature-x"));

    // duplicate name refused
    let err = create_worktree(&app, request(&repo.id, "feature-x"))
      .await
      .unwrap_err();
    assert_eq!(err.kind, ErrorKind::AlreadyExists);

    remove_worktree(&app, &res.worktree.id, true).await.unwrap();
    assert!(!path.exists());
    assert!(app.db.get_worktree(&res.worktree.id).await.is_err());
    // repo's main tree untouched
    assert!(
      std::path::Path::new(&repo.path).join("README.md").exists()
    );
  }

  #[tokio::test]
  async fn create_rejects_unknown_repository() {
    let dir = tempfile::tempdir().unwrap();
    let (app, _runtime, _repo) = scratch_app(dir.path()).await;
    let err = create_worktree(&app, request("missing", "feature-x"))
      .await
      .unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);
  }

  #[tokio::test]
  async fn start_provisions_ai_container_and_logs() {
    let dir = tempfile::tempdir().unwrap();
    let (app, runtime, repo) = scratch_app(dir.path()).await;
    let res = create_worktree(&app, request(&repo.id, "feature-x"))
      .await
      .unwrap();

    let worktree =
      start_worktree(&app, &res.worktree.id).await.unwrap();
    assert_eq!(worktree.status, WorktreeStatus::Running);

    let containers = runtime.containers();
    assert_eq!(containers.len(), 1);
    let ai = &containers[0];
    assert_eq!(ai.name, "api-feature-x-ai");
    assert_eq!(ai.container_type, ContainerType::Ai);
    assert!(
      ai.env_vars.iter().any(|e| e == "VIBEMAN_AI_CONTAINER=true")
    );
    assert!(
      ai
        .env_vars
        .iter()
        .any(|e| e == &format!("VIBEMAN_WORKTREE_ID={}", worktree.id))
    );

    // the aggregated view for the AI container exists
    let aggregated = app
      .logs
      .worktree_dir("api", "feature-x")
      .join("aggregated");
    assert!(aggregated.join("README.md").exists());

    // double start refused
    let err =
      start_worktree(&app, &res.worktree.id).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidState);

    let worktree =
      stop_worktree(&app, &res.worktree.id).await.unwrap();
    assert_eq!(worktree.status, WorktreeStatus::Stopped);
  }

  #[tokio::test]
  async fn ai_failure_is_not_fatal_to_start() {
    let dir = tempfile::tempdir().unwrap();
    let (app, runtime, repo) = scratch_app(dir.path()).await;
    let res = create_worktree(&app, request(&repo.id, "feature-x"))
      .await
      .unwrap();

    runtime.fail_create(true);
    let worktree =
      start_worktree(&app, &res.worktree.id).await.unwrap();
    assert_eq!(worktree.status, WorktreeStatus::Running);
    // no AI container lingers
    assert!(runtime.containers().is_empty());
  }

  #[tokio::test]
  async fn dirty_worktree_refuses_unforced_remove() {
    let dir = tempfile::tempdir().unwrap();
    let (app, _runtime, repo) = scratch_app(dir.path()).await;
    let res = create_worktree(&app, request(&repo.id, "feature-x"))
      .await
      .unwrap();

    std::fs::write(
      std::path::Path::new(&res.path).join("dirty.txt"),
      "dirty\n",
    )
    .unwrap();

    let err = remove_worktree(&app, &res.worktree.id, false)
      .await
      .unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidState);
    assert!(err.message.contains("uncommitted"));

    remove_worktree(&app, &res.worktree.id, true).await.unwrap();
    assert!(!std::path::Path::new(&res.path).exists());
  }

  #[tokio::test]
  async fn auto_start_failure_still_creates() {
    let dir = tempfile::tempdir().unwrap();
    let (app, runtime, repo) = scratch_app(dir.path()).await;
    runtime.fail_create(true);
    let mut req = request(&repo.id, "feature-x");
    req.auto_start = true;
    let res = create_worktree(&app, req).await.unwrap();
    // AI provisioning failed quietly, the worktree still runs
    let worktree =
      app.db.get_worktree(&res.worktree.id).await.unwrap();
    assert_eq!(worktree.status, WorktreeStatus::Running);
  }
}
