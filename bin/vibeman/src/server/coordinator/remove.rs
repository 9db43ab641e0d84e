use std::path::{Path, PathBuf};

use vibeman_client::entities::error::Error;

use super::ai_container_name;
use crate::server::App;

/// Remove a worktree: AI container, git worktree, directory, log
/// tree, store row. Refuses from inside the worktree, and refuses
/// uncommitted or unpushed work unless forced. Filesystem teardown
/// is continue-on-error so a half-removed worktree can still be
/// expunged.
#[instrument(level = "debug", skip(app))]
pub async fn remove_worktree(
  app: &App,
  id: &str,
  force: bool,
) -> Result<(), Error> {
  let worktree =
    app.db.get_worktree(id).await.map_err(crate::server::db_error)?;
  let repo = app
    .db
    .get_repository(&worktree.repository_id)
    .await
    .map_err(crate::server::db_error)?;

  let worktree_path = PathBuf::from(&worktree.path);

  if let Ok(cwd) = std::env::current_dir()
    && cwd.starts_with(&worktree_path)
  {
    return Err(Error::invalid_state(format!(
      "current directory is inside worktree {}, leave it first",
      worktree.name
    )));
  }

  if !force && worktree_path.exists() {
    if git::has_uncommitted_changes(&worktree_path)
      .await
      .unwrap_or(false)
    {
      return Err(
        Error::invalid_state(format!(
          "worktree {} has uncommitted changes, use force to remove anyway",
          worktree.name
        ))
        .with("worktree", &worktree.name),
      );
    }
    if git::has_unpushed_commits(&worktree_path)
      .await
      .unwrap_or(false)
    {
      return Err(
        Error::invalid_state(format!(
          "worktree {} has unpushed commits, use force to remove anyway",
          worktree.name
        ))
        .with("worktree", &worktree.name),
      );
    }
  }

  app
    .logs
    .stop_log_aggregation(&repo.name, &worktree.name)
    .await;

  // AI container: stop, then remove. Each step tolerates failure.
  let name = ai_container_name(&repo.name, &worktree.name);
  match app.runtime.get_by_name(&name).await {
    Ok(Some(container)) => {
      if let Err(e) = app.runtime.stop(&container.id).await {
        warn!("failed to stop AI container {name}: {e}");
      }
      if let Err(e) = app.runtime.remove(&container.id).await {
        warn!("failed to remove AI container {name}: {e}");
      }
    }
    Ok(None) => {}
    Err(e) => warn!("failed to look up AI container {name}: {e}"),
  }

  if let Err(e) =
    git::remove_worktree(Path::new(&repo.path), &worktree_path).await
  {
    warn!(
      "failed to remove git worktree {worktree_path:?}: {e:#}"
    );
  }
  if worktree_path.exists()
    && let Err(e) = tokio::fs::remove_dir_all(&worktree_path).await
  {
    warn!(
      "failed to remove worktree directory {worktree_path:?}: {e}"
    );
  }

  let log_dir = app.logs.worktree_dir(&repo.name, &worktree.name);
  if log_dir.exists()
    && let Err(e) = tokio::fs::remove_dir_all(&log_dir).await
  {
    warn!("failed to remove log directory {log_dir:?}: {e}");
  }

  app
    .db
    .delete_worktree(id)
    .await
    .map_err(crate::server::db_error)?;
  info!("removed worktree {} of repo {}", worktree.name, repo.name);
  Ok(())
}
