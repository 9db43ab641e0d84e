use std::path::Path;

use indexmap::IndexMap;
use vibeman_client::entities::{
  config::RepositoryConfig,
  container::{ContainerConfig, ContainerType},
  error::Error,
  worktree::{Worktree, WorktreeStatus},
};

use super::{
  DEFAULT_AI_IMAGE, ai_container_name, config_error,
};
use crate::server::App;

/// Start a worktree: provision its AI container (best-effort) and
/// begin log aggregation. AI failure never fails the start; the
/// worktree reaches `running` regardless.
#[instrument(level = "debug", skip(app))]
pub async fn start_worktree(
  app: &App,
  id: &str,
) -> Result<Worktree, Error> {
  let worktree =
    app.db.get_worktree(id).await.map_err(crate::server::db_error)?;
  if worktree.status == WorktreeStatus::Running {
    return Err(Error::invalid_state(format!(
      "worktree {} is already running",
      worktree.name
    )));
  }
  let repo = app
    .db
    .get_repository(&worktree.repository_id)
    .await
    .map_err(crate::server::db_error)?;

  app
    .db
    .update_worktree_status(id, WorktreeStatus::Starting)
    .await
    .map_err(crate::server::db_error)?;

  // the worktree's own config copy governs its containers
  let worktree_config =
    match config::load_repository_config(Path::new(&worktree.path))
    {
      Ok(config) => config,
      Err(e) => {
        // starting -> error
        let _ = app
          .db
          .update_worktree_status(id, WorktreeStatus::Error)
          .await;
        return Err(config_error(e));
      }
    };

  if worktree_config.repository.ai.enabled {
    match provision_ai_container(
      app,
      &repo.name,
      &worktree,
      &worktree_config,
    )
    .await
    {
      Ok(()) => {
        if let Err(e) = app
          .logs
          .start_log_aggregation(&repo.name, &worktree.name)
          .await
        {
          warn!("failed to start log aggregation: {e:#}");
        } else if let Err(e) = app
          .logs
          .aggregate_for_ai_container(&repo.name, &worktree.name)
          .await
        {
          warn!("failed to build aggregated log view: {e:#}");
        }
      }
      Err(e) => {
        // never fatal: clean the container up and move on
        warn!(
          "AI container for worktree {} failed: {e}",
          worktree.name
        );
        let name = ai_container_name(&repo.name, &worktree.name);
        if let Ok(Some(container)) =
          app.runtime.get_by_name(&name).await
        {
          let _ = app.runtime.remove(&container.id).await;
        }
      }
    }
  }

  app
    .db
    .update_worktree_status(id, WorktreeStatus::Running)
    .await
    .map_err(crate::server::db_error)
}

/// Stop a worktree: end log aggregation and stop the AI container.
#[instrument(level = "debug", skip(app))]
pub async fn stop_worktree(
  app: &App,
  id: &str,
) -> Result<Worktree, Error> {
  let worktree =
    app.db.get_worktree(id).await.map_err(crate::server::db_error)?;
  if worktree.status == WorktreeStatus::Stopped {
    return Err(Error::invalid_state(format!(
      "worktree {} is already stopped",
      worktree.name
    )));
  }
  let repo = app
    .db
    .get_repository(&worktree.repository_id)
    .await
    .map_err(crate::server::db_error)?;

  app
    .db
    .update_worktree_status(id, WorktreeStatus::Stopping)
    .await
    .map_err(crate::server::db_error)?;

  app
    .logs
    .stop_log_aggregation(&repo.name, &worktree.name)
    .await;

  let name = ai_container_name(&repo.name, &worktree.name);
  match app.runtime.get_by_name(&name).await {
    Ok(Some(container)) => {
      if let Err(e) = app.runtime.stop(&container.id).await {
        warn!("failed to stop AI container {name}: {e}");
      }
    }
    Ok(None) => {}
    Err(e) => warn!("failed to look up AI container {name}: {e}"),
  }

  app
    .db
    .update_worktree_status(id, WorktreeStatus::Stopped)
    .await
    .map_err(crate::server::db_error)
}

/// Create and start the `<repo>-<worktree>-ai` container with the
/// worktree mounted at /workspace and the log tree at /logs and
/// /all-logs.
async fn provision_ai_container(
  app: &App,
  repo_name: &str,
  worktree: &Worktree,
  worktree_config: &RepositoryConfig,
) -> Result<(), runtime::ContainerError> {
  let name = ai_container_name(repo_name, &worktree.name);

  // replace any leftover container from a previous run
  if let Some(existing) = app.runtime.get_by_name(&name).await? {
    app.runtime.remove(&existing.id).await?;
  }

  let ai = &worktree_config.repository.ai;
  let image = ai
    .image
    .clone()
    .unwrap_or_else(|| DEFAULT_AI_IMAGE.to_string());

  let log_dir = app.logs.worktree_dir(repo_name, &worktree.name);
  let logs_root = app.paths.logs_root();

  let mut env_vars = IndexMap::new();
  env_vars
    .insert("VIBEMAN_REPOSITORY".to_string(), repo_name.to_string());
  env_vars
    .insert("VIBEMAN_ENV".to_string(), worktree.name.clone());
  env_vars
    .insert("VIBEMAN_WORKTREE_ID".to_string(), worktree.id.clone());
  env_vars
    .insert("VIBEMAN_WORKTREE".to_string(), worktree.name.clone());
  env_vars.insert(
    "VIBEMAN_WORKTREE_PATH".to_string(),
    worktree.path.clone(),
  );
  env_vars
    .insert("VIBEMAN_LOG_DIR".to_string(), "/logs".to_string());
  env_vars.insert(
    "VIBEMAN_ALL_LOGS_DIR".to_string(),
    "/all-logs".to_string(),
  );
  env_vars
    .insert("VIBEMAN_AI_CONTAINER".to_string(), "true".to_string());
  env_vars.insert("SHELL".to_string(), "/bin/zsh".to_string());
  for (key, value) in &ai.env {
    env_vars.insert(key.clone(), value.clone());
  }
  for (key, value) in &worktree_config.repository.container.env {
    env_vars.entry(key.clone()).or_insert_with(|| value.clone());
  }

  let config = ContainerConfig {
    name,
    image,
    repository: repo_name.to_string(),
    environment: worktree.name.clone(),
    container_type: ContainerType::Ai,
    env_vars,
    volumes: vec![
      format!("{}:/workspace", worktree.path),
      format!("{}:/logs:ro", log_dir.display()),
      format!("{}:/all-logs:ro", logs_root.display()),
    ],
    working_dir: Some("/workspace".to_string()),
    ..Default::default()
  };

  let descriptor = app.runtime.create(&config).await?;
  if let Err(e) = app.runtime.start(&descriptor.id).await {
    let _ = app.runtime.remove(&descriptor.id).await;
    return Err(e);
  }
  info!(
    "AI container {} up for worktree {}",
    descriptor.name, worktree.name
  );
  Ok(())
}
