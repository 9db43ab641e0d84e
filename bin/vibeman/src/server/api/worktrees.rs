use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
};
use serde::Deserialize;
use vibeman_client::entities::{
  server::{LogsQuery, LogsResponse},
  worktree::*,
};

use crate::server::{
  AppState, api::tail_lines, coordinator, db_error,
  error::ApiResult,
};

pub async fn list(
  State(app): State<AppState>,
  Query(query): Query<WorktreeQuery>,
) -> ApiResult<Json<Vec<Worktree>>> {
  let worktrees = app
    .db
    .list_worktrees(query.repository_id.as_deref(), query.status)
    .await
    .map_err(db_error)?;
  Ok(Json(worktrees))
}

pub async fn create(
  State(app): State<AppState>,
  Json(request): Json<CreateWorktreeRequest>,
) -> ApiResult<(StatusCode, Json<CreateWorktreeResponse>)> {
  let response =
    coordinator::create_worktree(&app, request).await?;
  Ok((StatusCode::CREATED, Json(response)))
}

pub async fn get_one(
  State(app): State<AppState>,
  Path(id): Path<String>,
) -> ApiResult<Json<Worktree>> {
  let worktree = app.db.get_worktree(&id).await.map_err(db_error)?;
  Ok(Json(worktree))
}

#[derive(Debug, Deserialize)]
pub struct DeleteQuery {
  #[serde(default)]
  force: bool,
}

pub async fn delete(
  State(app): State<AppState>,
  Path(id): Path<String>,
  Query(query): Query<DeleteQuery>,
) -> ApiResult<StatusCode> {
  coordinator::remove_worktree(&app, &id, query.force).await?;
  Ok(StatusCode::NO_CONTENT)
}

pub async fn start(
  State(app): State<AppState>,
  Path(id): Path<String>,
) -> ApiResult<Json<Worktree>> {
  let worktree = coordinator::start_worktree(&app, &id).await?;
  Ok(Json(worktree))
}

pub async fn stop(
  State(app): State<AppState>,
  Path(id): Path<String>,
) -> ApiResult<Json<Worktree>> {
  let worktree = coordinator::stop_worktree(&app, &id).await?;
  Ok(Json(worktree))
}

/// Read the worktree's most recent log file. Missing logs are an
/// informational 200, never a 404.
pub async fn logs(
  State(app): State<AppState>,
  Path(id): Path<String>,
  Query(query): Query<LogsQuery>,
) -> ApiResult<Json<LogsResponse>> {
  let worktree = app.db.get_worktree(&id).await.map_err(db_error)?;
  let repo = app
    .db
    .get_repository(&worktree.repository_id)
    .await
    .map_err(db_error)?;

  let dir = app.logs.worktree_dir(&repo.name, &worktree.name);
  let Some(file) = most_recent_log(&dir) else {
    return Ok(Json(LogsResponse::missing(format!(
      "no logs yet for worktree {}; start it to begin aggregation",
      worktree.name
    ))));
  };

  let contents = tokio::fs::read_to_string(&file)
    .await
    .unwrap_or_default();
  let (lines, truncated) = tail_lines(&contents, query.lines);
  Ok(Json(LogsResponse {
    lines,
    truncated,
    source: file.display().to_string(),
  }))
}

/// The `.log` file with the newest mtime in the worktree's log dir.
pub(crate) fn most_recent_log(
  dir: &std::path::Path,
) -> Option<std::path::PathBuf> {
  let entries = std::fs::read_dir(dir).ok()?;
  entries
    .flatten()
    .filter(|entry| {
      entry
        .file_name()
        .to_string_lossy()
        .ends_with(".log")
    })
    .filter_map(|entry| {
      let modified = entry.metadata().ok()?.modified().ok()?;
      Some((entry.path(), modified))
    })
    .max_by_key(|(_, modified)| *modified)
    .map(|(path, _)| path)
}
