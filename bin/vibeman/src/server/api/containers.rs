use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
};
use vibeman_client::entities::{
  container::*,
  server::{LogsQuery, LogsResponse},
};

use crate::server::{AppState, api::tail_lines, error::ApiResult};

pub async fn list(
  State(app): State<AppState>,
  Query(query): Query<ContainerQuery>,
) -> ApiResult<Json<Vec<ContainerDescriptor>>> {
  let containers = app.runtime.list().await?;
  let containers = containers
    .into_iter()
    .filter(|container| {
      query
        .repository
        .as_deref()
        .is_none_or(|repo| container.repository == repo)
        && query
          .worktree
          .as_deref()
          .is_none_or(|worktree| container.environment == worktree)
        && query.status.as_deref().is_none_or(|status| {
          container
            .status
            .to_ascii_lowercase()
            .contains(&status.to_ascii_lowercase())
        })
    })
    .collect();
  Ok(Json(containers))
}

pub async fn create(
  State(app): State<AppState>,
  Json(config): Json<ContainerConfig>,
) -> ApiResult<(StatusCode, Json<ContainerDescriptor>)> {
  let descriptor = app.runtime.create(&config).await?;
  Ok((StatusCode::CREATED, Json(descriptor)))
}

pub async fn get_one(
  State(app): State<AppState>,
  Path(id): Path<String>,
) -> ApiResult<Json<ContainerDescriptor>> {
  let descriptor = app.runtime.inspect(&id).await?;
  Ok(Json(descriptor))
}

pub async fn delete(
  State(app): State<AppState>,
  Path(id): Path<String>,
) -> ApiResult<StatusCode> {
  app.runtime.remove(&id).await?;
  Ok(StatusCode::NO_CONTENT)
}

pub async fn action(
  State(app): State<AppState>,
  Path(id): Path<String>,
  Json(request): Json<ContainerActionRequest>,
) -> ApiResult<Json<ContainerDescriptor>> {
  match request.action {
    ContainerAction::Start => app.runtime.start(&id).await?,
    ContainerAction::Stop => app.runtime.stop(&id).await?,
    ContainerAction::Restart => {
      app.runtime.stop(&id).await?;
      app.runtime.start(&id).await?;
    }
  }
  let descriptor = app.runtime.inspect(&id).await?;
  Ok(Json(descriptor))
}

pub async fn logs(
  State(app): State<AppState>,
  Path(id): Path<String>,
  Query(query): Query<LogsQuery>,
) -> ApiResult<Json<LogsResponse>> {
  let contents = app.runtime.logs(&id, query.lines).await?;
  let (lines, truncated) = tail_lines(&contents, query.lines);
  Ok(Json(LogsResponse {
    lines,
    truncated,
    source: "container".to_string(),
  }))
}
