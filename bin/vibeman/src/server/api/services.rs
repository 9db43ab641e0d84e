use axum::{
  Json,
  extract::{Path, Query, State},
};
use vibeman_client::entities::{
  server::{LogsQuery, LogsResponse},
  service::ServiceInstance,
};

use crate::server::{AppState, api::tail_lines, error::ApiResult};

pub async fn list(
  State(app): State<AppState>,
) -> Json<Vec<ServiceInstance>> {
  Json(app.services.list_services().await)
}

pub async fn start(
  State(app): State<AppState>,
  Path(name): Path<String>,
) -> ApiResult<Json<ServiceInstance>> {
  let service = app.services.start_service(&name).await?;
  Ok(Json(service))
}

pub async fn stop(
  State(app): State<AppState>,
  Path(name): Path<String>,
) -> ApiResult<Json<ServiceInstance>> {
  let service = app.services.stop_service(&name).await?;
  Ok(Json(service))
}

/// Service logs fall back: aggregated file, then live container
/// logs, then an informational payload.
pub async fn logs(
  State(app): State<AppState>,
  Path(name): Path<String>,
  Query(query): Query<LogsQuery>,
) -> ApiResult<Json<LogsResponse>> {
  let file = app
    .paths
    .logs_root()
    .join("services")
    .join(format!("{name}.log"));
  if let Ok(contents) = tokio::fs::read_to_string(&file).await {
    let (lines, truncated) = tail_lines(&contents, query.lines);
    return Ok(Json(LogsResponse {
      lines,
      truncated,
      source: file.display().to_string(),
    }));
  }

  let container_id = app
    .services
    .get_service(&name)
    .await
    .and_then(|service| service.container_id);
  if let Some(container_id) = container_id
    && let Ok(contents) =
      app.runtime.logs(&container_id, query.lines).await
  {
    let (lines, truncated) = tail_lines(&contents, query.lines);
    return Ok(Json(LogsResponse {
      lines,
      truncated,
      source: "container".to_string(),
    }));
  }

  Ok(Json(LogsResponse::missing(format!(
    "no logs available for service {name}"
  ))))
}
