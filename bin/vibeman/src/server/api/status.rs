use axum::{Json, extract::State};
use command::run_vibeman_command;
use vibeman_client::entities::{
  NoData,
  config::GlobalConfig,
  error::Error,
  server::{StatusResponse, SubsystemHealth},
};

use crate::server::{AppState, error::ApiResult};

/// Probe the database, the container engine and git, and report
/// counts. Any subsystem down turns the whole response into a 503.
pub async fn get_status(
  State(app): State<AppState>,
) -> ApiResult<Json<StatusResponse>> {
  let (database, engine, git_ok) = tokio::join!(
    app.db.healthy(),
    app.runtime.version(),
    async {
      run_vibeman_command("git probe", None, "git --version")
        .await
        .success
    },
  );

  let services = SubsystemHealth {
    database,
    container_engine: engine.is_ok(),
    git: git_ok,
  };
  if !services.all_ok() {
    let mut down = Vec::new();
    if !services.database {
      down.push("database");
    }
    if !services.container_engine {
      down.push("container engine");
    }
    if !services.git {
      down.push("git");
    }
    return Err(
      Error::unavailable(format!(
        "subsystem unavailable: {}",
        down.join(", ")
      ))
      .into(),
    );
  }

  let repositories =
    app.db.list_repositories().await.map(|r| r.len()).unwrap_or(0);
  let worktrees = app
    .db
    .list_worktrees(None, None)
    .await
    .map(|w| w.len())
    .unwrap_or(0);
  let containers =
    app.runtime.list().await.map(|c| c.len()).unwrap_or(0);

  Ok(Json(StatusResponse {
    status: "ok".to_string(),
    version: env!("CARGO_PKG_VERSION").to_string(),
    uptime: app.started_at.elapsed().as_secs() as i64,
    services,
    repositories,
    worktrees,
    containers,
  }))
}

pub async fn get_config(
  State(app): State<AppState>,
) -> Json<GlobalConfig> {
  Json(app.config.clone())
}

pub async fn shutdown(
  State(app): State<AppState>,
) -> Json<NoData> {
  info!("shutdown requested over the api");
  app.shutdown.cancel();
  Json(NoData {})
}
