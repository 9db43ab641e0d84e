use std::{net::SocketAddr, str::FromStr, sync::Arc, time::Instant};

use anyhow::Context;
use axum::Router;
use db::Database;
use runtime::{ContainerRuntime, DockerRuntime};
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use vibeman_client::entities::config::{
  GlobalConfig, ServicesConfig,
};

use crate::server::{logs::LogAggregator, services::ServiceManager};

mod api;
mod coordinator;
mod error;
mod logs;
mod services;
#[cfg(test)]
mod test_support;
mod ws;

pub use error::{ApiError, db_error};

/// The whole control plane, constructed up front and shared behind an
/// Arc. No process-wide state; tests build one of these around a
/// runtime double.
pub struct App {
  pub config: GlobalConfig,
  pub paths: config::VibemanPaths,
  pub db: Database,
  pub runtime: Arc<dyn ContainerRuntime>,
  pub services: ServiceManager,
  pub logs: LogAggregator,
  pub started_at: Instant,
  pub shutdown: CancellationToken,
}

pub type AppState = Arc<App>;

impl App {
  pub fn new(
    config: GlobalConfig,
    services_config: ServicesConfig,
    paths: config::VibemanPaths,
  ) -> anyhow::Result<AppState> {
    let db = Database::open(paths.database_file())
      .context("failed to open database")?;
    let runtime: Arc<dyn ContainerRuntime> =
      Arc::new(DockerRuntime::new());
    Ok(App::assemble(config, services_config, paths, db, runtime))
  }

  /// Wire up an App around explicit collaborators. The runtime is
  /// the injection point for tests.
  pub fn assemble(
    config: GlobalConfig,
    services_config: ServicesConfig,
    paths: config::VibemanPaths,
    db: Database,
    runtime: Arc<dyn ContainerRuntime>,
  ) -> AppState {
    let services =
      ServiceManager::new(runtime.clone(), services_config);
    let logs =
      LogAggregator::new(runtime.clone(), paths.logs_root());
    Arc::new(App {
      config,
      paths,
      db,
      runtime,
      services,
      logs,
      started_at: Instant::now(),
      shutdown: CancellationToken::new(),
    })
  }
}

pub fn router(app: AppState) -> Router {
  Router::new().nest("/api", api::router(app)).layer(
    CorsLayer::new()
      .allow_origin(Any)
      .allow_methods(Any)
      .allow_headers(Any),
  )
}

/// Run the control plane until SIGTERM or a shutdown request.
pub async fn run(
  config: GlobalConfig,
  services_config: ServicesConfig,
  paths: config::VibemanPaths,
) -> anyhow::Result<()> {
  info!("Vibeman server version: v{}", env!("CARGO_PKG_VERSION"));

  let app = App::new(config, services_config, paths)?;
  let shutdown = app.shutdown.clone();
  let port = app.config.server.port;

  let router = router(app).into_make_service();

  let addr = format!("127.0.0.1:{port}");
  let socket_addr = SocketAddr::from_str(&addr)
    .context("failed to parse listen address")?;
  info!("Vibeman server starting on http://{socket_addr}");

  let handle = axum_server::Handle::new();
  let _handle = handle.clone();
  tokio::spawn(async move {
    shutdown.cancelled().await;
    info!("shutdown requested, stopping server");
    _handle.graceful_shutdown(Some(
      std::time::Duration::from_secs(5),
    ));
  });

  axum_server::bind(socket_addr)
    .handle(handle)
    .serve(router)
    .await
    .context("failed to start http server")
}
