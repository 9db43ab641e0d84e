use serde::{Deserialize, Serialize};

/// Container runtime entities ([ContainerDescriptor][container::ContainerDescriptor], errors).
pub mod container;
/// [GlobalConfig][config::GlobalConfig], [ServicesConfig][config::ServicesConfig], per-repo [RepositoryConfig][config::RepositoryConfig].
pub mod config;
/// The [Error][error::Error] kinds crossing the API boundary.
pub mod error;
/// Subtypes of [LogConfig][logger::LogConfig].
pub mod logger;
/// Command execution [Log][log::Log].
pub mod log;
/// Subtypes of [Repository][repository::Repository].
pub mod repository;
/// Control plane status / health reporting.
pub mod server;
/// Subtypes of [ServiceInstance][service::ServiceInstance].
pub mod service;
/// Terminal bridge message frames.
pub mod terminal;
/// Subtypes of [Worktree][worktree::Worktree].
pub mod worktree;

/// Unix timestamp in milliseconds.
pub fn vibeman_timestamp() -> i64 {
  chrono::Utc::now().timestamp_millis()
}

/// Stable opaque id for stored records.
pub fn new_id() -> String {
  uuid::Uuid::new_v4().simple().to_string()
}

/// Represents an empty json object: `{}`
#[derive(
  Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize,
)]
pub struct NoData {}
