use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Declaration of a shared backing service in `services.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
  /// Compose file declaring the service.
  pub compose_file: String,
  /// The service name within the compose file.
  pub service: String,
  #[serde(default)]
  pub description: String,
}

#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  Display,
  EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ServiceStatus {
  #[default]
  Stopped,
  Starting,
  Running,
  Stopping,
  Error,
}

/// Runtime state of a shared service. In-memory only; rebuilt lazily
/// after a control plane restart.
///
/// Invariants: `status == Running` implies `container_id` is set;
/// `ref_count == repositories.len() + implicit start refs`; reaching
/// `Stopped` clears `container_id` and `repositories`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceInstance {
  pub name: String,
  pub status: ServiceStatus,
  #[serde(default)]
  pub container_id: Option<String>,
  pub ref_count: u32,
  /// Repositories holding an explicit reference.
  #[serde(default)]
  pub repositories: BTreeSet<String>,
  #[serde(default)]
  pub start_time: Option<i64>,
  #[serde(default)]
  pub last_health: Option<i64>,
  #[serde(default)]
  pub health_error: Option<String>,
  pub config: ServiceConfig,
}
