use serde::{Deserialize, Serialize};

/// `GET /api/status` response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusResponse {
  pub status: String,
  pub version: String,
  /// Seconds since the control plane started.
  pub uptime: i64,
  pub services: SubsystemHealth,
  pub repositories: usize,
  pub worktrees: usize,
  pub containers: usize,
}

/// Health of the control plane's external collaborators.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubsystemHealth {
  pub database: bool,
  pub container_engine: bool,
  pub git: bool,
}

impl SubsystemHealth {
  pub fn all_ok(&self) -> bool {
    self.database && self.container_engine && self.git
  }
}

/// Log read responses for worktrees, services and containers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogsResponse {
  pub lines: Vec<String>,
  /// Whether `lines` was cut down to the requested tail.
  pub truncated: bool,
  /// Where the lines came from: a file path, `container`, or `none`.
  pub source: String,
}

impl LogsResponse {
  /// Informational payload for when no logs exist yet. Served with
  /// 200, never 404.
  pub fn missing(msg: impl Into<String>) -> LogsResponse {
    LogsResponse {
      lines: vec![msg.into()],
      truncated: false,
      source: "none".to_string(),
    }
  }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogsQuery {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub lines: Option<usize>,
}
