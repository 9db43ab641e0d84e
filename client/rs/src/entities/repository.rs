use serde::{Deserialize, Serialize};

/// A tracked code repository. `path` is absolute and canonicalized,
/// and points at a git repository at registration time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Repository {
  pub id: String,
  pub name: String,
  pub path: String,
  #[serde(default)]
  pub description: String,
  pub created_at: i64,
  pub updated_at: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateRepositoryRequest {
  /// Absolute path to an existing git repository.
  #[serde(default)]
  pub path: Option<String>,
  /// Alternative to `path`: clone from this url under the configured
  /// repositories root first.
  #[serde(default)]
  pub url: Option<String>,
  /// Defaults to the directory name.
  #[serde(default)]
  pub name: Option<String>,
  #[serde(default)]
  pub description: Option<String>,
}
