use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// A checkout of a repository branch housed in its own directory,
/// with an optional AI container attached while running.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Worktree {
  pub id: String,
  pub repository_id: String,
  /// Unique within the repository. No path separators or whitespace.
  pub name: String,
  pub branch: String,
  pub path: String,
  pub status: WorktreeStatus,
  pub created_at: i64,
  pub updated_at: i64,
}

#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum WorktreeStatus {
  #[default]
  Stopped,
  Starting,
  Running,
  Stopping,
  Error,
}

impl WorktreeStatus {
  /// Whether `self -> to` is an edge of the lifecycle state machine.
  pub fn can_transition_to(&self, to: WorktreeStatus) -> bool {
    use WorktreeStatus::*;
    matches!(
      (self, to),
      (Stopped, Starting)
        | (Starting, Running)
        | (Starting, Error)
        | (Running, Stopping)
        | (Stopping, Stopped)
        | (Stopping, Error)
        | (Error, Starting)
        | (Error, Stopping)
        | (Error, Stopped)
    )
  }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateWorktreeRequest {
  pub repository_id: String,
  pub name: String,
  /// Defaults to `<prefix><name>` using the repo's configured branch
  /// prefix.
  #[serde(default)]
  pub branch: Option<String>,
  /// Defaults to the repo config default, then `main`.
  #[serde(default)]
  pub base_branch: Option<String>,
  /// Skip required services + init scripts.
  #[serde(default)]
  pub skip_setup: bool,
  #[serde(default)]
  pub container_image: Option<String>,
  /// Start the worktree right after creation. Start failure is logged
  /// but does not fail the create.
  #[serde(default)]
  pub auto_start: bool,
  /// Override the compose file written into the worktree's config copy.
  #[serde(default)]
  pub compose_file: Option<String>,
  /// Override the compose services in the worktree's config copy.
  #[serde(default)]
  pub services: Option<Vec<String>>,
  /// Run after the repo's worktree_init command, in order.
  #[serde(default)]
  pub post_scripts: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateWorktreeResponse {
  pub worktree: Worktree,
  pub path: String,
}

/// Filters for `GET /api/worktrees`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorktreeQuery {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub repository_id: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub status: Option<WorktreeStatus>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn status_wire_format_is_lowercase() {
    assert_eq!(
      serde_json::to_string(&WorktreeStatus::Starting).unwrap(),
      "\"starting\""
    );
    assert_eq!(WorktreeStatus::Error.to_string(), "error");
    assert_eq!(
      "stopping".parse::<WorktreeStatus>().unwrap(),
      WorktreeStatus::Stopping
    );
  }

  #[test]
  fn transitions_follow_state_machine() {
    use WorktreeStatus::*;
    assert!(Stopped.can_transition_to(Starting));
    assert!(Starting.can_transition_to(Running));
    assert!(Running.can_transition_to(Stopping));
    assert!(Stopping.can_transition_to(Stopped));
    assert!(Starting.can_transition_to(Error));
    assert!(!Stopped.can_transition_to(Running));
    assert!(!Running.can_transition_to(Starting));
    assert!(!Stopped.can_transition_to(Stopping));
  }
}
