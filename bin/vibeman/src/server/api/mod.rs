use axum::{
  Router,
  routing::{get, post},
};

use crate::server::AppState;

mod containers;
mod repositories;
mod services;
mod status;
mod worktrees;

pub fn router(app: AppState) -> Router {
  Router::new()
    .route("/status", get(status::get_status))
    .route("/config", get(status::get_config))
    .route("/shutdown", post(status::shutdown))
    .route(
      "/repositories",
      get(repositories::list).post(repositories::create),
    )
    .route(
      "/repositories/{id}",
      get(repositories::get_one).delete(repositories::delete),
    )
    .route(
      "/worktrees",
      get(worktrees::list).post(worktrees::create),
    )
    .route(
      "/worktrees/{id}",
      get(worktrees::get_one).delete(worktrees::delete),
    )
    .route("/worktrees/{id}/start", post(worktrees::start))
    .route("/worktrees/{id}/stop", post(worktrees::stop))
    .route("/worktrees/{id}/logs", get(worktrees::logs))
    .route("/services", get(services::list))
    .route("/services/{name}/start", post(services::start))
    .route("/services/{name}/stop", post(services::stop))
    .route("/services/{name}/logs", get(services::logs))
    .route(
      "/containers",
      get(containers::list).post(containers::create),
    )
    .route(
      "/containers/{id}",
      get(containers::get_one).delete(containers::delete),
    )
    .route("/containers/{id}/action", post(containers::action))
    .route("/containers/{id}/logs", get(containers::logs))
    .route("/ai/attach/{worktree}", get(super::ws::attach))
    .with_state(app)
}

/// Tail helper shared by the log endpoints: keep the last `lines`
/// lines when requested.
pub(crate) fn tail_lines(
  contents: &str,
  lines: Option<usize>,
) -> (Vec<String>, bool) {
  let all: Vec<String> =
    contents.lines().map(str::to_string).collect();
  match lines {
    Some(n) if n < all.len() => {
      (all[all.len() - n..].to_vec(), true)
    }
    _ => (all, false),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn tail_keeps_the_last_lines() {
    let contents = "one\ntwo\nthree\n";
    let (lines, truncated) = tail_lines(contents, None);
    assert_eq!(lines, vec!["one", "two", "three"]);
    assert!(!truncated);

    let (lines, truncated) = tail_lines(contents, Some(2));
    assert_eq!(lines, vec!["two", "three"]);
    assert!(truncated);

    let (lines, truncated) = tail_lines(contents, Some(10));
    assert_eq!(lines.len(), 3);
    assert!(!truncated);
  }
}
