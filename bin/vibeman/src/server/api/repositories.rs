use std::path::PathBuf;

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
};
use vibeman_client::entities::{
  error::Error, new_id, repository::*, vibeman_timestamp,
};

use crate::server::{AppState, db_error, error::ApiResult};

pub async fn list(
  State(app): State<AppState>,
) -> ApiResult<Json<Vec<Repository>>> {
  let repositories =
    app.db.list_repositories().await.map_err(db_error)?;
  Ok(Json(repositories))
}

/// Track a local repository, or clone a remote one first. The path
/// must exist, be a directory and be a git repository.
pub async fn create(
  State(app): State<AppState>,
  Json(request): Json<CreateRepositoryRequest>,
) -> ApiResult<(StatusCode, Json<Repository>)> {
  let path = match (&request.path, &request.url) {
    (Some(path), _) => {
      let path = PathBuf::from(path);
      if !path.is_absolute() {
        return Err(
          Error::invalid_path(format!(
            "repository path must be absolute: {}",
            path.display()
          ))
          .into(),
        );
      }
      git::canonical(&path).map_err(|e| {
        Error::invalid_path(format!("{e:#}"))
      })?
    }
    (None, Some(url)) => {
      let name = request
        .name
        .clone()
        .or_else(|| name_from_url(url))
        .ok_or_else(|| {
          Error::invalid_input(
            "could not derive a repository name from the url",
          )
        })?;
      let root = match &app.config.storage.repositories_path {
        Some(root) => PathBuf::from(root),
        None => config::VibemanPaths::default_repositories_root()
          .map_err(Error::from)?,
      };
      git::clone_repository(url, &root.join(&name))
        .await
        .map_err(|e| {
          Error::new(
            vibeman_client::entities::error::ErrorKind::GitError,
            format!("{e:#}"),
          )
        })?
    }
    (None, None) => {
      return Err(
        Error::invalid_input(
          "either path or url must be provided",
        )
        .into(),
      );
    }
  };

  if !path.is_dir() {
    return Err(
      Error::invalid_path(format!(
        "{} is not a directory",
        path.display()
      ))
      .into(),
    );
  }
  if !git::is_repository(&path).await {
    return Err(
      Error::invalid_path(format!(
        "{} is not a git repository",
        path.display()
      ))
      .into(),
    );
  }

  let name = request.name.clone().unwrap_or_else(|| {
    path
      .file_name()
      .map(|n| n.to_string_lossy().to_string())
      .unwrap_or_default()
  });
  if name.is_empty() {
    return Err(
      Error::invalid_input("repository name cannot be empty").into(),
    );
  }

  let ts = vibeman_timestamp();
  let repository = Repository {
    id: new_id(),
    name,
    path: path.to_string_lossy().to_string(),
    description: request.description.clone().unwrap_or_default(),
    created_at: ts,
    updated_at: ts,
  };
  app.db.create_repository(&repository).await.map_err(|e| {
    if e.is_constraint_violation() {
      Error::already_exists("repository", &repository.name)
    } else {
      db_error(e)
    }
  })?;

  info!(
    "tracking repository {} at {}",
    repository.name, repository.path
  );
  Ok((StatusCode::CREATED, Json(repository)))
}

pub async fn get_one(
  State(app): State<AppState>,
  Path(id): Path<String>,
) -> ApiResult<Json<Repository>> {
  let repository =
    app.db.get_repository(&id).await.map_err(db_error)?;
  Ok(Json(repository))
}

/// 409 while worktrees still reference the repository.
pub async fn delete(
  State(app): State<AppState>,
  Path(id): Path<String>,
) -> ApiResult<StatusCode> {
  app.db.delete_repository(&id).await.map_err(db_error)?;
  Ok(StatusCode::NO_CONTENT)
}

fn name_from_url(url: &str) -> Option<String> {
  let trimmed = url.trim_end_matches('/');
  let last = trimmed.rsplit('/').next()?;
  let name = last.trim_end_matches(".git");
  (!name.is_empty()).then(|| name.to_string())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn derives_names_from_urls() {
    assert_eq!(
      name_from_url("https://github.com/acme/api.git").as_deref(),
      Some("api")
    );
    assert_eq!(
      name_from_url("git@github.com:acme/api.git").as_deref(),
      Some("api")
    );
    assert_eq!(
      name_from_url("https://example.com/repos/tool/").as_deref(),
      Some("tool")
    );
    assert_eq!(name_from_url(""), None);
  }
}
