use rusqlite::{Row, params};
use vibeman_client::entities::{
  repository::Repository, vibeman_timestamp,
};

use crate::{Database, DbError, DbResult};

fn repository_from_row(row: &Row<'_>) -> rusqlite::Result<Repository> {
  Ok(Repository {
    id: row.get(0)?,
    name: row.get(1)?,
    path: row.get(2)?,
    description: row.get(3)?,
    created_at: row.get(4)?,
    updated_at: row.get(5)?,
  })
}

const REPOSITORY_FIELDS: &str =
  "id, name, path, description, created_at, updated_at";

impl Database {
  pub async fn create_repository(
    &self,
    repository: &Repository,
  ) -> DbResult<()> {
    self.conn().await.execute(
      "INSERT INTO repositories (id, name, path, description, created_at, updated_at)
      VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
      params![
        repository.id,
        repository.name,
        repository.path,
        repository.description,
        repository.created_at,
        repository.updated_at,
      ],
    )?;
    Ok(())
  }

  pub async fn get_repository(
    &self,
    id: &str,
  ) -> DbResult<Repository> {
    self
      .conn()
      .await
      .query_row(
        &format!(
          "SELECT {REPOSITORY_FIELDS} FROM repositories WHERE id = ?1"
        ),
        [id],
        repository_from_row,
      )
      .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => {
          DbError::not_found("repository", id)
        }
        e => e.into(),
      })
  }

  pub async fn get_repository_by_name(
    &self,
    name: &str,
  ) -> DbResult<Option<Repository>> {
    let conn = self.conn().await;
    let mut stmt = conn.prepare(&format!(
      "SELECT {REPOSITORY_FIELDS} FROM repositories WHERE name = ?1"
    ))?;
    let mut rows = stmt.query_map([name], repository_from_row)?;
    rows.next().transpose().map_err(Into::into)
  }

  pub async fn list_repositories(&self) -> DbResult<Vec<Repository>> {
    let conn = self.conn().await;
    let mut stmt = conn.prepare(&format!(
      "SELECT {REPOSITORY_FIELDS} FROM repositories ORDER BY name"
    ))?;
    let repositories = stmt
      .query_map([], repository_from_row)?
      .collect::<Result<Vec<_>, _>>()?;
    Ok(repositories)
  }

  pub async fn update_repository_description(
    &self,
    id: &str,
    description: &str,
  ) -> DbResult<()> {
    let updated = self.conn().await.execute(
      "UPDATE repositories SET description = ?2, updated_at = ?3 WHERE id = ?1",
      params![id, description, vibeman_timestamp()],
    )?;
    if updated == 0 {
      return Err(DbError::not_found("repository", id));
    }
    Ok(())
  }

  /// Refuses while any worktree still references the repository.
  pub async fn delete_repository(&self, id: &str) -> DbResult<()> {
    let conn = self.conn().await;
    let worktrees: i64 = conn.query_row(
      "SELECT COUNT(*) FROM worktrees WHERE repository_id = ?1",
      [id],
      |row| row.get(0),
    )?;
    if worktrees > 0 {
      return Err(DbError::Conflict(format!(
        "repository has {worktrees} worktree(s), remove them first"
      )));
    }
    let deleted = conn
      .execute("DELETE FROM repositories WHERE id = ?1", [id])?;
    if deleted == 0 {
      return Err(DbError::not_found("repository", id));
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use vibeman_client::entities::new_id;

  use super::*;

  fn repository(name: &str, path: &str) -> Repository {
    let ts = vibeman_timestamp();
    Repository {
      id: new_id(),
      name: name.to_string(),
      path: path.to_string(),
      description: String::new(),
      created_at: ts,
      updated_at: ts,
    }
  }

  #[tokio::test]
  async fn crud_round_trip() {
    let db = Database::open_in_memory().unwrap();
    let repo = repository("api", "/tmp/api");
    db.create_repository(&repo).await.unwrap();

    let loaded = db.get_repository(&repo.id).await.unwrap();
    assert_eq!(loaded, repo);
    assert_eq!(
      db.get_repository_by_name("api").await.unwrap().unwrap(),
      repo
    );
    assert!(
      db.get_repository_by_name("other").await.unwrap().is_none()
    );
    assert_eq!(db.list_repositories().await.unwrap().len(), 1);

    db.update_repository_description(&repo.id, "backend")
      .await
      .unwrap();
    let loaded = db.get_repository(&repo.id).await.unwrap();
    assert_eq!(loaded.description, "backend");

    db.delete_repository(&repo.id).await.unwrap();
    assert!(db.get_repository(&repo.id).await.is_err());
  }

  #[tokio::test]
  async fn name_and_path_are_unique() {
    let db = Database::open_in_memory().unwrap();
    db.create_repository(&repository("api", "/tmp/api"))
      .await
      .unwrap();

    let err = db
      .create_repository(&repository("api", "/tmp/elsewhere"))
      .await
      .unwrap_err();
    assert!(err.is_constraint_violation());

    let err = db
      .create_repository(&repository("other", "/tmp/api"))
      .await
      .unwrap_err();
    assert!(err.is_constraint_violation());
  }
}
