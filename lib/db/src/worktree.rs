use rusqlite::{Row, params};
use vibeman_client::entities::{
  vibeman_timestamp,
  worktree::{Worktree, WorktreeStatus},
};

use crate::{Database, DbError, DbResult};

fn worktree_from_row(row: &Row<'_>) -> rusqlite::Result<Worktree> {
  let status: String = row.get(5)?;
  Ok(Worktree {
    id: row.get(0)?,
    repository_id: row.get(1)?,
    name: row.get(2)?,
    branch: row.get(3)?,
    path: row.get(4)?,
    status: status.parse().map_err(|_| {
      rusqlite::Error::InvalidColumnType(
        5,
        "status".to_string(),
        rusqlite::types::Type::Text,
      )
    })?,
    created_at: row.get(6)?,
    updated_at: row.get(7)?,
  })
}

const WORKTREE_FIELDS: &str =
  "id, repository_id, name, branch, path, status, created_at, updated_at";

impl Database {
  pub async fn create_worktree(
    &self,
    worktree: &Worktree,
  ) -> DbResult<()> {
    self.conn().await.execute(
      "INSERT INTO worktrees (id, repository_id, name, branch, path, status, created_at, updated_at)
      VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
      params![
        worktree.id,
        worktree.repository_id,
        worktree.name,
        worktree.branch,
        worktree.path,
        worktree.status.to_string(),
        worktree.created_at,
        worktree.updated_at,
      ],
    )?;
    Ok(())
  }

  pub async fn get_worktree(&self, id: &str) -> DbResult<Worktree> {
    self
      .conn()
      .await
      .query_row(
        &format!(
          "SELECT {WORKTREE_FIELDS} FROM worktrees WHERE id = ?1"
        ),
        [id],
        worktree_from_row,
      )
      .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => {
          DbError::not_found("worktree", id)
        }
        e => e.into(),
      })
  }

  pub async fn get_worktree_by_name(
    &self,
    repository_id: &str,
    name: &str,
  ) -> DbResult<Option<Worktree>> {
    let conn = self.conn().await;
    let mut stmt = conn.prepare(&format!(
      "SELECT {WORKTREE_FIELDS} FROM worktrees
      WHERE repository_id = ?1 AND name = ?2"
    ))?;
    let mut rows =
      stmt.query_map([repository_id, name], worktree_from_row)?;
    rows.next().transpose().map_err(Into::into)
  }

  pub async fn list_worktrees(
    &self,
    repository_id: Option<&str>,
    status: Option<WorktreeStatus>,
  ) -> DbResult<Vec<Worktree>> {
    let conn = self.conn().await;
    let mut stmt = conn.prepare(&format!(
      "SELECT {WORKTREE_FIELDS} FROM worktrees
      WHERE (?1 IS NULL OR repository_id = ?1)
        AND (?2 IS NULL OR status = ?2)
      ORDER BY name"
    ))?;
    let worktrees = stmt
      .query_map(
        params![
          repository_id,
          status.map(|status| status.to_string())
        ],
        worktree_from_row,
      )?
      .collect::<Result<Vec<_>, _>>()?;
    Ok(worktrees)
  }

  /// Atomically transition a worktree's status, enforcing the
  /// lifecycle state machine. Returns the updated record.
  pub async fn update_worktree_status(
    &self,
    id: &str,
    status: WorktreeStatus,
  ) -> DbResult<Worktree> {
    let conn = self.conn().await;
    let current = conn
      .query_row(
        "SELECT status FROM worktrees WHERE id = ?1",
        [id],
        |row| row.get::<_, String>(0),
      )
      .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => {
          DbError::not_found("worktree", id)
        }
        e => e.into(),
      })?;
    let current: WorktreeStatus = current.parse().map_err(|_| {
      DbError::Conflict(format!("corrupt status value: {current}"))
    })?;
    if !current.can_transition_to(status) {
      return Err(DbError::InvalidTransition {
        from: current,
        to: status,
      });
    }
    conn.execute(
      "UPDATE worktrees SET status = ?2, updated_at = ?3 WHERE id = ?1",
      params![id, status.to_string(), vibeman_timestamp()],
    )?;
    drop(conn);
    self.get_worktree(id).await
  }

  pub async fn delete_worktree(&self, id: &str) -> DbResult<()> {
    let deleted = self
      .conn()
      .await
      .execute("DELETE FROM worktrees WHERE id = ?1", [id])?;
    if deleted == 0 {
      return Err(DbError::not_found("worktree", id));
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use vibeman_client::entities::{new_id, repository::Repository};

  use super::*;

  async fn seeded_db() -> (Database, Repository) {
    let db = Database::open_in_memory().unwrap();
    let ts = vibeman_timestamp();
    let repo = Repository {
      id: new_id(),
      name: "api".to_string(),
      path: "/tmp/api".to_string(),
      description: String::new(),
      created_at: ts,
      updated_at: ts,
    };
    db.create_repository(&repo).await.unwrap();
    (db, repo)
  }

  fn worktree(repo: &Repository, name: &str) -> Worktree {
    let ts = vibeman_timestamp();
    Worktree {
      id: new_id(),
      repository_id: repo.id.clone(),
      name: name.to_string(),
      branch: format!("feature/{name}"),
      path: format!("/tmp/worktrees/{name}"),
      status: WorktreeStatus::Stopped,
      created_at: ts,
      updated_at: ts,
    }
  }

  #[tokio::test]
  async fn crud_and_filters() {
    let (db, repo) = seeded_db().await;
    let wt = worktree(&repo, "feature-x");
    db.create_worktree(&wt).await.unwrap();

    assert_eq!(db.get_worktree(&wt.id).await.unwrap(), wt);
    assert_eq!(
      db.get_worktree_by_name(&repo.id, "feature-x")
        .await
        .unwrap()
        .unwrap(),
      wt
    );
    assert_eq!(
      db.list_worktrees(Some(&repo.id), None).await.unwrap().len(),
      1
    );
    assert!(
      db.list_worktrees(Some("other"), None)
        .await
        .unwrap()
        .is_empty()
    );
    assert!(
      db.list_worktrees(None, Some(WorktreeStatus::Running))
        .await
        .unwrap()
        .is_empty()
    );

    db.delete_worktree(&wt.id).await.unwrap();
    assert!(db.get_worktree(&wt.id).await.is_err());
  }

  #[tokio::test]
  async fn status_transitions_enforce_state_machine() {
    let (db, repo) = seeded_db().await;
    let wt = worktree(&repo, "feature-x");
    db.create_worktree(&wt).await.unwrap();

    // stopped -> running is not an edge
    let err = db
      .update_worktree_status(&wt.id, WorktreeStatus::Running)
      .await
      .unwrap_err();
    assert!(matches!(err, DbError::InvalidTransition { .. }));

    for status in [
      WorktreeStatus::Starting,
      WorktreeStatus::Running,
      WorktreeStatus::Stopping,
      WorktreeStatus::Stopped,
    ] {
      let updated =
        db.update_worktree_status(&wt.id, status).await.unwrap();
      assert_eq!(updated.status, status);
    }
  }

  #[tokio::test]
  async fn worktree_names_unique_per_repository() {
    let (db, repo) = seeded_db().await;
    db.create_worktree(&worktree(&repo, "feature-x"))
      .await
      .unwrap();
    let mut dup = worktree(&repo, "feature-x");
    dup.path = "/tmp/worktrees/elsewhere".to_string();
    let err = db.create_worktree(&dup).await.unwrap_err();
    assert!(err.is_constraint_violation());
  }

  #[tokio::test]
  async fn repository_delete_blocked_by_worktrees() {
    let (db, repo) = seeded_db().await;
    db.create_worktree(&worktree(&repo, "feature-x"))
      .await
      .unwrap();
    assert!(matches!(
      db.delete_repository(&repo.id).await.unwrap_err(),
      DbError::Conflict(_)
    ));
    let wt = db
      .get_worktree_by_name(&repo.id, "feature-x")
      .await
      .unwrap()
      .unwrap();
    db.delete_worktree(&wt.id).await.unwrap();
    db.delete_repository(&repo.id).await.unwrap();
  }
}
