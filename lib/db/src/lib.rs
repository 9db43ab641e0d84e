//! # Vibeman Db
//!
//! SQLite-backed store for repository and worktree records. The
//! connection runs in WAL mode behind an async mutex; each operation
//! holds the lock for a single statement, so per-row status
//! transitions are linearizable while unrelated operations interleave
//! freely. Schema migrations are forward-only and run at open.

#[macro_use]
extern crate tracing;

use std::path::Path;

use rusqlite::Connection;
use thiserror::Error;
use tokio::sync::Mutex;
use vibeman_client::entities::worktree::WorktreeStatus;

mod migrate;
mod repository;
mod worktree;

#[derive(Debug, Error)]
pub enum DbError {
  #[error("sqlite error: {0}")]
  Sqlite(#[from] rusqlite::Error),

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  #[error("{entity} not found: {id}")]
  NotFound { entity: &'static str, id: String },

  #[error("{0}")]
  Conflict(String),

  #[error("invalid status transition: {from} -> {to}")]
  InvalidTransition {
    from: WorktreeStatus,
    to: WorktreeStatus,
  },
}

impl DbError {
  pub fn not_found(entity: &'static str, id: impl Into<String>) -> DbError {
    DbError::NotFound {
      entity,
      id: id.into(),
    }
  }

  /// Unique / foreign key violations surface as conflicts at the API.
  pub fn is_constraint_violation(&self) -> bool {
    matches!(
      self,
      DbError::Sqlite(rusqlite::Error::SqliteFailure(e, _))
        if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
  }
}

pub type DbResult<T> = Result<T, DbError>;

pub struct Database {
  conn: Mutex<Connection>,
}

impl Database {
  /// Open or create the database at `path`, running pending
  /// migrations.
  pub fn open(path: impl AsRef<Path>) -> DbResult<Database> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)?;
    }
    let conn = Connection::open(path)?;
    conn.execute_batch(
      "PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;",
    )?;
    migrate::run(&conn)?;
    debug!("database opened at {path:?}");
    Ok(Database {
      conn: Mutex::new(conn),
    })
  }

  /// In-memory database for tests.
  pub fn open_in_memory() -> DbResult<Database> {
    let conn = Connection::open_in_memory()?;
    conn.execute_batch("PRAGMA foreign_keys=ON;")?;
    migrate::run(&conn)?;
    Ok(Database {
      conn: Mutex::new(conn),
    })
  }

  pub(crate) async fn conn(
    &self,
  ) -> tokio::sync::MutexGuard<'_, Connection> {
    self.conn.lock().await
  }

  /// Cheap liveness probe for the status endpoint.
  pub async fn healthy(&self) -> bool {
    self
      .conn()
      .await
      .query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
      .is_ok()
  }
}
