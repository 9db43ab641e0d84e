use rusqlite::Connection;

use crate::DbResult;

/// Forward-only migrations, applied in order at open. Each entry runs
/// inside a transaction together with the version bump.
const MIGRATIONS: &[&str] = &[
  // v1: initial schema
  r#"
  CREATE TABLE repositories (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    path TEXT NOT NULL UNIQUE,
    description TEXT NOT NULL DEFAULT '',
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
  );

  CREATE TABLE worktrees (
    id TEXT PRIMARY KEY,
    repository_id TEXT NOT NULL REFERENCES repositories(id),
    name TEXT NOT NULL,
    branch TEXT NOT NULL,
    path TEXT NOT NULL UNIQUE,
    status TEXT NOT NULL DEFAULT 'stopped'
      CHECK (status IN ('stopped', 'starting', 'running', 'stopping', 'error')),
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    UNIQUE (repository_id, name)
  );

  CREATE INDEX idx_worktrees_repository
    ON worktrees(repository_id);
  "#,
];

pub fn run(conn: &Connection) -> DbResult<()> {
  conn.execute_batch(
    "CREATE TABLE IF NOT EXISTS schema_version (
      version INTEGER NOT NULL
    );",
  )?;
  let current: i64 = conn
    .query_row(
      "SELECT COALESCE(MAX(version), 0) FROM schema_version",
      [],
      |row| row.get(0),
    )
    .unwrap_or(0);

  for (i, migration) in MIGRATIONS.iter().enumerate() {
    let version = i as i64 + 1;
    if version <= current {
      continue;
    }
    conn.execute_batch(&format!(
      "BEGIN;
      {migration}
      INSERT INTO schema_version (version) VALUES ({version});
      COMMIT;"
    ))?;
    debug!("applied schema migration v{version}");
  }
  Ok(())
}
