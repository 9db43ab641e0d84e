use anyhow::Context;
use vibeman_client::{
  VibemanClient,
  entities::{repository::Repository, worktree::Worktree},
};

pub mod ai;
pub mod init;
pub mod list;
pub mod repo;
pub mod server;
pub mod services;
pub mod worktree;

/// Find a repository by name.
pub async fn resolve_repo(
  client: &VibemanClient,
  name: &str,
) -> anyhow::Result<Repository> {
  let repositories = client.list_repositories().await?;
  repositories
    .into_iter()
    .find(|repo| repo.name == name)
    .with_context(|| {
      vibeman_client::entities::error::Error::not_found(
        "repository",
        name,
      )
      .to_string()
    })
}

/// Find the repository whose tree contains the current directory.
pub async fn repo_for_cwd(
  client: &VibemanClient,
) -> anyhow::Result<Repository> {
  let cwd = std::env::current_dir()
    .context("failed to read current directory")?;
  let cwd = cwd.canonicalize().unwrap_or(cwd);
  let repositories = client.list_repositories().await?;
  repositories
    .into_iter()
    .find(|repo| cwd.starts_with(&repo.path))
    .context(
      "current directory is not inside a tracked repository; pass --repo",
    )
}

/// Resolve a worktree by name, optionally scoped to a repository.
/// Ambiguous names across repos are an error.
pub async fn resolve_worktree(
  client: &VibemanClient,
  name: &str,
  repo: Option<&str>,
) -> anyhow::Result<(Repository, Worktree)> {
  let repositories = client.list_repositories().await?;
  let worktrees = client.list_worktrees(&Default::default()).await?;

  let mut matches = worktrees
    .into_iter()
    .filter(|worktree| worktree.name == name)
    .filter_map(|worktree| {
      repositories
        .iter()
        .find(|repo| repo.id == worktree.repository_id)
        .cloned()
        .map(|repo| (repo, worktree))
    })
    .filter(|(repository, _)| {
      repo.is_none_or(|name| repository.name == name)
    })
    .collect::<Vec<_>>();

  match matches.len() {
    0 => Err(
      anyhow::Error::new(
        vibeman_client::entities::error::Error::not_found(
          "worktree", name,
        ),
      ),
    ),
    1 => Ok(matches.remove(0)),
    _ => Err(anyhow::anyhow!(
      "worktree name {name} is ambiguous across repositories, pass --repo"
    )),
  }
}

/// Exec interactively into a container, inheriting the terminal.
pub async fn exec_interactive(
  container: &str,
  command: &str,
) -> anyhow::Result<()> {
  let status = tokio::process::Command::new("docker")
    .args(["exec", "-it", container, command])
    .status()
    .await
    .context("failed to spawn docker exec")?;
  if !status.success() {
    anyhow::bail!(
      "exec into {container} exited with {}",
      status.code().unwrap_or(-1)
    );
  }
  Ok(())
}

/// The AI container name for a worktree.
pub fn ai_container_name(repo: &str, worktree: &str) -> String {
  format!("{repo}-{worktree}-ai")
}
