use anyhow::Context;
use vibeman_client::entities::{
  config::RepositoryConfig, repository::CreateRepositoryRequest,
};

use crate::config::CliConfig;

/// Write a starter vibeman.toml for the current repository and, when
/// a server is reachable, register the repo with it.
pub async fn handle(config: &CliConfig) -> anyhow::Result<()> {
  let cwd = std::env::current_dir()
    .context("failed to read current directory")?;
  let cwd = cwd.canonicalize().unwrap_or(cwd);

  if !git::is_repository(&cwd).await {
    anyhow::bail!(
      "{} is not a git repository; run `git init` first",
      cwd.display()
    );
  }
  let config_path = cwd.join(config::REPO_CONFIG_FILE);
  if config_path.exists() {
    anyhow::bail!(
      "{} already exists, refusing to overwrite",
      config_path.display()
    );
  }

  let name = cwd
    .file_name()
    .map(|n| n.to_string_lossy().to_string())
    .unwrap_or_default();
  let mut repo_config = RepositoryConfig::default();
  repo_config.repository.name = name.clone();
  config::save_repository_config(&cwd, &repo_config)?;
  println!("wrote {}", config_path.display());

  // registration is best-effort, the server may not be up
  let client = config.client();
  match client
    .create_repository(&CreateRepositoryRequest {
      path: Some(cwd.to_string_lossy().to_string()),
      url: None,
      name: Some(name.clone()),
      description: None,
    })
    .await
  {
    Ok(repo) => println!("registered repository {}", repo.name),
    Err(e) => println!(
      "not registered with the server ({e}); run `vibeman repo add .` once it is up"
    ),
  }
  Ok(())
}
