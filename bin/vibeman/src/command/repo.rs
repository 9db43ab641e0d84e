use anyhow::Context;
use comfy_table::{Attribute, Cell, Table};
use vibeman_client::entities::repository::CreateRepositoryRequest;

use crate::{args::RepoCommand, config::CliConfig};

pub async fn handle(
  config: &CliConfig,
  command: RepoCommand,
) -> anyhow::Result<()> {
  let client = config.client();
  match command {
    RepoCommand::Add {
      path,
      url,
      name,
      description,
    } => {
      let path = match path {
        Some(path) => Some(
          std::fs::canonicalize(&path)
            .with_context(|| {
              format!("repository path {path} does not resolve")
            })?
            .to_string_lossy()
            .to_string(),
        ),
        None => None,
      };
      if path.is_none() && url.is_none() {
        anyhow::bail!("pass a repository path or --url");
      }
      let repo = client
        .create_repository(&CreateRepositoryRequest {
          path,
          url,
          name,
          description,
        })
        .await?;
      println!("tracking repository {} at {}", repo.name, repo.path);
      Ok(())
    }
    RepoCommand::List => {
      let repositories = client.list_repositories().await?;
      if repositories.is_empty() {
        println!("no repositories tracked; try `vibeman repo add .`");
        return Ok(());
      }
      let mut table = Table::new();
      table.set_header(["Repository", "Path", "Description"]);
      for repo in repositories {
        table.add_row([
          Cell::new(repo.name).add_attribute(Attribute::Bold),
          Cell::new(repo.path),
          Cell::new(repo.description),
        ]);
      }
      println!("{table}");
      Ok(())
    }
    RepoCommand::Remove { name } => {
      let repo = super::resolve_repo(&client, &name).await?;
      client.delete_repository(&repo.id).await?;
      println!("stopped tracking repository {name}");
      Ok(())
    }
  }
}
