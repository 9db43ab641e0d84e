use comfy_table::{Attribute, Cell, Table};
use vibeman_client::entities::container::{
  ContainerQuery, ContainerType,
};

use crate::{args::AiCommand, config::CliConfig};

pub async fn handle(
  config: &CliConfig,
  command: AiCommand,
) -> anyhow::Result<()> {
  let client = config.client();
  match command {
    AiCommand::Attach(worktree) => {
      let (repo, wt) = super::resolve_worktree(
        &client,
        &worktree.name,
        worktree.repo.as_deref(),
      )
      .await?;
      let container =
        super::ai_container_name(&repo.name, &wt.name);
      super::exec_interactive(&container, "zsh").await
    }
    AiCommand::Claude(worktree) => {
      let (repo, wt) = super::resolve_worktree(
        &client,
        &worktree.name,
        worktree.repo.as_deref(),
      )
      .await?;
      let container =
        super::ai_container_name(&repo.name, &wt.name);
      super::exec_interactive(&container, "claude").await
    }
    AiCommand::Logs { worktree, lines } => {
      let (_, wt) = super::resolve_worktree(
        &client,
        &worktree.name,
        worktree.repo.as_deref(),
      )
      .await?;
      let logs = client.worktree_logs(&wt.id, lines).await?;
      if logs.truncated {
        eprintln!("(showing last {} lines)", logs.lines.len());
      }
      for line in logs.lines {
        println!("{line}");
      }
      Ok(())
    }
    AiCommand::List => {
      let containers = client
        .list_containers(&ContainerQuery::default())
        .await?
        .into_iter()
        .filter(|container| {
          container.container_type == ContainerType::Ai
        })
        .collect::<Vec<_>>();
      if containers.is_empty() {
        println!("no AI containers running");
        return Ok(());
      }
      let mut table = Table::new();
      table.set_header([
        "Container",
        "Repository",
        "Worktree",
        "Image",
        "Status",
      ]);
      for container in containers {
        table.add_row([
          Cell::new(&container.name)
            .add_attribute(Attribute::Bold),
          Cell::new(&container.repository),
          Cell::new(&container.environment),
          Cell::new(&container.image),
          Cell::new(&container.status),
        ]);
      }
      println!("{table}");
      Ok(())
    }
  }
}
