use std::collections::HashMap;

use comfy_table::{Attribute, Cell, Color, Table};
use vibeman_client::entities::worktree::WorktreeStatus;

use crate::{args::ListArgs, config::CliConfig};

pub async fn handle(
  config: &CliConfig,
  list: ListArgs,
) -> anyhow::Result<()> {
  let client = config.client();
  let list_worktrees_filter = Default::default();
  let (repositories, worktrees) = tokio::try_join!(
    client.list_repositories(),
    client.list_worktrees(&list_worktrees_filter),
  )?;
  let repo_names = repositories
    .iter()
    .map(|repo| (repo.id.clone(), repo.name.clone()))
    .collect::<HashMap<_, _>>();

  let worktrees = worktrees
    .into_iter()
    .filter(|worktree| {
      list.all || worktree.status != WorktreeStatus::Stopped
    })
    .collect::<Vec<_>>();

  if worktrees.is_empty() {
    if list.all {
      println!("no worktrees; try `vibeman worktree add <name>`");
    } else {
      println!("no running worktrees; pass --all to include stopped");
    }
    return Ok(());
  }

  let mut table = Table::new();
  table.set_header([
    "Worktree", "Repository", "Branch", "Status", "Path",
  ]);
  for worktree in worktrees {
    let color = match worktree.status {
      WorktreeStatus::Running => Color::Green,
      WorktreeStatus::Starting | WorktreeStatus::Stopping => {
        Color::DarkYellow
      }
      WorktreeStatus::Stopped => Color::Blue,
      WorktreeStatus::Error => Color::Red,
    };
    table.add_row([
      Cell::new(&worktree.name).add_attribute(Attribute::Bold),
      Cell::new(
        repo_names
          .get(&worktree.repository_id)
          .cloned()
          .unwrap_or_default(),
      ),
      Cell::new(&worktree.branch),
      Cell::new(worktree.status.to_string())
        .fg(color)
        .add_attribute(Attribute::Bold),
      Cell::new(&worktree.path),
    ]);
  }
  println!("{table}");
  Ok(())
}
