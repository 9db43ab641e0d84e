use vibeman_client::entities::worktree::CreateWorktreeRequest;

use crate::{
  args::{WorktreeCommand, WorktreeRef},
  config::CliConfig,
};

pub async fn handle(
  config: &CliConfig,
  command: WorktreeCommand,
) -> anyhow::Result<()> {
  let client = config.client();
  match command {
    WorktreeCommand::Add {
      name,
      repo,
      branch,
      base_branch,
      skip_setup,
      start,
    } => {
      let repository = match repo {
        Some(name) => super::resolve_repo(&client, &name).await?,
        None => super::repo_for_cwd(&client).await?,
      };
      let res = client
        .create_worktree(&CreateWorktreeRequest {
          repository_id: repository.id,
          name: name.clone(),
          branch,
          base_branch,
          skip_setup,
          auto_start: start,
          ..Default::default()
        })
        .await?;
      println!(
        "created worktree {} on branch {} at {}",
        res.worktree.name, res.worktree.branch, res.path
      );
      Ok(())
    }
    WorktreeCommand::Remove { name, repo, force } => {
      let (_, worktree) =
        super::resolve_worktree(&client, &name, repo.as_deref())
          .await?;
      client.delete_worktree(&worktree.id, force).await?;
      println!("removed worktree {name}");
      Ok(())
    }
    WorktreeCommand::Shell(worktree) => {
      shell(config, worktree).await
    }
  }
}

pub async fn start(
  config: &CliConfig,
  worktree: WorktreeRef,
) -> anyhow::Result<()> {
  let client = config.client();
  let (_, wt) = super::resolve_worktree(
    &client,
    &worktree.name,
    worktree.repo.as_deref(),
  )
  .await?;
  let wt = client.start_worktree(&wt.id).await?;
  println!("worktree {} is {}", wt.name, wt.status);
  Ok(())
}

pub async fn stop(
  config: &CliConfig,
  worktree: WorktreeRef,
) -> anyhow::Result<()> {
  let client = config.client();
  let (_, wt) = super::resolve_worktree(
    &client,
    &worktree.name,
    worktree.repo.as_deref(),
  )
  .await?;
  let wt = client.stop_worktree(&wt.id).await?;
  println!("worktree {} is {}", wt.name, wt.status);
  Ok(())
}

async fn shell(
  config: &CliConfig,
  worktree: WorktreeRef,
) -> anyhow::Result<()> {
  let client = config.client();
  let (repo, wt) = super::resolve_worktree(
    &client,
    &worktree.name,
    worktree.repo.as_deref(),
  )
  .await?;
  let container = super::ai_container_name(&repo.name, &wt.name);
  super::exec_interactive(&container, "zsh").await
}
