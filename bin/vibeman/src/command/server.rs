use anyhow::Context;

use crate::{args::ServerCommand, config::CliConfig};

pub async fn handle(
  config: &CliConfig,
  command: ServerCommand,
) -> anyhow::Result<()> {
  match command {
    ServerCommand::Start => {
      let services_config =
        config::load_services_config(&config.paths)
          .context("failed to load services config")?;
      crate::server::run(
        config.global.clone(),
        services_config,
        config.paths.clone(),
      )
      .await
    }
    ServerCommand::Stop => {
      config.client().shutdown().await?;
      println!("server at {} shutting down", config.host);
      Ok(())
    }
    ServerCommand::Status => {
      let status = config.client().status().await?;
      println!(
        "vibeman v{} | status: {} | up {}s",
        status.version, status.status, status.uptime
      );
      println!(
        "database: {} | container engine: {} | git: {}",
        up_down(status.services.database),
        up_down(status.services.container_engine),
        up_down(status.services.git),
      );
      println!(
        "{} repositories, {} worktrees, {} containers",
        status.repositories, status.worktrees, status.containers
      );
      Ok(())
    }
  }
}

fn up_down(ok: bool) -> &'static str {
  if ok { "ok" } else { "DOWN" }
}
