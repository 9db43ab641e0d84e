#[macro_use]
extern crate tracing;

use clap::Parser;
use vibeman_client::entities::error::Error;

use crate::config::CliConfig;

mod args;
mod command;
mod config;
mod server;

async fn app() -> anyhow::Result<()> {
  dotenvy::dotenv().ok();
  let args = args::Cli::parse();
  let config = CliConfig::load(&args)?;
  logger::init(&config.global.logging)?;

  use args::Command::*;
  match args.command {
    Server { command } => command::server::handle(&config, command).await,
    Init => command::init::handle(&config).await,
    Repo { command } => command::repo::handle(&config, command).await,
    Worktree { command } => {
      command::worktree::handle(&config, command).await
    }
    Start(start) => command::worktree::start(&config, start).await,
    Stop(stop) => command::worktree::stop(&config, stop).await,
    List(list) => command::list::handle(&config, list).await,
    Ai { command } => command::ai::handle(&config, command).await,
    Services { command } => {
      command::services::handle(&config, command).await
    }
  }
}

#[tokio::main]
async fn main() {
  let mut term_signal = tokio::signal::unix::signal(
    tokio::signal::unix::SignalKind::terminate(),
  )
  .expect("failed to install SIGTERM handler");
  let res = tokio::select! {
    res = app() => res,
    _ = term_signal.recv() => Ok(()),
  };
  if let Err(e) = res {
    eprintln!("ERROR: {e:#}");
    let code = e
      .downcast_ref::<Error>()
      .map(Error::exit_code)
      .unwrap_or(1);
    std::process::exit(code);
  }
}
