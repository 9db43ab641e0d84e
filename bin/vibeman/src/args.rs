use clap::{Args, Parser, Subcommand};

/// Manage AI-assisted development environments across git worktrees.
#[derive(Debug, Parser)]
#[command(name = "vibeman", version, about)]
pub struct Cli {
  #[command(subcommand)]
  pub command: Command,

  /// Address of the vibeman server, eg `http://localhost:8080`.
  /// Defaults to the configured port on localhost.
  #[arg(long, global = true)]
  pub host: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
  /// Control the vibeman server process.
  Server {
    #[command(subcommand)]
    command: ServerCommand,
  },
  /// Write a starter vibeman.toml for the current repository.
  Init,
  /// Manage tracked repositories.
  Repo {
    #[command(subcommand)]
    command: RepoCommand,
  },
  /// Manage worktrees.
  Worktree {
    #[command(subcommand)]
    command: WorktreeCommand,
  },
  /// Start a worktree by name.
  Start(WorktreeRef),
  /// Stop a worktree by name.
  Stop(WorktreeRef),
  /// List worktrees.
  List(ListArgs),
  /// Work with AI containers.
  Ai {
    #[command(subcommand)]
    command: AiCommand,
  },
  /// Manage shared backing services.
  Services {
    #[command(subcommand)]
    command: ServicesCommand,
  },
}

#[derive(Debug, Subcommand)]
pub enum ServerCommand {
  /// Run the control plane in the foreground.
  Start,
  /// Ask a running server to shut down.
  Stop,
  /// Print server status.
  Status,
}

#[derive(Debug, Subcommand)]
pub enum RepoCommand {
  /// Track an existing repository (or clone a remote one).
  Add {
    /// Path to a local git repository, or a clone url with --url.
    path: Option<String>,
    /// Clone from this url instead of tracking a local path.
    #[arg(long)]
    url: Option<String>,
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    description: Option<String>,
  },
  /// List tracked repositories.
  List,
  /// Stop tracking a repository. Its worktrees must be removed first.
  Remove { name: String },
}

#[derive(Debug, Subcommand)]
pub enum WorktreeCommand {
  /// Create a worktree.
  Add {
    name: String,
    /// Repository name. Defaults to the current directory's repo.
    #[arg(long)]
    repo: Option<String>,
    #[arg(long)]
    branch: Option<String>,
    #[arg(long)]
    base_branch: Option<String>,
    /// Skip required services and init scripts.
    #[arg(long)]
    skip_setup: bool,
    /// Start the worktree right away.
    #[arg(long)]
    start: bool,
  },
  /// Remove a worktree, its directory and containers.
  Remove {
    name: String,
    #[arg(long)]
    repo: Option<String>,
    /// Remove even with uncommitted or unpushed work.
    #[arg(long)]
    force: bool,
  },
  /// Open a shell in the worktree's AI container.
  Shell(WorktreeRef),
}

#[derive(Debug, Args)]
pub struct WorktreeRef {
  pub name: String,
  /// Repository name, for when the worktree name is ambiguous.
  #[arg(long)]
  pub repo: Option<String>,
}

#[derive(Debug, Args)]
pub struct ListArgs {
  /// Include stopped worktrees.
  #[arg(long)]
  pub all: bool,
}

#[derive(Debug, Subcommand)]
pub enum AiCommand {
  /// Attach an interactive shell to the AI container.
  Attach(WorktreeRef),
  /// Run claude inside the AI container.
  Claude(WorktreeRef),
  /// Print the worktree's aggregated logs.
  Logs {
    #[command(flatten)]
    worktree: WorktreeRef,
    #[arg(long)]
    lines: Option<usize>,
  },
  /// List AI containers.
  List,
}

#[derive(Debug, Subcommand)]
pub enum ServicesCommand {
  Start { name: String },
  Stop { name: String },
  List,
}
