use std::path::{Path, PathBuf};

use command::{run_setup_command, validate_setup_command};
use vibeman_client::entities::{
  config::RepositoryConfig,
  error::Error,
  new_id, vibeman_timestamp,
  worktree::{
    CreateWorktreeRequest, CreateWorktreeResponse, Worktree,
    WorktreeStatus,
  },
};

use super::{
  config_error, git_error, start_worktree, validate_worktree_name,
};
use crate::server::App;

/// Create a worktree: git worktree, store row, log directory, config
/// copy, then best-effort setup (required services, init command,
/// post scripts). Failures before the store row exists roll back the
/// git state; setup failures after that are logged and the worktree
/// survives.
#[instrument(level = "debug", skip(app, request), fields(name = &request.name))]
pub async fn create_worktree(
  app: &App,
  request: CreateWorktreeRequest,
) -> Result<CreateWorktreeResponse, Error> {
  validate_worktree_name(&request.name)?;

  let repo = app
    .db
    .get_repository(&request.repository_id)
    .await
    .map_err(crate::server::db_error)?;
  let repo_path = PathBuf::from(&repo.path);
  let repo_config = config::load_repository_config(&repo_path)
    .map_err(config_error)?;

  // worktree root: repo config > global storage > home default
  let root = repo_config
    .repository
    .worktrees
    .directory
    .clone()
    .map(PathBuf::from)
    .or_else(|| {
      app
        .config
        .storage
        .worktrees_path
        .clone()
        .map(PathBuf::from)
    })
    .map(Ok)
    .unwrap_or_else(|| {
      config::VibemanPaths::default_worktrees_root()
        .map_err(config_error)
    })?;
  let worktree_path = root.join(&request.name);
  if worktree_path.exists() {
    return Err(Error::already_exists(
      "worktree path",
      worktree_path.display(),
    ));
  }

  let branch = request.branch.clone().unwrap_or_else(|| {
    let prefix = repo_config
      .repository
      .git
      .worktree_prefix
      .clone()
      .unwrap_or_default();
    format!("{prefix}{}", request.name)
  });
  let base_branch = match &request.base_branch {
    Some(base) => base.clone(),
    None => match &repo_config.repository.git.default_branch {
      Some(base) => base.clone(),
      None => git::get_default_branch(&repo_path)
        .await
        .unwrap_or_else(|_| "main".to_string()),
    },
  };

  let worktree_path = git::create_worktree(
    &repo_path,
    &branch,
    &worktree_path,
    Some(&base_branch),
  )
  .await
  .map_err(git_error)?;

  let ts = vibeman_timestamp();
  let worktree = Worktree {
    id: new_id(),
    repository_id: repo.id.clone(),
    name: request.name.clone(),
    branch: branch.clone(),
    path: worktree_path.to_string_lossy().to_string(),
    status: WorktreeStatus::Stopped,
    created_at: ts,
    updated_at: ts,
  };
  if let Err(e) = app.db.create_worktree(&worktree).await {
    // roll the git worktree back out
    let _ = git::remove_worktree(&repo_path, &worktree_path).await;
    let _ = tokio::fs::remove_dir_all(&worktree_path).await;
    return Err(if e.is_constraint_violation() {
      Error::already_exists("worktree", &request.name)
    } else {
      crate::server::db_error(e)
    });
  }

  if let Err(e) =
    prepare_worktree_files(app, &repo.name, &request, &repo_config, &worktree)
      .await
  {
    warn!(
      "failed to prepare files for worktree {}: {e:#}",
      request.name
    );
  }

  if !request.skip_setup {
    run_setup(app, &repo.name, &repo_config, &request, &worktree_path)
      .await;
  }

  if request.auto_start
    && let Err(e) = start_worktree(app, &worktree.id).await
  {
    warn!(
      "auto start of worktree {} failed: {e:#}",
      request.name
    );
  }

  info!(
    "created worktree {} for repo {} at {worktree_path:?}",
    request.name, repo.name
  );

  Ok(CreateWorktreeResponse {
    path: worktree.path.clone(),
    worktree,
  })
}

/// Log directory, the CLAUDE.md descriptor, and the worktree's own
/// copy of vibeman.toml with request overrides applied.
async fn prepare_worktree_files(
  app: &App,
  repo_name: &str,
  request: &CreateWorktreeRequest,
  repo_config: &RepositoryConfig,
  worktree: &Worktree,
) -> anyhow::Result<()> {
  let log_dir = app.logs.worktree_dir(repo_name, &worktree.name);
  tokio::fs::create_dir_all(&log_dir).await?;

  let worktree_path = Path::new(&worktree.path);
  let claude_md = format!(
    "# {repo_name} / {name}\n\n\
    Worktree `{name}` of repository `{repo_name}`, on branch\n\
    `{branch}`.\n\n\
    - Workspace is mounted at `/workspace` inside the AI container.\n\
    - Logs for every container of this worktree are under `/logs`.\n\
    - Logs for all worktrees are under `/all-logs` (read-only).\n",
    name = worktree.name,
    branch = worktree.branch,
  );
  tokio::fs::write(worktree_path.join("CLAUDE.md"), claude_md)
    .await?;

  let mut config_copy = repo_config.clone();
  if let Some(compose_file) = &request.compose_file {
    config_copy.repository.container.compose_file =
      Some(compose_file.clone());
  }
  if let Some(services) = &request.services {
    config_copy.repository.container.services = services.clone();
  }
  if let Some(image) = &request.container_image {
    config_copy.repository.ai.image = Some(image.clone());
  }
  config::save_repository_config(worktree_path, &config_copy)?;
  Ok(())
}

/// Required services, then the repo's worktree_init command, then the
/// request's post scripts. Everything here is best-effort: failures
/// are logged, the worktree stands.
async fn run_setup(
  app: &App,
  repo_name: &str,
  repo_config: &RepositoryConfig,
  request: &CreateWorktreeRequest,
  worktree_path: &Path,
) {
  for (name, service) in &repo_config.repository.services {
    if !service.required {
      continue;
    }
    match app.services.start_service(name).await {
      Ok(_) => {
        if let Err(e) =
          app.services.add_reference(name, repo_name).await
        {
          warn!("failed to add service reference {name}: {e}");
        }
      }
      Err(e) => {
        warn!("failed to start required service {name}: {e}");
      }
    }
  }

  let mut commands = Vec::new();
  if let Some(init) = &repo_config.repository.container.worktree_init
  {
    commands.push(("worktree init", init.clone()));
  }
  for script in &request.post_scripts {
    commands.push(("post script", script.clone()));
  }

  for (stage, command) in commands {
    if let Err(e) = validate_setup_command(&command, worktree_path) {
      warn!("refusing {stage} command {command:?}: {e:#}");
      continue;
    }
    let log =
      run_setup_command(stage, worktree_path, &command, None).await;
    if log.success {
      debug!("{stage} succeeded: {command}");
    } else {
      warn!("{stage} failed: {command} | {}", log.combined());
    }
  }
}
