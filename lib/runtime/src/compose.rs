use std::path::Path;

use crate::{
  DockerRuntime, Result,
  invoke::{COMPOSE_UP_TIMEOUT, ENGINE_TIMEOUT},
};

fn base_args(project: &str, compose_file: &Path) -> Vec<String> {
  vec![
    "compose".to_string(),
    "-f".to_string(),
    compose_file.display().to_string(),
    "-p".to_string(),
    project.to_string(),
  ]
}

/// `compose up -d` for the project. A non-empty service selection is
/// started without its dependencies; an empty one starts everything.
#[instrument(level = "debug", skip(runtime, compose_file))]
pub(crate) async fn up(
  runtime: &DockerRuntime,
  project: &str,
  compose_file: &Path,
  services: &[String],
) -> Result<()> {
  let mut args = base_args(project, compose_file);
  args.push("up".to_string());
  args.push("-d".to_string());
  if !services.is_empty() {
    args.push("--no-deps".to_string());
    args.extend(services.iter().cloned());
  }
  runtime.engine(args, COMPOSE_UP_TIMEOUT).await?;
  Ok(())
}

#[instrument(level = "debug", skip(runtime, compose_file))]
pub(crate) async fn stop(
  runtime: &DockerRuntime,
  project: &str,
  compose_file: &Path,
) -> Result<()> {
  let mut args = base_args(project, compose_file);
  args.push("stop".to_string());
  runtime.engine(args, COMPOSE_UP_TIMEOUT).await?;
  Ok(())
}

/// Container ids of the project, one per running service.
pub(crate) async fn ps(
  runtime: &DockerRuntime,
  project: &str,
  compose_file: &Path,
) -> Result<Vec<String>> {
  let mut args = base_args(project, compose_file);
  args.push("ps".to_string());
  args.push("-q".to_string());
  let output = runtime.engine(args, ENGINE_TIMEOUT).await?;
  Ok(
    output
      .stdout
      .lines()
      .map(str::trim)
      .filter(|line| !line.is_empty())
      .map(str::to_string)
      .collect(),
  )
}
