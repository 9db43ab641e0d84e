use std::{path::Path, time::Duration};

use async_trait::async_trait;
use futures::StreamExt;
use tokio_util::io::ReaderStream;
use vibeman_client::entities::container::{
  ContainerConfig, ContainerDescriptor, ContainerErrorKind,
  LABEL_ENVIRONMENT, LABEL_MANAGED, LABEL_REPOSITORY, LABEL_TYPE,
};

use crate::{
  ContainerError, ContainerRuntime, ExecPool, HealthStatus,
  LogStream, PtyHandle, Result, TerminalSize,
  invoke::{ENGINE_TIMEOUT, InvokeOutput, spawn_engine},
  parse::{parse_inspect_output, parse_ps_output},
  pty,
  validate::{
    validate_container_ref, validate_exec_command,
    validate_host_path, validate_port_mapping,
  },
};

/// [ContainerRuntime] over a Docker-compatible CLI.
pub struct DockerRuntime {
  binary: String,
  pool: ExecPool,
}

impl Default for DockerRuntime {
  fn default() -> Self {
    DockerRuntime::new()
  }
}

impl DockerRuntime {
  pub fn new() -> DockerRuntime {
    DockerRuntime::with_binary("docker")
  }

  /// Point at a different engine binary (eg `podman`).
  pub fn with_binary(binary: impl Into<String>) -> DockerRuntime {
    DockerRuntime {
      binary: binary.into(),
      pool: ExecPool::new(8, Duration::from_secs(60)),
    }
  }

  pub(crate) async fn engine(
    &self,
    args: Vec<String>,
    timeout: Duration,
  ) -> Result<InvokeOutput> {
    let _slot = self.pool.acquire();
    let res = spawn_engine(&self.binary, &args, timeout).await;
    self.pool.evict_idle();
    res
  }

  fn create_args(
    config: &ContainerConfig,
  ) -> Result<Vec<String>> {
    validate_container_ref(&config.name)?;
    if config.image.is_empty() {
      return Err(ContainerError::new(
        ContainerErrorKind::ConfigError,
        "container image must be specified",
      ));
    }
    let mut args = vec![
      "create".to_string(),
      "--name".to_string(),
      config.name.clone(),
      "--label".to_string(),
      format!("{LABEL_MANAGED}=true"),
      "--label".to_string(),
      format!("{LABEL_REPOSITORY}={}", config.repository),
      "--label".to_string(),
      format!("{LABEL_ENVIRONMENT}={}", config.environment),
      "--label".to_string(),
      format!("{LABEL_TYPE}={}", config.container_type),
    ];
    for (key, value) in &config.env_vars {
      args.push("-e".to_string());
      args.push(format!("{key}={value}"));
    }
    for port in &config.ports {
      validate_port_mapping(port)?;
      args.push("-p".to_string());
      args.push(port.clone());
    }
    for volume in &config.volumes {
      let host = volume.split(':').next().unwrap_or(volume);
      validate_host_path(Path::new(host))?;
      args.push("-v".to_string());
      args.push(volume.clone());
    }
    if let Some(working_dir) = &config.working_dir {
      args.push("-w".to_string());
      args.push(working_dir.clone());
    }
    args.push(config.image.clone());
    args.extend(config.command.iter().cloned());
    Ok(args)
  }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
  async fn version(&self) -> Result<String> {
    let output = self
      .engine(
        vec![
          "version".to_string(),
          "--format".to_string(),
          "{{.Server.Version}}".to_string(),
        ],
        ENGINE_TIMEOUT,
      )
      .await?;
    Ok(output.stdout.trim().to_string())
  }

  #[instrument(level = "debug", skip(self, config), fields(name = &config.name))]
  async fn create(
    &self,
    config: &ContainerConfig,
  ) -> Result<ContainerDescriptor> {
    if let Some(compose_file) = config.compose_file.clone() {
      return self.compose_create(config, &compose_file).await;
    }
    let args = Self::create_args(config)?;
    let output = self
      .engine(args, ENGINE_TIMEOUT)
      .await
      .map_err(|e| e.context("failed to create container"))?;
    // create prints the full container id
    let id = output.stdout.trim().to_string();
    self.inspect(&id).await
  }

  async fn start(&self, id: &str) -> Result<()> {
    validate_container_ref(id)?;
    self
      .engine(
        vec!["start".to_string(), id.to_string()],
        ENGINE_TIMEOUT,
      )
      .await?;
    Ok(())
  }

  async fn stop(&self, id: &str) -> Result<()> {
    validate_container_ref(id)?;
    self
      .engine(
        vec!["stop".to_string(), id.to_string()],
        // stop waits out the container's grace period
        Duration::from_secs(30),
      )
      .await?;
    Ok(())
  }

  async fn remove(&self, id: &str) -> Result<()> {
    validate_container_ref(id)?;
    self
      .engine(
        vec!["rm".to_string(), "-f".to_string(), id.to_string()],
        ENGINE_TIMEOUT,
      )
      .await?;
    Ok(())
  }

  async fn list(&self) -> Result<Vec<ContainerDescriptor>> {
    let output = self
      .engine(
        vec![
          "ps".to_string(),
          "-a".to_string(),
          "--format".to_string(),
          "{{json .}}".to_string(),
        ],
        ENGINE_TIMEOUT,
      )
      .await?;
    Ok(parse_ps_output(&output.stdout))
  }

  async fn get_by_name(
    &self,
    name: &str,
  ) -> Result<Option<ContainerDescriptor>> {
    validate_container_ref(name)?;
    let containers = self.list().await?;
    Ok(containers.into_iter().find(|c| c.name == name))
  }

  async fn inspect(&self, id: &str) -> Result<ContainerDescriptor> {
    validate_container_ref(id)?;
    let output = self
      .engine(
        vec!["inspect".to_string(), id.to_string()],
        ENGINE_TIMEOUT,
      )
      .await?;
    parse_inspect_output(&output.stdout)
      .map(|item| item.into_descriptor())
      .ok_or_else(|| {
        ContainerError::new(
          ContainerErrorKind::Unknown,
          format!("unparseable inspect output for {id}"),
        )
      })
  }

  async fn exec(&self, id: &str, argv: &[String]) -> Result<String> {
    validate_container_ref(id)?;
    validate_exec_command(argv)?;
    let mut args = vec!["exec".to_string(), id.to_string()];
    args.extend(argv.iter().cloned());
    let output = self.engine(args, ENGINE_TIMEOUT).await?;
    Ok(output.stdout)
  }

  async fn logs(
    &self,
    id: &str,
    tail: Option<usize>,
  ) -> Result<String> {
    validate_container_ref(id)?;
    let mut args = vec!["logs".to_string()];
    if let Some(tail) = tail {
      args.push("--tail".to_string());
      args.push(tail.to_string());
    }
    args.push(id.to_string());
    let output = self.engine(args, ENGINE_TIMEOUT).await?;
    // the engine writes container stderr to our stderr
    if output.stdout.is_empty() {
      Ok(output.stderr)
    } else if output.stderr.is_empty() {
      Ok(output.stdout)
    } else {
      Ok(format!("{}{}", output.stdout, output.stderr))
    }
  }

  async fn logs_follow(&self, id: &str) -> Result<LogStream> {
    validate_container_ref(id)?;
    let mut cmd = tokio::process::Command::new(&self.binary);
    cmd
      .args(["logs", "-f", "--tail", "0", id])
      .stdin(std::process::Stdio::null())
      .stdout(std::process::Stdio::piped())
      .stderr(std::process::Stdio::piped())
      .kill_on_drop(true);
    let mut child = cmd.spawn().map_err(|e| {
      ContainerError::new(
        crate::classify_engine_failure("", "", Some(&e)),
        format!("failed to spawn log follow: {e}"),
      )
    })?;
    let stdout = ReaderStream::new(child.stdout.take().expect(
      "child stdout is piped",
    ));
    let stderr = ReaderStream::new(child.stderr.take().expect(
      "child stderr is piped",
    ));
    // Moving the child into the closure ties its lifetime to the
    // stream; kill_on_drop reaps it when the stream is dropped.
    let stream = futures::stream::select(stdout, stderr)
      .filter_map(move |res| {
        let _child = &child;
        futures::future::ready(res.ok())
      })
      .boxed();
    Ok(stream)
  }

  async fn copy_to(
    &self,
    id: &str,
    src: &Path,
    dst: &str,
  ) -> Result<()> {
    validate_container_ref(id)?;
    validate_host_path(src)?;
    self
      .engine(
        vec![
          "cp".to_string(),
          src.display().to_string(),
          format!("{id}:{dst}"),
        ],
        Duration::from_secs(60),
      )
      .await?;
    Ok(())
  }

  async fn copy_from(
    &self,
    id: &str,
    src: &str,
    dst: &Path,
  ) -> Result<()> {
    validate_container_ref(id)?;
    validate_host_path(dst)?;
    self
      .engine(
        vec![
          "cp".to_string(),
          format!("{id}:{src}"),
          dst.display().to_string(),
        ],
        Duration::from_secs(60),
      )
      .await?;
    Ok(())
  }

  async fn compose_up(
    &self,
    project: &str,
    compose_file: &Path,
    services: &[String],
  ) -> Result<()> {
    crate::compose::up(self, project, compose_file, services).await
  }

  async fn compose_stop(
    &self,
    project: &str,
    compose_file: &Path,
  ) -> Result<()> {
    crate::compose::stop(self, project, compose_file).await
  }

  async fn compose_ps(
    &self,
    project: &str,
    compose_file: &Path,
  ) -> Result<Vec<String>> {
    crate::compose::ps(self, project, compose_file).await
  }

  async fn health(&self, id: &str) -> Result<HealthStatus> {
    validate_container_ref(id)?;
    let output = self
      .engine(
        vec!["inspect".to_string(), id.to_string()],
        ENGINE_TIMEOUT,
      )
      .await?;
    let Some(item) = parse_inspect_output(&output.stdout) else {
      return Err(ContainerError::new(
        ContainerErrorKind::Unknown,
        format!("unparseable inspect output for {id}"),
      ));
    };
    let running = item.state.status == "running";
    match item.state.health {
      Some(health) => {
        let healthy = health.status == "healthy";
        let error = (!healthy)
          .then(|| {
            health
              .log
              .iter()
              .rev()
              .find(|log| log.exit_code != 0)
              .map(|log| log.output.trim().to_string())
          })
          .flatten();
        Ok(HealthStatus { healthy, error })
      }
      // No healthcheck configured: fall back to the run state.
      None => Ok(HealthStatus {
        healthy: running,
        error: (!running).then(|| {
          format!("container is {}", item.state.status)
        }),
      }),
    }
  }

  async fn attach_pty(
    &self,
    container: &str,
    shell: &str,
    size: TerminalSize,
  ) -> Result<PtyHandle> {
    validate_container_ref(container)?;
    validate_exec_command(&[shell.to_string()])?;
    pty::attach(&self.binary, container, shell, size).await
  }
}

/// Compose helpers live close to the runtime but in their own module.
impl DockerRuntime {
  async fn compose_create(
    &self,
    config: &ContainerConfig,
    compose_file: &str,
  ) -> Result<ContainerDescriptor> {
    let project = if config.environment.is_empty() {
      config.repository.clone()
    } else {
      format!("{}-{}", config.repository, config.environment)
    };
    self
      .compose_up(
        &project,
        Path::new(compose_file),
        &config.services,
      )
      .await?;
    let ids =
      self.compose_ps(&project, Path::new(compose_file)).await?;
    let Some(id) = ids.first() else {
      return Err(ContainerError::new(
        ContainerErrorKind::ConfigError,
        format!("compose project {project} started no containers"),
      ));
    };
    self.inspect(id).await
  }
}
