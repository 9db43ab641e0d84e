//! # Vibeman Runtime
//!
//! Typed facade over the container engine CLI. Every operation spawns
//! the engine binary as a child process with an explicit argv (never
//! through a shell), parses its output, and classifies failures into
//! the [ContainerError] taxonomy. The [ContainerRuntime] trait is the
//! seam the rest of the system programs against; tests inject a
//! double, production wires up [DockerRuntime].

#[macro_use]
extern crate tracing;

use std::path::Path;

use async_trait::async_trait;
use vibeman_client::entities::container::{
  ContainerConfig, ContainerDescriptor,
};

mod compose;
mod docker;
mod error;
mod invoke;
mod parse;
mod pool;
mod pty;
mod validate;

pub use docker::DockerRuntime;
pub use error::{ContainerError, classify_engine_failure};
pub use pool::ExecPool;
pub use pty::{PtyHandle, PtyInput, PtyOutput, TerminalSize};
pub use validate::{
  validate_container_ref, validate_exec_command,
  validate_host_path, validate_port_mapping,
};

pub type Result<T> = std::result::Result<T, ContainerError>;

/// A live byte stream of one container's log output.
pub type LogStream =
  futures::stream::BoxStream<'static, bytes::Bytes>;

/// Container health probe result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HealthStatus {
  /// False when the engine reports unhealthy, or no healthcheck is
  /// configured at all.
  pub healthy: bool,
  pub error: Option<String>,
}

/// The operations the control plane needs from the container engine.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
  /// Probe that the engine is installed and responding.
  async fn version(&self) -> Result<String>;

  async fn create(
    &self,
    config: &ContainerConfig,
  ) -> Result<ContainerDescriptor>;

  async fn start(&self, id: &str) -> Result<()>;

  async fn stop(&self, id: &str) -> Result<()>;

  async fn remove(&self, id: &str) -> Result<()>;

  /// All containers known to the engine. Ids may be truncated.
  async fn list(&self) -> Result<Vec<ContainerDescriptor>>;

  async fn get_by_name(
    &self,
    name: &str,
  ) -> Result<Option<ContainerDescriptor>>;

  async fn inspect(&self, id: &str) -> Result<ContainerDescriptor>;

  /// Run a command inside the container, returning combined output.
  async fn exec(&self, id: &str, argv: &[String]) -> Result<String>;

  /// Recent log contents, optionally limited to the last `tail`
  /// lines.
  async fn logs(
    &self,
    id: &str,
    tail: Option<usize>,
  ) -> Result<String>;

  /// Follow the container's logs until cancelled.
  async fn logs_follow(&self, id: &str) -> Result<LogStream>;

  async fn copy_to(
    &self,
    id: &str,
    src: &Path,
    dst: &str,
  ) -> Result<()>;

  async fn copy_from(
    &self,
    id: &str,
    src: &str,
    dst: &Path,
  ) -> Result<()>;

  /// `compose up -d` under `project`, limited to `services` when
  /// non-empty (with dependencies skipped).
  async fn compose_up(
    &self,
    project: &str,
    compose_file: &Path,
    services: &[String],
  ) -> Result<()>;

  async fn compose_stop(
    &self,
    project: &str,
    compose_file: &Path,
  ) -> Result<()>;

  /// Container ids of the project's services.
  async fn compose_ps(
    &self,
    project: &str,
    compose_file: &Path,
  ) -> Result<Vec<String>>;

  /// Health state from the engine's healthcheck reporting.
  async fn health(&self, id: &str) -> Result<HealthStatus>;

  /// Interactive PTY attached to a shell inside the container.
  async fn attach_pty(
    &self,
    container: &str,
    shell: &str,
    size: TerminalSize,
  ) -> Result<PtyHandle>;
}
