//! Runtime double for server tests: records invocations, serves
//! canned containers, and can be told to fail specific operations.

use std::{
  path::Path,
  sync::{
    Mutex,
    atomic::{AtomicBool, AtomicUsize, Ordering},
  },
  time::Duration,
};

use async_trait::async_trait;
use futures::StreamExt;
use runtime::{
  ContainerError, ContainerRuntime, HealthStatus, LogStream,
  PtyHandle, Result, TerminalSize,
};
use vibeman_client::entities::container::{
  ContainerConfig, ContainerDescriptor, ContainerErrorKind,
};

#[derive(Default)]
pub struct TestRuntime {
  containers: Mutex<Vec<ContainerDescriptor>>,
  removed: Mutex<Vec<String>>,
  compose_ups: AtomicUsize,
  compose_stops: AtomicUsize,
  fail_compose_up: AtomicBool,
  fail_create: AtomicBool,
  compose_delay: Mutex<Duration>,
  next_id: AtomicUsize,
  log_chunks: Mutex<Vec<bytes::Bytes>>,
}

impl TestRuntime {
  pub fn compose_up_calls(&self) -> usize {
    self.compose_ups.load(Ordering::SeqCst)
  }

  pub fn compose_stop_calls(&self) -> usize {
    self.compose_stops.load(Ordering::SeqCst)
  }

  pub fn fail_compose_up(&self, fail: bool) {
    self.fail_compose_up.store(fail, Ordering::SeqCst);
  }

  pub fn fail_create(&self, fail: bool) {
    self.fail_create.store(fail, Ordering::SeqCst);
  }

  pub fn set_compose_delay(&self, delay: Duration) {
    *self.compose_delay.lock().unwrap() = delay;
  }

  pub fn set_log_chunks(&self, chunks: Vec<bytes::Bytes>) {
    *self.log_chunks.lock().unwrap() = chunks;
  }

  pub fn removed_containers(&self) -> Vec<String> {
    self.removed.lock().unwrap().clone()
  }

  pub fn containers(&self) -> Vec<ContainerDescriptor> {
    self.containers.lock().unwrap().clone()
  }

  pub fn push_container(&self, container: ContainerDescriptor) {
    self.containers.lock().unwrap().push(container);
  }

  fn fresh_id(&self) -> String {
    let n = self.next_id.fetch_add(1, Ordering::SeqCst);
    format!("cid-{n:08}{}", "0".repeat(52))
  }
}

#[async_trait]
impl ContainerRuntime for TestRuntime {
  async fn version(&self) -> Result<String> {
    Ok("0.0-test".to_string())
  }

  async fn create(
    &self,
    config: &ContainerConfig,
  ) -> Result<ContainerDescriptor> {
    if self.fail_create.load(Ordering::SeqCst) {
      return Err(ContainerError::new(
        ContainerErrorKind::ImageNotFound,
        format!("manifest unknown for {}", config.image),
      ));
    }
    let descriptor = ContainerDescriptor {
      id: self.fresh_id(),
      name: config.name.clone(),
      image: config.image.clone(),
      status: "created".to_string(),
      container_type: config.container_type,
      repository: config.repository.clone(),
      environment: config.environment.clone(),
      env_vars: config
        .env_vars
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect(),
      ports: config.ports.clone(),
      created_at: String::new(),
    };
    self.containers.lock().unwrap().push(descriptor.clone());
    Ok(descriptor)
  }

  async fn start(&self, id: &str) -> Result<()> {
    let mut containers = self.containers.lock().unwrap();
    for container in containers.iter_mut() {
      if container.id_matches(id) {
        container.status = "Up 1 second".to_string();
        return Ok(());
      }
    }
    Err(ContainerError::new(
      ContainerErrorKind::ContainerNotFound,
      format!("no such container: {id}"),
    ))
  }

  async fn stop(&self, id: &str) -> Result<()> {
    let mut containers = self.containers.lock().unwrap();
    for container in containers.iter_mut() {
      if container.id_matches(id) {
        container.status = "Exited (0)".to_string();
        return Ok(());
      }
    }
    Err(ContainerError::new(
      ContainerErrorKind::ContainerNotFound,
      format!("no such container: {id}"),
    ))
  }

  async fn remove(&self, id: &str) -> Result<()> {
    self.removed.lock().unwrap().push(id.to_string());
    self
      .containers
      .lock()
      .unwrap()
      .retain(|container| !container.id_matches(id));
    Ok(())
  }

  async fn list(&self) -> Result<Vec<ContainerDescriptor>> {
    Ok(self.containers.lock().unwrap().clone())
  }

  async fn get_by_name(
    &self,
    name: &str,
  ) -> Result<Option<ContainerDescriptor>> {
    Ok(
      self
        .containers
        .lock()
        .unwrap()
        .iter()
        .find(|container| container.name == name)
        .cloned(),
    )
  }

  async fn inspect(&self, id: &str) -> Result<ContainerDescriptor> {
    self
      .containers
      .lock()
      .unwrap()
      .iter()
      .find(|container| container.id_matches(id))
      .cloned()
      .ok_or_else(|| {
        ContainerError::new(
          ContainerErrorKind::ContainerNotFound,
          format!("no such container: {id}"),
        )
      })
  }

  async fn exec(&self, _id: &str, _argv: &[String]) -> Result<String> {
    Ok(String::new())
  }

  async fn logs(
    &self,
    _id: &str,
    _tail: Option<usize>,
  ) -> Result<String> {
    Ok("test log line\n".to_string())
  }

  async fn logs_follow(&self, _id: &str) -> Result<LogStream> {
    let chunks = self.log_chunks.lock().unwrap().clone();
    Ok(
      futures::stream::iter(chunks)
        .chain(futures::stream::pending())
        .boxed(),
    )
  }

  async fn copy_to(
    &self,
    _id: &str,
    _src: &Path,
    _dst: &str,
  ) -> Result<()> {
    Ok(())
  }

  async fn copy_from(
    &self,
    _id: &str,
    _src: &str,
    _dst: &Path,
  ) -> Result<()> {
    Ok(())
  }

  async fn compose_up(
    &self,
    _project: &str,
    _compose_file: &Path,
    _services: &[String],
  ) -> Result<()> {
    let delay = *self.compose_delay.lock().unwrap();
    if !delay.is_zero() {
      tokio::time::sleep(delay).await;
    }
    if self.fail_compose_up.load(Ordering::SeqCst) {
      return Err(ContainerError::new(
        ContainerErrorKind::NetworkError,
        "port is already allocated",
      ));
    }
    self.compose_ups.fetch_add(1, Ordering::SeqCst);
    Ok(())
  }

  async fn compose_stop(
    &self,
    _project: &str,
    _compose_file: &Path,
  ) -> Result<()> {
    self.compose_stops.fetch_add(1, Ordering::SeqCst);
    Ok(())
  }

  async fn compose_ps(
    &self,
    project: &str,
    _compose_file: &Path,
  ) -> Result<Vec<String>> {
    Ok(vec![format!("{project}-container")])
  }

  async fn health(&self, _id: &str) -> Result<HealthStatus> {
    Ok(HealthStatus {
      healthy: true,
      error: None,
    })
  }

  async fn attach_pty(
    &self,
    _container: &str,
    _shell: &str,
    _size: TerminalSize,
  ) -> Result<PtyHandle> {
    Err(ContainerError::new(
      ContainerErrorKind::ExecError,
      "test runtime has no pty",
    ))
  }
}
