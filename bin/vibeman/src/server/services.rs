use std::{
  collections::HashMap, path::Path, sync::Arc, time::Duration,
};

use runtime::ContainerRuntime;
use tokio::sync::{Mutex, MutexGuard, RwLock, watch};
use vibeman_client::entities::{
  config::ServicesConfig,
  error::{Error, ErrorKind},
  service::{ServiceInstance, ServiceStatus},
  vibeman_timestamp,
};

/// How long a caller waits on another task's in-flight transition
/// before giving up.
const TRANSITION_WAIT: Duration = Duration::from_secs(60);

/// Reference-counted lifecycle for the shared backing services
/// declared in services.toml.
///
/// Locking: the manager map lock guards entry creation, each entry's
/// mutex guards its instance. Lock order is always manager then
/// instance, and neither is ever held across a child-process
/// invocation. Tasks waiting out somebody else's `starting` /
/// `stopping` subscribe to the entry's watch channel instead of
/// polling.
pub struct ServiceManager {
  runtime: Arc<dyn ContainerRuntime>,
  configs: ServicesConfig,
  entries: RwLock<HashMap<String, Arc<ServiceEntry>>>,
}

struct ServiceEntry {
  state: Mutex<ServiceInstance>,
  notify: watch::Sender<ServiceStatus>,
}

impl ServiceManager {
  pub fn new(
    runtime: Arc<dyn ContainerRuntime>,
    configs: ServicesConfig,
  ) -> ServiceManager {
    ServiceManager {
      runtime,
      configs,
      entries: RwLock::new(HashMap::new()),
    }
  }

  /// Names of all declared services.
  pub fn declared(&self) -> Vec<String> {
    self.configs.services.keys().cloned().collect()
  }

  /// Ensure the service's container is up, taking one reference.
  /// Concurrent starts collapse into a single compose invocation;
  /// the rest wait for the transition and take their reference once
  /// `running`.
  #[instrument(level = "debug", skip(self))]
  pub async fn start_service(
    &self,
    name: &str,
  ) -> Result<ServiceInstance, Error> {
    let entry = self.entry(name).await?;
    loop {
      let mut state = entry.state.lock().await;
      match state.status {
        ServiceStatus::Running => {
          state.ref_count += 1;
          return Ok(state.clone());
        }
        ServiceStatus::Starting | ServiceStatus::Stopping => {
          Self::wait_for_transition(&entry, state).await?;
        }
        ServiceStatus::Stopped | ServiceStatus::Error => {
          state.status = ServiceStatus::Starting;
          state.health_error = None;
          let config = state.config.clone();
          let _ = entry.notify.send(ServiceStatus::Starting);
          drop(state);

          let res = self.compose_start(name, &config).await;

          let mut state = entry.state.lock().await;
          match res {
            Ok(container_id) => {
              state.status = ServiceStatus::Running;
              state.container_id = Some(container_id);
              state.start_time = Some(vibeman_timestamp());
              state.ref_count += 1;
              let _ = entry.notify.send(ServiceStatus::Running);
              info!("service {name} started");
              return Ok(state.clone());
            }
            Err(e) => {
              state.status = ServiceStatus::Error;
              state.health_error = Some(e.to_string());
              let _ = entry.notify.send(ServiceStatus::Error);
              return Err(Error::new(
                ErrorKind::ServiceError,
                format!("failed to start service {name}: {e}"),
              ));
            }
          }
        }
      }
    }
  }

  /// Release one reference; the last one out stops the container.
  #[instrument(level = "debug", skip(self))]
  pub async fn stop_service(
    &self,
    name: &str,
  ) -> Result<ServiceInstance, Error> {
    let entry = self.existing_entry(name).await?;
    loop {
      let mut state = entry.state.lock().await;
      match state.status {
        ServiceStatus::Stopped => {
          return Err(Error::invalid_state(format!(
            "service {name} is not running"
          )));
        }
        ServiceStatus::Starting | ServiceStatus::Stopping => {
          Self::wait_for_transition(&entry, state).await?;
        }
        ServiceStatus::Running | ServiceStatus::Error => {
          if state.ref_count > 1 {
            state.ref_count -= 1;
            return Ok(state.clone());
          }
          state.ref_count = 0;
          return self.shutdown_entry(name, &entry, state).await;
        }
      }
    }
  }

  /// Take an explicit repository reference. Idempotent per
  /// `(service, repo)`: a repeat call changes nothing, including the
  /// counter.
  pub async fn add_reference(
    &self,
    name: &str,
    repo: &str,
  ) -> Result<ServiceInstance, Error> {
    let entry = self.entry(name).await?;
    let mut state = entry.state.lock().await;
    if state.repositories.insert(repo.to_string()) {
      state.ref_count += 1;
    }
    Ok(state.clone())
  }

  /// Drop a repository's reference. Fails when the repo holds none.
  /// Dropping the last reference stops the service.
  pub async fn remove_reference(
    &self,
    name: &str,
    repo: &str,
  ) -> Result<ServiceInstance, Error> {
    let entry = self.existing_entry(name).await?;
    let mut state = entry.state.lock().await;
    if !state.repositories.remove(repo) {
      return Err(Error::invalid_state(format!(
        "repository {repo} holds no reference on service {name}"
      )));
    }
    state.ref_count = state.ref_count.saturating_sub(1);
    if state.ref_count == 0
      && state.status == ServiceStatus::Running
    {
      return self.shutdown_entry(name, &entry, state).await;
    }
    Ok(state.clone())
  }

  /// Probe the service's container health and record the result.
  pub async fn health_check(
    &self,
    name: &str,
  ) -> Result<runtime::HealthStatus, Error> {
    let entry = self.existing_entry(name).await?;
    let container_id = {
      let state = entry.state.lock().await;
      state.container_id.clone()
    };
    let Some(container_id) = container_id else {
      return Err(Error::invalid_state(format!(
        "service {name} has no container"
      )));
    };
    let health = self
      .runtime
      .health(&container_id)
      .await
      .map_err(|e| Error::new(ErrorKind::ServiceError, e.to_string()))?;
    let mut state = entry.state.lock().await;
    state.last_health = Some(vibeman_timestamp());
    state.health_error = health.error.clone();
    Ok(health)
  }

  /// Snapshot of one service. Declared-but-never-touched services
  /// report as stopped.
  pub async fn get_service(
    &self,
    name: &str,
  ) -> Option<ServiceInstance> {
    if let Some(entry) = self.entries.read().await.get(name) {
      return Some(entry.state.lock().await.clone());
    }
    let config = self.configs.services.get(name)?;
    Some(ServiceInstance {
      name: name.to_string(),
      config: config.clone(),
      ..Default::default()
    })
  }

  /// Snapshots of every declared service.
  pub async fn list_services(&self) -> Vec<ServiceInstance> {
    let mut services = Vec::new();
    for name in self.configs.services.keys() {
      if let Some(service) = self.get_service(name).await {
        services.push(service);
      }
    }
    services
  }

  // INNER

  /// Stop the container and finalize the instance. `state` must
  /// already have its references drained.
  async fn shutdown_entry(
    &self,
    name: &str,
    entry: &Arc<ServiceEntry>,
    mut state: MutexGuard<'_, ServiceInstance>,
  ) -> Result<ServiceInstance, Error> {
    state.status = ServiceStatus::Stopping;
    let config = state.config.clone();
    let _ = entry.notify.send(ServiceStatus::Stopping);
    drop(state);

    let res = self
      .runtime
      .compose_stop(
        &project_name(name),
        Path::new(&config.compose_file),
      )
      .await;

    let mut state = entry.state.lock().await;
    match res {
      Ok(()) => {
        state.status = ServiceStatus::Stopped;
        state.container_id = None;
        state.repositories.clear();
        state.start_time = None;
        let _ = entry.notify.send(ServiceStatus::Stopped);
        info!("service {name} stopped");
        Ok(state.clone())
      }
      Err(e) => {
        // keep container_id so an operator can reconcile
        state.status = ServiceStatus::Error;
        state.health_error = Some(e.to_string());
        let _ = entry.notify.send(ServiceStatus::Error);
        Err(Error::new(
          ErrorKind::ServiceError,
          format!("failed to stop service {name}: {e}"),
        ))
      }
    }
  }

  async fn compose_start(
    &self,
    name: &str,
    config: &vibeman_client::entities::service::ServiceConfig,
  ) -> anyhow::Result<String> {
    let project = project_name(name);
    let compose_file = Path::new(&config.compose_file);
    self
      .runtime
      .compose_up(
        &project,
        compose_file,
        std::slice::from_ref(&config.service),
      )
      .await?;
    let ids =
      self.runtime.compose_ps(&project, compose_file).await?;
    ids
      .into_iter()
      .next()
      .ok_or_else(|| {
        anyhow::anyhow!(
          "compose started no container for service {name}"
        )
      })
  }

  /// Wait (bounded) for someone else's transition to finish. Takes
  /// the held lock to subscribe without a gap.
  async fn wait_for_transition(
    entry: &Arc<ServiceEntry>,
    state: MutexGuard<'_, ServiceInstance>,
  ) -> Result<(), Error> {
    let name = state.name.clone();
    let mut rx = entry.notify.subscribe();
    drop(state);
    tokio::time::timeout(TRANSITION_WAIT, rx.changed())
      .await
      .map_err(|_| {
        Error::new(
          ErrorKind::ServiceError,
          format!(
            "timed out waiting for service {name} transition"
          ),
        )
      })?
      .map_err(|_| {
        Error::new(
          ErrorKind::ServiceError,
          format!("service {name} entry dropped mid-transition"),
        )
      })
  }

  /// Existing entry or lazily construct one from the declaration.
  async fn entry(
    &self,
    name: &str,
  ) -> Result<Arc<ServiceEntry>, Error> {
    if let Some(entry) = self.entries.read().await.get(name) {
      return Ok(entry.clone());
    }
    let Some(config) = self.configs.services.get(name) else {
      return Err(Error::not_found("service", name));
    };
    let mut entries = self.entries.write().await;
    // raced with another creator
    if let Some(entry) = entries.get(name) {
      return Ok(entry.clone());
    }
    let entry = Arc::new(ServiceEntry {
      state: Mutex::new(ServiceInstance {
        name: name.to_string(),
        config: config.clone(),
        ..Default::default()
      }),
      notify: watch::channel(ServiceStatus::Stopped).0,
    });
    entries.insert(name.to_string(), entry.clone());
    Ok(entry)
  }

  /// Entry that must already exist (or at least be declared).
  async fn existing_entry(
    &self,
    name: &str,
  ) -> Result<Arc<ServiceEntry>, Error> {
    if let Some(entry) = self.entries.read().await.get(name) {
      return Ok(entry.clone());
    }
    if self.configs.services.contains_key(name) {
      return Err(Error::invalid_state(format!(
        "service {name} is not running"
      )));
    }
    Err(Error::not_found("service", name))
  }
}

/// Compose project namespace for shared services, keeping them apart
/// from per-worktree projects.
fn project_name(service: &str) -> String {
  format!("vibeman-{service}")
}

#[cfg(test)]
mod tests {
  use vibeman_client::entities::{
    error::ErrorKind, service::ServiceConfig,
  };

  use super::*;
  use crate::server::test_support::TestRuntime;

  fn manager_with(
    runtime: Arc<TestRuntime>,
    names: &[&str],
  ) -> ServiceManager {
    let mut configs = ServicesConfig::default();
    for name in names {
      configs.services.insert((*name).to_string(), ServiceConfig {
        compose_file: "/srv/services/compose.yaml".to_string(),
        service: (*name).to_string(),
        description: String::new(),
      });
    }
    ServiceManager::new(runtime, configs)
  }

  #[tokio::test]
  async fn reference_counting_scenario() {
    let runtime = Arc::new(TestRuntime::default());
    let manager = manager_with(runtime.clone(), &["postgres"]);

    let svc = manager.start_service("postgres").await.unwrap();
    assert_eq!(svc.status, ServiceStatus::Running);
    assert_eq!(svc.ref_count, 1);
    assert!(svc.container_id.is_some());

    let svc =
      manager.add_reference("postgres", "r1").await.unwrap();
    assert_eq!(svc.ref_count, 2);
    let svc =
      manager.add_reference("postgres", "r2").await.unwrap();
    assert_eq!(svc.ref_count, 3);
    assert_eq!(svc.repositories.len(), 2);

    let svc =
      manager.remove_reference("postgres", "r1").await.unwrap();
    assert_eq!(svc.ref_count, 2);
    let svc =
      manager.remove_reference("postgres", "r2").await.unwrap();
    assert_eq!(svc.ref_count, 1);

    let svc = manager.stop_service("postgres").await.unwrap();
    assert_eq!(svc.status, ServiceStatus::Stopped);
    assert_eq!(svc.ref_count, 0);
    assert!(svc.container_id.is_none());
    assert!(svc.repositories.is_empty());
  }

  #[tokio::test]
  async fn duplicate_add_reference_is_a_no_op() {
    let runtime = Arc::new(TestRuntime::default());
    let manager = manager_with(runtime, &["redis"]);

    manager.add_reference("redis", "r1").await.unwrap();
    let svc = manager.add_reference("redis", "r1").await.unwrap();
    assert_eq!(svc.ref_count, 1);
    assert_eq!(svc.repositories.len(), 1);
  }

  #[tokio::test]
  async fn concurrent_distinct_references() {
    let runtime = Arc::new(TestRuntime::default());
    let manager =
      Arc::new(manager_with(runtime, &["postgres"]));

    let mut handles = Vec::new();
    for i in 0..16 {
      let manager = manager.clone();
      handles.push(tokio::spawn(async move {
        manager
          .add_reference("postgres", &format!("repo-{i}"))
          .await
          .unwrap();
      }));
    }
    for handle in handles {
      handle.await.unwrap();
    }
    let svc = manager.get_service("postgres").await.unwrap();
    assert_eq!(svc.ref_count, 16);
    assert_eq!(svc.repositories.len(), 16);
  }

  #[tokio::test]
  async fn concurrent_starts_collapse_to_one_compose() {
    let runtime = Arc::new(TestRuntime::default());
    runtime.set_compose_delay(Duration::from_millis(50));
    let manager =
      Arc::new(manager_with(runtime.clone(), &["postgres"]));

    let mut handles = Vec::new();
    for _ in 0..8 {
      let manager = manager.clone();
      handles.push(tokio::spawn(async move {
        manager.start_service("postgres").await.unwrap()
      }));
    }
    for handle in handles {
      let svc = handle.await.unwrap();
      assert_eq!(svc.status, ServiceStatus::Running);
    }
    assert_eq!(runtime.compose_up_calls(), 1);
    let svc = manager.get_service("postgres").await.unwrap();
    assert_eq!(svc.ref_count, 8);
  }

  #[tokio::test]
  async fn unknown_service_is_not_found() {
    let runtime = Arc::new(TestRuntime::default());
    let manager = manager_with(runtime, &["postgres"]);
    let err = manager.start_service("mystery").await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);
  }

  #[tokio::test]
  async fn stop_of_stopped_service_is_invalid_state() {
    let runtime = Arc::new(TestRuntime::default());
    let manager = manager_with(runtime, &["postgres"]);
    let err = manager.stop_service("postgres").await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidState);
  }

  #[tokio::test]
  async fn removing_last_reference_stops_the_service() {
    let runtime = Arc::new(TestRuntime::default());
    let manager = manager_with(runtime, &["redis"]);

    manager.start_service("redis").await.unwrap();
    manager.add_reference("redis", "r1").await.unwrap();
    // drop the implicit start ref, r1 still holds one
    let svc = manager.stop_service("redis").await.unwrap();
    assert_eq!(svc.status, ServiceStatus::Running);
    assert_eq!(svc.ref_count, 1);

    let svc = manager.remove_reference("redis", "r1").await.unwrap();
    assert_eq!(svc.status, ServiceStatus::Stopped);
    assert_eq!(svc.ref_count, 0);
  }

  #[tokio::test]
  async fn start_failure_lands_in_error_state() {
    let runtime = Arc::new(TestRuntime::default());
    runtime.fail_compose_up(true);
    let manager = manager_with(runtime.clone(), &["postgres"]);

    let err = manager.start_service("postgres").await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::ServiceError);
    let svc = manager.get_service("postgres").await.unwrap();
    assert_eq!(svc.status, ServiceStatus::Error);
    assert!(svc.health_error.is_some());

    // explicit start leaves the error state
    runtime.fail_compose_up(false);
    let svc = manager.start_service("postgres").await.unwrap();
    assert_eq!(svc.status, ServiceStatus::Running);
  }
}
