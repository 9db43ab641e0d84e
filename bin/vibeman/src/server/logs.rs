use std::{
  collections::HashMap,
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context;
use futures::StreamExt;
use runtime::ContainerRuntime;
use tokio::{fs, io::AsyncWriteExt, sync::RwLock};
use tokio_util::sync::CancellationToken;
use vibeman_client::entities::container::ContainerDescriptor;

/// Streams every worktree container's logs into the per-worktree log
/// tree:
///
/// ```text
/// <logs_root>/<repo>/<worktree>/<type>-<name>.log
/// <logs_root>/<repo>/<worktree>/aggregated/{*.log -> .., README.md}
/// ```
///
/// Each stream is a cancellable task keyed `<container_id>-<name>`;
/// stopping a worktree cancels exactly the keys carrying its
/// containers' names.
pub struct LogAggregator {
  runtime: Arc<dyn ContainerRuntime>,
  logs_root: PathBuf,
  streams: RwLock<HashMap<String, StreamEntry>>,
}

struct StreamEntry {
  token: CancellationToken,
  container_name: String,
}

impl LogAggregator {
  pub fn new(
    runtime: Arc<dyn ContainerRuntime>,
    logs_root: PathBuf,
  ) -> LogAggregator {
    LogAggregator {
      runtime,
      logs_root,
      streams: RwLock::new(HashMap::new()),
    }
  }

  pub fn worktree_dir(&self, repo: &str, worktree: &str) -> PathBuf {
    self.logs_root.join(repo).join(worktree)
  }

  /// Begin streaming logs for every container belonging to the
  /// worktree (name prefix `<repo>-<worktree>`). Containers that
  /// appear later are picked up by calling this again; containers
  /// that vanished since the last call just end their streams.
  #[instrument(level = "debug", skip(self))]
  pub async fn start_log_aggregation(
    &self,
    repo: &str,
    worktree: &str,
  ) -> anyhow::Result<()> {
    let dir = self.worktree_dir(repo, worktree);
    fs::create_dir_all(&dir).await.with_context(|| {
      format!("failed to initialize log directory {dir:?}")
    })?;

    let prefix = format!("{repo}-{worktree}");
    let containers = self
      .runtime
      .list()
      .await
      .context("failed to list containers for log aggregation")?;

    for container in containers {
      if !container.name.starts_with(&prefix) {
        continue;
      }
      self.stream_container(&dir, &container).await;
    }
    Ok(())
  }

  /// Cancel exactly the streams whose key contains one of the
  /// worktree's container names.
  #[instrument(level = "debug", skip(self))]
  pub async fn stop_log_aggregation(
    &self,
    repo: &str,
    worktree: &str,
  ) {
    let prefix = format!("{repo}-{worktree}");
    let mut streams = self.streams.write().await;
    streams.retain(|_, entry| {
      let matches = entry.container_name.starts_with(&prefix);
      if matches {
        entry.token.cancel();
      }
      !matches
    });
  }

  /// How many streams are currently live (for status reporting and
  /// the tests).
  pub async fn active_streams(&self) -> usize {
    self.streams.read().await.len()
  }

  /// Build the `aggregated/` view the AI container mounts: one
  /// symlink per log file plus a README describing the layout.
  pub async fn aggregate_for_ai_container(
    &self,
    repo: &str,
    worktree: &str,
  ) -> anyhow::Result<()> {
    let dir = self.worktree_dir(repo, worktree);
    let aggregated = dir.join("aggregated");
    fs::create_dir_all(&aggregated).await.with_context(|| {
      format!(
        "failed to initialize aggregated log directory {aggregated:?}"
      )
    })?;

    let mut log_files = Vec::new();
    let mut entries = fs::read_dir(&dir)
      .await
      .with_context(|| format!("failed to read {dir:?}"))?;
    while let Some(entry) = entries.next_entry().await? {
      let name = entry.file_name();
      let name = name.to_string_lossy().to_string();
      if !name.ends_with(".log") {
        continue;
      }
      let link = aggregated.join(&name);
      if fs::symlink_metadata(&link).await.is_ok() {
        fs::remove_file(&link).await.ok();
      }
      std::os::unix::fs::symlink(
        Path::new("..").join(&name),
        &link,
      )
      .with_context(|| {
        format!("failed to symlink {name} into {aggregated:?}")
      })?;
      log_files.push(name);
    }
    log_files.sort();

    let mut readme = format!(
      "# Aggregated logs for {repo}/{worktree}\n\n\
      Generated at {}.\n\n\
      Each file here is a symlink to the live log stream of one\n\
      container belonging to this worktree. Inside the AI container\n\
      this directory is mounted at /logs.\n\n",
      iso_timestamp(),
    );
    if log_files.is_empty() {
      readme.push_str("No log files yet.\n");
    } else {
      for file in &log_files {
        readme.push_str(&format!("- {file}\n"));
      }
    }
    fs::write(aggregated.join("README.md"), readme)
      .await
      .context("failed to write aggregated README")?;
    Ok(())
  }

  /// Spawn the cancellable follow task for one container, unless one
  /// is already live.
  async fn stream_container(
    &self,
    dir: &Path,
    container: &ContainerDescriptor,
  ) {
    let key = format!("{}-{}", container.id, container.name);
    let mut streams = self.streams.write().await;
    if streams.contains_key(&key) {
      return;
    }
    let token = CancellationToken::new();
    streams.insert(key, StreamEntry {
      token: token.clone(),
      container_name: container.name.clone(),
    });
    drop(streams);

    let file_path = dir.join(format!(
      "{}-{}.log",
      container.container_type, container.name
    ));
    let runtime = self.runtime.clone();
    let id = container.id.clone();

    tokio::spawn(async move {
      if let Err(e) =
        follow_into_file(runtime, &id, &file_path, token).await
      {
        warn!("log stream for {id} ended with error: {e:#}");
      }
    });
  }
}

async fn follow_into_file(
  runtime: Arc<dyn ContainerRuntime>,
  id: &str,
  file_path: &Path,
  token: CancellationToken,
) -> anyhow::Result<()> {
  let mut file = fs::OpenOptions::new()
    .create(true)
    .append(true)
    .open(file_path)
    .await
    .with_context(|| {
      format!("failed to open log file {file_path:?}")
    })?;

  file
    .write_all(
      format!("===== log stream started {} =====\n", iso_timestamp())
        .as_bytes(),
    )
    .await?;

  let mut stream = runtime
    .logs_follow(id)
    .await
    .context("failed to start log follow")?;

  loop {
    tokio::select! {
      chunk = stream.next() => match chunk {
        Some(bytes) => {
          if let Err(e) = file.write_all(&bytes).await {
            warn!("failed to append container log: {e}");
            break;
          }
        }
        // container went away; tolerated, a later aggregation
        // restart picks it back up
        None => break,
      },
      _ = token.cancelled() => break,
    }
  }

  file
    .write_all(
      format!("===== log stream stopped {} =====\n", iso_timestamp())
        .as_bytes(),
    )
    .await?;
  file.flush().await?;
  Ok(())
}

fn iso_timestamp() -> String {
  chrono::Utc::now().to_rfc3339_opts(
    chrono::SecondsFormat::Secs,
    true,
  )
}

#[cfg(test)]
mod tests {
  use bytes::Bytes;
  use vibeman_client::entities::container::ContainerType;

  use super::*;
  use crate::server::test_support::TestRuntime;

  fn container(
    id: &str,
    name: &str,
    container_type: ContainerType,
  ) -> ContainerDescriptor {
    ContainerDescriptor {
      id: id.to_string(),
      name: name.to_string(),
      status: "Up 1 minute".to_string(),
      container_type,
      ..Default::default()
    }
  }

  #[tokio::test]
  async fn streams_worktree_containers_into_files() {
    let dir = tempfile::tempdir().unwrap();
    let runtime = Arc::new(TestRuntime::default());
    runtime.set_log_chunks(vec![
      Bytes::from_static(b"line one\n"),
      Bytes::from_static(b"line two\n"),
    ]);
    runtime
      .push_container(container("aaa111", "api-feature-x", ContainerType::Worktree));
    runtime.push_container(container(
      "bbb222",
      "api-feature-x-ai",
      ContainerType::Ai,
    ));
    // belongs to another worktree, must be ignored
    runtime.push_container(container(
      "ccc333",
      "api-other",
      ContainerType::Worktree,
    ));

    let aggregator = LogAggregator::new(
      runtime.clone(),
      dir.path().to_path_buf(),
    );
    aggregator
      .start_log_aggregation("api", "feature-x")
      .await
      .unwrap();
    assert_eq!(aggregator.active_streams().await, 2);

    // let the follow tasks write
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    let log_dir = dir.path().join("api").join("feature-x");
    let worktree_log = std::fs::read_to_string(
      log_dir.join("worktree-api-feature-x.log"),
    )
    .unwrap();
    assert!(worktree_log.contains("log stream started"));
    assert!(worktree_log.contains("line one"));
    assert!(worktree_log.contains("line two"));
    assert!(log_dir.join("ai-api-feature-x-ai.log").exists());
    assert!(!log_dir.join("worktree-api-other.log").exists());

    aggregator.stop_log_aggregation("api", "feature-x").await;
    assert_eq!(aggregator.active_streams().await, 0);

    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    let worktree_log = std::fs::read_to_string(
      log_dir.join("worktree-api-feature-x.log"),
    )
    .unwrap();
    assert!(worktree_log.contains("log stream stopped"));
  }

  #[tokio::test]
  async fn stop_only_cancels_the_named_worktree() {
    let dir = tempfile::tempdir().unwrap();
    let runtime = Arc::new(TestRuntime::default());
    runtime
      .push_container(container("aaa111", "api-one", ContainerType::Worktree));
    runtime
      .push_container(container("bbb222", "api-two", ContainerType::Worktree));

    let aggregator = LogAggregator::new(
      runtime.clone(),
      dir.path().to_path_buf(),
    );
    aggregator.start_log_aggregation("api", "one").await.unwrap();
    aggregator.start_log_aggregation("api", "two").await.unwrap();
    assert_eq!(aggregator.active_streams().await, 2);

    aggregator.stop_log_aggregation("api", "one").await;
    assert_eq!(aggregator.active_streams().await, 1);
  }

  #[tokio::test]
  async fn aggregated_view_links_and_readme() {
    let dir = tempfile::tempdir().unwrap();
    let runtime = Arc::new(TestRuntime::default());
    let aggregator = LogAggregator::new(
      runtime.clone(),
      dir.path().to_path_buf(),
    );
    let log_dir = dir.path().join("api").join("feature-x");
    std::fs::create_dir_all(&log_dir).unwrap();
    std::fs::write(
      log_dir.join("worktree-api-feature-x.log"),
      "hello\n",
    )
    .unwrap();
    std::fs::write(
      log_dir.join("ai-api-feature-x-ai.log"),
      "ai hello\n",
    )
    .unwrap();

    aggregator
      .aggregate_for_ai_container("api", "feature-x")
      .await
      .unwrap();

    let aggregated = log_dir.join("aggregated");
    let linked = std::fs::read_to_string(
      aggregated.join("worktree-api-feature-x.log"),
    )
    .unwrap();
    assert_eq!(linked, "hello\n");
    let readme =
      std::fs::read_to_string(aggregated.join("README.md")).unwrap();
    assert!(readme.contains("api/feature-x"));
    assert!(readme.contains("ai-api-feature-x-ai.log"));

    // idempotent
    aggregator
      .aggregate_for_ai_container("api", "feature-x")
      .await
      .unwrap();
  }
}
