use std::{process::Stdio, time::Duration};

use vibeman_client::entities::container::ContainerErrorKind;

use crate::{ContainerError, classify_engine_failure};

/// Default timeout for short engine calls (inspect / ps / exec).
pub(crate) const ENGINE_TIMEOUT: Duration = Duration::from_secs(10);
/// Compose up waits a little longer for containers to come up.
pub(crate) const COMPOSE_UP_TIMEOUT: Duration =
  Duration::from_secs(30);

#[derive(Debug, Clone, Default)]
pub(crate) struct InvokeOutput {
  pub stdout: String,
  pub stderr: String,
}

/// Spawn the engine binary with an explicit argv. Never goes through
/// a shell. Non-zero exits come back classified; the child is killed
/// if the timeout elapses.
pub(crate) async fn spawn_engine(
  program: &str,
  args: &[String],
  timeout: Duration,
) -> Result<InvokeOutput, ContainerError> {
  trace!("engine invocation: {program} {}", args.join(" "));
  let mut cmd = tokio::process::Command::new(program);
  cmd
    .args(args)
    .stdin(Stdio::null())
    .stdout(Stdio::piped())
    .stderr(Stdio::piped())
    .kill_on_drop(true);

  let output = match tokio::time::timeout(timeout, cmd.output())
    .await
  {
    Ok(Ok(output)) => output,
    Ok(Err(e)) => {
      return Err(ContainerError::new(
        classify_engine_failure("", "", Some(&e)),
        format!("failed to spawn {program}: {e}"),
      ));
    }
    Err(_) => {
      return Err(ContainerError::new(
        ContainerErrorKind::Unknown,
        format!(
          "{program} {} timed out after {}s",
          args.first().map(String::as_str).unwrap_or_default(),
          timeout.as_secs()
        ),
      ));
    }
  };

  let stdout = String::from_utf8_lossy(&output.stdout).to_string();
  let stderr = String::from_utf8_lossy(&output.stderr).to_string();

  if output.status.success() {
    Ok(InvokeOutput { stdout, stderr })
  } else {
    let kind = classify_engine_failure(&stdout, &stderr, None);
    let message = if stderr.trim().is_empty() {
      stdout.trim().to_string()
    } else {
      stderr.trim().to_string()
    };
    Err(ContainerError::new(kind, message))
  }
}
