use thiserror::Error;
use vibeman_client::entities::container::ContainerErrorKind;

/// A classified engine failure. The kind drives HTTP mapping and
/// retry decisions; the message carries the engine's own words.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ContainerError {
  pub kind: ContainerErrorKind,
  pub message: String,
}

impl ContainerError {
  pub fn new(
    kind: ContainerErrorKind,
    message: impl Into<String>,
  ) -> ContainerError {
    ContainerError {
      kind,
      message: message.into(),
    }
  }

  pub fn is_retryable(&self) -> bool {
    self.kind.is_retryable()
  }

  pub(crate) fn context(
    mut self,
    context: impl std::fmt::Display,
  ) -> ContainerError {
    self.message = format!("{context} | {}", self.message);
    self
  }
}

impl From<ContainerError>
  for vibeman_client::entities::error::Error
{
  fn from(e: ContainerError) -> Self {
    vibeman_client::entities::error::Error::new(
      vibeman_client::entities::error::ErrorKind::ContainerError(
        e.kind,
      ),
      e.message,
    )
  }
}

/// Classify an engine failure by keyword. The engine only speaks
/// through exit codes and text, so this is a keyword match over the
/// combined stdout/stderr plus the OS error from spawning.
pub fn classify_engine_failure(
  stdout: &str,
  stderr: &str,
  os_error: Option<&std::io::Error>,
) -> ContainerErrorKind {
  if let Some(os_error) = os_error {
    return match os_error.kind() {
      std::io::ErrorKind::NotFound => {
        ContainerErrorKind::RuntimeNotFound
      }
      std::io::ErrorKind::PermissionDenied => {
        ContainerErrorKind::PermissionDenied
      }
      _ => ContainerErrorKind::Unknown,
    };
  }

  let combined =
    format!("{stdout}\n{stderr}").to_ascii_lowercase();

  if combined.contains("no such container")
    || combined.contains("is not running")
  {
    ContainerErrorKind::ContainerNotFound
  } else if combined.contains("no such image")
    || combined.contains("pull access denied")
    || combined.contains("manifest unknown")
    || combined.contains("repository does not exist")
    || combined.contains("manifest for")
  {
    ContainerErrorKind::ImageNotFound
  } else if combined.contains("permission denied")
    || combined.contains("access denied")
    || combined.contains("operation not permitted")
  {
    ContainerErrorKind::PermissionDenied
  } else if combined.contains("port is already allocated")
    || combined.contains("address already in use")
    || combined.contains("network")
    || combined.contains("failed to bind")
  {
    ContainerErrorKind::NetworkError
  } else if combined.contains("volume")
    || combined.contains("mount")
  {
    ContainerErrorKind::VolumeError
  } else if combined.contains("is already in use by container")
    || combined.contains("conflict")
    || combined.contains("invalid reference format")
    || combined.contains("must be specified")
    || combined.contains("unknown flag")
  {
    ContainerErrorKind::ConfigError
  } else if combined.contains("exec failed")
    || combined.contains("executable file not found")
  {
    ContainerErrorKind::ExecError
  } else if combined
    .contains("cannot connect to the docker daemon")
    || combined.contains("is the docker daemon running")
  {
    ContainerErrorKind::RuntimeNotFound
  } else {
    ContainerErrorKind::Unknown
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn classification_table() {
    let cases = [
      (
        "Error response from daemon: No such container: foo",
        ContainerErrorKind::ContainerNotFound,
      ),
      (
        "Unable to find image 'ghost:nope' locally\ndocker: Error response from daemon: manifest unknown",
        ContainerErrorKind::ImageNotFound,
      ),
      (
        "docker: permission denied while trying to connect to the Docker daemon socket",
        ContainerErrorKind::PermissionDenied,
      ),
      (
        "Error starting userland proxy: listen tcp4 0.0.0.0:5432: bind: port is already allocated",
        ContainerErrorKind::NetworkError,
      ),
      (
        "Error response from daemon: create bad/vol: volume name is invalid",
        ContainerErrorKind::VolumeError,
      ),
      (
        "Error response from daemon: Conflict. The container name \"/db\" is already in use by container",
        ContainerErrorKind::ConfigError,
      ),
      (
        "OCI runtime exec failed: exec failed: unable to start container process",
        ContainerErrorKind::ExecError,
      ),
      (
        "Cannot connect to the Docker daemon at unix:///var/run/docker.sock. Is the docker daemon running?",
        ContainerErrorKind::RuntimeNotFound,
      ),
      ("some novel failure", ContainerErrorKind::Unknown),
    ];
    for (stderr, expected) in cases {
      assert_eq!(
        classify_engine_failure("", stderr, None),
        expected,
        "stderr: {stderr}"
      );
    }
  }

  #[test]
  fn os_error_classification() {
    let missing = std::io::Error::from(std::io::ErrorKind::NotFound);
    assert_eq!(
      classify_engine_failure("", "", Some(&missing)),
      ContainerErrorKind::RuntimeNotFound
    );
    let denied =
      std::io::Error::from(std::io::ErrorKind::PermissionDenied);
    assert_eq!(
      classify_engine_failure("", "", Some(&denied)),
      ContainerErrorKind::PermissionDenied
    );
  }

  #[test]
  fn retryable_kinds() {
    assert!(
      ContainerError::new(
        ContainerErrorKind::NetworkError,
        "port is already allocated"
      )
      .is_retryable()
    );
    assert!(
      ContainerError::new(
        ContainerErrorKind::VolumeError,
        "mount failed"
      )
      .is_retryable()
    );
    assert!(
      !ContainerError::new(
        ContainerErrorKind::ImageNotFound,
        "manifest unknown"
      )
      .is_retryable()
    );
  }
}
