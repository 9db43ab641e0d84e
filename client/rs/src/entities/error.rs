use serde::{Deserialize, Serialize};

use super::container::ContainerErrorKind;

/// The error kinds crossing component boundaries. Every kind carries a
/// human message; `context` carries key / value pairs attached along
/// the way (repo name, worktree id, paths within the configured roots).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Error {
  pub kind: ErrorKind,
  pub message: String,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub context: Vec<(String, String)>,
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  strum::AsRefStr,
)]
pub enum ErrorKind {
  InvalidInput,
  InvalidPath,
  InvalidState,
  NotFound,
  AlreadyExists,
  Conflict,
  GitError,
  ContainerError(ContainerErrorKind),
  ServiceError,
  ConfigError,
  FilesystemError,
  DatabaseError,
  ServiceUnavailable,
  Unknown,
}

impl Error {
  pub fn new(
    kind: ErrorKind,
    message: impl Into<String>,
  ) -> Error {
    Error {
      kind,
      message: message.into(),
      context: Vec::new(),
    }
  }

  pub fn invalid_input(message: impl Into<String>) -> Error {
    Error::new(ErrorKind::InvalidInput, message)
  }

  pub fn invalid_path(message: impl Into<String>) -> Error {
    Error::new(ErrorKind::InvalidPath, message)
  }

  pub fn invalid_state(message: impl Into<String>) -> Error {
    Error::new(ErrorKind::InvalidState, message)
  }

  pub fn not_found(entity: &str, id: impl std::fmt::Display) -> Error {
    Error::new(ErrorKind::NotFound, format!("{entity} not found: {id}"))
  }

  pub fn already_exists(
    entity: &str,
    id: impl std::fmt::Display,
  ) -> Error {
    Error::new(
      ErrorKind::AlreadyExists,
      format!("{entity} already exists: {id}"),
    )
  }

  pub fn conflict(message: impl Into<String>) -> Error {
    Error::new(ErrorKind::Conflict, message)
  }

  pub fn unavailable(message: impl Into<String>) -> Error {
    Error::new(ErrorKind::ServiceUnavailable, message)
  }

  /// Attach a key / value context pair.
  pub fn with(
    mut self,
    key: impl Into<String>,
    value: impl std::fmt::Display,
  ) -> Error {
    self.context.push((key.into(), value.to_string()));
    self
  }

  /// The wire code, eg `InvalidState` or `ContainerError.ImageNotFound`.
  pub fn code(&self) -> String {
    match self.kind {
      ErrorKind::ContainerError(kind) => {
        format!("ContainerError.{}", kind.as_ref())
      }
      kind => kind.as_ref().to_string(),
    }
  }

  /// HTTP status for this kind.
  pub fn status_code(&self) -> u16 {
    match self.kind {
      ErrorKind::InvalidInput | ErrorKind::InvalidPath => 400,
      ErrorKind::NotFound => 404,
      ErrorKind::AlreadyExists
      | ErrorKind::Conflict
      | ErrorKind::InvalidState => 409,
      ErrorKind::ServiceUnavailable => 503,
      ErrorKind::ContainerError(ContainerErrorKind::RuntimeNotFound) => {
        503
      }
      ErrorKind::ContainerError(ContainerErrorKind::ContainerNotFound) => {
        404
      }
      _ => 500,
    }
  }

  /// CLI process exit code: 0 success, 1 generic, 2 validation,
  /// 3 not-found, 4 invalid-state.
  pub fn exit_code(&self) -> i32 {
    match self.kind {
      ErrorKind::InvalidInput
      | ErrorKind::InvalidPath
      | ErrorKind::ConfigError => 2,
      ErrorKind::NotFound => 3,
      ErrorKind::InvalidState
      | ErrorKind::AlreadyExists
      | ErrorKind::Conflict => 4,
      _ => 1,
    }
  }
}

impl std::fmt::Display for Error {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.message)?;
    for (key, value) in &self.context {
      write!(f, " | {key}: {value}")?;
    }
    Ok(())
  }
}

impl std::error::Error for Error {}

impl From<anyhow::Error> for Error {
  fn from(e: anyhow::Error) -> Error {
    // Preserve a downcast typed error, otherwise wrap the full
    // context chain as Unknown.
    match e.downcast::<Error>() {
      Ok(e) => e,
      Err(e) => Error::new(ErrorKind::Unknown, format!("{e:#}")),
    }
  }
}

/// The error body serialized over the API: `{error, code, context?}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
  pub error: String,
  pub code: String,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub context: Vec<(String, String)>,
}

impl From<&Error> for ErrorBody {
  fn from(e: &Error) -> ErrorBody {
    ErrorBody {
      error: e.message.clone(),
      code: e.code(),
      context: e.context.clone(),
    }
  }
}

impl ErrorBody {
  /// Best effort reconstruction of the typed error on the client side.
  pub fn into_error(self) -> Error {
    let kind = match self.code.as_str() {
      "InvalidInput" => ErrorKind::InvalidInput,
      "InvalidPath" => ErrorKind::InvalidPath,
      "InvalidState" => ErrorKind::InvalidState,
      "NotFound" => ErrorKind::NotFound,
      "AlreadyExists" => ErrorKind::AlreadyExists,
      "Conflict" => ErrorKind::Conflict,
      "GitError" => ErrorKind::GitError,
      "ServiceError" => ErrorKind::ServiceError,
      "ConfigError" => ErrorKind::ConfigError,
      "FilesystemError" => ErrorKind::FilesystemError,
      "DatabaseError" => ErrorKind::DatabaseError,
      "ServiceUnavailable" => ErrorKind::ServiceUnavailable,
      code => match code.strip_prefix("ContainerError.") {
        Some(kind) => ErrorKind::ContainerError(
          kind.parse().unwrap_or(ContainerErrorKind::Unknown),
        ),
        None => ErrorKind::Unknown,
      },
    };
    Error {
      kind,
      message: self.error,
      context: self.context,
    }
  }
}

pub type Result<T> = ::core::result::Result<T, Error>;
