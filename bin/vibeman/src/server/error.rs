use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use db::DbError;
use runtime::ContainerError;
use vibeman_client::entities::error::{Error, ErrorBody, ErrorKind};

/// Axum-facing wrapper mapping typed errors onto status codes and the
/// `{error, code, context?}` body.
#[derive(Debug)]
pub struct ApiError(pub Error);

pub type ApiResult<T> = Result<T, ApiError>;

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = StatusCode::from_u16(self.0.status_code())
      .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if status.is_server_error() {
      error!("{}", self.0);
    } else {
      debug!("request failed: {}", self.0);
    }
    (status, Json(ErrorBody::from(&self.0))).into_response()
  }
}

impl From<Error> for ApiError {
  fn from(e: Error) -> ApiError {
    ApiError(e)
  }
}

impl From<anyhow::Error> for ApiError {
  fn from(e: anyhow::Error) -> ApiError {
    ApiError(e.into())
  }
}

impl From<DbError> for ApiError {
  fn from(e: DbError) -> ApiError {
    ApiError(db_error(e))
  }
}

impl From<ContainerError> for ApiError {
  fn from(e: ContainerError) -> ApiError {
    ApiError(e.into())
  }
}

/// Store failures keep their typed meaning on the way out.
pub fn db_error(e: DbError) -> Error {
  match e {
    DbError::NotFound { entity, id } => Error::not_found(entity, id),
    DbError::Conflict(message) => Error::conflict(message),
    DbError::InvalidTransition { from, to } => Error::invalid_state(
      format!("invalid status transition: {from} -> {to}"),
    ),
    e if e.is_constraint_violation() => {
      Error::conflict(format!("constraint violation: {e}"))
    }
    e => Error::new(ErrorKind::DatabaseError, e.to_string()),
  }
}
