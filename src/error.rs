//! Error taxonomy shared by services and handlers.
//!
//! Repository functions in [`crate::db`] return `rusqlite::Result`; services
//! lift those into [`Error`] and handlers turn an [`Error`] into a JSON
//! response with the matching status code.

use axum::{
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
  /// Pack, sample, submission or user absent
  #[error("{0} not found")]
  NotFound(&'static str),

  /// A time window is closed or the caller lacks the required role
  #[error("{0}")]
  Authorization(String),

  /// No valid session was presented
  #[error("Authentication required")]
  Unauthenticated,

  #[error("Invalid input: {0}")]
  Validation(String),

  #[error("{0}")]
  Conflict(String),

  /// Stored state breaks an invariant (e.g. two active packs)
  #[error("Integrity violation: {0}")]
  Integrity(String),

  #[error("Configuration error: {0}")]
  Config(String),

  #[error("Database error: {0}")]
  Database(#[from] rusqlite::Error),

  #[error("IO error: {0}")]
  Io(#[from] std::io::Error),

  #[error("Archive error: {0}")]
  Archive(#[from] zip::result::ZipError),

  #[error("Database unavailable")]
  Lock,
}

impl Error {
  pub fn status(&self) -> StatusCode {
    match self {
      Self::NotFound(_) => StatusCode::NOT_FOUND,
      Self::Authorization(_) => StatusCode::FORBIDDEN,
      Self::Unauthenticated => StatusCode::UNAUTHORIZED,
      Self::Validation(_) => StatusCode::BAD_REQUEST,
      Self::Conflict(_) => StatusCode::CONFLICT,
      _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }

  /// Machine-readable error type for API clients
  pub fn kind(&self) -> &'static str {
    match self {
      Self::NotFound(_) => "NOT_FOUND",
      Self::Authorization(_) => "AUTHORIZATION_ERROR",
      Self::Unauthenticated => "AUTHENTICATION_ERROR",
      Self::Validation(_) => "VALIDATION_ERROR",
      Self::Conflict(_) => "CONFLICT",
      _ => "INTERNAL_ERROR",
    }
  }

  pub fn is_not_found(&self) -> bool {
    matches!(self, Self::NotFound(_))
  }
}

impl IntoResponse for Error {
  fn into_response(self) -> Response {
    let status = self.status();
    let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
      if matches!(self, Self::Integrity(_)) {
        tracing::error!("{}", self);
      } else {
        tracing::warn!("Internal error: {}", self);
      }
      "An internal error occurred".to_string()
    } else {
      self.to_string()
    };

    (
      status,
      Json(serde_json::json!({
        "type": self.kind(),
        "message": message,
      })),
    )
      .into_response()
  }
}
