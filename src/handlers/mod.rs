//! JSON HTTP API.

pub mod admin;
pub mod packs;
pub mod submissions;

use axum::{
  extract::{multipart::Field, DefaultBodyLimit, Multipart, State},
  http::header,
  response::{IntoResponse, Response},
  routing::{get, post, put},
  Json, Router,
};
use chrono::SecondsFormat;

use crate::auth;
use crate::error::{Error, Result};
use crate::state::AppState;

/// Headroom for multipart boundaries and text fields on top of the file limit
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// All API routes, with state applied
pub fn router(state: AppState) -> Router {
  let body_limit = state.config.max_upload_bytes + MULTIPART_OVERHEAD_BYTES;

  Router::new()
    .route("/api/v1/health", get(health))
    // Sample packs
    .route("/api/samples/packs", get(packs::list_packs))
    .route("/api/samples/packs/current", get(packs::current_pack))
    .route("/api/samples/packs/{id}", get(packs::get_pack))
    .route("/api/samples/packs/{id}/upload", post(packs::upload_sample))
    .route("/api/samples/packs/{id}/download", get(packs::download_pack))
    // Submissions
    .route(
      "/api/submissions",
      get(submissions::list_submissions).post(submissions::create_submission),
    )
    .route("/api/submissions/{id}", get(submissions::get_submission))
    .route("/api/submissions/{id}/download", get(submissions::download_submission))
    // Admin
    .route("/api/admin/packs", post(admin::create_pack))
    .route("/api/admin/packs/{id}", put(admin::update_pack))
    .route("/api/admin/packs/{id}/close", post(admin::close_pack))
    // Auth
    .route("/api/auth/dev/login", post(auth::dev_login))
    .route("/api/auth/logout", post(auth::logout))
    .route("/api/auth/me", get(auth::me))
    .layer(DefaultBodyLimit::max(body_limit))
    .with_state(state)
}

/// GET /api/v1/health
pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
  Json(serde_json::json!({
    "status": "ok",
    "timestamp": state.now().to_rfc3339_opts(SecondsFormat::Secs, true),
  }))
}

/// A file part read from a multipart body
pub struct UploadedFile {
  /// Client-supplied name, not yet sanitised
  pub filename: String,
  pub bytes: Vec<u8>,
}

/// Read a file field, rejecting parts without a filename
pub async fn read_file_field(field: Field<'_>) -> Result<UploadedFile> {
  let filename = field
    .file_name()
    .map(str::to_string)
    .ok_or_else(|| Error::Validation("file part has no filename".into()))?;
  let bytes = field
    .bytes()
    .await
    .map_err(|e| Error::Validation(format!("failed to read upload: {}", e.body_text())))?;
  Ok(UploadedFile {
    filename,
    bytes: bytes.to_vec(),
  })
}

pub async fn read_text_field(field: Field<'_>) -> Result<String> {
  field
    .text()
    .await
    .map_err(|e| Error::Validation(format!("failed to read form field: {}", e.body_text())))
}

/// Next multipart field, turning a malformed body into a 400
pub async fn next_field(multipart: &mut Multipart) -> Result<Option<Field<'_>>> {
  multipart
    .next_field()
    .await
    .map_err(|e| Error::Validation(format!("malformed multipart body: {}", e.body_text())))
}

/// `attachment` response for a file download
pub fn attachment(filename: &str, content_type: &'static str, bytes: Vec<u8>) -> Response {
  let ascii: String = filename
    .chars()
    .map(|c| if (c.is_ascii_graphic() && c != '"' && c != '\\') || c == ' ' { c } else { '_' })
    .collect();
  let disposition = format!(
    "attachment; filename=\"{}\"; filename*=UTF-8''{}",
    ascii,
    urlencoding::encode(filename)
  );
  (
    [
      (header::CONTENT_TYPE, content_type.to_string()),
      (header::CONTENT_DISPOSITION, disposition),
    ],
    bytes,
  )
    .into_response()
}
