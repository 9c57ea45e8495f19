use axum::{
  extract::{Multipart, Path, Query, State},
  http::StatusCode,
  response::Response,
  Json,
};
use serde::{Deserialize, Serialize};
use std::io::Read;

use super::{attachment, next_field, read_file_field, read_text_field, UploadedFile};
use crate::auth::AuthContext;
use crate::config::DEFAULT_SUBMISSION_PAGE;
use crate::db::{try_lock, LogOnError};
use crate::domain::{NewSubmission, Submission};
use crate::error::{Error, Result};
use crate::services::submission as submission_service;
use crate::state::AppState;
use crate::storage::StorageKind;
use crate::validation::{
  clamp_limit, clamp_offset, file_extension, validate_audio_filename, validate_description,
  validate_file_size, validate_title,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionQuery {
  /// Defaults to the active pack
  pub pack_id: Option<i64>,
  pub limit: Option<i64>,
  pub offset: Option<i64>,
}

/// Submission as returned to clients, with its download URL
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionView {
  #[serde(flatten)]
  pub submission: Submission,
  pub file_url: String,
}

impl From<Submission> for SubmissionView {
  fn from(submission: Submission) -> Self {
    let file_url = submission.file_url();
    Self {
      submission,
      file_url,
    }
  }
}

/// GET /api/submissions
pub async fn list_submissions(
  State(state): State<AppState>,
  Query(query): Query<SubmissionQuery>,
) -> Result<Json<Vec<SubmissionView>>> {
  let limit = clamp_limit(query.limit, DEFAULT_SUBMISSION_PAGE);
  let offset = clamp_offset(query.offset);
  let conn = try_lock(&state.db)?;

  let pack_id = match query.pack_id {
    Some(id) => state.packs.get_pack(&conn, id)?.id,
    None => state.packs.get_current_pack(&conn)?.id,
  };
  let submissions = submission_service::list_submissions(&conn, pack_id, limit, offset)?;
  Ok(Json(submissions.into_iter().map(SubmissionView::from).collect()))
}

/// GET /api/submissions/{id}
pub async fn get_submission(
  State(state): State<AppState>,
  Path(id): Path<i64>,
) -> Result<Json<SubmissionView>> {
  let conn = try_lock(&state.db)?;
  Ok(Json(submission_service::get_submission(&conn, id)?.into()))
}

/// POST /api/submissions
pub async fn create_submission(
  State(state): State<AppState>,
  auth: AuthContext,
  mut multipart: Multipart,
) -> Result<(StatusCode, Json<SubmissionView>)> {
  {
    let conn = try_lock(&state.db)?;
    if !state.packs.is_submission_allowed(&conn) {
      return Err(Error::Authorization("Submission window is closed".into()));
    }
  }

  let mut title = None;
  let mut description = String::new();
  let mut upload: Option<UploadedFile> = None;
  while let Some(field) = next_field(&mut multipart).await? {
    let name = field.name().unwrap_or_default().to_string();
    match name.as_str() {
      "title" => title = Some(read_text_field(field).await?),
      "description" => description = read_text_field(field).await?,
      "file" => upload = Some(read_file_field(field).await?),
      _ => {}
    }
  }

  let title = validate_title(title.as_deref().unwrap_or_default())?;
  let description = validate_description(&description)?;
  let upload = upload.ok_or_else(|| Error::Validation("missing file field".into()))?;
  let filename = validate_audio_filename(&upload.filename)?;
  validate_file_size(upload.bytes.len() as u64, state.config.max_upload_bytes)?;

  let (locator, size) = state
    .storage
    .save(StorageKind::Submissions, &filename, upload.bytes.as_slice())?;
  let submission = NewSubmission {
    title,
    description,
    filename,
    file_size: size as i64,
    storage_locator: locator.clone(),
  };

  let created = try_lock(&state.db).and_then(|mut conn| {
    submission_service::create_submission(&state.packs, &mut conn, auth.user_id(), submission)
  });
  match created {
    Ok(submission) => Ok((StatusCode::CREATED, Json(submission.into()))),
    Err(e) => {
      state
        .storage
        .delete(&locator)
        .log_warn("Failed to remove rejected submission file");
      Err(e)
    }
  }
}

/// GET /api/submissions/{id}/download
pub async fn download_submission(
  State(state): State<AppState>,
  _auth: AuthContext,
  Path(id): Path<i64>,
) -> Result<Response> {
  let submission = {
    let conn = try_lock(&state.db)?;
    submission_service::get_submission(&conn, id)?
  };

  let storage = state.storage.clone();
  let locator = submission.storage_locator.clone();
  let bytes = tokio::task::spawn_blocking(move || -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    storage.open(&locator)?.read_to_end(&mut bytes)?;
    Ok(bytes)
  })
  .await
  .map_err(|e| Error::Io(std::io::Error::other(e)))??;

  Ok(attachment(
    &submission.filename,
    audio_content_type(&submission.filename),
    bytes,
  ))
}

fn audio_content_type(filename: &str) -> &'static str {
  match file_extension(filename).as_deref() {
    Some("wav") => "audio/wav",
    Some("mp3") => "audio/mpeg",
    Some("aiff") => "audio/aiff",
    Some("flac") => "audio/flac",
    _ => "application/octet-stream",
  }
}
