use axum::{
  extract::{Multipart, Path, Query, State},
  http::StatusCode,
  response::Response,
  Json,
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use super::{attachment, next_field, read_file_field};
use crate::auth::AuthContext;
use crate::config::DEFAULT_PACK_LIST_LIMIT;
use crate::db::{self, try_lock, LogOnError};
use crate::domain::{NewSample, PackPhase, PackWithSamples, Sample, SamplePack};
use crate::error::{Error, Result};
use crate::services::archive::create_pack_zip;
use crate::state::AppState;
use crate::storage::StorageKind;
use crate::validation::{clamp_limit, sanitize_filename, validate_audio_filename, validate_file_size};

#[derive(Debug, Deserialize)]
pub struct ListQuery {
  pub limit: Option<i64>,
}

/// A pack plus what its phase allows right now
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PackStatus {
  #[serde(flatten)]
  pub pack: SamplePack,
  pub phase: PackPhase,
  pub upload_open: bool,
  pub submission_open: bool,
  pub download_available: bool,
  pub sample_count: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PackListResponse {
  pub current_pack: Option<PackStatus>,
  pub past_packs: Vec<SamplePack>,
}

fn pack_status(state: &AppState, conn: &Connection, pack: SamplePack) -> Result<PackStatus> {
  let packs = &state.packs;
  let sample_count = db::count_pack_samples(conn, pack.id)?;
  Ok(PackStatus {
    phase: pack.phase(packs.now()),
    upload_open: packs.is_upload_allowed_for_pack(conn, pack.id),
    submission_open: pack.is_active && packs.is_submission_allowed(conn),
    download_available: packs.is_download_allowed_for_pack(conn, pack.id),
    sample_count,
    pack,
  })
}

/// GET /api/samples/packs
pub async fn list_packs(
  State(state): State<AppState>,
  Query(query): Query<ListQuery>,
) -> Result<Json<PackListResponse>> {
  let limit = clamp_limit(query.limit, DEFAULT_PACK_LIST_LIMIT);
  let conn = try_lock(&state.db)?;

  let current_pack = match state.packs.get_current_pack(&conn) {
    Ok(pack) => Some(pack_status(&state, &conn, pack)?),
    Err(e) if e.is_not_found() => None,
    Err(e) => return Err(e),
  };
  let current_id = current_pack.as_ref().map(|p| p.pack.id);
  let past_packs = state
    .packs
    .list_packs(&conn, limit)?
    .into_iter()
    .filter(|p| Some(p.id) != current_id)
    .collect();

  Ok(Json(PackListResponse {
    current_pack,
    past_packs,
  }))
}

/// GET /api/samples/packs/current
pub async fn current_pack(State(state): State<AppState>) -> Result<Json<PackStatus>> {
  let conn = try_lock(&state.db)?;
  let pack = state.packs.get_current_pack(&conn)?;
  Ok(Json(pack_status(&state, &conn, pack)?))
}

/// GET /api/samples/packs/{id}
pub async fn get_pack(
  State(state): State<AppState>,
  Path(id): Path<i64>,
) -> Result<Json<PackWithSamples>> {
  let conn = try_lock(&state.db)?;
  Ok(Json(state.packs.get_pack_with_samples(&conn, id)?))
}

/// POST /api/samples/packs/{id}/upload
pub async fn upload_sample(
  State(state): State<AppState>,
  auth: AuthContext,
  Path(id): Path<i64>,
  mut multipart: Multipart,
) -> Result<(StatusCode, Json<Sample>)> {
  // Cheap rejection before reading the body; add_sample checks again
  {
    let conn = try_lock(&state.db)?;
    state.packs.get_pack(&conn, id)?;
    if !state.packs.is_upload_allowed_for_pack(&conn, id) {
      return Err(Error::Authorization("Upload window is closed".into()));
    }
  }

  let mut upload = None;
  while let Some(field) = next_field(&mut multipart).await? {
    let name = field.name().unwrap_or_default().to_string();
    if name == "file" {
      upload = Some(read_file_field(field).await?);
      break;
    }
  }
  let upload = upload.ok_or_else(|| Error::Validation("missing file field".into()))?;

  let filename = validate_audio_filename(&upload.filename)?;
  validate_file_size(upload.bytes.len() as u64, state.config.max_upload_bytes)?;

  let (locator, size) = state
    .storage
    .save(StorageKind::Samples, &filename, upload.bytes.as_slice())?;
  let sample = NewSample {
    user_id: auth.user_id(),
    filename,
    file_size: size as i64,
    storage_locator: locator.clone(),
  };

  let added = try_lock(&state.db).and_then(|mut conn| state.packs.add_sample(&mut conn, id, sample));
  match added {
    Ok(sample) => Ok((StatusCode::CREATED, Json(sample))),
    Err(e) => {
      state
        .storage
        .delete(&locator)
        .log_warn("Failed to remove rejected upload");
      Err(e)
    }
  }
}

/// GET /api/samples/packs/{id}/download
pub async fn download_pack(
  State(state): State<AppState>,
  _auth: AuthContext,
  Path(id): Path<i64>,
) -> Result<Response> {
  let pack = {
    let conn = try_lock(&state.db)?;
    let pack = state.packs.get_pack_with_samples(&conn, id)?;
    if !state.packs.is_download_allowed_for_pack(&conn, id) {
      return Err(Error::Authorization(
        "Sample pack is available once the upload window closes".into(),
      ));
    }
    pack
  };

  let download_name = archive_name(&pack.pack);
  let storage = state.storage.clone();
  let bytes = tokio::task::spawn_blocking(move || -> Result<Vec<u8>> {
    let dir = tempfile::TempDir::new()?;
    let path = dir.path().join("pack.zip");
    create_pack_zip(&storage, &pack, &path)?;
    Ok(std::fs::read(&path)?)
  })
  .await
  .map_err(|e| Error::Io(std::io::Error::other(e)))??;

  Ok(attachment(&download_name, "application/zip", bytes))
}

/// `<title>.zip`, or `sample-pack-<id>.zip` for untitled packs
fn archive_name(pack: &SamplePack) -> String {
  sanitize_filename(&pack.title)
    .map(|title| format!("{}.zip", title))
    .unwrap_or_else(|_| format!("sample-pack-{}.zip", pack.id))
}
