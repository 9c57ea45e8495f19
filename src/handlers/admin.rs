use axum::{
  extract::{Path, State},
  http::StatusCode,
  Json,
};
use serde::Deserialize;

use crate::auth::AuthContext;
use crate::db::try_lock;
use crate::domain::SamplePack;
use crate::error::Result;
use crate::state::AppState;
use crate::validation::{validate_description, validate_title};

/// Optional details written together with the new pack
#[derive(Debug, Default, Deserialize)]
pub struct CreatePackRequest {
  pub title: Option<String>,
  pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePackRequest {
  pub title: String,
  #[serde(default)]
  pub description: String,
}

/// POST /api/admin/packs
pub async fn create_pack(
  State(state): State<AppState>,
  auth: AuthContext,
  body: Option<Json<CreatePackRequest>>,
) -> Result<(StatusCode, Json<SamplePack>)> {
  auth.require_admin()?;
  let req = body.map(|Json(req)| req).unwrap_or_default();

  // Validate before touching the active pack
  let title = req.title.as_deref().map(validate_title).transpose()?;
  let description = validate_description(req.description.as_deref().unwrap_or_default())?;

  let mut conn = try_lock(&state.db)?;
  let pack = state.packs.create_pack_with_details(
    &mut conn,
    title.as_deref().unwrap_or_default(),
    &description,
  )?;

  tracing::info!("Admin {} created sample pack {}", auth.user_id(), pack.id);
  Ok((StatusCode::CREATED, Json(pack)))
}

/// PUT /api/admin/packs/{id}
pub async fn update_pack(
  State(state): State<AppState>,
  auth: AuthContext,
  Path(id): Path<i64>,
  Json(req): Json<UpdatePackRequest>,
) -> Result<Json<SamplePack>> {
  auth.require_admin()?;
  let title = validate_title(&req.title)?;
  let description = validate_description(&req.description)?;

  let conn = try_lock(&state.db)?;
  Ok(Json(state.packs.update_pack_details(&conn, id, &title, &description)?))
}

/// POST /api/admin/packs/{id}/close
pub async fn close_pack(
  State(state): State<AppState>,
  auth: AuthContext,
  Path(id): Path<i64>,
) -> Result<Json<SamplePack>> {
  auth.require_admin()?;
  let mut conn = try_lock(&state.db)?;
  let pack = state.packs.close_active_pack(&mut conn, id)?;
  tracing::info!("Admin {} closed sample pack {}", auth.user_id(), id);
  Ok(Json(pack))
}
