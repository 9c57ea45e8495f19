use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An uploaded audio sample belonging to one pack
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sample {
  pub id: i64,
  pub sample_pack_id: i64,
  pub user_id: i64,
  /// Display name of the uploader (joined from users)
  pub user_name: String,
  pub filename: String,
  pub file_size: i64,
  /// Storage locator, never exposed to clients
  #[serde(skip)]
  pub storage_locator: String,
  pub created_at: DateTime<Utc>,
}

/// Sample fields supplied by the upload handler
#[derive(Debug, Clone)]
pub struct NewSample {
  pub user_id: i64,
  pub filename: String,
  pub file_size: i64,
  pub storage_locator: String,
}
