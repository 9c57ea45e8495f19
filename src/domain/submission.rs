use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A finished work built from the samples of one pack
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
  pub id: i64,
  pub sample_pack_id: i64,
  pub user_id: i64,
  pub user_name: String,
  pub title: String,
  pub description: String,
  pub filename: String,
  pub file_size: i64,
  #[serde(skip)]
  pub storage_locator: String,
  pub submitted_at: DateTime<Utc>,
}

impl Submission {
  pub fn file_url(&self) -> String {
    format!("/api/submissions/{}/download", self.id)
  }
}

#[derive(Debug, Clone)]
pub struct NewSubmission {
  pub title: String,
  pub description: String,
  pub filename: String,
  pub file_size: i64,
  pub storage_locator: String,
}
