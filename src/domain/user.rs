use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
  pub id: i64,
  pub email: String,
  pub name: String,
  /// Identity provider that vouched for the email ("dev", "github", ...)
  pub provider: String,
  pub is_admin: bool,
  pub created_at: DateTime<Utc>,
  pub last_login_at: Option<DateTime<Utc>>,
}
