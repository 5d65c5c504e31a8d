use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // Argon2 hash, not exposed in JSON
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Password-reset token row, as read under `FOR UPDATE`.
#[derive(Debug, Clone, FromRow)]
pub struct ResetTokenRow {
    pub id: i64,
    pub user_id: i64,
    pub expires_at: OffsetDateTime,
    pub used: bool,
}
