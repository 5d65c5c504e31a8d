use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;

/// Item record in the database; also the wire shape returned to owners.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct Item {
    pub id: i64,
    pub owner_id: i64,
    pub title: String,
    pub content: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}
