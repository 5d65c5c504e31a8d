use sqlx::PgPool;
use tracing::{info, instrument};

use super::{
    dto::{CreateItemRequest, UpdateItemRequest},
    repo,
    repo_types::Item,
};
use crate::error::{AppError, AppResult};

const NOT_FOUND: &str = "Item not found";

/// Escapes `\`, `%` and `_` so user input matches literally inside ILIKE.
pub fn like_pattern(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len() + 2);
    escaped.push('%');
    for c in query.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

/// Owner-scoped item store. Another owner's item is reported exactly like a
/// missing one.
#[derive(Clone)]
pub struct ItemService {
    db: PgPool,
}

impl ItemService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    #[instrument(skip(self, req))]
    pub async fn create(&self, owner_id: i64, req: CreateItemRequest) -> AppResult<Item> {
        if req.title.is_empty() {
            return Err(AppError::validation("title must not be empty"));
        }
        let item = repo::insert(&self.db, owner_id, &req.title, req.content.as_deref()).await?;
        info!(item_id = item.id, "item created");
        Ok(item)
    }

    pub async fn find_one(&self, owner_id: i64, id: i64) -> AppResult<Item> {
        repo::find(&self.db, owner_id, id)
            .await?
            .ok_or_else(|| AppError::not_found(NOT_FOUND))
    }

    /// Case-insensitive substring match on title or content; an empty query
    /// lists everything.
    pub async fn search(&self, owner_id: i64, query: Option<&str>) -> AppResult<Vec<Item>> {
        let pattern = query.filter(|q| !q.is_empty()).map(like_pattern);
        Ok(repo::list(&self.db, owner_id, pattern.as_deref()).await?)
    }

    /// Locked read-modify-write. A concurrent update of the same row waits for
    /// this transaction and then merges onto the committed state.
    #[instrument(skip(self, req))]
    pub async fn update(&self, owner_id: i64, id: i64, req: UpdateItemRequest) -> AppResult<Item> {
        if matches!(req.title.as_deref(), Some("")) {
            return Err(AppError::validation("title must not be empty"));
        }

        let mut tx = self.db.begin().await?;
        let current = repo::lock_for_update(&mut *tx, owner_id, id)
            .await?
            .ok_or_else(|| AppError::not_found(NOT_FOUND))?;

        let title = req.title.unwrap_or(current.title);
        let content = req.content.or(current.content);
        let item = repo::update(&mut *tx, id, &title, content.as_deref()).await?;
        tx.commit().await?;

        info!(item_id = item.id, "item updated");
        Ok(item)
    }

    #[instrument(skip(self))]
    pub async fn remove(&self, owner_id: i64, id: i64) -> AppResult<()> {
        if repo::delete(&self.db, owner_id, id).await? == 0 {
            return Err(AppError::not_found(NOT_FOUND));
        }
        info!(item_id = id, "item deleted");
        Ok(())
    }
}
