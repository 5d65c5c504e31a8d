use sqlx::{PgConnection, PgPool};

use super::repo_types::Item;

pub async fn insert(
    db: &PgPool,
    owner_id: i64,
    title: &str,
    content: Option<&str>,
) -> sqlx::Result<Item> {
    sqlx::query_as::<_, Item>(
        r#"
        INSERT INTO items (owner_id, title, content)
        VALUES ($1, $2, $3)
        RETURNING id, owner_id, title, content, created_at
        "#,
    )
    .bind(owner_id)
    .bind(title)
    .bind(content)
    .fetch_one(db)
    .await
}

pub async fn find(db: &PgPool, owner_id: i64, id: i64) -> sqlx::Result<Option<Item>> {
    sqlx::query_as::<_, Item>(
        r#"
        SELECT id, owner_id, title, content, created_at
          FROM items
         WHERE id = $1 AND owner_id = $2
        "#,
    )
    .bind(id)
    .bind(owner_id)
    .fetch_optional(db)
    .await
}

/// Newest first. `pattern` is an ILIKE pattern matched against title or content.
pub async fn list(db: &PgPool, owner_id: i64, pattern: Option<&str>) -> sqlx::Result<Vec<Item>> {
    match pattern {
        None => {
            sqlx::query_as::<_, Item>(
                r#"
                SELECT id, owner_id, title, content, created_at
                  FROM items
                 WHERE owner_id = $1
                 ORDER BY created_at DESC, id DESC
                "#,
            )
            .bind(owner_id)
            .fetch_all(db)
            .await
        }
        Some(pattern) => {
            sqlx::query_as::<_, Item>(
                r#"
                SELECT id, owner_id, title, content, created_at
                  FROM items
                 WHERE owner_id = $1
                   AND (title ILIKE $2 OR content ILIKE $2)
                 ORDER BY created_at DESC, id DESC
                "#,
            )
            .bind(owner_id)
            .bind(pattern)
            .fetch_all(db)
            .await
        }
    }
}

/// Reads an owned item and holds its row lock until the transaction ends.
pub async fn lock_for_update(
    conn: &mut PgConnection,
    owner_id: i64,
    id: i64,
) -> sqlx::Result<Option<Item>> {
    sqlx::query_as::<_, Item>(
        r#"
        SELECT id, owner_id, title, content, created_at
          FROM items
         WHERE id = $1 AND owner_id = $2
           FOR UPDATE
        "#,
    )
    .bind(id)
    .bind(owner_id)
    .fetch_optional(conn)
    .await
}

pub async fn update(
    conn: &mut PgConnection,
    id: i64,
    title: &str,
    content: Option<&str>,
) -> sqlx::Result<Item> {
    sqlx::query_as::<_, Item>(
        r#"
        UPDATE items
           SET title = $1, content = $2
         WHERE id = $3
        RETURNING id, owner_id, title, content, created_at
        "#,
    )
    .bind(title)
    .bind(content)
    .bind(id)
    .fetch_one(conn)
    .await
}

/// Returns the number of rows removed (0 or 1).
pub async fn delete(db: &PgPool, owner_id: i64, id: i64) -> sqlx::Result<u64> {
    let res = sqlx::query("DELETE FROM items WHERE id = $1 AND owner_id = $2")
        .bind(id)
        .bind(owner_id)
        .execute(db)
        .await?;
    Ok(res.rows_affected())
}
