use sqlx::{PgConnection, PgPool};
use time::OffsetDateTime;

use crate::auth::repo_types::{ResetTokenRow, User};

impl User {
    /// Find a user by already-normalized email.
    pub async fn find_by_email(db: &PgPool, email: &str) -> sqlx::Result<Option<User>> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, created_at
            FROM users
            WHERE lower(email) = $1
            "#,
        )
        .bind(email)
        .fetch_optional(db)
        .await
    }

    pub async fn find_by_id(db: &PgPool, id: i64) -> sqlx::Result<Option<User>> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await
    }

    /// Create a new user; a taken email surfaces as a unique violation.
    pub async fn create(db: &PgPool, email: &str, password_hash: &str) -> sqlx::Result<User> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, password_hash)
            VALUES ($1, $2)
            RETURNING id, email, password_hash, created_at
            "#,
        )
        .bind(email)
        .bind(password_hash)
        .fetch_one(db)
        .await
    }

    pub async fn set_password_hash(
        conn: &mut PgConnection,
        id: i64,
        password_hash: &str,
    ) -> sqlx::Result<()> {
        sqlx::query("UPDATE users SET password_hash = $1 WHERE id = $2")
            .bind(password_hash)
            .bind(id)
            .execute(conn)
            .await?;
        Ok(())
    }
}

pub async fn insert_reset_token(
    db: &PgPool,
    user_id: i64,
    token: &str,
    expires_at: OffsetDateTime,
) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO password_reset_tokens (user_id, token, expires_at)
        VALUES ($1, $2, $3)
        "#,
    )
    .bind(user_id)
    .bind(token)
    .bind(expires_at)
    .execute(db)
    .await?;
    Ok(())
}

/// Reads a reset token and holds its row lock until the transaction ends.
pub async fn lock_reset_token(
    conn: &mut PgConnection,
    token: &str,
) -> sqlx::Result<Option<ResetTokenRow>> {
    sqlx::query_as::<_, ResetTokenRow>(
        r#"
        SELECT id, user_id, expires_at, used
          FROM password_reset_tokens
         WHERE token = $1
           FOR UPDATE
        "#,
    )
    .bind(token)
    .fetch_optional(conn)
    .await
}

pub async fn mark_reset_token_used(conn: &mut PgConnection, id: i64) -> sqlx::Result<()> {
    sqlx::query("UPDATE password_reset_tokens SET used = true WHERE id = $1")
        .bind(id)
        .execute(conn)
        .await?;
    Ok(())
}
