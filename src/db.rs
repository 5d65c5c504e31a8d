//! Connection pool lifecycle.
//!
//! The pool is built once in `main`, handed to [`crate::state::AppState`], and
//! closed after the server has drained. Every unit of work acquires a
//! connection from it for its own duration only:
//!
//! - single statements run directly against `&PgPool`; the connection goes
//!   back to the pool when the query future completes or fails;
//! - multi-statement work opens a transaction with `pool.begin()`, runs against
//!   `&mut *tx`, and calls `tx.commit()` last. Any early return or `?` drops the
//!   `Transaction`, which rolls it back and releases the connection.

use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use sqlx::{
    postgres::{PgConnectOptions, PgPoolOptions, PgSslMode},
    PgPool,
};
use tracing::{info, warn};

use crate::config::{DatabaseConfig, PoolConfig};

const READY_ATTEMPTS: u32 = 30;
const READY_DELAY: Duration = Duration::from_secs(1);

/// Connection target from `DATABASE_URL`, or from the `DB_*` parts when no
/// URL is configured. `DATABASE_SSL` forces TLS in both cases.
pub fn connect_options(db: &DatabaseConfig) -> anyhow::Result<PgConnectOptions> {
    let options = match &db.url {
        Some(url) => PgConnectOptions::from_str(url).context("parse DATABASE_URL")?,
        None => PgConnectOptions::new()
            .host(&db.host)
            .port(db.port)
            .username(&db.user)
            .password(&db.password)
            .database(&db.name),
    };
    Ok(if db.ssl {
        options.ssl_mode(PgSslMode::Require)
    } else {
        options
    })
}

/// Builds the pool without opening a connection yet.
pub fn connect_lazy(db: &DatabaseConfig, cfg: &PoolConfig) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(cfg.max_connections)
        .idle_timeout(cfg.idle_timeout)
        .acquire_timeout(cfg.connect_timeout)
        .connect_lazy_with(connect_options(db)?);
    Ok(pool)
}

/// Polls `SELECT 1` until the database answers or the attempts run out.
pub async fn wait_until_ready(pool: &PgPool) -> anyhow::Result<()> {
    for attempt in 1..=READY_ATTEMPTS {
        match sqlx::query("SELECT 1").execute(pool).await {
            Ok(_) => {
                info!(attempt, "database is available");
                return Ok(());
            }
            Err(e) => {
                warn!(error = %e, attempt, max = READY_ATTEMPTS, "database not ready yet");
                tokio::time::sleep(READY_DELAY).await;
            }
        }
    }
    anyhow::bail!("database not ready after {READY_ATTEMPTS} attempts")
}

/// Applies pending files from `migrations/`; sqlx records them in its own table.
pub async fn migrate(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("apply migrations")?;
    info!("migrations applied");
    Ok(())
}

/// Connects, waits for the server and brings the schema up to date.
pub async fn init(db: &DatabaseConfig, cfg: &PoolConfig) -> anyhow::Result<PgPool> {
    let pool = connect_lazy(db, cfg)?;
    wait_until_ready(&pool).await?;
    migrate(&pool).await?;
    Ok(pool)
}

/// True when the error is a Postgres unique-constraint violation.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connect_lazy_does_not_touch_the_server() {
        let cfg = PoolConfig {
            max_connections: 2,
            idle_timeout: Duration::from_secs(1),
            connect_timeout: Duration::from_millis(100),
        };
        let db = DatabaseConfig {
            url: Some("postgres://nobody@127.0.0.1:1/none".into()),
            ..DatabaseConfig::default()
        };
        let pool = connect_lazy(&db, &cfg).expect("lazy pool");
        assert_eq!(pool.size(), 0);
    }

    #[test]
    fn options_come_from_parts_without_a_url() {
        let db = DatabaseConfig {
            url: None,
            host: "db".into(),
            port: 6543,
            user: "app".into(),
            password: "pw".into(),
            name: "keystash_prod".into(),
            ssl: false,
        };
        let options = connect_options(&db).unwrap();
        assert_eq!(options.get_host(), "db");
        assert_eq!(options.get_port(), 6543);
        assert_eq!(options.get_username(), "app");
        assert_eq!(options.get_database(), Some("keystash_prod"));
        assert!(!matches!(options.get_ssl_mode(), PgSslMode::Require));
    }

    #[test]
    fn url_wins_over_parts_and_ssl_applies_to_both() {
        let db = DatabaseConfig {
            url: Some("postgres://u:p@example.org:5433/main".into()),
            ssl: true,
            ..DatabaseConfig::default()
        };
        let options = connect_options(&db).unwrap();
        assert_eq!(options.get_host(), "example.org");
        assert_eq!(options.get_port(), 5433);
        assert_eq!(options.get_database(), Some("main"));
        assert!(matches!(options.get_ssl_mode(), PgSslMode::Require));

        let parts = DatabaseConfig {
            ssl: true,
            ..DatabaseConfig::default()
        };
        let options = connect_options(&parts).unwrap();
        assert!(matches!(options.get_ssl_mode(), PgSslMode::Require));
    }

    #[test]
    fn malformed_url_is_an_error() {
        let db = DatabaseConfig {
            url: Some("not a url".into()),
            ..DatabaseConfig::default()
        };
        assert!(connect_options(&db).is_err());
    }

    #[test]
    fn row_not_found_is_not_a_unique_violation() {
        assert!(!is_unique_violation(&sqlx::Error::RowNotFound));
    }
}
