use std::sync::Arc;

use keystash::{app, config::AppConfig, db, notifier::LogNotifier, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "keystash=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let config = AppConfig::from_env()?;
    let pool = db::init(&config.database, &config.pool).await?;

    let state = AppState::new(pool.clone(), &config, Arc::new(LogNotifier));
    state.auth.warm_up().await?;
    let addr = app::listen_addr()?;
    let result = app::serve(app::build_app(state), addr).await;

    pool.close().await;
    tracing::info!("database pool closed");
    result
}
