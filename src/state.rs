use std::sync::Arc;

use sqlx::PgPool;

use crate::auth::services::AuthService;
use crate::config::AppConfig;
use crate::items::services::ItemService;
use crate::notifier::Notifier;

/// Shared per-process services, cloned into every handler.
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub items: ItemService,
}

impl AppState {
    pub fn new(db: PgPool, config: &AppConfig, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            auth: Arc::new(AuthService::new(db.clone(), config, notifier)),
            items: ItemService::new(db),
        }
    }

    /// State over a lazily connecting pool; for tests that never reach the database.
    #[cfg(test)]
    pub fn fake() -> Self {
        let config = AppConfig::for_tests();
        let db = crate::db::connect_lazy(&config.database, &config.pool).expect("lazy pool ok");
        Self::new(db, &config, Arc::new(crate::notifier::LogNotifier))
    }
}
