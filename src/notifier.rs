use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::info;

/// Out-of-band delivery of password-reset tokens.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_password_reset(&self, email: &str, token: &str) -> anyhow::Result<()>;
}

/// Default notifier: records the delivery in the log without the token value.
#[derive(Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_password_reset(&self, email: &str, _token: &str) -> anyhow::Result<()> {
        info!(%email, "password reset token issued");
        Ok(())
    }
}

/// Keeps the last token sent to each address so callers can read it back.
#[derive(Default)]
pub struct MemoryNotifier {
    sent: Mutex<HashMap<String, String>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_token(&self, email: &str) -> Option<String> {
        self.sent
            .lock()
            .ok()
            .and_then(|sent| sent.get(email).cloned())
    }

    pub fn clear(&self) {
        if let Ok(mut sent) = self.sent.lock() {
            sent.clear();
        }
    }
}

#[async_trait]
impl Notifier for MemoryNotifier {
    async fn send_password_reset(&self, email: &str, token: &str) -> anyhow::Result<()> {
        let mut sent = self
            .sent
            .lock()
            .map_err(|_| anyhow::anyhow!("memory notifier poisoned"))?;
        sent.insert(email.to_string(), token.to_string());
        Ok(())
    }
}
