//! Credential lifecycle: signup, login, session tokens and password reset.

use std::sync::Arc;
use std::time::Duration;

use lazy_static::lazy_static;
use rand::{rngs::OsRng, RngCore};
use regex::Regex;
use sqlx::PgPool;
use time::OffsetDateTime;
use tokio::sync::OnceCell;
use tracing::{error, info, instrument, warn};

use crate::{
    auth::{
        dto::PublicUser, extractors::Principal, jwt::JwtKeys, password::PasswordHasher, repo,
        repo_types::User,
    },
    config::AppConfig,
    db::is_unique_violation,
    error::{AppError, AppResult},
    notifier::Notifier,
};

pub const MIN_PASSWORD_LEN: usize = 8;
const RESET_TOKEN_BYTES: usize = 32;
const INVALID_CREDENTIALS: &str = "Invalid credentials";
const DUMMY_PASSWORD: &str = "keystash-unknown-account";

/// Shape check used at the HTTP boundary for signup and reset requests.
pub fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// 32 random bytes, hex-encoded.
pub fn generate_reset_token() -> String {
    let mut bytes = [0u8; RESET_TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn password_long_enough(password: &str) -> bool {
    password.chars().count() >= MIN_PASSWORD_LEN
}

pub struct AuthService {
    db: PgPool,
    keys: JwtKeys,
    hasher: PasswordHasher,
    reset_ttl: Duration,
    notifier: Arc<dyn Notifier>,
    /// Hash at the configured cost, checked against when the email is unknown.
    dummy_hash: OnceCell<String>,
}

impl AuthService {
    pub fn new(db: PgPool, config: &AppConfig, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            db,
            keys: JwtKeys::from_config(&config.jwt),
            hasher: PasswordHasher::new(config.hash_cost),
            reset_ttl: config.reset_token_ttl,
            notifier,
            dummy_hash: OnceCell::new(),
        }
    }

    /// Computes the unknown-account hash ahead of the first login.
    pub async fn warm_up(&self) -> AppResult<()> {
        self.dummy_hash().await?;
        Ok(())
    }

    async fn dummy_hash(&self) -> anyhow::Result<&String> {
        self.dummy_hash
            .get_or_try_init(|| self.hasher.hash_async(DUMMY_PASSWORD.to_string()))
            .await
    }

    /// Runs the same verification a registered account would, so an unknown
    /// email costs as much as a wrong password.
    async fn verify_unknown_account(&self, password: &str) -> AppResult<()> {
        let hash = self.dummy_hash().await?.clone();
        self.hasher.verify_async(password.to_string(), hash).await?;
        Ok(())
    }

    #[instrument(skip(self, password))]
    pub async fn signup(&self, email: &str, password: &str) -> AppResult<PublicUser> {
        if !email.contains('@') {
            return Err(AppError::validation("Invalid email"));
        }
        if !password_long_enough(password) {
            return Err(AppError::validation(format!(
                "Password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        let email = normalize_email(email);

        let hash = self.hasher.hash_async(password.to_string()).await?;
        let user = match User::create(&self.db, &email, &hash).await {
            Ok(u) => u,
            Err(e) if is_unique_violation(&e) => {
                warn!(%email, "email already registered");
                return Err(AppError::Conflict("Email already exists".into()));
            }
            Err(e) => return Err(e.into()),
        };

        info!(user_id = user.id, email = %user.email, "user registered");
        Ok(user.into())
    }

    /// Unknown email and wrong password produce the same error.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> AppResult<String> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(AppError::validation("Email and password are required"));
        }
        let email = normalize_email(email);

        let Some(user) = User::find_by_email(&self.db, &email).await? else {
            self.verify_unknown_account(password).await?;
            warn!(%email, "login unknown email");
            return Err(AppError::unauthorized(INVALID_CREDENTIALS));
        };

        let ok = self
            .hasher
            .verify_async(password.to_string(), user.password_hash.clone())
            .await?;
        if !ok {
            warn!(user_id = user.id, "login invalid password");
            return Err(AppError::unauthorized(INVALID_CREDENTIALS));
        }

        let token = self.issue_token(user.id, &user.email)?;
        info!(user_id = user.id, "user logged in");
        Ok(token)
    }

    /// Always succeeds for a well-formed request, whether or not the address
    /// is registered. Delivery failures are logged, not returned.
    #[instrument(skip(self))]
    pub async fn request_password_reset(&self, email: &str) -> AppResult<()> {
        if email.trim().is_empty() {
            return Err(AppError::validation("Email is required"));
        }
        let email = normalize_email(email);

        let Some(user) = User::find_by_email(&self.db, &email).await? else {
            info!("password reset requested for unknown email");
            return Ok(());
        };

        let token = generate_reset_token();
        let expires_at = OffsetDateTime::now_utc()
            .checked_add(time::Duration::try_from(self.reset_ttl).map_err(anyhow::Error::from)?)
            .ok_or_else(|| anyhow::anyhow!("reset token lifetime out of range"))?;
        repo::insert_reset_token(&self.db, user.id, &token, expires_at).await?;

        if let Err(e) = self.notifier.send_password_reset(&user.email, &token).await {
            error!(error = ?e, user_id = user.id, "password reset delivery failed");
        } else {
            info!(user_id = user.id, "password reset token sent");
        }
        Ok(())
    }

    /// Consumes a reset token and sets the new password in one transaction.
    /// The token row is locked, so concurrent resets with the same token
    /// serialize and only the first one commits.
    #[instrument(skip_all)]
    pub async fn reset_password(&self, token: &str, new_password: &str) -> AppResult<()> {
        if token.is_empty() {
            return Err(AppError::validation("Token is required"));
        }
        if !password_long_enough(new_password) {
            return Err(AppError::validation(format!(
                "New password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }

        let mut tx = self.db.begin().await?;

        let row = repo::lock_reset_token(&mut *tx, token)
            .await?
            .ok_or_else(|| AppError::validation("Invalid token"))?;
        if row.used {
            return Err(AppError::validation("Token already used"));
        }
        if row.expires_at <= OffsetDateTime::now_utc() {
            return Err(AppError::validation("Token expired"));
        }

        let hash = self.hasher.hash_async(new_password.to_string()).await?;
        User::set_password_hash(&mut *tx, row.user_id, &hash).await?;
        repo::mark_reset_token_used(&mut *tx, row.id).await?;
        tx.commit().await?;

        info!(user_id = row.user_id, "password reset completed");
        Ok(())
    }

    pub fn issue_token(&self, user_id: i64, email: &str) -> AppResult<String> {
        Ok(self.keys.sign(user_id, email)?)
    }

    /// Signature and expiry check only; no storage access.
    pub fn verify_token(&self, token: &str) -> AppResult<Principal> {
        let claims = self.keys.verify(token).map_err(|e| {
            warn!(error = %e, "invalid or expired token");
            AppError::unauthorized("Invalid or expired token")
        })?;
        Ok(Principal {
            id: claims.user_id,
            email: claims.email,
        })
    }

    pub async fn current_user(&self, principal: &Principal) -> AppResult<PublicUser> {
        User::find_by_id(&self.db, principal.id)
            .await?
            .map(PublicUser::from)
            .ok_or_else(|| AppError::not_found("User not found"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifier::LogNotifier;

    fn lazy_service() -> AuthService {
        let cfg = AppConfig::for_tests();
        let db = crate::db::connect_lazy(&cfg.database, &cfg.pool).expect("lazy pool ok");
        AuthService::new(db, &cfg, Arc::new(LogNotifier))
    }

    #[test]
    fn email_shape_check() {
        assert!(is_valid_email("a@b.com"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("no-at-sign.com"));
        assert!(!is_valid_email("a b@c.com"));
    }

    #[test]
    fn normalize_trims_and_lowercases() {
        assert_eq!(normalize_email("  Foo@Example.COM "), "foo@example.com");
    }

    #[test]
    fn reset_tokens_are_64_hex_chars_and_unique() {
        let a = generate_reset_token();
        let b = generate_reset_token();
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn signup_validates_before_touching_storage() {
        let svc = lazy_service();
        let err = svc.signup("not-an-email", "Password123").await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        let err = svc.signup("a@b.com", "short").await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn login_requires_both_fields() {
        let svc = lazy_service();
        let err = svc.login("", "Password123").await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        let err = svc.login("a@b.com", "").await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn reset_validates_before_touching_storage() {
        let svc = lazy_service();
        let err = svc.reset_password("", "Password123").await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        let err = svc.reset_password("abc", "short").await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        let err = svc.request_password_reset("  ").await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn unknown_account_check_uses_a_configured_cost_hash() {
        let svc = lazy_service();
        assert!(svc.dummy_hash.get().is_none());

        svc.verify_unknown_account("Password123").await.unwrap();
        let hash = svc.dummy_hash.get().expect("hash computed on first use").clone();
        assert!(hash.starts_with("$argon2id$"));
        assert!(hash.contains("t=1"));

        svc.warm_up().await.unwrap();
        assert_eq!(svc.dummy_hash.get(), Some(&hash));
    }

    #[tokio::test]
    async fn verify_token_yields_principal() {
        let svc = lazy_service();
        let token = svc.issue_token(9, "p@q.com").unwrap();
        let principal = svc.verify_token(&token).unwrap();
        assert_eq!(principal, Principal { id: 9, email: "p@q.com".into() });

        let err = svc.verify_token("garbage").unwrap_err();
        assert!(matches!(err, AppError::Authentication(_)));
    }
}
