//! Handler types, dependencies, and user management helpers

use std::sync::Arc;

use teloxide::types::User as TgUser;

use crate::core::error::AppResult;
use crate::core::paywall;
use crate::core::session::SessionStore;
use crate::llm::LlmClient;
use crate::storage::db::{self, DbPool, User};
use crate::storage::get_connection;

/// Error type for handlers
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Dependencies required by handlers
#[derive(Clone)]
pub struct HandlerDeps {
    pub db_pool: Arc<DbPool>,
    pub sessions: SessionStore,
    pub llm: Arc<LlmClient>,
    /// Used to build referral links
    pub bot_username: Option<String>,
}

impl HandlerDeps {
    pub fn new(db_pool: Arc<DbPool>, sessions: SessionStore, llm: Arc<LlmClient>, bot_username: Option<String>) -> Self {
        Self {
            db_pool,
            sessions,
            llm,
            bot_username,
        }
    }
}

/// Telegram user ID as stored in the database
pub(crate) fn tg_user_id(user: &TgUser) -> i64 {
    i64::try_from(user.id.0).unwrap_or_default()
}

/// Ensures the sender exists in the database and has a referral code.
///
/// Returns the stored user and whether this call created it.
pub fn ensure_user(db_pool: &DbPool, from: &TgUser) -> AppResult<(User, bool)> {
    let conn = get_connection(db_pool)?;
    let (mut user, created) = db::ensure_user(
        &conn,
        tg_user_id(from),
        from.username.as_deref(),
        Some(from.first_name.as_str()),
        from.language_code.as_deref(),
    )?;

    if user.referral_code.is_none() {
        user.referral_code = Some(paywall::referral_code(user.id));
        db::update_user(&conn, &user)?;
    }

    if created {
        log::info!("New user {} (@{})", user.id, from.username.as_deref().unwrap_or("-"));
    }
    Ok((user, created))
}

/// Logs an event, swallowing storage errors.
pub(crate) fn log_event(db_pool: &DbPool, user_id: i64, event: &str, details: &str) {
    let result = get_connection(db_pool)
        .map_err(|e| e.to_string())
        .and_then(|conn| db::log_event(&conn, user_id, event, details).map_err(|e| e.to_string()));
    if let Err(e) = result {
        log::error!("Failed to log {} for user {}: {}", event, user_id, e);
    }
}
