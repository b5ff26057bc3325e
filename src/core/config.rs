use once_cell::sync::Lazy;
use std::env;
use std::time::Duration;

/// Reads an env var, treating blank values as unset.
fn non_empty_env(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

/// Bot token
/// Read from BOT_TOKEN or TELOXIDE_TOKEN environment variable
pub static BOT_TOKEN: Lazy<String> = Lazy::new(|| {
    non_empty_env("BOT_TOKEN")
        .or_else(|| non_empty_env("TELOXIDE_TOKEN"))
        .unwrap_or_default()
});

/// Database file path
/// Read from DATABASE_PATH environment variable
/// Default: metabolic.db
pub static DATABASE_PATH: Lazy<String> =
    Lazy::new(|| env::var("DATABASE_PATH").unwrap_or_else(|_| "metabolic.db".to_string()));

/// Log file path
/// Read from LOG_FILE_PATH environment variable
/// Default: metabolic.log
pub static LOG_FILE_PATH: Lazy<String> =
    Lazy::new(|| env::var("LOG_FILE_PATH").unwrap_or_else(|_| "metabolic.log".to_string()));

/// Checkout page for the Pro subscription
pub static CHECKOUT_URL: Lazy<String> = Lazy::new(|| {
    non_empty_env("CHECKOUT_URL").unwrap_or_else(|| {
        "https://metaboliccenter.lemonsqueezy.com/checkout/buy/748aab66-5a40-492a-91f6-cda2f844723c".to_string()
    })
});

/// Hosted model configuration
pub mod llm {
    use super::{non_empty_env, Duration};
    use once_cell::sync::Lazy;

    /// API key for the chat-completions endpoint
    /// Read from OPENAI_KEY (or OPENAI_API_KEY)
    pub static API_KEY: Lazy<String> = Lazy::new(|| {
        non_empty_env("OPENAI_KEY")
            .or_else(|| non_empty_env("OPENAI_API_KEY"))
            .unwrap_or_default()
    });

    /// Base URL of an OpenAI-compatible API
    /// Default: https://api.openai.com/v1
    pub static BASE_URL: Lazy<String> =
        Lazy::new(|| non_empty_env("OPENAI_BASE_URL").unwrap_or_else(|| "https://api.openai.com/v1".to_string()));

    /// Model used for every request (text and vision)
    pub static MODEL: Lazy<String> = Lazy::new(|| non_empty_env("OPENAI_MODEL").unwrap_or_else(|| "gpt-4o".to_string()));

    /// Per-request timeout. Blood-test analyses can take a minute.
    pub const REQUEST_TIMEOUT_SECS: u64 = 120;

    pub fn timeout() -> Duration {
        Duration::from_secs(REQUEST_TIMEOUT_SECS)
    }

    /// Completion budgets per feature
    pub mod max_tokens {
        pub const ANALYSIS: u32 = 4000;
        pub const MEAL_PLAN: u32 = 3000;
        pub const SUPPLEMENTS: u32 = 3000;
        pub const SYMPTOMS: u32 = 2000;
        pub const CHAT: u32 = 1500;
        pub const FOOD: u32 = 500;
        pub const DETOX: u32 = 800;
    }
}

/// Free tier, trial and referral limits
pub mod limits {
    /// Blood-test / document analyses available without Pro
    pub const FREE_ANALYSIS_LIMIT: i64 = 2;

    /// Chat-style requests (chat, symptoms, meal plan, supplements, food) without Pro
    pub const FREE_CHAT_LIMIT: i64 = 10;

    /// Length of the one-time free trial
    pub const TRIAL_DAYS: i64 = 3;

    /// Pro days credited to a referrer per invited user
    pub const REFERRAL_BONUS_DAYS: i64 = 3;

    /// Rolling chat history kept per user
    pub const CHAT_HISTORY_TURNS: usize = 6;
}

/// Telegram-side limits
pub mod telegram {
    use super::Duration;

    /// Chunk size for long replies (Telegram caps messages at 4096)
    pub const MAX_MESSAGE_CHARS: usize = 4000;

    /// Delay between the welcome message and the first onboarding question
    pub const ONBOARDING_DELAY_MS: u64 = 1000;

    pub fn onboarding_delay() -> Duration {
        Duration::from_millis(ONBOARDING_DELAY_MS)
    }
}

/// Scheduled reminder configuration
pub mod reminders {
    use super::{env, Duration};
    use once_cell::sync::Lazy;

    /// Local hour for the daily detox task
    pub const DETOX_REMINDER_HOUR: u32 = 9;

    /// Local hour for the evening food summary
    pub const FOOD_SUMMARY_HOUR: u32 = 21;

    /// Enable reminder loop
    /// Read from REMINDERS_ENABLED environment variable
    /// Default: true
    pub static ENABLED: Lazy<bool> = Lazy::new(|| {
        env::var("REMINDERS_ENABLED")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(true)
    });

    /// Tick interval (one hour)
    pub const TICK_SECS: u64 = 60 * 60;

    pub fn tick() -> Duration {
        Duration::from_secs(TICK_SECS)
    }
}

/// Retry configuration
pub mod retry {
    use super::Duration;

    /// Maximum number of retries for dispatcher reconnection
    pub const MAX_DISPATCHER_RETRIES: u32 = 5;

    /// Delay between dispatcher retry attempts (in seconds)
    pub const DISPATCHER_RETRY_DELAY_SECS: u64 = 5;

    pub fn dispatcher_delay() -> Duration {
        Duration::from_secs(DISPATCHER_RETRY_DELAY_SECS)
    }

    /// Base for exponential backoff calculation
    pub const EXPONENTIAL_BACKOFF_BASE: u64 = 2;
}

/// Network configuration
pub mod network {
    use super::Duration;

    /// Request timeout for Telegram Bot API calls (in seconds)
    pub const REQUEST_TIMEOUT_SECS: u64 = 60;

    pub fn timeout() -> Duration {
        Duration::from_secs(REQUEST_TIMEOUT_SECS)
    }
}

/// Admin configuration
pub mod admin {
    use once_cell::sync::Lazy;
    use std::env;

    pub(crate) fn parse_admin_ids(raw: &str) -> Vec<i64> {
        raw.split([',', ' ', '\n', '\t'])
            .filter_map(|part| part.trim().parse::<i64>().ok())
            .collect()
    }

    /// Admin user IDs (comma-separated)
    /// Read from ADMIN_IDS environment variable
    pub static ADMIN_IDS: Lazy<Vec<i64>> = Lazy::new(|| {
        env::var("ADMIN_IDS")
            .ok()
            .map(|raw| parse_admin_ids(&raw))
            .unwrap_or_default()
    });

    pub fn is_admin(user_id: i64) -> bool {
        ADMIN_IDS.contains(&user_id)
    }
}

/// Checks that the secrets required by `run` are present.
pub fn validate_required() -> anyhow::Result<()> {
    if BOT_TOKEN.is_empty() {
        anyhow::bail!("BOT_TOKEN environment variable not set");
    }
    if llm::API_KEY.is_empty() {
        anyhow::bail!("OPENAI_KEY environment variable not set");
    }
    Ok(())
}
