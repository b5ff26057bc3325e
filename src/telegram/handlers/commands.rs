//! Slash-command handlers

use teloxide::prelude::*;
use teloxide::types::ReplyMarkup;

use super::types::{ensure_user, log_event, HandlerDeps, HandlerError};
use crate::core::config;
use crate::core::detox::{self, DETOX_DAYS};
use crate::core::food::{self, DailyTotals};
use crate::core::paywall::{self, TrialError};
use crate::core::profile::format_profile;
use crate::core::prompts;
use crate::core::session::OnboardingStep;
use crate::core::utils::{local_day_start_utc, now_unix, parse_tz_offset};
use crate::storage::db::{self, events};
use crate::storage::get_connection;
use crate::telegram::keyboards;
use crate::telegram::markdown::send_markdown;

pub(super) fn format_date(unix: i64) -> String {
    chrono::DateTime::from_timestamp(unix, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| "?".to_string())
}

/// `/start [ref_CODE]`
pub(super) async fn handle_start(bot: &Bot, msg: &Message, deps: &HandlerDeps, payload: &str) -> Result<(), HandlerError> {
    let Some(from) = msg.from.as_ref() else {
        return Ok(());
    };
    let (mut user, created) = ensure_user(&deps.db_pool, from)?;
    log_event(
        &deps.db_pool,
        user.id,
        events::START,
        &format!("@{} {}", from.username.as_deref().unwrap_or(""), from.first_name),
    );

    if let Some(code) = paywall::parse_referral_payload(payload) {
        credit_referral(bot, deps, &mut user, created, code).await;
    }

    deps.sessions
        .update(user.id, |s| {
            s.step = OnboardingStep::Gender;
            s.awaiting = Default::default();
            s.history.clear();
        })
        .await;

    send_markdown(
        bot,
        msg.chat.id,
        prompts::welcome(),
        Some(ReplyMarkup::Keyboard(keyboards::main_menu())),
    )
    .await?;

    let bot = bot.clone();
    let chat_id = msg.chat.id;
    tokio::spawn(async move {
        tokio::time::sleep(config::telegram::onboarding_delay()).await;
        if let Err(e) = bot
            .send_message(chat_id, "Let me set up your profile.\n\n👤 Biological sex?")
            .reply_markup(keyboards::gender())
            .await
        {
            log::error!("Failed to send onboarding question to {}: {}", chat_id, e);
        }
    });

    Ok(())
}

/// Links `newcomer` to the owner of `code` and extends the owner's trial.
/// Returns the referrer's ID when a bonus was granted.
fn record_referral(
    db_pool: &db::DbPool,
    newcomer: &mut db::User,
    created: bool,
    code: &str,
    now: i64,
) -> Result<Option<i64>, HandlerError> {
    let conn = get_connection(db_pool)?;
    let Some(mut referrer) = db::get_user_by_referral(&conn, code)? else {
        log::info!("Unknown referral code {} from user {}", code, newcomer.id);
        return Ok(None);
    };
    if !paywall::can_refer(&referrer, newcomer, created) {
        return Ok(None);
    }

    newcomer.referred_by = referrer.id;
    db::update_user(&conn, newcomer)?;

    let expires = paywall::apply_referral_bonus(&mut referrer, now);
    db::update_user(&conn, &referrer)?;
    db::log_event(&conn, referrer.id, events::REFERRAL, &newcomer.id.to_string())?;
    log::info!("User {} referred {} (trial until {})", referrer.id, newcomer.id, expires);
    Ok(Some(referrer.id))
}

async fn credit_referral(bot: &Bot, deps: &HandlerDeps, newcomer: &mut db::User, created: bool, code: &str) {
    match record_referral(&deps.db_pool, newcomer, created, code, now_unix()) {
        Ok(Some(referrer_id)) => {
            let text = format!(
                "🎉 A friend joined with your link! +{} days of Pro added.",
                config::limits::REFERRAL_BONUS_DAYS
            );
            if let Err(e) = bot.send_message(ChatId(referrer_id), text).await {
                log::warn!("Failed to notify referrer {}: {}", referrer_id, e);
            }
        }
        Ok(None) => {}
        Err(e) => log::error!("Referral handling failed for user {}: {}", newcomer.id, e),
    }
}

pub(super) async fn handle_profile(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let Some(from) = msg.from.as_ref() else {
        return Ok(());
    };
    let (user, _) = ensure_user(&deps.db_pool, from)?;
    send_markdown(bot, msg.chat.id, format_profile(&user, now_unix()), None).await?;
    Ok(())
}

pub(super) async fn handle_trial(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let Some(from) = msg.from.as_ref() else {
        return Ok(());
    };
    let (mut user, _) = ensure_user(&deps.db_pool, from)?;

    let text = match paywall::start_trial(&mut user, now_unix()) {
        Ok(expires) => {
            let conn = get_connection(&deps.db_pool)?;
            db::update_user(&conn, &user)?;
            db::log_event(&conn, user.id, events::TRIAL, "")?;
            format!(
                "🎁 *Your {}-day Pro trial is active!*\n\nUnlimited analyses and chats until {}.",
                config::limits::TRIAL_DAYS,
                format_date(expires)
            )
        }
        Err(TrialError::AlreadyPro) => "⭐ You're already a Pro member.".to_string(),
        Err(TrialError::TrialAlreadyUsed) => format!(
            "You've already used your free trial.\n\n👉 [Upgrade to Pro]({})\n🤝 Or earn free days with /referral",
            config::CHECKOUT_URL.as_str()
        ),
    };

    send_markdown(bot, msg.chat.id, text, None).await?;
    Ok(())
}

pub(super) async fn handle_referral(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let Some(from) = msg.from.as_ref() else {
        return Ok(());
    };
    let (user, _) = ensure_user(&deps.db_pool, from)?;
    let code = user.referral_code.clone().unwrap_or_else(|| paywall::referral_code(user.id));

    let invited = {
        let conn = get_connection(&deps.db_pool)?;
        db::count_referrals(&conn, user.id)?
    };

    let link = match deps.bot_username.as_deref() {
        Some(username) => format!("https://t.me/{}?start=ref_{}", username, code),
        None => format!("/start ref_{}", code),
    };

    // Plain text: the link contains underscores
    bot.send_message(msg.chat.id, prompts::referral_info(&link, invited).replace('*', ""))
        .await?;
    Ok(())
}

pub(super) async fn handle_timezone(bot: &Bot, msg: &Message, deps: &HandlerDeps, arg: &str) -> Result<(), HandlerError> {
    let Some(from) = msg.from.as_ref() else {
        return Ok(());
    };
    let (mut user, _) = ensure_user(&deps.db_pool, from)?;

    let text = match parse_tz_offset(arg) {
        Some(offset) => {
            user.tz_offset = offset;
            let conn = get_connection(&deps.db_pool)?;
            db::update_user(&conn, &user)?;
            format!("🕐 Time zone set to UTC{:+}. Reminders will follow your local time.", offset)
        }
        None => format!(
            "Usage: /timezone +3 (hours from UTC, -12 to +14)\nCurrent: UTC{:+}",
            user.tz_offset
        ),
    };

    bot.send_message(msg.chat.id, text).await?;
    Ok(())
}

pub(super) async fn handle_help(bot: &Bot, msg: &Message) -> Result<(), HandlerError> {
    send_markdown(
        bot,
        msg.chat.id,
        prompts::HELP,
        Some(ReplyMarkup::Keyboard(keyboards::main_menu())),
    )
    .await?;
    Ok(())
}

/// Current detox state with the matching buttons. Shared by `/detox` and the menu.
///
/// Shows the same day as the morning reminder: the earliest unlocked day
/// still open in the user's local calendar.
pub(super) async fn show_detox(bot: &Bot, chat_id: ChatId, deps: &HandlerDeps, user: &db::User) -> Result<(), HandlerError> {
    let current = {
        let conn = get_connection(&deps.db_pool)?;
        db::get_detox(&conn, user.id)?
    };

    match current {
        None => {
            let text = format!(
                "🌿 *7-Day Metabolic Detox*\n\nOne small set of habits per day for {} days: hydration, sugar, whole foods, glucose, gut, sleep.\n\nEvery morning you get the day's tasks. Mark them done to track progress.",
                DETOX_DAYS
            );
            send_markdown(bot, chat_id, text, Some(ReplyMarkup::InlineKeyboard(keyboards::detox_start()))).await?;
        }
        Some(progress) if progress.is_finished() => {
            let text = format!("🎉 You completed the 7-Day Detox!\n{}", progress.progress_bar());
            bot.send_message(chat_id, text)
                .reply_markup(keyboards::detox_restart())
                .await?;
        }
        Some(progress) => {
            let day = progress.day_to_show(chrono::Utc::now(), user.tz_offset);
            bot.send_message(chat_id, detox::format_day(&progress, day))
                .reply_markup(keyboards::detox_day(day))
                .await?;
        }
    }
    Ok(())
}

/// Today's diary with totals. Shared by `/food` and the menu.
pub(super) async fn show_food_today(bot: &Bot, chat_id: ChatId, deps: &HandlerDeps, user: &db::User) -> Result<(), HandlerError> {
    let entries = {
        let conn = get_connection(&deps.db_pool)?;
        db::get_today_food(&conn, user.id, &local_day_start_utc(chrono::Utc::now(), user.tz_offset))?
    };

    let mut text = String::new();
    for entry in entries.iter().rev() {
        text.push_str(&food::format_entry(&entry.estimate));
        text.push_str("\n\n");
    }
    text.push_str(&food::format_totals(&DailyTotals::from_entries(entries.iter().map(|e| &e.estimate))));

    bot.send_message(chat_id, text).await?;
    Ok(())
}

pub(super) async fn handle_detox(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let Some(from) = msg.from.as_ref() else {
        return Ok(());
    };
    let (user, _) = ensure_user(&deps.db_pool, from)?;
    show_detox(bot, msg.chat.id, deps, &user).await
}

pub(super) async fn handle_food(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let Some(from) = msg.from.as_ref() else {
        return Ok(());
    };
    let (user, _) = ensure_user(&deps.db_pool, from)?;
    show_food_today(bot, msg.chat.id, deps, &user).await?;
    deps.sessions
        .update(user.id, |s| s.awaiting = crate::core::session::Awaiting::Food)
        .await;
    bot.send_message(msg.chat.id, "📒 Send what you ate to add it to the diary.")
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::storage::create_pool;

    const NOW: i64 = 1_700_000_000;
    const BONUS: i64 = config::limits::REFERRAL_BONUS_DAYS * 86_400;

    /// Referrer 100 with a code and a trial ending one day after `NOW`.
    fn pool_with_referrer() -> (db::DbPool, String) {
        let pool = create_pool(":memory:").unwrap();
        let conn = pool.get().unwrap();
        let (mut referrer, _) = db::ensure_user(&conn, 100, Some("ref"), None, None).unwrap();
        let code = paywall::referral_code(referrer.id);
        referrer.referral_code = Some(code.clone());
        referrer.trial_expires = NOW + 86_400;
        db::update_user(&conn, &referrer).unwrap();
        drop(conn);
        (pool, code)
    }

    fn join(pool: &db::DbPool, id: i64) -> (db::User, bool) {
        let conn = pool.get().unwrap();
        db::ensure_user(&conn, id, None, None, None).unwrap()
    }

    fn stored(pool: &db::DbPool, id: i64) -> db::User {
        let conn = pool.get().unwrap();
        db::get_user(&conn, id).unwrap().unwrap()
    }

    #[test]
    fn formats_unix_dates() {
        assert_eq!(format_date(0), "1970-01-01 00:00 UTC");
        assert_eq!(format_date(86_400 * 365), "1971-01-01 00:00 UTC");
    }

    #[test]
    fn referral_credits_new_user_once() {
        let (pool, code) = pool_with_referrer();

        let (mut newcomer, created) = join(&pool, 200);
        assert!(created);
        assert_eq!(record_referral(&pool, &mut newcomer, created, &code, NOW).unwrap(), Some(100));
        assert_eq!(newcomer.referred_by, 100);

        let referrer = stored(&pool, 100);
        assert_eq!(referrer.trial_expires, NOW + 86_400 + BONUS);
        assert_eq!(stored(&pool, 200).referred_by, 100);

        // Same link again: the user already exists and is already linked
        let (mut again, created) = join(&pool, 200);
        assert!(!created);
        assert_eq!(record_referral(&pool, &mut again, created, &code, NOW).unwrap(), None);
        assert_eq!(stored(&pool, 100).trial_expires, NOW + 86_400 + BONUS);

        let conn = pool.get().unwrap();
        assert_eq!(db::count_referrals(&conn, 100).unwrap(), 1);
    }

    #[test]
    fn referral_ignores_existing_users() {
        let (pool, code) = pool_with_referrer();
        join(&pool, 300);

        let (mut existing, created) = join(&pool, 300);
        assert!(!created);
        assert_eq!(record_referral(&pool, &mut existing, created, &code, NOW).unwrap(), None);
        assert_eq!(stored(&pool, 300).referred_by, 0);
        assert_eq!(stored(&pool, 100).trial_expires, NOW + 86_400);
    }

    #[test]
    fn referral_rejects_own_code() {
        let (pool, code) = pool_with_referrer();
        let mut referrer = stored(&pool, 100);
        // Even when reported as freshly created
        assert_eq!(record_referral(&pool, &mut referrer, true, &code, NOW).unwrap(), None);
        assert_eq!(stored(&pool, 100).referred_by, 0);
        assert_eq!(stored(&pool, 100).trial_expires, NOW + 86_400);
    }

    #[test]
    fn referral_bonus_starts_from_now_after_expiry() {
        let (pool, code) = pool_with_referrer();
        let later = NOW + 10 * 86_400;

        let (mut newcomer, created) = join(&pool, 400);
        assert_eq!(record_referral(&pool, &mut newcomer, created, &code, later).unwrap(), Some(100));
        assert_eq!(stored(&pool, 100).trial_expires, later + BONUS);
    }

    #[test]
    fn unknown_referral_code_is_ignored() {
        let (pool, _) = pool_with_referrer();
        let (mut newcomer, created) = join(&pool, 500);
        assert_eq!(record_referral(&pool, &mut newcomer, created, "MCNOPE", NOW).unwrap(), None);
        assert_eq!(stored(&pool, 500).referred_by, 0);
    }
}
