//! Hourly reminder loop
//!
//! Once an hour every user's local hour is computed from `tz_offset`. Detox
//! participants get the day's tasks in the morning, food diary users get their
//! totals in the evening, and elapsed trials are cleared.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Timelike, Utc};
use teloxide::prelude::*;

use crate::core::config;
use crate::core::detox::{self, Detox};
use crate::core::food::{self, DailyTotals};
use crate::core::error::{AppError, AppResult};
use crate::core::utils::{local_day_start_utc, local_hour, SQLITE_DATETIME};
use crate::storage::db::{self, DbPool, User};
use crate::storage::get_connection;
use crate::telegram::keyboards;

/// Delay from `now` to the top of the next hour.
pub fn delay_until_next_hour(now: DateTime<Utc>) -> Duration {
    let into_hour = u64::from(now.minute()) * 60 + u64::from(now.second());
    Duration::from_secs(3600 - into_hour.min(3599))
}

/// Detox reminders due at `now`: (user ID, day to show).
///
/// The day is [`Detox::day_to_show`] in the user's local calendar. Nothing is
/// sent when every unlocked day is already done.
pub fn due_detox_reminders(active: &[(User, Detox)], now: DateTime<Utc>) -> Vec<(i64, u8)> {
    active
        .iter()
        .filter(|(user, _)| local_hour(now.hour(), user.tz_offset) == config::reminders::DETOX_REMINDER_HOUR)
        .filter_map(|(user, progress)| {
            let day = progress.day_to_show(now, user.tz_offset);
            (!progress.is_day_completed(day)).then_some((user.id, day))
        })
        .collect()
}

/// Whether it is food summary time for `user` at `now`.
pub fn food_summary_due(user: &User, now: DateTime<Utc>) -> bool {
    local_hour(now.hour(), user.tz_offset) == config::reminders::FOOD_SUMMARY_HOUR
}

async fn send_detox_reminders(bot: &Bot, db_pool: &DbPool, now: DateTime<Utc>) -> AppResult<usize> {
    let active = {
        let conn = get_connection(db_pool)?;
        db::get_active_detox_users(&conn)?
    };

    let mut sent = 0;
    for (user_id, day) in due_detox_reminders(&active, now) {
        let Some((_, progress)) = active.iter().find(|(u, _)| u.id == user_id) else {
            continue;
        };
        let text = format!("☀️ Good morning!\n\n{}", detox::format_day(progress, day));
        match bot
            .send_message(ChatId(user_id), text)
            .reply_markup(keyboards::detox_day(day))
            .await
        {
            Ok(_) => sent += 1,
            Err(e) => log::warn!("Detox reminder to {} failed: {}", user_id, e),
        }
    }
    Ok(sent)
}

async fn send_food_summaries(bot: &Bot, db_pool: &DbPool, now: DateTime<Utc>) -> AppResult<usize> {
    let due: Vec<(i64, DailyTotals)> = {
        let conn = get_connection(db_pool)?;
        // Any local day started less than a day ago
        let window = (now - TimeDelta::days(1)).format(SQLITE_DATETIME).to_string();
        let mut due = Vec::new();
        for user_id in db::get_users_with_food_since(&conn, &window)? {
            let Some(user) = db::get_user(&conn, user_id)? else {
                continue;
            };
            if !food_summary_due(&user, now) {
                continue;
            }
            let entries = db::get_today_food(&conn, user_id, &local_day_start_utc(now, user.tz_offset))?;
            if entries.is_empty() {
                continue;
            }
            due.push((user_id, DailyTotals::from_entries(entries.iter().map(|e| &e.estimate))));
        }
        due
    };

    let mut sent = 0;
    for (user_id, totals) in due {
        let text = format!("🌙 Daily food summary\n\n{}", food::format_totals(&totals));
        match bot.send_message(ChatId(user_id), text).await {
            Ok(_) => sent += 1,
            Err(e) => log::warn!("Food summary to {} failed: {}", user_id, e),
        }
    }
    Ok(sent)
}

/// Remembers the last UTC hour processed so a late or repeated tick inside the
/// same hour does nothing.
#[derive(Debug, Default)]
pub struct TickGuard {
    last_hour: Option<i64>,
}

impl TickGuard {
    /// Returns `true` the first time an hour is seen.
    pub fn claim(&mut self, now: DateTime<Utc>) -> bool {
        let hour = now.timestamp().div_euclid(3600);
        if self.last_hour == Some(hour) {
            return false;
        }
        self.last_hour = Some(hour);
        true
    }
}

/// One pass of the loop. Each part logs and continues on failure.
pub async fn run_tick(bot: &Bot, db_pool: &DbPool, now: DateTime<Utc>) {
    match send_detox_reminders(bot, db_pool, now).await {
        Ok(0) => {}
        Ok(n) => log::info!("Sent {} detox reminder(s)", n),
        Err(e) => log::error!("Detox reminders failed: {}", e),
    }

    match send_food_summaries(bot, db_pool, now).await {
        Ok(0) => {}
        Ok(n) => log::info!("Sent {} food summary(ies)", n),
        Err(e) => log::error!("Food summaries failed: {}", e),
    }

    let expired = get_connection(db_pool)
        .map_err(AppError::from)
        .and_then(|conn| db::expire_trials(&conn, now.timestamp()).map_err(AppError::from));
    if let Err(e) = expired {
        log::error!("Trial sweep failed: {}", e);
    }
}

/// Spawns the reminder loop. The first tick fires at the top of the next hour.
pub fn spawn(bot: Bot, db_pool: Arc<DbPool>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let first = delay_until_next_hour(Utc::now());
        log::info!("Reminder loop starts in {}s", first.as_secs());
        tokio::time::sleep(first).await;

        let mut interval = tokio::time::interval(config::reminders::tick());
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut guard = TickGuard::default();
        loop {
            interval.tick().await;
            let now = Utc::now();
            if !guard.claim(now) {
                log::debug!("Reminder tick for {} already processed", now.format("%Y-%m-%d %H:00"));
                continue;
            }
            run_tick(&bot, &db_pool, now).await;
        }
    })
}
