//! Hidden admin commands: `/stats` and `/setpro`

use teloxide::prelude::*;

use crate::core::config::admin::is_admin;
use crate::core::utils::now_unix;
use crate::storage::db::{self, events, BotStats, DbPool};
use crate::storage::get_connection;
use crate::telegram::handlers::HandlerError;

fn sender_id(msg: &Message) -> i64 {
    msg.from
        .as_ref()
        .and_then(|u| i64::try_from(u.id.0).ok())
        .unwrap_or(0)
}

/// Plain-text dashboard
pub fn format_stats(stats: &BotStats) -> String {
    let recent = stats
        .recent_users
        .iter()
        .map(|u| {
            format!(
                "• {}, {}y, {}: 🔬{} 💬{} ({})",
                u.gender.as_deref().unwrap_or("?"),
                u.age.map(|a| a.to_string()).unwrap_or_else(|| "?".to_string()),
                u.goal.as_deref().unwrap_or("?"),
                u.analysis_count,
                u.chat_count,
                u.joined_at.get(..10).unwrap_or(&u.joined_at)
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "📊 Metabolic Center Stats

👥 Total users: {}
⭐ Pro: {}
🎁 On trial: {}
🔬 Analyses: {}
💬 Chats: {}

📅 Today: {} new users, {} actions

📋 Recent:
{}",
        stats.total_users,
        stats.pro_users,
        stats.trial_users,
        stats.total_analyses,
        stats.total_chats,
        stats.today_users,
        stats.today_activity,
        if recent.is_empty() { "No users yet" } else { recent.as_str() }
    )
}

/// `/stats`. Non-admins get no reply at all.
pub async fn handle_stats_command(bot: &Bot, msg: &Message, db_pool: &DbPool) -> Result<(), HandlerError> {
    let user_id = sender_id(msg);
    if !is_admin(user_id) {
        log::warn!("Ignoring /stats from non-admin {}", user_id);
        return Ok(());
    }

    let stats = {
        let conn = get_connection(db_pool)?;
        db::get_stats(&conn, now_unix())?
    };
    bot.send_message(msg.chat.id, format_stats(&stats)).await?;
    Ok(())
}

/// Parses `<user_id> [on|off]`; the flag defaults to `on`.
pub fn parse_setpro_args(args: &str) -> Option<(i64, bool)> {
    let mut parts = args.split_whitespace();
    let user_id = parts.next()?.parse::<i64>().ok()?;
    let enabled = match parts.next().map(str::to_ascii_lowercase).as_deref() {
        None | Some("on") | Some("true") | Some("1") => true,
        Some("off") | Some("false") | Some("0") => false,
        Some(_) => return None,
    };
    Some((user_id, enabled))
}

/// `/setpro <user_id> [on|off]`
pub async fn handle_setpro_command(bot: &Bot, msg: &Message, db_pool: &DbPool, args: &str) -> Result<(), HandlerError> {
    let admin_id = sender_id(msg);
    if !is_admin(admin_id) {
        log::warn!("Ignoring /setpro from non-admin {}", admin_id);
        return Ok(());
    }

    let Some((user_id, enabled)) = parse_setpro_args(args) else {
        bot.send_message(msg.chat.id, "Usage: /setpro <user_id> [on|off]").await?;
        return Ok(());
    };

    let updated = {
        let conn = get_connection(db_pool)?;
        let updated = db::set_pro(&conn, user_id, enabled)?;
        if updated {
            db::log_event(&conn, user_id, events::SET_PRO, if enabled { "on" } else { "off" })?;
        }
        updated
    };

    let reply = if updated {
        log::info!("Admin {} set pro={} for user {}", admin_id, enabled, user_id);
        format!("✅ User {}: Pro {}", user_id, if enabled { "enabled" } else { "disabled" })
    } else {
        format!("❌ User {} not found", user_id)
    };
    bot.send_message(msg.chat.id, reply).await?;

    if updated && enabled {
        if let Err(e) = bot
            .send_message(ChatId(user_id), "⭐ Welcome to Metabolic Center Pro! Everything is unlimited now.")
            .await
        {
            log::warn!("Failed to notify user {} about Pro: {}", user_id, e);
        }
    }
    Ok(())
}
