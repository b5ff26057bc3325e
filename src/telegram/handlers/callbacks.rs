//! Inline button callbacks: onboarding answers and detox actions

use teloxide::prelude::*;
use teloxide::types::{MessageId, ReplyMarkup};

use super::commands::show_detox;
use super::messages::{ask_quota_or_upgrade, run_model_reply};
use super::types::{ensure_user, log_event, HandlerDeps, HandlerError};
use crate::core::config::llm::max_tokens;
use crate::core::detox::{self, DayOutcome, DETOX_DAYS};
use crate::core::paywall::Usage;
use crate::core::profile::profile_context;
use crate::core::prompts;
use crate::core::session::OnboardingStep;
use crate::storage::db::{self, events};
use crate::storage::get_connection;
use crate::telegram::keyboards;

/// Parsed `callback_data`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackAction {
    Gender(&'static str),
    Pregnancy(&'static str),
    Activity(&'static str),
    Diet(Option<&'static str>),
    Goal(&'static str),
    DetoxStart,
    DetoxRestart,
    DetoxDone(u8),
    DetoxTip(u8),
}

fn detox_day_arg(rest: &str) -> Option<u8> {
    rest.parse::<u8>().ok().filter(|d| (1..=DETOX_DAYS).contains(d))
}

impl CallbackAction {
    pub fn parse(data: &str) -> Option<Self> {
        let action = match data {
            "gender_male" => Self::Gender("male"),
            "gender_female" => Self::Gender("female"),
            "preg_yes" => Self::Pregnancy("pregnant"),
            "preg_bf" => Self::Pregnancy("breastfeeding"),
            "preg_no" => Self::Pregnancy("not pregnant"),
            "act_sedentary" => Self::Activity("sedentary"),
            "act_light" => Self::Activity("lightly active"),
            "act_moderate" => Self::Activity("moderately active"),
            "act_active" => Self::Activity("very active"),
            "diet_none" => Self::Diet(None),
            "diet_vegetarian" => Self::Diet(Some("vegetarian")),
            "diet_vegan" => Self::Diet(Some("vegan")),
            "diet_keto" => Self::Diet(Some("keto / low-carb")),
            "diet_glutenfree" => Self::Diet(Some("gluten-free")),
            "goal_energy" => Self::Goal("Energy & Performance"),
            "goal_longevity" => Self::Goal("Longevity & Anti-aging"),
            "goal_weight" => Self::Goal("Weight Optimization"),
            "goal_general" => Self::Goal("General Health"),
            "detox_start" => Self::DetoxStart,
            "detox_restart" => Self::DetoxRestart,
            other => {
                if let Some(rest) = other.strip_prefix("detox_done_") {
                    Self::DetoxDone(detox_day_arg(rest)?)
                } else if let Some(rest) = other.strip_prefix("detox_tip_") {
                    Self::DetoxTip(detox_day_arg(rest)?)
                } else {
                    return None;
                }
            }
        };
        Some(action)
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Handles every callback query.
pub(super) async fn handle_callback(bot: Bot, q: CallbackQuery, deps: HandlerDeps) -> Result<(), HandlerError> {
    bot.answer_callback_query(q.id.clone()).await?;

    let Some(action) = q.data.as_deref().and_then(CallbackAction::parse) else {
        log::warn!("Unknown callback data {:?} from {}", q.data, q.from.id);
        return Ok(());
    };
    let Some(message) = q.message.as_ref() else {
        return Ok(());
    };
    let chat_id = message.chat().id;
    let message_id = message.id();

    let (mut user, _) = ensure_user(&deps.db_pool, &q.from)?;
    log::debug!("Callback {:?} from user {}", action, user.id);

    match action {
        CallbackAction::Gender(gender) => {
            user.gender = Some(gender.to_string());
            save_user(&deps, &user)?;
            bot.edit_message_text(chat_id, message_id, format!("✅ Sex: {}", capitalize(gender)))
                .await?;

            if gender == "female" {
                deps.sessions.update(user.id, |s| s.step = OnboardingStep::Pregnant).await;
                bot.send_message(chat_id, "🤰 Are you pregnant or breastfeeding?")
                    .reply_markup(keyboards::pregnancy())
                    .await?;
            } else {
                ask_age(&bot, chat_id, &deps, user.id).await?;
            }
        }
        CallbackAction::Pregnancy(status) => {
            user.pregnancy_status = Some(status.to_string());
            save_user(&deps, &user)?;
            bot.edit_message_text(chat_id, message_id, format!("✅ {}", capitalize(status)))
                .await?;
            ask_age(&bot, chat_id, &deps, user.id).await?;
        }
        CallbackAction::Activity(level) => {
            user.activity_level = Some(level.to_string());
            save_user(&deps, &user)?;
            deps.sessions.update(user.id, |s| s.step = OnboardingStep::Diet).await;
            bot.edit_message_text(chat_id, message_id, format!("✅ Activity: {}", level))
                .await?;
            bot.send_message(chat_id, "🥗 Any diet restrictions?")
                .reply_markup(keyboards::diet())
                .await?;
        }
        CallbackAction::Diet(diet) => {
            user.diet_restrictions = diet.map(str::to_string);
            save_user(&deps, &user)?;
            deps.sessions.update(user.id, |s| s.step = OnboardingStep::Goal).await;
            bot.edit_message_text(
                chat_id,
                message_id,
                format!("✅ Diet: {}", diet.unwrap_or("no restrictions")),
            )
            .await?;
            bot.send_message(chat_id, "🎯 Primary goal?")
                .reply_markup(keyboards::goal())
                .await?;
        }
        CallbackAction::Goal(goal) => {
            user.goal = Some(goal.to_string());
            save_user(&deps, &user)?;
            deps.sessions.update(user.id, |s| s.step = OnboardingStep::Ready).await;
            bot.edit_message_text(chat_id, message_id, format!("✅ Goal: {}", goal))
                .await?;
            bot.send_message(chat_id, "✅ Profile complete! Use the menu below 👇")
                .reply_markup(ReplyMarkup::Keyboard(keyboards::main_menu()))
                .await?;
        }
        CallbackAction::DetoxStart | CallbackAction::DetoxRestart => {
            {
                let conn = get_connection(&deps.db_pool)?;
                db::start_detox(&conn, user.id)?;
            }
            log_event(&deps.db_pool, user.id, events::DETOX_START, "");
            show_detox(&bot, chat_id, &deps, &user).await?;
        }
        CallbackAction::DetoxDone(day) => {
            complete_detox_day(&bot, chat_id, message_id, &deps, &user, day).await?;
        }
        CallbackAction::DetoxTip(day) => {
            if !ask_quota_or_upgrade(&bot, chat_id, &user, Usage::Chat).await? {
                return Ok(());
            }
            {
                let conn = get_connection(&deps.db_pool)?;
                db::increment_chat_count(&conn, user.id)?;
            }
            log_event(&deps.db_pool, user.id, events::DETOX_TIP, &day.to_string());

            let request = format!(
                "Day {}: {}\nTasks:\n- {}{}",
                day,
                detox::day_title(day),
                detox::day_tasks(day).join("\n- "),
                profile_context(&user)
            );
            let reply = deps.llm.text(prompts::DETOX_COACH, &request, max_tokens::DETOX).await;
            run_model_reply(&bot, chat_id, user.id, "Detox tip", reply, "❌ Error. Try again.").await?;
        }
    }

    Ok(())
}

fn save_user(deps: &HandlerDeps, user: &db::User) -> Result<(), HandlerError> {
    let conn = get_connection(&deps.db_pool)?;
    db::update_user(&conn, user)?;
    Ok(())
}

async fn ask_age(bot: &Bot, chat_id: ChatId, deps: &HandlerDeps, user_id: i64) -> Result<(), HandlerError> {
    deps.sessions.update(user_id, |s| s.step = OnboardingStep::Age).await;
    bot.send_message(chat_id, "📅 Your age? (type a number)").await?;
    Ok(())
}

async fn complete_detox_day(
    bot: &Bot,
    chat_id: ChatId,
    message_id: MessageId,
    deps: &HandlerDeps,
    user: &db::User,
    day: u8,
) -> Result<(), HandlerError> {
    let user_id = user.id;
    let progress = {
        let conn = get_connection(&deps.db_pool)?;
        match db::get_detox(&conn, user_id)? {
            Some(mut progress) => {
                let outcome = progress.complete_unlocked_day(day, chrono::Utc::now(), user.tz_offset);
                if !matches!(outcome, DayOutcome::Locked { .. }) {
                    db::update_detox(&conn, &progress)?;
                }
                Some((progress, outcome))
            }
            None => None,
        }
    };

    let Some((progress, outcome)) = progress else {
        bot.send_message(chat_id, "🌿 No detox in progress.")
            .reply_markup(keyboards::detox_start())
            .await?;
        return Ok(());
    };

    if let DayOutcome::Locked { today } = outcome {
        bot.send_message(
            chat_id,
            format!("⏳ Day {} unlocks later. Today is Day {}: {}", day, today, detox::day_title(today)),
        )
        .await?;
        return Ok(());
    }

    bot.edit_message_text(chat_id, message_id, detox::format_day(&progress, day))
        .await?;

    match outcome {
        DayOutcome::Advanced { next } => {
            log_event(&deps.db_pool, user_id, events::DETOX_DAY, &day.to_string());
            bot.send_message(
                chat_id,
                format!(
                    "✅ Day {} done! {}\n\nNext up: Day {}: {}",
                    day,
                    progress.progress_bar(),
                    next,
                    detox::day_title(next)
                ),
            )
            .await?;
        }
        DayOutcome::AlreadyDone => {
            bot.send_message(chat_id, format!("Day {} is already marked done 👍", day))
                .await?;
        }
        DayOutcome::Finished => {
            log_event(&deps.db_pool, user_id, events::DETOX_FINISHED, "");
            bot.send_message(
                chat_id,
                format!(
                    "🎉 You finished the 7-Day Detox!\n{}\n\nKeep the habits that worked for you.",
                    progress.progress_bar()
                ),
            )
            .reply_markup(keyboards::detox_restart())
            .await?;
        }
        DayOutcome::Locked { .. } => {}
    }
    Ok(())
}
