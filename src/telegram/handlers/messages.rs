//! Text messages: onboarding answers, pending inputs, menu buttons and chat

use teloxide::prelude::*;
use teloxide::types::ReplyMarkup;

use super::commands::{show_detox, show_food_today};
use super::types::{ensure_user, log_event, HandlerDeps, HandlerError};
use crate::core::config::llm::max_tokens;
use crate::core::food::{self, DailyTotals};
use crate::core::paywall::{self, Usage};
use crate::core::profile::{format_profile, profile_context};
use crate::core::prompts;
use crate::core::session::{Awaiting, ImageMode, OnboardingStep, Session};
use crate::core::utils::{local_day_start_utc, now_unix, truncate_chars};
use crate::llm::LlmError;
use crate::storage::db::{self, events};
use crate::storage::{get_connection, User};
use crate::telegram::keyboards::{self, MenuButton};
use crate::telegram::markdown::{send_long, send_markdown};

/// Result of validating an onboarding answer
#[derive(Debug, PartialEq)]
pub(super) enum Answer<T> {
    Value(T),
    Skip,
    Invalid,
}

pub(super) fn parse_age(text: &str) -> Answer<i64> {
    match text.trim().parse::<i64>() {
        Ok(age) if (1..=119).contains(&age) => Answer::Value(age),
        _ => Answer::Invalid,
    }
}

fn is_skip(text: &str) -> bool {
    text.trim().eq_ignore_ascii_case("skip")
}

pub(super) fn parse_height(text: &str) -> Answer<i64> {
    if is_skip(text) {
        return Answer::Skip;
    }
    match text.trim().trim_end_matches("cm").trim().parse::<f64>() {
        Ok(h) if (100.0..=250.0).contains(&h) => Answer::Value(h.round() as i64),
        _ => Answer::Invalid,
    }
}

pub(super) fn parse_weight(text: &str) -> Answer<f64> {
    if is_skip(text) {
        return Answer::Skip;
    }
    let cleaned = text.trim().trim_end_matches("kg").trim().replace(',', ".");
    match cleaned.parse::<f64>() {
        Ok(w) if (30.0..=300.0).contains(&w) => Answer::Value((w * 10.0).round() / 10.0),
        _ => Answer::Invalid,
    }
}

/// Sends the upgrade pitch when the quota is exhausted. Returns `true` when
/// the user may proceed.
pub(super) async fn ask_quota_or_upgrade(
    bot: &Bot,
    chat_id: ChatId,
    user: &User,
    usage: Usage,
) -> Result<bool, HandlerError> {
    if paywall::can_use(user, usage, now_unix()) {
        return Ok(true);
    }
    log::info!("User {} hit the free {:?} limit", user.id, usage);
    send_markdown(bot, chat_id, prompts::upgrade_required(), None).await?;
    Ok(false)
}

/// Sends a model reply, or logs the failure and sends `error_text`.
pub(super) async fn run_model_reply(
    bot: &Bot,
    chat_id: ChatId,
    user_id: i64,
    label: &str,
    reply: Result<String, LlmError>,
    error_text: &str,
) -> Result<Option<String>, HandlerError> {
    match reply {
        Ok(text) => {
            send_long(bot, chat_id, &text).await?;
            Ok(Some(text))
        }
        Err(e) => {
            log::error!("{} error for user {}: {}", label, user_id, e);
            bot.send_message(chat_id, error_text).await?;
            Ok(None)
        }
    }
}

/// Charges one chat use. Callers check the quota first.
fn charge_chat(deps: &HandlerDeps, user_id: i64) -> Result<i64, HandlerError> {
    let conn = get_connection(&deps.db_pool)?;
    Ok(db::increment_chat_count(&conn, user_id)?)
}

/// Where a text message goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum TextRoute {
    Onboarding(OnboardingStep),
    Menu(MenuButton),
    Symptoms,
    Food,
    Chat,
}

/// Picks the route for `text` and updates the pending input.
///
/// Typed onboarding answers come first, then menu buttons, which drop any
/// pending input. Symptom and food inputs are consumed by the message; a
/// pending photo request stays until a photo arrives.
pub(super) fn route_text(session: &mut Session, text: &str) -> TextRoute {
    match session.step {
        step @ (OnboardingStep::Age | OnboardingStep::Height | OnboardingStep::Weight) => {
            return TextRoute::Onboarding(step)
        }
        _ => {}
    }

    if let Some(button) = MenuButton::from_text(text) {
        session.awaiting = Awaiting::Nothing;
        return TextRoute::Menu(button);
    }

    match session.awaiting {
        Awaiting::Symptoms => {
            session.take_awaiting();
            TextRoute::Symptoms
        }
        Awaiting::Food => {
            session.take_awaiting();
            TextRoute::Food
        }
        Awaiting::Image(_) | Awaiting::Nothing => TextRoute::Chat,
    }
}

pub(super) async fn handle_text(bot: Bot, msg: Message, deps: HandlerDeps) -> Result<(), HandlerError> {
    let (Some(from), Some(text)) = (msg.from.as_ref(), msg.text()) else {
        return Ok(());
    };
    let text = text.trim();
    let chat_id = msg.chat.id;
    let (user, _) = ensure_user(&deps.db_pool, from)?;

    match deps.sessions.update(user.id, |s| route_text(s, text)).await {
        TextRoute::Onboarding(OnboardingStep::Age) => handle_age(&bot, chat_id, &deps, user, text).await,
        TextRoute::Onboarding(OnboardingStep::Height) => handle_height(&bot, chat_id, &deps, user, text).await,
        TextRoute::Onboarding(_) => handle_weight(&bot, chat_id, &deps, user, text).await,
        TextRoute::Menu(button) => handle_menu(&bot, chat_id, &deps, &user, button).await,
        TextRoute::Symptoms => handle_symptoms(&bot, chat_id, &deps, &user, text).await,
        TextRoute::Food => handle_food_entry(&bot, chat_id, &deps, &user, text).await,
        TextRoute::Chat => handle_chat(&bot, chat_id, &deps, &user, text).await,
    }
}

async fn handle_age(bot: &Bot, chat_id: ChatId, deps: &HandlerDeps, mut user: User, text: &str) -> Result<(), HandlerError> {
    let Answer::Value(age) = parse_age(text) else {
        bot.send_message(chat_id, "Enter valid age (1-119).").await?;
        return Ok(());
    };

    user.age = Some(age);
    db::update_user(&*get_connection(&deps.db_pool)?, &user)?;
    deps.sessions.update(user.id, |s| s.step = OnboardingStep::Height).await;
    bot.send_message(chat_id, format!("✅ Age: {}\n\n📏 Height in cm? (or type skip)", age))
        .await?;
    Ok(())
}

async fn handle_height(bot: &Bot, chat_id: ChatId, deps: &HandlerDeps, mut user: User, text: &str) -> Result<(), HandlerError> {
    let confirmation = match parse_height(text) {
        Answer::Value(height) => {
            user.height = Some(height);
            db::update_user(&*get_connection(&deps.db_pool)?, &user)?;
            format!("✅ Height: {} cm", height)
        }
        Answer::Skip => "⏭ Height skipped".to_string(),
        Answer::Invalid => {
            bot.send_message(chat_id, "Enter valid height in cm (100-250) or type skip.")
                .await?;
            return Ok(());
        }
    };

    deps.sessions.update(user.id, |s| s.step = OnboardingStep::Weight).await;
    bot.send_message(chat_id, format!("{}\n\n⚖️ Weight in kg? (or type skip)", confirmation))
        .await?;
    Ok(())
}

async fn handle_weight(bot: &Bot, chat_id: ChatId, deps: &HandlerDeps, mut user: User, text: &str) -> Result<(), HandlerError> {
    let confirmation = match parse_weight(text) {
        Answer::Value(weight) => {
            user.weight = Some(weight);
            db::update_user(&*get_connection(&deps.db_pool)?, &user)?;
            format!("✅ Weight: {} kg", weight)
        }
        Answer::Skip => "⏭ Weight skipped".to_string(),
        Answer::Invalid => {
            bot.send_message(chat_id, "Enter valid weight in kg (30-300) or type skip.")
                .await?;
            return Ok(());
        }
    };

    deps.sessions.update(user.id, |s| s.step = OnboardingStep::Activity).await;
    bot.send_message(chat_id, format!("{}\n\n🏃 Activity level?", confirmation))
        .reply_markup(keyboards::activity())
        .await?;
    Ok(())
}

async fn handle_menu(bot: &Bot, chat_id: ChatId, deps: &HandlerDeps, user: &User, button: MenuButton) -> Result<(), HandlerError> {
    match button {
        MenuButton::AnalyzeBloodTest => {
            deps.sessions
                .update(user.id, |s| s.awaiting = Awaiting::Image(ImageMode::Analysis))
                .await;
            bot.send_message(chat_id, "📸 Send a photo of your blood test results.").await?;
        }
        MenuButton::MealPlan => {
            single_shot(
                bot,
                chat_id,
                deps,
                user,
                SingleShot {
                    event: events::MEAL_PLAN,
                    status: "🥗 Generating meal plan...",
                    system: prompts::MEAL_PLAN,
                    request: "Meal plan.",
                    max_tokens: max_tokens::MEAL_PLAN,
                },
            )
            .await?;
        }
        MenuButton::Supplements => {
            single_shot(
                bot,
                chat_id,
                deps,
                user,
                SingleShot {
                    event: events::SUPPLEMENT,
                    status: "💊 Building protocol...",
                    system: prompts::SUPPLEMENTS,
                    request: "Supplements.",
                    max_tokens: max_tokens::SUPPLEMENTS,
                },
            )
            .await?;
        }
        MenuButton::TrackSymptoms => {
            deps.sessions.update(user.id, |s| s.awaiting = Awaiting::Symptoms).await;
            bot.send_message(chat_id, "📋 Describe your symptoms:").await?;
        }
        MenuButton::InterpretDocument => {
            deps.sessions
                .update(user.id, |s| s.awaiting = Awaiting::Image(ImageMode::Document))
                .await;
            bot.send_message(chat_id, "📄 Send a photo of your medical document.").await?;
        }
        MenuButton::HealthChat => {
            bot.send_message(chat_id, "💬 Ask me anything about health!").await?;
        }
        MenuButton::FoodDiary => {
            show_food_today(bot, chat_id, deps, user).await?;
            deps.sessions.update(user.id, |s| s.awaiting = Awaiting::Food).await;
            bot.send_message(
                chat_id,
                "📒 What did you eat? Describe the meal, e.g. \"2 eggs, toast with butter, coffee with milk\".",
            )
            .await?;
        }
        MenuButton::Detox => {
            show_detox(bot, chat_id, deps, user).await?;
        }
        MenuButton::Profile => {
            send_markdown(bot, chat_id, format_profile(user, now_unix()), None).await?;
        }
        MenuButton::Upgrade => {
            log_event(&deps.db_pool, user.id, events::UPGRADE_CLICK, "");
            send_markdown(
                bot,
                chat_id,
                prompts::upgrade_offer(),
                Some(ReplyMarkup::Keyboard(keyboards::main_menu())),
            )
            .await?;
        }
    }
    Ok(())
}

struct SingleShot {
    event: &'static str,
    status: &'static str,
    system: &'static str,
    request: &'static str,
    max_tokens: u32,
}

/// Meal plan and supplement protocol: one prompt, one reply, one chat use.
async fn single_shot(bot: &Bot, chat_id: ChatId, deps: &HandlerDeps, user: &User, job: SingleShot) -> Result<(), HandlerError> {
    if !ask_quota_or_upgrade(bot, chat_id, user, Usage::Chat).await? {
        return Ok(());
    }
    charge_chat(deps, user.id)?;
    log_event(&deps.db_pool, user.id, job.event, "");

    bot.send_message(chat_id, job.status).await?;
    let request = format!("{}{}", job.request, profile_context(user));
    let reply = deps.llm.text(job.system, &request, job.max_tokens).await;
    run_model_reply(bot, chat_id, user.id, job.event, reply, "❌ Error. Try again.").await?;
    Ok(())
}

async fn handle_symptoms(bot: &Bot, chat_id: ChatId, deps: &HandlerDeps, user: &User, text: &str) -> Result<(), HandlerError> {
    if !ask_quota_or_upgrade(bot, chat_id, user, Usage::Chat).await? {
        return Ok(());
    }

    let history = {
        let conn = get_connection(&deps.db_pool)?;
        db::increment_chat_count(&conn, user.id)?;
        db::add_symptom(&conn, user.id, text)?;
        db::log_event(&conn, user.id, events::SYMPTOM, &truncate_chars(text, 100))?;
        db::get_symptoms(&conn, user.id)?
    };

    bot.send_message(chat_id, "🔍 Analyzing symptoms...").await?;

    let history = history
        .iter()
        .map(|s| format!("{}: {}", s.created_at, s.text))
        .collect::<Vec<_>>()
        .join("\n");
    let request = format!(
        "{}\n\nSymptom history:\n{}\n\nLatest: {}",
        profile_context(user),
        history,
        text
    );
    let reply = deps.llm.text(prompts::SYMPTOMS, &request, max_tokens::SYMPTOMS).await;
    run_model_reply(bot, chat_id, user.id, "Symptom", reply, "❌ Error. Try again.").await?;
    Ok(())
}

async fn handle_food_entry(bot: &Bot, chat_id: ChatId, deps: &HandlerDeps, user: &User, text: &str) -> Result<(), HandlerError> {
    if !ask_quota_or_upgrade(bot, chat_id, user, Usage::Chat).await? {
        return Ok(());
    }
    charge_chat(deps, user.id)?;
    log_event(&deps.db_pool, user.id, events::FOOD, &truncate_chars(text, 100));

    let reply = match deps.llm.text(prompts::FOOD_ESTIMATE, text, max_tokens::FOOD).await {
        Ok(reply) => reply,
        Err(e) => {
            log::error!("Food estimate error for user {}: {}", user.id, e);
            bot.send_message(chat_id, "❌ Error. Try again.").await?;
            return Ok(());
        }
    };

    let Some(estimate) = food::parse_food_estimate(&reply) else {
        log::warn!("Unparseable food estimate for user {}: {}", user.id, truncate_chars(&reply, 200));
        bot.send_message(chat_id, "❌ Couldn't estimate that. Try describing the meal in more detail.")
            .await?;
        return Ok(());
    };

    let today = {
        let conn = get_connection(&deps.db_pool)?;
        db::add_food_entry(&conn, user.id, &estimate)?;
        db::get_today_food(&conn, user.id, &local_day_start_utc(chrono::Utc::now(), user.tz_offset))?
    };
    let totals = DailyTotals::from_entries(today.iter().map(|e| &e.estimate));

    bot.send_message(
        chat_id,
        format!(
            "✅ Logged\n\n{}\n\n{}",
            food::format_entry(&estimate),
            food::format_totals(&totals)
        ),
    )
    .await?;
    Ok(())
}

async fn handle_chat(bot: &Bot, chat_id: ChatId, deps: &HandlerDeps, user: &User, text: &str) -> Result<(), HandlerError> {
    if !ask_quota_or_upgrade(bot, chat_id, user, Usage::Chat).await? {
        return Ok(());
    }
    charge_chat(deps, user.id)?;
    log_event(&deps.db_pool, user.id, events::CHAT, &truncate_chars(text, 100));

    let history = deps.sessions.update(user.id, |s| s.push_user_turn(text)).await;
    let system = format!("{}{}", prompts::CHAT, profile_context(user));
    let reply = deps.llm.chat(&system, &history, max_tokens::CHAT).await;

    if let Some(answer) = run_model_reply(bot, chat_id, user.id, "Chat", reply, "❌ Error. Try again.").await? {
        deps.sessions.update(user.id, |s| s.push_assistant_turn(answer)).await;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(step: OnboardingStep, awaiting: Awaiting) -> Session {
        Session {
            step,
            awaiting,
            ..Default::default()
        }
    }

    #[test]
    fn menu_button_cancels_pending_input() {
        let label = MenuButton::Profile.label();
        for awaiting in [Awaiting::Symptoms, Awaiting::Food, Awaiting::Image(ImageMode::Analysis)] {
            let mut s = session(OnboardingStep::None, awaiting);
            assert_eq!(route_text(&mut s, label), TextRoute::Menu(MenuButton::Profile));
            assert_eq!(s.awaiting, Awaiting::Nothing);
        }
    }

    #[test]
    fn pending_image_survives_text() {
        let mut s = session(OnboardingStep::None, Awaiting::Image(ImageMode::Document));
        assert_eq!(route_text(&mut s, "what does ALT mean?"), TextRoute::Chat);
        assert_eq!(s.awaiting, Awaiting::Image(ImageMode::Document));
        assert_eq!(route_text(&mut s, "and AST?"), TextRoute::Chat);
        assert_eq!(s.awaiting, Awaiting::Image(ImageMode::Document));
    }

    #[test]
    fn symptom_and_food_inputs_are_consumed_once() {
        let mut s = session(OnboardingStep::None, Awaiting::Symptoms);
        assert_eq!(route_text(&mut s, "headache since morning"), TextRoute::Symptoms);
        assert_eq!(route_text(&mut s, "thanks"), TextRoute::Chat);

        let mut s = session(OnboardingStep::None, Awaiting::Food);
        assert_eq!(route_text(&mut s, "two eggs and toast"), TextRoute::Food);
        assert_eq!(s.awaiting, Awaiting::Nothing);
        assert_eq!(route_text(&mut s, "and coffee"), TextRoute::Chat);
    }

    #[test]
    fn typed_onboarding_answers_take_priority() {
        let mut s = session(OnboardingStep::Height, Awaiting::Food);
        let label = MenuButton::Detox.label();
        assert_eq!(route_text(&mut s, label), TextRoute::Onboarding(OnboardingStep::Height));
        assert_eq!(s.awaiting, Awaiting::Food);

        // Button-driven steps fall through to normal routing
        let mut s = session(OnboardingStep::Gender, Awaiting::Nothing);
        assert_eq!(route_text(&mut s, "hello"), TextRoute::Chat);
    }

    #[test]
    fn age_bounds() {
        assert_eq!(parse_age("34"), Answer::Value(34));
        assert_eq!(parse_age(" 1 "), Answer::Value(1));
        assert_eq!(parse_age("119"), Answer::Value(119));
        assert_eq!(parse_age("0"), Answer::Invalid);
        assert_eq!(parse_age("120"), Answer::Invalid);
        assert_eq!(parse_age("thirty"), Answer::Invalid);
        assert_eq!(parse_age("skip"), Answer::Invalid);
    }

    #[test]
    fn height_bounds_and_skip() {
        assert_eq!(parse_height("172"), Answer::Value(172));
        assert_eq!(parse_height("180 cm"), Answer::Value(180));
        assert_eq!(parse_height("Skip"), Answer::Skip);
        assert_eq!(parse_height("99"), Answer::Invalid);
        assert_eq!(parse_height("251"), Answer::Invalid);
    }

    #[test]
    fn weight_bounds_and_decimal_comma() {
        assert_eq!(parse_weight("72,5"), Answer::Value(72.5));
        assert_eq!(parse_weight("80kg"), Answer::Value(80.0));
        assert_eq!(parse_weight("skip"), Answer::Skip);
        assert_eq!(parse_weight("29"), Answer::Invalid);
        assert_eq!(parse_weight("301"), Answer::Invalid);
    }
}
