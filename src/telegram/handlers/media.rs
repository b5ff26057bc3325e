//! Photos and image documents sent for analysis

use base64::{engine::general_purpose, Engine};
use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::FileId;

use super::messages::ask_quota_or_upgrade;
use super::types::{ensure_user, HandlerDeps, HandlerError};
use crate::core::config::limits::FREE_ANALYSIS_LIMIT;
use crate::core::config::llm::max_tokens;
use crate::core::error::AppResult;
use crate::core::paywall::{self, Usage};
use crate::core::profile::profile_context;
use crate::core::prompts;
use crate::core::session::{Awaiting, ImageMode};
use crate::core::utils::now_unix;
use crate::storage::db::{self, events};
use crate::storage::{get_connection, User};
use crate::telegram::markdown::{send_long, send_markdown};

/// Where the image came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ImageSource {
    Photo,
    Document,
}

/// Downloads a Telegram file into memory and base64-encodes it.
async fn download_base64(bot: &Bot, file_id: &FileId) -> AppResult<String> {
    let file = bot.get_file(file_id.clone()).await?;
    log::debug!("Downloading {} ({} bytes)", file.path, file.size);

    let mut buf: Vec<u8> = Vec::with_capacity(file.size as usize);
    bot.download_file(&file.path, &mut buf).await?;
    Ok(general_purpose::STANDARD.encode(&buf))
}

pub(super) async fn handle_photo(bot: Bot, msg: Message, deps: HandlerDeps) -> Result<(), HandlerError> {
    let (Some(from), Some(photos)) = (msg.from.as_ref(), msg.photo()) else {
        return Ok(());
    };
    let Some(largest) = photos.iter().max_by_key(|p| p.width * p.height) else {
        return Ok(());
    };
    let (user, _) = ensure_user(&deps.db_pool, from)?;

    if !ask_quota_or_upgrade(&bot, msg.chat.id, &user, Usage::Analysis).await? {
        return Ok(());
    }

    let mode = deps
        .sessions
        .update(user.id, |s| match s.take_awaiting() {
            Awaiting::Image(mode) => mode,
            other => {
                s.awaiting = other;
                ImageMode::Analysis
            }
        })
        .await;

    let caption = msg.caption().filter(|c| !c.trim().is_empty()).unwrap_or("Analyze this.");
    analyze_image(
        &bot,
        msg.chat.id,
        &deps,
        &user,
        &largest.file.id,
        mode,
        ImageSource::Photo,
        caption,
    )
    .await
}

pub(super) async fn handle_document(bot: Bot, msg: Message, deps: HandlerDeps) -> Result<(), HandlerError> {
    let (Some(from), Some(doc)) = (msg.from.as_ref(), msg.document()) else {
        return Ok(());
    };

    let is_image = doc
        .mime_type
        .as_ref()
        .map(|m| m.essence_str().starts_with("image/"))
        .unwrap_or(false);
    if !is_image {
        bot.send_message(msg.chat.id, "📄 Send medical documents as photos (JPG/PNG).")
            .await?;
        return Ok(());
    }

    let (user, _) = ensure_user(&deps.db_pool, from)?;
    if !ask_quota_or_upgrade(&bot, msg.chat.id, &user, Usage::Analysis).await? {
        return Ok(());
    }

    analyze_image(
        &bot,
        msg.chat.id,
        &deps,
        &user,
        &doc.file.id,
        ImageMode::Analysis,
        ImageSource::Document,
        "Analyze.",
    )
    .await
}

#[allow(clippy::too_many_arguments)]
async fn analyze_image(
    bot: &Bot,
    chat_id: ChatId,
    deps: &HandlerDeps,
    user: &User,
    file_id: &FileId,
    mode: ImageMode,
    source: ImageSource,
    caption: &str,
) -> Result<(), HandlerError> {
    let (system, status) = match (mode, source) {
        (ImageMode::Document, _) => (prompts::DOCUMENT, "📄 Interpreting..."),
        (ImageMode::Analysis, ImageSource::Photo) => (prompts::ANALYSIS, "🔬 Analyzing... (30-60 sec)"),
        (ImageMode::Analysis, ImageSource::Document) => (prompts::ANALYSIS, "🔬 Analyzing..."),
    };
    let error_text = match source {
        ImageSource::Photo => "❌ Error. Try again or send a clearer photo.",
        ImageSource::Document => "❌ Error. Send as photo instead.",
    };

    bot.send_message(chat_id, status).await?;

    let image = match download_base64(bot, file_id).await {
        Ok(image) => image,
        Err(e) => {
            log::error!("Image download failed for user {}: {}", user.id, e);
            bot.send_message(chat_id, error_text).await?;
            return Ok(());
        }
    };

    let prompt = format!("{}{}", caption, profile_context(user));
    let reply = match deps.llm.vision(system, &image, &prompt, max_tokens::ANALYSIS).await {
        Ok(reply) => reply,
        Err(e) => {
            log::error!("Analysis error for user {}: {}", user.id, e);
            bot.send_message(chat_id, error_text).await?;
            return Ok(());
        }
    };

    let count = {
        let conn = get_connection(&deps.db_pool)?;
        let count = db::increment_analysis_count(&conn, user.id)?;
        let details = match source {
            ImageSource::Photo => format!("#{}", count),
            ImageSource::Document => format!("#{} (doc)", count),
        };
        db::log_event(&conn, user.id, events::ANALYSIS, &details)?;
        count
    };

    send_long(bot, chat_id, &reply).await?;

    if !paywall::has_pro(user, now_unix()) {
        let remaining = (FREE_ANALYSIS_LIMIT - count).max(0);
        if remaining > 0 {
            bot.send_message(
                chat_id,
                format!("📊 Free analyses remaining: {}/{}", remaining, FREE_ANALYSIS_LIMIT),
            )
            .await?;
        } else {
            send_markdown(bot, chat_id, prompts::last_free_analysis(), None).await?;
        }
    }

    Ok(())
}
