use teloxide::prelude::*;
use teloxide::types::{ParseMode, ReplyMarkup};
use teloxide::RequestError;

use crate::core::config;
use crate::core::utils::split_message;

fn is_markdown_parse_error(err: &RequestError) -> bool {
    err.to_string().to_lowercase().contains("can't parse entities")
}

/// Sends legacy-Markdown text, falling back to plain text when Telegram
/// rejects the markup. Model replies routinely contain unbalanced `*` or `_`.
#[allow(deprecated)]
pub async fn send_markdown(
    bot: &Bot,
    chat_id: ChatId,
    text: impl Into<String>,
    markup: Option<ReplyMarkup>,
) -> ResponseResult<Message> {
    let text = text.into();
    let mut req = bot.send_message(chat_id, text.clone()).parse_mode(ParseMode::Markdown);
    if let Some(kb) = markup.clone() {
        req = req.reply_markup(kb);
    }

    match req.await {
        Ok(msg) => Ok(msg),
        Err(e) if is_markdown_parse_error(&e) => {
            log::debug!("Markdown rejected for chat {}, resending as plain text", chat_id);
            let mut retry = bot.send_message(chat_id, text);
            if let Some(kb) = markup {
                retry = retry.reply_markup(kb);
            }
            retry.await
        }
        Err(e) => Err(e),
    }
}

/// Sends `text` in as many chunks as needed.
pub async fn send_long(bot: &Bot, chat_id: ChatId, text: &str) -> ResponseResult<()> {
    for chunk in split_message(text, config::telegram::MAX_MESSAGE_CHARS) {
        if chunk.trim().is_empty() {
            continue;
        }
        send_markdown(bot, chat_id, chunk, None).await?;
    }
    Ok(())
}
