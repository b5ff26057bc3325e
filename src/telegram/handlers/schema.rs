//! Dispatcher schema and handler chain builders

use teloxide::dispatching::{UpdateFilterExt, UpdateHandler};
use teloxide::prelude::*;
use teloxide::types::Message;

use super::callbacks::handle_callback;
use super::commands::{
    handle_detox, handle_food, handle_help, handle_profile, handle_referral, handle_start, handle_timezone,
    handle_trial,
};
use super::media::{handle_document, handle_photo};
use super::messages::handle_text;
use super::types::{HandlerDeps, HandlerError};
use crate::telegram::admin::{handle_setpro_command, handle_stats_command};
use crate::telegram::bot::Command;

/// Creates the main dispatcher schema for the Telegram bot.
///
/// The same tree is used in production and in integration tests.
pub fn schema(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    dptree::entry()
        .branch(command_handler(deps.clone()))
        .branch(photo_handler(deps.clone()))
        .branch(document_handler(deps.clone()))
        .branch(text_handler(deps.clone()))
        .branch(callback_handler(deps))
}

fn command_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message().branch(dptree::entry().filter_command::<Command>().endpoint(
        move |bot: Bot, msg: Message, cmd: Command| {
            let deps = deps.clone();
            async move {
                log::info!("🎯 Received command: {:?} from chat {}", cmd, msg.chat.id);

                match cmd {
                    Command::Start(payload) => handle_start(&bot, &msg, &deps, &payload).await?,
                    Command::Profile => handle_profile(&bot, &msg, &deps).await?,
                    Command::Trial => handle_trial(&bot, &msg, &deps).await?,
                    Command::Referral => handle_referral(&bot, &msg, &deps).await?,
                    Command::Detox => handle_detox(&bot, &msg, &deps).await?,
                    Command::Food => handle_food(&bot, &msg, &deps).await?,
                    Command::Timezone(arg) => handle_timezone(&bot, &msg, &deps, &arg).await?,
                    Command::Help => handle_help(&bot, &msg).await?,
                    Command::Stats => handle_stats_command(&bot, &msg, &deps.db_pool).await?,
                    Command::Setpro(args) => handle_setpro_command(&bot, &msg, &deps.db_pool, &args).await?,
                }
                Ok(())
            }
        },
    ))
}

fn photo_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message()
        .filter(|msg: Message| msg.photo().is_some())
        .endpoint(move |bot: Bot, msg: Message| handle_photo(bot, msg, deps.clone()))
}

fn document_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message()
        .filter(|msg: Message| msg.document().is_some())
        .endpoint(move |bot: Bot, msg: Message| handle_document(bot, msg, deps.clone()))
}

fn text_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message()
        .filter(|msg: Message| msg.text().is_some())
        .endpoint(move |bot: Bot, msg: Message| handle_text(bot, msg, deps.clone()))
}

fn callback_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_callback_query().endpoint(move |bot: Bot, q: CallbackQuery| handle_callback(bot, q, deps.clone()))
}
