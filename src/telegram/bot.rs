//! Bot initialization and command definitions

use reqwest::ClientBuilder;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;

use crate::core::config;

/// Bot commands enum with descriptions
#[derive(BotCommands, Clone, Debug, PartialEq)]
#[command(rename_rule = "lowercase", description = "Metabolic Center commands:")]
pub enum Command {
    #[command(description = "restart and set up your profile")]
    Start(String),
    #[command(description = "your profile and usage")]
    Profile,
    #[command(description = "start your free Pro trial")]
    Trial,
    #[command(description = "invite friends, earn Pro days")]
    Referral,
    #[command(description = "7-day detox program")]
    Detox,
    #[command(description = "today's food diary")]
    Food,
    #[command(description = "set your UTC offset, e.g. /timezone +3")]
    Timezone(String),
    #[command(description = "show help")]
    Help,
    #[command(hide)]
    Stats,
    #[command(hide)]
    Setpro(String),
}

/// Creates a Bot instance with custom or default API URL
///
/// Uses `BOT_TOKEN` (or `TELOXIDE_TOKEN`) and, when set, `BOT_API_URL`.
pub fn create_bot() -> anyhow::Result<Bot> {
    let client = ClientBuilder::new().timeout(config::network::timeout()).build()?;
    let bot = Bot::with_client(config::BOT_TOKEN.as_str(), client);

    let bot = if let Ok(bot_api_url) = std::env::var("BOT_API_URL") {
        log::info!("Using custom Bot API URL: {}", bot_api_url);
        let url = url::Url::parse(&bot_api_url).map_err(|e| anyhow::anyhow!("Invalid BOT_API_URL: {}", e))?;
        bot.set_api_url(url)
    } else {
        bot
    };

    Ok(bot)
}

/// Publishes the visible commands in the Telegram UI. Admin commands stay hidden.
pub async fn setup_bot_commands(bot: &Bot) -> Result<(), teloxide::RequestError> {
    bot.set_my_commands(Command::bot_commands()).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_start_payload() {
        let cmd = Command::parse("/start ref_MC1A", "metabolic_bot").unwrap();
        assert_eq!(cmd, Command::Start("ref_MC1A".to_string()));

        let cmd = Command::parse("/start", "metabolic_bot").unwrap();
        assert_eq!(cmd, Command::Start(String::new()));
    }

    #[test]
    fn admin_commands_are_hidden() {
        let visible: Vec<String> = Command::bot_commands().into_iter().map(|c| c.command).collect();
        assert!(visible.iter().any(|c| c.ends_with("profile")));
        assert!(!visible.iter().any(|c| c.ends_with("stats") || c.ends_with("setpro")));
    }
}
