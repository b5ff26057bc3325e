use anyhow::Result;
use dotenvy::dotenv;
use std::sync::Arc;
use std::time::Duration;
use teloxide::prelude::*;
use tokio::time::sleep;

use metabolic_center::cli::{Cli, Commands};
use metabolic_center::core::logging::log_startup_configuration;
use metabolic_center::core::utils::now_unix;
use metabolic_center::core::{config, init_logger, SessionStore};
use metabolic_center::llm::LlmClient;
use metabolic_center::storage::{create_pool, db, get_connection};
use metabolic_center::telegram::admin::format_stats;
use metabolic_center::telegram::{create_bot, reminders, schema, setup_bot_commands, HandlerDeps};

/// Main entry point for the Telegram bot
///
/// Parses CLI arguments and dispatches to appropriate subcommand.
///
/// # Errors
/// Returns an error if initialization fails (logging, database, bot creation).
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    // Keep the process alive and log the panic instead of losing it
    std::panic::set_hook(Box::new(|panic_info| {
        log::error!("Panic caught: {:?}", panic_info);
        if let Some(location) = panic_info.location() {
            log::error!("Panic at {}:{}:{}", location.file(), location.line(), location.column());
        }
        if let Some(msg) = panic_info.payload().downcast_ref::<&str>() {
            log::error!("Panic message: {}", msg);
        }
    }));

    // .env must be loaded before any config value is read
    let _ = dotenv();

    init_logger(&config::LOG_FILE_PATH)?;

    match cli.command {
        Some(Commands::Run { no_reminders }) => run_bot(!no_reminders).await,
        Some(Commands::Stats) => print_stats(),
        Some(Commands::Migrate) => run_migrations(),
        None => {
            log::info!("No command specified, running bot in default mode");
            run_bot(true).await
        }
    }
}

fn print_stats() -> Result<()> {
    let pool = create_pool(&config::DATABASE_PATH)?;
    let conn = get_connection(&pool)?;
    let stats = db::get_stats(&conn, now_unix())?;
    println!("{}", format_stats(&stats));
    Ok(())
}

fn run_migrations() -> Result<()> {
    create_pool(&config::DATABASE_PATH)?;
    log::info!("Database at {} is up to date", config::DATABASE_PATH.as_str());
    Ok(())
}

async fn run_bot(with_reminders: bool) -> Result<()> {
    log::info!("Starting bot...");
    log_startup_configuration();
    config::validate_required()?;

    let db_pool = Arc::new(
        create_pool(&config::DATABASE_PATH).map_err(|e| anyhow::anyhow!("Failed to create database pool: {}", e))?,
    );
    let llm = Arc::new(LlmClient::from_config()?);
    let bot = create_bot()?;

    // Retry while the Bot API is unreachable or still starting
    let bot_info = {
        let startup_max_retries = 60;
        let mut startup_retry = 0;
        loop {
            match bot.get_me().await {
                Ok(info) => break info,
                Err(e) => {
                    let err_str = e.to_string();
                    let is_retryable = err_str.contains("restart")
                        || err_str.contains("network")
                        || err_str.contains("connection")
                        || err_str.contains("timed out")
                        || err_str.contains("Connection refused");

                    startup_retry += 1;
                    if startup_retry >= startup_max_retries || !is_retryable {
                        return Err(anyhow::anyhow!(
                            "Failed to connect to Bot API after {} retries: {}",
                            startup_retry,
                            e
                        ));
                    }

                    log::warn!(
                        "Bot API not ready (attempt {}/{}): {}. Retrying in 5 seconds...",
                        startup_retry,
                        startup_max_retries,
                        err_str
                    );
                    sleep(Duration::from_secs(5)).await;
                }
            }
        }
    };
    let bot_username = bot_info.username.clone();
    log::info!("Bot username: {:?}, Bot ID: {}", bot_username, bot_info.id);

    if let Err(e) = setup_bot_commands(&bot).await {
        log::warn!("Failed to publish bot commands: {}", e);
    }

    let deps = HandlerDeps::new(Arc::clone(&db_pool), SessionStore::new(), llm, bot_username);

    let _reminder_handle = if with_reminders && *config::reminders::ENABLED {
        Some(reminders::spawn(bot.clone(), Arc::clone(&db_pool)))
    } else {
        log::info!("Reminder loop not started");
        None
    };

    let handler = schema(deps);
    let max_retries = config::retry::MAX_DISPATCHER_RETRIES;
    let mut retry_count = 0;

    loop {
        log::info!("Starting dispatcher...");
        let bot_clone = bot.clone();
        let handler_clone = handler.clone();

        // A panic inside the dispatcher surfaces as a JoinError
        let handle = tokio::spawn(async move {
            Dispatcher::builder(bot_clone, handler_clone)
                .enable_ctrlc_handler()
                .build()
                .dispatch()
                .await
        });

        match handle.await {
            Ok(()) => {
                log::info!("Dispatcher shutdown gracefully");
                break;
            }
            Err(join_err) if join_err.is_panic() => {
                log::error!("Dispatcher panicked: {}", join_err);
                if retry_count >= max_retries {
                    log::error!("Max retries reached after panic. Exiting...");
                    break;
                }
                retry_count += 1;
                log::info!(
                    "Retrying dispatcher after panic (attempt {}/{})...",
                    retry_count,
                    max_retries
                );
                exponential_backoff(retry_count).await;
            }
            Err(join_err) => {
                log::warn!("Dispatcher task was cancelled: {}", join_err);
                break;
            }
        }

        sleep(config::retry::dispatcher_delay()).await;
    }

    Ok(())
}

async fn exponential_backoff(retry_count: u32) {
    let delay = Duration::from_secs(config::retry::EXPONENTIAL_BACKOFF_BASE.pow(retry_count));
    sleep(delay).await;
}
