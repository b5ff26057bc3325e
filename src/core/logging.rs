//! Logging initialization and startup diagnostics
//!
//! This module provides:
//! - Logger initialization (console + file)
//! - A startup banner with the effective configuration

use anyhow::Result;
use simplelog::*;
use std::fs::OpenOptions;

use crate::core::config;

/// Initialize logger for both console and file output
///
/// # Arguments
/// * `log_file_path` - Path to the log file (appended to, created if missing)
///
/// # Returns
/// * `Ok(())` - Logger initialized successfully
/// * `Err(anyhow::Error)` - Failed to initialize logger
pub fn init_logger(log_file_path: &str) -> Result<()> {
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file_path)
        .map_err(|e| anyhow::anyhow!("Failed to open log file: {}", e))?;

    let log_config = ConfigBuilder::new()
        .add_filter_ignore_str("hyper")
        .add_filter_ignore_str("reqwest")
        .build();

    CombinedLogger::init(vec![
        TermLogger::new(
            LevelFilter::Info,
            log_config.clone(),
            TerminalMode::Mixed,
            ColorChoice::Auto,
        ),
        WriteLogger::new(LevelFilter::Info, log_config, log_file),
    ])
    .map_err(|e| anyhow::anyhow!("Failed to initialize logger: {}", e))?;

    Ok(())
}

/// Logs the effective configuration at startup. Secrets are never printed.
pub fn log_startup_configuration() {
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    log::info!("🧬 Metabolic Center configuration");
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    log::info!("Database: {}", config::DATABASE_PATH.as_str());
    log::info!("Model: {} @ {}", config::llm::MODEL.as_str(), config::llm::BASE_URL.as_str());
    log::info!(
        "Free tier: {} analyses, {} chats",
        config::limits::FREE_ANALYSIS_LIMIT,
        config::limits::FREE_CHAT_LIMIT
    );

    if config::admin::ADMIN_IDS.is_empty() {
        log::warn!("⚠️  ADMIN_IDS not set - /stats and /setpro are disabled");
    } else {
        log::info!("Admins: {}", config::admin::ADMIN_IDS.len());
    }

    if *config::reminders::ENABLED {
        log::info!(
            "Reminders: detox at {:02}:00, food summary at {:02}:00 (user local time)",
            config::reminders::DETOX_REMINDER_HOUR,
            config::reminders::FOOD_SUMMARY_HOUR
        );
    } else {
        log::info!("Reminders disabled (REMINDERS_ENABLED=false)");
    }
}
