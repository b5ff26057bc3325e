//! Metabolic Center - Telegram bot for metabolic health
//!
//! Users complete a short health profile, then send blood-test photos or
//! medical documents for analysis, ask for meal plans and supplement
//! protocols, track symptoms and food, and follow a 7-day detox program.
//! Answers come from a hosted chat-completions model.
//!
//! # Module Structure
//!
//! - `core`: Configuration, errors, logging, sessions and domain logic
//! - `llm`: Client for the chat-completions API
//! - `storage`: SQLite pool, migrations and queries
//! - `telegram`: Bot setup, handlers, keyboards and reminders

#![allow(clippy::too_many_arguments)]

pub mod cli;
pub mod core;
pub mod llm;
pub mod storage;
pub mod telegram;

// Re-export commonly used types for convenience
pub use core::{config, BotError, SessionStore};
pub use llm::LlmClient;
pub use storage::{create_pool, get_connection, DbConnection, DbPool};
pub use telegram::{create_bot, schema, HandlerDeps};
