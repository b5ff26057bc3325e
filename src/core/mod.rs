//! Core utilities, configuration, and domain logic

pub mod config;
pub mod detox;
pub mod error;
pub mod food;
pub mod logging;
pub mod paywall;
pub mod profile;
pub mod prompts;
pub mod retry;
pub mod session;
pub mod utils;

// Re-exports for convenience
pub use error::{AppError, AppResult, BotError};
pub use logging::init_logger;
pub use session::SessionStore;
