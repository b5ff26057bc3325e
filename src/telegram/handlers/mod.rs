//! Telegram bot handler tree configuration
//!
//! The dispatcher schema lives here so integration tests can build the same
//! handler tree as production code.

mod callbacks;
mod commands;
mod media;
mod messages;
mod schema;
mod types;

pub use callbacks::CallbackAction;
pub use schema::schema;
pub use types::{ensure_user, HandlerDeps, HandlerError};
