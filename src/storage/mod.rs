//! SQLite persistence: connection pool, schema migrations and queries

pub mod db;
pub mod migrations;

// Re-exports for convenience
pub use db::{create_pool, get_connection, BotStats, DbConnection, DbPool, FoodEntry, Symptom, User};
