/// Database module for the soundboard
///
/// Handles all database operations using SQLite and sqlx.
/// Two collections: `categories` and `items`.

pub mod connection;
pub mod migrations;
pub mod models;
pub mod queries;

pub use connection::{Database, DatabaseStats};
pub use models::*;
