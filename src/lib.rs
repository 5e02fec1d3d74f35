/// soundboard library
///
/// Persistence core and audio capture for a picture/sound board: categories
/// and items in SQLite, microphone takes turned into sound blobs.

pub mod config;
pub mod core;
pub mod db;
pub mod error;
pub mod logging;

// Re-exports for convenience
pub use config::{CaptureConfig, StoreConfig, StoreLocation};
pub use crate::core::{CaptureSession, CaptureState, ObjectUrlTable, Player, Store};
pub use db::{Blob, Category, Database, Item, NewCategory, NewItem};
pub use error::{Result, SoundboardError};
pub use logging::{default_log_level, init_logging};
