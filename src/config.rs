/// Configuration for the store and the capture session
///
/// Nothing is read from the environment. The UI layer builds these values
/// and hands them over.

use crate::error::{Result, SoundboardError};
use std::path::PathBuf;
use std::time::Duration;

/// Fixed application identifier, used as the data directory name
pub const APP_ID: &str = "soundboard";

/// Database file inside the application data directory
pub const DATABASE_FILE: &str = "soundboard.db";

/// MIME type tag put on finished recordings
pub const DEFAULT_AUDIO_MIME_TYPE: &str = "audio/webm";

const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Where the database lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    /// `<platform data dir>/soundboard/soundboard.db`
    Default,
    /// An explicit file path
    File(PathBuf),
    /// Private in-memory database, gone when the store closes
    Memory,
}

/// Store configuration
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub location: StoreLocation,
    pub busy_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            location: StoreLocation::Default,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }
}

impl StoreConfig {
    /// Store backed by a specific database file
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            location: StoreLocation::File(path.into()),
            ..Self::default()
        }
    }

    /// Store backed by an in-memory database
    pub fn in_memory() -> Self {
        Self {
            location: StoreLocation::Memory,
            ..Self::default()
        }
    }

    /// Resolve the database file path
    ///
    /// Returns `Ok(None)` for in-memory stores. Fails with
    /// `UnsupportedEnvironment` when the host has no data directory.
    pub fn database_path(&self) -> Result<Option<PathBuf>> {
        match &self.location {
            StoreLocation::Default => dirs::data_dir()
                .map(|dir| Some(dir.join(APP_ID).join(DATABASE_FILE)))
                .ok_or_else(|| {
                    SoundboardError::UnsupportedEnvironment(
                        "no data directory on this host".to_string(),
                    )
                }),
            StoreLocation::File(path) => Ok(Some(path.clone())),
            StoreLocation::Memory => Ok(None),
        }
    }
}

/// Capture session configuration
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Type tag for the finished blob
    pub mime_type: String,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            mime_type: DEFAULT_AUDIO_MIME_TYPE.to_string(),
        }
    }
}
