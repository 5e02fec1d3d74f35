/// Error types for the soundboard core
///
/// This module defines every failure the store, the capture session and the
/// playback helper can surface to the UI layer.
/// Uses thiserror for ergonomic error handling.

use crate::core::CaptureState;
use thiserror::Error;

/// Main error type for soundboard operations
#[derive(Error, Debug)]
pub enum SoundboardError {
    /// No place to keep data on this host
    #[error("Persistent storage unavailable: {0}")]
    UnsupportedEnvironment(String),

    /// A required field was missing on create
    #[error("Validation error: {0}")]
    Validation(String),

    /// Underlying database I/O or transaction failure
    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),

    /// The database was written by a newer build
    #[error("Database schema version {found} is newer than supported {supported}")]
    SchemaTooNew { found: i64, supported: i64 },

    /// Microphone access refused (or the device could not be opened)
    #[error("Microphone access denied: {0}")]
    PermissionDenied(String),

    /// The microphone failed while recording
    #[error("Capture device failed: {0}")]
    DeviceFailure(String),

    /// Operation not allowed in the current capture state
    #[error("Cannot {action} while {state}")]
    InvalidStateTransition {
        state: CaptureState,
        action: &'static str,
    },

    /// Audio sink could not play a blob
    #[error("Playback failed: {0}")]
    Playback(String),
}

/// Result type alias for soundboard operations
pub type Result<T> = std::result::Result<T, SoundboardError>;

/// Convert SoundboardError to a user-friendly error message
impl SoundboardError {
    pub fn user_message(&self) -> String {
        match self {
            SoundboardError::UnsupportedEnvironment(_) => {
                "This device can't save pictures and sounds.".to_string()
            }
            SoundboardError::Validation(reason) => {
                format!("Something is missing: {}", reason)
            }
            SoundboardError::Storage(e) => {
                format!("Saving failed. Please try again. Details: {}", e)
            }
            SoundboardError::SchemaTooNew { .. } => {
                "Your saved board was made by a newer version. Please update.".to_string()
            }
            SoundboardError::PermissionDenied(_) => {
                "Microphone access is needed to record a sound. Please allow it and try again."
                    .to_string()
            }
            SoundboardError::DeviceFailure(_) => {
                "The microphone stopped working. Please record again.".to_string()
            }
            SoundboardError::InvalidStateTransition { .. } => {
                "Already recording.".to_string()
            }
            SoundboardError::Playback(_) => "Couldn't play that sound.".to_string(),
        }
    }

    /// Whether the caller can simply try the same thing again
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SoundboardError::PermissionDenied(_)
                | SoundboardError::DeviceFailure(_)
                | SoundboardError::Playback(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_user_messages() {
        let err = SoundboardError::Validation("picture".to_string());
        assert!(err.user_message().contains("picture"));

        let err = SoundboardError::PermissionDenied("NotAllowedError".to_string());
        assert!(err.user_message().contains("Microphone"));
    }

    #[test]
    fn test_error_display() {
        let err = SoundboardError::InvalidStateTransition {
            state: CaptureState::Recording,
            action: "start",
        };
        assert_eq!(err.to_string(), "Cannot start while recording");

        let err = SoundboardError::SchemaTooNew {
            found: 3,
            supported: 1,
        };
        assert!(err.to_string().contains("newer than supported 1"));
    }

    #[test]
    fn test_retryable() {
        assert!(SoundboardError::PermissionDenied("no".into()).is_retryable());
        assert!(!SoundboardError::Validation("name".into()).is_retryable());
    }
}
