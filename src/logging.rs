/// Tracing bootstrap
///
/// The core only emits `tracing` events. Hosts that want them on stderr call
/// `init_logging` once at startup.

use std::sync::OnceLock;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

static ACTIVE_LEVEL: OnceLock<&'static str> = OnceLock::new();

/// Install a fmt subscriber filtered at `level`
///
/// Calling again with the same level is a no-op. A different level, or a
/// subscriber installed by someone else, is reported as an error.
pub fn init_logging(level: &str) -> Result<(), String> {
    let level = normalize_level(level)?;

    if let Some(active) = ACTIVE_LEVEL.get() {
        if *active == level {
            return Ok(());
        }
        return Err(format!(
            "logging already initialized with level `{}`; refusing to switch to `{}`",
            active, level
        ));
    }

    let filter = EnvFilter::try_new(level).map_err(|e| format!("invalid filter: {}", e))?;
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .try_init()
        .map_err(|e| format!("failed to install subscriber: {}", e))?;

    let _ = ACTIVE_LEVEL.set(level);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), level, "logging started");
    Ok(())
}

/// Default level for the current build
pub fn default_log_level() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    }
}

fn normalize_level(level: &str) -> Result<&'static str, String> {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => Ok("trace"),
        "debug" => Ok("debug"),
        "info" => Ok("info"),
        "warn" | "warning" => Ok("warn"),
        "error" => Ok("error"),
        other => Err(format!(
            "unsupported log level `{}`; expected trace|debug|info|warn|error",
            other
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_level() {
        assert_eq!(normalize_level(" WARNING ").unwrap(), "warn");
        assert_eq!(normalize_level("Info").unwrap(), "info");
        assert!(normalize_level("loud").is_err());
    }

    #[test]
    fn test_init_is_idempotent_and_rejects_conflicts() {
        init_logging("info").unwrap();
        init_logging("INFO").unwrap();

        let err = init_logging("debug").unwrap_err();
        assert!(err.contains("refusing to switch"));
    }
}
