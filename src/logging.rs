use flexi_logger::{Logger, LoggerHandle};

use crate::config::LoggingConfig;
use crate::error::DeckError;

/// Start the process-wide logger. `RUST_LOG`, when set, takes precedence
/// over the configured levels.
///
/// The returned handle must be kept alive for the life of the program.
pub fn init_logging(config: &LoggingConfig) -> Result<LoggerHandle, DeckError> {
    let spec = config.log_spec();
    Logger::try_with_env_or_str(&spec)
        .map_err(|e| DeckError::Config(format!("Invalid log specification '{}': {}", spec, e)))?
        .log_to_stderr()
        .format(flexi_logger::detailed_format)
        .start()
        .map_err(|e| DeckError::Config(format!("Failed to start logger: {}", e)))
}
