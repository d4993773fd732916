//! Error types for the console binary.

use petri_control::config::ConfigError;
use petri_control::engine::EngineError;

/// Top-level error for the console binary.
#[derive(Debug, thiserror::Error)]
pub enum ConsoleError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: ConfigError,
    },

    /// The engine client could not be built.
    #[error("engine client error: {source}")]
    Engine {
        /// The underlying engine error.
        #[from]
        source: EngineError,
    },

    /// Reading stdin failed.
    #[error("console I/O error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// An input line could not be understood.
    #[error("{message}")]
    Usage {
        /// What was wrong with the line.
        message: String,
    },
}

impl ConsoleError {
    pub(crate) fn usage(message: impl Into<String>) -> Self {
        Self::Usage {
            message: message.into(),
        }
    }
}
