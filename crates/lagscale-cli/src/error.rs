//! Error types for the CLI

use lagscale_common::telemetry::TelemetryError;

/// CLI Result type
pub type Result<T> = std::result::Result<T, Error>;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Error from the shared library (cluster, command, template, ...)
    #[error(transparent)]
    Common(#[from] lagscale_common::Error),

    /// A base-infrastructure step failed; remaining scenarios are skipped
    #[error("setup failed at {step}: {message}")]
    Setup {
        /// The setup step that failed
        step: String,
        /// Description of what failed
        message: String,
    },

    /// Invalid flags, environment or env file
    #[error("configuration error: {message}")]
    Config {
        /// Description of what is wrong
        message: String,
    },

    /// Logging could not be initialized
    #[error("logging setup failed: {0}")]
    Telemetry(#[from] TelemetryError),

    /// The run finished but at least one scenario or setup step failed
    #[error("{failed} of {total} scenarios failed")]
    RunFailed {
        /// Scenarios that did not pass (including skipped ones)
        failed: usize,
        /// Scenarios selected for the run
        total: usize,
    },
}

impl Error {
    /// Create a setup error for a named step
    pub fn setup(step: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Setup {
            step: step.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
        }
    }
}
