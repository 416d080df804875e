use miette::Diagnostic;
use thiserror::Error;

/// Result type for trace loading and CLI operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types surfaced at the boundary of the analyzer.
///
/// Analysis itself never fails; these only come from reading traces and
/// configuration.
#[derive(Error, Debug, Diagnostic, Clone)]
pub enum Error {
    #[error("I/O error: {0}")]
    #[diagnostic(code(algoviz::io_error))]
    Io(String),

    #[error("Malformed trace: {message}")]
    #[diagnostic(
        code(algoviz::trace_format),
        help("traces are JSON arrays of call / return / var_change events")
    )]
    TraceFormat { message: String },

    #[error("Invalid configuration: {message}")]
    #[diagnostic(code(algoviz::config_error))]
    Config { message: String },
}

impl Error {
    /// Create a trace format error
    pub fn trace_format(message: impl Into<String>) -> Self {
        Error::TraceFormat {
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

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        if err.is_io() {
            Error::Io(err.to_string())
        } else {
            Error::trace_format(err.to_string())
        }
    }
}
