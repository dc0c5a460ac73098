//! Dispatch-level errors
//!
//! `Error` is what controllers, formatters and clients hand back to the
//! dispatch boundary. HTTP exceptions ride along as one variant; everything
//! that is not an HTTP exception becomes a 500 at the boundary.

use crate::exception::HttpException;
use crate::http;

/// Result type for dispatch operations
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An HTTP exception carrying its own response
    #[error("{0}")]
    Http(#[from] HttpException),

    /// Developer or deployment mistake, e.g. an abstract controller or an
    /// unknown REST format
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A handler broke its contract, e.g. by not returning a response
    #[error("Contract violation: {0}")]
    ContractViolation(String),

    /// A REST formatter failed to render a body
    #[error("Format error: {0}")]
    Format(String),

    /// The remote origin could not be reached or spoke broken HTTP
    #[error("Transport error: {0}")]
    Transport(#[from] http::Error),

    /// Any other failure raised by application code
    #[error(transparent)]
    Handler(Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    /// Wrap an application error
    pub fn handler<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::Handler(Box::new(error))
    }

    /// Short name of the error class, used in logs and exposed error bodies
    pub fn class(&self) -> &'static str {
        match self {
            Error::Http(_) => "HttpException",
            Error::Configuration(_) => "ConfigurationError",
            Error::ContractViolation(_) => "ContractViolation",
            Error::Format(_) => "FormatError",
            Error::Transport(_) => "TransportError",
            Error::Handler(_) => "HandlerError",
        }
    }
}
