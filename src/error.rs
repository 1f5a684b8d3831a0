//! Error types for loadproof

use thiserror::Error;

/// Result type for loadproof operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for loadproof
///
/// Browser- and process-level failures are typed errors and abort the current
/// check. Anything observed about an individual network request (HTTP errors,
/// blocked loads) is recorded as data on the captured event, never raised here.
#[derive(Debug, Error)]
pub enum Error {
    /// Failed to launch Chrome
    #[error("Failed to launch Chrome: {0}")]
    Launch(String),

    /// Chrome not found on this system
    #[error("Chrome not found")]
    ChromeNotFound,

    /// Transport error
    #[error("Transport error: {context}")]
    Transport {
        context: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// CDP protocol error
    #[error("CDP error in {method}: {message} (code {code})")]
    Cdp {
        method: String,
        code: i64,
        message: String,
    },

    /// Navigation error (DNS/TLS/connection failure reaching the target site)
    #[error("Navigation error: {0}")]
    Navigation(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error talking to a collaborator service
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// A collaborator service rejected the request (auth, quota, bad request)
    #[error("{service} error: {message}")]
    Api { service: String, message: String },

    /// Required configuration is missing (e.g. an API key env var)
    #[error("Missing configuration: {0}")]
    MissingConfig(String),
}

impl Error {
    /// Create a transport error with context
    pub fn transport(context: impl Into<String>) -> Self {
        Self::Transport {
            context: context.into(),
            source: None,
        }
    }

    /// Create a transport error with IO source
    pub fn transport_io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Transport {
            context: context.into(),
            source: Some(source),
        }
    }

    /// Create a CDP error with full context
    pub fn cdp(method: impl Into<String>, code: i64, message: impl Into<String>) -> Self {
        Self::Cdp {
            method: method.into(),
            code,
            message: message.into(),
        }
    }

    /// Create a collaborator service error
    pub fn api(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            service: service.into(),
            message: message.into(),
        }
    }
}
