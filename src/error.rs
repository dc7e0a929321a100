//! Error types shared across the engine.

use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VttyError {
    #[error("Interface not started")]
    NotStarted,

    #[error("Interface already started")]
    AlreadyStarted,

    #[error("Interface already shut down")]
    AlreadyShutdown,

    #[error("No {registry} handler registered for scheme {scheme:?}")]
    UnknownScheme { registry: &'static str, scheme: String },

    #[error("Malformed URI {uri:?}: {reason}")]
    MalformedUri { uri: String, reason: String },

    #[error("Plugin for scheme {scheme:?} rejected: {reason}")]
    InvalidPlugin { scheme: String, reason: String },

    #[error("Capture interrupted: interface shut down")]
    InterruptedCapture,

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Client error: {0}")]
    Client(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl VttyError {
    pub(crate) fn malformed(uri: &str, reason: impl Into<String>) -> Self {
        VttyError::MalformedUri {
            uri: uri.to_string(),
            reason: reason.into(),
        }
    }

    /// True for the errors a backend sees when the interface went away underneath it.
    pub fn is_shutdown(&self) -> bool {
        matches!(self, VttyError::AlreadyShutdown | VttyError::InterruptedCapture)
    }
}

/// Raised inside the interpreter when a pending escape sequence overruns its
/// lookahead budget. Recovered locally; reported only as an event.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Escape sequence exceeded {limit} bytes without a terminator")]
pub struct CorruptSequenceError {
    pub limit: usize,
}

pub type Result<T> = std::result::Result<T, VttyError>;
