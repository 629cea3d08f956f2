use std::{fmt, io};

use regex::Error as RegexError;
use serde::{Deserialize, Serialize};
use serde_json::Error as JsonError;
use thiserror::Error;
use tokio::sync::mpsc::error::SendError as TokioSendError;

use crate::event::ThoughtEvent;

/// Errors produced by the graph model, its reducers and the sync layer.
///
/// `EmptyPath` and `InvalidPath` are programmer errors: a reducer returns them without
/// touching state. User-facing rejections (`Validation`) and persistence failures (`Sync`)
/// are normally converted into an [`crate::state::Alert`] at the boundary that detects them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
pub enum OutlineError {
    #[error("Empty path: an operation required at least one thought id")]
    EmptyPath,
    #[error("Invalid path: {0}")]
    InvalidPath(String),
    #[error("Item Not Found: {0}")]
    NotFound(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Sync failure: {0}")]
    Sync(String),
    #[error("(De)Serialization error: {0}")]
    Serialization(String),
    #[error("File System error: {0}")]
    Io(String),
    #[error("You do not have permission to access this resource")]
    PermissionDenied,
    #[error("Custom error: {0}")]
    Custom(String),
}

impl OutlineError {
    /// True for errors that indicate a broken caller invariant rather than bad input.
    pub fn is_programmer_error(&self) -> bool {
        matches!(self, OutlineError::EmptyPath | OutlineError::InvalidPath(_))
    }
}

impl From<toml::de::Error> for OutlineError {
    fn from(src: toml::de::Error) -> OutlineError {
        OutlineError::Serialization(format!("Toml deserialization error: {src}"))
    }
}

impl From<toml::ser::Error> for OutlineError {
    fn from(src: toml::ser::Error) -> OutlineError {
        OutlineError::Serialization(format!("Toml serialization error: {src}"))
    }
}

impl From<JsonError> for OutlineError {
    fn from(src: JsonError) -> OutlineError {
        OutlineError::Serialization(format!("JSON (de)serialization error: {src}"))
    }
}

impl From<uuid::Error> for OutlineError {
    fn from(src: uuid::Error) -> OutlineError {
        OutlineError::Serialization(format!("UUID conversion failed: {src}"))
    }
}

impl From<io::Error> for OutlineError {
    fn from(x: io::Error) -> Self {
        match x.kind() {
            io::ErrorKind::NotFound => OutlineError::NotFound(format!("{x}")),
            io::ErrorKind::PermissionDenied => OutlineError::PermissionDenied,
            _ => OutlineError::Io(format!("IOError: {}", x.kind())),
        }
    }
}

impl From<fmt::Error> for OutlineError {
    fn from(x: fmt::Error) -> Self {
        OutlineError::Custom(format!("{x}"))
    }
}

impl From<RegexError> for OutlineError {
    fn from(x: RegexError) -> Self {
        OutlineError::Serialization(format!("Regex parse failed: {x}"))
    }
}

impl From<TokioSendError<ThoughtEvent>> for OutlineError {
    fn from(x: TokioSendError<ThoughtEvent>) -> Self {
        OutlineError::Io(format!(
            "Channel update send Error, could not transmit state update event {:?}",
            x.0
        ))
    }
}
