//! Centralized error types for mailhook.

use std::path::PathBuf;
use thiserror::Error;

/// Broad classification of an [`InboundError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The payload, a date, or an embedded base64 blob is malformed.
    Decode,
    /// The destination of a write could not be written.
    Io,
    /// A write was refused before touching the filesystem.
    Rejected,
}

/// All errors produced by the mailhook library.
#[derive(Error, Debug)]
pub enum InboundError {
    /// The payload is not valid JSON, or a field has the wrong JSON type.
    #[error("Invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// The payload is valid JSON but not a shape we can decode.
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// A required block is absent.
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// The event wrapping the message is not an inbound delivery.
    #[error("Event '{0}' is not an inbound message")]
    NotInbound(String),

    /// The timestamp could not be parsed.
    #[error("Invalid date: {0}")]
    InvalidDate(String),

    /// A binary part record is malformed.
    #[error("Invalid binary part '{name}': {reason}")]
    InvalidPart { name: String, reason: String },

    /// The stored content of a binary part is not valid base64.
    #[error("Invalid base64 content in '{name}': {source}")]
    InvalidBase64 {
        name: String,
        source: base64::DecodeError,
    },

    /// I/O error with the associated file path.
    #[error("I/O error writing '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The attachment name cannot be used as a plain file name.
    #[error("Refusing to write attachment with unsafe name: {0:?}")]
    UnsafeName(String),

    /// The content type is not in the caller's allow-list.
    #[error("Content type '{content_type}' of '{name}' is not allowed")]
    DisallowedType { name: String, content_type: String },
}

/// Convenience alias for `Result<T, InboundError>`.
pub type Result<T> = std::result::Result<T, InboundError>;

impl InboundError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Which of the broad error kinds this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidJson(_)
            | Self::InvalidPayload(_)
            | Self::MissingField(_)
            | Self::NotInbound(_)
            | Self::InvalidDate(_)
            | Self::InvalidPart { .. }
            | Self::InvalidBase64 { .. } => ErrorKind::Decode,
            Self::Io { .. } => ErrorKind::Io,
            Self::UnsafeName(_) | Self::DisallowedType { .. } => ErrorKind::Rejected,
        }
    }
}
