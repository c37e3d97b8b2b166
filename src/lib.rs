//! `mailhook` — decode inbound-email webhook payloads.
//!
//! This crate turns the JSON a transactional-email provider posts for each
//! received message into an [`InboundMessage`]: addresses normalized to
//! `(name, email)` pairs, a parsed timestamp, authentication and spam
//! verdicts, and binary parts split into attachments and inline images that
//! can be written to disk.

pub mod config;
pub mod error;
pub mod export;
pub mod model;
pub mod parser;

pub use error::{ErrorKind, InboundError, Result};
pub use model::{Address, Attachment, BinaryPart, InboundMessage};
