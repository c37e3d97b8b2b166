//! Core data model types: inbound messages, addresses, and binary parts.

pub mod address;
pub mod attachment;
pub mod message;

pub use address::Address;
pub use attachment::{Attachment, BinaryPart, PartEncoding};
pub use message::{InboundMessage, SpamRule};
