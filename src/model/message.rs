//! The decoded inbound message.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use super::address::Address;
use super::attachment::Attachment;
use crate::error::Result;
use crate::parser::envelope;

/// One rule that contributed to the provider's spam score.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SpamRule {
    pub name: String,
    pub score: f64,
    #[serde(default)]
    pub description: String,
}

/// A single inbound email delivery decoded from a webhook payload.
///
/// Built once by [`InboundMessage::from_json`] and immutable afterwards.
/// Binary parts are split by content type: `image/*` into [`images`](Self::images),
/// everything else into [`attachments`](Self::attachments).
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub(crate) subject: String,
    pub(crate) message_id: String,
    pub(crate) sender: Address,
    pub(crate) to: Vec<Address>,
    pub(crate) cc: Vec<Address>,
    pub(crate) headers: BTreeMap<String, String>,
    pub(crate) html_body: Option<String>,
    pub(crate) text_body: Option<String>,
    pub(crate) date: DateTime<Utc>,
    pub(crate) mailbox_hash: String,
    pub(crate) spf: String,
    pub(crate) spf_detail: Option<String>,
    pub(crate) dkim_signed: bool,
    pub(crate) dkim_valid: bool,
    pub(crate) spam_score: f64,
    pub(crate) spam_rules: Vec<SpamRule>,
    pub(crate) inbound_address: String,
    pub(crate) tags: Vec<String>,
    pub(crate) raw_message: Option<String>,
    pub(crate) attachments: Vec<Attachment>,
    pub(crate) images: Vec<Attachment>,
}

impl InboundMessage {
    /// Decode a webhook payload.
    ///
    /// Accepts a bare message object, one `{event, ts, msg}` event, or an
    /// array of events (the first one is decoded).
    pub fn from_json(json: &str) -> Result<Self> {
        envelope::decode_first(json)
    }

    /// Decode every event of a payload, in order.
    pub fn from_events_json(json: &str) -> Result<Vec<Self>> {
        envelope::decode_all(json)
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Value of the `Message-Id` header, as received.
    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    pub fn sender(&self) -> &Address {
        &self.sender
    }

    pub fn to(&self) -> &[Address] {
        &self.to
    }

    /// Carbon-copy recipients; empty when the payload has none.
    pub fn cc(&self) -> &[Address] {
        &self.cc
    }

    /// `to` followed by `cc`.
    pub fn recipients(&self) -> Vec<&Address> {
        self.to.iter().chain(self.cc.iter()).collect()
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    /// Look up a header, first by exact name, then ignoring ASCII case.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(name)
            .or_else(|| {
                self.headers
                    .iter()
                    .find(|(k, _)| k.eq_ignore_ascii_case(name))
                    .map(|(_, v)| v)
            })
            .map(String::as_str)
    }

    pub fn html_body(&self) -> Option<&str> {
        self.html_body.as_deref()
    }

    pub fn text_body(&self) -> Option<&str> {
        self.text_body.as_deref()
    }

    /// When the message was sent.
    pub fn send_date(&self) -> DateTime<Utc> {
        self.date
    }

    /// Same instant as [`send_date`](Self::send_date).
    pub fn ts(&self) -> DateTime<Utc> {
        self.date
    }

    /// Plus-addressing token of the first `to` address (`""` if none).
    pub fn mailbox_hash(&self) -> &str {
        &self.mailbox_hash
    }

    /// SPF verdict, lower-case (`"pass"`, `"fail"`, `"softfail"`, ...). Empty when absent.
    pub fn spf(&self) -> &str {
        &self.spf
    }

    pub fn spf_detail(&self) -> Option<&str> {
        self.spf_detail.as_deref()
    }

    /// `true` only when the message was DKIM-signed and the signature validated.
    pub fn dkim(&self) -> bool {
        self.dkim_signed && self.dkim_valid
    }

    pub fn dkim_signed(&self) -> bool {
        self.dkim_signed
    }

    pub fn spam_score(&self) -> f64 {
        self.spam_score
    }

    pub fn spam_rules(&self) -> &[SpamRule] {
        &self.spam_rules
    }

    /// The address the provider delivered this message to.
    pub fn inbound_address(&self) -> &str {
        &self.inbound_address
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Full RFC 822 source, when the provider includes it.
    pub fn raw_message(&self) -> Option<&str> {
        self.raw_message.as_deref()
    }

    /// Non-image binary parts, in declaration order.
    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    /// Image binary parts, in declaration order.
    pub fn images(&self) -> &[Attachment] {
        &self.images
    }

    pub fn has_attachments(&self) -> bool {
        !self.attachments.is_empty()
    }

    pub fn has_images(&self) -> bool {
        !self.images.is_empty()
    }

    /// Attachments followed by images.
    pub fn parts(&self) -> impl Iterator<Item = &Attachment> {
        self.attachments.iter().chain(self.images.iter())
    }
}
