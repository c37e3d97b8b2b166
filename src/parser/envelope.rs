//! Webhook envelope decoding: JSON payload → [`InboundMessage`].
//!
//! A payload is either an array of `{event, ts, msg}` events, a single event,
//! or a bare message object. Optional blocks (cc, binary parts, spam and
//! authentication reports) resolve to empty defaults; a missing message
//! block, a malformed part record or an unusable timestamp is an error.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{InboundError, Result};
use crate::model::address::Address;
use crate::model::attachment::{Attachment, BinaryPart, PartEncoding};
use crate::model::message::{InboundMessage, SpamRule};
use crate::parser::date::{parse_date, parse_timestamp};

/// The only event type that carries an inbound message.
const INBOUND_EVENT: &str = "inbound";

#[derive(Debug, Deserialize)]
struct RawEvent {
    #[serde(default)]
    event: Option<String>,
    #[serde(default)]
    ts: Option<Value>,
    #[serde(default)]
    msg: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawMessage {
    subject: Option<String>,
    from_email: Option<String>,
    from_name: Option<String>,
    email: Option<String>,
    to: Option<Value>,
    cc: Option<Value>,
    headers: Option<Map<String, Value>>,
    html: Option<String>,
    text: Option<String>,
    ts: Option<Value>,
    spf: Option<Value>,
    dkim: Option<Value>,
    spam_report: Option<RawSpamReport>,
    attachments: Option<Map<String, Value>>,
    images: Option<Map<String, Value>>,
    tags: Option<Vec<String>>,
    raw_msg: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawSpamReport {
    score: Option<f64>,
    matched_rules: Option<Vec<RawSpamRule>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawSpamRule {
    name: Option<String>,
    score: Option<f64>,
    description: Option<String>,
}

/// Decode the first message of a payload.
pub fn decode_first(json: &str) -> Result<InboundMessage> {
    match serde_json::from_str::<Value>(json)? {
        Value::Array(events) => {
            let first = events
                .into_iter()
                .next()
                .ok_or_else(|| InboundError::InvalidPayload("empty event list".into()))?;
            decode_array_element(first)
        }
        other => decode_value(other),
    }
}

/// Decode every message of a payload, preserving event order.
pub fn decode_all(json: &str) -> Result<Vec<InboundMessage>> {
    match serde_json::from_str::<Value>(json)? {
        Value::Array(events) => {
            if events.is_empty() {
                return Err(InboundError::InvalidPayload("empty event list".into()));
            }
            events.into_iter().map(decode_array_element).collect()
        }
        other => Ok(vec![decode_value(other)?]),
    }
}

/// Decode one element of an event list. Elements are always events, so a
/// missing `msg` block is an error rather than a bare message.
fn decode_array_element(value: Value) -> Result<InboundMessage> {
    match value {
        Value::Object(_) => decode_event(value),
        other => Err(InboundError::InvalidPayload(format!(
            "expected an event object, found {}",
            json_type(&other)
        ))),
    }
}

/// Decode a top-level event object or bare message object.
fn decode_value(value: Value) -> Result<InboundMessage> {
    let is_event = value
        .as_object()
        .is_some_and(|map| map.contains_key("event") || map.contains_key("msg"));
    match value {
        Value::Object(_) if is_event => decode_event(value),
        Value::Object(_) => decode_message(value, None),
        other => Err(InboundError::InvalidPayload(format!(
            "expected a JSON object, found {}",
            json_type(&other)
        ))),
    }
}

fn decode_event(value: Value) -> Result<InboundMessage> {
    let event: RawEvent = serde_json::from_value(value)?;
    if let Some(kind) = &event.event {
        if kind != INBOUND_EVENT {
            return Err(InboundError::NotInbound(kind.clone()));
        }
    }
    let msg = event
        .msg
        .filter(Value::is_object)
        .ok_or(InboundError::MissingField("msg"))?;
    decode_message(msg, event.ts.as_ref())
}

fn decode_message(value: Value, event_ts: Option<&Value>) -> Result<InboundMessage> {
    let raw: RawMessage = serde_json::from_value(value)?;

    let headers = flatten_headers(raw.headers.unwrap_or_default());
    let message_id = find_header(&headers, "Message-Id")
        .map(str::to_string)
        .unwrap_or_default();

    let to = Address::list_from_value(raw.to.as_ref());
    let cc = Address::list_from_value(raw.cc.as_ref());
    let mailbox_hash = to
        .first()
        .map(|a| a.mailbox_hash().to_string())
        .unwrap_or_default();

    let date = resolve_date(raw.ts.as_ref().or(event_ts), &headers)?;
    let (spf, spf_detail) = spf_verdict(raw.spf.as_ref());
    let (dkim_signed, dkim_valid) = dkim_verdict(raw.dkim.as_ref());

    let spam = raw.spam_report.unwrap_or_default();
    let spam_rules = spam
        .matched_rules
        .unwrap_or_default()
        .into_iter()
        .map(|r| SpamRule {
            name: r.name.unwrap_or_default(),
            score: r.score.unwrap_or(0.0),
            description: r.description.unwrap_or_default(),
        })
        .collect();

    let (attachments, images) = collect_parts(raw.attachments, raw.images)?;

    let sender = Address::new(
        raw.from_name.unwrap_or_default(),
        raw.from_email.unwrap_or_default(),
    );

    tracing::debug!(
        message_id = %message_id,
        to = to.len(),
        cc = cc.len(),
        attachments = attachments.len(),
        images = images.len(),
        "Decoded inbound message"
    );

    Ok(InboundMessage {
        subject: raw.subject.unwrap_or_default(),
        message_id,
        sender,
        to,
        cc,
        headers,
        html_body: raw.html,
        text_body: raw.text,
        date,
        mailbox_hash,
        spf,
        spf_detail,
        dkim_signed,
        dkim_valid,
        spam_score: spam.score.unwrap_or(0.0),
        spam_rules,
        inbound_address: raw.email.unwrap_or_default(),
        tags: raw.tags.unwrap_or_default(),
        raw_message: raw.raw_msg,
        attachments,
        images,
    })
}

/// Collapse header values to strings. Repeated headers arrive as arrays;
/// the last value wins.
fn flatten_headers(raw: Map<String, Value>) -> BTreeMap<String, String> {
    let mut headers = BTreeMap::new();
    for (name, value) in raw {
        let value = match value {
            Value::String(s) => Some(s),
            Value::Array(items) => items.iter().rev().find_map(Value::as_str).map(String::from),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Null | Value::Object(_) => None,
        };
        if let Some(value) = value {
            headers.insert(name, value);
        }
    }
    headers
}

fn find_header<'a>(headers: &'a BTreeMap<String, String>, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .or_else(|| {
            headers
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v)
        })
        .map(String::as_str)
}

/// Message `ts`, else event `ts`, else the `Date` header.
fn resolve_date(
    ts: Option<&Value>,
    headers: &BTreeMap<String, String>,
) -> Result<chrono::DateTime<chrono::Utc>> {
    if let Some(ts) = ts {
        return parse_timestamp(ts);
    }
    match find_header(headers, "Date") {
        Some(date) => parse_date(date).ok_or_else(|| InboundError::InvalidDate(date.to_string())),
        None => Err(InboundError::MissingField("ts")),
    }
}

fn spf_verdict(spf: Option<&Value>) -> (String, Option<String>) {
    match spf {
        Some(Value::Object(block)) => {
            let result = block
                .get("result")
                .and_then(Value::as_str)
                .unwrap_or("")
                .trim()
                .to_lowercase();
            let detail = block
                .get("detail")
                .and_then(Value::as_str)
                .map(String::from);
            (result, detail)
        }
        Some(Value::String(result)) => (result.trim().to_lowercase(), None),
        _ => (String::new(), None),
    }
}

/// `(signed, valid)`.
fn dkim_verdict(dkim: Option<&Value>) -> (bool, bool) {
    match dkim {
        Some(Value::Object(block)) => {
            let flag = |k: &str| block.get(k).and_then(Value::as_bool).unwrap_or(false);
            (flag("signed"), flag("valid"))
        }
        Some(Value::Bool(b)) => (*b, *b),
        _ => (false, false),
    }
}

/// Read `attachments` then `images`, each in declaration order, and route
/// every record through [`BinaryPart::classify`].
fn collect_parts(
    attachments: Option<Map<String, Value>>,
    images: Option<Map<String, Value>>,
) -> Result<(Vec<Attachment>, Vec<Attachment>)> {
    let mut files = Vec::new();
    let mut inline = Vec::new();

    let records = attachments
        .into_iter()
        .flatten()
        .chain(images.into_iter().flatten());

    for (index, (key, record)) in records.enumerate() {
        match BinaryPart::classify(part_from_record(index, key, record)?) {
            BinaryPart::File(a) => files.push(a),
            BinaryPart::InlineImage(a) => inline.push(a),
        }
    }

    Ok((files, inline))
}

/// Build one part. Name falls back from the record's `name` to the mapping
/// key to `part_{index}`.
fn part_from_record(index: usize, key: String, record: Value) -> Result<Attachment> {
    let fields = match record {
        Value::Object(fields) => fields,
        other => {
            return Err(InboundError::InvalidPart {
                name: key,
                reason: format!("expected an object, found {}", json_type(&other)),
            })
        }
    };

    let declared = fields
        .get("name")
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty());
    let name = match declared {
        Some(name) => name.to_string(),
        None if !key.trim().is_empty() => key,
        None => format!("part_{index}"),
    };

    let Some(content) = fields.get("content").and_then(Value::as_str) else {
        return Err(InboundError::InvalidPart {
            name,
            reason: "missing content".into(),
        });
    };

    let content_type = fields.get("type").and_then(Value::as_str).unwrap_or("");
    let encoding = match fields.get("base64").and_then(Value::as_bool) {
        Some(false) => PartEncoding::Text,
        _ => PartEncoding::Base64,
    };

    Ok(Attachment::new(name, content_type, content, encoding))
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
