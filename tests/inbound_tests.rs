//! Integration tests for payload decoding and attachment downloads.

use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Datelike;
use serde_json::json;

use mailhook::{ErrorKind, InboundError, InboundMessage};

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn load(name: &str) -> InboundMessage {
    let json = std::fs::read_to_string(fixture(name)).unwrap();
    InboundMessage::from_json(&json).unwrap()
}

// ─── Scalars and addresses ──────────────────────────────────────────

#[test]
fn test_should_have_a_subject() {
    assert_eq!(load("valid_http_post.json").subject(), "Testing");
}

#[test]
fn test_should_have_a_message_id() {
    assert_eq!(
        load("valid_http_post.json").message_id(),
        "<54C9A31C34DF40409355EC9BB763EF15@example.com>"
    );
}

#[test]
fn test_should_be_from_someone() {
    let inbound = load("valid_http_post.json");
    assert_eq!(inbound.sender().as_pair(), ("John Smith", "john@example.com"));
}

#[test]
fn test_should_be_to_someone() {
    let inbound = load("valid_http_post.json");
    let (name, email) = inbound.to()[0].as_pair();
    assert_eq!(name, "Testing Staging");
    assert_eq!(email, "testing+123testing@example.com");
}

#[test]
fn test_should_have_a_cc() {
    let inbound = load("valid_http_post.json");
    assert_eq!(inbound.cc()[0].as_pair(), ("Bob Johnson", "bob@example.com"));
}

#[test]
fn test_recipients_are_to_then_cc() {
    let inbound = load("valid_http_post.json");
    let recip = inbound.recipients();
    assert_eq!(recip.len(), 2);
    assert_eq!(recip[0].as_pair(), ("Testing Staging", "testing+123testing@example.com"));
    assert_eq!(recip[1].as_pair(), ("Bob Johnson", "bob@example.com"));
}

#[test]
fn test_bodies() {
    let inbound = load("valid_http_post.json");
    assert_eq!(inbound.html_body(), Some("<p>We no speak americano</p>"));
    assert_eq!(inbound.text_body(), Some("\nThis is awesome!\n\n"));

    let plain = load("valid_http_post_no_attachments.json");
    assert_eq!(plain.html_body(), None);
}

#[test]
fn test_headers() {
    let inbound = load("valid_http_post.json");
    assert_eq!(inbound.headers()["Mime-Version"], "1.0");
    // Repeated headers keep the last value.
    assert!(inbound.headers()["Received"].contains("by mx1.example.com"));
    assert_eq!(inbound.header("mime-version"), Some("1.0"));
}

#[test]
fn test_passthrough_fields() {
    let inbound = load("valid_http_post.json");
    assert_eq!(inbound.inbound_address(), "testing+123testing@example.com");
    assert!(inbound.tags().is_empty());
    assert!(inbound.raw_message().unwrap().contains("Subject: Testing"));
    assert_eq!(inbound.spf_detail(), Some("sender SPF authorized"));
}

// ─── Dates ──────────────────────────────────────────────────────────

#[test]
fn test_send_date_and_ts() {
    let inbound = load("valid_http_post.json");
    assert_eq!(inbound.send_date().year(), 2013);
    assert_eq!(inbound.ts().year(), 2013);
    assert_eq!(inbound.send_date(), inbound.ts());
}

#[test]
fn test_ts_as_digit_string() {
    let inbound = load("valid_http_post_no_cc.json");
    assert_eq!(inbound.ts().timestamp(), 1368214102);
}

// ─── Mailbox hash ───────────────────────────────────────────────────

#[test]
fn test_mailbox_hash() {
    assert_eq!(load("valid_http_post.json").mailbox_hash(), "123testing");
    assert_eq!(load("valid_http_post_no_cc.json").mailbox_hash(), "noc");
    assert_eq!(load("valid_http_post_no_attachments.json").mailbox_hash(), "");
}

// ─── Authentication and spam ────────────────────────────────────────

#[test]
fn test_spf_dkim_spam_unsigned() {
    let inbound = load("valid_http_post.json");
    assert_eq!(inbound.spf(), "pass");
    assert!(!inbound.dkim());
    assert_eq!(inbound.spam_score(), 0.0);
}

#[test]
fn test_dkim_signed_but_invalid() {
    let inbound = load("valid_http_post_no_attachments.json");
    assert!(inbound.dkim_signed());
    assert!(!inbound.dkim());
}

#[test]
fn test_no_cc_payload() {
    let inbound = load("valid_http_post_no_cc.json");
    assert!(inbound.cc().is_empty());
    assert_eq!(inbound.recipients(), inbound.to().iter().collect::<Vec<_>>());
    assert_eq!(inbound.spf(), "pass");
    assert!(inbound.dkim());
    assert_eq!(inbound.spam_score(), -0.8);
    assert_eq!(inbound.spam_rules().len(), 2);
}

// ─── Binary parts ───────────────────────────────────────────────────

#[test]
fn test_parts_are_classified_by_content_type() {
    let inbound = load("valid_http_post.json");

    assert!(inbound.has_attachments());
    assert_eq!(inbound.attachments().len(), 1);
    assert_eq!(inbound.attachments()[0].name(), "invoice.pdf");

    assert!(inbound.has_images());
    let images: Vec<&str> = inbound.images().iter().map(|a| a.name()).collect();
    assert_eq!(images, ["equal.jpg", "part1.02050906.01020904@example.com"]);

    for part in inbound.parts() {
        assert!(!part.name().is_empty());
        assert!(!part.content_type().is_empty());
    }
}

#[test]
fn test_have_no_attachments() {
    let inbound = load("valid_http_post_no_attachments.json");
    assert!(inbound.attachments().is_empty());
    assert!(inbound.images().is_empty());
    assert!(!inbound.has_attachments());
    assert!(!inbound.has_images());
}

#[test]
fn test_attachment_should_download() {
    let tmp = tempfile::tempdir().unwrap();
    let inbound = load("valid_http_post.json");

    for part in inbound.parts() {
        part.download(tmp.path()).unwrap();
    }

    assert!(tmp.path().join("invoice.pdf").is_file());
    assert!(tmp.path().join("equal.jpg").is_file());
    assert!(tmp.path().join("part1.02050906.01020904@example.com").is_file());
}

#[test]
fn test_download_is_byte_identical_to_decoded_content() {
    let tmp = tempfile::tempdir().unwrap();
    let inbound = load("valid_http_post.json");

    for part in inbound.parts() {
        let path = part.download(tmp.path()).unwrap();
        let expected: Vec<u8> = STANDARD
            .decode(part.encoded_content().replace('\n', ""))
            .unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), expected, "{}", part.name());
    }

    let pdf = std::fs::read(tmp.path().join("invoice.pdf")).unwrap();
    assert!(pdf.starts_with(b"%PDF-1.4"));
}

#[test]
fn test_download_twice_overwrites() {
    let tmp = tempfile::tempdir().unwrap();
    let inbound = load("valid_http_post.json");
    let image = &inbound.images()[0];

    let first = image.download(tmp.path()).unwrap();
    let second = image.download(tmp.path()).unwrap();
    assert_eq!(first, second);
    assert_eq!(std::fs::read(&second).unwrap(), image.content().unwrap());
}

#[test]
fn test_download_into_missing_directory_fails() {
    let tmp = tempfile::tempdir().unwrap();
    let inbound = load("valid_http_post.json");
    let err = inbound.attachments()[0]
        .download(tmp.path().join("missing"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io);
}

#[test]
fn test_concurrent_downloads_of_different_parts() {
    let tmp = tempfile::tempdir().unwrap();
    let inbound = load("valid_http_post.json");

    std::thread::scope(|s| {
        for part in inbound.parts() {
            let dir = tmp.path();
            s.spawn(move || part.download(dir).unwrap());
        }
    });

    assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 3);
}

// ─── Inline payloads ────────────────────────────────────────────────

#[test]
fn test_single_image_attachment_scenario() {
    let payload = json!({
        "subject": "Testing",
        "to": [["Testing Staging", "testing+123testing@example.com"]],
        "cc": [["Bob Johnson", "bob@example.com"]],
        "ts": 1368214102,
        "attachments": {
            "equal.jpg": {"type": "image/jpeg", "content": "/9j/4AAQSkZJRgABAQAAAQABAAD/2Q=="}
        }
    });
    let inbound = InboundMessage::from_json(&payload.to_string()).unwrap();
    assert_eq!(inbound.subject(), "Testing");
    assert_eq!(inbound.mailbox_hash(), "123testing");
    assert!(inbound.has_images());
    assert!(!inbound.has_attachments());

    let tmp = tempfile::tempdir().unwrap();
    inbound.images()[0].download(tmp.path()).unwrap();
    assert!(tmp.path().join("equal.jpg").exists());
}

#[test]
fn test_invalid_base64_fails_on_download() {
    let payload = json!({
        "ts": 1368214102,
        "attachments": {
            "broken.bin": {"type": "application/octet-stream", "content": "@@not base64@@"}
        }
    });
    let inbound = InboundMessage::from_json(&payload.to_string()).unwrap();
    let tmp = tempfile::tempdir().unwrap();
    let err = inbound.attachments()[0].download(tmp.path()).unwrap_err();
    assert!(matches!(err, InboundError::InvalidBase64 { .. }));
    assert!(!tmp.path().join("broken.bin").exists());
}

#[test]
fn test_invalid_json_is_decode_error() {
    let err = InboundMessage::from_json("this is not json").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Decode);
}

#[test]
fn test_all_events_decoded() {
    let first = std::fs::read_to_string(fixture("valid_http_post.json")).unwrap();
    let second = std::fs::read_to_string(fixture("valid_http_post_no_cc.json")).unwrap();
    let mut events: Vec<serde_json::Value> = serde_json::from_str(&first).unwrap();
    events.extend(serde_json::from_str::<Vec<serde_json::Value>>(&second).unwrap());

    let payload = serde_json::to_string(&events).unwrap();
    let messages = InboundMessage::from_events_json(&payload).unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].subject(), "Testing");
    assert_eq!(messages[1].subject(), "No cc");
}
