//! Email address normalization for webhook recipient and sender fields.

use serde_json::Value;

/// A `(name, email)` pair.
///
/// # Examples
/// - `"Juan García <juan@ejemplo.com>"` → `name = "Juan García"`, `email = "juan@ejemplo.com"`
/// - `"user@example.com"` → `name = ""`, `email = "user@example.com"`
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct Address {
    /// Human-readable display name (may be empty).
    pub name: String,
    /// The bare email address (`user@domain`).
    pub email: String,
}

impl Address {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }

    /// Borrow as a `(name, email)` tuple.
    pub fn as_pair(&self) -> (&str, &str) {
        (&self.name, &self.email)
    }

    /// Parse a single address from a combined string.
    ///
    /// Supported formats:
    /// - `"user@domain.com"`
    /// - `"<user@domain.com>"`
    /// - `"Display Name <user@domain.com>"`
    /// - `"\"Display, Name\" <user@domain.com>"`
    ///
    /// If parsing fails, the raw string is stored as `email`.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Self::default();
        }

        if let Some(angle_start) = trimmed.rfind('<') {
            if let Some(angle_end) = trimmed.rfind('>') {
                if angle_end > angle_start {
                    return Self {
                        name: strip_quotes(&trimmed[..angle_start]),
                        email: trimmed[angle_start + 1..angle_end].trim().to_string(),
                    };
                }
            }
        }

        Self {
            name: String::new(),
            email: trimmed.to_string(),
        }
    }

    /// Parse a comma-separated list of addresses.
    ///
    /// Handles quoted commas: `"Last, First" <a@b.com>, other@c.com`
    pub fn parse_list(raw: &str) -> Vec<Self> {
        let mut results = Vec::new();
        let mut current = String::new();
        let mut in_quotes = false;
        let mut in_angle = false;

        for ch in raw.chars() {
            match ch {
                '"' => {
                    in_quotes = !in_quotes;
                    current.push(ch);
                }
                '<' if !in_quotes => {
                    in_angle = true;
                    current.push(ch);
                }
                '>' if !in_quotes => {
                    in_angle = false;
                    current.push(ch);
                }
                ',' if !in_quotes && !in_angle => {
                    push_non_empty(&mut results, Self::parse(&current));
                    current.clear();
                }
                _ => current.push(ch),
            }
        }

        push_non_empty(&mut results, Self::parse(&current));
        results
    }

    /// Normalize one JSON address entry.
    ///
    /// Accepts a two-element array (either `[name, email]` or the provider's
    /// native `[email, name]`), an object with `name`/`email` keys, or a
    /// combined string. Anything else yields `None`.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Array(items) => {
                let first = items.first().and_then(Value::as_str).unwrap_or("");
                let second = items.get(1).and_then(Value::as_str).unwrap_or("");
                if looks_like_email(first) && !looks_like_email(second) {
                    Some(Self::new(second.trim(), first.trim()))
                } else {
                    Some(Self::new(first.trim(), second.trim()))
                }
            }
            Value::Object(map) => {
                let field = |k: &str| map.get(k).and_then(Value::as_str).unwrap_or("").trim();
                Some(Self::new(field("name"), field("email")))
            }
            Value::String(s) => Some(Self::parse(s)),
            _ => None,
        }
    }

    /// Normalize a whole address field: a list of entries or one combined string.
    ///
    /// A missing or `null` field is an empty list.
    pub fn list_from_value(value: Option<&Value>) -> Vec<Self> {
        match value {
            Some(Value::String(s)) => Self::parse_list(s),
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Self::from_value)
                .filter(|a| !a.email.is_empty())
                .collect(),
            Some(other @ Value::Object(_)) => Self::from_value(other).into_iter().collect(),
            _ => Vec::new(),
        }
    }

    /// The plus-addressing token of the local part, or `""` when there is none.
    ///
    /// `"testing+123testing@example.com"` → `"123testing"`.
    pub fn mailbox_hash(&self) -> &str {
        let local = match self.email.rsplit_once('@') {
            Some((local, _domain)) => local,
            None => self.email.as_str(),
        };
        local.split_once('+').map(|(_, hash)| hash).unwrap_or("")
    }

    /// Format for display: `"Display Name <address>"` or just `"address"`.
    pub fn display(&self) -> String {
        if self.name.is_empty() {
            self.email.clone()
        } else {
            format!("{} <{}>", self.name, self.email)
        }
    }
}

fn push_non_empty(results: &mut Vec<Address>, addr: Address) {
    if !addr.email.is_empty() {
        results.push(addr);
    }
}

fn looks_like_email(s: &str) -> bool {
    let s = s.trim();
    s.contains('@') && !s.contains(char::is_whitespace)
}

/// Strip surrounding double-quotes and trim whitespace.
fn strip_quotes(s: &str) -> String {
    let trimmed = s.trim();
    if trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2 {
        trimmed[1..trimmed.len() - 1].trim().to_string()
    } else {
        trimmed.to_string()
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display())
    }
}
