//! Binary parts carried by the webhook: file attachments and inline images.
//!
//! The encoded text is kept as received. Bytes are decoded on first use and
//! cached, so repeated reads and downloads decode once.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::error::{InboundError, Result};

/// Content type used when a part declares none.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// How the `content` text of a part encodes its bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartEncoding {
    /// Base64 text (line breaks and other whitespace are ignored).
    Base64,
    /// Literal text, stored as its UTF-8 bytes.
    Text,
}

/// One binary part of an inbound message.
#[derive(Debug, Clone)]
pub struct Attachment {
    name: String,
    content_type: String,
    encoded: String,
    encoding: PartEncoding,
    decoded: OnceLock<Vec<u8>>,
}

impl Attachment {
    /// Build a part from its declared metadata and encoded content.
    ///
    /// An empty `content_type` is replaced with [`DEFAULT_CONTENT_TYPE`].
    pub fn new(
        name: impl Into<String>,
        content_type: impl Into<String>,
        encoded: impl Into<String>,
        encoding: PartEncoding,
    ) -> Self {
        let content_type = content_type.into();
        let content_type = if content_type.trim().is_empty() {
            DEFAULT_CONTENT_TYPE.to_string()
        } else {
            content_type
        };
        Self {
            name: name.into(),
            content_type,
            encoded: encoded.into(),
            encoding,
            decoded: OnceLock::new(),
        }
    }

    /// Declared file name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared MIME type, e.g. `"image/jpeg"`.
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// The content as received, before decoding.
    pub fn encoded_content(&self) -> &str {
        &self.encoded
    }

    pub fn encoding(&self) -> PartEncoding {
        self.encoding
    }

    /// `true` when the text before `/` in the content type is exactly `image`.
    pub fn is_image(&self) -> bool {
        self.content_type.split('/').next() == Some("image")
    }

    /// Decoded bytes. The first call decodes; later calls return the cached result.
    pub fn content(&self) -> Result<&[u8]> {
        if let Some(bytes) = self.decoded.get() {
            return Ok(bytes.as_slice());
        }
        let bytes = self.decode()?;
        Ok(self.decoded.get_or_init(|| bytes).as_slice())
    }

    /// Decoded size in bytes.
    pub fn size(&self) -> Result<usize> {
        self.content().map(<[u8]>::len)
    }

    fn decode(&self) -> Result<Vec<u8>> {
        match self.encoding {
            PartEncoding::Text => Ok(self.encoded.as_bytes().to_vec()),
            PartEncoding::Base64 => {
                let compact: Vec<u8> = self
                    .encoded
                    .bytes()
                    .filter(|b| !b.is_ascii_whitespace())
                    .collect();
                let bytes = STANDARD
                    .decode(compact)
                    .map_err(|source| InboundError::InvalidBase64 {
                        name: self.name.clone(),
                        source,
                    })?;
                tracing::debug!(name = %self.name, bytes = bytes.len(), "Decoded binary part");
                Ok(bytes)
            }
        }
    }

    /// Write the decoded bytes to an explicit file path, replacing any existing file.
    pub fn save_as(&self, path: &Path) -> Result<()> {
        let data = self.content()?;
        std::fs::write(path, data).map_err(|e| InboundError::io(path, e))?;
        tracing::debug!(path = %path.display(), bytes = data.len(), "Wrote binary part");
        Ok(())
    }

    /// Write the decoded bytes to `directory/name` and return that path.
    ///
    /// The declared name is used verbatim. Names that are not a single plain
    /// file name (path separators, `..`, empty) are rejected with
    /// [`InboundError::UnsafeName`]. Calling twice overwrites with identical bytes.
    pub fn download(&self, directory: impl AsRef<Path>) -> Result<PathBuf> {
        if !is_plain_file_name(&self.name) {
            return Err(InboundError::UnsafeName(self.name.clone()));
        }
        let path = directory.as_ref().join(&self.name);
        self.save_as(&path)?;
        Ok(path)
    }

    /// Like [`download`](Self::download), but only for content types in `allowed_types`.
    ///
    /// Entries match exactly (ASCII case-insensitive) or as a `type/*` wildcard.
    /// An empty list allows every type.
    pub fn download_allowed(
        &self,
        directory: impl AsRef<Path>,
        allowed_types: &[impl AsRef<str>],
    ) -> Result<PathBuf> {
        if !self.type_allowed(allowed_types) {
            return Err(InboundError::DisallowedType {
                name: self.name.clone(),
                content_type: self.content_type.clone(),
            });
        }
        self.download(directory)
    }

    /// Whether this part's content type passes an allow-list.
    pub fn type_allowed(&self, allowed_types: &[impl AsRef<str>]) -> bool {
        if allowed_types.is_empty() {
            return true;
        }
        let own_top = top_level_type(&self.content_type);
        allowed_types.iter().any(|allowed| {
            let allowed = allowed.as_ref().trim();
            match allowed.strip_suffix("/*") {
                Some(top) => top.eq_ignore_ascii_case(own_top),
                None => allowed.eq_ignore_ascii_case(self.content_type.trim()),
            }
        })
    }
}

/// A binary part tagged with its role in the message.
#[derive(Debug, Clone)]
pub enum BinaryPart {
    /// A regular file attachment.
    File(Attachment),
    /// An image, typically referenced from the HTML body.
    InlineImage(Attachment),
}

impl BinaryPart {
    /// Route a part by the top-level type of its content type:
    /// `image/*` becomes an inline image, everything else a file.
    pub fn classify(attachment: Attachment) -> Self {
        if attachment.is_image() {
            Self::InlineImage(attachment)
        } else {
            Self::File(attachment)
        }
    }

    pub fn attachment(&self) -> &Attachment {
        match self {
            Self::File(a) | Self::InlineImage(a) => a,
        }
    }
}

fn top_level_type(content_type: &str) -> &str {
    content_type.split('/').next().unwrap_or("").trim()
}

fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
}
