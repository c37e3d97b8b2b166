//! Save binary parts of inbound messages to disk.

use std::path::{Path, PathBuf};

use crate::config::ExportConfig;
use crate::error::{InboundError, Result};
use crate::model::attachment::Attachment;
use crate::model::message::InboundMessage;

/// Save every attachment and image of one message into `output_dir`.
///
/// Parts whose type is not in `config.allowed_types` are skipped. With
/// `sanitize_names`, declared names are rewritten into safe file names and
/// existing files are never overwritten; otherwise names are used verbatim
/// through [`Attachment::download`].
pub fn export_message_parts(
    message: &InboundMessage,
    output_dir: &Path,
    config: &ExportConfig,
) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();

    for part in message.parts() {
        if !part.type_allowed(&config.allowed_types) {
            tracing::info!(
                name = %part.name(),
                content_type = %part.content_type(),
                "Skipping part with disallowed type"
            );
            continue;
        }
        paths.push(export_part(part, output_dir, config.sanitize_names)?);
    }

    Ok(paths)
}

/// Save one part, returning the path written.
pub fn export_part(part: &Attachment, output_dir: &Path, sanitize: bool) -> Result<PathBuf> {
    if !sanitize {
        return part.download(output_dir);
    }
    let filename = sanitize_filename_part(part.name(), 150);
    let path = unique_path(&output_dir.join(filename));
    part.save_as(&path)?;
    Ok(path)
}

/// Save the parts of many messages.
///
/// With `folder_per_message`, each message that has parts gets a subfolder
/// `{output_dir}/{date}_{subject}/`. Failures on individual parts are logged
/// and skipped. The progress callback receives `(current, total)`.
pub fn export_bulk(
    messages: &[InboundMessage],
    output_dir: &Path,
    config: &ExportConfig,
    progress: &dyn Fn(usize, usize),
) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(output_dir).map_err(|e| InboundError::io(output_dir, e))?;
    let mut all_paths = Vec::new();
    let total = messages.len();

    for (i, message) in messages.iter().enumerate() {
        progress(i, total);

        if message.parts().next().is_none() {
            continue;
        }

        let target = if config.folder_per_message {
            let subfolder = output_dir.join(message_folder_name(message));
            std::fs::create_dir_all(&subfolder).map_err(|e| InboundError::io(&subfolder, e))?;
            subfolder
        } else {
            output_dir.to_path_buf()
        };

        for part in message.parts() {
            if !part.type_allowed(&config.allowed_types) {
                continue;
            }
            match export_part(part, &target, config.sanitize_names) {
                Ok(path) => all_paths.push(path),
                Err(e) => {
                    tracing::warn!(
                        name = %part.name(),
                        error = %e,
                        "Failed to export part"
                    );
                }
            }
        }
    }
    progress(total, total);

    Ok(all_paths)
}

/// Generate a folder name for a message's parts.
fn message_folder_name(message: &InboundMessage) -> String {
    let date = message.send_date().format("%Y%m%d_%H%M%S").to_string();
    let subject = sanitize_filename_part(message.subject(), 60);
    format!("{date}_{subject}")
}

/// Sanitize a string for use in filenames.
///
/// Replaces invalid characters with `_` and truncates to `max_len`.
pub fn sanitize_filename_part(s: &str, max_len: usize) -> String {
    let sanitized: String = s
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '.' || c == '_' || c == '@' {
                c
            } else {
                '_'
            }
        })
        .take(max_len)
        .collect();

    // All-dot names would resolve to the current or parent directory.
    if sanitized.is_empty() || sanitized.chars().all(|c| c == '.') {
        "unknown".to_string()
    } else {
        sanitized
    }
}

/// If `path` already exists, append a counter to make it unique.
fn unique_path(path: &Path) -> PathBuf {
    if !path.exists() {
        return path.to_path_buf();
    }

    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("file");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let parent = path.parent().unwrap_or(Path::new("."));

    for i in 1..1000 {
        let candidate = if ext.is_empty() {
            parent.join(format!("{stem}_{i}"))
        } else {
            parent.join(format!("{stem}_{i}.{ext}"))
        };
        if !candidate.exists() {
            return candidate;
        }
    }

    parent.join(format!("{stem}_dup.{ext}"))
}
