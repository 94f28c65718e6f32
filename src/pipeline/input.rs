//! Input resolution: turn a user-supplied path or data URL into raw bytes.
//!
//! Uploads arrive either as a file on disk or as a `data:image/...;base64,`
//! URL (what a browser `FileReader` produces). Both end up as the undecoded
//! file bytes handed to [`crate::pipeline::normalize`].

use crate::error::BotanError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Media type assumed when a payload carries no data-URL header.
pub const DEFAULT_MEDIA_TYPE: &str = "image/jpeg";

static RE_DATA_URL_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^data:(image/[a-zA-Z0-9.+-]+);base64,").unwrap());

/// Check if the input string is an image data URL.
pub fn is_data_url(input: &str) -> bool {
    RE_DATA_URL_HEADER.is_match(input)
}

/// Split a possibly header-prefixed base64 payload into media type and body.
///
/// Strings without a header are returned whole with [`DEFAULT_MEDIA_TYPE`].
pub fn split_data_url(payload: &str) -> (&str, &str) {
    match RE_DATA_URL_HEADER.captures(payload) {
        Some(caps) => {
            let header_len = caps.get(0).map_or(0, |m| m.end());
            let media_type = caps.get(1).map_or(DEFAULT_MEDIA_TYPE, |m| m.as_str());
            (media_type, &payload[header_len..])
        }
        None => (DEFAULT_MEDIA_TYPE, payload),
    }
}

/// Read the image behind `input`: a data URL or a local file path.
pub async fn read_input(input: &str) -> Result<Vec<u8>, BotanError> {
    if is_data_url(input) {
        decode_data_url(input)
    } else {
        read_local(Path::new(input)).await
    }
}

/// Decode the base64 body of an image data URL.
pub fn decode_data_url(url: &str) -> Result<Vec<u8>, BotanError> {
    let (media_type, body) = split_data_url(url);
    let bytes = STANDARD
        .decode(body.trim())
        .map_err(|e| BotanError::InvalidDataUrl {
            detail: e.to_string(),
        })?;
    debug!("Decoded {} data URL: {} bytes", media_type, bytes.len());
    Ok(bytes)
}

/// Read a local file, mapping I/O failures onto input errors.
pub async fn read_local(path: &Path) -> Result<Vec<u8>, BotanError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => {
            debug!("Read {} ({} bytes)", path.display(), bytes.len());
            Ok(bytes)
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            Err(BotanError::PermissionDenied {
                path: PathBuf::from(path),
            })
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(BotanError::FileNotFound {
            path: PathBuf::from(path),
        }),
        Err(e) => Err(BotanError::Internal(format!(
            "Failed to read '{}': {e}",
            path.display()
        ))),
    }
}
