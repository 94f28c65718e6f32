//! Error types for the botanai library.
//!
//! Every failure is local to the single analysis attempt that raised it:
//! nothing here requires process-level recovery and nothing is retried
//! automatically. The variants are grouped by where the failure originates:
//!
//! * **Input / decode**: the file could not be read or is not an image
//!   this crate can decode. Fatal for that upload only; history is untouched.
//! * **Configuration**: no credential, or the provider rejected the model
//!   identifier. These are the only errors eligible for the mock fallback
//!   (see [`crate::config::MockFallback`]).
//! * **Transport / upstream**: the HTTP call failed or the provider answered
//!   with a non-success status.
//! * **Extraction**: the model replied, but no usable JSON object could be
//!   recovered. [`BotanError::Extraction`] displays the reply verbatim so a
//!   natural-language refusal reaches the user as-is.
//! * **History**: the persisted history could not be written.

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the botanai library.
#[derive(Debug, Error)]
pub enum BotanError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Image file was not found at the given path.
    #[error("Image file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// Input looked like a data URL but its base64 body is malformed.
    #[error("Invalid image data URL: {detail}")]
    InvalidDataUrl { detail: String },

    // ── Image errors ──────────────────────────────────────────────────────
    /// The bytes could not be decoded as an image (corrupt or unsupported).
    #[error("Could not decode image: {detail}")]
    DecodeFailed { detail: String },

    /// JPEG re-encoding failed.
    #[error("Could not encode image as JPEG: {detail}")]
    EncodeFailed { detail: String },

    // ── Configuration errors ──────────────────────────────────────────────
    /// No credential is available for the inference provider.
    #[error("Inference provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The provider does not know the configured model identifier.
    #[error("Model '{model}' was rejected by the provider: {detail}")]
    ModelNotFound { model: String, detail: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Transport / upstream errors ───────────────────────────────────────
    /// The HTTP request could not be sent or its body could not be read.
    #[error("Request to '{endpoint}' failed: {detail}")]
    Transport { endpoint: String, detail: String },

    /// Provider answered 401/403.
    #[error("Authentication error from provider '{provider}': {detail}")]
    AuthError { provider: String, detail: String },

    /// Provider answered with any other non-success status.
    #[error("Inference API error: HTTP {status}: {body}")]
    UpstreamError { status: u16, body: String },

    /// The provider envelope carried no text block.
    #[error("No response text from the inference provider")]
    EmptyReply,

    // ── Extraction errors ─────────────────────────────────────────────────
    /// No JSON object could be recovered from the model reply.
    ///
    /// Displays the reply itself, unchanged.
    #[error("{reply}")]
    Extraction { reply: String },

    /// A JSON object was recovered but does not match the analysis schema.
    #[error("Model reply does not match the analysis schema: {detail}")]
    InvalidReply { detail: String },

    // ── History errors ────────────────────────────────────────────────────
    /// The persisted history slot exists but could not be read.
    #[error("Failed to read history from '{location}': {detail}")]
    HistoryReadFailed { location: String, detail: String },

    /// The history could not be persisted.
    #[error("Failed to write history to '{location}': {detail}")]
    HistoryWriteFailed { location: String, detail: String },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl BotanError {
    /// `true` for the configuration errors that the mock fallback may absorb.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            BotanError::ProviderNotConfigured { .. } | BotanError::ModelNotFound { .. }
        )
    }

    /// `true` when the model replied but the reply was unusable.
    pub fn is_extraction_error(&self) -> bool {
        matches!(
            self,
            BotanError::Extraction { .. } | BotanError::InvalidReply { .. }
        )
    }
}
