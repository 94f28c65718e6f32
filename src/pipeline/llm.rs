//! Inference call: send the request, return the model's raw reply text.
//!
//! This module is intentionally thin. All prompt engineering lives in
//! [`crate::prompts`] and all reply parsing in [`crate::pipeline::extract`];
//! here we only move bytes and classify provider failures.
//!
//! ## Failure classification
//!
//! | Provider answer | Error |
//! |-----------------|-------|
//! | error message naming the model (`"model: ..."`) | [`BotanError::ModelNotFound`] |
//! | proxy reporting a missing key | [`BotanError::ProviderNotConfigured`] |
//! | 401 / 403 | [`BotanError::AuthError`] |
//! | any other non-2xx | [`BotanError::UpstreamError`] |
//!
//! Nothing is retried; a failed analysis needs an explicit retry by the user.

use crate::config::AnalysisConfig;
use crate::error::BotanError;
use crate::pipeline::request::AnalysisRequest;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// A vision-capable model reachable through a messages-style API.
///
/// The default implementation is [`MessagesProvider`]; tests and embedding
/// applications inject their own through
/// [`crate::config::AnalysisConfigBuilder::provider`].
#[async_trait]
pub trait VisionProvider: Send + Sync {
    /// Short provider name used in logs and errors.
    fn name(&self) -> &str;

    /// Send `request` and return the first text block of the reply.
    async fn complete(&self, request: &AnalysisRequest) -> Result<String, BotanError>;
}

/// HTTP client for the upstream messages endpoint (or a proxy in front of it).
pub struct MessagesProvider {
    client: reqwest::Client,
    endpoint: String,
    api_version: String,
    api_key: Option<String>,
}

impl MessagesProvider {
    pub fn new(config: &AnalysisConfig) -> Result<Self, BotanError> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.api_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder.build().map_err(|e| BotanError::Transport {
            endpoint: config.endpoint.clone(),
            detail: e.to_string(),
        })?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_version: config.api_version.clone(),
            api_key: config.api_key.clone(),
        })
    }

    fn transport_error(&self, e: impl std::fmt::Display) -> BotanError {
        BotanError::Transport {
            endpoint: self.endpoint.clone(),
            detail: e.to_string(),
        }
    }
}

#[async_trait]
impl VisionProvider for MessagesProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn complete(&self, request: &AnalysisRequest) -> Result<String, BotanError> {
        let body = serde_json::to_vec(request)
            .map_err(|e| BotanError::Internal(format!("request serialisation: {e}")))?;

        let mut http = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .header("anthropic-version", &self.api_version)
            .body(body);
        if let Some(ref key) = self.api_key {
            http = http.header("x-api-key", key);
        }

        let response = http.send().await.map_err(|e| self.transport_error(e))?;
        let status = response.status();
        let text = response.text().await.map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            warn!("{} answered HTTP {}", self.endpoint, status.as_u16());
            return Err(classify_error(status.as_u16(), &text, &request.model));
        }

        let reply = reply_text(&text).map_err(|e| match e {
            EnvelopeError::Malformed(detail) => self.transport_error(format!(
                "malformed response envelope: {detail}"
            )),
            EnvelopeError::NoText => BotanError::EmptyReply,
        })?;
        debug!("Raw model reply: {}", reply);
        Ok(reply)
    }
}

/// Pick the provider for `config`, from most-specific to least-specific.
///
/// 1. an injected provider;
/// 2. a [`MessagesProvider`] when a key is present, or when the endpoint is a
///    proxy that attaches its own key;
/// 3. otherwise [`BotanError::ProviderNotConfigured`].
pub fn resolve_provider(config: &AnalysisConfig) -> Result<Arc<dyn VisionProvider>, BotanError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }
    if config.api_key.is_some() || config.uses_proxy() {
        return Ok(Arc::new(MessagesProvider::new(config)?));
    }
    Err(BotanError::ProviderNotConfigured {
        provider: "anthropic".to_string(),
        hint: format!(
            "Set one of {} or point the endpoint at a proxy that holds the key.",
            crate::config::API_KEY_ENV_VARS.join(", ")
        ),
    })
}

// ── Envelopes ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ReplyEnvelope {
    #[serde(default)]
    content: Vec<ReplyBlock>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReplyBlock {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug)]
pub(crate) enum EnvelopeError {
    Malformed(String),
    NoText,
}

/// Text of the reply: the first `text`-typed block, else the first block's
/// text, else a top-level `text` field.
pub(crate) fn reply_text(body: &str) -> Result<String, EnvelopeError> {
    let envelope: ReplyEnvelope =
        serde_json::from_str(body).map_err(|e| EnvelopeError::Malformed(e.to_string()))?;

    let typed = envelope
        .content
        .iter()
        .find(|b| b.kind.as_deref() == Some("text"))
        .and_then(|b| b.text.clone());
    let first = || envelope.content.first().and_then(|b| b.text.clone());

    typed
        .or_else(first)
        .or(envelope.text)
        .filter(|t| !t.trim().is_empty())
        .ok_or(EnvelopeError::NoText)
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    error: Option<serde_json::Value>,
}

/// Map a non-success answer onto the error taxonomy.
pub(crate) fn classify_error(status: u16, body: &str, model: &str) -> BotanError {
    let error = serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .and_then(|e| e.error);

    let message = match &error {
        Some(serde_json::Value::Object(obj)) => obj
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or_default()
            .to_string(),
        Some(serde_json::Value::String(s)) => s.clone(),
        _ => String::new(),
    };

    if message.contains("model:") {
        return BotanError::ModelNotFound {
            model: model.to_string(),
            detail: message,
        };
    }

    let lowered = message.to_lowercase();
    if matches!(error, Some(serde_json::Value::String(_)))
        && (message.contains("API_KEY") || lowered.contains("api key"))
    {
        return BotanError::ProviderNotConfigured {
            provider: "proxy".to_string(),
            hint: message,
        };
    }

    if status == 401 || status == 403 {
        return BotanError::AuthError {
            provider: "anthropic".to_string(),
            detail: if message.is_empty() { body.to_string() } else { message },
        };
    }

    BotanError::UpstreamError {
        status,
        body: body.to_string(),
    }
}
