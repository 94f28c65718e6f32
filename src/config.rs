//! Configuration types for plant analysis.
//!
//! All analysis behaviour is controlled through [`AnalysisConfig`], built via
//! its [`AnalysisConfigBuilder`]. The library never reads the environment on
//! its own: the credential is resolved explicitly with [`resolve_api_key`]
//! and handed to the builder, so tests and embedding applications get
//! deterministic behaviour.

use crate::error::BotanError;
use crate::pipeline::llm::VisionProvider;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Default model identifier sent to the messages endpoint.
pub const DEFAULT_MODEL: &str = "claude-3-haiku-20240307";

/// Default upstream messages endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://api.anthropic.com/v1/messages";

/// API version header value expected by the upstream endpoint.
pub const DEFAULT_API_VERSION: &str = "2023-06-01";

/// Environment variables searched for the provider credential, in order.
pub const API_KEY_ENV_VARS: &[&str] = &[
    "ANTHROPIC_API_KEY",
    "CLAUDE_API_KEY",
    "API_KEY_CLAUDE",
    "VITE_API_KEY_CLAUDE",
    "VITE_CLAUDE_API_KEY",
    "API_KEY",
];

/// Configuration for one analysis session.
///
/// # Example
/// ```rust
/// use botanai::{AnalysisConfig, Language};
///
/// let config = AnalysisConfig::builder()
///     .language(Language::Fr)
///     .max_tokens(1024)
///     .build()
///     .unwrap();
/// assert_eq!(config.max_tokens, 1024);
/// ```
#[derive(Clone)]
pub struct AnalysisConfig {
    /// Model identifier. Default: [`DEFAULT_MODEL`].
    pub model: String,

    /// Messages endpoint. Default: [`DEFAULT_ENDPOINT`].
    ///
    /// Point this at a server-side proxy that attaches its own credential to
    /// run without a local API key.
    pub endpoint: String,

    /// Value of the `anthropic-version` header.
    pub api_version: String,

    /// Provider credential. Never printed by `Debug`.
    pub api_key: Option<String>,

    /// Pre-constructed provider. Takes precedence over `endpoint`/`api_key`.
    pub provider: Option<Arc<dyn VisionProvider>>,

    /// Output token budget per analysis. Default: 800.
    pub max_tokens: usize,

    /// Language of the instruction and of every free-text field.
    pub language: Language,

    /// Replaces the built-in schema instruction when set.
    pub system_prompt: Option<String>,

    /// Upload size policy for the normaliser.
    pub budget: ImageBudget,

    /// What to do when the provider cannot be used at all.
    pub mock_fallback: MockFallback,

    /// Attach the normalised image to the stored record. Default: true.
    pub retain_image: bool,

    /// Per-request timeout. `None` keeps the transport default.
    pub api_timeout_secs: Option<u64>,

    /// Optional stage-event sink.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            api_key: None,
            provider: None,
            max_tokens: 800,
            language: Language::default(),
            system_prompt: None,
            budget: ImageBudget::default(),
            mock_fallback: MockFallback::default(),
            retain_image: true,
            api_timeout_secs: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for AnalysisConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisConfig")
            .field("model", &self.model)
            .field("endpoint", &self.endpoint)
            .field("api_version", &self.api_version)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("provider", &self.provider.as_ref().map(|_| "<dyn VisionProvider>"))
            .field("max_tokens", &self.max_tokens)
            .field("language", &self.language)
            .field("system_prompt", &self.system_prompt.as_ref().map(|s| s.len()))
            .field("budget", &self.budget)
            .field("mock_fallback", &self.mock_fallback)
            .field("retain_image", &self.retain_image)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .finish()
    }
}

impl AnalysisConfig {
    /// Create a new builder for `AnalysisConfig`.
    pub fn builder() -> AnalysisConfigBuilder {
        AnalysisConfigBuilder {
            config: Self::default(),
        }
    }

    /// `true` when the endpoint is served by another host than the public
    /// upstream one.
    pub fn uses_proxy(&self) -> bool {
        let host = |url: &str| {
            reqwest::Url::parse(url)
                .ok()
                .and_then(|u| u.host_str().map(str::to_ascii_lowercase))
        };
        match (host(&self.endpoint), host(DEFAULT_ENDPOINT)) {
            (Some(endpoint), Some(upstream)) => endpoint != upstream,
            _ => true,
        }
    }
}

/// Builder for [`AnalysisConfig`].
#[derive(Debug)]
pub struct AnalysisConfigBuilder {
    config: AnalysisConfig,
}

impl AnalysisConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        self.config.endpoint = url.into();
        self
    }

    pub fn api_version(mut self, version: impl Into<String>) -> Self {
        self.config.api_version = version.into();
        self
    }

    /// Set the credential. Blank strings are treated as absent.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        let key = key.into();
        self.config.api_key = if key.trim().is_empty() { None } else { Some(key) };
        self
    }

    pub fn provider(mut self, provider: Arc<dyn VisionProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn language(mut self, language: Language) -> Self {
        self.config.language = language;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn budget(mut self, budget: ImageBudget) -> Self {
        self.config.budget = budget;
        self
    }

    pub fn mock_fallback(mut self, policy: MockFallback) -> Self {
        self.config.mock_fallback = policy;
        self
    }

    pub fn retain_image(mut self, v: bool) -> Self {
        self.config.retain_image = v;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = Some(secs);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<AnalysisConfig, BotanError> {
        let c = &self.config;
        if c.max_tokens == 0 {
            return Err(BotanError::InvalidConfig("max_tokens must be ≥ 1".into()));
        }
        if c.model.trim().is_empty() {
            return Err(BotanError::InvalidConfig("model must not be empty".into()));
        }
        let http_url = reqwest::Url::parse(&c.endpoint)
            .map(|u| matches!(u.scheme(), "http" | "https") && u.has_host())
            .unwrap_or(false);
        if !http_url {
            return Err(BotanError::InvalidConfig(format!(
                "endpoint must be an HTTP/HTTPS URL, got '{}'",
                c.endpoint
            )));
        }
        c.budget.validate()?;
        Ok(self.config)
    }
}

// ── Value types ──────────────────────────────────────────────────────────

/// Output language for the instruction and all free-text fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Fr,
}

impl Language {
    pub fn code(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Fr => "fr",
        }
    }
}

impl FromStr for Language {
    type Err = BotanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "en" | "english" => Ok(Language::En),
            "fr" | "french" | "français" | "francais" => Ok(Language::Fr),
            other => Err(BotanError::InvalidConfig(format!(
                "unsupported language '{other}' (expected en or fr)"
            ))),
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Upload size policy applied by [`crate::pipeline::normalize`].
///
/// The first encode uses `initial_quality`. If the estimated payload exceeds
/// `max_bytes` or either side exceeds `max_dimension`, one more encode runs
/// from the original pixels at `reduced_quality`, with the longer side capped
/// at `max_dimension`. Two passes at most: the budget is best-effort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageBudget {
    /// Default: 2 MiB.
    pub max_bytes: usize,
    /// Default: 1600 px.
    pub max_dimension: u32,
    /// JPEG quality of the first pass (1–100). Default: 80.
    pub initial_quality: u8,
    /// JPEG quality of the second pass (1–100). Default: 70.
    pub reduced_quality: u8,
}

impl Default for ImageBudget {
    fn default() -> Self {
        Self {
            max_bytes: 2 * 1024 * 1024,
            max_dimension: 1600,
            initial_quality: 80,
            reduced_quality: 70,
        }
    }
}

impl ImageBudget {
    /// `true` when an encoded payload of `bytes` at `width`×`height` needs
    /// the second pass.
    pub fn exceeded_by(&self, bytes: usize, width: u32, height: u32) -> bool {
        bytes > self.max_bytes || width > self.max_dimension || height > self.max_dimension
    }

    fn validate(&self) -> Result<(), BotanError> {
        if self.max_bytes == 0 {
            return Err(BotanError::InvalidConfig("max_bytes must be ≥ 1".into()));
        }
        if self.max_dimension == 0 {
            return Err(BotanError::InvalidConfig("max_dimension must be ≥ 1".into()));
        }
        for q in [self.initial_quality, self.reduced_quality] {
            if !(1..=100).contains(&q) {
                return Err(BotanError::InvalidConfig(format!(
                    "JPEG quality must be 1–100, got {q}"
                )));
            }
        }
        Ok(())
    }
}

/// Whether a canned record may stand in for a real analysis.
///
/// Only configuration errors (no credential, unknown model) trigger it; any
/// other failure still surfaces. Records produced this way carry
/// [`crate::output::AnalysisSource::Mock`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MockFallback {
    /// Configuration errors are returned to the caller. (default)
    #[default]
    Disabled,
    /// Configuration errors yield the mock record.
    Enabled,
}

// ── Credential resolution ────────────────────────────────────────────────

/// Resolve the provider credential from the process environment.
///
/// Scans [`API_KEY_ENV_VARS`] in order; the first non-blank value wins.
pub fn resolve_api_key() -> Option<String> {
    resolve_api_key_with(|name| std::env::var(name).ok())
}

/// Same as [`resolve_api_key`] with an injectable lookup.
pub fn resolve_api_key_with<F>(lookup: F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    API_KEY_ENV_VARS.iter().find_map(|name| {
        lookup(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    })
}
