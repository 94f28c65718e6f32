//! Analysis entry points.
//!
//! The free functions run one analysis and return the record without
//! touching history. [`Session`] adds the history: it owns a
//! [`HistoryStore`] and serialises analyses so each result is prepended
//! exactly once, in completion order.

use crate::config::{AnalysisConfig, MockFallback};
use crate::error::BotanError;
use crate::history::{HistoryBackend, HistoryStore};
use crate::output::{HistorySummary, PlantAnalysis};
use crate::pipeline::normalize::NormalizedImage;
use crate::pipeline::{extract, fallback, input, llm, normalize, request};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Analyse an image file or `data:image/...;base64,` URL.
///
/// # Example
/// ```rust,no_run
/// use botanai::{analyze, resolve_api_key, AnalysisConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut builder = AnalysisConfig::builder();
/// if let Some(key) = resolve_api_key() {
///     builder = builder.api_key(key);
/// }
/// let record = analyze("monstera.jpg", &builder.build()?).await?;
/// println!("{} ({})", record.common_name, record.health_status);
/// # Ok(())
/// # }
/// ```
pub async fn analyze(
    input_str: impl AsRef<str>,
    config: &AnalysisConfig,
) -> Result<PlantAnalysis, BotanError> {
    let input_str = input_str.as_ref();
    info!("Starting analysis: {}", short_input(input_str));
    let bytes = input::read_input(input_str)
        .await
        .inspect_err(|e| notify_error(config, e))?;
    analyze_bytes(bytes, config).await
}

/// Analyse raw image file bytes (any format the decoder supports).
pub async fn analyze_bytes(
    bytes: Vec<u8>,
    config: &AnalysisConfig,
) -> Result<PlantAnalysis, BotanError> {
    let image = normalize::normalize(bytes, config.budget)
        .await
        .inspect_err(|e| notify_error(config, e))?;
    analyze_normalized(&image, config).await
}

/// Analyse an image that has already been normalised.
pub async fn analyze_normalized(
    image: &NormalizedImage,
    config: &AnalysisConfig,
) -> Result<PlantAnalysis, BotanError> {
    let result = run(image, config).await;
    match &result {
        Ok(record) => {
            if let Some(ref cb) = config.progress_callback {
                cb.on_complete(record);
            }
        }
        Err(e) => notify_error(config, e),
    }
    result
}

/// Synchronous wrapper around [`analyze`].
///
/// Creates a temporary tokio runtime internally.
pub fn analyze_sync(
    input_str: impl AsRef<str>,
    config: &AnalysisConfig,
) -> Result<PlantAnalysis, BotanError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| BotanError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(analyze(input_str, config))
}

async fn run(image: &NormalizedImage, config: &AnalysisConfig) -> Result<PlantAnalysis, BotanError> {
    let start = Instant::now();
    if let Some(ref cb) = config.progress_callback {
        cb.on_image_ready(image);
    }
    debug!(
        "Normalised image: {}x{}, ~{} bytes, {} pass(es)",
        image.width,
        image.height,
        image.estimated_bytes(),
        image.passes
    );

    let record = match infer(image, config).await {
        Ok(reply) => extract::extract_analysis(&reply)?,
        Err(e) if e.is_configuration_error() && config.mock_fallback == MockFallback::Enabled => {
            warn!("{}; substituting mock analysis", e);
            if let Some(ref cb) = config.progress_callback {
                cb.on_fallback(&e.to_string());
            }
            fallback::mock_analysis(config.language)
        }
        Err(e) => return Err(e),
    };

    let record = if config.retain_image {
        record.with_image(image.to_data_url())
    } else {
        record
    };

    info!(
        "Analysis complete: {} ({}) in {}ms{}",
        record.common_name,
        record.health_status,
        start.elapsed().as_millis(),
        if record.is_mock() { " [mock]" } else { "" }
    );
    Ok(record)
}

async fn infer(image: &NormalizedImage, config: &AnalysisConfig) -> Result<String, BotanError> {
    let provider = llm::resolve_provider(config)?;
    let request = request::build_request(image, config);
    if let Some(ref cb) = config.progress_callback {
        cb.on_request_start(&request.model);
    }
    info!("Sending analysis request to {} ({})", provider.name(), request.model);
    provider.complete(&request).await
}

fn notify_error(config: &AnalysisConfig, e: &BotanError) {
    if let Some(ref cb) = config.progress_callback {
        cb.on_error(&e.to_string());
    }
}

/// Keep multi-megabyte data URLs out of the logs.
fn short_input(input_str: &str) -> &str {
    if input::is_data_url(input_str) {
        let end = input_str.find(',').map_or(input_str.len(), |i| i + 1);
        &input_str[..end]
    } else {
        input_str
    }
}

// ── Session ──────────────────────────────────────────────────────────────

/// One user's analysis session: configuration plus persisted history.
///
/// Analyses through the same session run one at a time; a second call waits
/// until the first has been appended to history.
pub struct Session {
    config: AnalysisConfig,
    history: Mutex<HistoryStore>,
}

impl Session {
    /// Open a session, restoring history from `backend`.
    pub async fn open(config: AnalysisConfig, backend: Arc<dyn HistoryBackend>) -> Self {
        let history = HistoryStore::load(backend).await;
        Self {
            config,
            history: Mutex::new(history),
        }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Analyse a file path or data URL and record the result.
    pub async fn analyze(&self, input_str: &str) -> Result<PlantAnalysis, BotanError> {
        let mut history = self.history.lock().await;
        let record = analyze(input_str, &self.config).await?;
        history.append(record.clone()).await?;
        Ok(record)
    }

    /// Analyse raw image bytes and record the result.
    pub async fn analyze_bytes(&self, bytes: Vec<u8>) -> Result<PlantAnalysis, BotanError> {
        let mut history = self.history.lock().await;
        let record = analyze_bytes(bytes, &self.config).await?;
        history.append(record.clone()).await?;
        Ok(record)
    }

    /// All records, newest first.
    pub async fn history(&self) -> Vec<PlantAnalysis> {
        self.history.lock().await.records().to_vec()
    }

    pub async fn summaries(&self) -> Vec<HistorySummary> {
        self.history.lock().await.summaries()
    }

    pub async fn find(&self, id: &str) -> Option<PlantAnalysis> {
        self.history.lock().await.get(id).cloned()
    }

    /// Delete every record.
    pub async fn clear_history(&self) -> Result<(), BotanError> {
        self.history.lock().await.clear().await
    }
}
