//! Progress-callback trait for analysis stage events.
//!
//! Inject an [`Arc<dyn AnalysisProgressCallback>`] via
//! [`crate::config::AnalysisConfigBuilder::progress_callback`] to be told
//! when each stage of an analysis starts or finishes. The CLI uses it to
//! drive a spinner; an embedding UI can map it onto idle / loading / error /
//! result states.
//!
//! # Example
//!
//! ```rust
//! use botanai::{AnalysisConfig, AnalysisProgressCallback};
//! use std::sync::Arc;
//!
//! struct Log;
//!
//! impl AnalysisProgressCallback for Log {
//!     fn on_request_start(&self, model: &str) {
//!         eprintln!("asking {model}…");
//!     }
//! }
//!
//! let config = AnalysisConfig::builder()
//!     .progress_callback(Arc::new(Log) as Arc<dyn AnalysisProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::output::PlantAnalysis;
use crate::pipeline::normalize::NormalizedImage;
use std::sync::Arc;

/// Called by the analysis pipeline as it moves through its stages.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait AnalysisProgressCallback: Send + Sync {
    /// Called once the image has been normalised for upload.
    fn on_image_ready(&self, image: &NormalizedImage) {
        let _ = image;
    }

    /// Called just before the inference request is sent.
    fn on_request_start(&self, model: &str) {
        let _ = model;
    }

    /// Called when the mock record replaces a real analysis.
    ///
    /// # Arguments
    /// * `reason`: the configuration error that triggered the fallback
    fn on_fallback(&self, reason: &str) {
        let _ = reason;
    }

    /// Called with the final record.
    fn on_complete(&self, analysis: &PlantAnalysis) {
        let _ = analysis;
    }

    /// Called when the analysis fails.
    ///
    /// # Arguments
    /// * `error`: human-readable error description
    fn on_error(&self, error: &str) {
        let _ = error;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl AnalysisProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::AnalysisConfig`].
pub type ProgressCallback = Arc<dyn AnalysisProgressCallback>;
