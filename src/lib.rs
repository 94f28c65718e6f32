//! # botanai
//!
//! Identify a plant and diagnose its health from a single photo, using a
//! vision-capable language model, and keep a local history of the results.
//!
//! ## Pipeline Overview
//!
//! ```text
//! photo (file or data URL)
//!  │
//!  ├─ 1. Input      read the file / decode the data URL
//!  ├─ 2. Normalize  JPEG re-encode within 2 MiB / 1600 px (spawn_blocking)
//!  ├─ 3. Request    image block + schema instruction (en / fr)
//!  ├─ 4. Inference  one POST to the messages endpoint
//!  ├─ 5. Extract    recover + validate the JSON object in the reply
//!  └─ 6. History    prepend to the persisted, newest-first log
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use botanai::{resolve_api_key, AnalysisConfig, FileBackend, Session};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut builder = AnalysisConfig::builder();
//!     if let Some(key) = resolve_api_key() {
//!         builder = builder.api_key(key);
//!     }
//!     let backend = Arc::new(FileBackend::new(botanai::default_history_path()));
//!     let session = Session::open(builder.build()?, backend).await;
//!
//!     let record = session.analyze("ficus.jpg").await?;
//!     println!("{}: {}", record.common_name, record.health_status);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `botanai` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! ## Mock fallback
//!
//! With [`MockFallback::Enabled`], a missing credential or a model the
//! provider does not know yields a fixed "golden pothos" record instead of
//! an error. Such records carry [`AnalysisSource::Mock`].

// ── Modules ──────────────────────────────────────────────────────────────

pub mod analyze;
pub mod config;
pub mod error;
pub mod history;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use analyze::{analyze, analyze_bytes, analyze_normalized, analyze_sync, Session};
pub use config::{
    resolve_api_key, resolve_api_key_with, AnalysisConfig, AnalysisConfigBuilder, ImageBudget,
    Language, MockFallback,
};
pub use error::BotanError;
pub use history::{default_history_path, FileBackend, HistoryBackend, HistoryStore, MemoryBackend};
pub use output::{AnalysisSource, CareInstructions, HealthStatus, HistorySummary, PlantAnalysis};
pub use pipeline::llm::{MessagesProvider, VisionProvider};
pub use pipeline::normalize::NormalizedImage;
pub use pipeline::request::AnalysisRequest;
pub use progress::{AnalysisProgressCallback, NoopProgressCallback, ProgressCallback};
