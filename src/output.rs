//! Analysis result types.
//!
//! [`PlantAnalysis`] is the record stored in history. It serialises with
//! camelCase keys (`commonName`, `healthStatus`, ...).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Overall health verdict.
///
/// Always one of three literal tags, never translated: the French prompt
/// still asks the model for `"Healthy"`, `"Sick"` or `"Unknown"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HealthStatus {
    Healthy,
    Sick,
    Unknown,
}

impl HealthStatus {
    pub const ALL: [HealthStatus; 3] = [HealthStatus::Healthy, HealthStatus::Sick, HealthStatus::Unknown];

    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "Healthy",
            HealthStatus::Sick => "Sick",
            HealthStatus::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HealthStatus {
    type Err = String;

    /// Exact, case-sensitive match against the three literals.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HealthStatus::ALL
            .into_iter()
            .find(|h| h.as_str() == s)
            .ok_or_else(|| format!("unknown health status {s:?}, expected Healthy, Sick or Unknown"))
    }
}

/// Free-text care guidance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CareInstructions {
    pub water: String,
    pub light: String,
    pub temperature: String,
    pub humidity: String,
}

/// Where a record came from.
///
/// `Mock` marks the canned record substituted when no provider could be
/// reached; it must never be mistaken for a real identification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisSource {
    #[default]
    Inference,
    Mock,
}

/// One identification + diagnosis, as stored in history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlantAnalysis {
    /// Unique id (UUID v4).
    pub id: String,
    /// Creation time, milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub scientific_name: String,
    pub common_name: String,
    /// Model confidence in `[0, 1]`.
    pub confidence: f64,
    pub health_status: HealthStatus,
    pub diagnosis: String,
    pub symptoms: Vec<String>,
    pub treatment: Vec<String>,
    pub care_instructions: CareInstructions,
    pub fun_fact: String,
    /// The normalised image as a data URL, kept for later display.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Records written before this field existed are real inferences.
    #[serde(default)]
    pub source: AnalysisSource,
}

/// `true` when `confidence` is a finite value within `[0, 1]`.
pub fn confidence_in_range(confidence: f64) -> bool {
    confidence.is_finite() && (0.0..=1.0).contains(&confidence)
}

impl PlantAnalysis {
    /// `true` for the canned fallback record.
    pub fn is_mock(&self) -> bool {
        self.source == AnalysisSource::Mock
    }

    /// Attach the source image. The only mutation a record ever sees.
    pub fn with_image(mut self, data_url: impl Into<String>) -> Self {
        self.image = Some(data_url.into());
        self
    }

    /// Compact view used by history listings.
    pub fn summary(&self) -> HistorySummary {
        HistorySummary {
            id: self.id.clone(),
            timestamp: self.timestamp,
            common_name: self.common_name.clone(),
            health_status: self.health_status,
            has_image: self.image.is_some(),
            source: self.source,
        }
    }
}

/// One line of a history listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistorySummary {
    pub id: String,
    pub timestamp: i64,
    pub common_name: String,
    pub health_status: HealthStatus,
    pub has_image: bool,
    pub source: AnalysisSource,
}
