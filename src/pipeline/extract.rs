//! Reply extraction: model text → validated [`PlantAnalysis`].
//!
//! Even when told to return bare JSON, models wrap it in prose or
//! ` ```json ` fences, and sometimes refuse in plain language. Recovery runs
//! in three steps:
//!
//! 1. parse the whole reply as a JSON object;
//! 2. parse the span from the first `{` to the last `}`;
//! 3. give up with [`BotanError::Extraction`], whose message *is* the reply,
//!    so a refusal like "This is not a plant" reaches the user unchanged.
//!
//! A recovered object is then checked against the schema: every field
//! present and typed, `healthStatus` one of the three literals, `confidence`
//! inside `[0, 1]`. Violations are [`BotanError::InvalidReply`].

use crate::error::BotanError;
use crate::output::{confidence_in_range, AnalysisSource, CareInstructions, HealthStatus, PlantAnalysis};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

/// The model's answer before identity and timestamp are attached.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedAnalysis {
    pub scientific_name: String,
    pub common_name: String,
    pub confidence: f64,
    #[serde(deserialize_with = "deserialize_health_status")]
    pub health_status: HealthStatus,
    pub diagnosis: String,
    pub symptoms: Vec<String>,
    pub treatment: Vec<String>,
    pub care_instructions: CareInstructions,
    #[serde(default)]
    pub fun_fact: String,
}

fn deserialize_health_status<'de, D>(deserializer: D) -> Result<HealthStatus, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    raw.parse().map_err(serde::de::Error::custom)
}

impl ParsedAnalysis {
    /// Stamp a fresh id and the current time onto the parsed answer.
    pub fn into_record(self) -> PlantAnalysis {
        PlantAnalysis {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: chrono::Utc::now().timestamp_millis(),
            scientific_name: self.scientific_name,
            common_name: self.common_name,
            confidence: self.confidence,
            health_status: self.health_status,
            diagnosis: self.diagnosis,
            symptoms: self.symptoms,
            treatment: self.treatment,
            care_instructions: self.care_instructions,
            fun_fact: self.fun_fact,
            image: None,
            source: AnalysisSource::Inference,
        }
    }
}

/// Recover the JSON object embedded in `reply`.
pub fn extract_json_object(reply: &str) -> Result<Map<String, Value>, BotanError> {
    if let Ok(Value::Object(obj)) = serde_json::from_str::<Value>(reply.trim()) {
        return Ok(obj);
    }

    if let (Some(start), Some(end)) = (reply.find('{'), reply.rfind('}')) {
        if start < end {
            match serde_json::from_str::<Value>(&reply[start..=end]) {
                Ok(Value::Object(obj)) => {
                    debug!("Recovered JSON object from bytes {}..={}", start, end);
                    return Ok(obj);
                }
                Ok(_) => {}
                Err(e) => debug!("Brace span is not JSON: {}", e),
            }
        }
    }

    Err(BotanError::Extraction {
        reply: reply.to_string(),
    })
}

/// Check a recovered object against the analysis schema.
pub fn parse_analysis(object: Map<String, Value>) -> Result<ParsedAnalysis, BotanError> {
    let parsed: ParsedAnalysis =
        serde_json::from_value(Value::Object(object)).map_err(|e| BotanError::InvalidReply {
            detail: e.to_string(),
        })?;

    if !confidence_in_range(parsed.confidence) {
        return Err(BotanError::InvalidReply {
            detail: format!("confidence {} is outside [0, 1]", parsed.confidence),
        });
    }
    Ok(parsed)
}

/// Full extraction: reply text → stored record.
pub fn extract_analysis(reply: &str) -> Result<PlantAnalysis, BotanError> {
    let object = extract_json_object(reply)?;
    Ok(parse_analysis(object)?.into_record())
}
