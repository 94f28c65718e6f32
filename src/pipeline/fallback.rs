//! Canned record used when the provider cannot be used at all.
//!
//! Only substituted under [`crate::config::MockFallback::Enabled`], and only
//! for configuration errors. The content is fixed per language; the record
//! is tagged [`AnalysisSource::Mock`] so it never passes for a real result.

use crate::config::Language;
use crate::output::{AnalysisSource, CareInstructions, HealthStatus, PlantAnalysis};

/// The golden pothos demo record in `language`.
pub fn mock_analysis(language: Language) -> PlantAnalysis {
    let fr = language == Language::Fr;
    let pick = |en: &str, fr_text: &str| if fr { fr_text.to_string() } else { en.to_string() };

    PlantAnalysis {
        id: uuid::Uuid::new_v4().to_string(),
        timestamp: chrono::Utc::now().timestamp_millis(),
        scientific_name: "Epipremnum aureum".to_string(),
        common_name: pick("Golden pothos", "Pothos doré"),
        confidence: 0.92,
        health_status: HealthStatus::Healthy,
        diagnosis: pick("Plant appears healthy", "Plante en bonne santé"),
        symptoms: vec![pick("No visible stress", "Aucun symptôme visible")],
        treatment: vec![pick("No treatment required", "Pas de traitement nécessaire")],
        care_instructions: CareInstructions {
            water: pick(
                "Water when top inch of soil is dry",
                "Arroser quand le premier cm de terre est sec",
            ),
            light: pick("Bright, indirect light", "Lumière indirecte vive"),
            temperature: pick("65-80°F", "18-27°C"),
            humidity: pick("Moderate humidity", "Humidité modérée"),
        },
        fun_fact: pick(
            "Pothos is a popular, forgiving air-purifying houseplant.",
            "Le pothos est un purificateur d'air populaire et très tolérant.",
        ),
        image: None,
        source: AnalysisSource::Mock,
    }
}
