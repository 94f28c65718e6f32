//! Instruction text sent with every analysis request.
//!
//! The schema block is shared by both languages; only the language rule and
//! the short user turn change. The `healthStatus` literals are spelled out in
//! English in every variant because [`crate::pipeline::extract`] rejects
//! anything else.
//!
//! Callers can override the system instruction via
//! [`crate::config::AnalysisConfig::system_prompt`].

use crate::config::Language;

/// JSON shape the model must return.
pub const SCHEMA_INSTRUCTION: &str = r#"You are a plant identification and health analysis assistant.

Given an image of a plant (or something that might not be a plant), you MUST ALWAYS return a SINGLE JSON object with EXACTLY this shape, and NOTHING else:

{
  "scientificName": string,
  "commonName": string,
  "confidence": number, // between 0 and 1
  "healthStatus": "Healthy" | "Sick" | "Unknown",
  "diagnosis": string,
  "symptoms": string[],
  "treatment": string[],
  "careInstructions": {
    "water": string,
    "light": string,
    "temperature": string,
    "humidity": string
  },
  "funFact": string
}

Rules:
- Do NOT add any text before or after the JSON.
- Do NOT wrap the JSON in markdown or backticks.
- Look carefully for diseases, pests and nutrient deficiencies before deciding on "healthStatus".
- If the image does not contain a plant or you are unsure, set "healthStatus" to "Unknown" but STILL return a FULL JSON object."#;

const LANGUAGE_RULE_EN: &str = "You must respond in English. JSON values (commonName, diagnosis, symptoms, treatment, careInstructions, funFact) must be in English, EXCEPT 'healthStatus' which MUST be exactly 'Healthy', 'Sick', or 'Unknown'.";

const LANGUAGE_RULE_FR: &str = "Tu dois répondre en français. Les valeurs du JSON (commonName, diagnosis, symptoms, treatment, careInstructions, funFact) doivent être en français, SAUF 'healthStatus' qui DOIT être STRICTEMENT 'Healthy', 'Sick' ou 'Unknown' (ne traduis PAS cette valeur).";

/// Language rule appended to the schema instruction.
pub fn language_rule(language: Language) -> &'static str {
    match language {
        Language::En => LANGUAGE_RULE_EN,
        Language::Fr => LANGUAGE_RULE_FR,
    }
}

/// Full system instruction for `language`.
pub fn system_instruction(language: Language) -> String {
    format!("{SCHEMA_INSTRUCTION}\n{}", language_rule(language))
}

/// Text block sent next to the image in the user turn.
pub fn user_prompt(language: Language) -> &'static str {
    match language {
        Language::En => "Analyze this plant image and fill in the requested JSON.",
        Language::Fr => "Analyse cette image de plante et remplis le JSON demandé.",
    }
}
