//! Request payload for the messages endpoint.
//!
//! One user turn carrying an inline base64 image block followed by a text
//! block; the schema instruction travels as the top-level `system` field.
//! The same body is accepted verbatim by a server-side proxy.

use crate::config::AnalysisConfig;
use crate::pipeline::input::split_data_url;
use crate::pipeline::normalize::NormalizedImage;
use crate::prompts::{system_instruction, user_prompt};
use serde::{Deserialize, Serialize};

/// Body POSTed to the messages endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub model: String,
    pub max_tokens: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub messages: Vec<Message>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: Vec<ContentBlock>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentBlock {
    Image { source: ImageSource },
    Text { text: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageSource {
    /// Always `"base64"`.
    #[serde(rename = "type")]
    pub kind: String,
    pub media_type: String,
    pub data: String,
}

impl ImageSource {
    /// Build from a raw base64 body or a full data URL; the header is stripped
    /// and its media type used.
    pub fn from_base64(payload: &str) -> Self {
        let (media_type, data) = split_data_url(payload);
        Self {
            kind: "base64".to_string(),
            media_type: media_type.to_string(),
            data: data.to_string(),
        }
    }
}

impl AnalysisRequest {
    /// The image block's payload, if any.
    pub fn image(&self) -> Option<&ImageSource> {
        self.messages
            .iter()
            .flat_map(|m| m.content.iter())
            .find_map(|block| match block {
                ContentBlock::Image { source } => Some(source),
                ContentBlock::Text { .. } => None,
            })
    }
}

/// Build the request for a normalised image.
pub fn build_request(image: &NormalizedImage, config: &AnalysisConfig) -> AnalysisRequest {
    let source = ImageSource {
        kind: "base64".to_string(),
        media_type: image.media_type.clone(),
        data: image.data.clone(),
    };
    build_request_from_source(source, config)
}

/// Build the request for an already-encoded payload (raw base64 or data URL).
pub fn build_request_from_base64(payload: &str, config: &AnalysisConfig) -> AnalysisRequest {
    build_request_from_source(ImageSource::from_base64(payload), config)
}

fn build_request_from_source(source: ImageSource, config: &AnalysisConfig) -> AnalysisRequest {
    let system = config
        .system_prompt
        .clone()
        .unwrap_or_else(|| system_instruction(config.language));

    AnalysisRequest {
        model: config.model.clone(),
        max_tokens: config.max_tokens,
        system: Some(system),
        messages: vec![Message {
            role: "user".to_string(),
            content: vec![
                ContentBlock::Image { source },
                ContentBlock::Text {
                    text: user_prompt(config.language).to_string(),
                },
            ],
        }],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Language;
    use serde_json::json;

    fn image() -> NormalizedImage {
        NormalizedImage {
            media_type: "image/jpeg".into(),
            data: "/9j/AAAA".into(),
            width: 4,
            height: 3,
            quality: 80,
            passes: 1,
        }
    }

    #[test]
    fn serialises_to_messages_shape() {
        let config = AnalysisConfig::default();
        let body = serde_json::to_value(build_request(&image(), &config)).unwrap();

        assert_eq!(body["model"], json!("claude-3-haiku-20240307"));
        assert_eq!(body["max_tokens"], json!(800));
        assert!(body["system"].as_str().unwrap().contains("healthStatus"));

        let content = &body["messages"][0]["content"];
        assert_eq!(body["messages"][0]["role"], json!("user"));
        assert_eq!(
            content[0],
            json!({
                "type": "image",
                "source": { "type": "base64", "media_type": "image/jpeg", "data": "/9j/AAAA" }
            })
        );
        assert_eq!(content[1]["type"], json!("text"));
        assert_eq!(
            content[1]["text"],
            json!("Analyze this plant image and fill in the requested JSON.")
        );
    }

    #[test]
    fn data_url_header_is_stripped() {
        let config = AnalysisConfig::default();
        let req = build_request_from_base64("data:image/png;base64,iVBORw0KGgo=", &config);
        let src = req.image().unwrap();
        assert_eq!(src.media_type, "image/png");
        assert_eq!(src.data, "iVBORw0KGgo=");
    }

    #[test]
    fn french_switches_instruction_not_status_literals() {
        let config = AnalysisConfig::builder().language(Language::Fr).build().unwrap();
        let req = build_request(&image(), &config);
        let system = req.system.as_deref().unwrap();
        assert!(system.contains("français"));
        assert!(system.contains("'Healthy', 'Sick' ou 'Unknown'"));
        match &req.messages[0].content[1] {
            ContentBlock::Text { text } => assert!(text.contains("Analyse")),
            other => panic!("expected text block, got {other:?}"),
        }
    }

    #[test]
    fn system_prompt_override_wins() {
        let config = AnalysisConfig::builder().system_prompt("custom").build().unwrap();
        let req = build_request(&image(), &config);
        assert_eq!(req.system.as_deref(), Some("custom"));
    }
}
