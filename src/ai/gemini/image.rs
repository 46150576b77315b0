use super::client::GeminiHttpClient;
use super::types::{Content, GenerateContentResponse, InlineData, Part};
use crate::ai::{ImageGenerationService, RequestPart, ResponsePart};
use crate::Result;
use async_trait::async_trait;
use base64::Engine as _;
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Serialize)]
struct ImageRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: ImageGenerationConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ImageGenerationConfig {
    response_modalities: Vec<String>,
}

pub struct GeminiImageClient {
    http: GeminiHttpClient,
}

impl GeminiImageClient {
    pub fn new(api_key: String, model: String) -> Self {
        Self::new_with_client(api_key, model, reqwest::Client::new())
    }

    pub fn new_with_client(api_key: String, model: String, client: reqwest::Client) -> Self {
        Self {
            http: GeminiHttpClient::new_with_client(
                api_key,
                model,
                Duration::from_secs(120),
                client,
            ),
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.http = self.http.with_base_url(base_url);
        self
    }

    pub fn model(&self) -> &str {
        self.http.model()
    }

    fn to_wire(part: &RequestPart) -> Part {
        match part {
            RequestPart::Text(text) => Part::Text { text: text.clone() },
            RequestPart::Image { mime_type, data } => Part::InlineData {
                inline_data: InlineData {
                    mime_type: mime_type.clone(),
                    data: base64::engine::general_purpose::STANDARD.encode(data),
                },
            },
        }
    }

    /// Unusable parts (empty or undecodable payloads, unknown shapes) become
    /// [`ResponsePart::Empty`] so later parts can still supply the image.
    fn from_wire(part: Part) -> ResponsePart {
        match part {
            Part::Text { text } => ResponsePart::Text(text),
            Part::InlineData { inline_data } if inline_data.data.is_empty() => ResponsePart::Empty,
            Part::InlineData { inline_data } => {
                match base64::engine::general_purpose::STANDARD.decode(&inline_data.data) {
                    Ok(data) => ResponsePart::Image {
                        mime_type: inline_data.mime_type,
                        data,
                    },
                    Err(e) => {
                        tracing::warn!("Skipping undecodable Gemini inline image: {}", e);
                        ResponsePart::Empty
                    }
                }
            }
            Part::Other(_) => ResponsePart::Empty,
        }
    }
}

#[async_trait]
impl ImageGenerationService for GeminiImageClient {
    async fn generate_content(&self, parts: &[RequestPart]) -> Result<Vec<ResponsePart>> {
        let request = ImageRequest {
            contents: vec![Content {
                role: None,
                parts: parts.iter().map(Self::to_wire).collect(),
            }],
            generation_config: ImageGenerationConfig {
                response_modalities: vec!["TEXT".to_string(), "IMAGE".to_string()],
            },
        };

        let gemini_response: GenerateContentResponse = self.http.generate_content(&request).await?;

        let parts = gemini_response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| content.parts)
            .unwrap_or_default();

        tracing::debug!("Gemini returned {} response part(s)", parts.len());

        Ok(parts.into_iter().map(Self::from_wire).collect())
    }
}
