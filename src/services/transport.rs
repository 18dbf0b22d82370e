// src/services/transport.rs
use crate::config::ApiKey;
use crate::errors::StyleSenseError;
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use bytes::Bytes;
use log::debug;
use reqwest::Client;
use serde_json::{Map, Value, json};
use std::time::Duration;

#[derive(Debug, Clone)]
pub enum ContentPart {
    Text(String),
    InlineImage { mime_type: String, data: Bytes },
}

/// One call to the upstream model.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub model: String,
    pub parts: Vec<ContentPart>,
    /// Structured-output schema; when set the model is asked for JSON.
    pub response_schema: Option<Value>,
    /// Set for image generation calls.
    pub aspect_ratio: Option<&'static str>,
}

impl GenerateRequest {
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            parts: vec![ContentPart::Text(prompt.into())],
            response_schema: None,
            aspect_ratio: None,
        }
    }

    pub fn with_image(mut self, mime_type: impl Into<String>, data: Bytes) -> Self {
        self.parts.push(ContentPart::InlineImage {
            mime_type: mime_type.into(),
            data,
        });
        self
    }

    pub fn with_schema(mut self, schema: Value) -> Self {
        self.response_schema = Some(schema);
        self
    }

    pub fn with_image_output(mut self, aspect_ratio: &'static str) -> Self {
        self.aspect_ratio = Some(aspect_ratio);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResponsePart {
    Text(String),
    /// Base64 payload exactly as received.
    InlineData { mime_type: String, data: String },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerateResponse {
    pub parts: Vec<ResponsePart>,
}

impl GenerateResponse {
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| match part {
                ResponsePart::Text(text) => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }

    pub fn first_inline_data(&self) -> Option<(&str, &str)> {
        self.parts.iter().find_map(|part| match part {
            ResponsePart::InlineData { mime_type, data } if !data.is_empty() => {
                Some((mime_type.as_str(), data.as_str()))
            }
            _ => None,
        })
    }
}

/// The single wire protocol this service speaks. The credential is passed
/// per call so the holder of the configuration decides whether a call may
/// happen at all.
#[async_trait]
pub trait ModelTransport: Send + Sync {
    async fn generate(
        &self,
        api_key: &ApiKey,
        request: &GenerateRequest,
    ) -> Result<GenerateResponse, StyleSenseError>;
}

pub struct GeminiTransport {
    client: Client,
    base_url: String,
}

impl GeminiTransport {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, StyleSenseError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StyleSenseError::Configuration(format!("HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, model)
    }

    fn build_payload(request: &GenerateRequest) -> Value {
        let parts: Vec<Value> = request
            .parts
            .iter()
            .map(|part| match part {
                ContentPart::Text(text) => json!({ "text": text }),
                ContentPart::InlineImage { mime_type, data } => json!({
                    "inlineData": {
                        "mimeType": mime_type,
                        "data": general_purpose::STANDARD.encode(data),
                    }
                }),
            })
            .collect();

        let mut generation_config = Map::new();
        if let Some(schema) = &request.response_schema {
            generation_config.insert("responseMimeType".into(), json!("application/json"));
            generation_config.insert("responseSchema".into(), schema.clone());
        }
        if let Some(aspect_ratio) = request.aspect_ratio {
            generation_config.insert("responseModalities".into(), json!(["IMAGE"]));
            generation_config.insert(
                "imageConfig".into(),
                json!({ "aspectRatio": aspect_ratio }),
            );
        }

        let mut payload = json!({
            "contents": [{ "role": "user", "parts": parts }],
        });
        if !generation_config.is_empty() {
            payload["generationConfig"] = Value::Object(generation_config);
        }
        payload
    }

    fn parse_response(body: &Value) -> GenerateResponse {
        let parts = body["candidates"]
            .as_array()
            .into_iter()
            .flatten()
            .flat_map(|candidate| candidate["content"]["parts"].as_array().into_iter().flatten())
            .filter_map(|part| {
                let inline = part.get("inlineData").or_else(|| part.get("inline_data"));
                if let Some(inline) = inline {
                    let data = inline["data"].as_str().unwrap_or_default().to_string();
                    let mime_type = inline
                        .get("mimeType")
                        .or_else(|| inline.get("mime_type"))
                        .and_then(Value::as_str)
                        .unwrap_or("image/png")
                        .to_string();
                    return Some(ResponsePart::InlineData { mime_type, data });
                }
                part["text"]
                    .as_str()
                    .map(|text| ResponsePart::Text(text.to_string()))
            })
            .collect();
        GenerateResponse { parts }
    }
}

#[async_trait]
impl ModelTransport for GeminiTransport {
    async fn generate(
        &self,
        api_key: &ApiKey,
        request: &GenerateRequest,
    ) -> Result<GenerateResponse, StyleSenseError> {
        debug!("calling model {}", request.model);

        let response = self
            .client
            .post(self.endpoint(&request.model))
            .header("x-goog-api-key", api_key.expose())
            .json(&Self::build_payload(request))
            .send()
            .await
            .map_err(|e| StyleSenseError::from_upstream(format!("Gemini request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(StyleSenseError::from_upstream(format!(
                "Gemini error (status {}): {}",
                status.as_u16(),
                error_text
            )));
        }

        let body: Value = response.json().await.map_err(|e| {
            StyleSenseError::Transport(format!("Failed to parse Gemini response: {}", e))
        })?;

        Ok(Self::parse_response(&body))
    }
}
