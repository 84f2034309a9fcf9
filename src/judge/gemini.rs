use super::*;
use crate::drawing::parse_data_url;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Google Gemini provider using the `generateContent` REST endpoint
pub struct GeminiProvider {
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl GeminiProvider {
    pub fn new(base_url: String, api_key: String, model: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model,
            client,
        }
    }

    fn build_request(request: &JudgeRequest) -> JudgeResult<GenerateContentRequest> {
        let mut parts = vec![Part::text(request.preamble())];

        for drawing in &request.drawings {
            let image = parse_data_url(&drawing.image).ok_or_else(|| {
                JudgeError::ApiError(format!("drawing from {} is not an image", drawing.player_id))
            })?;
            parts.push(Part::text(format!("Player ID: {}", drawing.player_id)));
            parts.push(Part {
                text: None,
                inline_data: Some(InlineData {
                    mime_type: image.format.mime_type().to_string(),
                    data: image.data.to_string(),
                }),
            });
        }

        parts.push(Part::text(request.instructions()));

        Ok(GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts,
            }],
            generation_config: GenerationConfig {
                temperature: 0.4,
                top_p: 1.0,
                top_k: 32,
                max_output_tokens: 4096,
                response_mime_type: "application/json".to_string(),
            },
            safety_settings: SAFETY_CATEGORIES
                .iter()
                .map(|category| SafetySetting {
                    category: category.to_string(),
                    threshold: "BLOCK_MEDIUM_AND_ABOVE".to_string(),
                })
                .collect(),
        })
    }
}

const SAFETY_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
    safety_settings: Vec<SafetySetting>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

impl Part {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            inline_data: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: u32,
    max_output_tokens: u32,
    response_mime_type: String,
}

#[derive(Debug, Serialize)]
struct SafetySetting {
    category: String,
    threshold: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    total_token_count: Option<u32>,
}

#[async_trait]
impl VisionProvider for GeminiProvider {
    async fn evaluate(&self, request: JudgeRequest) -> JudgeResult<JudgeResponse> {
        let start = Instant::now();
        let body = Self::build_request(&request)?;

        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );

        // Execute with timeout
        let response = tokio::time::timeout(
            request.timeout,
            self.client
                .post(&url)
                .header("x-goog-api-key", &self.api_key)
                .json(&body)
                .send(),
        )
        .await
        .map_err(|_| JudgeError::Timeout(request.timeout))?
        .map_err(|e| JudgeError::ApiError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(JudgeError::ApiError(format!(
                "Gemini API returned status: {}",
                response.status()
            )));
        }

        let reply: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| JudgeError::ParseError(e.to_string()))?;

        let candidate = reply
            .candidates
            .first()
            .ok_or_else(|| JudgeError::ParseError("No candidates in response".to_string()))?;

        let text: String = candidate
            .content
            .iter()
            .flat_map(|content| content.parts.iter())
            .filter_map(|part| part.text.as_deref())
            .collect();

        if text.trim().is_empty() {
            return Err(JudgeError::ParseError(format!(
                "No text in response (finish reason: {})",
                candidate.finish_reason.as_deref().unwrap_or("unknown")
            )));
        }

        Ok(JudgeResponse {
            text: text.trim().to_string(),
            metadata: ResponseMetadata {
                provider: "gemini".to_string(),
                model: self.model.clone(),
                tokens_used: reply.usage_metadata.and_then(|u| u.total_token_count),
                latency_ms: start.elapsed().as_millis() as u64,
            },
        })
    }

    fn name(&self) -> &str {
        "gemini"
    }
}
