use super::*;
use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestMessageContentPartImage, ChatCompletionRequestMessageContentPartText,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessage,
        ChatCompletionRequestUserMessageContent, ChatCompletionRequestUserMessageContentPart,
        CreateChatCompletionRequestArgs, ImageDetail, ImageUrl,
    },
    Client,
};
use std::time::Instant;

const SYSTEM_PROMPT: &str = "You are the judge of a drawing game. Players had a short time to \
    draw the same prompt. Be fair, be kind, and reply with JSON only.";

const MAX_TOKENS: u32 = 1024;

/// OpenAI provider implementation
pub struct OpenAiProvider {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiProvider {
    /// Create a new OpenAI provider with the given API key and model
    pub fn new(api_key: String, model: String) -> Self {
        let config = OpenAIConfig::new().with_api_key(api_key);
        let client = Client::with_config(config);

        Self { client, model }
    }

    fn text_part(text: String) -> ChatCompletionRequestUserMessageContentPart {
        ChatCompletionRequestUserMessageContentPart::Text(
            ChatCompletionRequestMessageContentPartText { text },
        )
    }

    fn user_message(request: &JudgeRequest) -> ChatCompletionRequestUserMessage {
        let mut content_parts = vec![Self::text_part(request.preamble())];

        for drawing in &request.drawings {
            content_parts.push(Self::text_part(format!("Player ID: {}", drawing.player_id)));
            content_parts.push(ChatCompletionRequestUserMessageContentPart::ImageUrl(
                ChatCompletionRequestMessageContentPartImage {
                    image_url: ImageUrl {
                        url: drawing.image.clone(),
                        detail: Some(ImageDetail::Low),
                    },
                },
            ));
        }

        content_parts.push(Self::text_part(request.instructions()));

        ChatCompletionRequestUserMessage {
            content: ChatCompletionRequestUserMessageContent::Array(content_parts),
            name: None,
        }
    }
}

#[async_trait]
impl VisionProvider for OpenAiProvider {
    async fn evaluate(&self, request: JudgeRequest) -> JudgeResult<JudgeResponse> {
        let start = Instant::now();

        let chat_request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .max_tokens(MAX_TOKENS)
            .messages([
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(SYSTEM_PROMPT)
                    .build()
                    .map_err(|e| JudgeError::ApiError(e.to_string()))?
                    .into(),
                Self::user_message(&request).into(),
            ])
            .build()
            .map_err(|e| JudgeError::ApiError(e.to_string()))?;

        // Execute with timeout
        let response =
            tokio::time::timeout(request.timeout, self.client.chat().create(chat_request))
                .await
                .map_err(|_| JudgeError::Timeout(request.timeout))?
                .map_err(|e| JudgeError::ApiError(e.to_string()))?;

        let text = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| JudgeError::ParseError("No content in response".to_string()))?;

        Ok(JudgeResponse {
            text: text.trim().to_string(),
            metadata: ResponseMetadata {
                provider: "openai".to_string(),
                model: self.model.clone(),
                tokens_used: response.usage.map(|u| u.total_tokens),
                latency_ms: start.elapsed().as_millis() as u64,
            },
        })
    }

    fn name(&self) -> &str {
        "openai"
    }
}
