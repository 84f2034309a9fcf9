mod gemini;
mod openai;
pub mod scoring;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::types::ConnectionId;

pub use gemini::GeminiProvider;
pub use openai::OpenAiProvider;

/// Result type for judging operations
pub type JudgeResult<T> = Result<T, JudgeError>;

/// Errors that can occur while asking an AI provider to judge drawings
#[derive(Debug, thiserror::Error)]
pub enum JudgeError {
    #[error("API request failed: {0}")]
    ApiError(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Response parsing failed: {0}")]
    ParseError(String),

    #[error("Response violates the scoring contract: {0}")]
    InvalidResponse(String),
}

/// One player's submission for the round
#[derive(Debug, Clone, PartialEq)]
pub struct Drawing {
    pub player_id: ConnectionId,
    /// `data:image/...;base64,` URL as submitted
    pub image: String,
}

/// Outcome of judging a round. All fields absent means judging was skipped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Judgment {
    pub winner_id: Option<ConnectionId>,
    pub scores: Option<HashMap<ConnectionId, u32>>,
    pub comments: Option<HashMap<ConnectionId, String>>,
}

impl Judgment {
    /// Zero for everyone and no winner; used whenever the judge fails
    pub fn fallback(order: &[ConnectionId]) -> Self {
        Self {
            winner_id: None,
            scores: Some(order.iter().map(|id| (id.clone(), 0)).collect()),
            comments: None,
        }
    }

    /// Validate, normalize and pick a winner from a raw judge reply
    pub fn from_response(text: &str, order: &[ConnectionId]) -> JudgeResult<Self> {
        let mut verdict = scoring::parse_verdict(text, order)?;
        scoring::normalize_scores(&mut verdict.scores, order);
        let winner_id = scoring::select_winner(&verdict.scores, order);

        Ok(Self {
            winner_id,
            scores: Some(verdict.scores),
            comments: Some(verdict.comments),
        })
    }
}

/// The judging boundary the room state machine talks to.
///
/// Implementations never fail: any problem is folded into a degraded
/// [`Judgment`].
#[async_trait]
pub trait Judge: Send + Sync {
    /// `drawings` is in join order, which is also the tie-break order
    async fn judge(&self, prompt: &str, drawings: &[Drawing]) -> Judgment;

    /// Whether an AI provider is configured at all
    fn is_available(&self) -> bool {
        true
    }
}

/// Used when no provider credentials are configured
#[derive(Debug, Default)]
pub struct UnavailableJudge;

#[async_trait]
impl Judge for UnavailableJudge {
    async fn judge(&self, _prompt: &str, _drawings: &[Drawing]) -> Judgment {
        tracing::info!("Skipping AI judging, no provider configured");
        Judgment::default()
    }

    fn is_available(&self) -> bool {
        false
    }
}

/// Request sent to a vision provider
#[derive(Debug, Clone)]
pub struct JudgeRequest {
    /// The secret prompt players had to draw
    pub prompt: String,
    pub drawings: Vec<Drawing>,
    /// Timeout for the request
    pub timeout: Duration,
}

impl JudgeRequest {
    /// Text shown before the drawings
    pub fn preamble(&self) -> String {
        format!(
            "Game Prompt: \"{}\". The following images are drawings submitted by different players. \
             Each drawing is preceded by the ID of the player who drew it.",
            self.prompt
        )
    }

    /// Text shown after the drawings, describing the expected reply
    pub fn instructions(&self) -> String {
        let ids: Vec<&str> = self.drawings.iter().map(|d| d.player_id.as_str()).collect();
        format!(
            "Judge how well each drawing represents the prompt \"{prompt}\". \
             Give every player an integer score from 0 to 100 so that all scores add up to exactly 100, \
             and a short, friendly comment (one sentence) about their drawing. \
             The player IDs are: {ids}. \
             Respond with only a JSON object of the form \
             {{\"scores\": {{\"<player id>\": <integer>}}, \"comments\": {{\"<player id>\": \"<comment>\"}}}} \
             with exactly one entry per player ID in both objects.",
            prompt = self.prompt,
            ids = ids.join(", "),
        )
    }
}

/// Raw reply from a vision provider
#[derive(Debug, Clone)]
pub struct JudgeResponse {
    pub text: String,
    pub metadata: ResponseMetadata,
}

/// Metadata about the provider response
#[derive(Debug, Clone)]
pub struct ResponseMetadata {
    /// Name of the provider (e.g., "gemini", "openai")
    pub provider: String,
    /// Model name used
    pub model: String,
    /// Tokens consumed (if available)
    pub tokens_used: Option<u32>,
    /// Latency in milliseconds
    pub latency_ms: u64,
}

/// Trait that all AI vision providers must implement
#[async_trait]
pub trait VisionProvider: Send + Sync {
    /// Ask the model to score the drawings; returns its raw text reply
    async fn evaluate(&self, request: JudgeRequest) -> JudgeResult<JudgeResponse>;

    /// Get the name of this provider
    fn name(&self) -> &str;
}

/// Judges rounds through a vision provider and enforces the scoring contract
/// on whatever comes back.
pub struct VisionJudge {
    provider: Box<dyn VisionProvider>,
    timeout: Duration,
}

impl VisionJudge {
    pub fn new(provider: Box<dyn VisionProvider>, timeout: Duration) -> Self {
        Self { provider, timeout }
    }
}

#[async_trait]
impl Judge for VisionJudge {
    async fn judge(&self, prompt: &str, drawings: &[Drawing]) -> Judgment {
        if drawings.is_empty() {
            tracing::info!("Skipping AI judging, no drawings were submitted");
            return Judgment::default();
        }

        let order: Vec<ConnectionId> = drawings.iter().map(|d| d.player_id.clone()).collect();
        let request = JudgeRequest {
            prompt: prompt.to_string(),
            drawings: drawings.to_vec(),
            timeout: self.timeout,
        };

        tracing::info!(
            "Sending {} drawings to {} for prompt: {}",
            drawings.len(),
            self.provider.name(),
            prompt
        );

        let result = match self.provider.evaluate(request).await {
            Ok(response) => {
                tracing::info!(
                    "Judge reply from {} ({}) in {}ms, tokens: {:?}",
                    response.metadata.provider,
                    response.metadata.model,
                    response.metadata.latency_ms,
                    response.metadata.tokens_used
                );
                tracing::debug!("Judge reply: {}", response.text);
                Judgment::from_response(&response.text, &order)
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(judgment) => judgment,
            Err(e) => {
                tracing::warn!(
                    "Judging via {} failed: {}. Falling back to zero scores.",
                    self.provider.name(),
                    e
                );
                Judgment::fallback(&order)
            }
        }
    }
}

/// Configuration for the AI judge
#[derive(Debug, Clone)]
pub struct JudgeConfig {
    /// Google Gemini API key
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_base_url: String,
    /// OpenAI API key
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    /// Timeout for a single judging request
    pub timeout: Duration,
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            gemini_api_key: None,
            gemini_model: "gemini-1.5-flash".to_string(),
            gemini_base_url: "https://generativelanguage.googleapis.com".to_string(),
            openai_api_key: None,
            openai_model: "gpt-4o-mini".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

impl JudgeConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            gemini_api_key: non_empty_env("GEMINI_API_KEY"),
            gemini_model: non_empty_env("GEMINI_MODEL").unwrap_or(defaults.gemini_model),
            gemini_base_url: non_empty_env("GEMINI_BASE_URL").unwrap_or(defaults.gemini_base_url),
            openai_api_key: non_empty_env("OPENAI_API_KEY"),
            openai_model: non_empty_env("OPENAI_MODEL").unwrap_or(defaults.openai_model),
            timeout: non_empty_env("JUDGE_TIMEOUT")
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
        }
    }

    /// Build the first configured provider, preferring Gemini
    pub fn build_provider(&self) -> JudgeResult<Box<dyn VisionProvider>> {
        if let Some(api_key) = &self.gemini_api_key {
            return Ok(Box::new(GeminiProvider::new(
                self.gemini_base_url.clone(),
                api_key.clone(),
                self.gemini_model.clone(),
            )));
        }

        if let Some(api_key) = &self.openai_api_key {
            return Ok(Box::new(OpenAiProvider::new(
                api_key.clone(),
                self.openai_model.clone(),
            )));
        }

        Err(JudgeError::ConfigError(
            "No AI judge configured. Set GEMINI_API_KEY or OPENAI_API_KEY".to_string(),
        ))
    }

    /// Build the judge used by the game. Without credentials this is a judge
    /// that always skips, which keeps rounds flowing with no winner.
    pub fn build_judge(&self) -> Arc<dyn Judge> {
        match self.build_provider() {
            Ok(provider) => {
                tracing::info!("AI judge initialized with provider {}", provider.name());
                Arc::new(VisionJudge::new(provider, self.timeout))
            }
            Err(e) => {
                tracing::warn!("{}. AI judging disabled.", e);
                Arc::new(UnavailableJudge)
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Provider that answers every request with a canned reply
    pub struct ScriptedProvider {
        reply: Box<dyn Fn(&JudgeRequest) -> JudgeResult<String> + Send + Sync>,
        pub requests: Arc<Mutex<Vec<JudgeRequest>>>,
    }

    impl ScriptedProvider {
        pub fn new(reply: impl Fn(&JudgeRequest) -> JudgeResult<String> + Send + Sync + 'static) -> Self {
            Self {
                reply: Box::new(reply),
                requests: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    #[async_trait]
    impl VisionProvider for ScriptedProvider {
        async fn evaluate(&self, request: JudgeRequest) -> JudgeResult<JudgeResponse> {
            let text = (self.reply)(&request)?;
            self.requests.lock().unwrap().push(request);
            Ok(JudgeResponse {
                text,
                metadata: ResponseMetadata {
                    provider: "scripted".to_string(),
                    model: "test".to_string(),
                    tokens_used: None,
                    latency_ms: 0,
                },
            })
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }
}
