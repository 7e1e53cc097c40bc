// OpenAI-compatible chat-completions implementation of TopicAnalyzer.
//
// POST {base_url}/chat/completions with a bearer token. The defaults point
// at ModelScope's inference API and a Qwen model, but any compatible
// endpoint works via TOPICAL_BASE_URL / TOPICAL_MODEL.
//
// No retries and no caching: a failed call surfaces as an error and the
// caller decides what to do.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use crate::config::{ApiKey, Config};
use crate::error::TopicalError;
use crate::output::truncate_chars;

use super::prompts;
use super::rate_limiter::RateLimiter;
use super::response::{parse_payload, parse_topics};
use super::traits::{
    AnalysisRequest, AnalysisResult, ReportContext, ReportKind, SemanticRanking, TopicAnalyzer,
    TopicCandidate,
};

const ANALYSIS_TEMPERATURE: f32 = 0.3;
const ANALYSIS_MAX_TOKENS: u32 = 2000;
const REPORT_TEMPERATURE: f32 = 0.5;
const REPORT_MAX_TOKENS: u32 = 1500;
const SEARCH_TEMPERATURE: f32 = 0.3;

pub struct ChatCompletionsAnalyzer {
    client: Client,
    url: String,
    model: String,
    api_key: ApiKey,
    timeout: Duration,
    rate_limiter: Option<RateLimiter>,
}

impl ChatCompletionsAnalyzer {
    /// Build a client from the loaded configuration and a validated key.
    pub fn new(config: &Config, api_key: &ApiKey) -> Result<Self, TopicalError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| TopicalError::Configuration(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            url: config.completions_url(),
            model: config.model.clone(),
            api_key: api_key.clone(),
            timeout: config.request_timeout,
            rate_limiter: config.max_requests_per_second.map(RateLimiter::new),
        })
    }

    /// One chat-completion round trip. Returns the assistant's content.
    async fn complete(
        &self,
        system: &str,
        user: String,
        temperature: f32,
        max_tokens: Option<u32>,
    ) -> Result<String, TopicalError> {
        if let Some(limiter) = &self.rate_limiter {
            limiter.acquire().await;
        }

        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature,
            max_tokens,
        };

        debug!(url = %self.url, model = %self.model, "Calling analysis service");

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(self.api_key.expose())
            .json(&request)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let body = response.text().await.unwrap_or_default();
            return Err(TopicalError::Authentication(format!(
                "{status} ({})",
                truncate_chars(body.trim(), 200)
            )));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TopicalError::Service(format!(
                "service returned {status}: {}",
                truncate_chars(body.trim(), 200)
            )));
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                self.timeout_error()
            } else {
                TopicalError::Service(format!("malformed response body: {e}"))
            }
        })?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| TopicalError::Service("response contained no message".to_string()))
    }

    fn transport_error(&self, err: reqwest::Error) -> TopicalError {
        if err.is_timeout() {
            self.timeout_error()
        } else {
            TopicalError::Service(format!("request failed: {err}"))
        }
    }

    fn timeout_error(&self) -> TopicalError {
        TopicalError::Timeout {
            seconds: self.timeout.as_secs(),
        }
    }
}

#[async_trait]
impl TopicAnalyzer for ChatCompletionsAnalyzer {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResult, TopicalError> {
        request.validate()?;

        let content = self
            .complete(
                prompts::ANALYSIS_SYSTEM,
                prompts::analysis_prompt(request),
                ANALYSIS_TEMPERATURE,
                Some(ANALYSIS_MAX_TOKENS),
            )
            .await?;
        let result = parse_topics(&content)?;

        info!(
            group = %request.group_name,
            records = request.records.len(),
            topics = result.topics.len(),
            "Analysis complete"
        );
        Ok(result)
    }

    async fn write_report(
        &self,
        context: &ReportContext,
        kind: ReportKind,
    ) -> Result<String, TopicalError> {
        let report = self
            .complete(
                prompts::REPORT_SYSTEM,
                prompts::report_prompt(context, kind),
                REPORT_TEMPERATURE,
                Some(REPORT_MAX_TOKENS),
            )
            .await?;
        debug!(topic = %context.topic_id, kind = %kind, chars = report.len(), "Report written");
        Ok(report)
    }

    async fn rank_topics(
        &self,
        query: &str,
        candidates: &[TopicCandidate],
        max_results: usize,
    ) -> Result<SemanticRanking, TopicalError> {
        if query.trim().is_empty() {
            return Err(TopicalError::Validation(
                "search query must not be empty".to_string(),
            ));
        }
        if candidates.is_empty() {
            return Ok(SemanticRanking {
                recommended_topics: Vec::new(),
                reasoning: String::new(),
                confidence: 0.0,
            });
        }

        let content = self
            .complete(
                prompts::SEARCH_SYSTEM,
                prompts::search_prompt(query, candidates, max_results),
                SEARCH_TEMPERATURE,
                None,
            )
            .await?;
        parse_payload(&content)
    }
}

// --- Chat-completions request/response types ---

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}
