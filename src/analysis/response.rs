// Pulling JSON out of chat-completion text.
//
// Models wrap their JSON in prose or Markdown fences more often than not.
// We take the span from the first `{` to the last `}` and, if that doesn't
// parse, retry with the fences stripped from the whole reply.

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::db::models::{Priority, TopicDraft};
use crate::error::TopicalError;
use crate::output::truncate_chars;

use super::traits::AnalysisResult;

/// Span from the first `{` to the last `}`, if there is one.
pub fn outermost_object(content: &str) -> Option<&str> {
    let start = content.find('{')?;
    let end = content.rfind('}')?;
    (end > start).then(|| &content[start..=end])
}

/// Remove a leading ```json / ``` fence and a trailing ``` fence.
pub fn strip_code_fences(content: &str) -> &str {
    let mut s = content.trim();
    if let Some(rest) = s.strip_prefix("```json") {
        s = rest;
    } else if let Some(rest) = s.strip_prefix("```") {
        s = rest;
    }
    if let Some(rest) = s.strip_suffix("```") {
        s = rest;
    }
    s.trim()
}

/// Deserialize the JSON payload embedded in a model reply.
pub fn parse_payload<T: DeserializeOwned>(content: &str) -> Result<T, TopicalError> {
    let first_try = match outermost_object(content) {
        Some(object) => serde_json::from_str(object),
        None => serde_json::from_str(strip_code_fences(content)),
    };
    match first_try {
        Ok(value) => Ok(value),
        Err(first_err) => serde_json::from_str(strip_code_fences(content)).map_err(|_| {
            TopicalError::Service(format!(
                "could not parse JSON from service reply ({first_err}): {}",
                truncate_chars(content, 200)
            ))
        }),
    }
}

#[derive(Deserialize)]
struct TopicsPayload {
    topics: Option<Vec<WireTopic>>,
}

#[derive(Deserialize)]
struct WireTopic {
    topic_name: String,
    #[serde(default)]
    priority: Option<String>,
    #[serde(default)]
    summaries: Vec<String>,
    #[serde(default)]
    related_records: Vec<String>,
    #[serde(default)]
    related_topics: Vec<String>,
}

/// Parse the topic-analysis reply into drafts. A reply without a `topics`
/// array is a service error; an empty array is a valid (empty) result.
pub fn parse_topics(content: &str) -> Result<AnalysisResult, TopicalError> {
    let payload: TopicsPayload = parse_payload(content)?;
    let topics = payload.topics.ok_or_else(|| {
        TopicalError::Service("service reply has no \"topics\" field".to_string())
    })?;

    Ok(AnalysisResult {
        topics: topics
            .into_iter()
            .map(|t| TopicDraft {
                topic_name: t.topic_name,
                priority: Priority::from_label(t.priority.as_deref().unwrap_or_default()),
                summaries: t.summaries,
                related_records: t.related_records,
                related_topics: t.related_topics,
            })
            .collect(),
    })
}
