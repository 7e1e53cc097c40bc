// Topic analyzer trait and the request/result types that cross it.
//
// The service owns the analysis itself. Everything here is either what we
// send (records, existing topics, report context, search candidates) or what
// we get back, passed through without rewriting.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::db::models::{ChatGroup, Priority, Topic, TopicDraft};
use crate::error::TopicalError;

/// A topic already stored for the group, sent as context so the service can
/// link new topics to old ones.
#[derive(Debug, Clone, PartialEq)]
pub struct ExistingTopic {
    pub topic_name: String,
    pub priority: Priority,
    pub first_summary: Option<String>,
    pub related_topics: Vec<String>,
}

impl From<&Topic> for ExistingTopic {
    fn from(topic: &Topic) -> Self {
        Self {
            topic_name: topic.topic_name.clone(),
            priority: topic.priority,
            first_summary: topic.summaries.first().cloned(),
            related_topics: topic.related_topics.clone(),
        }
    }
}

/// One submission: a named group of chat records.
#[derive(Debug, Clone, Default)]
pub struct AnalysisRequest {
    pub group_name: String,
    pub description: String,
    pub records: Vec<String>,
    pub existing_topics: Vec<ExistingTopic>,
}

impl AnalysisRequest {
    /// Reject requests that can't be analysed. Called before any network I/O.
    pub fn validate(&self) -> Result<(), TopicalError> {
        if self.group_name.trim().is_empty() {
            return Err(TopicalError::Validation(
                "group name must not be empty".to_string(),
            ));
        }
        if self.records.is_empty() {
            return Err(TopicalError::Validation(
                "no chat records to analyse".to_string(),
            ));
        }
        if self.records.iter().all(|r| r.trim().is_empty()) {
            return Err(TopicalError::Validation(
                "all chat records are blank".to_string(),
            ));
        }
        Ok(())
    }
}

/// The topics exactly as the service returned them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub topics: Vec<TopicDraft>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportKind {
    Summary,
    #[default]
    Detailed,
    Analysis,
}

impl ReportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportKind::Summary => "summary",
            ReportKind::Detailed => "detailed",
            ReportKind::Analysis => "analysis",
        }
    }
}

impl std::str::FromStr for ReportKind {
    type Err = TopicalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "summary" => Ok(ReportKind::Summary),
            "detailed" => Ok(ReportKind::Detailed),
            "analysis" => Ok(ReportKind::Analysis),
            other => Err(TopicalError::Validation(format!(
                "unknown report kind '{other}' (expected summary, detailed or analysis)"
            ))),
        }
    }
}

impl std::fmt::Display for ReportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the report prompt needs about one topic.
#[derive(Debug, Clone)]
pub struct ReportContext {
    pub group_name: String,
    pub group_description: String,
    pub topic_id: String,
    pub topic_name: String,
    pub priority: Priority,
    pub summaries: Vec<String>,
    pub related_records: Vec<String>,
    pub related_topics: Vec<String>,
}

impl ReportContext {
    pub fn new(group: &ChatGroup, topic: &Topic) -> Self {
        Self {
            group_name: group.group_name.clone(),
            group_description: group.description.clone(),
            topic_id: topic.topic_id.clone(),
            topic_name: topic.topic_name.clone(),
            priority: topic.priority,
            summaries: topic.summaries.clone(),
            related_records: topic.related_records.clone(),
            related_topics: topic.related_topics.clone(),
        }
    }
}

/// A stored topic offered to the service for semantic ranking.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopicCandidate {
    pub topic_id: String,
    pub topic_name: String,
    pub group_id: String,
    pub group_name: String,
    pub priority: Priority,
    pub summaries: Vec<String>,
    pub related_topics: Vec<String>,
}

impl TopicCandidate {
    pub fn new(group: &ChatGroup, topic: &Topic) -> Self {
        Self {
            topic_id: topic.topic_id.clone(),
            topic_name: topic.topic_name.clone(),
            group_id: group.group_id.clone(),
            group_name: group.group_name.clone(),
            priority: topic.priority,
            summaries: topic.summaries.clone(),
            related_topics: topic.related_topics.clone(),
        }
    }
}

/// The service's answer to a semantic search prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticRanking {
    #[serde(default)]
    pub recommended_topics: Vec<String>,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
}

fn default_confidence() -> f64 {
    0.5
}

/// Interface to the external topic-analysis service.
#[async_trait]
pub trait TopicAnalyzer: Send + Sync {
    /// Model identifier, shown in status output.
    fn model_name(&self) -> &str;

    /// Identify topics in a group of chat records.
    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResult, TopicalError>;

    /// Write a plain-text report about one topic.
    async fn write_report(
        &self,
        context: &ReportContext,
        kind: ReportKind,
    ) -> Result<String, TopicalError>;

    /// Pick the candidates most relevant to `query`.
    async fn rank_topics(
        &self,
        query: &str,
        candidates: &[TopicCandidate],
        max_results: usize,
    ) -> Result<SemanticRanking, TopicalError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(group: &str, records: &[&str]) -> AnalysisRequest {
        AnalysisRequest {
            group_name: group.to_string(),
            records: records.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_validate_rejects_empty_input() {
        assert!(matches!(
            request("g", &[]).validate(),
            Err(TopicalError::Validation(_))
        ));
        assert!(matches!(
            request("g", &["  ", ""]).validate(),
            Err(TopicalError::Validation(_))
        ));
        assert!(matches!(
            request(" ", &["hello there"]).validate(),
            Err(TopicalError::Validation(_))
        ));
        assert!(request("g", &["hello there"]).validate().is_ok());
    }

    #[test]
    fn test_report_kind_parse() {
        assert_eq!("Summary".parse::<ReportKind>().unwrap(), ReportKind::Summary);
        assert_eq!(ReportKind::default(), ReportKind::Detailed);
        assert_eq!("analysis".parse::<ReportKind>().unwrap(), ReportKind::Analysis);
        assert!("essay".parse::<ReportKind>().is_err());
    }

    #[test]
    fn test_ranking_defaults_confidence() {
        let ranking: SemanticRanking =
            serde_json::from_str(r#"{"recommended_topics": ["topic_001_01"]}"#).unwrap();
        assert_eq!(ranking.confidence, 0.5);
        assert!(ranking.reasoning.is_empty());
    }
}
