// Topic search: keyword scoring plus optional AI semantic ranking.
//
// Keyword search is a case-insensitive substring match with fixed weights:
// group or topic name +3, each matching summary or related topic +2.
//
// AI search asks the analysis service to pick topic ids from the candidate
// list. Large candidate sets are sent in batches; a failed batch is skipped.
// At most AI_PER_GROUP_CAP recommendations per group survive.

use std::collections::HashMap;

use serde::Serialize;
use tracing::{info, warn};

use crate::analysis::{TopicAnalyzer, TopicCandidate};
use crate::db::models::ChatStructure;
use crate::error::TopicalError;

const GROUP_NAME_WEIGHT: u32 = 3;
const TOPIC_NAME_WEIGHT: u32 = 3;
const SUMMARY_WEIGHT: u32 = 2;
const RELATED_TOPIC_WEIGHT: u32 = 2;

/// Above this many candidates, AI search switches to batches.
pub const BATCH_THRESHOLD: usize = 20;
pub const DEFAULT_BATCH_SIZE: usize = 20;
pub const DEFAULT_MAX_RESULTS: usize = 10;
pub const AI_PER_GROUP_CAP: usize = 3;

/// Optional group-name / topic-name substring filters.
#[derive(Debug, Clone, Default)]
pub struct SearchFilter {
    pub group_name: Option<String>,
    pub topic_name: Option<String>,
}

impl SearchFilter {
    fn matches(&self, group_name: &str, topic_name: &str) -> bool {
        let contains = |filter: &Option<String>, value: &str| match filter {
            Some(f) if !f.trim().is_empty() => value.to_lowercase().contains(&f.to_lowercase()),
            _ => true,
        };
        contains(&self.group_name, group_name) && contains(&self.topic_name, topic_name)
    }
}

#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub query: String,
    pub filter: SearchFilter,
    pub use_ai: bool,
    pub max_results: usize,
    /// Force batch mode with this batch size.
    pub batch_size: Option<usize>,
}

impl SearchQuery {
    pub fn keyword(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            filter: SearchFilter::default(),
            use_ai: false,
            max_results: DEFAULT_MAX_RESULTS,
            batch_size: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct KeywordMatch {
    pub topic: TopicCandidate,
    pub score: u32,
    pub match_details: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AiRecommendation {
    pub topic: TopicCandidate,
    pub reasoning: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResults {
    pub query: String,
    pub keyword_results: Vec<KeywordMatch>,
    pub ai_results: Vec<AiRecommendation>,
    /// Set when the AI ranking failed; keyword results are still returned.
    pub ai_error: Option<String>,
}

/// Every topic passing the filter, in storage order.
pub fn candidates(structure: &ChatStructure, filter: &SearchFilter) -> Vec<TopicCandidate> {
    structure
        .chat_groups
        .iter()
        .flat_map(|g| g.topics.iter().map(move |t| (g, t)))
        .filter(|(g, t)| filter.matches(&g.group_name, &t.topic_name))
        .map(|(g, t)| TopicCandidate::new(g, t))
        .collect()
}

fn validate_query(query: &str) -> Result<(), TopicalError> {
    if query.trim().is_empty() {
        return Err(TopicalError::Validation(
            "search query must not be empty".to_string(),
        ));
    }
    Ok(())
}

/// Score every filtered topic against `query`; best matches first.
pub fn keyword_search(
    structure: &ChatStructure,
    query: &str,
    filter: &SearchFilter,
) -> Result<Vec<KeywordMatch>, TopicalError> {
    validate_query(query)?;
    let needle = query.to_lowercase();
    let hit = |value: &str| value.to_lowercase().contains(&needle);

    let mut matches = Vec::new();
    for topic in candidates(structure, filter) {
        let mut score = 0;
        let mut details = Vec::new();

        if hit(topic.group_name.as_str()) {
            score += GROUP_NAME_WEIGHT;
            details.push(format!("group name: {}", topic.group_name));
        }
        if hit(topic.topic_name.as_str()) {
            score += TOPIC_NAME_WEIGHT;
            details.push(format!("topic name: {}", topic.topic_name));
        }
        for summary in topic.summaries.iter().filter(|s| hit(s.as_str())) {
            score += SUMMARY_WEIGHT;
            details.push(format!("summary: {summary}"));
        }
        for related in topic.related_topics.iter().filter(|r| hit(r.as_str())) {
            score += RELATED_TOPIC_WEIGHT;
            details.push(format!("related topic: {related}"));
        }

        if score > 0 {
            matches.push(KeywordMatch {
                topic,
                score,
                match_details: details,
            });
        }
    }

    // sort_by is stable, so equal scores keep storage order
    matches.sort_by(|a, b| b.score.cmp(&a.score));
    Ok(matches)
}

/// Ask the analysis service to rank `candidates` for `query`.
///
/// Single mode propagates the service error. Batch mode (explicit
/// `batch_size`, or more than BATCH_THRESHOLD candidates) logs and skips
/// failing batches.
pub async fn ai_search(
    analyzer: &dyn TopicAnalyzer,
    query: &str,
    candidates: &[TopicCandidate],
    max_results: usize,
    batch_size: Option<usize>,
) -> Result<Vec<AiRecommendation>, TopicalError> {
    validate_query(query)?;
    if candidates.is_empty() || max_results == 0 {
        return Ok(Vec::new());
    }

    let batched = batch_size.is_some() || candidates.len() > BATCH_THRESHOLD;
    let mut recommendations = Vec::new();

    if batched {
        let size = batch_size.unwrap_or(DEFAULT_BATCH_SIZE).max(1);
        let batch_count = candidates.len().div_ceil(size);
        info!(
            candidates = candidates.len(),
            batches = batch_count,
            "Running AI search in batches"
        );
        for (i, batch) in candidates.chunks(size).enumerate() {
            match analyzer.rank_topics(query, batch, max_results).await {
                Ok(ranking) => recommendations.extend(resolve(
                    candidates,
                    &ranking.recommended_topics,
                    &ranking.reasoning,
                    ranking.confidence,
                    max_results,
                )),
                Err(e) => warn!(batch = i + 1, of = batch_count, error = %e, "AI search batch failed, skipping"),
            }
        }
    } else {
        let ranking = analyzer.rank_topics(query, candidates, max_results).await?;
        recommendations = resolve(
            candidates,
            &ranking.recommended_topics,
            &ranking.reasoning,
            ranking.confidence,
            max_results,
        );
    }

    Ok(limit_per_group(recommendations, max_results))
}

/// Map recommended ids back to candidates. Unknown ids are dropped.
fn resolve(
    candidates: &[TopicCandidate],
    ids: &[String],
    reasoning: &str,
    confidence: f64,
    max_results: usize,
) -> Vec<AiRecommendation> {
    ids.iter()
        // over-fetch so the per-group cap still leaves enough
        .take(max_results.saturating_mul(2))
        .filter_map(|id| candidates.iter().find(|c| &c.topic_id == id))
        .map(|topic| AiRecommendation {
            topic: topic.clone(),
            reasoning: reasoning.to_string(),
            confidence,
        })
        .collect()
}

/// Dedupe by topic, keep the best AI_PER_GROUP_CAP per group, then the
/// overall best `max_results` by confidence.
pub fn limit_per_group(
    recommendations: Vec<AiRecommendation>,
    max_results: usize,
) -> Vec<AiRecommendation> {
    let mut sorted = recommendations;
    sort_by_confidence(&mut sorted);

    let mut seen_topics = std::collections::HashSet::new();
    let mut per_group: HashMap<String, usize> = HashMap::new();
    let mut kept = Vec::new();
    for rec in sorted {
        if !seen_topics.insert(rec.topic.topic_id.clone()) {
            continue;
        }
        let count = per_group.entry(rec.topic.group_id.clone()).or_insert(0);
        if *count >= AI_PER_GROUP_CAP {
            continue;
        }
        *count += 1;
        kept.push(rec);
    }

    kept.truncate(max_results);
    kept
}

fn sort_by_confidence(recs: &mut [AiRecommendation]) {
    recs.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

/// Keyword search, plus AI ranking when requested. An AI failure in single
/// mode doesn't fail the search; it's reported in `ai_error`.
pub async fn search(
    analyzer: Option<&dyn TopicAnalyzer>,
    structure: &ChatStructure,
    request: &SearchQuery,
) -> Result<SearchResults, TopicalError> {
    let keyword_results = keyword_search(structure, &request.query, &request.filter)?;

    let mut ai_results = Vec::new();
    let mut ai_error = None;
    if request.use_ai {
        match analyzer {
            Some(analyzer) => {
                let pool = candidates(structure, &request.filter);
                match ai_search(
                    analyzer,
                    &request.query,
                    &pool,
                    request.max_results,
                    request.batch_size,
                )
                .await
                {
                    Ok(results) => ai_results = results,
                    Err(e) => {
                        warn!(error = %e, "AI search failed, returning keyword results only");
                        ai_error = Some(e.to_string());
                    }
                }
            }
            None => ai_error = Some("AI search needs a configured API key".to_string()),
        }
    }

    Ok(SearchResults {
        query: request.query.clone(),
        keyword_results,
        ai_results,
        ai_error,
    })
}
