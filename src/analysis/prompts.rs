// Prompt text for the chat-completions service.
//
// Kept separate from the HTTP client so the formatting can be unit-tested
// without a server. Records and existing topics are numbered from 1.

use super::traits::{AnalysisRequest, ExistingTopic, ReportContext, ReportKind, TopicCandidate};

/// Only the first records are listed verbatim; the rest are counted.
pub const MAX_LISTED_RECORDS: usize = 50;

pub const ANALYSIS_SYSTEM: &str =
    "You are a professional chat-log analyst who identifies and summarises discussion topics.";

pub const REPORT_SYSTEM: &str = "You are an expert report writer. You turn topic notes into \
     clearly structured, detailed plain-text reports.";

pub const SEARCH_SYSTEM: &str = "You are a search assistant who understands the semantic links \
     between chat summaries. Recommend at most 3 topics per chat group.";

/// Numbered record list, truncated after MAX_LISTED_RECORDS.
pub fn format_records(records: &[String]) -> String {
    let mut lines: Vec<String> = records
        .iter()
        .take(MAX_LISTED_RECORDS)
        .enumerate()
        .map(|(i, r)| format!("{}. {r}", i + 1))
        .collect();
    if records.len() > MAX_LISTED_RECORDS {
        lines.push(format!("... {} records in total", records.len()));
    }
    lines.join("\n")
}

pub fn format_existing_topics(topics: &[ExistingTopic]) -> String {
    if topics.is_empty() {
        return "No existing topics".to_string();
    }
    let mut lines = Vec::new();
    for (i, topic) in topics.iter().enumerate() {
        lines.push(format!(
            "{}. {} (priority: {})",
            i + 1,
            topic.topic_name,
            topic.priority
        ));
        if let Some(summary) = &topic.first_summary {
            lines.push(format!("   Summary: {summary}"));
        }
        if !topic.related_topics.is_empty() {
            let related: Vec<&str> = topic
                .related_topics
                .iter()
                .take(3)
                .map(String::as_str)
                .collect();
            lines.push(format!("   Related topics: {}", related.join(", ")));
        }
    }
    lines.join("\n")
}

pub fn analysis_prompt(request: &AnalysisRequest) -> String {
    format!(
        r#"Analyse the chat records below and identify the distinct topics being discussed.

Group: {group}
Group description: {description}

Existing topics in this group:
{existing}

Chat records to analyse:
{records}

For each topic provide:
- topic_name: short and clear (10 words at most)
- priority: high, medium or low, judged by how active and important the discussion is
- summaries: 3-5 short sentences
- related_records: the chat records (time, speaker and message) that belong to the topic, copied from the list above
- related_topics: names of related topics, existing or new

Reply with strict JSON only, in this shape:
{{
  "topics": [
    {{
      "topic_name": "name",
      "priority": "high",
      "summaries": ["summary 1", "summary 2"],
      "related_records": ["record 1", "record 2"],
      "related_topics": ["related topic"]
    }}
  ]
}}"#,
        group = request.group_name,
        description = if request.description.is_empty() {
            "none"
        } else {
            request.description.as_str()
        },
        existing = format_existing_topics(&request.existing_topics),
        records = format_records(&request.records),
    )
}

fn report_instruction(kind: ReportKind) -> &'static str {
    match kind {
        ReportKind::Summary => {
            "a concise summary report covering the main discussion points and conclusions"
        }
        ReportKind::Detailed => {
            "a detailed report covering background, discussion, key participants, mood, \
             key viewpoints, conclusions and recommendations"
        }
        ReportKind::Analysis => {
            "an in-depth analysis covering trends, contrasting viewpoints, potential problems \
             and suggestions for next steps"
        }
    }
}

pub fn report_prompt(context: &ReportContext, kind: ReportKind) -> String {
    let records: Vec<&str> = context
        .related_records
        .iter()
        .take(3)
        .map(String::as_str)
        .collect();
    format!(
        r#"Write {instruction} for the topic below.

Chat group:
- Name: {group}
- Description: {description}

Topic:
- Name: {topic}
- Priority: {priority}
- Summary: {summaries}
- Related records:
{records}
- Related topics: {related}

Requirements: clear structure, professional but plain language, grounded in the
information above. Use plain text only, no Markdown markers such as ** or ##."#,
        instruction = report_instruction(kind),
        group = context.group_name,
        description = if context.group_description.is_empty() {
            "none"
        } else {
            context.group_description.as_str()
        },
        topic = context.topic_name,
        priority = context.priority,
        summaries = context.summaries.join("；"),
        records = records.join("\n"),
        related = context.related_topics.join(", "),
    )
}

/// One block per candidate, separated by `---`.
pub fn format_candidates(candidates: &[TopicCandidate]) -> String {
    candidates
        .iter()
        .map(|c| {
            let mut block = format!(
                "Topic: {} (ID: {})\nGroup: {}\nPriority: {}\nSummary: {}",
                c.topic_name,
                c.topic_id,
                c.group_name,
                c.priority,
                c.summaries.join("; ")
            );
            if !c.related_topics.is_empty() {
                block.push_str(&format!("\nRelated topics: {}", c.related_topics.join(", ")));
            }
            block.push_str("\n---");
            block
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn search_prompt(query: &str, candidates: &[TopicCandidate], max_results: usize) -> String {
    format!(
        r#"Find the chat topics that are semantically related to the user's query, even when
no keyword matches exactly. Consider topical relevance, related concepts, similar
situations and what the user is probably looking for.

User query: "{query}"

Available topics:
{topics}

Recommend at most 3 topics per chat group.

Reply with JSON only, with these fields:
- recommended_topics: list of topic IDs (at most {max_results})
- reasoning: a short explanation
- confidence: overall confidence between 0 and 1"#,
        topics = format_candidates(candidates),
    )
}
