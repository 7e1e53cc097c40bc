// Data models: the chat structure that flows through the application.
//
// These are separate from the database queries so the analysis client, the
// web handlers and the terminal output can use them without depending on
// rusqlite directly.

use serde::{Deserialize, Serialize};

/// How urgent or heated a topic is, as judged by the analysis service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    /// Parse a priority label. Accepts the Chinese labels the service is
    /// prompted with (高/中/低) as well as English words in any case.
    /// Anything else is treated as Medium.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "高" | "high" | "h" => Priority::High,
            "低" | "low" | "l" => Priority::Low,
            _ => Priority::Medium,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }

    /// Sort key: High first.
    pub fn rank(&self) -> u8 {
        match self {
            Priority::High => 3,
            Priority::Medium => 2,
            Priority::Low => 1,
        }
    }
}

impl From<String> for Priority {
    fn from(label: String) -> Self {
        Priority::from_label(&label)
    }
}

impl From<Priority> for String {
    fn from(priority: Priority) -> Self {
        priority.as_str().to_string()
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One analysed topic inside a chat group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    /// `topic_NNN_MM`: group number, then position within the group
    pub topic_id: String,
    /// Filled from the parent group when missing from an import file
    #[serde(default)]
    pub group_id: String,
    pub topic_name: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub summaries: Vec<String>,
    /// Chat records the service attributed to this topic
    #[serde(default)]
    pub related_records: Vec<String>,
    /// Names of other topics this one relates to
    #[serde(default)]
    pub related_topics: Vec<String>,
    #[serde(default)]
    pub created_at: String,
}

/// A topic as returned by the analysis service, before it has an id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicDraft {
    pub topic_name: String,
    pub priority: Priority,
    #[serde(default)]
    pub summaries: Vec<String>,
    #[serde(default)]
    pub related_records: Vec<String>,
    #[serde(default)]
    pub related_topics: Vec<String>,
}

/// A chat group (one uploaded conversation) and its topics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatGroup {
    /// `group_NNN`
    pub group_id: String,
    pub group_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub topics: Vec<Topic>,
}

/// The whole stored structure, in the same shape as the JSON export.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatStructure {
    #[serde(default)]
    pub chat_groups: Vec<ChatGroup>,
}

impl ChatStructure {
    /// Find a topic and the group it belongs to.
    pub fn find_topic(&self, topic_id: &str) -> Option<(&ChatGroup, &Topic)> {
        self.chat_groups.iter().find_map(|group| {
            group
                .topics
                .iter()
                .find(|t| t.topic_id == topic_id)
                .map(|t| (group, t))
        })
    }

    pub fn topic_count(&self) -> usize {
        self.chat_groups.iter().map(|g| g.topics.len()).sum()
    }
}

/// One row of analysis history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRun {
    pub id: i64,
    pub group_name: String,
    pub group_id: Option<String>,
    pub record_count: u32,
    pub topic_count: u32,
    /// "ok" or the error kind
    pub outcome: String,
    pub error: Option<String>,
    pub created_at: String,
}

/// Numeric part of a `group_NNN` id.
pub fn group_number(group_id: &str) -> Option<u32> {
    group_id.strip_prefix("group_")?.parse().ok()
}

pub fn format_group_id(number: u32) -> String {
    format!("group_{number:03}")
}

/// `topic_NNN_MM` for the given group and 1-based position.
pub fn format_topic_id(group_id: &str, position: u32) -> String {
    let group_part = group_id.strip_prefix("group_").unwrap_or(group_id);
    format!("topic_{group_part}_{position:02}")
}
