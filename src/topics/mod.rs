// Topic queries over the stored chat structure: listing, search and the
// relationship graph. Pure functions over `ChatStructure`; the only I/O is
// the optional AI ranking call in `search`.

pub mod graph;
pub mod search;

use crate::analysis::ExistingTopic;
use crate::db::models::{ChatGroup, ChatStructure, Priority, Topic};

/// Topics, optionally limited to one group and one priority, High first.
/// Ties keep storage order.
pub fn by_priority<'a>(
    structure: &'a ChatStructure,
    group_id: Option<&str>,
    priority: Option<Priority>,
) -> Vec<(&'a ChatGroup, &'a Topic)> {
    let mut topics: Vec<(&ChatGroup, &Topic)> = structure
        .chat_groups
        .iter()
        .filter(|g| group_id.is_none_or(|id| g.group_id == id))
        .flat_map(|g| g.topics.iter().map(move |t| (g, t)))
        .filter(|(_, t)| priority.is_none_or(|p| t.priority == p))
        .collect();
    topics.sort_by_key(|(_, t)| std::cmp::Reverse(t.priority.rank()));
    topics
}

/// The stored topics of the group called `group_name`, as prompt context.
pub fn existing_topics(structure: &ChatStructure, group_name: &str) -> Vec<ExistingTopic> {
    structure
        .chat_groups
        .iter()
        .find(|g| g.group_name == group_name)
        .map(|g| g.topics.iter().map(ExistingTopic::from).collect())
        .unwrap_or_default()
}

/// First topic (in storage order) with exactly this name.
pub fn find_by_name<'a>(structure: &'a ChatStructure, name: &str) -> Option<&'a Topic> {
    structure
        .chat_groups
        .iter()
        .flat_map(|g| g.topics.iter())
        .find(|t| t.topic_name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topic(id: &str, name: &str, priority: Priority) -> Topic {
        Topic {
            topic_id: id.to_string(),
            group_id: format!("group_{}", &id[6..9]),
            topic_name: name.to_string(),
            priority,
            summaries: vec![format!("{name} first"), format!("{name} second")],
            related_records: vec![],
            related_topics: vec![],
            created_at: String::new(),
        }
    }

    fn structure() -> ChatStructure {
        ChatStructure {
            chat_groups: vec![
                ChatGroup {
                    group_id: "group_001".to_string(),
                    group_name: "team".to_string(),
                    description: String::new(),
                    created_at: String::new(),
                    topics: vec![
                        topic("topic_001_01", "lunch", Priority::Low),
                        topic("topic_001_02", "budget", Priority::High),
                        topic("topic_001_03", "hiring", Priority::Medium),
                    ],
                },
                ChatGroup {
                    group_id: "group_002".to_string(),
                    group_name: "ops".to_string(),
                    description: String::new(),
                    created_at: String::new(),
                    topics: vec![topic("topic_002_01", "outage", Priority::High)],
                },
            ],
        }
    }

    #[test]
    fn test_by_priority_orders_high_first_and_is_stable() {
        let s = structure();
        let ids: Vec<&str> = by_priority(&s, None, None)
            .iter()
            .map(|(_, t)| t.topic_id.as_str())
            .collect();
        assert_eq!(
            ids,
            vec!["topic_001_02", "topic_002_01", "topic_001_03", "topic_001_01"]
        );
    }

    #[test]
    fn test_by_priority_filters() {
        let s = structure();
        let high = by_priority(&s, None, Some(Priority::High));
        assert_eq!(high.len(), 2);
        let team_low = by_priority(&s, Some("group_001"), Some(Priority::Low));
        assert_eq!(team_low.len(), 1);
        assert_eq!(team_low[0].1.topic_name, "lunch");
    }

    #[test]
    fn test_existing_topics_uses_first_summary() {
        let s = structure();
        let existing = existing_topics(&s, "ops");
        assert_eq!(existing.len(), 1);
        assert_eq!(existing[0].first_summary.as_deref(), Some("outage first"));
        assert!(existing_topics(&s, "nobody").is_empty());
    }
}
