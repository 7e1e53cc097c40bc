// Topic relationship graph.
//
// Topics name their related topics by name, not id. An edge exists when a
// name resolves (exact match, first topic with that name) to a different
// topic. Edges are undirected: a→b and b→a collapse into one.

use std::collections::{BTreeSet, HashMap};

use serde::Serialize;

use crate::db::models::{ChatStructure, Priority, Topic};
use crate::error::TopicalError;

use super::find_by_name;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphNode {
    pub id: String,
    pub name: String,
    pub priority: Priority,
    pub group_id: String,
    pub group_name: String,
    pub degree: usize,
}

/// `source < target` lexically.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TopicGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

impl TopicGraph {
    /// Build the graph, optionally limited to one group's topics. Names are
    /// always resolved against the whole structure.
    pub fn build(structure: &ChatStructure, group_id: Option<&str>) -> Self {
        let mut name_to_id: HashMap<&str, &str> = HashMap::new();
        for topic in structure.chat_groups.iter().flat_map(|g| g.topics.iter()) {
            name_to_id
                .entry(topic.topic_name.as_str())
                .or_insert(topic.topic_id.as_str());
        }

        let included: Vec<(&str, &str, &Topic)> = structure
            .chat_groups
            .iter()
            .filter(|g| group_id.is_none_or(|id| g.group_id == id))
            .flat_map(|g| {
                g.topics
                    .iter()
                    .map(move |t| (g.group_id.as_str(), g.group_name.as_str(), t))
            })
            .collect();
        let included_ids: BTreeSet<&str> =
            included.iter().map(|(_, _, t)| t.topic_id.as_str()).collect();

        let mut edges: BTreeSet<GraphEdge> = BTreeSet::new();
        for (_, _, topic) in &included {
            for related in &topic.related_topics {
                let Some(&other) = name_to_id.get(related.as_str()) else {
                    continue;
                };
                if other == topic.topic_id || !included_ids.contains(other) {
                    continue;
                }
                let (source, target) = if topic.topic_id.as_str() < other {
                    (topic.topic_id.as_str(), other)
                } else {
                    (other, topic.topic_id.as_str())
                };
                edges.insert(GraphEdge {
                    source: source.to_string(),
                    target: target.to_string(),
                });
            }
        }

        let mut degree: HashMap<&str, usize> = HashMap::new();
        for edge in &edges {
            *degree.entry(edge.source.as_str()).or_default() += 1;
            *degree.entry(edge.target.as_str()).or_default() += 1;
        }

        let nodes = included
            .iter()
            .map(|(gid, gname, t)| GraphNode {
                id: t.topic_id.clone(),
                name: t.topic_name.clone(),
                priority: t.priority,
                group_id: gid.to_string(),
                group_name: gname.to_string(),
                degree: degree.get(t.topic_id.as_str()).copied().unwrap_or(0),
            })
            .collect();

        TopicGraph {
            nodes,
            edges: edges.into_iter().collect(),
        }
    }

    /// Ids connected to `topic_id`.
    pub fn neighbors(&self, topic_id: &str) -> Vec<&str> {
        self.edges
            .iter()
            .filter_map(|e| {
                if e.source == topic_id {
                    Some(e.target.as_str())
                } else if e.target == topic_id {
                    Some(e.source.as_str())
                } else {
                    None
                }
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LinkOutcome {
    /// The new related-topics list to store.
    Added(Vec<String>),
    AlreadyLinked,
}

/// Work out the new related-topics list for linking `topic_id` to the topic
/// called `related_name`.
pub fn link_related(
    structure: &ChatStructure,
    topic_id: &str,
    related_name: &str,
) -> Result<LinkOutcome, TopicalError> {
    let (_, topic) = structure
        .find_topic(topic_id)
        .ok_or_else(|| TopicalError::NotFound(format!("topic {topic_id}")))?;
    let related = find_by_name(structure, related_name)
        .ok_or_else(|| TopicalError::NotFound(format!("topic named '{related_name}'")))?;

    if related.topic_id == topic.topic_id {
        return Err(TopicalError::Validation(
            "a topic can't be related to itself".to_string(),
        ));
    }
    if topic.related_topics.iter().any(|r| r == related_name) {
        return Ok(LinkOutcome::AlreadyLinked);
    }

    let mut updated = topic.related_topics.clone();
    updated.push(related_name.to_string());
    Ok(LinkOutcome::Added(updated))
}
