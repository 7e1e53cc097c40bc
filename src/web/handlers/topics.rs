// Topic handlers.
//
// GET   /api/topics?group=&priority=: topics sorted high priority first
// GET   /api/topics/{id}: topic detail with its group
// PATCH /api/topics/{id}: { summary } replaces the first summary
// POST  /api/topics/{id}/related: { related_topic } adds a link
// POST  /api/topics/{id}/report: { kind?, export? } generates a report

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::analysis::ReportKind;
use crate::db::models::{Priority, Topic};
use crate::error::TopicalError;
use crate::session::ReportOutcome;
use crate::topics;
use crate::web::AppState;

#[derive(Debug, Deserialize)]
pub struct TopicsQuery {
    pub group: Option<String>,
    pub priority: Option<String>,
}

#[derive(Serialize)]
pub struct TopicEntry {
    pub group_name: String,
    #[serde(flatten)]
    pub topic: Topic,
}

pub async fn list_topics(
    State(state): State<AppState>,
    Query(params): Query<TopicsQuery>,
) -> Result<Json<Vec<TopicEntry>>, TopicalError> {
    let structure = state
        .session
        .db()
        .load_structure()
        .await
        .map_err(TopicalError::storage)?;

    let priority = params
        .priority
        .as_deref()
        .filter(|p| !p.trim().is_empty())
        .map(Priority::from_label);
    let group = params.group.as_deref().filter(|g| !g.trim().is_empty());

    let entries = topics::by_priority(&structure, group, priority)
        .into_iter()
        .map(|(g, t)| TopicEntry {
            group_name: g.group_name.clone(),
            topic: t.clone(),
        })
        .collect();
    Ok(Json(entries))
}

pub async fn get_topic(
    State(state): State<AppState>,
    Path(topic_id): Path<String>,
) -> Result<Json<TopicEntry>, TopicalError> {
    let structure = state
        .session
        .db()
        .load_structure()
        .await
        .map_err(TopicalError::storage)?;
    let (group, topic) = structure
        .find_topic(&topic_id)
        .ok_or_else(|| TopicalError::NotFound(format!("topic {topic_id}")))?;

    Ok(Json(TopicEntry {
        group_name: group.group_name.clone(),
        topic: topic.clone(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct UpdateTopicRequest {
    pub summary: String,
}

pub async fn update_topic(
    State(state): State<AppState>,
    Path(topic_id): Path<String>,
    Json(body): Json<UpdateTopicRequest>,
) -> Result<Json<Topic>, TopicalError> {
    let topic = state.session.update_summary(&topic_id, &body.summary).await?;
    Ok(Json(topic))
}

#[derive(Debug, Deserialize)]
pub struct RelatedRequest {
    pub related_topic: String,
}

pub async fn add_related(
    State(state): State<AppState>,
    Path(topic_id): Path<String>,
    Json(body): Json<RelatedRequest>,
) -> Result<Json<Topic>, TopicalError> {
    let topic = state
        .session
        .link_topics(&topic_id, &body.related_topic)
        .await?;
    Ok(Json(topic))
}

#[derive(Debug, Default, Deserialize)]
pub struct ReportRequest {
    pub kind: Option<String>,
    #[serde(default)]
    pub export: bool,
}

pub async fn generate_report(
    State(state): State<AppState>,
    Path(topic_id): Path<String>,
    Json(body): Json<ReportRequest>,
) -> Result<Json<ReportOutcome>, TopicalError> {
    let kind = match body.kind.as_deref() {
        Some(k) => k.parse::<ReportKind>()?,
        None => ReportKind::default(),
    };
    let outcome = state.session.report(&topic_id, kind, body.export).await?;
    Ok(Json(outcome))
}
