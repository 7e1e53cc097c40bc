// Chat group handlers.
//
// GET    /api/groups: all groups with topic counts
// DELETE /api/groups: delete every group
// GET    /api/groups/{id}: one group with its topics
// DELETE /api/groups/{id}: delete one group
// GET    /api/groups/{id}/export: { export_time, group_data }

use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;

use crate::db::models::ChatGroup;
use crate::error::TopicalError;
use crate::output::export::GroupExport;
use crate::web::AppState;

#[derive(Serialize)]
pub struct GroupSummary {
    pub group_id: String,
    pub group_name: String,
    pub description: String,
    pub created_at: String,
    pub topic_count: usize,
}

pub async fn list_groups(
    State(state): State<AppState>,
) -> Result<Json<Vec<GroupSummary>>, TopicalError> {
    let structure = state
        .session
        .db()
        .load_structure()
        .await
        .map_err(TopicalError::storage)?;

    let groups = structure
        .chat_groups
        .into_iter()
        .map(|g| GroupSummary {
            topic_count: g.topics.len(),
            group_id: g.group_id,
            group_name: g.group_name,
            description: g.description,
            created_at: g.created_at,
        })
        .collect();
    Ok(Json(groups))
}

async fn load_group(state: &AppState, group_id: &str) -> Result<ChatGroup, TopicalError> {
    state
        .session
        .db()
        .get_group(group_id)
        .await
        .map_err(TopicalError::storage)?
        .ok_or_else(|| TopicalError::NotFound(format!("group {group_id}")))
}

pub async fn get_group(
    State(state): State<AppState>,
    Path(group_id): Path<String>,
) -> Result<Json<ChatGroup>, TopicalError> {
    Ok(Json(load_group(&state, &group_id).await?))
}

pub async fn export_group(
    State(state): State<AppState>,
    Path(group_id): Path<String>,
) -> Result<Json<GroupExport>, TopicalError> {
    let group = load_group(&state, &group_id).await?;
    Ok(Json(GroupExport::new(group)))
}

pub async fn delete_group(
    State(state): State<AppState>,
    Path(group_id): Path<String>,
) -> Result<Json<serde_json::Value>, TopicalError> {
    let deleted = state
        .session
        .db()
        .delete_group(&group_id)
        .await
        .map_err(TopicalError::storage)?;
    if !deleted {
        return Err(TopicalError::NotFound(format!("group {group_id}")));
    }
    Ok(Json(serde_json::json!({ "deleted": group_id })))
}

pub async fn delete_all_groups(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, TopicalError> {
    let count = state
        .session
        .db()
        .delete_all()
        .await
        .map_err(TopicalError::storage)?;
    Ok(Json(serde_json::json!({ "deleted_groups": count })))
}
