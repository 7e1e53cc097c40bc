// GET /api/status: configuration summary, live analysis status and counts.
//
// The API key itself is never included, only whether one is configured.

use axum::extract::State;
use axum::Json;

use crate::error::TopicalError;
use crate::web::AppState;

pub async fn get_status(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, TopicalError> {
    let session = &state.session;
    let config = session.config();
    let status = session.status().await;

    let structure = session
        .db()
        .load_structure()
        .await
        .map_err(TopicalError::storage)?;
    let recent_runs = session
        .db()
        .recent_runs(10)
        .await
        .map_err(TopicalError::storage)?;

    Ok(Json(serde_json::json!({
        "model": session.analyzer().model_name(),
        "base_url": config.base_url,
        "api_key_configured": config.api_key.is_some(),
        "timeout_secs": config.request_timeout.as_secs(),
        "password_required": config.web_password.is_some(),
        "analysis": status,
        "counts": {
            "groups": structure.chat_groups.len(),
            "topics": structure.topic_count(),
        },
        "recent_runs": recent_runs,
    })))
}
