// GET /api/search: keyword search with optional AI ranking.
// GET /api/graph: topic relation graph, optionally for one group.

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use crate::error::TopicalError;
use crate::topics::graph::TopicGraph;
use crate::topics::search::{SearchFilter, SearchQuery, SearchResults, DEFAULT_MAX_RESULTS};
use crate::web::AppState;

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: String,
    pub group: Option<String>,
    pub topic: Option<String>,
    #[serde(default)]
    pub ai: bool,
    pub max: Option<usize>,
    pub batch: Option<usize>,
}

impl From<SearchParams> for SearchQuery {
    fn from(params: SearchParams) -> Self {
        SearchQuery {
            query: params.q,
            filter: SearchFilter {
                group_name: params.group,
                topic_name: params.topic,
            },
            use_ai: params.ai,
            max_results: params.max.unwrap_or(DEFAULT_MAX_RESULTS),
            batch_size: params.batch,
        }
    }
}

pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResults>, TopicalError> {
    let results = state.session.search(&params.into()).await?;
    Ok(Json(results))
}

#[derive(Debug, Deserialize)]
pub struct GraphParams {
    pub group: Option<String>,
}

pub async fn graph(
    State(state): State<AppState>,
    Query(params): Query<GraphParams>,
) -> Result<Json<TopicGraph>, TopicalError> {
    let group = params.group.as_deref().filter(|g| !g.trim().is_empty());
    let graph = state.session.graph(group).await?;
    Ok(Json(graph))
}
