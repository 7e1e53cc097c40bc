// Web server: Axum-based session host for the analysis UI.
//
// The static UI (web/static) is embedded at compile time via include_dir!.
// All /api/* routes serve JSON; all other paths serve the UI's index.html.
//
// Auth is optional: when TOPICAL_WEB_PASSWORD is set, every /api/* route
// except login requires a stateless HMAC-SHA256 session cookie.

use std::sync::Arc;

use anyhow::Result;
use axum::body::Body;
use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use include_dir::{include_dir, Dir};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::error::TopicalError;
use crate::session::SessionHost;

pub mod auth;
pub mod handlers;

static ASSETS: Dir<'static> = include_dir!("$CARGO_MANIFEST_DIR/web/static");

/// Uploaded documents arrive base64-encoded inside JSON.
const ANALYZE_BODY_LIMIT: usize = 25 * 1024 * 1024;

/// Shared application state threaded through all Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub session: Arc<SessionHost>,
    /// HMAC key for session cookies. Only used when a password is set.
    pub session_secret: Arc<str>,
}

impl AppState {
    /// Wrap a session host. Without TOPICAL_SESSION_SECRET a random secret
    /// is generated, so logins don't survive a restart.
    pub fn new(session: Arc<SessionHost>) -> Self {
        let session_secret: Arc<str> = match &session.config().session_secret {
            Some(secret) => Arc::from(secret.as_str()),
            None => {
                if session.config().web_password.is_some() {
                    warn!("TOPICAL_SESSION_SECRET not set; sessions end when the server restarts");
                }
                Arc::from(auth::random_secret())
            }
        };
        Self {
            session,
            session_secret,
        }
    }

    fn password_required(&self) -> bool {
        self.session.config().web_password.is_some()
    }
}

/// Bind and serve until the process exits.
pub async fn run_server(session: Arc<SessionHost>, bind: &str, port: u16) -> Result<()> {
    let app = build_router(AppState::new(session));

    let addr = format!("{bind}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Topical session host listening on http://{addr}");

    axum::serve(listener, app).await?;
    Ok(())
}

pub fn build_router(state: AppState) -> Router {
    let mut api = Router::new()
        .route("/api/status", get(handlers::status::get_status))
        .route(
            "/api/analyze",
            post(handlers::analyze::submit).layer(DefaultBodyLimit::max(ANALYZE_BODY_LIMIT)),
        )
        .route(
            "/api/groups",
            get(handlers::groups::list_groups).delete(handlers::groups::delete_all_groups),
        )
        .route(
            "/api/groups/{id}",
            get(handlers::groups::get_group).delete(handlers::groups::delete_group),
        )
        .route("/api/groups/{id}/export", get(handlers::groups::export_group))
        .route("/api/topics", get(handlers::topics::list_topics))
        .route(
            "/api/topics/{id}",
            get(handlers::topics::get_topic).patch(handlers::topics::update_topic),
        )
        .route("/api/topics/{id}/related", post(handlers::topics::add_related))
        .route("/api/topics/{id}/report", post(handlers::topics::generate_report))
        .route("/api/search", get(handlers::search::search))
        .route("/api/graph", get(handlers::search::graph))
        .route("/api/logout", post(handlers::auth::logout));

    if state.password_required() {
        api = api.layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth::require_auth,
        ));
    }

    // Public routes (no auth)
    let public_api = Router::new()
        .route("/health", get(health))
        .route("/api/login", post(handlers::auth::login));

    Router::new()
        .merge(api)
        .merge(public_api)
        .fallback(serve_ui)
        .layer(
            CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods([
                    axum::http::Method::GET,
                    axum::http::Method::POST,
                    axum::http::Method::PATCH,
                    axum::http::Method::DELETE,
                    axum::http::Method::OPTIONS,
                ])
                .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    (
        StatusCode::OK,
        axum::Json(serde_json::json!({ "status": "ok" })),
    )
}

/// Serve the embedded UI for all non-API paths.
async fn serve_ui(uri: Uri) -> impl IntoResponse {
    let path = uri.path().trim_start_matches('/');

    if path.starts_with("api/") {
        return api_error(StatusCode::NOT_FOUND, "No such API route");
    }

    if let Some(file) = ASSETS.get_file(path) {
        return asset_response(file.contents(), path);
    }

    match ASSETS.get_file("index.html") {
        Some(index) => asset_response(index.contents(), "index.html"),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            [(header::CONTENT_TYPE, "text/plain")],
            Body::from("Web assets not found"),
        )
            .into_response(),
    }
}

fn asset_response(contents: &'static [u8], path: &str) -> Response {
    let mime = mime_type(path);
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, HeaderValue::from_static(mime))
        .body(Body::from(contents))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

fn mime_type(path: &str) -> &'static str {
    let ext = path.rsplit('.').next().unwrap_or("");
    match ext {
        "html" => "text/html; charset=utf-8",
        "js" | "mjs" => "application/javascript",
        "css" => "text/css",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "ico" => "image/x-icon",
        "json" => "application/json",
        "txt" => "text/plain",
        _ => "application/octet-stream",
    }
}

/// JSON error response helper.
pub fn api_error(status: StatusCode, message: &str) -> Response {
    (status, axum::Json(serde_json::json!({ "error": message }))).into_response()
}

/// HTTP status for each error class.
pub fn error_status(err: &TopicalError) -> StatusCode {
    match err {
        TopicalError::Configuration(_) | TopicalError::Storage(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
        TopicalError::Authentication(_) | TopicalError::Service(_) => StatusCode::BAD_GATEWAY,
        TopicalError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        TopicalError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        TopicalError::NotFound(_) => StatusCode::NOT_FOUND,
        TopicalError::Busy => StatusCode::CONFLICT,
    }
}

/// Request-level errors become `{"error", "kind"}` bodies; the server keeps running.
impl IntoResponse for TopicalError {
    fn into_response(self) -> Response {
        let status = error_status(&self);
        if status.is_server_error() {
            warn!(kind = self.kind(), error = %self, "Request failed");
        }
        (
            status,
            axum::Json(serde_json::json!({ "error": self.to_string(), "kind": self.kind() })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_mapping() {
        assert_eq!(error_status(&TopicalError::Busy), StatusCode::CONFLICT);
        assert_eq!(
            error_status(&TopicalError::Timeout { seconds: 60 }),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            error_status(&TopicalError::Authentication("401".into())),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            error_status(&TopicalError::Validation("empty".into())),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn test_mime_type() {
        assert_eq!(mime_type("index.html"), "text/html; charset=utf-8");
        assert_eq!(mime_type("app.js"), "application/javascript");
        assert_eq!(mime_type("blob"), "application/octet-stream");
    }
}
