// Auth handlers: POST /api/login and POST /api/logout.
//
// Login checks TOPICAL_WEB_PASSWORD from the request body and sets a signed
// session cookie. Logout clears it.

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;

use crate::web::auth::{clear_cookie_header, constant_time_eq, create_token, set_cookie_header};
use crate::web::{api_error, AppState};

#[derive(Deserialize)]
pub struct LoginRequest {
    password: String,
}

/// POST /api/login: 200 with a session cookie, or 401.
pub async fn login(State(state): State<AppState>, Json(body): Json<LoginRequest>) -> Response {
    let Some(expected) = state.session.config().web_password.as_deref() else {
        // No password configured: the dashboard is open, nothing to log into
        return (
            StatusCode::OK,
            Json(serde_json::json!({ "message": "No password required" })),
        )
            .into_response();
    };

    if expected.is_empty() || !constant_time_eq(expected, &body.password) {
        return api_error(StatusCode::UNAUTHORIZED, "Invalid password");
    }

    let cookie = set_cookie_header(&create_token(&state.session_secret));
    (
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(serde_json::json!({ "message": "Authenticated" })),
    )
        .into_response()
}

/// POST /api/logout: clear the session cookie.
pub async fn logout() -> Response {
    (
        StatusCode::OK,
        [(header::SET_COOKIE, clear_cookie_header())],
        Json(serde_json::json!({ "message": "Logged out" })),
    )
        .into_response()
}
