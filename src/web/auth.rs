// Auth middleware: stateless HMAC-SHA256 session cookies for the optional
// dashboard password.
//
// Session token format: {timestamp_secs}.{nonce_hex}.{hmac_hex}
//
// The HMAC covers "{timestamp_secs}.{nonce_hex}" signed with the session
// secret. Tokens are valid for SESSION_TTL_SECS (24 hours).
//
// Login flow:
//   POST /api/login { password } → check TOPICAL_WEB_PASSWORD
//     success: set topical_session cookie with a new token
//     failure: 401

use std::time::{SystemTime, UNIX_EPOCH};

use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;

use super::AppState;

type HmacSha256 = Hmac<Sha256>;

pub const COOKIE_NAME: &str = "topical_session";

/// Session lifetime: 24 hours.
pub const SESSION_TTL_SECS: u64 = 86_400;

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// 32 random bytes, hex-encoded. Used when no session secret is configured.
pub fn random_secret() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Build a new session token signed with `secret`.
pub fn create_token(secret: &str) -> String {
    create_token_at(secret, now_secs())
}

fn create_token_at(secret: &str, timestamp: u64) -> String {
    let mut nonce_bytes = [0u8; 16];
    rand::rng().fill_bytes(&mut nonce_bytes);
    let nonce = hex::encode(nonce_bytes);

    let payload = format!("{timestamp}.{nonce}");
    let sig = hmac_sign(secret, &payload);
    format!("{payload}.{sig}")
}

/// True if the HMAC matches and the token is younger than SESSION_TTL_SECS.
pub fn verify_token(secret: &str, token: &str) -> bool {
    let mut parts = token.splitn(3, '.');
    let (Some(timestamp_str), Some(nonce), Some(provided_sig)) =
        (parts.next(), parts.next(), parts.next())
    else {
        return false;
    };

    let expected_sig = hmac_sign(secret, &format!("{timestamp_str}.{nonce}"));
    if !constant_time_eq(provided_sig, &expected_sig) {
        return false;
    }

    let Ok(timestamp) = timestamp_str.parse::<u64>() else {
        return false;
    };
    now_secs().saturating_sub(timestamp) < SESSION_TTL_SECS
}

/// Axum middleware: reject requests without a valid session cookie with 401.
pub async fn require_auth(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    if !has_valid_session(request.headers(), &state.session_secret) {
        return super::api_error(StatusCode::UNAUTHORIZED, "Authentication required");
    }

    next.run(request).await
}

/// `Set-Cookie` value for a new session.
pub fn set_cookie_header(token: &str) -> String {
    format!(
        "{COOKIE_NAME}={token}; HttpOnly; SameSite=Strict; Path=/; Max-Age={SESSION_TTL_SECS}"
    )
}

/// `Set-Cookie` value that clears the session cookie.
pub fn clear_cookie_header() -> String {
    format!("{COOKIE_NAME}=; HttpOnly; SameSite=Strict; Path=/; Max-Age=0")
}

/// Constant-time string comparison.
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes()
        .zip(b.bytes())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}

fn hmac_sign(secret: &str, payload: &str) -> String {
    // HMAC accepts keys of any length, so this can't fail
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return String::new();
    };
    mac.update(payload.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

fn has_valid_session(headers: &HeaderMap, secret: &str) -> bool {
    let Some(cookie_header) = headers.get(header::COOKIE).and_then(|v| v.to_str().ok()) else {
        return false;
    };

    cookie_header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| name.trim() == COOKIE_NAME)
        .is_some_and(|(_, value)| verify_token(secret, value.trim()))
}
