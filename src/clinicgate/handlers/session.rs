//! Session cookie handling plus the introspection and logout endpoints.

use axum::{
    extract::Extension,
    http::{
        header::{InvalidHeaderValue, COOKIE, SET_COOKIE},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::{IntoResponse, Json, Response},
};
use std::sync::Arc;
use tracing::error;

use super::{error_response, message_response};
use crate::{
    auth::Identity,
    clinicgate::state::{AppState, AuthConfig},
};

pub const SESSION_COOKIE_NAME: &str = "session";

/// Build the `HttpOnly` session cookie.
pub(crate) fn session_cookie(
    config: &AuthConfig,
    token: &str,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let ttl_seconds = config.session_ttl_seconds();
    let mut cookie = format!(
        "{SESSION_COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={ttl_seconds}"
    );
    if config.session_cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

pub(crate) fn clear_session_cookie(config: &AuthConfig) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!("{SESSION_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if config.session_cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

/// Headers that clear the session cookie. Empty if the cookie cannot be built.
pub(crate) fn clearing_headers(config: &AuthConfig) -> HeaderMap {
    let mut headers = HeaderMap::new();
    match clear_session_cookie(config) {
        Ok(cookie) => {
            headers.insert(SET_COOKIE, cookie);
        }
        Err(err) => error!("Failed to build session cookie: {err}"),
    }
    headers
}

/// Session token from the `Cookie` header. An empty value counts as absent.
pub(crate) fn session_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .find_map(|pair| {
            let (key, value) = pair.trim().split_once('=')?;
            let value = value.trim();
            (key.trim() == SESSION_COOKIE_NAME && !value.is_empty()).then(|| value.to_string())
        })
}

#[utoipa::path(
    get,
    path = "/api/auth/session",
    responses(
        (status = 200, description = "Caller identity", body = Identity),
        (status = 401, description = "No valid session", body = super::ErrorBody)
    ),
    tag = "auth"
)]
pub async fn session(Extension(identity): Extension<Identity>) -> Json<Identity> {
    Json(identity)
}

#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses(
        (status = 200, description = "Session cookie cleared", body = super::MessageBody),
        (status = 401, description = "No session cookie was sent", body = super::ErrorBody)
    ),
    tag = "auth"
)]
pub async fn logout(headers: HeaderMap, Extension(state): Extension<Arc<AppState>>) -> Response {
    if session_token(&headers).is_none() {
        return error_response(StatusCode::UNAUTHORIZED, "Not logged in");
    }

    (
        clearing_headers(state.config()),
        message_response(StatusCode::OK, "Logged out successfully"),
    )
        .into_response()
}
