use axum::{
    extract::{rejection::JsonRejection, ConnectInfo, Extension},
    http::{
        header::{SET_COOKIE, USER_AGENT},
        HeaderMap, StatusCode,
    },
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, sync::Arc};
use tracing::{error, instrument};
use utoipa::ToSchema;

use super::{error_response, json_body, session::session_cookie};
use crate::{auth::ClientContext, clinicgate::state::AppState};

#[derive(ToSchema, Deserialize, Default)]
#[serde(default)]
pub struct LoginRequest {
    username: Option<String>,
    password: Option<String>,
}

// keep the password out of logs
impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

#[derive(ToSchema, Serialize, Debug)]
pub struct LoginResponse {
    success: bool,
}

#[utoipa::path(
    post,
    path = "/api/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in, session cookie set", body = LoginResponse),
        (status = 400, description = "Missing or malformed credentials", body = super::ErrorBody),
        (status = 401, description = "Invalid username or password", body = super::ErrorBody),
        (status = 403, description = "Account disabled", body = super::ErrorBody)
    ),
    tag = "auth"
)]
#[instrument(skip(state, headers, payload))]
pub async fn login(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Extension(state): Extension<Arc<AppState>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Response {
    let request = match json_body(payload) {
        Ok(request) => request,
        Err(response) => return response,
    };

    let client = ClientContext {
        ip: addr.ip().to_string(),
        user_agent: headers
            .get(USER_AGENT)
            .and_then(|value| value.to_str().ok())
            .map(ToString::to_string),
    };

    let token = match state
        .authenticator()
        .login(
            request.username.as_deref().unwrap_or_default(),
            request.password.as_deref().unwrap_or_default(),
            &client,
        )
        .await
    {
        Ok(token) => token,
        Err(err) => return err.into_response(),
    };

    match session_cookie(state.config(), token.as_str()) {
        Ok(cookie) => (
            StatusCode::OK,
            [(SET_COOKIE, cookie)],
            Json(LoginResponse { success: true }),
        )
            .into_response(),
        Err(err) => {
            error!("Failed to build session cookie: {err}");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
    }
}
