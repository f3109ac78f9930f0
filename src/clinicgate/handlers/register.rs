//! Account creation: superadmin registration and the first-run setup flow.

use axum::{
    extract::{rejection::JsonRejection, Extension},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::instrument;
use utoipa::ToSchema;

use super::{json_body, message_response, session::clearing_headers};
use crate::{
    auth::{RegistrationFlow, Role},
    clinicgate::state::AppState,
};

/// Unknown fields are ignored so the setup form can post extra inputs.
#[derive(ToSchema, Deserialize, Default)]
#[serde(default)]
pub struct RegisterRequest {
    username: Option<String>,
    password: Option<String>,
    role: Option<String>,
}

impl std::fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("username", &self.username)
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

impl RegisterRequest {
    fn username(&self) -> &str {
        self.username.as_deref().unwrap_or_default()
    }

    fn password(&self) -> &str {
        self.password.as_deref().unwrap_or_default()
    }

    fn role(&self) -> &str {
        self.role.as_deref().unwrap_or_default()
    }
}

#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = super::MessageBody),
        (status = 400, description = "Invalid, reserved or duplicate username, or invalid role", body = super::ErrorBody),
        (status = 401, description = "No valid session", body = super::ErrorBody),
        (status = 403, description = "Caller is not a superadmin", body = super::ErrorBody)
    ),
    tag = "users"
)]
#[instrument(skip(state, payload))]
pub async fn register(
    Extension(state): Extension<Arc<AppState>>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Response {
    let request = match json_body(payload) {
        Ok(request) => request,
        Err(response) => return response,
    };

    match state
        .authenticator()
        .register(
            request.username(),
            request.password(),
            request.role(),
            RegistrationFlow::Standard,
        )
        .await
    {
        Ok(_) => message_response(StatusCode::CREATED, "User registered successfully"),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/auth/setup",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created; a new superadmin replaces the bootstrap account", body = super::MessageBody),
        (status = 400, description = "Invalid, reserved or duplicate username, or invalid role", body = super::ErrorBody),
        (status = 401, description = "No valid session", body = super::ErrorBody),
        (status = 403, description = "Caller is not the bootstrap account", body = super::ErrorBody)
    ),
    tag = "users"
)]
#[instrument(skip(state, payload))]
pub async fn setup(
    Extension(state): Extension<Arc<AppState>>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Response {
    let request = match json_body(payload) {
        Ok(request) => request,
        Err(response) => return response,
    };

    if let Err(err) = state
        .authenticator()
        .register(
            request.username(),
            request.password(),
            request.role(),
            RegistrationFlow::Setup,
        )
        .await
    {
        return err.into_response();
    }

    let response = message_response(StatusCode::CREATED, "Setup completed successfully");

    // the bootstrap account is gone, so is the caller's session
    if Role::assignable(request.role()) == Some(Role::Superadmin) {
        (clearing_headers(state.config()), response).into_response()
    } else {
        response
    }
}
