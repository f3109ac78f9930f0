//! Account administration endpoints.
//!
//! Flow Overview:
//! 1) The identity middleware resolves the caller from the session cookie.
//! 2) The route gate admits superadmins to list/delete/patch and any session
//!    to the password change.
//! 3) The handler delegates to [`crate::auth::Accounts`].

use axum::{
    extract::{rejection::JsonRejection, Extension},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::instrument;
use utoipa::ToSchema;

use super::{json_body, message_response};
use crate::{
    auth::{AccountSummary, AccountUpdate, Identity},
    clinicgate::state::AppState,
};

#[derive(Debug, Deserialize, Default, ToSchema)]
#[serde(default)]
pub struct DeleteUserRequest {
    username: Option<String>,
}

#[derive(Deserialize, Default, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct UpdateUserRequest {
    username: Option<String>,
    new_username: Option<String>,
    new_password: Option<String>,
    role: Option<String>,
    status: Option<String>,
}

impl std::fmt::Debug for UpdateUserRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateUserRequest")
            .field("username", &self.username)
            .field("new_username", &self.new_username)
            .field("role", &self.role)
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize, Default, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    username: Option<String>,
    old_password: Option<String>,
    new_password: Option<String>,
}

impl std::fmt::Debug for ChangePasswordRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangePasswordRequest")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

#[utoipa::path(
    get,
    path = "/api/users",
    responses(
        (status = 200, description = "All accounts ordered by username", body = [AccountSummary]),
        (status = 401, description = "No valid session", body = super::ErrorBody),
        (status = 403, description = "Caller is not a superadmin", body = super::ErrorBody)
    ),
    tag = "users"
)]
pub async fn list_users(Extension(state): Extension<Arc<AppState>>) -> Response {
    match state.accounts().list().await {
        Ok(list) => (StatusCode::OK, Json(list)).into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    delete,
    path = "/api/users",
    request_body = DeleteUserRequest,
    responses(
        (status = 204, description = "Account deleted"),
        (status = 400, description = "Username missing", body = super::ErrorBody),
        (status = 401, description = "No valid session", body = super::ErrorBody),
        (status = 403, description = "Caller is not a superadmin", body = super::ErrorBody),
        (status = 404, description = "Account not found", body = super::ErrorBody)
    ),
    tag = "users"
)]
#[instrument(skip(state, payload))]
pub async fn delete_user(
    Extension(state): Extension<Arc<AppState>>,
    payload: Result<Json<DeleteUserRequest>, JsonRejection>,
) -> Response {
    let request = match json_body(payload) {
        Ok(request) => request,
        Err(response) => return response,
    };

    match state
        .accounts()
        .delete(request.username.as_deref().unwrap_or_default())
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    patch,
    path = "/api/users",
    request_body = UpdateUserRequest,
    responses(
        (status = 204, description = "Account updated"),
        (status = 400, description = "Invalid role, status or username, or nothing to change", body = super::ErrorBody),
        (status = 401, description = "No valid session", body = super::ErrorBody),
        (status = 403, description = "Caller is not a superadmin", body = super::ErrorBody),
        (status = 404, description = "Account not found", body = super::ErrorBody)
    ),
    tag = "users"
)]
#[instrument(skip(state, payload))]
pub async fn update_user(
    Extension(state): Extension<Arc<AppState>>,
    payload: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> Response {
    let request = match json_body(payload) {
        Ok(request) => request,
        Err(response) => return response,
    };

    let update = AccountUpdate {
        new_username: request.new_username,
        new_password: request.new_password,
        role: request.role,
        status: request.status,
    };

    match state
        .accounts()
        .update(request.username.as_deref().unwrap_or_default(), &update)
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/users",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = super::MessageBody),
        (status = 400, description = "Missing fields or wrong old password", body = super::ErrorBody),
        (status = 401, description = "No valid session", body = super::ErrorBody),
        (status = 403, description = "Changing someone else's password without being a superadmin", body = super::ErrorBody),
        (status = 404, description = "Account not found", body = super::ErrorBody)
    ),
    tag = "users"
)]
#[instrument(skip(state, identity, payload), fields(actor = %identity.username))]
pub async fn change_password(
    Extension(state): Extension<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    payload: Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> Response {
    let request = match json_body(payload) {
        Ok(request) => request,
        Err(response) => return response,
    };

    match state
        .accounts()
        .change_password(
            &identity,
            request.username.as_deref().unwrap_or_default(),
            request.old_password.as_deref().unwrap_or_default(),
            request.new_password.as_deref().unwrap_or_default(),
        )
        .await
    {
        Ok(()) => message_response(StatusCode::OK, "Password changed successfully"),
        Err(err) => err.into_response(),
    }
}
