use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use std::sync::Arc;

use crate::{
    auth::{AuditLogEntry, Identity},
    clinicgate::state::AppState,
};

#[utoipa::path(
    get,
    path = "/api/logs",
    responses(
        (status = 200, description = "Login history, newest first; superadmins see every account", body = [AuditLogEntry]),
        (status = 401, description = "No valid session", body = super::ErrorBody)
    ),
    tag = "logs"
)]
pub async fn list_logs(
    Extension(state): Extension<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
) -> Response {
    match state.audit().list_for(&identity).await {
        Ok(entries) => (StatusCode::OK, Json(entries)).into_response(),
        Err(err) => err.into_response(),
    }
}
