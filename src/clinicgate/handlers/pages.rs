use axum::{extract::Extension, response::Json};

use crate::auth::Identity;

/// Page data for the dashboard shell: who is looking at it.
pub async fn page(Extension(identity): Extension<Identity>) -> Json<Identity> {
    Json(identity)
}
