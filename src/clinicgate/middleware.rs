//! Request identity and per-route gating.
//!
//! Flow Overview:
//! 1) [`resolve_identity`] runs for every request, reads the session cookie
//!    and stores the resolved [`CurrentIdentity`] in the request extensions.
//! 2) [`require`] is attached to each protected route group with its
//!    [`RouteClass`] and applies [`decide`]. Allowed requests get the
//!    [`Identity`] itself as an extension for the handlers.

use axum::{
    extract::{Extension, Request, State},
    http::{header::LOCATION, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::debug;

use super::{
    handlers::{error_response, session},
    state::AppState,
};
use crate::auth::{decide, Identity, Outcome, RouteClass};

/// Identity resolved from the session cookie, `None` for anonymous callers.
#[derive(Clone, Debug, Default)]
pub struct CurrentIdentity(pub Option<Identity>);

pub async fn resolve_identity(
    Extension(state): Extension<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let identity = match session::session_token(request.headers()) {
        Some(token) => match state.sessions().resolve(&token).await {
            Ok(identity) => identity,
            Err(err) => return err.into_response(),
        },
        None => None,
    };

    request.extensions_mut().insert(CurrentIdentity(identity));

    next.run(request).await
}

pub async fn require(
    State(route): State<RouteClass>,
    Extension(state): Extension<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let identity = request
        .extensions()
        .get::<CurrentIdentity>()
        .and_then(|current| current.0.clone());

    match decide(identity.as_ref(), route) {
        Outcome::Allow => {
            if let Some(identity) = identity {
                request.extensions_mut().insert(identity);
            }
            next.run(request).await
        }
        Outcome::Redirect {
            location,
            clear_session,
        } => {
            debug!(?route, location, "Redirecting");
            let mut headers = if clear_session {
                session::clearing_headers(state.config())
            } else {
                axum::http::HeaderMap::new()
            };
            headers.insert(LOCATION, HeaderValue::from_static(location));
            (StatusCode::FOUND, headers).into_response()
        }
        Outcome::Unauthorized => error_response(StatusCode::UNAUTHORIZED, "Unauthorized"),
        Outcome::Forbidden => {
            debug!(?route, "Forbidden");
            error_response(StatusCode::FORBIDDEN, "Forbidden")
        }
    }
}
