#![allow(clippy::needless_for_each)]

use crate::{
    auth::{AccountSummary, AuditLogEntry, Identity, Role, RouteClass, Status},
    clinicgate::handlers::{
        health, health::__path_health, login, login::__path_login, logs, logs::__path_list_logs,
        pages, register, register::__path_register, register::__path_setup, session,
        session::__path_logout, session::__path_session, users, users::__path_change_password,
        users::__path_delete_user, users::__path_list_users, users::__path_update_user,
    },
};
use anyhow::Result;
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{header::CONTENT_TYPE, HeaderName, HeaderValue, Method, Request},
    middleware as axum_middleware,
    response::Json,
    routing::{get, post},
    Extension, Router,
};
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{info, info_span, Span};
use ulid::Ulid;
use utoipa::OpenApi;

pub mod handlers;
pub mod middleware;
pub mod state;

pub use self::state::{AppState, AuthConfig};

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        login,
        session,
        logout,
        register,
        setup,
        list_users,
        delete_user,
        update_user,
        change_password,
        list_logs
    ),
    components(schemas(
        health::Health,
        login::LoginRequest,
        login::LoginResponse,
        register::RegisterRequest,
        users::DeleteUserRequest,
        users::UpdateUserRequest,
        users::ChangePasswordRequest,
        handlers::ErrorBody,
        handlers::MessageBody,
        AccountSummary,
        AuditLogEntry,
        Identity,
        Role,
        Status
    )),
    tags(
        (name = "clinicgate", description = "Clinic dashboard authentication and access control"),
        (name = "auth", description = "Login, session introspection and logout"),
        (name = "users", description = "Account administration"),
        (name = "logs", description = "Login audit trail")
    )
)]
struct ApiDoc;

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(openapi())
}

fn guarded(route: RouteClass, routes: Router) -> Router {
    routes.route_layer(axum_middleware::from_fn_with_state(
        route,
        middleware::require,
    ))
}

/// Build the application router.
#[must_use]
pub fn router(state: Arc<AppState>) -> Router {
    let public = Router::new()
        .route("/api/login", post(login::login))
        .route("/api/auth/logout", post(session::logout))
        .route("/api-docs/openapi.json", get(openapi_json));

    let session_api = Router::new()
        .route("/api/auth/session", get(session::session))
        .route("/api/users", post(users::change_password))
        .route("/api/logs", get(logs::list_logs));

    let superadmin_api = Router::new()
        .route("/api/auth/register", post(register::register))
        .route(
            "/api/users",
            get(users::list_users)
                .delete(users::delete_user)
                .patch(users::update_user),
        );

    let dashboard = Router::new()
        .route("/dashboard", get(pages::page))
        .route("/dashboard/logs", get(pages::page));

    let dashboard_admin = Router::new()
        .route("/dashboard/users", get(pages::page))
        .route("/dashboard/register", get(pages::page));

    let cors = CorsLayer::new()
        .allow_headers([CONTENT_TYPE])
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_origin(Any);

    Router::new()
        .merge(guarded(RouteClass::Public, public))
        .merge(guarded(RouteClass::Session, session_api))
        .merge(guarded(RouteClass::Superadmin, superadmin_api))
        .merge(guarded(RouteClass::Dashboard, dashboard))
        .merge(guarded(RouteClass::DashboardAdmin, dashboard_admin))
        .merge(guarded(
            RouteClass::SetupPage,
            Router::new().route("/setup", get(pages::page)),
        ))
        .merge(guarded(
            RouteClass::SetupApi,
            Router::new().route("/api/auth/setup", post(register::setup)),
        ))
        .layer(axum_middleware::from_fn(middleware::resolve_identity))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(cors)
                .layer(Extension(state)),
        )
        .route("/health", get(health::health).options(health::health))
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(port: u16, state: Arc<AppState>) -> Result<()> {
    let app = router(state);

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for ctrl-c: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!("Failed to listen for SIGTERM: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Gracefully shutdown");
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}
