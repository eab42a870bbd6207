use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::http::{header, HeaderValue, Method, Request, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use hyper::Server;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use crate::config::Settings;
use crate::error::AppError;
use crate::handlers;
use crate::storage::Storage;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn Storage>,
    pub settings: Arc<Settings>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::MissingRequiredOverride(_) | AppError::Validation(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::UnknownReference(_) | AppError::Unprocessable(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("Request failed: {}", self);
            return (
                status,
                Json(serde_json::json!({ "detail": "Internal server error." })),
            )
                .into_response();
        }

        let mut response =
            (status, Json(serde_json::json!({ "detail": self.to_string() }))).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

/// One log line per request: method, path, status and latency
async fn access_log(request: Request<Body>, next: Next<Body>) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    let response = next.run(request).await;

    info!(
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "request"
    );
    response
}

/// Create the HTTP server with all routes
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any);

    Router::new()
        .route("/", get(handlers::index))
        .route("/health", get(handlers::health))
        // Authentication
        .route("/auth/token", post(handlers::login))
        .route("/auth/refresh", post(handlers::refresh_token))
        // Occupation catalog
        .route(
            "/occupations",
            get(handlers::list_occupations).post(handlers::create_occupation),
        )
        .route(
            "/occupations/:id",
            get(handlers::get_occupation)
                .put(handlers::update_occupation)
                .delete(handlers::delete_occupation),
        )
        // Specific-need catalog
        .route("/needs", get(handlers::list_needs).post(handlers::create_need))
        .route(
            "/needs/:id",
            get(handlers::get_need)
                .put(handlers::update_need)
                .delete(handlers::delete_need),
        )
        // Events
        .route("/events", get(handlers::list_events).post(handlers::create_event))
        .route("/events/mine", get(handlers::my_events))
        .route("/events/registrations", get(handlers::my_registrations))
        .route("/events/:public_id", get(handlers::get_event))
        .route("/events/:public_id/registered", get(handlers::registration_status))
        .route("/events/:public_id/register", post(handlers::join_event))
        // Participants
        .route("/participants/:event_public_id", post(handlers::register_participant))
        .route(
            "/participants/me",
            get(handlers::me)
                .put(handlers::update_me)
                .delete(handlers::delete_me),
        )
        // Participants (admin)
        .route(
            "/admin/participants",
            get(handlers::admin_list_participants).post(handlers::admin_create_participant),
        )
        .route(
            "/admin/participants/:id",
            get(handlers::admin_get_participant).delete(handlers::admin_delete_participant),
        )
        // Administrators
        .route("/admin/me", get(handlers::admin_me))
        .route(
            "/admin/administrators",
            get(handlers::list_administrators).post(handlers::create_administrator),
        )
        .layer(middleware::from_fn(access_log))
        .layer(Extension(state))
        .layer(ServiceBuilder::new().layer(cors))
}

/// Start the HTTP server on the specified port
pub async fn start_server(
    state: AppState,
    port: u16,
) -> Result<(), Box<dyn std::error::Error>> {
    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    println!("🚀 HTTP server running on http://localhost:{port}");
    println!("💚 Health check: http://localhost:{port}/health");

    Server::bind(&addr).serve(app.into_make_service()).await?;

    Ok(())
}
