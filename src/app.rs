//! Request pipeline assembly.
//!
//! Outermost first:
//!
//! ```text
//! catch panic → request id → trace → cors? → rate limit → authenticate
//!     → router → permission gate (per route) → handler
//! ```

use axum::{
    body::Body,
    handler::Handler,
    http::{HeaderValue, Method, Request},
    middleware,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowOrigin, CorsLayer},
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::AppConfig;
use crate::database::models::permission::{ITEMS_READ, ITEMS_WRITE};
use crate::database::Models;
use crate::error::ApiError;
use crate::handlers::{healthcheck, items, tokens, users};
use crate::lifecycle::BackgroundTasks;
use crate::middleware::permission::{require_permission, PermissionGate};
use crate::middleware::rate_limit::{rate_limit, RateLimiter};
use crate::middleware::recover::panic_response;
use crate::middleware::request_id::{request_id_of, MakeRequestUuid};
use crate::middleware::authenticate;
use crate::services::Mailer;

/// Shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub models: Models,
    pub mailer: Arc<dyn Mailer>,
    pub background: BackgroundTasks,
}

pub fn build_app(state: AppState, limiter: Arc<RateLimiter>) -> Router {
    let models = state.models.clone();
    let gate = |code: &'static str| {
        middleware::from_fn_with_state(PermissionGate::new(models.clone(), code), require_permission)
    };

    let router = Router::new()
        .route("/v1/healthcheck", get(healthcheck::show))
        .route(
            "/v1/coltech_items",
            get(items::list.layer(gate(ITEMS_READ))).post(items::create.layer(gate(ITEMS_WRITE))),
        )
        .route(
            "/v1/coltech_items/:id",
            get(items::show.layer(gate(ITEMS_READ)))
                .patch(items::update.layer(gate(ITEMS_WRITE)))
                .delete(items::delete.layer(gate(ITEMS_WRITE))),
        )
        .route("/v1/users", post(users::register))
        .route("/v1/users/activated", put(users::activate))
        .route("/v1/tokens/authentication", post(tokens::create_authentication))
        .fallback(not_found)
        .method_not_allowed_fallback(method_not_allowed)
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(state.models.clone(), authenticate))
        .layer(middleware::from_fn_with_state(limiter, rate_limit));

    let router = match cors_layer(&state.config.cors.trusted_origins) {
        Some(cors) => router.layer(cors),
        None => router,
    };

    router
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
            tracing::info_span!(
                "request",
                method = %request.method(),
                uri = %request.uri(),
                request_id = %request_id_of(request),
            )
        }))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(CatchPanicLayer::custom(panic_response))
}

async fn not_found() -> ApiError {
    ApiError::ResourceNotFound
}

async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

/// `None` when no origin is trusted; cross-origin requests then get no CORS headers at all
fn cors_layer(trusted_origins: &[String]) -> Option<CorsLayer> {
    let origins: Vec<HeaderValue> = trusted_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "ignoring trusted origin that is not a valid header value");
                None
            }
        })
        .collect();

    if origins.is_empty() {
        return None;
    }

    Some(
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE, Method::OPTIONS])
            .allow_headers([
                axum::http::header::AUTHORIZATION,
                axum::http::header::CONTENT_TYPE,
                axum::http::HeaderName::from_static(items::EXPECTED_VERSION_HEADER),
            ]),
    )
}
