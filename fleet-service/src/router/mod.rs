pub mod handlers;
pub mod notify;
pub mod routes;

use std::path::Path;

use axum::{
    body::Body,
    extract::{DefaultBodyLimit, Request, State},
    http::{Method, StatusCode},
    middleware::{from_fn, from_fn_with_state},
    response::{IntoResponse, Response},
    routing::{get, MethodRouter},
    Json, Router,
};
use serde_json::json;
use service_core::error::{codes, ErrorBody};
use service_core::middleware::{metrics_middleware, panic_layer, request_id_middleware};
use tower::ServiceExt;
use tower_http::{
    compression::CompressionLayer,
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};

pub use notify::{select_notification, DispatchContext, Notification, NotificationRouter};
pub use routes::{route_table, API_PREFIX};

use crate::middleware::{auth_middleware, request_context_middleware, RouterConfig};
use crate::services::metrics::get_metrics;
use crate::AppState;

/// One registered API route and its authorization rules.
pub struct RouteDescriptor {
    pub method: Method,
    /// Path template, e.g. `/v1.0/projects/:id`.
    pub path: String,
    /// Empty accepts any tenant.
    pub tenant_ids: Vec<String>,
    /// Empty falls back to the default roles.
    pub roles: Vec<String>,
    /// Public routes skip authentication.
    pub public: bool,
    pub handler: MethodRouter<AppState>,
}

/// Authorization table for every non-public route.
pub fn route_config(routes: &[RouteDescriptor], default_roles: Vec<String>) -> RouterConfig {
    routes
        .iter()
        .filter(|route| !route.public)
        .fold(RouterConfig::new(default_roles), |config, route| {
            config.with_route(
                route.method.clone(),
                route.path.clone(),
                route.tenant_ids.clone(),
                route.roles.clone(),
            )
        })
}

async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.repository.documents().ping().await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "service": "fleet-service",
                "version": env!("CARGO_PKG_VERSION")
            })),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "unhealthy",
                "service": "fleet-service",
                "error": e.to_string()
            })),
        ),
    }
}

async fn readiness_check() -> StatusCode {
    StatusCode::OK
}

async fn metrics_endpoint() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        get_metrics(),
    )
}

fn not_found() -> Response {
    let body = ErrorBody {
        status_code: StatusCode::NOT_FOUND.as_u16(),
        error_code: codes::UNCLASSIFIED,
        message: "not found".to_string(),
    };
    (StatusCode::NOT_FOUND, Json(body)).into_response()
}

/// API paths get the JSON 404; anything else is served from the content
/// directory with `index.html` as the single-page-app fallback.
async fn fallback(State(state): State<AppState>, req: Request) -> Response {
    let content_dir = match &state.config.web.content_dir {
        Some(dir) if !req.uri().path().starts_with(API_PREFIX) => dir.clone(),
        _ => return not_found(),
    };
    let index = Path::new(&content_dir).join("index.html");
    let serve = ServeDir::new(&content_dir).fallback(ServeFile::new(index));
    match serve.oneshot(req).await {
        Ok(response) => response.map(Body::new),
        Err(infallible) => match infallible {},
    }
}

pub fn build_router(state: AppState) -> Router {
    let mut api: Router<AppState> = Router::new();
    for route in route_table() {
        let handler = if route.public {
            route.handler
        } else {
            route
                .handler
                .route_layer(from_fn_with_state(state.clone(), auth_middleware))
        };
        api = api.route(&route.path, handler);
    }
    let api = api
        .layer(CompressionLayer::new())
        .layer(from_fn_with_state(state.clone(), request_context_middleware));

    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/metrics", get(metrics_endpoint))
        .merge(api)
        .fallback(fallback)
        .with_state(state)
        .layer(from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
            let request_id = request
                .headers()
                .get("x-request-id")
                .and_then(|value| value.to_str().ok())
                .unwrap_or("-");

            tracing::info_span!(
                "http_request",
                request_id = %request_id,
                method = %request.method(),
                uri = %request.uri(),
                version = ?request.version(),
            )
        }))
        .layer(from_fn(request_id_middleware))
        .layer(panic_layer())
        .layer(DefaultBodyLimit::disable())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_roles_feed_the_route_config() {
        let routes = route_table();
        let config = route_config(&routes, vec!["admin".into()]);
        assert!(config
            .validate(&Method::POST, "/v1.0/projects", "t1", "admin")
            .is_ok());
        assert!(config
            .validate(&Method::POST, "/v1.0/projects", "t1", "none")
            .is_err());
    }
}
