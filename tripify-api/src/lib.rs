use axum::{
    extract::State,
    http::Method,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::net::SocketAddr;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod data;
pub mod discovery;
pub mod error;
pub mod grpc;
pub mod metrics;
pub mod middleware;
pub mod recommendations;
pub mod state;
pub mod trips;
pub mod users;

pub use state::AppState;

pub const SERVICE_NAME: &str = "tripify-api";

pub fn app(state: AppState) -> Router {
    // CORS Middleware
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
            axum::http::header::USER_AGENT,
        ]);

    let api = Router::new()
        .merge(users::routes(state.clone()))
        .merge(trips::routes(state.clone()))
        .merge(recommendations::routes(state.clone()))
        .merge(data::routes())
        .merge(discovery::routes());

    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(export_metrics))
        .nest("/api/v1", api)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        // metrics sit outermost so rate-limited requests count too
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::metrics::metrics_middleware,
        ))
        .with_state(state)
}

/// Fixed window per client IP, backed by Redis. Fails open when the counter
/// store is unreachable.
async fn rate_limit_middleware(
    State(state): State<AppState>,
    axum::extract::ConnectInfo(addr): axum::extract::ConnectInfo<SocketAddr>,
    req: axum::extract::Request,
    next: axum::middleware::Next,
) -> Result<axum::response::Response, impl IntoResponse> {
    let key = format!("ratelimit:{}", addr.ip());

    match state
        .redis
        .check_rate_limit(
            &key,
            state.rate_limit.max_requests,
            state.rate_limit.window_seconds,
        )
        .await
    {
        Ok(true) => Ok(next.run(req).await),
        Ok(false) => Err(crate::error::ApiError::RateLimited),
        Err(_) => Ok(next.run(req).await), // Fail open
    }
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "success": true,
        "message": "Tripify API is running!",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "environment": state.environment,
        "version": state.version,
        "uptime": state.started_at.elapsed().as_secs(),
    }))
}

async fn export_metrics(State(state): State<AppState>) -> ([(&'static str, &'static str); 1], String) {
    (
        [("content-type", "text/plain; version=0.0.4")],
        state.metrics.export(),
    )
}
