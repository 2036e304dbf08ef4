use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{ConnectInfo, MatchedPath, Path, Query, State},
    http::{Method, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod grpc;
pub mod limiter;
pub mod metrics;
pub mod providers;

use limiter::FixedWindowLimiter;
use metrics::DataMetrics;
use providers::Providers;

pub const SERVICE_NAME: &str = "tripify-data";

#[derive(Clone)]
pub struct DataState {
    pub providers: Arc<Providers>,
    pub limiter: Arc<FixedWindowLimiter>,
    pub metrics: Arc<DataMetrics>,
    pub version: String,
    pub started_at: Instant,
}

pub fn app(state: DataState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([axum::http::header::CONTENT_TYPE]);

    let api = Router::new()
        .route("/weather/{city}", get(get_weather))
        .route("/flights/search", get(search_flights))
        .route("/hotels/search", get(search_hotels))
        .route("/images/{destination}", get(get_images))
        .route("/exchange-rates", get(get_exchange_rates))
        .route("/destinations/{name}", get(get_destination_info))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ));

    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(export_metrics))
        .nest("/api", api)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            metrics_middleware,
        ))
        .with_state(state)
}

async fn metrics_middleware(
    State(state): State<DataState>,
    req: axum::extract::Request,
    next: axum::middleware::Next,
) -> impl IntoResponse {
    let method = req.method().to_string();
    let path = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());

    let start = Instant::now();
    let response = next.run(req).await;
    let status = response.status().as_u16().to_string();

    state
        .metrics
        .http_requests_total
        .with_label_values(&[&method, &path, &status])
        .inc();
    state
        .metrics
        .http_request_duration_seconds
        .with_label_values(&[&method, &path, &status])
        .observe(start.elapsed().as_secs_f64());

    response
}

async fn rate_limit_middleware(
    State(state): State<DataState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    req: axum::extract::Request,
    next: axum::middleware::Next,
) -> Result<axum::response::Response, impl IntoResponse> {
    if state.limiter.check(&addr.ip().to_string()).await {
        Ok(next.run(req).await)
    } else {
        Err((
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({
                "error": "Too many API requests from this IP, please try again later."
            })),
        ))
    }
}

async fn health(State(state): State<DataState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": SERVICE_NAME,
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": state.version,
        "uptime": state.started_at.elapsed().as_secs(),
    }))
}

async fn export_metrics(State(state): State<DataState>) -> ([(&'static str, &'static str); 1], String) {
    (
        [("content-type", "text/plain; version=0.0.4")],
        state.metrics.export(),
    )
}

fn internal_error(err: anyhow::Error) -> StatusCode {
    tracing::error!(error = %err, "data provider failed");
    StatusCode::INTERNAL_SERVER_ERROR
}

#[derive(Debug, Deserialize)]
struct WeatherParams {
    #[serde(default)]
    country: String,
}

async fn get_weather(
    State(state): State<DataState>,
    Path(city): Path<String>,
    Query(params): Query<WeatherParams>,
) -> Result<Json<Value>, StatusCode> {
    let weather = state
        .providers
        .weather(&city, &params.country)
        .await
        .map_err(internal_error)?;
    Ok(Json(json!(weather)))
}

#[derive(Debug, Deserialize)]
struct FlightParams {
    origin: String,
    destination: String,
    #[serde(default)]
    departure_date: String,
    #[serde(default)]
    return_date: String,
    #[serde(default = "one")]
    adults: u32,
}

fn one() -> u32 {
    1
}

async fn search_flights(
    State(state): State<DataState>,
    Query(params): Query<FlightParams>,
) -> Result<Json<Value>, StatusCode> {
    let flights = state
        .providers
        .flights(
            &params.origin,
            &params.destination,
            &params.departure_date,
            &params.return_date,
            params.adults,
        )
        .await
        .map_err(internal_error)?;
    Ok(Json(json!({ "flights": flights })))
}

#[derive(Debug, Deserialize)]
struct HotelParams {
    city: String,
    #[serde(default)]
    check_in: String,
    #[serde(default)]
    check_out: String,
    #[serde(default = "one")]
    guests: u32,
    #[serde(default = "one")]
    rooms: u32,
}

async fn search_hotels(
    State(state): State<DataState>,
    Query(params): Query<HotelParams>,
) -> Result<Json<Value>, StatusCode> {
    let hotels = state
        .providers
        .hotels(
            &params.city,
            &params.check_in,
            &params.check_out,
            params.guests,
            params.rooms,
        )
        .await
        .map_err(internal_error)?;
    Ok(Json(json!({ "hotels": hotels })))
}

#[derive(Debug, Deserialize)]
struct ImageParams {
    #[serde(default = "five")]
    count: u32,
}

fn five() -> u32 {
    5
}

async fn get_images(
    State(state): State<DataState>,
    Path(destination): Path<String>,
    Query(params): Query<ImageParams>,
) -> Result<Json<Value>, StatusCode> {
    let images = state
        .providers
        .images(&destination, params.count)
        .await
        .map_err(internal_error)?;
    Ok(Json(json!({ "destination": destination, "images": images })))
}

#[derive(Debug, Deserialize)]
struct ExchangeParams {
    #[serde(default = "usd")]
    base: String,
    /// Comma-separated currency codes.
    #[serde(default)]
    targets: String,
}

fn usd() -> String {
    "USD".to_string()
}

async fn get_exchange_rates(
    State(state): State<DataState>,
    Query(params): Query<ExchangeParams>,
) -> Result<Json<Value>, StatusCode> {
    let targets: Vec<String> = params
        .targets
        .split(',')
        .filter(|s| !s.is_empty())
        .map(|s| s.trim().to_uppercase())
        .collect();
    let rates = state
        .providers
        .exchange_rates(&params.base, &targets)
        .await
        .map_err(internal_error)?;
    Ok(Json(json!(rates)))
}

async fn get_destination_info(
    State(state): State<DataState>,
    Path(name): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    let info = state
        .providers
        .destination_info(&name)
        .await
        .map_err(internal_error)?;
    Ok(Json(json!(info)))
}
