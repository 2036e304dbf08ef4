//! REST proxy in front of the data service's gRPC surface. The gateway owns
//! authentication; the data service is only reachable through here (or by
//! discovery, see `discovery.rs`).

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tonic::Code;

use tripify_proto::v1::{
    DestinationInfoRequest, ExchangeRatesRequest, FlightsRequest, HotelsRequest, ImagesRequest,
    WeatherRequest,
};

use crate::error::ApiError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/data/weather", get(weather))
        .route("/data/flights", get(flights))
        .route("/data/hotels", get(hotels))
        .route("/data/images/{destination}", get(images))
        .route("/data/exchange-rates", get(exchange_rates))
        .route("/data/destinations/{name}", get(destination_info))
}

fn map_status(err: tonic::Status) -> ApiError {
    match err.code() {
        Code::Unavailable => {
            ApiError::ServiceUnavailable("Data service is unavailable".to_string())
        }
        Code::NotFound => ApiError::NotFound(err.message().to_string()),
        Code::InvalidArgument => ApiError::Validation(err.message().to_string()),
        _ => ApiError::Internal(format!("data service call failed: {}", err)),
    }
}

#[derive(Debug, Deserialize)]
pub struct WeatherQuery {
    #[serde(default = "default_city")]
    pub city: String,
    #[serde(default = "default_country")]
    pub country: String,
}

fn default_city() -> String {
    "Paris".to_string()
}
fn default_country() -> String {
    "FR".to_string()
}

async fn weather(
    State(state): State<AppState>,
    Query(q): Query<WeatherQuery>,
) -> Result<Json<Value>, ApiError> {
    let mut client = state.data_client.clone();
    let resp = client
        .get_weather(WeatherRequest {
            city: q.city,
            country_code: q.country,
        })
        .await
        .map_err(map_status)?;

    Ok(Json(json!({ "success": true, "data": resp.into_inner() })))
}

#[derive(Debug, Deserialize)]
pub struct FlightsQuery {
    pub origin: String,
    pub destination: String,
    #[serde(default)]
    pub departure_date: String,
    #[serde(default)]
    pub return_date: String,
    #[serde(default = "default_adults")]
    pub adults: u32,
}

fn default_adults() -> u32 {
    1
}

async fn flights(
    State(state): State<AppState>,
    Query(q): Query<FlightsQuery>,
) -> Result<Json<Value>, ApiError> {
    let mut client = state.data_client.clone();
    let resp = client
        .get_flights(FlightsRequest {
            origin: q.origin,
            destination: q.destination,
            departure_date: q.departure_date,
            return_date: q.return_date,
            adults: q.adults,
        })
        .await
        .map_err(map_status)?;

    Ok(Json(json!({ "success": true, "data": resp.into_inner() })))
}

#[derive(Debug, Deserialize)]
pub struct HotelsQuery {
    pub city: String,
    #[serde(default)]
    pub check_in: String,
    #[serde(default)]
    pub check_out: String,
    #[serde(default = "default_adults")]
    pub guests: u32,
    #[serde(default = "default_adults")]
    pub rooms: u32,
}

async fn hotels(
    State(state): State<AppState>,
    Query(q): Query<HotelsQuery>,
) -> Result<Json<Value>, ApiError> {
    let mut client = state.data_client.clone();
    let resp = client
        .get_hotels(HotelsRequest {
            city: q.city,
            check_in: q.check_in,
            check_out: q.check_out,
            guests: q.guests,
            rooms: q.rooms,
        })
        .await
        .map_err(map_status)?;

    Ok(Json(json!({ "success": true, "data": resp.into_inner() })))
}

#[derive(Debug, Deserialize)]
pub struct ImagesQuery {
    #[serde(default = "default_count")]
    pub count: u32,
}

fn default_count() -> u32 {
    5
}

async fn images(
    State(state): State<AppState>,
    Path(destination): Path<String>,
    Query(q): Query<ImagesQuery>,
) -> Result<Json<Value>, ApiError> {
    let mut client = state.data_client.clone();
    let resp = client
        .get_destination_images(ImagesRequest {
            destination,
            count: q.count,
        })
        .await
        .map_err(map_status)?;

    Ok(Json(json!({ "success": true, "data": resp.into_inner() })))
}

#[derive(Debug, Deserialize)]
pub struct ExchangeQuery {
    #[serde(default = "default_base")]
    pub base: String,
    /// Comma-separated target currency codes.
    #[serde(default)]
    pub targets: String,
}

fn default_base() -> String {
    "USD".to_string()
}

async fn exchange_rates(
    State(state): State<AppState>,
    Query(q): Query<ExchangeQuery>,
) -> Result<Json<Value>, ApiError> {
    let targets: Vec<String> = q
        .targets
        .split(',')
        .filter(|s| !s.is_empty())
        .map(|s| s.trim().to_uppercase())
        .collect();

    let mut client = state.data_client.clone();
    let resp = client
        .get_exchange_rates(ExchangeRatesRequest {
            base_currency: q.base,
            target_currencies: targets,
        })
        .await
        .map_err(map_status)?;

    Ok(Json(json!({ "success": true, "data": resp.into_inner() })))
}

async fn destination_info(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let mut client = state.data_client.clone();
    let resp = client
        .get_destination_info(DestinationInfoRequest { destination: name })
        .await
        .map_err(map_status)?;

    Ok(Json(json!({ "success": true, "data": resp.into_inner() })))
}
