//! Registry-backed discovery endpoints: list what the registry knows and
//! reach a discovered instance directly, instead of using the configured
//! data-service address.

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::state::AppState;

const DATA_SERVICE_HTTP: &str = "tripify-data-http";

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/discovery/services", get(list_services))
        .route("/discovery/data-service", get(data_service))
        .route("/discovery/weather/{city}", get(weather_via_discovery))
}

async fn list_services(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let services = state
        .registry
        .services()
        .await
        .map_err(|e| ApiError::Internal(format!("Service discovery failed: {}", e)))?;

    Ok(Json(json!({
        "success": true,
        "message": "Retrieved all services from registry",
        "count": services.len(),
        "services": services,
    })))
}

async fn data_service(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let instances = state
        .registry
        .discover(DATA_SERVICE_HTTP)
        .await
        .map_err(|e| ApiError::Internal(format!("Service discovery failed: {}", e)))?;

    let Some(instance) = instances.first() else {
        return Err(ApiError::NotFound(
            "Data service not found in registry".to_string(),
        ));
    };

    let discovery = json!({
        "service_name": instance.name,
        "address": instance.address(),
        "port": instance.port,
        "tags": instance.tags,
        "service_url": instance.base_url(),
    });

    // Prove the discovered instance is actually reachable.
    let health: Value = match state
        .http
        .get(format!("{}/health", instance.base_url()))
        .send()
        .await
    {
        Ok(resp) => resp.json().await.unwrap_or_else(|_| json!(null)),
        Err(err) => {
            return Err(ApiError::ServiceUnavailable(format!(
                "Service discovered but not reachable: {}",
                err
            )));
        }
    };

    Ok(Json(json!({
        "success": true,
        "message": "Successfully discovered and contacted data service via registry",
        "discovery": discovery,
        "health_check": health,
    })))
}

async fn weather_via_discovery(
    State(state): State<AppState>,
    Path(city): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let instances = state
        .registry
        .discover(DATA_SERVICE_HTTP)
        .await
        .map_err(|e| ApiError::Internal(format!("Service discovery failed: {}", e)))?;

    let Some(instance) = instances.first() else {
        return Err(ApiError::NotFound(
            "Data service not found in registry".to_string(),
        ));
    };

    let weather: Value = state
        .http
        .get(format!("{}/api/weather/{}", instance.base_url(), city))
        .send()
        .await
        .map_err(|e| {
            ApiError::ServiceUnavailable(format!("Failed to communicate with data service: {}", e))
        })?
        .json()
        .await
        .map_err(|e| ApiError::Internal(format!("Invalid response from data service: {}", e)))?;

    Ok(Json(json!({
        "success": true,
        "message": format!("Weather data retrieved via service discovery for {}", city),
        "data": weather,
        "service_info": {
            "discovered_from": "registry",
            "service_name": instance.name,
            "service_address": format!("{}:{}", instance.address(), instance.port),
        },
    })))
}
