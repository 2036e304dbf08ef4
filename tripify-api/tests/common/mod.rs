//! Test doubles: in-memory repositories behind the same traits the Postgres
//! implementations fill, plus a state/app builder wired to them. Redis and
//! the data-service channel point at closed ports; the rate limiter fails
//! open and nothing in these tests touches the data client.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tokio::sync::RwLock;
use tower::ServiceExt;
use uuid::Uuid;

use tripify_api::metrics::Metrics;
use tripify_api::state::{AppState, AuthConfig};
use tripify_core::repository::{Page, TripFilter, TripRepository, UserRepository};
use tripify_core::{StoreError, Trip, User};
use tripify_proto::v1::data_service_client::DataServiceClient;
use tripify_registry::RegistryClient;
use tripify_store::app_config::{ExternalApis, RateLimitConfig};
use tripify_store::{RedisClient, TieredCache};

#[derive(Default)]
pub struct InMemoryTripRepository {
    trips: RwLock<HashMap<Uuid, Trip>>,
}

fn matches_filter(trip: &Trip, filter: &TripFilter) -> bool {
    if let Some(status) = &filter.status {
        if trip.status != *status {
            return false;
        }
    }
    if let Some(destination) = &filter.destination {
        if !trip
            .destination
            .to_lowercase()
            .contains(&destination.to_lowercase())
        {
            return false;
        }
    }
    if let Some(search) = &filter.search {
        let needle = search.to_lowercase();
        let haystack = format!(
            "{} {} {}",
            trip.title,
            trip.description.as_deref().unwrap_or_default(),
            trip.destination
        )
        .to_lowercase();
        if !haystack.contains(&needle) {
            return false;
        }
    }
    true
}

fn paginate(mut trips: Vec<Trip>, filter: &TripFilter) -> Page<Trip> {
    trips.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    let total = trips.len() as i64;
    let items = trips
        .into_iter()
        .skip(filter.offset() as usize)
        .take(filter.limit.max(1) as usize)
        .collect();
    Page::new(items, filter.page, filter.limit, total)
}

#[async_trait]
impl TripRepository for InMemoryTripRepository {
    async fn create(&self, trip: &Trip) -> Result<(), StoreError> {
        self.trips.write().await.insert(trip.id, trip.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Trip>, StoreError> {
        Ok(self.trips.read().await.get(&id).cloned())
    }

    async fn update(&self, trip: &Trip) -> Result<(), StoreError> {
        let mut trips = self.trips.write().await;
        if !trips.contains_key(&trip.id) {
            return Err(StoreError::NotFound);
        }
        trips.insert(trip.id, trip.clone());
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        self.trips
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }

    async fn list_for_user(
        &self,
        user_id: Uuid,
        filter: &TripFilter,
    ) -> Result<Page<Trip>, StoreError> {
        let trips: Vec<Trip> = self
            .trips
            .read()
            .await
            .values()
            .filter(|t| {
                t.creator == user_id
                    || t.collaborator(user_id).map(|c| c.is_accepted()).unwrap_or(false)
            })
            .filter(|t| matches_filter(t, filter))
            .cloned()
            .collect();
        Ok(paginate(trips, filter))
    }

    async fn search_public(&self, filter: &TripFilter) -> Result<Page<Trip>, StoreError> {
        let trips: Vec<Trip> = self
            .trips
            .read()
            .await
            .values()
            .filter(|t| t.is_public && t.privacy == tripify_core::Privacy::Public)
            .filter(|t| matches_filter(t, filter))
            .cloned()
            .collect();
        Ok(paginate(trips, filter))
    }

    async fn count_for_user(
        &self,
        user_id: Uuid,
        since: Option<chrono::DateTime<chrono::Utc>>,
    ) -> Result<(i64, i64), StoreError> {
        let trips = self.trips.read().await;
        let mine: Vec<&Trip> = trips
            .values()
            .filter(|t| {
                t.creator == user_id
                    || t.collaborator(user_id).map(|c| c.is_accepted()).unwrap_or(false)
            })
            .filter(|t| since.map_or(true, |s| t.created_at >= s))
            .collect();
        let public = mine.iter().filter(|t| t.is_public).count() as i64;
        Ok((mine.len() as i64, public))
    }
}

#[derive(Default)]
pub struct InMemoryUserRepository {
    users: RwLock<HashMap<Uuid, User>>,
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn create(&self, user: &User) -> Result<(), StoreError> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Duplicate("email".to_string()));
        }
        users.insert(user.id, user.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let email = email.trim().to_lowercase();
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn find_by_reset_token(&self, token: &str) -> Result<Option<User>, StoreError> {
        let now = chrono::Utc::now();
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|u| {
                u.password_reset_token.as_deref() == Some(token)
                    && u.password_reset_expires.map_or(false, |exp| exp > now)
            })
            .cloned())
    }

    async fn update(&self, user: &User) -> Result<(), StoreError> {
        let mut users = self.users.write().await;
        if !users.contains_key(&user.id) {
            return Err(StoreError::NotFound);
        }
        users.insert(user.id, user.clone());
        Ok(())
    }

    async fn leaderboard(&self, limit: i64) -> Result<Vec<User>, StoreError> {
        let mut users: Vec<User> = self
            .users
            .read()
            .await
            .values()
            .filter(|u| u.is_active)
            .cloned()
            .collect();
        users.sort_by(|a, b| b.gamification.points.cmp(&a.gamification.points));
        users.truncate(limit as usize);
        Ok(users)
    }
}

pub async fn test_state() -> AppState {
    // Closed ports: the rate limiter fails open, nothing dials the channel.
    let redis = RedisClient::new("redis://127.0.0.1:1")
        .await
        .expect("redis url");
    let channel = tonic::transport::Endpoint::from_shared("http://127.0.0.1:1")
        .expect("endpoint")
        .connect_lazy();

    AppState {
        trip_repo: Arc::new(InMemoryTripRepository::default()),
        user_repo: Arc::new(InMemoryUserRepository::default()),
        redis: Arc::new(redis),
        cache: Arc::new(TieredCache::new(None)),
        metrics: Arc::new(Metrics::new().expect("metrics")),
        registry: Arc::new(RegistryClient::new("127.0.0.1", 1)),
        data_client: DataServiceClient::new(channel),
        http: reqwest::Client::new(),
        auth: AuthConfig {
            secret: "integration-test-secret".to_string(),
            expiration: 3600,
        },
        rate_limit: RateLimitConfig::default(),
        external: ExternalApis::default(),
        version: "1.0.0-test".to_string(),
        environment: "development".to_string(),
        started_at: Instant::now(),
    }
}

pub async fn test_app() -> Router {
    tripify_api::app(test_state().await)
}

/// Drives one request through the router and decodes the JSON body.
pub async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {}", token));
    }

    let mut request = match body {
        Some(body) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request"),
        None => builder.body(Body::empty()).expect("request"),
    };

    // The router normally gets this from into_make_service_with_connect_info.
    request
        .extensions_mut()
        .insert(axum::extract::ConnectInfo(SocketAddr::from((
            [127, 0, 0, 1],
            41234,
        ))));

    let response = app.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = response.into_body().collect().await.expect("body").to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}
