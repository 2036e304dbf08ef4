//! gRPC surface of the gateway: TripService, UserService and the ApiGateway
//! routing/health service. Handlers mirror the REST semantics; errors map
//! onto standard status codes (invalid argument, not found, permission
//! denied, already exists, unauthenticated, internal).

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tonic::{Request, Response, Status};
use uuid::Uuid;

use tripify_core::repository::TripFilter;
use tripify_core::user::validate_registration;
use tripify_core::{
    Budget, Collaborator, CollaboratorRole, Preferences, Privacy, StoreError, Trip, User,
};
use tripify_proto::v1 as pb;
use tripify_proto::v1::api_gateway_server::ApiGateway;
use tripify_proto::v1::trip_service_server::TripService;
use tripify_proto::v1::user_service_server::UserService;

use crate::middleware::auth::issue_token;
use crate::state::AppState;

const TRIP_CACHE_TTL: Duration = Duration::from_secs(3600);
const USER_CACHE_TTL: Duration = Duration::from_secs(3600);

pub struct TripGrpc {
    pub state: AppState,
}

pub struct UserGrpc {
    pub state: AppState,
}

pub struct GatewayGrpc {
    pub state: AppState,
}

// ============================================================================
// Shared mapping helpers
// ============================================================================

fn parse_uuid(value: &str, field: &str) -> Result<Uuid, Status> {
    Uuid::parse_str(value).map_err(|_| Status::invalid_argument(format!("Invalid {}", field)))
}

fn parse_date(value: &str, field: &str) -> Result<DateTime<Utc>, Status> {
    DateTime::parse_from_rfc3339(value)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|_| Status::invalid_argument(format!("Invalid {}", field)))
}

fn store_status(err: StoreError) -> Status {
    match err {
        StoreError::NotFound => Status::not_found("Not found"),
        StoreError::Duplicate(what) => Status::already_exists(format!("{} already exists", what)),
        StoreError::Database(msg) => {
            tracing::error!("store error: {}", msg);
            Status::internal("store error")
        }
    }
}

fn cache_status(err: anyhow::Error) -> Status {
    if matches!(err.downcast_ref::<StoreError>(), Some(StoreError::NotFound)) {
        return Status::not_found("Trip not found");
    }
    tracing::error!("cache/store error: {:#}", err);
    Status::internal("store error")
}

fn trip_to_proto(trip: &Trip) -> pb::Trip {
    pb::Trip {
        id: trip.id.to_string(),
        title: trip.title.clone(),
        description: trip.description.clone().unwrap_or_default(),
        destination: trip.destination.clone(),
        start_date: trip.start_date.to_rfc3339(),
        end_date: trip.end_date.to_rfc3339(),
        budget: Some(pb::Money {
            amount: trip.budget.estimated.unwrap_or_default(),
            currency: trip.budget.currency.clone(),
        }),
        is_public: trip.is_public,
        collaborators: trip.collaborators.iter().map(|c| c.user_id.to_string()).collect(),
        created_at: trip.created_at.to_rfc3339(),
        updated_at: trip.updated_at.to_rfc3339(),
        status: serde_json::to_value(trip.status)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default(),
    }
}

fn user_to_proto(user: &User) -> pb::UserInfo {
    pb::UserInfo {
        id: user.id.to_string(),
        email: user.email.clone(),
        first_name: user.first_name.clone(),
        last_name: user.last_name.clone(),
        preferences: serde_json::to_string(&user.preferences).unwrap_or_default(),
        created_at: user.created_at.to_rfc3339(),
        updated_at: user.updated_at.to_rfc3339(),
    }
}

impl AppState {
    fn record_rpc<T>(&self, service: &str, method: &str, start: Instant, result: &Result<T, Status>) {
        let status = match result {
            Ok(_) => "ok",
            Err(s) => s.code().description(),
        };
        self.metrics
            .record_grpc(service, method, status, start.elapsed().as_secs_f64());
    }

    async fn cache_trip(&self, trip: &Trip) {
        let key = format!("trip:{}", trip.id);
        if let Ok(value) = serde_json::to_value(trip) {
            if let Err(err) = self.cache.put(&key, value, TRIP_CACHE_TTL).await {
                tracing::warn!(error = %err, "failed to cache trip");
            }
        }
    }
}

// ============================================================================
// TripService
// ============================================================================

#[tonic::async_trait]
impl TripService for TripGrpc {
    async fn create_trip(
        &self,
        request: Request<pb::CreateTripRequest>,
    ) -> Result<Response<pb::TripResponse>, Status> {
        let start = Instant::now();
        let req = request.into_inner();

        let result = async {
            let creator = parse_uuid(&req.user_id, "user ID")?;
            let mut trip = Trip::new(
                req.title,
                req.destination,
                parse_date(&req.start_date, "start date")?,
                parse_date(&req.end_date, "end date")?,
                creator,
            );
            if !req.description.is_empty() {
                trip.description = Some(req.description);
            }
            if let Some(budget) = req.budget {
                trip.budget = Budget {
                    estimated: Some(budget.amount),
                    spent: 0.0,
                    currency: budget.currency,
                };
            }
            if req.is_public {
                trip.is_public = true;
                trip.privacy = Privacy::Public;
            }

            trip.validate()
                .map_err(|e| Status::invalid_argument(e.to_string()))?;

            self.state.trip_repo.create(&trip).await.map_err(store_status)?;
            self.state.cache_trip(&trip).await;

            Ok(Response::new(pb::TripResponse {
                trip: Some(trip_to_proto(&trip)),
            }))
        }
        .await;

        self.state.record_rpc("TripService", "CreateTrip", start, &result);
        result
    }

    async fn get_trip(
        &self,
        request: Request<pb::GetTripRequest>,
    ) -> Result<Response<pb::TripResponse>, Status> {
        let start = Instant::now();
        let req = request.into_inner();

        let result = async {
            let trip_id = parse_uuid(&req.trip_id, "trip ID")?;
            let caller = Uuid::parse_str(&req.user_id).ok();

            let key = format!("trip:{}", trip_id);
            let repo = self.state.trip_repo.clone();
            let value = self
                .state
                .cache
                .get_or_compute(&key, TRIP_CACHE_TTL, || async move {
                    let trip = repo
                        .get(trip_id)
                        .await
                        .map_err(anyhow::Error::from)?
                        .ok_or_else(|| anyhow::Error::from(StoreError::NotFound))?;
                    Ok(serde_json::to_value(trip)?)
                })
                .await
                .map_err(cache_status)?;

            let trip: Trip = serde_json::from_value(value)
                .map_err(|e| Status::internal(format!("corrupt cache entry: {}", e)))?;

            if !trip.can_view(caller) {
                return Err(Status::permission_denied("Access denied"));
            }

            Ok(Response::new(pb::TripResponse {
                trip: Some(trip_to_proto(&trip)),
            }))
        }
        .await;

        self.state.record_rpc("TripService", "GetTrip", start, &result);
        result
    }

    async fn update_trip(
        &self,
        request: Request<pb::UpdateTripRequest>,
    ) -> Result<Response<pb::TripResponse>, Status> {
        let start = Instant::now();
        let req = request.into_inner();

        let result = async {
            let trip_id = parse_uuid(&req.trip_id, "trip ID")?;
            let caller = parse_uuid(&req.user_id, "user ID")?;

            let mut trip = self
                .state
                .trip_repo
                .get(trip_id)
                .await
                .map_err(store_status)?
                .ok_or_else(|| Status::not_found("Trip not found"))?;

            if !trip.can_edit(caller) {
                return Err(Status::permission_denied("Access denied"));
            }

            if !req.title.is_empty() {
                trip.title = req.title;
            }
            if !req.description.is_empty() {
                trip.description = Some(req.description);
            }
            if !req.destination.is_empty() {
                trip.destination = req.destination;
            }
            if !req.start_date.is_empty() {
                trip.start_date = parse_date(&req.start_date, "start date")?;
            }
            if !req.end_date.is_empty() {
                trip.end_date = parse_date(&req.end_date, "end date")?;
            }
            if let Some(budget) = req.budget {
                trip.budget.estimated = Some(budget.amount);
                trip.budget.currency = budget.currency;
            }
            if let Some(is_public) = req.is_public {
                trip.is_public = is_public;
                trip.privacy = if is_public { Privacy::Public } else { Privacy::Private };
            }

            trip.validate()
                .map_err(|e| Status::invalid_argument(e.to_string()))?;

            self.state.trip_repo.update(&trip).await.map_err(store_status)?;
            self.state.cache_trip(&trip).await;

            Ok(Response::new(pb::TripResponse {
                trip: Some(trip_to_proto(&trip)),
            }))
        }
        .await;

        self.state.record_rpc("TripService", "UpdateTrip", start, &result);
        result
    }

    async fn delete_trip(
        &self,
        request: Request<pb::DeleteTripRequest>,
    ) -> Result<Response<pb::DeleteTripResponse>, Status> {
        let start = Instant::now();
        let req = request.into_inner();

        let result = async {
            let trip_id = parse_uuid(&req.trip_id, "trip ID")?;
            let caller = parse_uuid(&req.user_id, "user ID")?;

            let trip = self
                .state
                .trip_repo
                .get(trip_id)
                .await
                .map_err(store_status)?
                .ok_or_else(|| Status::not_found("Trip not found"))?;

            if !trip.can_delete(caller) {
                return Err(Status::permission_denied("Only trip owner can delete"));
            }

            self.state.trip_repo.delete(trip_id).await.map_err(store_status)?;
            if let Err(err) = self.state.cache.invalidate(&format!("trip:{}", trip_id)).await {
                tracing::warn!(error = %err, "failed to invalidate trip cache");
            }

            Ok(Response::new(pb::DeleteTripResponse {
                success: true,
                message: "Trip deleted successfully".to_string(),
            }))
        }
        .await;

        self.state.record_rpc("TripService", "DeleteTrip", start, &result);
        result
    }

    async fn search_trips(
        &self,
        request: Request<pb::SearchTripsRequest>,
    ) -> Result<Response<pb::SearchTripsResponse>, Status> {
        let start = Instant::now();
        let req = request.into_inner();

        let result = async {
            let filter = TripFilter {
                status: None,
                destination: (!req.destination.is_empty()).then(|| req.destination.clone()),
                search: (!req.query.is_empty()).then(|| req.query.clone()),
                page: if req.page > 0 { req.page as i64 } else { 1 },
                limit: if req.limit > 0 { req.limit as i64 } else { 10 },
                sort_by: "created_at".to_string(),
                sort_order: "desc".to_string(),
            };

            // Authenticated callers search their own trips; everyone else
            // searches the public pool.
            let page = match Uuid::parse_str(&req.user_id) {
                Ok(user_id) => self
                    .state
                    .trip_repo
                    .list_for_user(user_id, &filter)
                    .await
                    .map_err(store_status)?,
                Err(_) => self
                    .state
                    .trip_repo
                    .search_public(&filter)
                    .await
                    .map_err(store_status)?,
            };

            Ok(Response::new(pb::SearchTripsResponse {
                trips: page.items.iter().map(trip_to_proto).collect(),
                total_count: page.total,
                page: page.page as i32,
                total_pages: page.pages,
            }))
        }
        .await;

        self.state.record_rpc("TripService", "SearchTrips", start, &result);
        result
    }

    async fn add_collaborator(
        &self,
        request: Request<pb::AddCollaboratorRequest>,
    ) -> Result<Response<pb::AddCollaboratorResponse>, Status> {
        let start = Instant::now();
        let req = request.into_inner();

        let result = async {
            let trip_id = parse_uuid(&req.trip_id, "trip ID")?;
            let caller = parse_uuid(&req.user_id, "user ID")?;

            let mut trip = self
                .state
                .trip_repo
                .get(trip_id)
                .await
                .map_err(store_status)?
                .ok_or_else(|| Status::not_found("Trip not found"))?;

            if !trip.can_manage_collaborators(caller) {
                return Err(Status::permission_denied("Access denied"));
            }

            let user = self
                .state
                .user_repo
                .find_by_email(&req.collaborator_email)
                .await
                .map_err(store_status)?
                .ok_or_else(|| Status::not_found("User not found"))?;

            if trip.creator == user.id || trip.collaborator(user.id).is_some() {
                return Err(Status::already_exists("User is already a collaborator"));
            }

            let role: CollaboratorRole =
                serde_json::from_value(serde_json::Value::String(req.role.to_lowercase()))
                    .unwrap_or_default();
            let collaborator = Collaborator::invite(user.id, role);
            trip.collaborators.push(collaborator.clone());

            self.state.trip_repo.update(&trip).await.map_err(store_status)?;
            if let Err(err) = self.state.cache.invalidate(&format!("trip:{}", trip_id)).await {
                tracing::warn!(error = %err, "failed to invalidate trip cache");
            }

            Ok(Response::new(pb::AddCollaboratorResponse {
                success: true,
                message: "Collaborator added successfully".to_string(),
                collaborator: Some(pb::CollaboratorInfo {
                    id: collaborator.id.to_string(),
                    name: user.full_name(),
                    email: user.email,
                }),
            }))
        }
        .await;

        self.state.record_rpc("TripService", "AddCollaborator", start, &result);
        result
    }

    async fn get_trip_analytics(
        &self,
        request: Request<pb::TripAnalyticsRequest>,
    ) -> Result<Response<pb::TripAnalyticsResponse>, Status> {
        let start = Instant::now();
        let req = request.into_inner();

        let result = async {
            let user_id = parse_uuid(&req.user_id, "user ID")?;

            let since = match req.time_range.as_str() {
                "week" => Some(Utc::now() - chrono::Duration::days(7)),
                "month" => Some(Utc::now() - chrono::Duration::days(30)),
                "year" => Some(Utc::now() - chrono::Duration::days(365)),
                _ => None,
            };

            let (total, public) = self
                .state
                .trip_repo
                .count_for_user(user_id, since)
                .await
                .map_err(store_status)?;

            Ok(Response::new(pb::TripAnalyticsResponse {
                total_trips: total,
                public_trips: public,
                private_trips: total - public,
                time_range: if req.time_range.is_empty() {
                    "all".to_string()
                } else {
                    req.time_range
                },
            }))
        }
        .await;

        self.state.record_rpc("TripService", "GetTripAnalytics", start, &result);
        result
    }
}

// ============================================================================
// UserService
// ============================================================================

#[tonic::async_trait]
impl UserService for UserGrpc {
    async fn create_user(
        &self,
        request: Request<pb::CreateUserRequest>,
    ) -> Result<Response<pb::AuthResponse>, Status> {
        let start = Instant::now();
        let req = request.into_inner();

        let result = async {
            validate_registration(&req.email, &req.password, &req.first_name, &req.last_name)
                .map_err(|e| Status::invalid_argument(e.to_string()))?;

            if self
                .state
                .user_repo
                .find_by_email(&req.email)
                .await
                .map_err(store_status)?
                .is_some()
            {
                return Err(Status::already_exists("User already exists with this email"));
            }

            let preferences: Preferences = if req.preferences.is_empty() {
                Preferences::default()
            } else {
                serde_json::from_str(&req.preferences)
                    .map_err(|_| Status::invalid_argument("Invalid preferences"))?
            };

            let hash = bcrypt::hash(&req.password, bcrypt::DEFAULT_COST)
                .map_err(|e| Status::internal(format!("Password hashing failed: {}", e)))?;
            let user = User::new(req.email, hash, req.first_name, req.last_name, preferences);

            self.state.user_repo.create(&user).await.map_err(store_status)?;
            let token = issue_token(&user, &self.state.auth)
                .map_err(|_| Status::internal("Token encoding failed"))?;

            Ok(Response::new(pb::AuthResponse {
                user: Some(user_to_proto(&user)),
                token,
            }))
        }
        .await;

        self.state.record_rpc("UserService", "CreateUser", start, &result);
        result
    }

    async fn get_user(
        &self,
        request: Request<pb::GetUserRequest>,
    ) -> Result<Response<pb::UserResponse>, Status> {
        let start = Instant::now();
        let req = request.into_inner();

        let result = async {
            let user_id = parse_uuid(&req.user_id, "user ID")?;

            let key = format!("user:{}", user_id);
            let repo = self.state.user_repo.clone();
            let value = self
                .state
                .cache
                .get_or_compute(&key, USER_CACHE_TTL, || async move {
                    let user = repo
                        .get(user_id)
                        .await
                        .map_err(anyhow::Error::from)?
                        .ok_or_else(|| anyhow::Error::from(StoreError::NotFound))?;
                    Ok(serde_json::to_value(user)?)
                })
                .await
                .map_err(|err| {
                    if matches!(err.downcast_ref::<StoreError>(), Some(StoreError::NotFound)) {
                        Status::not_found("User not found")
                    } else {
                        tracing::error!("cache/store error: {:#}", err);
                        Status::internal("store error")
                    }
                })?;

            let user: User = serde_json::from_value(value)
                .map_err(|e| Status::internal(format!("corrupt cache entry: {}", e)))?;

            Ok(Response::new(pb::UserResponse {
                user: Some(user_to_proto(&user)),
            }))
        }
        .await;

        self.state.record_rpc("UserService", "GetUser", start, &result);
        result
    }

    async fn authenticate_user(
        &self,
        request: Request<pb::AuthenticateUserRequest>,
    ) -> Result<Response<pb::AuthResponse>, Status> {
        let start = Instant::now();
        let req = request.into_inner();

        let result = async {
            let invalid = || Status::unauthenticated("Invalid credentials");

            let mut user = self
                .state
                .user_repo
                .find_by_email(&req.email)
                .await
                .map_err(store_status)?
                .filter(|u| u.is_active)
                .ok_or_else(invalid)?;

            if !bcrypt::verify(&req.password, &user.password_hash).unwrap_or(false) {
                return Err(invalid());
            }

            user.touch_login();
            self.state.user_repo.update(&user).await.map_err(store_status)?;

            let token = issue_token(&user, &self.state.auth)
                .map_err(|_| Status::internal("Token encoding failed"))?;

            Ok(Response::new(pb::AuthResponse {
                user: Some(user_to_proto(&user)),
                token,
            }))
        }
        .await;

        self.state.record_rpc("UserService", "AuthenticateUser", start, &result);
        result
    }
}

// ============================================================================
// ApiGateway
// ============================================================================

#[tonic::async_trait]
impl ApiGateway for GatewayGrpc {
    async fn route_request(
        &self,
        request: Request<pb::RouteRequestMessage>,
    ) -> Result<Response<pb::RouteResponse>, Status> {
        let start = Instant::now();
        let req = request.into_inner();

        let result = async {
            // Targets come from the registry, not a hardcoded host table.
            let instances = self
                .state
                .registry
                .discover(&req.service)
                .await
                .map_err(|e| Status::internal(format!("Service discovery failed: {}", e)))?;

            let Some(instance) = instances.first() else {
                return Err(Status::not_found(format!("Service {} not found", req.service)));
            };

            let payload = serde_json::json!({
                "message": format!("Request routed to {}", req.service),
                "method": req.method,
                "target": instance.base_url(),
                "timestamp": Utc::now().to_rfc3339(),
            });

            let mut headers = req.headers;
            headers.insert("content-type".to_string(), "application/json".to_string());
            headers.insert("x-gateway-version".to_string(), self.state.version.clone());

            Ok(Response::new(pb::RouteResponse {
                status_code: 200,
                payload: payload.to_string().into_bytes(),
                headers,
            }))
        }
        .await;

        self.state.record_rpc("ApiGateway", "RouteRequest", start, &result);
        result
    }

    async fn get_health(
        &self,
        _request: Request<pb::HealthRequest>,
    ) -> Result<Response<pb::HealthResponse>, Status> {
        let services = serde_json::json!({
            "database": "healthy",
            "redis": "healthy",
            "api": "healthy",
        });

        Ok(Response::new(pb::HealthResponse {
            status: "SERVING".to_string(),
            timestamp: Utc::now().to_rfc3339(),
            version: self.state.version.clone(),
            uptime_seconds: self.state.started_at.elapsed().as_secs(),
            services: services.to_string(),
        }))
    }
}
