use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use tripify_core::repository::TripFilter;
use tripify_core::trip::{Accommodation, ItineraryDay, Photo, TransportLeg};
use tripify_core::{Budget, Collaborator, CollaboratorRole, CollaboratorStatus, Privacy, Trip, TripStatus};

use crate::error::ApiError;
use crate::middleware::auth::{auth_middleware, optional_auth_middleware, AuthUser, MaybeAuth};
use crate::state::AppState;

pub fn routes(state: AppState) -> Router<AppState> {
    // Reads go through optional auth so public trips stay readable without a
    // token; everything else requires one.
    let read = Router::new()
        .route("/trips/public/search", get(search_public))
        .route("/trips/{id}", get(get_trip))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            optional_auth_middleware,
        ));

    let protected = Router::new()
        .route("/trips", get(list_trips).post(create_trip))
        .route("/trips/{id}", put(update_trip).delete(delete_trip))
        .route("/trips/{id}/collaborators", post(add_collaborator))
        .route(
            "/trips/{id}/collaborators/{collaborator_id}",
            put(update_collaborator).delete(remove_collaborator),
        )
        .layer(axum::middleware::from_fn_with_state(state, auth_middleware));

    read.merge(protected)
}

fn trip_view(trip: &Trip) -> Value {
    let mut view = json!(trip);
    view["duration"] = json!(trip.duration_days());
    view["budget_remaining"] = json!(trip.budget_remaining());
    view["completion_percentage"] = json!(trip.completion_percentage());
    view
}

fn pagination(page: &tripify_core::repository::Page<Trip>) -> Value {
    json!({
        "page": page.page,
        "limit": page.limit,
        "total": page.total,
        "pages": page.pages,
    })
}

async fn load_trip(state: &AppState, id: Uuid) -> Result<Trip, ApiError> {
    state
        .trip_repo
        .get(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Trip not found".to_string()))
}

// ============================================================================
// Listing and reads
// ============================================================================

async fn list_trips(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Query(filter): Query<TripFilter>,
) -> Result<Json<Value>, ApiError> {
    let page = state.trip_repo.list_for_user(auth.id, &filter).await?;

    Ok(Json(json!({
        "success": true,
        "data": {
            "trips": page.items.iter().map(trip_view).collect::<Vec<_>>(),
            "pagination": pagination(&page),
        },
    })))
}

async fn get_trip(
    State(state): State<AppState>,
    Extension(MaybeAuth(user)): Extension<MaybeAuth>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let trip = load_trip(&state, id).await?;

    if !trip.can_view(user.map(|u| u.id)) {
        state.metrics.record_trip_operation("get", "forbidden");
        return Err(ApiError::Forbidden("Access denied to this trip".to_string()));
    }

    state.metrics.record_trip_operation("get", "success");
    Ok(Json(json!({ "success": true, "data": trip_view(&trip) })))
}

async fn search_public(
    State(state): State<AppState>,
    Query(filter): Query<TripFilter>,
) -> Result<Json<Value>, ApiError> {
    let page = state.trip_repo.search_public(&filter).await?;

    // Collaborator and photo lists stay private even on public trips.
    let trips: Vec<Value> = page
        .items
        .iter()
        .map(|trip| {
            let mut view = trip_view(trip);
            if let Some(obj) = view.as_object_mut() {
                obj.remove("collaborators");
                obj.remove("photos");
            }
            view
        })
        .collect();

    Ok(Json(json!({
        "success": true,
        "data": { "trips": trips, "pagination": pagination(&page) },
    })))
}

// ============================================================================
// Create / update / delete
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateTripRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub destination: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub budget: Option<Budget>,
    pub privacy: Option<Privacy>,
    pub tags: Option<Vec<String>>,
    pub is_public: Option<bool>,
}

async fn create_trip(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(req): Json<CreateTripRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (Some(title), Some(destination), Some(start_date), Some(end_date)) =
        (req.title, req.destination, req.start_date, req.end_date)
    else {
        return Err(ApiError::Validation(
            "Title, destination, start date, and end date are required".to_string(),
        ));
    };

    let mut trip = Trip::new(title, destination, start_date, end_date, auth.id);
    trip.description = req.description;
    if let Some(budget) = req.budget {
        trip.budget = budget;
    }
    if let Some(privacy) = req.privacy {
        trip.privacy = privacy;
    }
    if let Some(tags) = req.tags {
        trip.tags = tags;
    }
    if let Some(is_public) = req.is_public {
        trip.is_public = is_public;
    }

    trip.validate_for_create()?;
    state.trip_repo.create(&trip).await?;
    state.metrics.record_trip_operation("create", "success");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Trip created successfully",
            "data": trip_view(&trip),
        })),
    ))
}

#[derive(Debug, Deserialize)]
pub struct UpdateTripRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub destination: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub budget: Option<Budget>,
    pub status: Option<TripStatus>,
    pub privacy: Option<Privacy>,
    pub tags: Option<Vec<String>>,
    pub itinerary: Option<Vec<ItineraryDay>>,
    pub accommodations: Option<Vec<Accommodation>>,
    pub transportation: Option<Vec<TransportLeg>>,
    pub photos: Option<Vec<Photo>>,
    pub is_public: Option<bool>,
}

async fn update_trip(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateTripRequest>,
) -> Result<Json<Value>, ApiError> {
    let mut trip = load_trip(&state, id).await?;

    if !trip.can_edit(auth.id) {
        state.metrics.record_trip_operation("update", "forbidden");
        return Err(ApiError::Forbidden(
            "Permission denied to edit this trip".to_string(),
        ));
    }

    if let Some(title) = req.title {
        trip.title = title;
    }
    if let Some(description) = req.description {
        trip.description = Some(description);
    }
    if let Some(destination) = req.destination {
        trip.destination = destination;
    }
    if let Some(start_date) = req.start_date {
        trip.start_date = start_date;
    }
    if let Some(end_date) = req.end_date {
        trip.end_date = end_date;
    }
    if let Some(budget) = req.budget {
        trip.budget = budget;
    }
    if let Some(status) = req.status {
        trip.status = status;
    }
    if let Some(privacy) = req.privacy {
        trip.privacy = privacy;
    }
    if let Some(tags) = req.tags {
        trip.tags = tags;
    }
    if let Some(itinerary) = req.itinerary {
        trip.itinerary = itinerary;
    }
    if let Some(accommodations) = req.accommodations {
        trip.accommodations = accommodations;
    }
    if let Some(transportation) = req.transportation {
        trip.transportation = transportation;
    }
    if let Some(photos) = req.photos {
        trip.photos = photos;
    }
    if let Some(is_public) = req.is_public {
        trip.is_public = is_public;
    }

    trip.validate()?;
    state.trip_repo.update(&trip).await?;
    state.cache.invalidate(&format!("trip:{}", trip.id)).await?;
    state.metrics.record_trip_operation("update", "success");

    Ok(Json(json!({
        "success": true,
        "message": "Trip updated successfully",
        "data": trip_view(&trip),
    })))
}

async fn delete_trip(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let trip = load_trip(&state, id).await?;

    if !trip.can_delete(auth.id) {
        state.metrics.record_trip_operation("delete", "forbidden");
        return Err(ApiError::Forbidden(
            "Only the trip creator can delete this trip".to_string(),
        ));
    }

    state.trip_repo.delete(id).await?;
    state.cache.invalidate(&format!("trip:{}", id)).await?;
    state.metrics.record_trip_operation("delete", "success");

    Ok(Json(json!({
        "success": true,
        "message": "Trip deleted successfully",
    })))
}

// ============================================================================
// Collaborators
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct AddCollaboratorRequest {
    pub email: Option<String>,
    pub role: Option<CollaboratorRole>,
}

async fn add_collaborator(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<AddCollaboratorRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let Some(email) = req.email.filter(|e| !e.is_empty()) else {
        return Err(ApiError::Validation("Email is required".to_string()));
    };

    let mut trip = load_trip(&state, id).await?;

    if !trip.can_manage_collaborators(auth.id) {
        return Err(ApiError::Forbidden(
            "Permission denied to add collaborators".to_string(),
        ));
    }

    let user = state
        .user_repo
        .find_by_email(&email)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    if trip.creator == user.id {
        return Err(ApiError::Validation(
            "User is already the creator of this trip".to_string(),
        ));
    }
    if trip.collaborator(user.id).is_some() {
        return Err(ApiError::Validation(
            "User is already a collaborator".to_string(),
        ));
    }

    let collaborator = Collaborator::invite(user.id, req.role.unwrap_or_default());
    trip.collaborators.push(collaborator.clone());

    state.trip_repo.update(&trip).await?;
    state.cache.invalidate(&format!("trip:{}", trip.id)).await?;
    state.metrics.record_trip_operation("add_collaborator", "success");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Collaborator added successfully",
            "data": collaborator,
        })),
    ))
}

#[derive(Debug, Deserialize)]
pub struct UpdateCollaboratorRequest {
    pub role: Option<CollaboratorRole>,
    pub status: Option<CollaboratorStatus>,
}

async fn update_collaborator(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path((id, collaborator_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<UpdateCollaboratorRequest>,
) -> Result<Json<Value>, ApiError> {
    let mut trip = load_trip(&state, id).await?;

    let can_manage = trip.can_manage_collaborators(auth.id);
    let collaborator = trip
        .collaborator_mut(collaborator_id)
        .ok_or_else(|| ApiError::NotFound("Collaborator not found".to_string()))?;

    if let (Some(status), true) = (req.status, collaborator.user_id == auth.id) {
        // Invitees accept or decline their own invitation.
        collaborator.status = status;
    } else if let (Some(role), true) = (req.role, can_manage) {
        // Creator or admin adjusts roles.
        collaborator.role = role;
    } else {
        return Err(ApiError::Forbidden("Permission denied".to_string()));
    }

    let updated = collaborator.clone();
    state.trip_repo.update(&trip).await?;
    state.cache.invalidate(&format!("trip:{}", trip.id)).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Collaborator updated successfully",
        "data": updated,
    })))
}

async fn remove_collaborator(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path((id, collaborator_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Value>, ApiError> {
    let mut trip = load_trip(&state, id).await?;

    let collaborator = trip
        .collaborators
        .iter()
        .find(|c| c.id == collaborator_id)
        .cloned()
        .ok_or_else(|| ApiError::NotFound("Collaborator not found".to_string()))?;

    // Creator, an accepted admin, or the collaborator themself may remove.
    let can_remove = trip.can_manage_collaborators(auth.id) || collaborator.user_id == auth.id;
    if !can_remove {
        return Err(ApiError::Forbidden(
            "Permission denied to remove collaborator".to_string(),
        ));
    }

    trip.collaborators.retain(|c| c.id != collaborator_id);
    state.trip_repo.update(&trip).await?;
    state.cache.invalidate(&format!("trip:{}", trip.id)).await?;
    state.metrics.record_trip_operation("remove_collaborator", "success");

    Ok(Json(json!({
        "success": true,
        "message": "Collaborator removed successfully",
    })))
}
