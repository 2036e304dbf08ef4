use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Extension, Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use tripify_core::user::{validate_registration, MIN_PASSWORD_LEN};
use tripify_core::{Preferences, Profile, User};

use crate::error::ApiError;
use crate::middleware::auth::{auth_middleware, issue_token, AuthUser};
use crate::state::AppState;

/// Welcome bonus granted at registration.
const WELCOME_POINTS: i64 = 100;

/// Password-reset tokens stay valid for ten minutes.
const RESET_TOKEN_MINUTES: i64 = 10;

pub fn routes(state: AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/users/register", post(register))
        .route("/users/login", post(login))
        .route("/users/forgot-password", post(forgot_password))
        .route("/users/reset-password", post(reset_password));

    let protected = Router::new()
        .route("/users/profile", get(get_profile).put(update_profile))
        .route("/users/leaderboard", get(leaderboard))
        .route("/users/change-password", put(change_password))
        .layer(axum::middleware::from_fn_with_state(state, auth_middleware));

    public.merge(protected)
}

fn user_view(user: &User) -> Value {
    json!({
        "id": user.id,
        "email": user.email,
        "first_name": user.first_name,
        "last_name": user.last_name,
        "full_name": user.full_name(),
        "preferences": user.preferences,
        "gamification": user.gamification,
        "last_login": user.last_login,
    })
}

fn hash_password(password: &str) -> Result<String, ApiError> {
    bcrypt::hash(password, bcrypt::DEFAULT_COST)
        .map_err(|e| ApiError::Internal(format!("Password hashing failed: {}", e)))
}

fn verify_password(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or(false)
}

// ============================================================================
// Registration / login
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub preferences: Option<Preferences>,
}

async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_registration(&req.email, &req.password, &req.first_name, &req.last_name)?;

    if state.user_repo.find_by_email(&req.email).await?.is_some() {
        state.metrics.record_user_operation("register", "conflict");
        return Err(ApiError::Conflict(
            "User already exists with this email".to_string(),
        ));
    }

    let mut user = User::new(
        req.email,
        hash_password(&req.password)?,
        req.first_name,
        req.last_name,
        req.preferences.unwrap_or_default(),
    );
    user.add_points(WELCOME_POINTS);

    state.user_repo.create(&user).await?;
    let token = issue_token(&user, &state.auth)?;
    state.metrics.record_user_operation("register", "success");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "User registered successfully",
            "data": { "user": user_view(&user), "token": token },
        })),
    ))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<Value>, ApiError> {
    if req.email.is_empty() || req.password.is_empty() {
        return Err(ApiError::Validation(
            "Please provide email and password".to_string(),
        ));
    }

    let invalid = || ApiError::Unauthorized("Invalid credentials".to_string());

    let mut user = state
        .user_repo
        .find_by_email(&req.email)
        .await?
        .filter(|u| u.is_active)
        .ok_or_else(invalid)?;

    if !verify_password(&req.password, &user.password_hash) {
        state.metrics.record_user_operation("login", "failure");
        return Err(invalid());
    }

    user.touch_login();
    state.user_repo.update(&user).await?;
    let token = issue_token(&user, &state.auth)?;
    state.metrics.record_user_operation("login", "success");

    Ok(Json(json!({
        "success": true,
        "message": "Login successful",
        "data": { "user": user_view(&user), "token": token },
    })))
}

// ============================================================================
// Profile
// ============================================================================

async fn get_profile(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Value>, ApiError> {
    let user = state
        .user_repo
        .get(auth.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    let mut view = user_view(&user);
    view["profile"] = json!(user.profile);
    view["is_email_verified"] = json!(user.is_email_verified);
    view["created_at"] = json!(user.created_at);

    Ok(Json(json!({ "success": true, "data": { "user": view } })))
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub preferences: Option<Preferences>,
    pub profile: Option<Profile>,
}

async fn update_profile(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<Value>, ApiError> {
    let mut user = state
        .user_repo
        .get(auth.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    if let Some(first_name) = req.first_name {
        user.first_name = first_name;
    }
    if let Some(last_name) = req.last_name {
        user.last_name = last_name;
    }
    if let Some(preferences) = req.preferences {
        user.preferences = preferences;
    }
    if let Some(profile) = req.profile {
        user.profile = profile;
    }

    state.user_repo.update(&user).await?;
    state.metrics.record_user_operation("update_profile", "success");

    let mut view = user_view(&user);
    view["profile"] = json!(user.profile);

    Ok(Json(json!({
        "success": true,
        "message": "Profile updated successfully",
        "data": { "user": view },
    })))
}

// ============================================================================
// Leaderboard
// ============================================================================

async fn leaderboard(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let users = state.user_repo.leaderboard(10).await?;

    let entries: Vec<Value> = users
        .iter()
        .enumerate()
        .map(|(i, user)| {
            json!({
                "rank": i + 1,
                "name": user.full_name(),
                "points": user.gamification.points,
                "level": user.gamification.level,
                "badges": user.gamification.badges,
            })
        })
        .collect();

    Ok(Json(json!({ "success": true, "data": { "leaderboard": entries } })))
}

// ============================================================================
// Password management
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

async fn forgot_password(
    State(state): State<AppState>,
    Json(req): Json<ForgotPasswordRequest>,
) -> Result<Json<Value>, ApiError> {
    if req.email.is_empty() {
        return Err(ApiError::Validation(
            "Please provide email address".to_string(),
        ));
    }

    // Same response whether or not the account exists.
    let opaque = "If an account with that email exists, a password reset link has been sent";

    let Some(mut user) = state.user_repo.find_by_email(&req.email).await? else {
        return Ok(Json(json!({ "success": true, "message": opaque })));
    };

    let reset_token = format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple());
    user.password_reset_token = Some(reset_token.clone());
    user.password_reset_expires =
        Some(chrono::Utc::now() + chrono::Duration::minutes(RESET_TOKEN_MINUTES));
    state.user_repo.update(&user).await?;

    // The token goes out by email in production; development answers inline.
    let mut body = json!({ "success": true, "message": opaque });
    if state.is_development() {
        body["reset_token"] = json!(reset_token);
    }
    Ok(Json(body))
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub password: String,
}

async fn reset_password(
    State(state): State<AppState>,
    Json(req): Json<ResetPasswordRequest>,
) -> Result<Json<Value>, ApiError> {
    if req.token.is_empty() || req.password.is_empty() {
        return Err(ApiError::Validation(
            "Please provide token and new password".to_string(),
        ));
    }
    if req.password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::Validation(
            "Password must be at least 6 characters long".to_string(),
        ));
    }

    let mut user = state
        .user_repo
        .find_by_reset_token(&req.token)
        .await?
        .ok_or_else(|| {
            ApiError::Validation("Password reset token is invalid or has expired".to_string())
        })?;

    user.password_hash = hash_password(&req.password)?;
    user.password_reset_token = None;
    user.password_reset_expires = None;
    state.user_repo.update(&user).await?;
    state.metrics.record_user_operation("reset_password", "success");

    Ok(Json(json!({
        "success": true,
        "message": "Password has been reset successfully",
    })))
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

async fn change_password(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<Json<Value>, ApiError> {
    if req.current_password.is_empty() || req.new_password.is_empty() {
        return Err(ApiError::Validation(
            "Please provide current password and new password".to_string(),
        ));
    }
    if req.new_password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::Validation(
            "Password must be at least 6 characters long".to_string(),
        ));
    }

    let mut user = state
        .user_repo
        .get(auth.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    if !verify_password(&req.current_password, &user.password_hash) {
        return Err(ApiError::Validation(
            "Current password is incorrect".to_string(),
        ));
    }

    user.password_hash = hash_password(&req.new_password)?;
    state.user_repo.update(&user).await?;
    state.metrics.record_user_operation("change_password", "success");

    Ok(Json(json!({
        "success": true,
        "message": "Password changed successfully",
    })))
}
