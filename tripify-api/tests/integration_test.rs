mod common;

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use serde_json::{json, Value};

use common::{send, test_app};

fn future(days: i64) -> String {
    (Utc::now() + Duration::days(days)).to_rfc3339()
}

async fn register(app: &axum::Router, email: &str) -> (String, String) {
    let (status, body) = send(
        app,
        "POST",
        "/api/v1/users/register",
        None,
        Some(json!({
            "email": email,
            "password": "secret123",
            "first_name": "Ana",
            "last_name": "Silva",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let token = body["data"]["token"].as_str().expect("token").to_string();
    let user_id = body["data"]["user"]["id"].as_str().expect("user id").to_string();
    (token, user_id)
}

async fn create_trip(app: &axum::Router, token: &str, extra: Value) -> Value {
    let mut payload = json!({
        "title": "Summer in Lisbon",
        "destination": "Lisbon",
        "start_date": future(30),
        "end_date": future(37),
    });
    if let (Some(base), Some(more)) = (payload.as_object_mut(), extra.as_object()) {
        for (k, v) in more {
            base.insert(k.clone(), v.clone());
        }
    }
    let (status, body) = send(app, "POST", "/api/v1/trips", Some(token), Some(payload)).await;
    assert_eq!(status, StatusCode::CREATED, "create trip failed: {}", body);
    body["data"].clone()
}

#[tokio::test]
async fn register_login_and_trip_lifecycle() {
    let app = test_app().await;

    // register → 201 with token
    let (token, user_id) = register(&app, "ana@example.com").await;

    // login with the same credentials → 200 with token
    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/users/login",
        None,
        Some(json!({ "email": "ana@example.com", "password": "secret123" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["token"].is_string());
    assert_eq!(body["data"]["user"]["id"], user_id.as_str());

    // create a trip with valid dates → 201
    let trip = create_trip(&app, &token, json!({})).await;
    let trip_id = trip["id"].as_str().unwrap();

    // read it back as the creator → 200 with a matching payload
    let (status, body) = send(
        &app,
        "GET",
        &format!("/api/v1/trips/{}", trip_id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["title"], "Summer in Lisbon");
    assert_eq!(body["data"]["creator"], user_id.as_str());

    // a different user cannot delete it → 403
    let (other_token, _) = register(&app, "bruno@example.com").await;
    let (status, body) = send(
        &app,
        "DELETE",
        &format!("/api/v1/trips/{}", trip_id),
        Some(&other_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["success"], false);

    // the creator can → 200, and the trip is gone afterwards
    let (status, _) = send(
        &app,
        "DELETE",
        &format!("/api/v1/trips/{}", trip_id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &app,
        "GET",
        &format!("/api/v1/trips/{}", trip_id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn duplicate_email_registration_conflicts() {
    let app = test_app().await;
    register(&app, "ana@example.com").await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/users/register",
        None,
        Some(json!({
            "email": "ana@example.com",
            "password": "different",
            "first_name": "Other",
            "last_name": "Person",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "User already exists with this email");
}

#[tokio::test]
async fn trips_with_bad_dates_are_rejected() {
    let app = test_app().await;
    let (token, _) = register(&app, "ana@example.com").await;

    // end before start
    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/trips",
        Some(&token),
        Some(json!({
            "title": "Backwards",
            "destination": "Nowhere",
            "start_date": future(10),
            "end_date": future(5),
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "End date must be after start date");

    // end equal to start is also rejected (strictly after)
    let date = future(10);
    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/trips",
        Some(&token),
        Some(json!({
            "title": "Zero days",
            "destination": "Nowhere",
            "start_date": date,
            "end_date": date,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // start date in the past
    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/trips",
        Some(&token),
        Some(json!({
            "title": "Time travel",
            "destination": "Yesterday",
            "start_date": (Utc::now() - Duration::days(5)).to_rfc3339(),
            "end_date": future(5),
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Start date must be in the future");

    // missing required fields
    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/trips",
        Some(&token),
        Some(json!({ "title": "No destination" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn public_trips_are_readable_without_a_token() {
    let app = test_app().await;
    let (token, _) = register(&app, "ana@example.com").await;

    let public_trip = create_trip(
        &app,
        &token,
        json!({ "privacy": "public", "is_public": true }),
    )
    .await;
    let private_trip = create_trip(&app, &token, json!({ "title": "Secret getaway" })).await;

    // public: anonymous read succeeds
    let (status, body) = send(
        &app,
        "GET",
        &format!("/api/v1/trips/{}", public_trip["id"].as_str().unwrap()),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["title"], "Summer in Lisbon");

    // private: anonymous and stranger reads are both denied
    let private_url = format!("/api/v1/trips/{}", private_trip["id"].as_str().unwrap());
    let (status, _) = send(&app, "GET", &private_url, None, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (stranger, _) = register(&app, "bruno@example.com").await;
    let (status, _) = send(&app, "GET", &private_url, Some(&stranger), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // and the public search only surfaces the public one, without
    // collaborator or photo lists
    let (status, body) = send(&app, "GET", "/api/v1/trips/public/search", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let trips = body["data"]["trips"].as_array().unwrap();
    assert_eq!(trips.len(), 1);
    assert!(trips[0].get("collaborators").is_none());
    assert!(trips[0].get("photos").is_none());
}

#[tokio::test]
async fn collaborator_roles_gate_access() {
    let app = test_app().await;
    let (owner, _) = register(&app, "owner@example.com").await;
    let (editor, _) = register(&app, "editor@example.com").await;

    let trip = create_trip(&app, &owner, json!({})).await;
    let trip_id = trip["id"].as_str().unwrap();
    let trip_url = format!("/api/v1/trips/{}", trip_id);

    // invite as editor
    let (status, body) = send(
        &app,
        "POST",
        &format!("{}/collaborators", trip_url),
        Some(&owner),
        Some(json!({ "email": "editor@example.com", "role": "editor" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let collaborator_id = body["data"]["id"].as_str().unwrap().to_string();

    // pending invitations grant nothing
    let (status, _) = send(&app, "GET", &trip_url, Some(&editor), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // the invitee accepts their own invitation
    let (status, _) = send(
        &app,
        "PUT",
        &format!("{}/collaborators/{}", trip_url, collaborator_id),
        Some(&editor),
        Some(json!({ "status": "accepted" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // accepted editor can read and write
    let (status, _) = send(&app, "GET", &trip_url, Some(&editor), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &app,
        "PUT",
        &trip_url,
        Some(&editor),
        Some(json!({ "title": "Renamed by editor" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["title"], "Renamed by editor");

    // but still cannot delete
    let (status, _) = send(&app, "DELETE", &trip_url, Some(&editor), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // inviting the same user twice is rejected
    let (status, _) = send(
        &app,
        "POST",
        &format!("{}/collaborators", trip_url),
        Some(&owner),
        Some(json!({ "email": "editor@example.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn authentication_is_required_for_protected_routes() {
    let app = test_app().await;

    let (status, _) = send(&app, "GET", "/api/v1/trips", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, "GET", "/api/v1/users/profile", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app,
        "GET",
        "/api/v1/trips",
        Some("not-a-real-token"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn profile_and_leaderboard_reflect_welcome_points() {
    let app = test_app().await;
    let (token, _) = register(&app, "ana@example.com").await;

    let (status, body) = send(&app, "GET", "/api/v1/users/profile", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["user"]["email"], "ana@example.com");
    assert_eq!(body["data"]["user"]["gamification"]["points"], 100);
    assert!(body["data"]["user"].get("password_hash").is_none());

    let (status, body) = send(
        &app,
        "GET",
        "/api/v1/users/leaderboard",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let leaderboard = body["data"]["leaderboard"].as_array().unwrap();
    assert_eq!(leaderboard[0]["rank"], 1);
    assert_eq!(leaderboard[0]["points"], 100);
}

#[tokio::test]
async fn password_reset_flow() {
    let app = test_app().await;
    register(&app, "ana@example.com").await;

    // development mode returns the token inline
    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/users/forgot-password",
        None,
        Some(json!({ "email": "ana@example.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let reset_token = body["reset_token"].as_str().expect("reset token").to_string();

    // unknown emails get the same opaque answer, with no token
    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/users/forgot-password",
        None,
        Some(json!({ "email": "nobody@example.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.get("reset_token").is_none());

    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/users/reset-password",
        None,
        Some(json!({ "token": reset_token, "password": "brandnew1" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // new password works, the old one does not
    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/users/login",
        None,
        Some(json!({ "email": "ana@example.com", "password": "brandnew1" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/users/login",
        None,
        Some(json!({ "email": "ana@example.com", "password": "secret123" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn health_and_metrics_endpoints() {
    let app = test_app().await;

    let (status, body) = send(&app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert!(body["version"].is_string());

    // the health call above went through the metrics layer
    let (status, _) = send(&app, "GET", "/metrics", None, None).await;
    assert_eq!(status, StatusCode::OK);
}
