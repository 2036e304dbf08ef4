//! AI recommendation proxy. Builds a structured travel-planning prompt,
//! sends it to the configured generative-AI endpoint and relays the parsed
//! JSON plan. Without a configured key the endpoint answers 500, matching
//! the rest of the error taxonomy; there is no mock plan.

use axum::{
    extract::State,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::ApiError;
use crate::middleware::auth::auth_middleware;
use crate::state::AppState;

const GEMINI_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent";

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/recommendations/generate", post(generate))
        .route("/recommendations/history", get(history))
        .layer(axum::middleware::from_fn_with_state(state, auth_middleware))
}

#[derive(Debug, Deserialize)]
pub struct RecommendationRequest {
    pub trip_title: Option<String>,
    pub destination: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub participants: Option<u32>,
    pub budget: Option<f64>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub planned_activities: String,
}

impl RecommendationRequest {
    /// Collects every violation instead of stopping at the first one.
    fn validate(&self) -> Result<(), ApiError> {
        let mut errors = Vec::new();

        if self.trip_title.as_deref().map_or(true, |t| t.trim().is_empty()) {
            errors.push("Trip title is required".to_string());
        }
        if self.destination.as_deref().map_or(true, |d| d.trim().is_empty()) {
            errors.push("Destination is required".to_string());
        }
        if self.start_date.is_none() {
            errors.push("Start date is required".to_string());
        }
        if self.end_date.is_none() {
            errors.push("End date is required".to_string());
        }
        if self.participants.map_or(true, |p| p == 0) {
            errors.push("Number of participants must be greater than 0".to_string());
        }
        if self.budget.map_or(true, |b| b <= 0.0) {
            errors.push("Budget must be greater than 0".to_string());
        }
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if start >= end {
                errors.push("End date must be after start date".to_string());
            }
            if start < Utc::now() {
                errors.push("Start date cannot be in the past".to_string());
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ApiError::ValidationList(errors))
        }
    }
}

fn build_prompt(req: &RecommendationRequest, duration_days: i64) -> String {
    format!(
        r#"You are a professional travel planner. Create a detailed trip recommendation based on the following requirements:

**Trip Details:**
- Title: {title}
- Destination: {destination}
- Duration: {duration} days ({start} to {end})
- Number of participants: {participants}
- Budget: {budget} USD total
- Description: {description}
- Planned activities: {activities}

Respond ONLY with valid JSON containing the keys "tripOverview", "dailyItinerary", "budgetBreakdown", "recommendations", "travelTips" and "packingList". Make sure the recommendations stay within the budget, suit the group size, and include cost estimates for all activities."#,
        title = req.trip_title.as_deref().unwrap_or_default(),
        destination = req.destination.as_deref().unwrap_or_default(),
        duration = duration_days,
        start = req.start_date.map(|d| d.date_naive().to_string()).unwrap_or_default(),
        end = req.end_date.map(|d| d.date_naive().to_string()).unwrap_or_default(),
        participants = req.participants.unwrap_or_default(),
        budget = req.budget.unwrap_or_default(),
        description = if req.description.is_empty() {
            "No specific description provided"
        } else {
            &req.description
        },
        activities = if req.planned_activities.is_empty() {
            "Open to suggestions"
        } else {
            &req.planned_activities
        },
    )
}

/// Model output sometimes arrives wrapped in a markdown code fence.
fn strip_json_fences(text: &str) -> &str {
    text.trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

async fn generate(
    State(state): State<AppState>,
    Extension(claims): Extension<crate::middleware::auth::Claims>,
    Json(req): Json<RecommendationRequest>,
) -> Result<Json<Value>, ApiError> {
    req.validate()?;

    let Some(api_key) = state.external.gemini_api_key.clone() else {
        return Err(ApiError::Internal(
            "Gemini API key not configured".to_string(),
        ));
    };

    let (start, end) = (req.start_date.unwrap_or_default(), req.end_date.unwrap_or_default());
    let duration_days = (end - start).num_days().max(1);
    let prompt = build_prompt(&req, duration_days);

    let response: Value = state
        .http
        .post(GEMINI_URL)
        .query(&[("key", api_key)])
        .json(&json!({
            "contents": [{ "parts": [{ "text": prompt }] }]
        }))
        .send()
        .await
        .map_err(|e| ApiError::Internal(format!("AI service request failed: {}", e)))?
        .error_for_status()
        .map_err(|e| ApiError::Internal(format!("AI service error: {}", e)))?
        .json()
        .await
        .map_err(|e| ApiError::Internal(format!("AI service returned invalid JSON: {}", e)))?;

    let text = response["candidates"][0]["content"]["parts"][0]["text"]
        .as_str()
        .ok_or_else(|| ApiError::Internal("AI response missing content".to_string()))?;

    let recommendation: Value = serde_json::from_str(strip_json_fences(text))
        .map_err(|_| ApiError::Internal("Invalid response format from AI service".to_string()))?;

    if recommendation.get("tripOverview").is_none() || recommendation.get("dailyItinerary").is_none()
    {
        return Err(ApiError::Internal(
            "AI response missing required fields".to_string(),
        ));
    }

    Ok(Json(json!({
        "success": true,
        "data": {
            "request_id": Uuid::new_v4(),
            "requested_by": claims.sub,
            "user_input": {
                "trip_title": req.trip_title,
                "destination": req.destination,
                "start_date": req.start_date,
                "end_date": req.end_date,
                "participants": req.participants,
                "budget": req.budget,
                "description": req.description,
                "planned_activities": req.planned_activities,
            },
            "recommendation": recommendation,
            "generated_at": Utc::now(),
        },
    })))
}

async fn history() -> Json<Value> {
    // Recommendation persistence is not wired up; the page renders an empty
    // history until it is.
    Json(json!({ "success": true, "data": [] }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fence_stripping_handles_plain_and_fenced_payloads() {
        assert_eq!(strip_json_fences("{\"a\":1}"), "{\"a\":1}");
        assert_eq!(strip_json_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_json_fences("```\n{\"a\":1}\n```"), "{\"a\":1}");
    }

    #[test]
    fn validation_collects_every_error() {
        let req = RecommendationRequest {
            trip_title: None,
            destination: None,
            start_date: None,
            end_date: None,
            participants: Some(0),
            budget: Some(-5.0),
            description: String::new(),
            planned_activities: String::new(),
        };
        match req.validate() {
            Err(ApiError::ValidationList(errors)) => assert_eq!(errors.len(), 6),
            other => panic!("expected a validation list, got {:?}", other.err()),
        }
    }

    #[test]
    fn date_ordering_is_checked() {
        let now = Utc::now();
        let req = RecommendationRequest {
            trip_title: Some("Trip".into()),
            destination: Some("Rome".into()),
            start_date: Some(now + chrono::Duration::days(10)),
            end_date: Some(now + chrono::Duration::days(5)),
            participants: Some(2),
            budget: Some(1000.0),
            description: String::new(),
            planned_activities: String::new(),
        };
        match req.validate() {
            Err(ApiError::ValidationList(errors)) => {
                assert!(errors.contains(&"End date must be after start date".to_string()));
            }
            other => panic!("expected a validation list, got {:?}", other.err()),
        }
    }
}
