use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

pub const MAX_NAME_LEN: usize = 50;
pub const MIN_PASSWORD_LEN: usize = 6;

/// Every 1000 points earns a level.
pub const POINTS_PER_LEVEL: i64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BudgetTier {
    Low,
    #[default]
    Medium,
    High,
    Luxury,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TravelStyle {
    Adventure,
    Cultural,
    Relaxation,
    Business,
    Family,
    Romantic,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default)]
    pub budget: BudgetTier,
    #[serde(default = "default_travel_style")]
    pub travel_style: Vec<TravelStyle>,
    #[serde(default)]
    pub preferred_destinations: Vec<String>,
    #[serde(default)]
    pub dietary_restrictions: Vec<String>,
}

fn default_travel_style() -> Vec<TravelStyle> {
    vec![TravelStyle::Cultural]
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            budget: BudgetTier::default(),
            travel_style: default_travel_style(),
            preferred_destinations: Vec::new(),
            dietary_restrictions: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EmergencyContact {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub relationship: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Profile {
    pub avatar: Option<String>,
    pub date_of_birth: Option<DateTime<Utc>>,
    pub nationality: Option<String>,
    pub phone_number: Option<String>,
    pub emergency_contact: Option<EmergencyContact>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Gamification {
    pub points: i64,
    pub level: i32,
    #[serde(default)]
    pub badges: Vec<String>,
    #[serde(default)]
    pub achievements: Vec<String>,
}

impl Default for Gamification {
    fn default() -> Self {
        Self {
            points: 0,
            level: 1,
            badges: Vec::new(),
            achievements: Vec::new(),
        }
    }
}

/// A registered account. The password hash never serializes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub preferences: Preferences,
    #[serde(default)]
    pub profile: Profile,
    #[serde(default)]
    pub gamification: Gamification,
    #[serde(default)]
    pub is_email_verified: bool,
    #[serde(default = "default_active")]
    pub is_active: bool,
    pub last_login: Option<DateTime<Utc>>,
    #[serde(skip_serializing)]
    pub password_reset_token: Option<String>,
    #[serde(skip_serializing)]
    pub password_reset_expires: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_active() -> bool {
    true
}

impl User {
    pub fn new(
        email: String,
        password_hash: String,
        first_name: String,
        last_name: String,
        preferences: Preferences,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            email: email.trim().to_lowercase(),
            password_hash,
            first_name,
            last_name,
            preferences,
            profile: Profile::default(),
            gamification: Gamification::default(),
            is_email_verified: false,
            is_active: true,
            last_login: None,
            password_reset_token: None,
            password_reset_expires: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Award points and recompute the level.
    pub fn add_points(&mut self, points: i64) {
        self.gamification.points += points;
        let new_level = (self.gamification.points / POINTS_PER_LEVEL + 1) as i32;
        if new_level > self.gamification.level {
            self.gamification.level = new_level;
        }
    }

    pub fn touch_login(&mut self) {
        self.last_login = Some(Utc::now());
    }
}

/// Registration-time field checks. Password strength is checked on the raw
/// password before hashing, so it is a free function.
pub fn validate_registration(
    email: &str,
    password: &str,
    first_name: &str,
    last_name: &str,
) -> Result<(), ValidationError> {
    if email.trim().is_empty() || !email.contains('@') || !email.contains('.') {
        return Err(ValidationError::new("Please enter a valid email"));
    }
    if password.len() < MIN_PASSWORD_LEN {
        return Err(ValidationError::new(
            "Password must be at least 6 characters long",
        ));
    }
    if first_name.trim().is_empty() {
        return Err(ValidationError::new("First name is required"));
    }
    if first_name.len() > MAX_NAME_LEN {
        return Err(ValidationError::new("First name cannot exceed 50 characters"));
    }
    if last_name.trim().is_empty() {
        return Err(ValidationError::new("Last name is required"));
    }
    if last_name.len() > MAX_NAME_LEN {
        return Err(ValidationError::new("Last name cannot exceed 50 characters"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        User::new(
            "ana@example.com".to_string(),
            "$2b$12$hash".to_string(),
            "Ana".to_string(),
            "Silva".to_string(),
            Preferences::default(),
        )
    }

    #[test]
    fn email_is_lowercased() {
        let u = User::new(
            " Ana@Example.COM ".to_string(),
            String::new(),
            "Ana".to_string(),
            "Silva".to_string(),
            Preferences::default(),
        );
        assert_eq!(u.email, "ana@example.com");
    }

    #[test]
    fn points_roll_levels_forward_only() {
        let mut u = user();
        u.add_points(100);
        assert_eq!(u.gamification.points, 100);
        assert_eq!(u.gamification.level, 1);

        u.add_points(950);
        assert_eq!(u.gamification.level, 2);

        // levels never go back down
        u.gamification.points = 0;
        u.add_points(10);
        assert_eq!(u.gamification.level, 2);
    }

    #[test]
    fn registration_validation() {
        assert!(validate_registration("ana@example.com", "secret1", "Ana", "Silva").is_ok());
        assert!(validate_registration("not-an-email", "secret1", "Ana", "Silva").is_err());
        assert!(validate_registration("ana@example.com", "short", "Ana", "Silva").is_err());
        assert!(validate_registration("ana@example.com", "secret1", "", "Silva").is_err());
        assert!(validate_registration("ana@example.com", "secret1", "Ana", &"x".repeat(51)).is_err());
    }

    #[test]
    fn password_hash_never_serializes() {
        let json = serde_json::to_value(user()).unwrap();
        assert!(json.get("password_hash").is_none());
        assert!(json.get("email").is_some());
    }
}
