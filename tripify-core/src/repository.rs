use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StoreError;
use crate::trip::{Trip, TripStatus};
use crate::user::User;

/// Listing filter shared by the owned-trips listing and public search.
#[derive(Debug, Clone, Deserialize)]
pub struct TripFilter {
    pub status: Option<TripStatus>,
    pub destination: Option<String>,
    pub search: Option<String>,
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default = "default_sort_by")]
    pub sort_by: String,
    #[serde(default = "default_sort_order")]
    pub sort_order: String,
}

fn default_page() -> i64 {
    1
}
fn default_limit() -> i64 {
    10
}
fn default_sort_by() -> String {
    "start_date".to_string()
}
fn default_sort_order() -> String {
    "desc".to_string()
}

impl Default for TripFilter {
    fn default() -> Self {
        Self {
            status: None,
            destination: None,
            search: None,
            page: default_page(),
            limit: default_limit(),
            sort_by: default_sort_by(),
            sort_order: default_sort_order(),
        }
    }
}

impl TripFilter {
    pub fn offset(&self) -> i64 {
        (self.page.max(1) - 1) * self.limit.max(1)
    }
}

/// One page of results plus pagination bookkeeping.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub pages: i64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, page: i64, limit: i64, total: i64) -> Self {
        let pages = if limit > 0 {
            (total + limit - 1) / limit
        } else {
            0
        };
        Self { items, page, limit, total, pages }
    }
}

/// Repository trait for trip persistence
#[async_trait]
pub trait TripRepository: Send + Sync {
    async fn create(&self, trip: &Trip) -> Result<(), StoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<Trip>, StoreError>;

    /// Full-document replace keyed by `trip.id`.
    async fn update(&self, trip: &Trip) -> Result<(), StoreError>;

    async fn delete(&self, id: Uuid) -> Result<(), StoreError>;

    /// Trips the user created or collaborates on (accepted only).
    async fn list_for_user(
        &self,
        user_id: Uuid,
        filter: &TripFilter,
    ) -> Result<Page<Trip>, StoreError>;

    /// Public trips, no authentication required.
    async fn search_public(&self, filter: &TripFilter) -> Result<Page<Trip>, StoreError>;

    /// Aggregate counts (total, public) for the analytics surface, optionally
    /// restricted to trips created after `since`.
    async fn count_for_user(
        &self,
        user_id: Uuid,
        since: Option<chrono::DateTime<chrono::Utc>>,
    ) -> Result<(i64, i64), StoreError>;
}

/// Repository trait for user persistence
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Fails with [`StoreError::Duplicate`] when the email is taken.
    async fn create(&self, user: &User) -> Result<(), StoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// Looks up a user by an unexpired password-reset token.
    async fn find_by_reset_token(&self, token: &str) -> Result<Option<User>, StoreError>;

    /// Full-document replace keyed by `user.id`.
    async fn update(&self, user: &User) -> Result<(), StoreError>;

    /// Active users ordered by gamification points, best first.
    async fn leaderboard(&self, limit: i64) -> Result<Vec<User>, StoreError>;
}
