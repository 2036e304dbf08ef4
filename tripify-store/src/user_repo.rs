use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::PgRow;
use sqlx::Row;
use uuid::Uuid;

use tripify_core::repository::UserRepository;
use tripify_core::{StoreError, User};

use crate::database::map_sqlx;

pub struct PostgresUserRepository {
    pub pool: sqlx::PgPool,
}

impl PostgresUserRepository {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

fn json_column<T: serde::de::DeserializeOwned>(row: &PgRow, column: &str) -> Result<T, StoreError> {
    let value: Value = row.try_get(column).map_err(map_sqlx)?;
    serde_json::from_value(value).map_err(|e| StoreError::Database(e.to_string()))
}

fn user_from_row(row: &PgRow) -> Result<User, StoreError> {
    Ok(User {
        id: row.try_get("id").map_err(map_sqlx)?,
        email: row.try_get("email").map_err(map_sqlx)?,
        password_hash: row.try_get("password_hash").map_err(map_sqlx)?,
        first_name: row.try_get("first_name").map_err(map_sqlx)?,
        last_name: row.try_get("last_name").map_err(map_sqlx)?,
        preferences: json_column(row, "preferences")?,
        profile: json_column(row, "profile")?,
        gamification: json_column(row, "gamification")?,
        is_email_verified: row.try_get("is_email_verified").map_err(map_sqlx)?,
        is_active: row.try_get("is_active").map_err(map_sqlx)?,
        last_login: row.try_get("last_login").map_err(map_sqlx)?,
        password_reset_token: row.try_get("password_reset_token").map_err(map_sqlx)?,
        password_reset_expires: row.try_get("password_reset_expires").map_err(map_sqlx)?,
        created_at: row.try_get("created_at").map_err(map_sqlx)?,
        updated_at: row.try_get("updated_at").map_err(map_sqlx)?,
    })
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<Value, StoreError> {
    serde_json::to_value(value).map_err(|e| StoreError::Database(e.to_string()))
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn create(&self, user: &User) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO users (
                id, email, password_hash, first_name, last_name, preferences,
                profile, gamification, is_email_verified, is_active, last_login,
                password_reset_token, password_reset_expires, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(to_json(&user.preferences)?)
        .bind(to_json(&user.profile)?)
        .bind(to_json(&user.gamification)?)
        .bind(user.is_email_verified)
        .bind(user.is_active)
        .bind(user.last_login)
        .bind(&user.password_reset_token)
        .bind(user.password_reset_expires)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match map_sqlx(e) {
            // surface the duplicate subject by name rather than constraint
            StoreError::Duplicate(_) => StoreError::Duplicate("email".to_string()),
            other => other,
        })?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let row = sqlx::query("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query("SELECT * FROM users WHERE email = LOWER($1)")
            .bind(email.trim())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn find_by_reset_token(&self, token: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query(
            "SELECT * FROM users WHERE password_reset_token = $1 AND password_reset_expires > NOW()",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn update(&self, user: &User) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE users SET
                email = $2, password_hash = $3, first_name = $4, last_name = $5,
                preferences = $6, profile = $7, gamification = $8,
                is_email_verified = $9, is_active = $10, last_login = $11,
                password_reset_token = $12, password_reset_expires = $13,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(to_json(&user.preferences)?)
        .bind(to_json(&user.profile)?)
        .bind(to_json(&user.gamification)?)
        .bind(user.is_email_verified)
        .bind(user.is_active)
        .bind(user.last_login)
        .bind(&user.password_reset_token)
        .bind(user.password_reset_expires)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn leaderboard(&self, limit: i64) -> Result<Vec<User>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM users
            WHERE is_active
            ORDER BY (gamification->>'points')::bigint DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;

        rows.iter().map(user_from_row).collect()
    }
}
