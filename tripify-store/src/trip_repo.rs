use async_trait::async_trait;
use serde_json::{json, Value};
use sqlx::postgres::PgRow;
use sqlx::{Postgres, QueryBuilder, Row};
use uuid::Uuid;

use tripify_core::repository::{Page, TripFilter, TripRepository};
use tripify_core::{StoreError, Trip};

use crate::database::map_sqlx;

pub struct PostgresTripRepository {
    pub pool: sqlx::PgPool,
}

impl PostgresTripRepository {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

fn json_column<T: serde::de::DeserializeOwned>(row: &PgRow, column: &str) -> Result<T, StoreError> {
    let value: Value = row.try_get(column).map_err(map_sqlx)?;
    serde_json::from_value(value).map_err(|e| StoreError::Database(e.to_string()))
}

fn enum_text<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_value(value)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default()
}

fn text_enum<T: serde::de::DeserializeOwned>(row: &PgRow, column: &str) -> Result<T, StoreError> {
    let text: String = row.try_get(column).map_err(map_sqlx)?;
    serde_json::from_value(Value::String(text)).map_err(|e| StoreError::Database(e.to_string()))
}

fn trip_from_row(row: &PgRow) -> Result<Trip, StoreError> {
    Ok(Trip {
        id: row.try_get("id").map_err(map_sqlx)?,
        title: row.try_get("title").map_err(map_sqlx)?,
        description: row.try_get("description").map_err(map_sqlx)?,
        destination: row.try_get("destination").map_err(map_sqlx)?,
        start_date: row.try_get("start_date").map_err(map_sqlx)?,
        end_date: row.try_get("end_date").map_err(map_sqlx)?,
        budget: json_column(row, "budget")?,
        status: text_enum(row, "status")?,
        privacy: text_enum(row, "privacy")?,
        creator: row.try_get("creator").map_err(map_sqlx)?,
        collaborators: json_column(row, "collaborators")?,
        itinerary: json_column(row, "itinerary")?,
        accommodations: json_column(row, "accommodations")?,
        transportation: json_column(row, "transportation")?,
        photos: json_column(row, "photos")?,
        tags: json_column(row, "tags")?,
        is_public: row.try_get("is_public").map_err(map_sqlx)?,
        created_at: row.try_get("created_at").map_err(map_sqlx)?,
        updated_at: row.try_get("updated_at").map_err(map_sqlx)?,
    })
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<Value, StoreError> {
    serde_json::to_value(value).map_err(|e| StoreError::Database(e.to_string()))
}

/// JSONB containment probe matching an accepted collaborator entry.
fn accepted_collaborator(user_id: Uuid) -> Value {
    json!([{ "user_id": user_id, "status": "accepted" }])
}

/// Shared destination/search predicates; appended to an open WHERE clause.
fn push_filters<'a>(qb: &mut QueryBuilder<'a, Postgres>, filter: &'a TripFilter) {
    if let Some(status) = &filter.status {
        qb.push(" AND status = ");
        qb.push_bind(enum_text(status));
    }
    if let Some(destination) = &filter.destination {
        qb.push(" AND destination ILIKE ");
        qb.push_bind(format!("%{}%", destination));
    }
    if let Some(search) = &filter.search {
        let needle = format!("%{}%", search);
        qb.push(" AND (title ILIKE ");
        qb.push_bind(needle.clone());
        qb.push(" OR description ILIKE ");
        qb.push_bind(needle.clone());
        qb.push(" OR destination ILIKE ");
        qb.push_bind(needle);
        qb.push(")");
    }
}

/// Sort column whitelist; anything unknown falls back to start_date.
fn push_order_and_page<'a>(qb: &mut QueryBuilder<'a, Postgres>, filter: &'a TripFilter) {
    let column = match filter.sort_by.as_str() {
        "created_at" => "created_at",
        "end_date" => "end_date",
        "title" => "title",
        "destination" => "destination",
        _ => "start_date",
    };
    let direction = if filter.sort_order.eq_ignore_ascii_case("asc") {
        "ASC"
    } else {
        "DESC"
    };
    qb.push(format!(" ORDER BY {} {}", column, direction));
    qb.push(" LIMIT ");
    qb.push_bind(filter.limit.max(1));
    qb.push(" OFFSET ");
    qb.push_bind(filter.offset());
}

#[async_trait]
impl TripRepository for PostgresTripRepository {
    async fn create(&self, trip: &Trip) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO trips (
                id, title, description, destination, start_date, end_date,
                budget, status, privacy, creator, collaborators, itinerary,
                accommodations, transportation, photos, tags, is_public,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)
            "#,
        )
        .bind(trip.id)
        .bind(&trip.title)
        .bind(&trip.description)
        .bind(&trip.destination)
        .bind(trip.start_date)
        .bind(trip.end_date)
        .bind(to_json(&trip.budget)?)
        .bind(enum_text(&trip.status))
        .bind(enum_text(&trip.privacy))
        .bind(trip.creator)
        .bind(to_json(&trip.collaborators)?)
        .bind(to_json(&trip.itinerary)?)
        .bind(to_json(&trip.accommodations)?)
        .bind(to_json(&trip.transportation)?)
        .bind(to_json(&trip.photos)?)
        .bind(to_json(&trip.tags)?)
        .bind(trip.is_public)
        .bind(trip.created_at)
        .bind(trip.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Trip>, StoreError> {
        let row = sqlx::query("SELECT * FROM trips WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?;

        row.as_ref().map(trip_from_row).transpose()
    }

    async fn update(&self, trip: &Trip) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE trips SET
                title = $2, description = $3, destination = $4, start_date = $5,
                end_date = $6, budget = $7, status = $8, privacy = $9,
                collaborators = $10, itinerary = $11, accommodations = $12,
                transportation = $13, photos = $14, tags = $15, is_public = $16,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(trip.id)
        .bind(&trip.title)
        .bind(&trip.description)
        .bind(&trip.destination)
        .bind(trip.start_date)
        .bind(trip.end_date)
        .bind(to_json(&trip.budget)?)
        .bind(enum_text(&trip.status))
        .bind(enum_text(&trip.privacy))
        .bind(to_json(&trip.collaborators)?)
        .bind(to_json(&trip.itinerary)?)
        .bind(to_json(&trip.accommodations)?)
        .bind(to_json(&trip.transportation)?)
        .bind(to_json(&trip.photos)?)
        .bind(to_json(&trip.tags)?)
        .bind(trip.is_public)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM trips WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn list_for_user(
        &self,
        user_id: Uuid,
        filter: &TripFilter,
    ) -> Result<Page<Trip>, StoreError> {
        let scope = accepted_collaborator(user_id);

        let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM trips WHERE (creator = ");
        qb.push_bind(user_id);
        qb.push(" OR collaborators @> ");
        qb.push_bind(scope.clone());
        qb.push(")");
        push_filters(&mut qb, filter);
        push_order_and_page(&mut qb, filter);

        let rows = qb.build().fetch_all(&self.pool).await.map_err(map_sqlx)?;
        let trips = rows.iter().map(trip_from_row).collect::<Result<Vec<_>, _>>()?;

        let mut count_qb =
            QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM trips WHERE (creator = ");
        count_qb.push_bind(user_id);
        count_qb.push(" OR collaborators @> ");
        count_qb.push_bind(scope);
        count_qb.push(")");
        push_filters(&mut count_qb, filter);

        let total: i64 = count_qb
            .build()
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx)?
            .try_get(0)
            .map_err(map_sqlx)?;

        Ok(Page::new(trips, filter.page, filter.limit, total))
    }

    async fn search_public(&self, filter: &TripFilter) -> Result<Page<Trip>, StoreError> {
        let mut qb = QueryBuilder::<Postgres>::new(
            "SELECT * FROM trips WHERE privacy = 'public' AND is_public",
        );
        push_filters(&mut qb, filter);
        push_order_and_page(&mut qb, filter);

        let rows = qb.build().fetch_all(&self.pool).await.map_err(map_sqlx)?;
        let trips = rows.iter().map(trip_from_row).collect::<Result<Vec<_>, _>>()?;

        let mut count_qb = QueryBuilder::<Postgres>::new(
            "SELECT COUNT(*) FROM trips WHERE privacy = 'public' AND is_public",
        );
        push_filters(&mut count_qb, filter);

        let total: i64 = count_qb
            .build()
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx)?
            .try_get(0)
            .map_err(map_sqlx)?;

        Ok(Page::new(trips, filter.page, filter.limit, total))
    }

    async fn count_for_user(
        &self,
        user_id: Uuid,
        since: Option<chrono::DateTime<chrono::Utc>>,
    ) -> Result<(i64, i64), StoreError> {
        let mut qb = QueryBuilder::<Postgres>::new(
            "SELECT COUNT(*) AS total, COUNT(*) FILTER (WHERE is_public) AS public \
             FROM trips WHERE (creator = ",
        );
        qb.push_bind(user_id);
        qb.push(" OR collaborators @> ");
        qb.push_bind(accepted_collaborator(user_id));
        qb.push(")");
        if let Some(since) = since {
            qb.push(" AND created_at >= ");
            qb.push_bind(since);
        }

        let row = qb.build().fetch_one(&self.pool).await.map_err(map_sqlx)?;

        let total: i64 = row.try_get("total").map_err(map_sqlx)?;
        let public: i64 = row.try_get("public").map_err(map_sqlx)?;
        Ok((total, public))
    }
}
