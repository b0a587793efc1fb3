use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use civictrack_common::{
    validate_coordinates, Category, CivicTrackError, Result, Status, MAX_PHOTOS,
};

use crate::models::status_log::StatusLogEntry;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Issue {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub category: Category,
    pub status: Status,
    pub latitude: f64,
    pub longitude: f64,
    pub address: Option<String>,
    pub photos: Vec<String>,
    pub reporter_id: Option<Uuid>,
    pub hidden: bool,
    pub flag_count: i32,
    pub report_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields supplied by the reporter. Everything else is defaulted by the store.
#[derive(Debug, Clone)]
pub struct NewIssue {
    pub title: String,
    pub description: String,
    pub category: Category,
    pub latitude: f64,
    pub longitude: f64,
    pub address: Option<String>,
    pub photos: Vec<String>,
    pub reporter_id: Option<Uuid>,
}

/// Proximity query parameters. Coordinates are mandatory; a request without
/// them is rejected before any SQL runs.
#[derive(Debug, Clone)]
pub struct NearbyFilter {
    pub lat: f64,
    pub lng: f64,
    pub radius_km: f64,
    pub category: Option<Category>,
    pub status: Option<Status>,
    pub limit: i64,
    pub offset: i64,
}

/// Issue row enriched with the computed distance from the query origin.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct IssueWithDistance {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub category: Category,
    pub status: Status,
    pub latitude: f64,
    pub longitude: f64,
    pub address: Option<String>,
    pub photos: Vec<String>,
    pub reporter_id: Option<Uuid>,
    pub hidden: bool,
    pub flag_count: i32,
    pub report_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub distance_km: f64,
}

impl Issue {
    /// Create an issue and its initial status-log entry in one transaction.
    pub async fn create(new: NewIssue, pool: &PgPool) -> Result<Self> {
        if new.title.trim().is_empty() {
            return Err(CivicTrackError::Validation("Title is required".into()));
        }
        if new.description.trim().is_empty() {
            return Err(CivicTrackError::Validation("Description is required".into()));
        }
        validate_coordinates(new.latitude, new.longitude)?;
        if new.photos.len() > MAX_PHOTOS {
            return Err(CivicTrackError::Validation(format!(
                "At most {MAX_PHOTOS} photos per issue"
            )));
        }

        let mut tx = pool.begin().await?;

        let issue = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO issues (title, description, category, latitude, longitude, address, photos, reporter_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(new.title.trim())
        .bind(new.description.trim())
        .bind(new.category)
        .bind(new.latitude)
        .bind(new.longitude)
        .bind(&new.address)
        .bind(&new.photos)
        .bind(new.reporter_id)
        .fetch_one(&mut *tx)
        .await?;

        StatusLogEntry::append(
            &mut *tx,
            issue.id,
            None,
            Status::Reported,
            new.reporter_id,
            None,
        )
        .await?;

        tx.commit().await?;
        Ok(issue)
    }

    pub async fn find_by_id(id: Uuid, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM issues WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(Into::into)
    }

    /// The only path that mutates status. Captures the prior status under a
    /// row lock and appends exactly one audit entry in the same transaction.
    pub async fn set_status(
        id: Uuid,
        new_status: Status,
        actor_id: Option<Uuid>,
        notes: Option<&str>,
        pool: &PgPool,
    ) -> Result<Self> {
        let mut tx = pool.begin().await?;

        let prior = sqlx::query_as::<_, (Status,)>(
            "SELECT status FROM issues WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((old_status,)) = prior else {
            return Err(CivicTrackError::NotFound(format!("Issue {id}")));
        };

        let issue = sqlx::query_as::<_, Self>(
            "UPDATE issues SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(new_status)
        .fetch_one(&mut *tx)
        .await?;

        StatusLogEntry::append(&mut *tx, id, Some(old_status), new_status, actor_id, notes)
            .await?;

        tx.commit().await?;
        Ok(issue)
    }

    /// Force-hide regardless of flag count. Never un-hides.
    pub async fn hide(id: Uuid, pool: &PgPool) -> Result<()> {
        let result = sqlx::query("UPDATE issues SET hidden = TRUE, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(CivicTrackError::NotFound(format!("Issue {id}")));
        }
        Ok(())
    }

    /// Atomic increment; never read-modify-write from the application side.
    /// Takes any executor so moderation can run it inside its own transaction.
    pub async fn increment_report_count(
        id: Uuid,
        executor: impl sqlx::PgExecutor<'_>,
    ) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE issues
            SET report_count = report_count + 1,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| CivicTrackError::NotFound(format!("Issue {id}")))
    }

    /// Public proximity feed. Distance is computed in SQL with the
    /// `distance_km` function; hidden issues never appear.
    pub async fn find_nearby(filter: &NearbyFilter, pool: &PgPool) -> Result<Vec<IssueWithDistance>> {
        validate_coordinates(filter.lat, filter.lng)?;

        let mut qb = sqlx::QueryBuilder::new("SELECT i.*, distance_km(");
        qb.push_bind(filter.lat);
        qb.push(", ");
        qb.push_bind(filter.lng);
        qb.push(", i.latitude, i.longitude) AS distance_km FROM issues i WHERE i.hidden = FALSE ");

        if let Some(category) = filter.category {
            qb.push("AND i.category = ");
            qb.push_bind(category);
            qb.push(" ");
        }

        if let Some(status) = filter.status {
            qb.push("AND i.status = ");
            qb.push_bind(status);
            qb.push(" ");
        }

        qb.push("AND distance_km(");
        qb.push_bind(filter.lat);
        qb.push(", ");
        qb.push_bind(filter.lng);
        qb.push(", i.latitude, i.longitude) <= ");
        qb.push_bind(filter.radius_km);
        qb.push(" ");

        qb.push("ORDER BY i.created_at DESC ");
        qb.push("LIMIT ");
        qb.push_bind(filter.limit);
        qb.push(" OFFSET ");
        qb.push_bind(filter.offset);

        qb.build_query_as::<IssueWithDistance>()
            .fetch_all(pool)
            .await
            .map_err(Into::into)
    }

    /// Admin triage list: anything with at least one flag, hottest first.
    /// Hidden issues are included; hidden only affects public queries.
    pub async fn find_flagged(pool: &PgPool) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM issues
            WHERE flag_count >= 1
            ORDER BY flag_count DESC, created_at DESC
            "#,
        )
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }
}
