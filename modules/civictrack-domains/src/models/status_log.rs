use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use civictrack_common::{Result, Status};

/// One row per status change, including the initial `reported` entry written
/// at creation (old_status NULL). Append-only; nothing updates or deletes
/// these rows short of the owning issue cascading away.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct StatusLogEntry {
    pub id: Uuid,
    pub issue_id: Uuid,
    pub old_status: Option<Status>,
    pub new_status: Status,
    pub actor_id: Option<Uuid>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl StatusLogEntry {
    /// Append an entry. Takes any executor so callers can run it inside the
    /// same transaction that mutates the issue row.
    pub async fn append(
        executor: impl sqlx::PgExecutor<'_>,
        issue_id: Uuid,
        old_status: Option<Status>,
        new_status: Status,
        actor_id: Option<Uuid>,
        notes: Option<&str>,
    ) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO status_logs (issue_id, old_status, new_status, actor_id, notes)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(issue_id)
        .bind(old_status)
        .bind(new_status)
        .bind(actor_id)
        .bind(notes)
        .fetch_one(executor)
        .await
        .map_err(Into::into)
    }

    /// Full history for an issue, newest first (display order).
    pub async fn find_for_issue(issue_id: Uuid, pool: &PgPool) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM status_logs
            WHERE issue_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(issue_id)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }
}
