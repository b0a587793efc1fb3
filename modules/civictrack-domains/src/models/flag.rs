use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use civictrack_common::{CivicTrackError, Result, FLAG_HIDE_THRESHOLD};

use crate::models::issue::Issue;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Flag {
    pub id: Uuid,
    pub issue_id: Uuid,
    pub user_id: Uuid,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Flag {
    /// Record a flag and bump the issue's flag count in one transaction.
    ///
    /// The unique (issue_id, user_id) constraint closes the duplicate race:
    /// ON CONFLICT DO NOTHING returning no row means this user already
    /// flagged, and nothing is counted twice. The hide threshold is
    /// re-checked on every increment, so the flip to hidden is monotonic.
    pub async fn create(
        issue_id: Uuid,
        user_id: Uuid,
        reason: Option<&str>,
        pool: &PgPool,
    ) -> Result<Issue> {
        let mut tx = pool.begin().await?;

        let (exists,) =
            sqlx::query_as::<_, (bool,)>("SELECT EXISTS (SELECT 1 FROM issues WHERE id = $1)")
                .bind(issue_id)
                .fetch_one(&mut *tx)
                .await?;
        if !exists {
            return Err(CivicTrackError::NotFound(format!("Issue {issue_id}")));
        }

        let inserted = sqlx::query_as::<_, (Uuid,)>(
            r#"
            INSERT INTO flags (issue_id, user_id, reason)
            VALUES ($1, $2, $3)
            ON CONFLICT (issue_id, user_id) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(issue_id)
        .bind(user_id)
        .bind(reason)
        .fetch_optional(&mut *tx)
        .await?;

        if inserted.is_none() {
            return Err(CivicTrackError::Conflict(
                "You have already flagged this issue".into(),
            ));
        }

        let issue = sqlx::query_as::<_, Issue>(
            r#"
            UPDATE issues
            SET flag_count = flag_count + 1,
                hidden = hidden OR (flag_count + 1 >= $2),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(issue_id)
        .bind(FLAG_HIDE_THRESHOLD)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        if issue.hidden && issue.flag_count == FLAG_HIDE_THRESHOLD {
            tracing::info!(issue_id = %issue_id, "Issue auto-hidden after reaching flag threshold");
        }

        Ok(issue)
    }
}
