use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use civictrack_common::{CivicTrackError, Result};

use crate::models::issue::Issue;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Vote {
    pub id: Uuid,
    pub issue_id: Uuid,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl Vote {
    /// Record a vote and bump the issue's report count in one transaction.
    /// A vote counts as a duplicate report of the same problem, so it lands
    /// on report_count rather than a separate tally.
    pub async fn create(issue_id: Uuid, user_id: Uuid, pool: &PgPool) -> Result<Issue> {
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
            INSERT INTO votes (issue_id, user_id)
            VALUES ($1, $2)
            ON CONFLICT (issue_id, user_id) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(issue_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;

        if inserted.is_none() {
            return Err(CivicTrackError::Conflict(
                "You have already voted for this issue".into(),
            ));
        }

        let issue = Issue::increment_report_count(issue_id, &mut *tx).await?;

        tx.commit().await?;
        Ok(issue)
    }
}
