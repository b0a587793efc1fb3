use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use civictrack_common::Result;

/// Aggregate counts for the admin dashboard. Hidden issues are excluded —
/// the analytics view reflects what the public can see.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueStats {
    pub total_issues: i64,
    pub issues_by_category: Vec<ValueCount>,
    pub issues_by_status: Vec<ValueCount>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ValueCount {
    pub value: String,
    pub count: i64,
}

impl IssueStats {
    pub async fn compute(pool: &PgPool) -> Result<Self> {
        let total_issues =
            sqlx::query_as::<_, (i64,)>("SELECT COUNT(*) FROM issues WHERE hidden = FALSE")
                .fetch_one(pool)
                .await?
                .0;

        let issues_by_category = sqlx::query_as::<_, ValueCount>(
            r#"
            SELECT category::text AS value, COUNT(*) AS count
            FROM issues
            WHERE hidden = FALSE
            GROUP BY category
            ORDER BY count DESC
            "#,
        )
        .fetch_all(pool)
        .await?;

        let issues_by_status = sqlx::query_as::<_, ValueCount>(
            r#"
            SELECT status::text AS value, COUNT(*) AS count
            FROM issues
            WHERE hidden = FALSE
            GROUP BY status
            ORDER BY count DESC
            "#,
        )
        .fetch_all(pool)
        .await?;

        Ok(Self {
            total_issues,
            issues_by_category,
            issues_by_status,
        })
    }
}
