//! Activity feed persistence

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use super::ActivityLog;
use crate::{
    error::AppResult,
    models::{Activity, NewActivity},
};

#[derive(Clone)]
pub struct ActivitiesRepository {
    pool: Pool<Postgres>,
}

impl ActivitiesRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Most recent activities first
    pub async fn recent(&self, limit: i64) -> AppResult<Vec<Activity>> {
        let activities = sqlx::query_as::<_, Activity>(
            "SELECT * FROM activities ORDER BY timestamp DESC, id DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(activities)
    }
}

#[async_trait]
impl ActivityLog for ActivitiesRepository {
    async fn record(&self, activity: NewActivity) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO activities (activity_type, description, timestamp, user_name, book_title)
            VALUES ($1, $2, NOW(), $3, $4)
            "#,
        )
        .bind(activity.activity_type.as_str())
        .bind(&activity.description)
        .bind(&activity.user_name)
        .bind(&activity.book_title)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
