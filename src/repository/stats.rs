//! Aggregate queries backing the dashboard

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{Pool, Postgres};

use crate::{
    error::AppResult,
    models::stats::{CategoryStatistics, MonthlyLoanCount, UserLoanCount},
};

#[derive(Clone)]
pub struct StatsRepository {
    pool: Pool<Postgres>,
}

impl StatsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub async fn count_books(&self) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM books WHERE is_deleted = FALSE")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn count_users(&self) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE is_deleted = FALSE")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn count_users_created_since(&self, since: DateTime<Utc>) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM users WHERE is_deleted = FALSE AND created_at >= $1",
        )
        .bind(since)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    /// Distinct non-deleted users who borrowed on or after `since`
    pub async fn count_borrowers_since(&self, since: NaiveDate) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(DISTINCT l.user_id)
            FROM loans l
            JOIN users u ON u.id = l.user_id
            WHERE u.is_deleted = FALSE AND l.loan_date >= $1
            "#,
        )
        .bind(since)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    /// Categories ranked by number of loans
    pub async fn most_borrowed_categories(&self, limit: i64) -> AppResult<Vec<CategoryStatistics>> {
        let categories = sqlx::query_as::<_, CategoryStatistics>(
            r#"
            SELECT c.name AS category, COUNT(l.id) AS count
            FROM loans l
            JOIN books b ON b.id = l.book_id
            JOIN categories c ON c.id = b.category_id
            GROUP BY c.name
            ORDER BY count DESC, c.name
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(categories)
    }

    /// Loans started per month from `since` on, oldest month first
    pub async fn loans_by_month(&self, since: NaiveDate) -> AppResult<Vec<MonthlyLoanCount>> {
        let months = sqlx::query_as::<_, MonthlyLoanCount>(
            r#"
            SELECT TO_CHAR(DATE_TRUNC('month', loan_date), 'YYYY-MM') AS month, COUNT(*) AS count
            FROM loans
            WHERE loan_date >= $1
            GROUP BY 1
            ORDER BY 1
            "#,
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await?;
        Ok(months)
    }

    /// Users ranked by number of loans
    pub async fn most_active_users(&self, limit: i64) -> AppResult<Vec<UserLoanCount>> {
        let users = sqlx::query_as::<_, UserLoanCount>(
            r#"
            SELECT u.id AS user_id, u.name, u.email, COUNT(l.id) AS loan_count
            FROM users u
            JOIN loans l ON l.user_id = u.id
            WHERE u.is_deleted = FALSE
            GROUP BY u.id, u.name, u.email
            ORDER BY loan_count DESC, u.name
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }
}
