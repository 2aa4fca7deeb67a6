//! Fines repository for database operations

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{Pool, Postgres};

use super::FineStore;
use crate::{
    error::{AppError, AppResult},
    models::Fine,
};

#[derive(Clone)]
pub struct FinesRepository {
    pool: Pool<Postgres>,
}

impl FinesRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FineStore for FinesRepository {
    async fn sum_unpaid_for_user(&self, user_id: i32) -> AppResult<Decimal> {
        let total: Decimal = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(f.amount), 0)
            FROM fines f
            JOIN loans l ON l.id = f.loan_id
            WHERE l.user_id = $1 AND f.paid = FALSE
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(total)
    }

    async fn find_unpaid_by_user(&self, user_id: i32) -> AppResult<Vec<Fine>> {
        let fines = sqlx::query_as::<_, Fine>(
            r#"
            SELECT f.* FROM fines f
            JOIN loans l ON l.id = f.loan_id
            WHERE l.user_id = $1 AND f.paid = FALSE
            ORDER BY f.id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(fines)
    }

    async fn find_by_id(&self, id: i64) -> AppResult<Option<Fine>> {
        let fine = sqlx::query_as::<_, Fine>("SELECT * FROM fines WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(fine)
    }

    async fn mark_paid(&self, fine: &Fine) -> AppResult<Fine> {
        sqlx::query_as::<_, Fine>("UPDATE fines SET paid = TRUE WHERE id = $1 AND paid = FALSE RETURNING *")
            .bind(fine.id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::Conflict(format!("Fine {} was modified concurrently", fine.id)))
    }
}
