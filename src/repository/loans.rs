//! Loans repository for database operations

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{PgConnection, Pool, Postgres};

use super::{books::write_book, LoanStore};
use crate::{
    error::{AppError, AppResult},
    models::{
        loan::LoanRow,
        Book, LateFee, Loan, LoanStatus, NewLoan, PageQuery,
    },
};

/// Loan columns with the fine folded in
const LOAN_SELECT: &str = r#"
    SELECT l.id, l.user_id, l.book_id, l.loan_date, l.expected_return_date, l.return_date,
           l.status, l.renewal_count, l.updated_at,
           f.id AS fine_id, f.amount AS fine_amount, f.paid AS fine_paid,
           f.description AS fine_description
    FROM loans l
    LEFT JOIN fines f ON f.loan_id = l.id
"#;

#[derive(Clone)]
pub struct LoansRepository {
    pool: Pool<Postgres>,
}

async fn fetch_loan(conn: &mut PgConnection, id: i32) -> AppResult<Loan> {
    let sql = format!("{} WHERE l.id = $1", LOAN_SELECT);
    let row = sqlx::query_as::<_, LoanRow>(&sql)
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", id)))?;
    Ok(row.into())
}

impl LoansRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub async fn count_all(&self) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM loans")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Count active loans
    pub async fn count_active(&self) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM loans WHERE status = $1")
            .bind(LoanStatus::Active)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Count active loans past their due date
    pub async fn count_overdue(&self, today: NaiveDate) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM loans WHERE status = $1 AND expected_return_date < $2",
        )
        .bind(LoanStatus::Active)
        .bind(today)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    /// Returned loans, and how many of them came back on time
    pub async fn count_returned(&self) -> AppResult<(i64, i64)> {
        let (returned, on_time): (i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*),
                   COUNT(*) FILTER (WHERE return_date <= expected_return_date)
            FROM loans
            WHERE status = $1
            "#,
        )
        .bind(LoanStatus::Returned)
        .fetch_one(&self.pool)
        .await?;
        Ok((returned, on_time))
    }
}

#[async_trait]
impl LoanStore for LoansRepository {
    async fn find_by_id(&self, id: i32) -> AppResult<Option<Loan>> {
        let sql = format!("{} WHERE l.id = $1", LOAN_SELECT);
        let row = sqlx::query_as::<_, LoanRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Loan::from))
    }

    async fn find_all(&self, page: &PageQuery) -> AppResult<(Vec<Loan>, i64)> {
        let total = self.count_all().await?;

        let sql = format!("{} ORDER BY l.loan_date DESC, l.id DESC LIMIT $1 OFFSET $2", LOAN_SELECT);
        let rows = sqlx::query_as::<_, LoanRow>(&sql)
            .bind(page.per_page())
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await?;

        Ok((rows.into_iter().map(Loan::from).collect(), total))
    }

    async fn find_by_user(&self, user_id: i32, page: &PageQuery) -> AppResult<(Vec<Loan>, i64)> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM loans WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

        let sql = format!(
            "{} WHERE l.user_id = $1 ORDER BY l.loan_date DESC, l.id DESC LIMIT $2 OFFSET $3",
            LOAN_SELECT
        );
        let rows = sqlx::query_as::<_, LoanRow>(&sql)
            .bind(user_id)
            .bind(page.per_page())
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await?;

        Ok((rows.into_iter().map(Loan::from).collect(), total))
    }

    async fn find_all_overdue(&self, today: NaiveDate) -> AppResult<Vec<Loan>> {
        let sql = format!(
            "{} WHERE l.status = $1 AND l.expected_return_date < $2 ORDER BY l.expected_return_date, l.id",
            LOAN_SELECT
        );
        let rows = sqlx::query_as::<_, LoanRow>(&sql)
            .bind(LoanStatus::Active)
            .bind(today)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Loan::from).collect())
    }

    async fn insert_with_book(&self, book: &Book, loan: &NewLoan) -> AppResult<Loan> {
        let mut tx = self.pool.begin().await?;

        write_book(&mut tx, book).await?;

        let id: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO loans (user_id, book_id, loan_date, expected_return_date, status, renewal_count)
            VALUES ($1, $2, $3, $4, $5, 0)
            RETURNING id
            "#,
        )
        .bind(loan.user_id)
        .bind(loan.book_id)
        .bind(loan.loan_date)
        .bind(loan.expected_return_date)
        .bind(LoanStatus::Active)
        .fetch_one(&mut *tx)
        .await?;

        let created = fetch_loan(&mut tx, id).await?;
        tx.commit().await?;

        Ok(created)
    }

    async fn save_return(&self, book: &Book, loan: &Loan, fee: Option<&LateFee>) -> AppResult<Loan> {
        let mut tx = self.pool.begin().await?;

        write_book(&mut tx, book).await?;

        let result = sqlx::query(
            r#"
            UPDATE loans SET status = $2, return_date = $3, updated_at = NOW()
            WHERE id = $1 AND status = $4
            "#,
        )
        .bind(loan.id)
        .bind(loan.status)
        .bind(loan.return_date)
        .bind(LoanStatus::Active)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::Conflict(format!(
                "Loan {} was modified concurrently, please retry",
                loan.id
            )));
        }

        if let Some(fee) = fee {
            sqlx::query(
                r#"
                INSERT INTO fines (loan_id, amount, paid, description)
                VALUES ($1, $2, FALSE, $3)
                ON CONFLICT (loan_id) DO UPDATE
                SET amount = EXCLUDED.amount, description = EXCLUDED.description
                "#,
            )
            .bind(loan.id)
            .bind(fee.amount)
            .bind(&fee.description)
            .execute(&mut *tx)
            .await?;
        }

        let returned = fetch_loan(&mut tx, loan.id).await?;
        tx.commit().await?;

        Ok(returned)
    }

    async fn save_renewal(&self, loan: &Loan) -> AppResult<Loan> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE loans SET expected_return_date = $2, renewal_count = $3, updated_at = NOW()
            WHERE id = $1 AND status = $4 AND renewal_count = $3 - 1
            "#,
        )
        .bind(loan.id)
        .bind(loan.expected_return_date)
        .bind(loan.renewal_count)
        .bind(LoanStatus::Active)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::Conflict(format!(
                "Loan {} was modified concurrently, please retry",
                loan.id
            )));
        }

        let renewed = fetch_loan(&mut tx, loan.id).await?;
        tx.commit().await?;

        Ok(renewed)
    }
}
