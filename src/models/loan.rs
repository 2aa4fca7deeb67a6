//! Loan model and lending rules

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{postgres::PgTypeInfo, Decode, Encode, FromRow, Postgres};
use utoipa::ToSchema;

use super::fine::{Fine, LateFee};
use crate::{
    config::LoanPolicy,
    error::{AppError, AppResult},
};

/// Persisted loan status. Overdue is derived from the due date and never written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum LoanStatus {
    Active,
    Returned,
    Lost,
    Overdue,
}

impl LoanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanStatus::Active => "ACTIVE",
            LoanStatus::Returned => "RETURNED",
            LoanStatus::Lost => "LOST",
            LoanStatus::Overdue => "OVERDUE",
        }
    }
}

impl std::str::FromStr for LoanStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(LoanStatus::Active),
            "RETURNED" => Ok(LoanStatus::Returned),
            "LOST" => Ok(LoanStatus::Lost),
            "OVERDUE" => Ok(LoanStatus::Overdue),
            _ => Err(format!("Invalid loan status: {}", s)),
        }
    }
}

impl sqlx::Type<Postgres> for LoanStatus {
    fn type_info() -> PgTypeInfo {
        <String as sqlx::Type<Postgres>>::type_info()
    }

    fn compatible(ty: &PgTypeInfo) -> bool {
        <String as sqlx::Type<Postgres>>::compatible(ty)
    }
}

impl<'r> Decode<'r, Postgres> for LoanStatus {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s: String = Decode::<Postgres>::decode(value)?;
        s.parse().map_err(|e: String| e.into())
    }
}

impl Encode<'_, Postgres> for LoanStatus {
    fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
        <&str as Encode<Postgres>>::encode(self.as_str(), buf)
    }
}

/// Loan with its fine, if any
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Loan {
    pub id: i32,
    pub user_id: i32,
    pub book_id: i32,
    pub loan_date: NaiveDate,
    pub expected_return_date: NaiveDate,
    pub return_date: Option<NaiveDate>,
    pub status: LoanStatus,
    pub renewal_count: i16,
    pub updated_at: DateTime<Utc>,
    pub fine: Option<Fine>,
}

impl PartialEq for Loan {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Loan {
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.status == LoanStatus::Active && today > self.expected_return_date
    }

    /// Close the loan. Returns the late fee to attach when the book came back late.
    pub fn mark_returned(&mut self, today: NaiveDate, policy: &LoanPolicy) -> AppResult<Option<LateFee>> {
        match self.status {
            LoanStatus::Active => {}
            LoanStatus::Returned => {
                return Err(AppError::InvalidState(format!(
                    "Loan {} has already been returned",
                    self.id
                )))
            }
            other => {
                return Err(AppError::InvalidState(format!(
                    "Loan {} cannot be returned from status {}",
                    self.id,
                    other.as_str()
                )))
            }
        }

        self.return_date = Some(today);
        self.status = LoanStatus::Returned;

        Ok(LateFee::assess(self.expected_return_date, today, policy.daily_fine_rate))
    }

    /// Extend the due date by one loan period
    pub fn renew(&mut self, today: NaiveDate, policy: &LoanPolicy) -> AppResult<()> {
        if self.status != LoanStatus::Active {
            return Err(AppError::InvalidState(format!("Loan {} is not active", self.id)));
        }
        if self.is_overdue(today) {
            return Err(AppError::InvalidState(format!(
                "Loan {} is overdue and cannot be renewed",
                self.id
            )));
        }
        if self.renewal_count >= policy.max_renewals {
            return Err(AppError::InvalidState(format!(
                "Loan {} has reached the maximum of {} renewals",
                self.id, policy.max_renewals
            )));
        }

        self.expected_return_date += Duration::days(policy.period_days);
        self.renewal_count += 1;
        Ok(())
    }
}

/// Loan about to be inserted
#[derive(Debug, Clone)]
pub struct NewLoan {
    pub user_id: i32,
    pub book_id: i32,
    pub loan_date: NaiveDate,
    pub expected_return_date: NaiveDate,
}

impl NewLoan {
    pub fn issue(user_id: i32, book_id: i32, today: NaiveDate, policy: &LoanPolicy) -> Self {
        Self {
            user_id,
            book_id,
            loan_date: today,
            expected_return_date: today + Duration::days(policy.period_days),
        }
    }
}

/// Flat row from `loans LEFT JOIN fines`
#[derive(Debug, Clone, FromRow)]
pub struct LoanRow {
    id: i32,
    user_id: i32,
    book_id: i32,
    loan_date: NaiveDate,
    expected_return_date: NaiveDate,
    return_date: Option<NaiveDate>,
    status: LoanStatus,
    renewal_count: i16,
    updated_at: DateTime<Utc>,
    fine_id: Option<i64>,
    fine_amount: Option<Decimal>,
    fine_paid: Option<bool>,
    fine_description: Option<String>,
}

impl From<LoanRow> for Loan {
    fn from(row: LoanRow) -> Self {
        let fine = match (row.fine_id, row.fine_amount) {
            (Some(id), Some(amount)) => Some(Fine {
                id,
                loan_id: row.id,
                amount,
                paid: row.fine_paid.unwrap_or(false),
                description: row.fine_description,
            }),
            _ => None,
        };

        Loan {
            id: row.id,
            user_id: row.user_id,
            book_id: row.book_id,
            loan_date: row.loan_date,
            expected_return_date: row.expected_return_date,
            return_date: row.return_date,
            status: row.status,
            renewal_count: row.renewal_count,
            updated_at: row.updated_at,
            fine,
        }
    }
}

/// Loan as returned by the API
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoanDetails {
    pub id: i32,
    pub user_id: i32,
    pub book_id: i32,
    pub loan_date: NaiveDate,
    pub expected_return_date: NaiveDate,
    pub return_date: Option<NaiveDate>,
    pub status: LoanStatus,
    pub renewal_count: i16,
    pub is_overdue: bool,
    pub fine: Option<Fine>,
}

impl LoanDetails {
    pub fn from_loan(loan: Loan, today: NaiveDate) -> Self {
        let is_overdue = loan.is_overdue(today);
        Self {
            id: loan.id,
            user_id: loan.user_id,
            book_id: loan.book_id,
            loan_date: loan.loan_date,
            expected_return_date: loan.expected_return_date,
            return_date: loan.return_date,
            status: loan.status,
            renewal_count: loan.renewal_count,
            is_overdue,
            fine: loan.fine,
        }
    }
}

/// Create loan request
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateLoan {
    pub user_id: i32,
    pub book_id: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn active_loan(loan_date: NaiveDate) -> Loan {
        let issued = NewLoan::issue(1, 1, loan_date, &LoanPolicy::default());
        Loan {
            id: 1,
            user_id: issued.user_id,
            book_id: issued.book_id,
            loan_date: issued.loan_date,
            expected_return_date: issued.expected_return_date,
            return_date: None,
            status: LoanStatus::Active,
            renewal_count: 0,
            updated_at: Utc::now(),
            fine: None,
        }
    }

    #[test]
    fn test_issue_sets_due_date() {
        let loan = NewLoan::issue(1, 2, date(2024, 5, 1), &LoanPolicy::default());
        assert_eq!(loan.expected_return_date, date(2024, 5, 15));
    }

    #[test]
    fn test_overdue_is_strictly_after_due_date() {
        let loan = active_loan(date(2024, 5, 1));
        assert!(!loan.is_overdue(date(2024, 5, 15)));
        assert!(loan.is_overdue(date(2024, 5, 16)));

        let mut returned = loan.clone();
        returned.status = LoanStatus::Returned;
        assert!(!returned.is_overdue(date(2024, 6, 30)));
    }

    #[test]
    fn test_return_on_time_has_no_fee() {
        let policy = LoanPolicy::default();
        let mut loan = active_loan(date(2024, 5, 1));
        let fee = loan.mark_returned(date(2024, 5, 15), &policy).unwrap();
        assert!(fee.is_none());
        assert_eq!(loan.status, LoanStatus::Returned);
        assert_eq!(loan.return_date, Some(date(2024, 5, 15)));
    }

    #[test]
    fn test_late_return_fee() {
        let policy = LoanPolicy::default();
        let mut loan = active_loan(date(2024, 5, 1));
        let fee = loan.mark_returned(date(2024, 5, 21), &policy).unwrap().unwrap();
        assert_eq!(fee.days_late, 6);
        assert_eq!(fee.amount, Decimal::new(300, 2));
    }

    #[test]
    fn test_return_twice() {
        let policy = LoanPolicy::default();
        let mut loan = active_loan(date(2024, 5, 1));
        loan.mark_returned(date(2024, 5, 2), &policy).unwrap();
        let err = loan.mark_returned(date(2024, 5, 3), &policy).unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
        assert_eq!(loan.return_date, Some(date(2024, 5, 2)));
    }

    #[test]
    fn test_renewal_cap() {
        let policy = LoanPolicy::default();
        let mut loan = active_loan(date(2024, 5, 1));
        for expected in [date(2024, 5, 29), date(2024, 6, 12), date(2024, 6, 26)] {
            loan.renew(date(2024, 5, 2), &policy).unwrap();
            assert_eq!(loan.expected_return_date, expected);
        }
        assert_eq!(loan.renewal_count, 3);

        let err = loan.renew(date(2024, 5, 2), &policy).unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
        assert_eq!(loan.expected_return_date, date(2024, 6, 26));
    }

    #[test]
    fn test_renew_overdue_or_returned() {
        let policy = LoanPolicy::default();
        let mut loan = active_loan(date(2024, 5, 1));
        assert!(matches!(
            loan.renew(date(2024, 5, 16), &policy),
            Err(AppError::InvalidState(_))
        ));

        loan.mark_returned(date(2024, 5, 10), &policy).unwrap();
        assert!(matches!(
            loan.renew(date(2024, 5, 10), &policy),
            Err(AppError::InvalidState(_))
        ));
    }
}
