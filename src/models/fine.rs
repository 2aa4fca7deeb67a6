//! Late-return fines

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::error::{AppError, AppResult};

/// Fine attached to exactly one loan
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Fine {
    pub id: i64,
    pub loan_id: i32,
    pub amount: Decimal,
    pub paid: bool,
    pub description: Option<String>,
}

impl PartialEq for Fine {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Fine {
    pub fn pay(&mut self) -> AppResult<()> {
        if self.paid {
            return Err(AppError::InvalidState(format!("Fine {} is already paid", self.id)));
        }
        self.paid = true;
        Ok(())
    }
}

/// Fine computed for a late return, not yet persisted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LateFee {
    pub days_late: i64,
    pub amount: Decimal,
    pub description: String,
}

impl LateFee {
    /// Assess the fee for a return; `None` when returned on or before the due date.
    pub fn assess(expected: NaiveDate, returned: NaiveDate, daily_rate: Decimal) -> Option<Self> {
        if returned <= expected {
            return None;
        }
        let days_late = (returned - expected).num_days();
        Some(Self {
            days_late,
            amount: fine_amount(expected, returned, daily_rate),
            description: format!("Late return fine: {} days overdue", days_late),
        })
    }
}

/// Whole days between the due date and the return date, times the daily rate.
pub fn fine_amount(expected: NaiveDate, returned: NaiveDate, daily_rate: Decimal) -> Decimal {
    let days = (returned - expected).num_days().max(0);
    daily_rate * Decimal::from(days)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_fine_amount_per_day() {
        let rate = Decimal::new(50, 2);
        assert_eq!(fine_amount(date(2024, 3, 1), date(2024, 3, 7), rate), Decimal::new(300, 2));
        assert_eq!(fine_amount(date(2024, 2, 28), date(2024, 3, 1), rate), Decimal::new(100, 2));
        assert_eq!(fine_amount(date(2024, 3, 1), date(2024, 3, 1), rate), Decimal::ZERO);
    }

    #[test]
    fn test_assess_on_time_is_none() {
        let rate = Decimal::new(50, 2);
        assert!(LateFee::assess(date(2024, 3, 10), date(2024, 3, 10), rate).is_none());
        assert!(LateFee::assess(date(2024, 3, 10), date(2024, 3, 2), rate).is_none());
    }

    #[test]
    fn test_assess_is_repeatable() {
        let rate = Decimal::new(50, 2);
        let first = LateFee::assess(date(2024, 1, 1), date(2024, 1, 11), rate).unwrap();
        let second = LateFee::assess(date(2024, 1, 1), date(2024, 1, 11), rate).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.days_late, 10);
        assert_eq!(first.amount, Decimal::new(500, 2));
        assert_eq!(first.description, "Late return fine: 10 days overdue");
    }

    #[test]
    fn test_pay_twice() {
        let mut fine = Fine {
            id: 1,
            loan_id: 1,
            amount: Decimal::ONE,
            paid: false,
            description: None,
        };
        fine.pay().unwrap();
        assert!(fine.paid);
        assert!(matches!(fine.pay(), Err(AppError::InvalidState(_))));
    }
}
