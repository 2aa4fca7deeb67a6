//! Dashboard and statistics payloads

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use super::activity::Activity;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct CategoryStatistics {
    pub category: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DashboardData {
    pub total_books: i64,
    pub total_loans: i64,
    pub active_loans: i64,
    pub overdue_loans: i64,
    pub total_users: i64,
    pub most_borrowed_categories: Vec<CategoryStatistics>,
    pub recent_activities: Vec<Activity>,
}

/// Number of loans started in a calendar month
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct MonthlyLoanCount {
    /// First day of the month, `YYYY-MM`
    pub month: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoanStatistics {
    pub total_loans: i64,
    pub active_loans: i64,
    pub overdue_loans: i64,
    /// Percentage of returned loans that came back on or before their due date
    pub on_time_return_rate: f64,
    pub loans_by_month: Vec<MonthlyLoanCount>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct UserLoanCount {
    pub user_id: i32,
    pub name: String,
    pub email: String,
    pub loan_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserStatistics {
    pub total_users: i64,
    pub new_users_last_month: i64,
    /// Percentage of users who borrowed in the last three months
    pub active_users_percentage: f64,
    pub most_active_users: Vec<UserLoanCount>,
}

/// Percentage `part / whole * 100`, 0 when `whole` is 0
pub fn percentage(part: i64, whole: i64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    part as f64 / whole as f64 * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentage() {
        assert_eq!(percentage(0, 0), 0.0);
        assert_eq!(percentage(3, 4), 75.0);
        assert_eq!(percentage(5, 5), 100.0);
    }
}
