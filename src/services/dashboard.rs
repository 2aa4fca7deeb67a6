//! Dashboard statistics service

use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, NaiveTime, TimeZone, Utc};

use super::cache::{keys, CacheService};
use crate::{
    clock::Clock,
    error::AppResult,
    models::stats::{percentage, DashboardData, LoanStatistics, UserStatistics},
    repository::Repository,
};

const TOP_CATEGORIES: i64 = 5;
const RECENT_ACTIVITIES: i64 = 10;
const MOST_ACTIVE_USERS: i64 = 5;

/// First day of the month `months` months before the one containing `today`
fn months_back(today: NaiveDate, months: u32) -> NaiveDate {
    let first = today.with_day(1).unwrap_or(today);
    first.checked_sub_months(Months::new(months)).unwrap_or(first)
}

/// Midnight UTC `days` days before `today`
fn days_back(today: NaiveDate, days: i64) -> DateTime<Utc> {
    Utc.from_utc_datetime(&(today - Duration::days(days)).and_time(NaiveTime::MIN))
}

#[derive(Clone)]
pub struct DashboardService {
    repository: Repository,
    cache: CacheService,
    clock: Arc<dyn Clock>,
}

impl DashboardService {
    pub fn new(repository: Repository, cache: CacheService, clock: Arc<dyn Clock>) -> Self {
        Self {
            repository,
            cache,
            clock,
        }
    }

    pub async fn dashboard(&self) -> AppResult<DashboardData> {
        if let Some(data) = self.cache.get::<DashboardData>(keys::DASHBOARD).await {
            return Ok(data);
        }

        let today = self.clock.today();
        let data = DashboardData {
            total_books: self.repository.stats.count_books().await?,
            total_loans: self.repository.loans.count_all().await?,
            active_loans: self.repository.loans.count_active().await?,
            overdue_loans: self.repository.loans.count_overdue(today).await?,
            total_users: self.repository.stats.count_users().await?,
            most_borrowed_categories: self.repository.stats.most_borrowed_categories(TOP_CATEGORIES).await?,
            recent_activities: self.repository.activities.recent(RECENT_ACTIVITIES).await?,
        };

        self.cache.put(keys::DASHBOARD, &data).await;
        Ok(data)
    }

    pub async fn loan_statistics(&self) -> AppResult<LoanStatistics> {
        if let Some(stats) = self.cache.get::<LoanStatistics>(keys::LOAN_STATISTICS).await {
            return Ok(stats);
        }

        let today = self.clock.today();
        let (returned, on_time) = self.repository.loans.count_returned().await?;
        let stats = LoanStatistics {
            total_loans: self.repository.loans.count_all().await?,
            active_loans: self.repository.loans.count_active().await?,
            overdue_loans: self.repository.loans.count_overdue(today).await?,
            on_time_return_rate: percentage(on_time, returned),
            loans_by_month: self.repository.stats.loans_by_month(months_back(today, 5)).await?,
        };

        self.cache.put(keys::LOAN_STATISTICS, &stats).await;
        Ok(stats)
    }

    pub async fn user_statistics(&self) -> AppResult<UserStatistics> {
        if let Some(stats) = self.cache.get::<UserStatistics>(keys::USER_STATISTICS).await {
            return Ok(stats);
        }

        let today = self.clock.today();
        let total_users = self.repository.stats.count_users().await?;
        let borrowers = self
            .repository
            .stats
            .count_borrowers_since(today - Duration::days(90))
            .await?;

        let stats = UserStatistics {
            total_users,
            new_users_last_month: self
                .repository
                .stats
                .count_users_created_since(days_back(today, 30))
                .await?,
            active_users_percentage: percentage(borrowers, total_users),
            most_active_users: self.repository.stats.most_active_users(MOST_ACTIVE_USERS).await?,
        };

        self.cache.put(keys::USER_STATISTICS, &stats).await;
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_six_month_window_start() {
        assert_eq!(months_back(date(2024, 6, 17), 5), date(2024, 1, 1));
        assert_eq!(months_back(date(2024, 3, 31), 5), date(2023, 10, 1));
        assert_eq!(months_back(date(2024, 3, 31), 0), date(2024, 3, 1));
    }

    #[test]
    fn test_new_user_window_follows_clock() {
        let since = days_back(date(2024, 3, 15), 30);
        assert_eq!(since.date_naive(), date(2024, 2, 14));
        assert_eq!(since.time(), NaiveTime::MIN);
    }
}
