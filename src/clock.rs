//! Source of "today" for date-based lending rules

use chrono::{NaiveDate, Utc};

pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

/// Wall clock in UTC
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Utc::now().date_naive()
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use chrono::Duration;
    use std::sync::Mutex;

    /// Manually advanced clock for tests
    pub struct FixedClock {
        today: Mutex<NaiveDate>,
    }

    impl FixedClock {
        pub fn new(today: NaiveDate) -> Self {
            Self {
                today: Mutex::new(today),
            }
        }

        pub fn advance_days(&self, days: i64) {
            let mut today = self.today.lock().unwrap();
            *today += Duration::days(days);
        }
    }

    impl Clock for FixedClock {
        fn today(&self) -> NaiveDate {
            *self.today.lock().unwrap()
        }
    }
}
