//! Data models for the library API

pub mod activity;
pub mod author;
pub mod book;
pub mod category;
pub mod fine;
pub mod loan;
pub mod stats;
pub mod user;

use serde::Deserialize;
use utoipa::IntoParams;

// Re-export commonly used types
pub use activity::{Activity, ActivityType, NewActivity};
pub use author::Author;
pub use book::{Book, BookDetails};
pub use category::Category;
pub use fine::{Fine, LateFee};
pub use loan::{Loan, LoanDetails, LoanStatus, NewLoan};
pub use user::{Role, User, UserClaims, UserDetails};

const DEFAULT_PER_PAGE: i64 = 20;
const MAX_PER_PAGE: i64 = 100;

/// Page request (1-based page number)
#[derive(Debug, Clone, Copy, Deserialize, IntoParams)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl PageQuery {
    pub fn new(page: i64, per_page: i64) -> Self {
        Self {
            page: Some(page),
            per_page: Some(per_page),
        }
    }

    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn per_page(&self) -> i64 {
        self.per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE)
    }

    pub fn offset(&self) -> i64 {
        (self.page() - 1) * self.per_page()
    }
}

impl Default for PageQuery {
    fn default() -> Self {
        Self {
            page: None,
            per_page: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_query_bounds() {
        let q = PageQuery::default();
        assert_eq!((q.page(), q.per_page(), q.offset()), (1, 20, 0));

        let q = PageQuery::new(3, 10);
        assert_eq!(q.offset(), 20);

        let q = PageQuery::new(0, 1000);
        assert_eq!((q.page(), q.per_page(), q.offset()), (1, 100, 0));
    }
}
