//! Loan management service

use std::sync::Arc;

use rust_decimal::Decimal;

use super::{
    activities::ActivityRecorder,
    cache::{keys, CacheService},
};
use crate::{
    clock::Clock,
    config::LoanPolicy,
    error::{AppError, AppResult},
    models::{ActivityType, Fine, LoanDetails, NewActivity, NewLoan, PageQuery, UserClaims},
    repository::{ActivityLog, BookStore, FineStore, LoanStore, Repository, UserStore},
};

/// Stores the loan lifecycle runs against
#[derive(Clone)]
pub struct LoanStores {
    pub books: Arc<dyn BookStore>,
    pub users: Arc<dyn UserStore>,
    pub loans: Arc<dyn LoanStore>,
    pub fines: Arc<dyn FineStore>,
    pub activities: Arc<dyn ActivityLog>,
}

impl LoanStores {
    pub fn from_repository(repository: &Repository) -> Self {
        Self {
            books: Arc::new(repository.books.clone()),
            users: Arc::new(repository.users.clone()),
            loans: Arc::new(repository.loans.clone()),
            fines: Arc::new(repository.fines.clone()),
            activities: Arc::new(repository.activities.clone()),
        }
    }
}

#[derive(Clone)]
pub struct LoansService {
    books: Arc<dyn BookStore>,
    users: Arc<dyn UserStore>,
    loans: Arc<dyn LoanStore>,
    fines: Arc<dyn FineStore>,
    activities: ActivityRecorder,
    clock: Arc<dyn Clock>,
    cache: CacheService,
    policy: LoanPolicy,
}

impl LoansService {
    pub fn new(stores: LoanStores, clock: Arc<dyn Clock>, cache: CacheService, policy: LoanPolicy) -> Self {
        Self {
            books: stores.books,
            users: stores.users,
            loans: stores.loans,
            fines: stores.fines,
            activities: ActivityRecorder::new(stores.activities),
            clock,
            cache,
            policy,
        }
    }

    /// Lend a copy of a book to a user
    pub async fn create_loan(&self, user_id: i32, book_id: i32) -> AppResult<LoanDetails> {
        let mut book = self
            .books
            .find_by_id(book_id)
            .await?
            .filter(|b| !b.deleted)
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", book_id)))?;

        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", user_id)))?;

        if !book.is_available() {
            return Err(AppError::Unavailable(format!(
                "Book '{}' has no copies available",
                book.title
            )));
        }

        let unpaid = self.fines.sum_unpaid_for_user(user.id).await?;
        if unpaid > Decimal::ZERO {
            return Err(AppError::Eligibility(format!(
                "User {} has unpaid fines totalling {}",
                user.id, unpaid
            )));
        }

        book.decrease_available_quantity()?;

        let today = self.clock.today();
        let new_loan = NewLoan::issue(user.id, book.id, today, &self.policy);
        let loan = self.loans.insert_with_book(&book, &new_loan).await?;

        tracing::info!(
            "Loan {} created: book {} to user {}, due {}",
            loan.id, book.id, user.id, loan.expected_return_date
        );

        self.activities
            .record(
                NewActivity::new(ActivityType::Loan, format!("{} borrowed '{}'", user.name, book.title))
                    .user(&user.name)
                    .book(&book.title),
            )
            .await;
        self.cache.invalidate(&keys::for_book(book.id)).await;

        Ok(LoanDetails::from_loan(loan, today))
    }

    /// Close an active loan, assessing a fine when it comes back late
    pub async fn return_loan(&self, loan_id: i32) -> AppResult<LoanDetails> {
        let mut loan = self
            .loans
            .find_by_id(loan_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", loan_id)))?;

        let today = self.clock.today();
        let fee = loan.mark_returned(today, &self.policy)?;

        let mut book = self
            .books
            .find_by_id(loan.book_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", loan.book_id)))?;
        book.increase_available_quantity()?;

        let user = self.users.find_by_id(loan.user_id).await?;

        let loan = self.loans.save_return(&book, &loan, fee.as_ref()).await?;

        match fee {
            Some(ref fee) => tracing::info!(
                "Loan {} returned {} days late, fine of {} assessed",
                loan.id, fee.days_late, fee.amount
            ),
            None => tracing::info!("Loan {} returned", loan.id),
        }

        let description = match user {
            Some(ref user) => format!("{} returned '{}'", user.name, book.title),
            None => format!("'{}' returned", book.title),
        };
        let mut activity = NewActivity::new(ActivityType::Return, description).book(&book.title);
        if let Some(user) = user {
            activity = activity.user(user.name);
        }
        self.activities.record(activity).await;
        self.cache.invalidate(&keys::for_book(book.id)).await;

        Ok(LoanDetails::from_loan(loan, today))
    }

    /// Extend an active, non-overdue loan by one loan period
    pub async fn renew_loan(&self, loan_id: i32) -> AppResult<LoanDetails> {
        let mut loan = self
            .loans
            .find_by_id(loan_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", loan_id)))?;

        let today = self.clock.today();
        loan.renew(today, &self.policy)?;

        let loan = self.loans.save_renewal(&loan).await?;

        tracing::info!(
            "Loan {} renewed ({}/{}), now due {}",
            loan.id, loan.renewal_count, self.policy.max_renewals, loan.expected_return_date
        );

        self.activities
            .record(NewActivity::new(
                ActivityType::Renewal,
                format!(
                    "Loan {} renewed until {} ({}/{})",
                    loan.id, loan.expected_return_date, loan.renewal_count, self.policy.max_renewals
                ),
            ))
            .await;
        self.cache.invalidate(&keys::statistics()).await;

        Ok(LoanDetails::from_loan(loan, today))
    }

    pub async fn get_loan(&self, loan_id: i32) -> AppResult<LoanDetails> {
        let loan = self
            .loans
            .find_by_id(loan_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", loan_id)))?;
        Ok(LoanDetails::from_loan(loan, self.clock.today()))
    }

    /// Loan as seen by `viewer`; a reader asking for someone else's loan gets `NotFound`
    pub async fn get_loan_for(&self, loan_id: i32, viewer: &UserClaims) -> AppResult<LoanDetails> {
        let loan = self.get_loan(loan_id).await?;
        if loan.user_id != viewer.user_id && !viewer.is_staff() {
            return Err(AppError::NotFound(format!("Loan with id {} not found", loan_id)));
        }
        Ok(loan)
    }

    pub async fn list_loans(&self, page: &PageQuery) -> AppResult<(Vec<LoanDetails>, i64)> {
        let today = self.clock.today();
        let (loans, total) = self.loans.find_all(page).await?;
        Ok((
            loans.into_iter().map(|l| LoanDetails::from_loan(l, today)).collect(),
            total,
        ))
    }

    /// Loans of a user, newest first
    pub async fn list_user_loans(&self, user_id: i32, page: &PageQuery) -> AppResult<(Vec<LoanDetails>, i64)> {
        self.require_user(user_id).await?;

        let today = self.clock.today();
        let (loans, total) = self.loans.find_by_user(user_id, page).await?;
        Ok((
            loans.into_iter().map(|l| LoanDetails::from_loan(l, today)).collect(),
            total,
        ))
    }

    /// Active loans past their due date
    pub async fn find_overdue_loans(&self) -> AppResult<Vec<LoanDetails>> {
        let today = self.clock.today();
        let loans = self.loans.find_all_overdue(today).await?;
        Ok(loans.into_iter().map(|l| LoanDetails::from_loan(l, today)).collect())
    }

    pub async fn total_unpaid_fines(&self, user_id: i32) -> AppResult<Decimal> {
        self.fines.sum_unpaid_for_user(user_id).await
    }

    pub async fn unpaid_fines(&self, user_id: i32) -> AppResult<Vec<Fine>> {
        self.require_user(user_id).await?;
        self.fines.find_unpaid_by_user(user_id).await
    }

    pub async fn pay_fine(&self, fine_id: i64) -> AppResult<Fine> {
        let mut fine = self
            .fines
            .find_by_id(fine_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Fine with id {} not found", fine_id)))?;

        fine.pay()?;
        let fine = self.fines.mark_paid(&fine).await?;

        tracing::info!("Fine {} of {} paid for loan {}", fine.id, fine.amount, fine.loan_id);

        self.activities
            .record(NewActivity::new(
                ActivityType::FinePaid,
                format!("Fine of {} paid for loan {}", fine.amount, fine.loan_id),
            ))
            .await;

        Ok(fine)
    }

    async fn require_user(&self, user_id: i32) -> AppResult<()> {
        self.users
            .find_by_id(user_id)
            .await?
            .map(|_| ())
            .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", user_id)))
    }
}
