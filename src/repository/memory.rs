//! In-memory stores for service tests

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;

use super::{ActivityLog, BookStore, FineStore, LoanStore, UserStore};
use crate::{
    error::{AppError, AppResult},
    models::{
        ActivityType, Book, Fine, LateFee, Loan, LoanStatus, NewActivity, NewLoan, PageQuery, User,
    },
};

#[derive(Default)]
struct State {
    books: HashMap<i32, Book>,
    users: HashMap<i32, User>,
    loans: BTreeMap<i32, Loan>,
    next_loan_id: i32,
    next_fine_id: i64,
    activities: Vec<NewActivity>,
}

impl State {
    /// Same contract as the version-checked UPDATE on `books`
    fn write_book(&mut self, book: &Book) -> AppResult<Book> {
        let stored = self
            .books
            .get(&book.id)
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", book.id)))?;
        if stored.version != book.version {
            return Err(AppError::Conflict(format!(
                "Book {} was modified concurrently, please retry",
                book.id
            )));
        }
        if book.available_quantity < 0 || book.available_quantity > book.total_quantity {
            return Err(AppError::InvariantViolation(format!(
                "Book {} quantity out of bounds",
                book.id
            )));
        }
        let mut saved = book.clone();
        saved.version += 1;
        saved.updated_at = Utc::now();
        self.books.insert(saved.id, saved.clone());
        Ok(saved)
    }

    fn active_loan(&self, id: i32) -> AppResult<&Loan> {
        match self.loans.get(&id) {
            Some(loan) if loan.status == LoanStatus::Active => Ok(loan),
            _ => Err(AppError::Conflict(format!(
                "Loan {} was modified concurrently, please retry",
                id
            ))),
        }
    }
}

fn paginate(mut loans: Vec<Loan>, page: &PageQuery) -> (Vec<Loan>, i64) {
    loans.sort_by(|a, b| b.loan_date.cmp(&a.loan_date).then(b.id.cmp(&a.id)));
    let total = loans.len() as i64;
    let items = loans
        .into_iter()
        .skip(page.offset() as usize)
        .take(page.per_page() as usize)
        .collect();
    (items, total)
}

/// Books, users, loans, fines and activities behind one lock
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_book(&self, book: Book) {
        self.state.lock().unwrap().books.insert(book.id, book);
    }

    pub fn add_user(&self, user: User) {
        self.state.lock().unwrap().users.insert(user.id, user);
    }

    /// Insert a loan as-is, fine included
    pub fn add_loan(&self, loan: Loan) {
        let mut state = self.state.lock().unwrap();
        state.next_loan_id = state.next_loan_id.max(loan.id);
        if let Some(ref fine) = loan.fine {
            state.next_fine_id = state.next_fine_id.max(fine.id);
        }
        state.loans.insert(loan.id, loan);
    }

    pub fn book(&self, id: i32) -> Book {
        self.state.lock().unwrap().books[&id].clone()
    }

    pub fn loan(&self, id: i32) -> Loan {
        self.state.lock().unwrap().loans[&id].clone()
    }

    /// Simulate a write by another request
    pub fn touch_book(&self, id: i32) {
        if let Some(book) = self.state.lock().unwrap().books.get_mut(&id) {
            book.version += 1;
        }
    }

    pub fn activity_types(&self) -> Vec<ActivityType> {
        self.state
            .lock()
            .unwrap()
            .activities
            .iter()
            .map(|a| a.activity_type)
            .collect()
    }
}

#[async_trait]
impl BookStore for MemoryStore {
    async fn find_by_id(&self, id: i32) -> AppResult<Option<Book>> {
        let state = self.state.lock().unwrap();
        Ok(state.books.get(&id).cloned())
    }

    async fn find_by_isbn(&self, isbn: &str) -> AppResult<Option<Book>> {
        let state = self.state.lock().unwrap();
        Ok(state.books.values().find(|b| b.isbn == isbn && !b.deleted).cloned())
    }

    async fn save(&self, book: &Book) -> AppResult<Book> {
        self.state.lock().unwrap().write_book(book)
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_by_id(&self, id: i32) -> AppResult<Option<User>> {
        let state = self.state.lock().unwrap();
        Ok(state.users.get(&id).filter(|u| !u.deleted).cloned())
    }
}

#[async_trait]
impl LoanStore for MemoryStore {
    async fn find_by_id(&self, id: i32) -> AppResult<Option<Loan>> {
        Ok(self.state.lock().unwrap().loans.get(&id).cloned())
    }

    async fn find_all(&self, page: &PageQuery) -> AppResult<(Vec<Loan>, i64)> {
        let loans = self.state.lock().unwrap().loans.values().cloned().collect();
        Ok(paginate(loans, page))
    }

    async fn find_by_user(&self, user_id: i32, page: &PageQuery) -> AppResult<(Vec<Loan>, i64)> {
        let loans = self
            .state
            .lock()
            .unwrap()
            .loans
            .values()
            .filter(|l| l.user_id == user_id)
            .cloned()
            .collect();
        Ok(paginate(loans, page))
    }

    async fn find_all_overdue(&self, today: NaiveDate) -> AppResult<Vec<Loan>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .loans
            .values()
            .filter(|l| l.status == LoanStatus::Active && l.expected_return_date < today)
            .cloned()
            .collect())
    }

    async fn insert_with_book(&self, book: &Book, loan: &NewLoan) -> AppResult<Loan> {
        let mut state = self.state.lock().unwrap();
        state.write_book(book)?;

        state.next_loan_id += 1;
        let created = Loan {
            id: state.next_loan_id,
            user_id: loan.user_id,
            book_id: loan.book_id,
            loan_date: loan.loan_date,
            expected_return_date: loan.expected_return_date,
            return_date: None,
            status: LoanStatus::Active,
            renewal_count: 0,
            updated_at: Utc::now(),
            fine: None,
        };
        state.loans.insert(created.id, created.clone());
        Ok(created)
    }

    async fn save_return(&self, book: &Book, loan: &Loan, fee: Option<&LateFee>) -> AppResult<Loan> {
        let mut state = self.state.lock().unwrap();
        let existing_fine = state.active_loan(loan.id)?.fine.clone();
        state.write_book(book)?;

        let fine = match fee {
            Some(fee) => {
                let id = match existing_fine {
                    Some(ref fine) => fine.id,
                    None => {
                        state.next_fine_id += 1;
                        state.next_fine_id
                    }
                };
                Some(Fine {
                    id,
                    loan_id: loan.id,
                    amount: fee.amount,
                    paid: existing_fine.map(|f| f.paid).unwrap_or(false),
                    description: Some(fee.description.clone()),
                })
            }
            None => existing_fine,
        };

        let mut returned = loan.clone();
        returned.fine = fine;
        returned.updated_at = Utc::now();
        state.loans.insert(returned.id, returned.clone());
        Ok(returned)
    }

    async fn save_renewal(&self, loan: &Loan) -> AppResult<Loan> {
        let mut state = self.state.lock().unwrap();
        if state.active_loan(loan.id)?.renewal_count != loan.renewal_count - 1 {
            return Err(AppError::Conflict(format!(
                "Loan {} was modified concurrently, please retry",
                loan.id
            )));
        }
        let mut renewed = loan.clone();
        renewed.updated_at = Utc::now();
        state.loans.insert(renewed.id, renewed.clone());
        Ok(renewed)
    }
}

#[async_trait]
impl FineStore for MemoryStore {
    async fn sum_unpaid_for_user(&self, user_id: i32) -> AppResult<Decimal> {
        Ok(self
            .find_unpaid_by_user(user_id)
            .await?
            .iter()
            .map(|f| f.amount)
            .sum())
    }

    async fn find_unpaid_by_user(&self, user_id: i32) -> AppResult<Vec<Fine>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .loans
            .values()
            .filter(|l| l.user_id == user_id)
            .filter_map(|l| l.fine.clone())
            .filter(|f| !f.paid)
            .collect())
    }

    async fn find_by_id(&self, id: i64) -> AppResult<Option<Fine>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .loans
            .values()
            .filter_map(|l| l.fine.as_ref())
            .find(|f| f.id == id)
            .cloned())
    }

    async fn mark_paid(&self, fine: &Fine) -> AppResult<Fine> {
        let mut state = self.state.lock().unwrap();
        let stored = state
            .loans
            .get_mut(&fine.loan_id)
            .and_then(|l| l.fine.as_mut())
            .filter(|f| f.id == fine.id && !f.paid)
            .ok_or_else(|| AppError::Conflict(format!("Fine {} was modified concurrently", fine.id)))?;
        stored.paid = true;
        Ok(stored.clone())
    }
}

#[async_trait]
impl ActivityLog for MemoryStore {
    async fn record(&self, activity: NewActivity) -> AppResult<()> {
        self.state.lock().unwrap().activities.push(activity);
        Ok(())
    }
}
