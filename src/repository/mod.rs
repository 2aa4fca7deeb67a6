//! Repository layer for database operations

pub mod activities;
pub mod authors;
pub mod books;
pub mod categories;
pub mod fines;
pub mod loans;
pub mod stats;
pub mod users;

#[cfg(test)]
pub mod memory;

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::{Pool, Postgres};

use crate::{
    error::AppResult,
    models::{
        author::{Author, AuthorInput},
        book::{BookInput, BorrowedBook},
        category::{Category, CategoryInput},
        user::UpdateUser,
        Book, Fine, LateFee, Loan, NewActivity, NewLoan, PageQuery, User,
    },
};

pub use users::NewUser;

/// Book lookups and version-checked writes
#[async_trait]
pub trait BookStore: Send + Sync {
    /// Book by id, soft-deleted rows included
    async fn find_by_id(&self, id: i32) -> AppResult<Option<Book>>;
    async fn find_by_isbn(&self, isbn: &str) -> AppResult<Option<Book>>;
    /// Persist the row if nobody wrote it since it was read; returns it with its new version.
    async fn save(&self, book: &Book) -> AppResult<Book>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Non-deleted user by id
    async fn find_by_id(&self, id: i32) -> AppResult<Option<User>>;
}

/// Catalog reads and writes behind the books endpoints
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Non-deleted book by id
    async fn get_by_id(&self, id: i32) -> AppResult<Book>;
    async fn get_by_isbn(&self, isbn: &str) -> AppResult<Option<Book>>;
    /// Whether the ISBN is taken, deleted books included
    async fn isbn_exists(&self, isbn: &str, exclude_id: Option<i32>) -> AppResult<bool>;
    async fn list(&self, page: &PageQuery) -> AppResult<(Vec<Book>, i64)>;
    async fn search_by_title(&self, title: &str, page: &PageQuery) -> AppResult<(Vec<Book>, i64)>;
    async fn list_by_author(&self, author_id: i32, page: &PageQuery) -> AppResult<(Vec<Book>, i64)>;
    async fn list_by_category(&self, category_id: i32, page: &PageQuery) -> AppResult<(Vec<Book>, i64)>;
    async fn authors_of(&self, book_id: i32) -> AppResult<Vec<Author>>;
    async fn count_active_loans(&self, book_id: i32) -> AppResult<i64>;
    async fn create(&self, input: &BookInput) -> AppResult<Book>;
    /// Version-checked write; replaces the author links when `author_ids` is given.
    async fn update(&self, book: &Book, author_ids: Option<Vec<i32>>) -> AppResult<Book>;
    async fn delete(&self, id: i32) -> AppResult<()>;
    async fn most_borrowed(&self, limit: i64) -> AppResult<Vec<BorrowedBook>>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuthorStore: Send + Sync {
    async fn get_by_id(&self, id: i32) -> AppResult<Author>;
    /// Number of the given ids that exist
    async fn count_existing(&self, ids: &[i32]) -> AppResult<i64>;
    async fn list(&self, page: &PageQuery) -> AppResult<(Vec<Author>, i64)>;
    async fn search_by_name(&self, name: &str, page: &PageQuery) -> AppResult<(Vec<Author>, i64)>;
    async fn create(&self, input: &AuthorInput) -> AppResult<Author>;
    async fn update(&self, id: i32, input: &AuthorInput) -> AppResult<Author>;
    /// Whether any book, deleted or not, is linked to the author
    async fn has_books(&self, id: i32) -> AppResult<bool>;
    async fn delete(&self, id: i32) -> AppResult<()>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CategoryStore: Send + Sync {
    async fn get_by_id(&self, id: i32) -> AppResult<Category>;
    async fn find_by_id(&self, id: i32) -> AppResult<Option<Category>>;
    /// Exact, case-insensitive name lookup
    async fn get_by_name(&self, name: &str) -> AppResult<Category>;
    async fn name_exists(&self, name: &str, exclude_id: Option<i32>) -> AppResult<bool>;
    async fn list(&self) -> AppResult<Vec<Category>>;
    async fn create(&self, input: &CategoryInput) -> AppResult<Category>;
    async fn update(&self, id: i32, input: &CategoryInput) -> AppResult<Category>;
    /// Whether any book, deleted or not, references the category
    async fn in_use(&self, id: i32) -> AppResult<bool>;
    async fn delete(&self, id: i32) -> AppResult<()>;
}

/// User accounts as managed by the users endpoints
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Non-deleted user by id
    async fn get_by_id(&self, id: i32) -> AppResult<User>;
    /// Non-deleted user by email, case-insensitive
    async fn get_by_email(&self, email: &str) -> AppResult<Option<User>>;
    /// Whether the email is taken, deleted users included
    async fn email_exists(&self, email: &str, exclude_id: Option<i32>) -> AppResult<bool>;
    async fn list(&self, page: &PageQuery) -> AppResult<(Vec<User>, i64)>;
    async fn create(&self, user: &NewUser) -> AppResult<User>;
    /// Update the fields present in `user`
    async fn update(&self, id: i32, user: &UpdateUser, password_hash: Option<String>) -> AppResult<User>;
    /// Soft delete
    async fn delete(&self, id: i32) -> AppResult<()>;
}

#[async_trait]
pub trait LoanStore: Send + Sync {
    async fn find_by_id(&self, id: i32) -> AppResult<Option<Loan>>;
    async fn find_all(&self, page: &PageQuery) -> AppResult<(Vec<Loan>, i64)>;
    async fn find_by_user(&self, user_id: i32, page: &PageQuery) -> AppResult<(Vec<Loan>, i64)>;
    /// Active loans whose due date is before `today`
    async fn find_all_overdue(&self, today: NaiveDate) -> AppResult<Vec<Loan>>;
    /// Write the decremented book and insert the loan in one transaction.
    async fn insert_with_book(&self, book: &Book, loan: &NewLoan) -> AppResult<Loan>;
    /// Write the incremented book, the returned loan and its late fee in one transaction.
    async fn save_return(&self, book: &Book, loan: &Loan, fee: Option<&LateFee>) -> AppResult<Loan>;
    async fn save_renewal(&self, loan: &Loan) -> AppResult<Loan>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FineStore: Send + Sync {
    async fn sum_unpaid_for_user(&self, user_id: i32) -> AppResult<Decimal>;
    async fn find_unpaid_by_user(&self, user_id: i32) -> AppResult<Vec<Fine>>;
    async fn find_by_id(&self, id: i64) -> AppResult<Option<Fine>>;
    async fn mark_paid(&self, fine: &Fine) -> AppResult<Fine>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ActivityLog: Send + Sync {
    async fn record(&self, activity: NewActivity) -> AppResult<()>;
}

/// Main repository struct holding database connection pool
#[derive(Clone)]
pub struct Repository {
    pub pool: Pool<Postgres>,
    pub books: books::BooksRepository,
    pub authors: authors::AuthorsRepository,
    pub categories: categories::CategoriesRepository,
    pub users: users::UsersRepository,
    pub loans: loans::LoansRepository,
    pub fines: fines::FinesRepository,
    pub activities: activities::ActivitiesRepository,
    pub stats: stats::StatsRepository,
}

impl Repository {
    /// Create a new repository with the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            books: books::BooksRepository::new(pool.clone()),
            authors: authors::AuthorsRepository::new(pool.clone()),
            categories: categories::CategoriesRepository::new(pool.clone()),
            users: users::UsersRepository::new(pool.clone()),
            loans: loans::LoansRepository::new(pool.clone()),
            fines: fines::FinesRepository::new(pool.clone()),
            activities: activities::ActivitiesRepository::new(pool.clone()),
            stats: stats::StatsRepository::new(pool.clone()),
            pool,
        }
    }
}
