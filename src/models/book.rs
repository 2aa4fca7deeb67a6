//! Book model and related types

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::{author::Author, category::Category};
use crate::error::{AppError, AppResult};

/// Book row from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Book {
    pub id: i32,
    pub isbn: String,
    pub title: String,
    pub description: Option<String>,
    pub publish_date: Option<NaiveDate>,
    pub publisher: Option<String>,
    pub available_quantity: i32,
    pub total_quantity: i32,
    pub category_id: Option<i32>,
    #[sqlx(rename = "is_deleted")]
    pub deleted: bool,
    /// Optimistic-lock counter, bumped on every write
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PartialEq for Book {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Book {}

impl Book {
    /// A copy can be lent out
    pub fn is_available(&self) -> bool {
        self.available_quantity > 0 && !self.deleted
    }

    /// Take one copy off the shelf
    pub fn decrease_available_quantity(&mut self) -> AppResult<()> {
        if self.available_quantity <= 0 {
            return Err(AppError::InvariantViolation(format!(
                "Book {} has no copies left to lend",
                self.id
            )));
        }
        self.available_quantity -= 1;
        Ok(())
    }

    /// Put one copy back on the shelf
    pub fn increase_available_quantity(&mut self) -> AppResult<()> {
        if self.available_quantity >= self.total_quantity {
            return Err(AppError::InvariantViolation(format!(
                "Book {} available quantity cannot exceed total quantity ({})",
                self.id, self.total_quantity
            )));
        }
        self.available_quantity += 1;
        Ok(())
    }

    /// Change the number of owned copies while `on_loan` of them are lent out.
    /// The shelf count becomes whatever is not on loan.
    pub fn set_total_quantity(&mut self, total: i32, on_loan: i64) -> AppResult<()> {
        let on_loan = i32::try_from(on_loan).unwrap_or(i32::MAX);
        if total < on_loan {
            return Err(AppError::Conflict(format!(
                "Book {} has {} copies on loan, total quantity cannot be {}",
                self.id, on_loan, total
            )));
        }
        self.total_quantity = total;
        self.available_quantity = total - on_loan;
        Ok(())
    }
}

/// Book with its category and authors resolved, as returned by the API
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BookDetails {
    pub id: i32,
    pub isbn: String,
    pub title: String,
    pub description: Option<String>,
    pub publish_date: Option<NaiveDate>,
    pub publisher: Option<String>,
    pub available_quantity: i32,
    pub total_quantity: i32,
    pub available: bool,
    pub category: Option<Category>,
    pub authors: Vec<Author>,
}

impl BookDetails {
    pub fn new(book: Book, category: Option<Category>, authors: Vec<Author>) -> Self {
        let available = book.is_available();
        Self {
            id: book.id,
            isbn: book.isbn,
            title: book.title,
            description: book.description,
            publish_date: book.publish_date,
            publisher: book.publisher,
            available_quantity: book.available_quantity,
            total_quantity: book.total_quantity,
            available,
            category,
            authors,
        }
    }
}

/// Create or update book request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct BookInput {
    #[validate(length(min = 1, max = 32, message = "ISBN is required"))]
    pub isbn: String,
    #[validate(length(min = 1, message = "Title is required"))]
    pub title: String,
    pub description: Option<String>,
    pub publish_date: Option<NaiveDate>,
    pub publisher: Option<String>,
    #[validate(range(min = 0, message = "Available quantity cannot be negative"))]
    pub available_quantity: i32,
    #[validate(range(min = 1, message = "Total quantity must be positive"))]
    pub total_quantity: i32,
    pub category_id: Option<i32>,
    pub author_ids: Option<Vec<i32>>,
}

impl BookInput {
    /// Quantities must satisfy `available <= total`
    pub fn check_quantities(&self) -> AppResult<()> {
        if self.available_quantity > self.total_quantity {
            return Err(AppError::Validation(
                "Available quantity cannot be greater than total quantity".to_string(),
            ));
        }
        Ok(())
    }
}

/// Title search parameters
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct TitleQuery {
    pub title: String,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// Book borrow count, used for "most borrowed" listings
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct BorrowedBook {
    pub id: i32,
    pub isbn: String,
    pub title: String,
    pub loan_count: i64,
}

#[cfg(test)]
pub mod fixtures {
    use super::*;

    pub fn book(id: i32, available: i32, total: i32) -> Book {
        let now = Utc::now();
        Book {
            id,
            isbn: format!("978-0-00-{:06}", id),
            title: format!("Book {}", id),
            description: None,
            publish_date: None,
            publisher: None,
            available_quantity: available,
            total_quantity: total,
            category_id: None,
            deleted: false,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }
}
