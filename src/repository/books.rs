//! Books repository for database operations

use async_trait::async_trait;
use sqlx::{PgConnection, Pool, Postgres};

use super::{BookStore, CatalogStore};
use crate::{
    error::{AppError, AppResult},
    models::{
        author::Author,
        book::{Book, BookInput, BorrowedBook},
        LoanStatus, PageQuery,
    },
};

#[derive(Clone)]
pub struct BooksRepository {
    pool: Pool<Postgres>,
}

/// Version-checked write of a book row. A stale `version` means someone else
/// wrote the row first.
pub(crate) async fn write_book(conn: &mut PgConnection, book: &Book) -> AppResult<Book> {
    sqlx::query_as::<_, Book>(
        r#"
        UPDATE books SET
            isbn = $2, title = $3, description = $4, publish_date = $5, publisher = $6,
            available_quantity = $7, total_quantity = $8, category_id = $9, is_deleted = $10,
            version = version + 1, updated_at = NOW()
        WHERE id = $1 AND version = $11
        RETURNING *
        "#,
    )
    .bind(book.id)
    .bind(&book.isbn)
    .bind(&book.title)
    .bind(&book.description)
    .bind(book.publish_date)
    .bind(&book.publisher)
    .bind(book.available_quantity)
    .bind(book.total_quantity)
    .bind(book.category_id)
    .bind(book.deleted)
    .bind(book.version)
    .fetch_optional(conn)
    .await
    .map_err(|e| AppError::from_unique_violation(e, "A book with this ISBN already exists"))?
    .ok_or_else(|| {
        AppError::Conflict(format!("Book {} was modified concurrently, please retry", book.id))
    })
}

async fn replace_authors(conn: &mut PgConnection, book_id: i32, author_ids: &[i32]) -> AppResult<()> {
    sqlx::query("DELETE FROM book_author WHERE book_id = $1")
        .bind(book_id)
        .execute(&mut *conn)
        .await?;

    sqlx::query(
        "INSERT INTO book_author (book_id, author_id) SELECT $1, UNNEST($2::int[]) ON CONFLICT DO NOTHING",
    )
    .bind(book_id)
    .bind(author_ids)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

impl BooksRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CatalogStore for BooksRepository {
    /// Get a non-deleted book by ID
    async fn get_by_id(&self, id: i32) -> AppResult<Book> {
        sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1 AND is_deleted = FALSE")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    async fn get_by_isbn(&self, isbn: &str) -> AppResult<Option<Book>> {
        BookStore::find_by_isbn(self, isbn).await
    }

    async fn isbn_exists(&self, isbn: &str, exclude_id: Option<i32>) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM books WHERE isbn = $1 AND ($2::int IS NULL OR id != $2))",
        )
        .bind(isbn)
        .bind(exclude_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    /// List non-deleted books
    async fn list(&self, page: &PageQuery) -> AppResult<(Vec<Book>, i64)> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM books WHERE is_deleted = FALSE")
            .fetch_one(&self.pool)
            .await?;

        let books = sqlx::query_as::<_, Book>(
            "SELECT * FROM books WHERE is_deleted = FALSE ORDER BY title, id LIMIT $1 OFFSET $2",
        )
        .bind(page.per_page())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok((books, total))
    }

    /// Case-insensitive title search
    async fn search_by_title(&self, title: &str, page: &PageQuery) -> AppResult<(Vec<Book>, i64)> {
        let pattern = format!("%{}%", title.to_lowercase());

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM books WHERE is_deleted = FALSE AND LOWER(title) LIKE $1",
        )
        .bind(&pattern)
        .fetch_one(&self.pool)
        .await?;

        let books = sqlx::query_as::<_, Book>(
            r#"
            SELECT * FROM books
            WHERE is_deleted = FALSE AND LOWER(title) LIKE $1
            ORDER BY title, id
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(&pattern)
        .bind(page.per_page())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok((books, total))
    }

    async fn list_by_author(&self, author_id: i32, page: &PageQuery) -> AppResult<(Vec<Book>, i64)> {
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM books b
            JOIN book_author ba ON ba.book_id = b.id
            WHERE ba.author_id = $1 AND b.is_deleted = FALSE
            "#,
        )
        .bind(author_id)
        .fetch_one(&self.pool)
        .await?;

        let books = sqlx::query_as::<_, Book>(
            r#"
            SELECT b.* FROM books b
            JOIN book_author ba ON ba.book_id = b.id
            WHERE ba.author_id = $1 AND b.is_deleted = FALSE
            ORDER BY b.title, b.id
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(author_id)
        .bind(page.per_page())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok((books, total))
    }

    async fn list_by_category(&self, category_id: i32, page: &PageQuery) -> AppResult<(Vec<Book>, i64)> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM books WHERE category_id = $1 AND is_deleted = FALSE",
        )
        .bind(category_id)
        .fetch_one(&self.pool)
        .await?;

        let books = sqlx::query_as::<_, Book>(
            r#"
            SELECT * FROM books
            WHERE category_id = $1 AND is_deleted = FALSE
            ORDER BY title, id
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(category_id)
        .bind(page.per_page())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok((books, total))
    }

    /// Authors linked to a book
    async fn authors_of(&self, book_id: i32) -> AppResult<Vec<Author>> {
        let authors = sqlx::query_as::<_, Author>(
            r#"
            SELECT a.* FROM authors a
            JOIN book_author ba ON ba.author_id = a.id
            WHERE ba.book_id = $1
            ORDER BY a.name
            "#,
        )
        .bind(book_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(authors)
    }

    async fn count_active_loans(&self, book_id: i32) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM loans WHERE book_id = $1 AND status = $2")
            .bind(book_id)
            .bind(LoanStatus::Active)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Insert a book and link its authors
    async fn create(&self, input: &BookInput) -> AppResult<Book> {
        let mut tx = self.pool.begin().await?;

        let book = sqlx::query_as::<_, Book>(
            r#"
            INSERT INTO books (
                isbn, title, description, publish_date, publisher,
                available_quantity, total_quantity, category_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(&input.isbn)
        .bind(&input.title)
        .bind(&input.description)
        .bind(input.publish_date)
        .bind(&input.publisher)
        .bind(input.available_quantity)
        .bind(input.total_quantity)
        .bind(input.category_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::from_unique_violation(e, "A book with this ISBN already exists"))?;

        if let Some(ref author_ids) = input.author_ids {
            replace_authors(&mut tx, book.id, author_ids).await?;
        }

        tx.commit().await?;
        Ok(book)
    }

    /// Write a book and, when given, replace its author links in one transaction
    async fn update(&self, book: &Book, author_ids: Option<Vec<i32>>) -> AppResult<Book> {
        let mut tx = self.pool.begin().await?;
        let saved = write_book(&mut tx, book).await?;
        if let Some(ref author_ids) = author_ids {
            replace_authors(&mut tx, book.id, author_ids).await?;
        }
        tx.commit().await?;
        Ok(saved)
    }

    /// Soft delete
    async fn delete(&self, id: i32) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE books SET is_deleted = TRUE, version = version + 1, updated_at = NOW() WHERE id = $1 AND is_deleted = FALSE",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Book with id {} not found", id)));
        }

        Ok(())
    }

    /// Books with the most loans, all time
    async fn most_borrowed(&self, limit: i64) -> AppResult<Vec<BorrowedBook>> {
        let books = sqlx::query_as::<_, BorrowedBook>(
            r#"
            SELECT b.id, b.isbn, b.title, COUNT(l.id) AS loan_count
            FROM books b
            JOIN loans l ON l.book_id = b.id
            WHERE b.is_deleted = FALSE
            GROUP BY b.id, b.isbn, b.title
            ORDER BY loan_count DESC, b.title
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(books)
    }
}

#[async_trait]
impl BookStore for BooksRepository {
    async fn find_by_id(&self, id: i32) -> AppResult<Option<Book>> {
        let book = sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(book)
    }

    async fn find_by_isbn(&self, isbn: &str) -> AppResult<Option<Book>> {
        let book = sqlx::query_as::<_, Book>("SELECT * FROM books WHERE isbn = $1 AND is_deleted = FALSE")
            .bind(isbn)
            .fetch_optional(&self.pool)
            .await?;
        Ok(book)
    }

    async fn save(&self, book: &Book) -> AppResult<Book> {
        let mut conn = self.pool.acquire().await?;
        write_book(&mut conn, book).await
    }
}
