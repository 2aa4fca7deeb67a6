//! Book catalog service

use std::sync::Arc;

use validator::Validate;

use super::{
    activities::ActivityRecorder,
    cache::{keys, CacheService},
};
use crate::{
    error::{AppError, AppResult},
    models::{
        book::{Book, BookDetails, BookInput, BorrowedBook},
        ActivityType, NewActivity, PageQuery,
    },
    repository::{AuthorStore, CatalogStore, CategoryStore, Repository},
};

/// Stores the catalog reads from
#[derive(Clone)]
pub struct CatalogStores {
    pub books: Arc<dyn CatalogStore>,
    pub authors: Arc<dyn AuthorStore>,
    pub categories: Arc<dyn CategoryStore>,
}

impl CatalogStores {
    pub fn from_repository(repository: &Repository) -> Self {
        Self {
            books: Arc::new(repository.books.clone()),
            authors: Arc::new(repository.authors.clone()),
            categories: Arc::new(repository.categories.clone()),
        }
    }
}

#[derive(Clone)]
pub struct BooksService {
    books: Arc<dyn CatalogStore>,
    authors: Arc<dyn AuthorStore>,
    categories: Arc<dyn CategoryStore>,
    cache: CacheService,
    activities: ActivityRecorder,
}

impl BooksService {
    pub fn new(stores: CatalogStores, cache: CacheService, activities: ActivityRecorder) -> Self {
        Self {
            books: stores.books,
            authors: stores.authors,
            categories: stores.categories,
            cache,
            activities,
        }
    }

    /// Get book details by ID (cached)
    pub async fn get_book(&self, id: i32) -> AppResult<BookDetails> {
        let key = keys::book(id);
        if let Some(details) = self.cache.get::<BookDetails>(&key).await {
            return Ok(details);
        }

        let book = self.books.get_by_id(id).await?;
        let details = self.details(book).await?;
        self.cache.put(&key, &details).await;
        Ok(details)
    }

    pub async fn get_by_isbn(&self, isbn: &str) -> AppResult<BookDetails> {
        let book = self
            .books
            .get_by_isbn(isbn)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with ISBN {} not found", isbn)))?;
        self.details(book).await
    }

    pub async fn list_books(&self, page: &PageQuery) -> AppResult<(Vec<BookDetails>, i64)> {
        let (books, total) = self.books.list(page).await?;
        Ok((self.details_all(books).await?, total))
    }

    pub async fn search_by_title(&self, title: &str, page: &PageQuery) -> AppResult<(Vec<BookDetails>, i64)> {
        let (books, total) = self.books.search_by_title(title, page).await?;
        Ok((self.details_all(books).await?, total))
    }

    pub async fn list_by_author(&self, author_id: i32, page: &PageQuery) -> AppResult<(Vec<BookDetails>, i64)> {
        self.authors.get_by_id(author_id).await?;
        let (books, total) = self.books.list_by_author(author_id, page).await?;
        Ok((self.details_all(books).await?, total))
    }

    pub async fn list_by_category(&self, category_id: i32, page: &PageQuery) -> AppResult<(Vec<BookDetails>, i64)> {
        self.categories.get_by_id(category_id).await?;
        let (books, total) = self.books.list_by_category(category_id, page).await?;
        Ok((self.details_all(books).await?, total))
    }

    pub async fn most_borrowed(&self, limit: i64) -> AppResult<Vec<BorrowedBook>> {
        self.books.most_borrowed(limit.clamp(1, 100)).await
    }

    /// Add a book to the catalog
    pub async fn create_book(&self, input: BookInput) -> AppResult<BookDetails> {
        input.validate()?;
        input.check_quantities()?;

        if self.books.isbn_exists(&input.isbn, None).await? {
            return Err(AppError::Conflict(format!(
                "A book with ISBN {} already exists",
                input.isbn
            )));
        }
        self.check_references(&input).await?;

        let book = self.books.create(&input).await?;
        tracing::info!("Book {} created: {}", book.id, book.title);

        self.activities
            .record(
                NewActivity::new(ActivityType::BookCreated, format!("New book added: {}", book.title))
                    .book(&book.title),
            )
            .await;
        self.cache.invalidate(&keys::statistics()).await;

        self.details(book).await
    }

    /// Replace a book's fields, category and (when given) its author set.
    ///
    /// The shelf count is derived from the new total and the copies currently
    /// on loan; a loan taken in between bumps the row version and the write
    /// fails with `Conflict`.
    pub async fn update_book(&self, id: i32, input: BookInput) -> AppResult<BookDetails> {
        input.validate()?;
        input.check_quantities()?;

        let mut book = self.books.get_by_id(id).await?;

        if self.books.isbn_exists(&input.isbn, Some(id)).await? {
            return Err(AppError::Conflict(format!(
                "A book with ISBN {} already exists",
                input.isbn
            )));
        }
        self.check_references(&input).await?;

        let on_loan = self.books.count_active_loans(id).await?;
        book.set_total_quantity(input.total_quantity, on_loan)?;
        if book.available_quantity != input.available_quantity {
            tracing::debug!(
                "Book {} available quantity set to {} ({} on loan)",
                id,
                book.available_quantity,
                on_loan
            );
        }

        book.isbn = input.isbn;
        book.title = input.title;
        book.description = input.description;
        book.publish_date = input.publish_date;
        book.publisher = input.publisher;
        book.category_id = input.category_id;

        let saved = self.books.update(&book, input.author_ids).await?;
        self.cache.invalidate(&keys::for_book(id)).await;

        self.details(saved).await
    }

    /// Soft delete
    pub async fn delete_book(&self, id: i32) -> AppResult<()> {
        self.books.delete(id).await?;
        tracing::info!("Book {} deleted", id);
        self.cache.invalidate(&keys::for_book(id)).await;
        Ok(())
    }

    async fn check_references(&self, input: &BookInput) -> AppResult<()> {
        if let Some(category_id) = input.category_id {
            self.categories.get_by_id(category_id).await?;
        }

        if let Some(ref author_ids) = input.author_ids {
            let mut ids = author_ids.clone();
            ids.sort_unstable();
            ids.dedup();
            let found = self.authors.count_existing(&ids).await?;
            if found != ids.len() as i64 {
                return Err(AppError::NotFound("One or more authors not found".to_string()));
            }
        }

        Ok(())
    }

    async fn details(&self, book: Book) -> AppResult<BookDetails> {
        let category = match book.category_id {
            Some(category_id) => self.categories.find_by_id(category_id).await?,
            None => None,
        };
        let authors = self.books.authors_of(book.id).await?;
        Ok(BookDetails::new(book, category, authors))
    }

    async fn details_all(&self, books: Vec<Book>) -> AppResult<Vec<BookDetails>> {
        let mut result = Vec::with_capacity(books.len());
        for book in books {
            result.push(self.details(book).await?);
        }
        Ok(result)
    }
}
