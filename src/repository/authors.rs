//! Authors repository for database operations

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use super::AuthorStore;
use crate::{
    error::{AppError, AppResult},
    models::{
        author::{Author, AuthorInput},
        PageQuery,
    },
};

#[derive(Clone)]
pub struct AuthorsRepository {
    pool: Pool<Postgres>,
}

impl AuthorsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuthorStore for AuthorsRepository {
    /// Get author by ID
    async fn get_by_id(&self, id: i32) -> AppResult<Author> {
        sqlx::query_as::<_, Author>("SELECT * FROM authors WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Author with id {} not found", id)))
    }

    /// Number of the given ids that exist
    async fn count_existing(&self, ids: &[i32]) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM authors WHERE id = ANY($1)")
            .bind(ids)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn list(&self, page: &PageQuery) -> AppResult<(Vec<Author>, i64)> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM authors")
            .fetch_one(&self.pool)
            .await?;

        let authors = sqlx::query_as::<_, Author>("SELECT * FROM authors ORDER BY name, id LIMIT $1 OFFSET $2")
            .bind(page.per_page())
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await?;

        Ok((authors, total))
    }

    /// Case-insensitive name search
    async fn search_by_name(&self, name: &str, page: &PageQuery) -> AppResult<(Vec<Author>, i64)> {
        let pattern = format!("%{}%", name.to_lowercase());

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM authors WHERE LOWER(name) LIKE $1")
            .bind(&pattern)
            .fetch_one(&self.pool)
            .await?;

        let authors = sqlx::query_as::<_, Author>(
            "SELECT * FROM authors WHERE LOWER(name) LIKE $1 ORDER BY name, id LIMIT $2 OFFSET $3",
        )
        .bind(&pattern)
        .bind(page.per_page())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok((authors, total))
    }

    async fn create(&self, input: &AuthorInput) -> AppResult<Author> {
        let author = sqlx::query_as::<_, Author>(
            "INSERT INTO authors (name, biography, birth_date) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(&input.name)
        .bind(&input.biography)
        .bind(input.birth_date)
        .fetch_one(&self.pool)
        .await?;
        Ok(author)
    }

    async fn update(&self, id: i32, input: &AuthorInput) -> AppResult<Author> {
        sqlx::query_as::<_, Author>(
            "UPDATE authors SET name = $2, biography = $3, birth_date = $4 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(&input.name)
        .bind(&input.biography)
        .bind(input.birth_date)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Author with id {} not found", id)))
    }

    /// Whether any book, deleted or not, is linked to the author
    async fn has_books(&self, id: i32) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM book_author WHERE author_id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    async fn delete(&self, id: i32) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM authors WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Author with id {} not found", id)));
        }

        Ok(())
    }
}
