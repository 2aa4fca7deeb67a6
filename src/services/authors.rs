//! Author management service

use std::sync::Arc;

use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::{
        author::{Author, AuthorInput},
        PageQuery,
    },
    repository::AuthorStore,
};

#[derive(Clone)]
pub struct AuthorsService {
    authors: Arc<dyn AuthorStore>,
}

impl AuthorsService {
    pub fn new(authors: Arc<dyn AuthorStore>) -> Self {
        Self { authors }
    }

    pub async fn get_author(&self, id: i32) -> AppResult<Author> {
        self.authors.get_by_id(id).await
    }

    pub async fn list_authors(&self, page: &PageQuery) -> AppResult<(Vec<Author>, i64)> {
        self.authors.list(page).await
    }

    pub async fn search_by_name(&self, name: &str, page: &PageQuery) -> AppResult<(Vec<Author>, i64)> {
        self.authors.search_by_name(name, page).await
    }

    pub async fn create_author(&self, input: AuthorInput) -> AppResult<Author> {
        input.validate()?;
        let author = self.authors.create(&input).await?;
        tracing::info!("Author {} created: {}", author.id, author.name);
        Ok(author)
    }

    pub async fn update_author(&self, id: i32, input: AuthorInput) -> AppResult<Author> {
        input.validate()?;
        self.authors.update(id, &input).await
    }

    /// Delete an author that no book references
    pub async fn delete_author(&self, id: i32) -> AppResult<()> {
        self.authors.get_by_id(id).await?;
        if self.authors.has_books(id).await? {
            return Err(AppError::Conflict(format!(
                "Author {} has books and cannot be deleted",
                id
            )));
        }
        self.authors.delete(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MockAuthorStore;

    fn author(id: i32) -> Author {
        Author {
            id,
            name: format!("Author {}", id),
            biography: None,
            birth_date: None,
        }
    }

    #[tokio::test]
    async fn test_author_with_books_is_kept() {
        let mut authors = MockAuthorStore::new();
        authors.expect_get_by_id().returning(|id| Ok(author(id)));
        authors
            .expect_has_books()
            .withf(|id| *id == 3)
            .returning(|_| Ok(true));
        authors.expect_delete().never();

        let service = AuthorsService::new(Arc::new(authors));
        assert!(matches!(
            service.delete_author(3).await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_unreferenced_author_is_deleted() {
        let mut authors = MockAuthorStore::new();
        authors.expect_get_by_id().returning(|id| Ok(author(id)));
        authors.expect_has_books().returning(|_| Ok(false));
        authors.expect_delete().times(1).returning(|_| Ok(()));

        let service = AuthorsService::new(Arc::new(authors));
        service.delete_author(3).await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_missing_author() {
        let mut authors = MockAuthorStore::new();
        authors
            .expect_get_by_id()
            .returning(|id| Err(AppError::NotFound(format!("Author with id {} not found", id))));
        authors.expect_has_books().never();

        let service = AuthorsService::new(Arc::new(authors));
        assert!(matches!(
            service.delete_author(3).await,
            Err(AppError::NotFound(_))
        ));
    }
}
