//! Category management service

use std::sync::Arc;

use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::category::{Category, CategoryInput},
    repository::CategoryStore,
};

#[derive(Clone)]
pub struct CategoriesService {
    categories: Arc<dyn CategoryStore>,
}

impl CategoriesService {
    pub fn new(categories: Arc<dyn CategoryStore>) -> Self {
        Self { categories }
    }

    pub async fn get_category(&self, id: i32) -> AppResult<Category> {
        self.categories.get_by_id(id).await
    }

    pub async fn get_by_name(&self, name: &str) -> AppResult<Category> {
        self.categories.get_by_name(name).await
    }

    pub async fn list_categories(&self) -> AppResult<Vec<Category>> {
        self.categories.list().await
    }

    pub async fn create_category(&self, input: CategoryInput) -> AppResult<Category> {
        input.validate()?;
        if self.categories.name_exists(&input.name, None).await? {
            return Err(AppError::Conflict(format!(
                "Category '{}' already exists",
                input.name
            )));
        }
        self.categories.create(&input).await
    }

    pub async fn update_category(&self, id: i32, input: CategoryInput) -> AppResult<Category> {
        input.validate()?;
        self.categories.get_by_id(id).await?;
        if self.categories.name_exists(&input.name, Some(id)).await? {
            return Err(AppError::Conflict(format!(
                "Category '{}' already exists",
                input.name
            )));
        }
        self.categories.update(id, &input).await
    }

    /// Delete a category no book uses
    pub async fn delete_category(&self, id: i32) -> AppResult<()> {
        self.categories.get_by_id(id).await?;
        if self.categories.in_use(id).await? {
            return Err(AppError::Conflict(format!(
                "Category {} is used by books and cannot be deleted",
                id
            )));
        }
        self.categories.delete(id).await
    }
}
