//! Author model

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Author {
    pub id: i32,
    pub name: String,
    pub biography: Option<String>,
    pub birth_date: Option<NaiveDate>,
}

impl PartialEq for Author {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

/// Create or update author request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AuthorInput {
    #[validate(length(min = 1, message = "Author name is required"))]
    pub name: String,
    pub biography: Option<String>,
    pub birth_date: Option<NaiveDate>,
}

/// Author name search
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct AuthorQuery {
    pub name: String,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}
