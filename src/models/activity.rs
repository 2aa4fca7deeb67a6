//! Activity feed entries shown on the dashboard

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityType {
    Loan,
    Return,
    Renewal,
    FinePaid,
    BookCreated,
    UserCreated,
    UserUpdated,
    UserDeleted,
}

impl ActivityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityType::Loan => "LOAN",
            ActivityType::Return => "RETURN",
            ActivityType::Renewal => "RENEWAL",
            ActivityType::FinePaid => "FINE_PAID",
            ActivityType::BookCreated => "NEW_BOOK",
            ActivityType::UserCreated => "USER_CREATED",
            ActivityType::UserUpdated => "USER_UPDATED",
            ActivityType::UserDeleted => "USER_DELETED",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Activity {
    pub id: i64,
    pub activity_type: String,
    pub description: String,
    pub timestamp: DateTime<Utc>,
    pub user_name: Option<String>,
    pub book_title: Option<String>,
}

/// Activity about to be recorded
#[derive(Debug, Clone)]
pub struct NewActivity {
    pub activity_type: ActivityType,
    pub description: String,
    pub user_name: Option<String>,
    pub book_title: Option<String>,
}

impl NewActivity {
    pub fn new(activity_type: ActivityType, description: impl Into<String>) -> Self {
        Self {
            activity_type,
            description: description.into(),
            user_name: None,
            book_title: None,
        }
    }

    pub fn user(mut self, name: impl Into<String>) -> Self {
        self.user_name = Some(name.into());
        self
    }

    pub fn book(mut self, title: impl Into<String>) -> Self {
        self.book_title = Some(title.into());
        self
    }
}
