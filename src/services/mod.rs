//! Business logic services

pub mod activities;
pub mod authors;
pub mod books;
pub mod cache;
pub mod categories;
pub mod dashboard;
pub mod loans;
pub mod redis;
pub mod users;

use std::sync::Arc;

use crate::{
    clock::Clock,
    config::{AuthConfig, LoanPolicy},
    repository::Repository,
};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub books: books::BooksService,
    pub authors: authors::AuthorsService,
    pub categories: categories::CategoriesService,
    pub users: users::UsersService,
    pub loans: loans::LoansService,
    pub dashboard: dashboard::DashboardService,
}

impl Services {
    /// Create all services with the given repository
    pub fn new(
        repository: Repository,
        auth_config: AuthConfig,
        loan_policy: LoanPolicy,
        cache: cache::CacheService,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let activities = activities::ActivityRecorder::new(Arc::new(repository.activities.clone()));

        Self {
            books: books::BooksService::new(
                books::CatalogStores::from_repository(&repository),
                cache.clone(),
                activities.clone(),
            ),
            authors: authors::AuthorsService::new(Arc::new(repository.authors.clone())),
            categories: categories::CategoriesService::new(Arc::new(repository.categories.clone())),
            users: users::UsersService::new(
                Arc::new(repository.users.clone()),
                auth_config,
                cache.clone(),
                activities,
            ),
            loans: loans::LoansService::new(
                loans::LoanStores::from_repository(&repository),
                clock.clone(),
                cache.clone(),
                loan_policy,
            ),
            dashboard: dashboard::DashboardService::new(repository, cache, clock),
        }
    }
}
