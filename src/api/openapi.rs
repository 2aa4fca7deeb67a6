//! OpenAPI documentation

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{auth, authors, books, categories, dashboard, fines, health, loans, users};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Library API",
        version = "1.0.0",
        description = "Book lending and catalog management REST API",
        license(name = "MIT")
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Auth
        auth::login,
        auth::register,
        auth::me,
        // Books
        books::list_books,
        books::get_book,
        books::get_book_by_isbn,
        books::search_by_title,
        books::search_by_author,
        books::search_by_category,
        books::most_borrowed,
        books::create_book,
        books::update_book,
        books::delete_book,
        // Authors
        authors::list_authors,
        authors::get_author,
        authors::search_authors,
        authors::author_books,
        authors::create_author,
        authors::update_author,
        authors::delete_author,
        // Categories
        categories::list_categories,
        categories::get_category,
        categories::get_category_by_name,
        categories::create_category,
        categories::update_category,
        categories::delete_category,
        // Users
        users::list_users,
        users::get_current_user,
        users::get_user,
        users::create_user,
        users::update_user,
        users::delete_user,
        users::get_user_loans,
        users::get_user_fines,
        // Loans
        loans::list_loans,
        loans::overdue_loans,
        loans::get_loan,
        loans::create_loan,
        loans::return_loan,
        loans::renew_loan,
        // Fines
        fines::pay_fine,
        // Dashboard
        dashboard::get_dashboard,
        dashboard::get_loan_statistics,
        dashboard::get_user_statistics,
    ),
    components(
        schemas(
            // Auth
            auth::LoginRequest,
            auth::LoginResponse,
            // Books
            crate::models::book::BookDetails,
            crate::models::book::BookInput,
            crate::models::book::BorrowedBook,
            crate::models::author::Author,
            crate::models::author::AuthorInput,
            crate::models::category::Category,
            crate::models::category::CategoryInput,
            // Users
            crate::models::user::Role,
            crate::models::user::UserDetails,
            crate::models::user::CreateUser,
            crate::models::user::UpdateUser,
            crate::models::user::RegisterUser,
            users::UserFines,
            // Loans
            crate::models::loan::LoanStatus,
            crate::models::loan::LoanDetails,
            crate::models::loan::CreateLoan,
            crate::models::fine::Fine,
            // Dashboard
            crate::models::activity::Activity,
            crate::models::stats::DashboardData,
            crate::models::stats::CategoryStatistics,
            crate::models::stats::LoanStatistics,
            crate::models::stats::MonthlyLoanCount,
            crate::models::stats::UserStatistics,
            crate::models::stats::UserLoanCount,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "auth", description = "Authentication endpoints"),
        (name = "books", description = "Book catalog"),
        (name = "authors", description = "Author management"),
        (name = "categories", description = "Category management"),
        (name = "users", description = "User management"),
        (name = "loans", description = "Loan lifecycle"),
        (name = "fines", description = "Late-return fines"),
        (name = "dashboard", description = "Statistics")
    )
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
