//! Loan management endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::{
        loan::{CreateLoan, LoanDetails},
        PageQuery,
    },
};

use super::{AuthenticatedUser, PaginatedResponse};

/// List all loans
#[utoipa::path(
    get,
    path = "/loans",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(PageQuery),
    responses(
        (status = 200, description = "List of loans", body = PaginatedResponse<LoanDetails>),
        (status = 403, description = "Librarian privileges required", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_loans(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(page): Query<PageQuery>,
) -> AppResult<Json<PaginatedResponse<LoanDetails>>> {
    claims.require_staff()?;

    let (loans, total) = state.services.loans.list_loans(&page).await?;
    Ok(Json(PaginatedResponse::new(loans, total, &page)))
}

/// Active loans past their due date
#[utoipa::path(
    get,
    path = "/loans/overdue",
    tag = "loans",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Overdue loans", body = Vec<LoanDetails>),
        (status = 403, description = "Librarian privileges required", body = crate::error::ErrorResponse)
    )
)]
pub async fn overdue_loans(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<LoanDetails>>> {
    claims.require_staff()?;

    let loans = state.services.loans.find_overdue_loans().await?;
    Ok(Json(loans))
}

/// Get loan by ID
#[utoipa::path(
    get,
    path = "/loans/{id}",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Loan ID")),
    responses(
        (status = 200, description = "Loan details", body = LoanDetails),
        (status = 404, description = "Loan not found, or not the caller's", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_loan(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<LoanDetails>> {
    let loan = state.services.loans.get_loan_for(id, &claims).await?;
    Ok(Json(loan))
}

/// Lend a book to a user
#[utoipa::path(
    post,
    path = "/loans",
    tag = "loans",
    security(("bearer_auth" = [])),
    request_body = CreateLoan,
    responses(
        (status = 201, description = "Loan created", body = LoanDetails),
        (status = 400, description = "No copies available or unpaid fines", body = crate::error::ErrorResponse),
        (status = 404, description = "User or book not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Concurrent modification", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_loan(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<CreateLoan>,
) -> AppResult<(StatusCode, Json<LoanDetails>)> {
    claims.require_staff()?;

    let loan = state
        .services
        .loans
        .create_loan(request.user_id, request.book_id)
        .await?;
    Ok((StatusCode::CREATED, Json(loan)))
}

/// Return a borrowed book
#[utoipa::path(
    put,
    path = "/loans/{id}/return",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Loan ID")),
    responses(
        (status = 200, description = "Book returned", body = LoanDetails),
        (status = 400, description = "Loan is not active", body = crate::error::ErrorResponse),
        (status = 404, description = "Loan not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn return_loan(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<LoanDetails>> {
    claims.require_staff()?;

    let loan = state.services.loans.return_loan(id).await?;
    Ok(Json(loan))
}

/// Extend the due date of a loan
#[utoipa::path(
    put,
    path = "/loans/{id}/renew",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Loan ID")),
    responses(
        (status = 200, description = "Loan renewed", body = LoanDetails),
        (status = 400, description = "Loan is overdue, returned or at its renewal limit", body = crate::error::ErrorResponse),
        (status = 404, description = "Loan not found, or not the caller's", body = crate::error::ErrorResponse)
    )
)]
pub async fn renew_loan(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<LoanDetails>> {
    if !claims.is_staff() {
        state.services.loans.get_loan_for(id, &claims).await?;
    }

    let loan = state.services.loans.renew_loan(id).await?;
    Ok(Json(loan))
}
