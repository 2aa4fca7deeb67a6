//! User management endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::AppResult,
    models::{
        fine::Fine,
        loan::LoanDetails,
        user::{CreateUser, UpdateUser, UserDetails},
        PageQuery,
    },
};

use super::{AuthenticatedUser, PaginatedResponse};

/// Unpaid fines of a user with their total
#[derive(Serialize, ToSchema)]
pub struct UserFines {
    pub user_id: i32,
    pub total_unpaid: Decimal,
    pub fines: Vec<Fine>,
}

/// List users
#[utoipa::path(
    get,
    path = "/users",
    tag = "users",
    security(("bearer_auth" = [])),
    params(PageQuery),
    responses(
        (status = 200, description = "List of users", body = PaginatedResponse<UserDetails>),
        (status = 403, description = "Librarian privileges required", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_users(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(page): Query<PageQuery>,
) -> AppResult<Json<PaginatedResponse<UserDetails>>> {
    claims.require_staff()?;

    let (users, total) = state.services.users.list_users(&page).await?;
    let users = users.into_iter().map(UserDetails::from).collect();
    Ok(Json(PaginatedResponse::new(users, total, &page)))
}

/// Profile of the authenticated user
#[utoipa::path(
    get,
    path = "/users/me",
    tag = "users",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Current user", body = UserDetails)
    )
)]
pub async fn get_current_user(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<UserDetails>> {
    let user = state.services.users.get_user(claims.user_id).await?;
    Ok(Json(user.into()))
}

/// Get user by ID
#[utoipa::path(
    get,
    path = "/users/{id}",
    tag = "users",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "User ID")),
    responses(
        (status = 200, description = "User details", body = UserDetails),
        (status = 403, description = "Access denied", body = crate::error::ErrorResponse),
        (status = 404, description = "User not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_user(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<UserDetails>> {
    claims.require_self_or_staff(id)?;

    let user = state.services.users.get_user(id).await?;
    Ok(Json(user.into()))
}

/// Create a user with any role
#[utoipa::path(
    post,
    path = "/users",
    tag = "users",
    security(("bearer_auth" = [])),
    request_body = CreateUser,
    responses(
        (status = 201, description = "User created", body = UserDetails),
        (status = 400, description = "Invalid input", body = crate::error::ErrorResponse),
        (status = 403, description = "Administrator privileges required", body = crate::error::ErrorResponse),
        (status = 409, description = "Email already exists", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_user(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(input): Json<CreateUser>,
) -> AppResult<(StatusCode, Json<UserDetails>)> {
    claims.require_admin()?;

    let user = state.services.users.create_user(input).await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

/// Update a user
#[utoipa::path(
    put,
    path = "/users/{id}",
    tag = "users",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "User ID")),
    request_body = UpdateUser,
    responses(
        (status = 200, description = "User updated", body = UserDetails),
        (status = 403, description = "Access denied", body = crate::error::ErrorResponse),
        (status = 404, description = "User not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Email already exists", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_user(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(input): Json<UpdateUser>,
) -> AppResult<Json<UserDetails>> {
    claims.require_self_or_staff(id)?;
    claims.require_role_change(input.role)?;

    let user = state.services.users.update_user(id, input).await?;
    Ok(Json(user.into()))
}

/// Delete a user (soft delete)
#[utoipa::path(
    delete,
    path = "/users/{id}",
    tag = "users",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "User ID")),
    responses(
        (status = 204, description = "User deleted"),
        (status = 404, description = "User not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_user(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    claims.require_admin()?;

    state.services.users.delete_user(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Loans of a user
#[utoipa::path(
    get,
    path = "/users/{id}/loans",
    tag = "users",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "User ID"), PageQuery),
    responses(
        (status = 200, description = "User's loans", body = PaginatedResponse<LoanDetails>),
        (status = 404, description = "User not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_user_loans(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Query(page): Query<PageQuery>,
) -> AppResult<Json<PaginatedResponse<LoanDetails>>> {
    claims.require_self_or_staff(id)?;

    let (loans, total) = state.services.loans.list_user_loans(id, &page).await?;
    Ok(Json(PaginatedResponse::new(loans, total, &page)))
}

/// Unpaid fines of a user
#[utoipa::path(
    get,
    path = "/users/{id}/fines",
    tag = "users",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "User ID")),
    responses(
        (status = 200, description = "Unpaid fines", body = UserFines),
        (status = 404, description = "User not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_user_fines(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<UserFines>> {
    claims.require_self_or_staff(id)?;

    let fines = state.services.loans.unpaid_fines(id).await?;
    let total_unpaid = state.services.loans.total_unpaid_fines(id).await?;

    Ok(Json(UserFines {
        user_id: id,
        total_unpaid,
        fines,
    }))
}
