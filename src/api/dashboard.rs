//! Dashboard statistics endpoints

use axum::{extract::State, Json};

use crate::{
    error::AppResult,
    models::stats::{DashboardData, LoanStatistics, UserStatistics},
};

use super::AuthenticatedUser;

/// Library overview
#[utoipa::path(
    get,
    path = "/dashboard",
    tag = "dashboard",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Dashboard summary", body = DashboardData),
        (status = 403, description = "Librarian privileges required", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_dashboard(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<DashboardData>> {
    claims.require_staff()?;

    let data = state.services.dashboard.dashboard().await?;
    Ok(Json(data))
}

/// Loan statistics
#[utoipa::path(
    get,
    path = "/dashboard/loans",
    tag = "dashboard",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Loan statistics", body = LoanStatistics)
    )
)]
pub async fn get_loan_statistics(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<LoanStatistics>> {
    claims.require_staff()?;

    let stats = state.services.dashboard.loan_statistics().await?;
    Ok(Json(stats))
}

/// User statistics
#[utoipa::path(
    get,
    path = "/dashboard/users",
    tag = "dashboard",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "User statistics", body = UserStatistics)
    )
)]
pub async fn get_user_statistics(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<UserStatistics>> {
    claims.require_staff()?;

    let stats = state.services.dashboard.user_statistics().await?;
    Ok(Json(stats))
}
