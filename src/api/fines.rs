//! Fine endpoints

use axum::{
    extract::{Path, State},
    Json,
};

use crate::{error::AppResult, models::fine::Fine};

use super::AuthenticatedUser;

/// Record payment of a fine
#[utoipa::path(
    post,
    path = "/fines/{id}/pay",
    tag = "fines",
    security(("bearer_auth" = [])),
    params(("id" = i64, Path, description = "Fine ID")),
    responses(
        (status = 200, description = "Fine paid", body = Fine),
        (status = 400, description = "Fine already paid", body = crate::error::ErrorResponse),
        (status = 404, description = "Fine not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn pay_fine(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i64>,
) -> AppResult<Json<Fine>> {
    claims.require_staff()?;

    let fine = state.services.loans.pay_fine(id).await?;
    Ok(Json(fine))
}
