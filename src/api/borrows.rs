//! Circulation endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::{
    error::AppResult,
    models::borrow::{BorrowQuery, BorrowView},
};

use super::AuthenticatedUser;

/// Claim request
#[derive(Deserialize, ToSchema)]
pub struct ClaimBorrowRequest {
    pub book_id: i32,
    /// Copy number within the book, required when several copies are free
    pub copy_no: Option<i32>,
    /// Defaults to today plus the configured loan period
    pub due_date: Option<NaiveDate>,
    /// Borrower, administrators only; defaults to the caller
    pub user_id: Option<i32>,
}

#[derive(Default, Deserialize, ToSchema)]
pub struct ReturnBorrowRequest {
    /// Backdated return time, administrators only; defaults to now
    pub returned_at: Option<DateTime<Utc>>,
}

#[derive(Default, Deserialize, ToSchema)]
pub struct RenewBorrowRequest {
    /// Defaults to today plus the configured loan period
    pub due_date: Option<NaiveDate>,
}

/// List borrows
///
/// Non-administrators only ever see their own borrows.
#[utoipa::path(
    get,
    path = "/borrows",
    tag = "borrows",
    security(("bearer_auth" = [])),
    params(BorrowQuery),
    responses(
        (status = 200, description = "Borrows", body = Vec<BorrowView>),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn list_borrows(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<BorrowQuery>,
) -> AppResult<Json<Vec<BorrowView>>> {
    let user_id = if claims.is_admin() {
        query.user_id
    } else {
        Some(claims.user_id)
    };

    let borrows = state
        .services
        .circulation
        .list_borrows(user_id, query.status)
        .await?;
    Ok(Json(borrows))
}

/// Claim a copy
#[utoipa::path(
    post,
    path = "/borrows",
    tag = "borrows",
    security(("bearer_auth" = [])),
    request_body = ClaimBorrowRequest,
    responses(
        (status = 201, description = "Borrow opened", body = BorrowView),
        (status = 400, description = "Invalid due date"),
        (status = 409, description = "No copy available or copy not eligible")
    )
)]
pub async fn claim_borrow(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<ClaimBorrowRequest>,
) -> AppResult<(StatusCode, Json<BorrowView>)> {
    let user_id = request.user_id.unwrap_or(claims.user_id);
    claims.require_self_or_admin(user_id)?;

    let view = state
        .services
        .circulation
        .claim_borrow(user_id, request.book_id, request.copy_no, request.due_date)
        .await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// Get a borrow
#[utoipa::path(
    get,
    path = "/borrows/{id}",
    tag = "borrows",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Borrow ID")),
    responses(
        (status = 200, description = "Borrow", body = BorrowView),
        (status = 404, description = "Borrow not found")
    )
)]
pub async fn get_borrow(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<BorrowView>> {
    let view = state.services.circulation.get_view(id).await?;
    claims.require_self_or_admin(view.user.id)?;
    Ok(Json(view))
}

/// Return a borrowed copy
#[utoipa::path(
    post,
    path = "/borrows/{id}/return",
    tag = "borrows",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Borrow ID")),
    request_body = ReturnBorrowRequest,
    responses(
        (status = 200, description = "Borrow closed", body = BorrowView),
        (status = 400, description = "Return time before the borrow or in the future"),
        (status = 403, description = "Backdating requires the administrator role"),
        (status = 409, description = "Already returned")
    )
)]
pub async fn return_borrow(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    request: Option<Json<ReturnBorrowRequest>>,
) -> AppResult<Json<BorrowView>> {
    let request = request.map(|Json(r)| r).unwrap_or_default();
    if request.returned_at.is_some() {
        claims.require_admin()?;
    }

    let borrow = state.services.circulation.get_borrow(id).await?;
    claims.require_self_or_admin(borrow.user_id)?;

    let view = state
        .services
        .circulation
        .close_borrow(id, request.returned_at)
        .await?;
    Ok(Json(view))
}

/// Move the due date of an open borrow
#[utoipa::path(
    post,
    path = "/borrows/{id}/renew",
    tag = "borrows",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Borrow ID")),
    request_body = RenewBorrowRequest,
    responses(
        (status = 200, description = "Borrow renewed", body = BorrowView),
        (status = 400, description = "Due date in the past"),
        (status = 409, description = "Already returned")
    )
)]
pub async fn renew_borrow(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    request: Option<Json<RenewBorrowRequest>>,
) -> AppResult<Json<BorrowView>> {
    let borrow = state.services.circulation.get_borrow(id).await?;
    claims.require_self_or_admin(borrow.user_id)?;

    let request = request.map(|Json(r)| r).unwrap_or_default();
    let view = state
        .services
        .circulation
        .renew_borrow(id, request.due_date)
        .await?;
    Ok(Json(view))
}

/// Reopen a returned borrow
#[utoipa::path(
    post,
    path = "/borrows/{id}/reopen",
    tag = "borrows",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Borrow ID")),
    responses(
        (status = 200, description = "Borrow reopened", body = BorrowView),
        (status = 409, description = "Borrow still open, copy taken or no stock")
    )
)]
pub async fn reopen_borrow(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<BorrowView>> {
    claims.require_admin()?;
    Ok(Json(state.services.circulation.reopen_borrow(id).await?))
}
