//! Copy ledger and inventory counter endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use crate::{
    error::AppResult,
    models::{
        copy::{AvailableCopy, BookCopy},
        inventory::{BookInventory, InventoryAudit},
    },
};

use super::AuthenticatedUser;

#[derive(Deserialize, ToSchema)]
pub struct SetTotalCopiesRequest {
    pub total_copies: i64,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct AuditQuery {
    /// Only report books whose counters drifted
    #[serde(default)]
    pub only_drift: bool,
}

/// Copies a borrower can pick from
#[utoipa::path(
    get,
    path = "/books/{id}/copies/available",
    tag = "inventory",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Book ID")),
    responses(
        (status = 200, description = "Active copies without an open borrow", body = Vec<AvailableCopy>),
        (status = 404, description = "Book not found")
    )
)]
pub async fn available_copies(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Vec<AvailableCopy>>> {
    Ok(Json(state.services.inventory.available_copies(id).await?))
}

/// Full copy ledger, retired copies included
#[utoipa::path(
    get,
    path = "/books/{id}/copies",
    tag = "inventory",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Book ID")),
    responses(
        (status = 200, description = "Copy ledger", body = Vec<BookCopy>),
        (status = 403, description = "Administrator role required")
    )
)]
pub async fn list_copies(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Vec<BookCopy>>> {
    claims.require_admin()?;
    Ok(Json(state.services.inventory.list_copies(id).await?))
}

/// Grow or shrink the active copies of a book
#[utoipa::path(
    put,
    path = "/books/{id}/total-copies",
    tag = "inventory",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Book ID")),
    request_body = SetTotalCopiesRequest,
    responses(
        (status = 200, description = "Counters after reconciliation", body = BookInventory),
        (status = 400, description = "Negative total"),
        (status = 409, description = "Below the borrowed count")
    )
)]
pub async fn set_total_copies(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(body): Json<SetTotalCopiesRequest>,
) -> AppResult<Json<BookInventory>> {
    claims.require_admin()?;
    Ok(Json(state.services.inventory.set_total_copies(id, body.total_copies).await?))
}

/// Stored counters against derived values for one book
#[utoipa::path(
    get,
    path = "/books/{id}/inventory",
    tag = "inventory",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Book ID")),
    responses(
        (status = 200, description = "Audit", body = InventoryAudit),
        (status = 404, description = "Book not found")
    )
)]
pub async fn audit_book(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<InventoryAudit>> {
    claims.require_admin()?;
    Ok(Json(state.services.inventory.audit(id).await?))
}

/// Rewrite the counters of a book from its ledger
#[utoipa::path(
    post,
    path = "/books/{id}/inventory/repair",
    tag = "inventory",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Book ID")),
    responses(
        (status = 200, description = "Counters after repair", body = BookInventory),
        (status = 404, description = "Book not found")
    )
)]
pub async fn repair_book(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<BookInventory>> {
    claims.require_admin()?;
    Ok(Json(state.services.inventory.repair(id).await?))
}

/// Audit every book
#[utoipa::path(
    get,
    path = "/inventory/audit",
    tag = "inventory",
    security(("bearer_auth" = [])),
    params(AuditQuery),
    responses(
        (status = 200, description = "Audits", body = Vec<InventoryAudit>),
        (status = 403, description = "Administrator role required")
    )
)]
pub async fn audit_all(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<AuditQuery>,
) -> AppResult<Json<Vec<InventoryAudit>>> {
    claims.require_admin()?;
    Ok(Json(state.services.inventory.audit_all(query.only_drift).await?))
}
