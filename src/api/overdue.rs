//! Overdue reminder endpoints

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use utoipa::IntoParams;

use crate::{
    error::AppResult,
    models::overdue::{BatchQuery, BatchReport, OverdueMailLog, OverduePreview},
};

use super::AuthenticatedUser;

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct DateQuery {
    /// YYYY-MM-DD, defaults to today
    pub date: Option<NaiveDate>,
}

/// Borrowers with overdue borrows, grouped
#[utoipa::path(
    get,
    path = "/overdue",
    tag = "overdue",
    security(("bearer_auth" = [])),
    params(DateQuery),
    responses(
        (status = 200, description = "Overdue borrowers", body = Vec<OverduePreview>),
        (status = 403, description = "Administrator role required")
    )
)]
pub async fn preview(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<DateQuery>,
) -> AppResult<Json<Vec<OverduePreview>>> {
    claims.require_admin()?;
    Ok(Json(state.services.overdue.preview(query.date).await?))
}

/// Send merged reminders, at most one per borrower and day
#[utoipa::path(
    post,
    path = "/overdue/send",
    tag = "overdue",
    security(("bearer_auth" = [])),
    params(BatchQuery),
    responses(
        (status = 200, description = "Batch report", body = BatchReport),
        (status = 403, description = "Administrator role required")
    )
)]
pub async fn send(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<BatchQuery>,
) -> AppResult<Json<BatchReport>> {
    claims.require_admin()?;
    let report = state
        .services
        .overdue
        .run_batch(query.date, query.force, query.dry_run)
        .await?;
    Ok(Json(report))
}

/// Reminder log for a day
#[utoipa::path(
    get,
    path = "/overdue/logs",
    tag = "overdue",
    security(("bearer_auth" = [])),
    params(DateQuery),
    responses(
        (status = 200, description = "Sent reminders", body = Vec<OverdueMailLog>),
        (status = 403, description = "Administrator role required")
    )
)]
pub async fn logs(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<DateQuery>,
) -> AppResult<Json<Vec<OverdueMailLog>>> {
    claims.require_admin()?;
    Ok(Json(state.services.overdue.logs(query.date).await?))
}
