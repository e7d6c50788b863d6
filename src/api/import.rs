//! Bulk catalog import endpoint

use axum::{
    extract::{Query, State},
    Json,
};
use axum_extra::extract::Multipart;

use crate::{
    error::{AppError, AppResult},
    models::import_report::{ImportQuery, ImportReport},
};

use super::AuthenticatedUser;

/// Import books from an uploaded CSV file
///
/// The `file` part holds the CSV document (UTF-8, optional BOM, header row
/// required). Blank cells keep the stored value and `__CLEAR__` clears an
/// optional field.
#[utoipa::path(
    post,
    path = "/import/books",
    tag = "import",
    security(("bearer_auth" = [])),
    params(ImportQuery),
    request_body(content = String, content_type = "multipart/form-data", description = "CSV file in the `file` part"),
    responses(
        (status = 200, description = "Import report", body = ImportReport),
        (status = 400, description = "Missing or empty file part"),
        (status = 403, description = "Administrator role required")
    )
)]
pub async fn import_books(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<ImportQuery>,
    mut multipart: Multipart,
) -> AppResult<Json<ImportReport>> {
    claims.require_admin()?;

    let mut data = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() == Some("file") {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::BadRequest(format!("Failed to read upload: {}", e)))?;
            data = Some(bytes);
            break;
        }
    }

    let data = data
        .filter(|d| !d.is_empty())
        .ok_or_else(|| AppError::Validation("A non-empty `file` part is required".to_string()))?;

    let report = state
        .services
        .catalog_import
        .import_csv(&data, query.dry_run, query.atomic)
        .await?;
    Ok(Json(report))
}
