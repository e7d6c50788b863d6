//! Catalog import: applying parsed rows inside transactions

use sqlx::{Connection, PgConnection};

use super::{
    books::{find_by_isbn_in, insert_book_in, update_book_in},
    categories::get_or_create_in,
    inventory::{count_open_borrows, set_total_copies_in},
    Repository,
};
use crate::{
    error::{AppError, AppResult},
    models::{
        catalog_row::{plan_row, Cell, ImportRow},
        import_report::{ImportReport, RowOutcome},
    },
};

/// Upsert one row keyed by ISBN
async fn apply_row_in(conn: &mut PgConnection, row: &ImportRow) -> AppResult<RowOutcome> {
    let changes = row.fields.parse().map_err(AppError::Validation)?;

    let existing = find_by_isbn_in(conn, &changes.isbn).await?;
    let open_borrows = match existing {
        Some(ref book) => count_open_borrows(conn, book.id).await?,
        None => 0,
    };

    let mut plan = plan_row(&changes, existing.as_ref().map(|b| (b, open_borrows)))
        .map_err(AppError::Validation)?;
    if !plan.changed {
        return Ok(RowOutcome::Unchanged);
    }

    plan.draft.category_id = match plan.category {
        Cell::Keep => plan.draft.category_id,
        Cell::Clear => None,
        Cell::Set(ref name) => Some(get_or_create_in(conn, name).await?),
    };

    match plan.existing_id {
        Some(id) => {
            update_book_in(conn, id, &plan.draft).await?;
            if let Some(total) = plan.target_total {
                set_total_copies_in(conn, id, total).await?;
            }
            Ok(RowOutcome::Updated)
        }
        None => {
            let id = insert_book_in(conn, &plan.draft).await?;
            set_total_copies_in(conn, id, plan.target_total.unwrap_or(1)).await?;
            Ok(RowOutcome::Created)
        }
    }
}

/// Message reported for a rejected row
fn row_message(row: usize, err: AppError) -> String {
    match err {
        AppError::Validation(msg)
        | AppError::Conflict(msg)
        | AppError::BadRequest(msg)
        | AppError::NotFound(msg) => msg,
        AppError::Inventory(e) => e.to_string(),
        AppError::Database(e) => {
            tracing::error!(row, "Database error while importing row: {:?}", e);
            "Database error".to_string()
        }
        other => other.to_string(),
    }
}

impl Repository {
    /// Apply catalog rows, accumulating into `report`.
    ///
    /// Normal mode commits every row on its own. Atomic and dry-run modes run
    /// the whole batch in one transaction with a savepoint per row; the batch
    /// is committed only when the report says it was applied.
    pub async fn catalog_import(&self, rows: &[ImportRow], mut report: ImportReport) -> AppResult<ImportReport> {
        if !report.dry_run && !report.atomic {
            for row in rows {
                let mut tx = self.pool.begin().await?;
                match apply_row_in(&mut tx, row).await {
                    Ok(outcome) => {
                        tx.commit().await?;
                        report.record(outcome);
                    }
                    Err(e) => {
                        tx.rollback().await?;
                        report.reject(row.row, Some(&row.fields.isbn), row_message(row.row, e));
                    }
                }
            }
            return Ok(report.finish());
        }

        let mut tx = self.pool.begin().await?;
        for row in rows {
            let mut savepoint = Connection::begin(&mut *tx).await?;
            match apply_row_in(&mut savepoint, row).await {
                Ok(outcome) => {
                    savepoint.commit().await?;
                    report.record(outcome);
                }
                Err(e) => {
                    savepoint.rollback().await?;
                    report.reject(row.row, Some(&row.fields.isbn), row_message(row.row, e));
                }
            }
        }

        let report = report.finish();
        if report.applied {
            tx.commit().await?;
        } else {
            tx.rollback().await?;
        }
        Ok(report)
    }
}
