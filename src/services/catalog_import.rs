//! Bulk catalog import from CSV

use crate::{
    error::AppResult,
    models::{
        catalog_row::{CatalogRow, ImportRow},
        import_report::{ImportReport, ImportRowError},
    },
    repository::Repository,
};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Records of a CSV upload, plus the records that could not be read
#[derive(Debug, Default)]
pub struct ParsedCsv {
    pub rows: Vec<ImportRow>,
    pub errors: Vec<ImportRowError>,
}

/// Read catalog rows; the header is row 1.
///
/// A missing header (or one without an `isbn` column) is a single row-1
/// error. Header names are matched case-insensitively.
pub fn parse_catalog_csv(data: &[u8]) -> ParsedCsv {
    let data = data.strip_prefix(UTF8_BOM).unwrap_or(data);
    let mut parsed = ParsedCsv::default();

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(data);

    let headers = match reader.headers() {
        Ok(h) => h.iter().map(|name| name.trim().to_lowercase()).collect::<csv::StringRecord>(),
        Err(e) => {
            parsed.errors.push(header_error(format!("Unreadable CSV header: {}", e)));
            return parsed;
        }
    };
    if headers.iter().all(str::is_empty) {
        parsed.errors.push(header_error("CSV header row is missing".to_string()));
        return parsed;
    }
    if !headers.iter().any(|h| h == "isbn") {
        parsed.errors.push(header_error("CSV header must include an isbn column".to_string()));
        return parsed;
    }

    let mut fallback_row = 1;
    for record in reader.records() {
        fallback_row += 1;
        let record = match record {
            Ok(r) => r,
            Err(e) => {
                let row = e.position().map(|p| p.line() as usize).unwrap_or(fallback_row);
                parsed.errors.push(ImportRowError {
                    row,
                    isbn: None,
                    message: format!("Unreadable CSV record: {}", e),
                });
                continue;
            }
        };
        let row = record.position().map(|p| p.line() as usize).unwrap_or(fallback_row);

        match record.deserialize::<CatalogRow>(Some(&headers)) {
            Ok(fields) => parsed.rows.push(ImportRow { row, fields }),
            Err(e) => parsed.errors.push(ImportRowError {
                row,
                isbn: None,
                message: format!("Malformed row: {}", e),
            }),
        }
    }
    parsed
}

fn header_error(message: String) -> ImportRowError {
    ImportRowError {
        row: 1,
        isbn: None,
        message,
    }
}

#[derive(Clone)]
pub struct CatalogImportService {
    repository: Repository,
}

impl CatalogImportService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Import a CSV upload
    pub async fn import_csv(&self, data: &[u8], dry_run: bool, atomic: bool) -> AppResult<ImportReport> {
        let parsed = parse_catalog_csv(data);
        self.import_rows(parsed, dry_run, atomic).await
    }

    /// Apply already-read rows; unreadable records are reported as row errors
    pub async fn import_rows(&self, parsed: ParsedCsv, dry_run: bool, atomic: bool) -> AppResult<ImportReport> {
        let mut report = ImportReport::new(dry_run, atomic);
        for err in parsed.errors {
            report.reject(err.row, err.isbn.as_deref(), err.message);
        }

        let report = self.repository.catalog_import(&parsed.rows, report).await?;
        tracing::info!(
            dry_run,
            atomic,
            applied = report.applied,
            created = report.created,
            updated = report.updated,
            skipped = report.skipped,
            errors = report.errors.len(),
            "Catalog import finished"
        );
        Ok(report)
    }
}
