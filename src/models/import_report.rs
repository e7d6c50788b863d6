//! Bulk catalog import report

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// What an applied row did
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RowOutcome {
    Created,
    Updated,
    Unchanged,
}

/// A rejected row
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct ImportRowError {
    pub row: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub isbn: Option<String>,
    pub message: String,
}

/// Report returned by a catalog import run
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ImportReport {
    pub dry_run: bool,
    pub atomic: bool,
    /// True when the changes were kept
    pub applied: bool,
    pub has_errors: bool,
    pub created: u32,
    pub updated: u32,
    /// Unchanged rows and rejected rows
    pub skipped: u32,
    pub errors: Vec<ImportRowError>,
}

impl ImportReport {
    pub fn new(dry_run: bool, atomic: bool) -> Self {
        Self {
            dry_run,
            atomic,
            ..Default::default()
        }
    }

    pub fn record(&mut self, outcome: RowOutcome) {
        match outcome {
            RowOutcome::Created => self.created += 1,
            RowOutcome::Updated => self.updated += 1,
            RowOutcome::Unchanged => self.skipped += 1,
        }
    }

    pub fn reject(&mut self, row: usize, isbn: Option<&str>, message: impl Into<String>) {
        self.skipped += 1;
        self.has_errors = true;
        self.errors.push(ImportRowError {
            row,
            isbn: isbn.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string),
            message: message.into(),
        });
    }

    /// Seal the report once every row has been processed
    pub fn finish(mut self) -> Self {
        self.applied = !self.dry_run && !(self.atomic && self.has_errors);
        self
    }
}

/// Import options
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct ImportQuery {
    #[serde(default)]
    pub dry_run: bool,
    /// Roll back every row if any row fails
    #[serde(default)]
    pub atomic: bool,
}
