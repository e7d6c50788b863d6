//! Catalog CSV rows and the upsert rules applied to each of them

use chrono::NaiveDate;
use serde::Deserialize;

use super::book::{Book, BookDraft, BookStatus};
use super::inventory::validate_new_total;

/// Cell value that explicitly blanks a clearable field
pub const CLEAR_TOKEN: &str = "__CLEAR__";

/// Column order used by the catalog CSV format
pub const CATALOG_COLUMNS: [&str; 11] = [
    "isbn",
    "title",
    "author",
    "publisher",
    "publish_date",
    "description",
    "category_name",
    "total_copies",
    "available_copies",
    "location",
    "status",
];

/// Raw CSV row; every cell is optional text
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CatalogRow {
    pub isbn: String,
    pub title: String,
    pub author: String,
    pub publisher: String,
    pub publish_date: String,
    pub description: String,
    pub category_name: String,
    pub total_copies: String,
    pub available_copies: String,
    pub location: String,
    pub status: String,
}

/// A CSV row with its 1-based line number (the header is row 1)
#[derive(Debug, Clone)]
pub struct ImportRow {
    pub row: usize,
    pub fields: CatalogRow,
}

/// Upsert intent of one cell
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cell<T> {
    /// Blank cell: leave the stored value alone
    Keep,
    /// Clear token: blank the stored value
    Clear,
    Set(T),
}

/// Row cells parsed and validated without looking at the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowChanges {
    pub isbn: String,
    pub title: Option<String>,
    pub author: Option<String>,
    pub publisher: Cell<String>,
    pub publish_date: Cell<NaiveDate>,
    pub description: Cell<String>,
    pub category: Cell<String>,
    pub location: Cell<String>,
    pub status: Option<BookStatus>,
    pub total_copies: Option<i64>,
    pub available_copies: Option<i64>,
}

fn text_cell(value: &str, field: &str, max_len: usize) -> Result<Cell<String>, String> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(Cell::Keep);
    }
    if value == CLEAR_TOKEN {
        return Ok(Cell::Clear);
    }
    if value.chars().count() > max_len {
        return Err(format!("{} is longer than {} characters", field, max_len));
    }
    Ok(Cell::Set(value.to_string()))
}

fn required_cell(value: &str, field: &str, max_len: usize) -> Result<Option<String>, String> {
    match text_cell(value, field, max_len)? {
        Cell::Keep => Ok(None),
        Cell::Clear => Err(format!("{} cannot be cleared", field)),
        Cell::Set(v) => Ok(Some(v)),
    }
}

fn int_cell(value: &str, field: &str) -> Result<Option<i64>, String> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    if value == CLEAR_TOKEN {
        return Err(format!("{} cannot be cleared", field));
    }
    value
        .parse::<i64>()
        .map(Some)
        .map_err(|_| format!("{} must be an integer", field))
}

impl CatalogRow {
    /// Validate cell shapes; the ISBN is the row key and is checked first
    pub fn parse(&self) -> Result<RowChanges, String> {
        let isbn = self.isbn.trim();
        if isbn.is_empty() {
            return Err("isbn is required".to_string());
        }
        if isbn.chars().count() > 32 {
            return Err("isbn is longer than 32 characters".to_string());
        }

        let publish_date = match self.publish_date.trim() {
            "" => Cell::Keep,
            CLEAR_TOKEN => Cell::Clear,
            raw => Cell::Set(
                NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                    .map_err(|_| "publish_date must be YYYY-MM-DD".to_string())?,
            ),
        };

        let status = match self.status.trim() {
            "" => None,
            CLEAR_TOKEN => return Err("status cannot be cleared".to_string()),
            raw => Some(
                BookStatus::parse_token(raw)
                    .ok_or_else(|| "status must be on_shelf or off_shelf".to_string())?,
            ),
        };

        Ok(RowChanges {
            isbn: isbn.to_string(),
            title: required_cell(&self.title, "title", 200)?,
            author: required_cell(&self.author, "author", 100)?,
            publisher: text_cell(&self.publisher, "publisher", 200)?,
            publish_date,
            description: text_cell(&self.description, "description", usize::MAX)?,
            category: text_cell(&self.category_name, "category_name", 100)?,
            location: text_cell(&self.location, "location", 100)?,
            status,
            total_copies: int_cell(&self.total_copies, "total_copies")?,
            available_copies: int_cell(&self.available_copies, "available_copies")?,
        })
    }
}

/// What an applied row will write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowPlan {
    pub existing_id: Option<i32>,
    /// Bibliographic values; `category_id` is resolved from `category`
    pub draft: BookDraft,
    pub category: Cell<String>,
    /// Active copy count to reconcile to, when it changes
    pub target_total: Option<i64>,
    pub changed: bool,
}

fn apply_text(current: &mut String, cell: &Cell<String>) -> bool {
    let next = match cell {
        Cell::Keep => return false,
        Cell::Clear => String::new(),
        Cell::Set(v) => v.clone(),
    };
    if *current == next {
        return false;
    }
    *current = next;
    true
}

fn check_available(available: Option<i64>, total: i64, borrowed: i64) -> Result<(), String> {
    if let Some(available) = available {
        if available < 0 {
            return Err("available_copies cannot be negative".to_string());
        }
        if available > total {
            return Err("available_copies cannot exceed total_copies".to_string());
        }
        if available != total - borrowed {
            return Err(format!(
                "available_copies must equal total_copies minus borrowed copies ({})",
                total - borrowed
            ));
        }
    }
    Ok(())
}

/// Merge parsed changes with the stored book (if any).
///
/// `existing` carries the book and its current open-borrow count.
pub fn plan_row(changes: &RowChanges, existing: Option<(&Book, i64)>) -> Result<RowPlan, String> {
    match existing {
        None => {
            let title = changes.title.clone().ok_or_else(|| "title is required".to_string())?;
            let author = changes.author.clone().ok_or_else(|| "author is required".to_string())?;

            let total = changes.total_copies.unwrap_or(1);
            validate_new_total(total, 0).map_err(|e| e.to_string())?;
            check_available(changes.available_copies, total, 0)?;

            let mut draft = BookDraft {
                title,
                author,
                isbn: changes.isbn.clone(),
                publisher: String::new(),
                publish_date: None,
                description: String::new(),
                category_id: None,
                location: String::new(),
                status: changes.status.unwrap_or_default(),
            };
            apply_text(&mut draft.publisher, &changes.publisher);
            apply_text(&mut draft.description, &changes.description);
            apply_text(&mut draft.location, &changes.location);
            if let Cell::Set(d) = changes.publish_date {
                draft.publish_date = Some(d);
            }

            Ok(RowPlan {
                existing_id: None,
                draft,
                category: changes.category.clone(),
                target_total: Some(total),
                changed: true,
            })
        }
        Some((book, open_borrows)) => {
            let mut draft = BookDraft::from(book);
            let mut changed = false;

            if let Some(ref title) = changes.title {
                changed |= apply_text(&mut draft.title, &Cell::Set(title.clone()));
            }
            if let Some(ref author) = changes.author {
                changed |= apply_text(&mut draft.author, &Cell::Set(author.clone()));
            }
            changed |= apply_text(&mut draft.publisher, &changes.publisher);
            changed |= apply_text(&mut draft.description, &changes.description);
            changed |= apply_text(&mut draft.location, &changes.location);

            match changes.publish_date {
                Cell::Keep => {}
                Cell::Clear => {
                    changed |= draft.publish_date.is_some();
                    draft.publish_date = None;
                }
                Cell::Set(d) => {
                    changed |= draft.publish_date != Some(d);
                    draft.publish_date = Some(d);
                }
            }

            match changes.category {
                Cell::Keep => {}
                Cell::Clear => changed |= book.category_id.is_some(),
                Cell::Set(ref name) => changed |= book.category_name.as_deref() != Some(name.as_str()),
            }

            if let Some(status) = changes.status {
                changed |= draft.status != status;
                draft.status = status;
            }

            let mut target_total = None;
            if changes.total_copies.is_some() || changes.available_copies.is_some() {
                let current_total = i64::from(book.total_copies);
                let new_total = changes.total_copies.unwrap_or(current_total);
                validate_new_total(new_total, open_borrows).map_err(|e| e.to_string())?;
                check_available(changes.available_copies, new_total, open_borrows)?;
                if new_total != current_total {
                    target_total = Some(new_total);
                    changed = true;
                }
            }

            Ok(RowPlan {
                existing_id: Some(book.id),
                draft,
                category: changes.category.clone(),
                target_total,
                changed,
            })
        }
    }
}
