//! Catalog management service: books and categories

use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::{
        book::{Book, BookDraft, BookQuery, BookStatus, CreateBook, UpdateBook},
        category::{Category, CategoryQuery, CreateCategory, UpdateCategory},
        inventory::validate_new_total,
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct CatalogService {
    repository: Repository,
}

impl CatalogService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Search books; non-admins only see books on the shelf
    pub async fn search_books(&self, query: &BookQuery, is_admin: bool) -> AppResult<(Vec<Book>, i64)> {
        let status = if is_admin {
            query.status
        } else {
            Some(BookStatus::OnShelf)
        };
        self.repository.books_search(query, status).await
    }

    pub async fn get_book(&self, id: i32, is_admin: bool) -> AppResult<Book> {
        let book = self.repository.books_get(id).await?;
        if !is_admin && book.shelf_status() != BookStatus::OnShelf {
            return Err(AppError::NotFound(format!("Book with id {} not found", id)));
        }
        Ok(book)
    }

    /// Create a book with `total_copies` copies (default 1)
    pub async fn create_book(&self, data: CreateBook) -> AppResult<Book> {
        data.validate()?;
        let total = data.total_copies.unwrap_or(1);
        validate_new_total(total, 0)?;

        let draft = BookDraft {
            title: data.title.trim().to_string(),
            author: data.author.trim().to_string(),
            isbn: data.isbn.trim().to_string(),
            publisher: data.publisher.trim().to_string(),
            publish_date: data.publish_date,
            description: data.description.trim().to_string(),
            category_id: data.category_id,
            location: data.location.trim().to_string(),
            status: data.status.unwrap_or_default(),
        };
        self.repository.books_create(&draft, total).await
    }

    pub async fn update_book(&self, id: i32, data: UpdateBook) -> AppResult<Book> {
        data.validate()?;
        self.repository.books_update(id, &data).await
    }

    pub async fn delete_book(&self, id: i32) -> AppResult<()> {
        self.repository.books_delete(id).await
    }

    pub async fn list_categories(&self, query: &CategoryQuery) -> AppResult<Vec<Category>> {
        self.repository.categories_list(query).await
    }

    pub async fn get_category(&self, id: i32) -> AppResult<Category> {
        self.repository.categories_get(id).await
    }

    pub async fn create_category(&self, data: CreateCategory) -> AppResult<Category> {
        data.validate()?;
        if data.name.trim().is_empty() {
            return Err(AppError::Validation("name is required".to_string()));
        }
        self.repository.categories_create(&data).await
    }

    pub async fn update_category(&self, id: i32, data: UpdateCategory) -> AppResult<Category> {
        data.validate()?;
        if data.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(AppError::Validation("name cannot be blank".to_string()));
        }
        self.repository.categories_update(id, &data).await
    }

    pub async fn delete_category(&self, id: i32) -> AppResult<()> {
        self.repository.categories_delete(id).await
    }
}
