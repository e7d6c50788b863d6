//! OpenAPI documentation

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{books, borrows, categories, health, import, inventory, overdue};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Libris API",
        version = "1.0.0",
        description = "Library circulation and inventory REST API"
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    modifiers(&SecurityAddon),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Categories
        categories::list_categories,
        categories::get_category,
        categories::create_category,
        categories::update_category,
        categories::delete_category,
        // Books
        books::list_books,
        books::get_book,
        books::create_book,
        books::update_book,
        books::delete_book,
        // Inventory
        inventory::available_copies,
        inventory::list_copies,
        inventory::set_total_copies,
        inventory::audit_book,
        inventory::repair_book,
        inventory::audit_all,
        // Borrows
        borrows::list_borrows,
        borrows::claim_borrow,
        borrows::get_borrow,
        borrows::return_borrow,
        borrows::renew_borrow,
        borrows::reopen_borrow,
        // Overdue
        overdue::preview,
        overdue::send,
        overdue::logs,
        // Import
        import::import_books,
    ),
    components(
        schemas(
            // Catalog
            crate::models::book::Book,
            crate::models::book::BookStatus,
            crate::models::book::CreateBook,
            crate::models::book::UpdateBook,
            crate::models::category::Category,
            crate::models::category::CreateCategory,
            crate::models::category::UpdateCategory,
            books::BookPage,
            // Inventory
            crate::models::copy::BookCopy,
            crate::models::copy::AvailableCopy,
            crate::models::inventory::BookInventory,
            crate::models::inventory::InventoryAudit,
            inventory::SetTotalCopiesRequest,
            // Borrows
            crate::models::borrow::BorrowStatus,
            crate::models::borrow::BorrowView,
            crate::models::borrow::BorrowUserRef,
            crate::models::borrow::BorrowBookRef,
            crate::models::borrow::BorrowCopyRef,
            borrows::ClaimBorrowRequest,
            borrows::ReturnBorrowRequest,
            borrows::RenewBorrowRequest,
            // Overdue
            crate::models::overdue::OverdueItem,
            crate::models::overdue::OverduePreview,
            crate::models::overdue::BatchOutcome,
            crate::models::overdue::BatchDetail,
            crate::models::overdue::BatchReport,
            crate::models::overdue::OverdueMailLog,
            // Import
            crate::models::import_report::ImportReport,
            crate::models::import_report::ImportRowError,
            crate::models::import_report::RowOutcome,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "categories", description = "Category management"),
        (name = "books", description = "Catalog management"),
        (name = "inventory", description = "Copy ledger and counters"),
        (name = "borrows", description = "Circulation"),
        (name = "overdue", description = "Overdue reminders"),
        (name = "import", description = "Bulk catalog import")
    )
)]
pub struct ApiDoc;

/// Registers the `bearer_auth` scheme referenced by the secured paths
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
