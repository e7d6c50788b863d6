//! API handlers for Libris REST endpoints

pub mod books;
pub mod borrows;
pub mod categories;
pub mod health;
pub mod import;
pub mod inventory;
pub mod openapi;
pub mod overdue;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::request::Parts,
    routing::{get, post, put},
    Router,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{error::AppError, models::user::UserClaims, AppState};

/// Extractor for authenticated user from JWT token
pub struct AuthenticatedUser(pub UserClaims);

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| AppError::Authentication("Missing or invalid authorization header".to_string()))?;

        // Validate JWT token using the secret from configuration
        let claims = UserClaims::from_token(bearer.token(), &state.config.auth.jwt_secret)
            .map_err(|e| AppError::Authentication(e.to_string()))?;

        Ok(AuthenticatedUser(claims))
    }
}

/// Create the application router with all routes
pub fn router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_v1 = Router::new()
        // Health check
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        // Categories
        .route("/categories", get(categories::list_categories).post(categories::create_category))
        .route(
            "/categories/:id",
            get(categories::get_category)
                .put(categories::update_category)
                .delete(categories::delete_category),
        )
        // Books
        .route("/books", get(books::list_books).post(books::create_book))
        .route(
            "/books/:id",
            get(books::get_book).put(books::update_book).delete(books::delete_book),
        )
        // Copy ledger and counters
        .route("/books/:id/copies", get(inventory::list_copies))
        .route("/books/:id/copies/available", get(inventory::available_copies))
        .route("/books/:id/total-copies", put(inventory::set_total_copies))
        .route("/books/:id/inventory", get(inventory::audit_book))
        .route("/books/:id/inventory/repair", post(inventory::repair_book))
        .route("/inventory/audit", get(inventory::audit_all))
        // Circulation
        .route("/borrows", get(borrows::list_borrows).post(borrows::claim_borrow))
        .route("/borrows/:id", get(borrows::get_borrow))
        .route("/borrows/:id/return", post(borrows::return_borrow))
        .route("/borrows/:id/renew", post(borrows::renew_borrow))
        .route("/borrows/:id/reopen", post(borrows::reopen_borrow))
        // Overdue reminders
        .route("/overdue", get(overdue::preview))
        .route("/overdue/send", post(overdue::send))
        .route("/overdue/logs", get(overdue::logs))
        // Bulk import
        .route("/import/books", post(import::import_books))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi::create_openapi_router())
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors)
}
