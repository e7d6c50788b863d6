//! Integration tests
//!
//! The database-backed tests need a PostgreSQL instance at `DATABASE_URL` and
//! are ignored by default. Run with: cargo test -- --ignored

mod api_tests;
mod challenge_tests;
mod circulation_tests;
mod common;
mod import_tests;
mod inventory_tests;
mod overdue_tests;
