//! # HTTP Surface
//!
//! Thin axum layer over the broker and the certificate lifecycle: it parses
//! requests, calls the core, and maps errors to bare status responses.

pub mod error;
pub mod handlers;
pub mod pages;
pub mod routes;
pub mod server;
pub mod state;

pub use error::ApiError;
pub use routes::build_router;
pub use server::start_api_server;
pub use state::AppState;
