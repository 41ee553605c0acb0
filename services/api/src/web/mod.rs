pub mod admin;
pub mod auth;
pub mod content;
pub mod exams;
pub mod middleware;
pub mod questions;
pub mod rest;
pub mod state;

// Re-export the pieces the binary needs to build the router.
pub use middleware::require_auth;
pub use rest::ApiDoc;
