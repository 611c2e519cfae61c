//! CMT Admin Backend Library
//!
//! Exposes the service modules for the binary and the integration tests.

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod middleware;
pub mod models;

pub use api::{router, AppState};
pub use config::Config;
pub use db::Database;
