//! Gym Meeting Service
//!
//! Backend for a gym training product: clients request meetings with their
//! trainer, an administrator approves or denies them, and the same surface
//! carries workout plans and a two-party chat.
//!
//! # Modules
//!
//! - `services::scheduling`: the pure slot conflict checker (off-hours rule
//!   and the 30-minute buffer after each confirmed meeting)
//! - `services::database`: CSV-backed persistence for meetings, profiles,
//!   workout plans and messages
//! - `client`: client for the external identity provider
//! - `auth`: HMAC-SHA256 session token issuing and verification
//! - `handlers` / `routes`: the HTTP surface
//!
//! # Authentication
//!
//! Credential checking is delegated to an external identity provider via the
//! password grant; the service then signs its own short-lived session tokens
//! with HMAC-SHA256 and verifies them on every request.

pub mod auth;
pub mod client;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;


// Re-export the main types for ease of use
pub use auth::SessionAuth;
pub use client::IdentityClient;
pub use handlers::api::AppState;
pub use routes::create_router;
