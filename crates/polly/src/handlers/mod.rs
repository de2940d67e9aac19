//! HTTP request handlers.

mod actor;
mod admin;
pub mod api_auth;
mod health;
pub mod problem_details;
pub mod v1;
mod version;

pub use admin::{shutdown, unlock_app_state};
pub use health::{livez, readyz};
pub use problem_details::ApiError;
pub use version::version;
