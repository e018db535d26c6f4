//! Request middleware.

pub mod auth;

pub use auth::{AuthUser, client_info, resolve_user};
