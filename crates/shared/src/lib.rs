//! Shared types, errors, and configuration for Debris.
//!
//! This crate provides common types used across all other crates:
//! - Time-window types for cursor pagination of file listings
//! - The client-facing error taxonomy with stable numeric codes
//! - Configuration management

pub mod config;
pub mod error;
pub mod types;

pub use config::AppConfig;
pub use error::{AppError, AppResult, ErrorBody};
