//! Core business logic for Debris.
//!
//! This crate contains the domain logic with ZERO web or database dependencies.
//! Persistence is reached through repository traits implemented by `debris-db`.
//!
//! # Modules
//!
//! - `storage` - Remote blob store adapter and its readiness state machine
//! - `file` - File service: upload/delete sagas, lookups, pagination
//! - `identity` - Bearer credential resolution and local user rows
//! - `access` - Deduplicating access ledger

pub mod access;
pub mod file;
pub mod identity;
pub mod storage;
