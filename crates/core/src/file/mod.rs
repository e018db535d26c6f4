//! File service: upload, retrieval, listing, rename and delete of files
//! whose bytes live in remote blob storage.
//!
//! This module provides:
//! - Upload validation (name length, size) and MIME sniffing
//! - Name-gated, owner-checked lookups
//! - Cursor pagination over upload timestamps
//! - Relative and absolute URL synthesis

mod error;
mod memory;
mod naming;
mod service;
mod types;

pub use error::FileError;
pub use memory::InMemoryFileRepository;
pub use naming::{encode_name, extract_extension, file_path, validate_name};
pub use service::{FileRepository, FileService};
pub use types::{File, FileListing, FilePatch, ListFilesQuery, MAX_FILE_SIZE, MAX_NAME_LENGTH};
