//! Repository abstractions for data access.
//!
//! Repositories implement the persistence traits of `debris-core`,
//! hiding the `SeaORM` implementation details from the rest of the application.

pub mod access;
pub mod file;
pub mod user;

pub use access::AccessRepository;
pub use file::FileRepository;
pub use user::UserRepository;
