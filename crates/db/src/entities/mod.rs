//! `SeaORM` entities of the metadata index.

pub mod accesses;
pub mod files;
pub mod users;

pub mod prelude {
    //! Entity aliases.
    pub use super::accesses::Entity as Accesses;
    pub use super::files::Entity as Files;
    pub use super::users::Entity as Users;
}
