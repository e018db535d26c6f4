//! Identity resolution: bearer credential → remote identity → local user.

mod error;
mod memory;
mod provider;
mod service;
mod types;

pub use error::IdentityError;
pub use memory::{InMemoryUserRepository, StaticIdentityProvider};
pub use provider::{DiscordIdentityProvider, IdentityProvider};
pub use service::{IdentityResolver, UserRepository};
pub use types::{LocalUser, RemoteIdentity, User, UserPatch};
