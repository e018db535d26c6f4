//! Discord guild as a blob store.

mod adapter;
mod client;
#[cfg(test)]
pub(crate) mod mock;
mod models;

pub use adapter::DiscordStorage;
pub use client::DiscordHttp;
