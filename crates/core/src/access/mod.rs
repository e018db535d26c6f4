//! Access ledger: a log of client accesses, deduplicated by fingerprint
//! over a trailing window.

mod fingerprint;
mod ledger;
mod memory;

pub use fingerprint::Fingerprint;
pub use ledger::{
    AccessError, AccessIdentity, AccessLedger, AccessRepository, ClientInfo, DEDUP_WINDOW_SECS,
    NewAccess,
};
pub use memory::InMemoryAccessRepository;
