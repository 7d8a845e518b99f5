//! Fjall-backed ledger for tenants, sources, archive jobs, and stored-object
//! records. All writes are single-record upserts; the embedded store
//! provides whatever atomicity a single-key insert needs.

mod error;
mod keys;
mod store;

pub use error::{LedgerError, Result};
pub use store::LedgerStore;
