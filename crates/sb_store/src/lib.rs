//! sb_store — local private-key custody for Sealbox
//!
//! A small SQLite database, one row per user id, holding the exported
//! PKCS#8 private key. It lives entirely on the device: the relay and
//! directory never see it, and losing it means losing the ability to
//! decrypt — there is no server-side recovery by design.
//!
//! The store handle owns a connection pool that must be released
//! deterministically: open it at session start, call
//! [`CustodyStore::close`] at teardown. Absence of a key is a normal
//! answer (`Ok(None)`), not an error; only a broken storage backend is.

pub mod custody;
pub mod error;

pub use custody::CustodyStore;
pub use error::StoreError;
