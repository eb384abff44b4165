//! Persistent layer cache state
//!
//! Images themselves live in the container runtime, tagged by stage
//! signature. What the runtime cannot tell us is which commit of each
//! repository was baked into a cached source layer. The commit ledger
//! records that, one small file per key.
//!
//! # Ledger keys
//!
//! | Field | Source |
//! |-------|--------|
//! | repository | file-safe repository identity |
//! | stage | stage name |
//! | params | repository parameter hash |
//! | checksum | dependencies checksum of the stage |
//!
//! The checksum makes the path itself cache-sensitive: a changed upstream
//! stage produces a different path, so stale commits are never returned.

pub mod ledger;

pub use ledger::{CommitLedger, LedgerEntry, LedgerKey};
