//! Embedded persistence for the triage pipeline: extensions, publishers,
//! append-only scan history, and the blocklist, backed by `sled`.
//!
//! ```text
//! +------------+     +------------+     +--------------+     +------------+
//! | publishers | <-- | extensions | --> | scan_history | <-- | blocklist  |
//! +------------+     +------------+     +--------------+     +------------+
//! ```
//!
//! `Store` only depends on `triage-core`, so it can be wired into both
//! `triage-pipeline` (writing results) and `triage-cli` (reading them) without
//! either pulling in the static-analysis or AI stages.

mod error;
mod store;

pub use error::StorageError;
pub use store::Store;
