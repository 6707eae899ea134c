//! Error types shared across the triage pipeline.

use thiserror::Error;

/// Fatal errors that abort a scan (or a caller-visible operation) outright.
///
/// Most per-stage failures do *not* produce a `TriageError` — they are caught
/// at the stage boundary and recorded as a zero-contribution finding instead,
/// so a single broken rule or a flaky AI backend never aborts the whole scan.
/// The variants here are reserved for conditions spec'd as always-fatal
/// (bad/hostile archives) or for the single database error that the pipeline
/// is required to surface to its caller.
#[derive(Debug, Error)]
pub enum TriageError {
    /// The archive could not be opened as a valid ZIP (corrupt central
    /// directory, truncated stream, etc).
    #[error("bad archive: {0}")]
    BadArchive(String),

    /// An entry's name escapes the archive root (leading `/`, `..` segment,
    /// or a path that normalizes outside the extraction root).
    #[error("zip-slip: unsafe entry path {0:?}")]
    ZipSlip(String),

    /// An entry declares an uncompressed size larger than the configured
    /// per-entry cap. Checked against the declared size before any bytes are
    /// read, so this never requires decompressing attacker-controlled input.
    #[error("zip-bomb: entry {entry:?} declares {declared_size} bytes, limit is {limit}")]
    ZipBomb {
        entry: String,
        declared_size: u64,
        limit: u64,
    },

    /// Neither `extension/package.json` nor `package.json` exists in the
    /// archive.
    #[error("manifest not found")]
    MissingManifest,

    /// A resource cap was hit in a way that stops a stage from completing
    /// (oversized source file, archive over the heavyweight threshold). Not
    /// fatal to the scan — the stage continues with what it already
    /// collected — but callers that need to know may match on it.
    #[error("limit exceeded: {0}")]
    LimitExceeded(String),

    /// Persistence failed. This is the one stage error that *is* propagated
    /// to `build_report`'s caller; an in-memory `ThreatReport` is still
    /// returned alongside it.
    #[error("database error: {0}")]
    Database(String),

    /// `build_report` was asked to report on an extension database id that
    /// does not exist. Maps to `Verdict::Error`.
    #[error("extension record not found: {0}")]
    ExtensionNotFound(String),

    /// Malformed or missing configuration value.
    #[error("configuration error: {0}")]
    Config(String),
}
