//! Local error type for the manifest/forensic/rule/deobfuscation stages.
//!
//! None of these variants are fatal to a scan: the pipeline catches them at
//! the stage boundary, logs a warning, and records a zero-contribution
//! result rather than aborting (spec.md §7, `StageFailure`).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RulesError {
    #[error("failed to read archive entry: {0}")]
    ArchiveRead(#[from] triage_archive::ReadError),

    #[error("manifest is not valid JSON: {0}")]
    InvalidManifest(#[from] serde_json::Error),

    #[error("invalid regex pattern: {0}")]
    Pattern(#[from] regex::Error),
}
