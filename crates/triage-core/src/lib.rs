//! # Triage Core
//!
//! Shared types, configuration, and error handling for static triage of
//! editor-extension packages (VSIX-style ZIP archives).
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────────┐
//! │                         triage-pipeline                            │
//! ├──────────────┬──────────────┬──────────────┬───────────────────────┤
//! │ triage-archive │ triage-rules │  triage-ai   │     triage-store      │
//! │  (ZIP safety)  │ (manifest/   │ (LLM static  │ (sled-backed scan    │
//! │                │  forensic/   │  review)     │  history + state     │
//! │                │  rule/       │              │  machine)            │
//! │                │  deobfus.)   │              │                      │
//! └──────────────┴──────────────┴──────────────┴───────────────────────┘
//!                          │
//!                          ▼
//!                     triage-core
//!           (types, error, config — this crate)
//! ```
//!
//! Every stage crate depends only on `triage-core`; `triage-pipeline` is the
//! only crate that depends on all of them, keeping the dependency graph a
//! strict DAG.
//!
//! ## Threat Coverage
//!
//! | Stage | Detects |
//! |-------|---------|
//! | ArchiveReader | zip-slip path traversal, zip-bomb declared-size abuse |
//! | ManifestScanner | wildcard activation, lifecycle scripts, risky API surface |
//! | ForensicChecker | masqueraded/hidden executables, double extensions |
//! | RuleEngine | obfuscated eval, credential theft, data exfiltration |
//! | Deobfuscator | packed/minified payloads (advisory only) |
//! | AIAnalyzer | semantic review of the highest-risk source files |

mod config;
mod error;
mod types;
mod verdict;

pub use config::{
    AiConfig, MarketplaceConfig, ResourceConfig, ScoringWeights, StorageConfig, TriageConfig,
};
pub use error::TriageError;
pub use types::{
    weighted_risk, BlocklistEntry, BlocklistRemovalType, Extension, Finding, LatestState, Package,
    Publisher, ScanHistoryRow, ScanState, Severity,
};
pub use verdict::Verdict;

/// Result type for triage-core operations and for any stage crate that needs
/// to surface a fatal, non-recoverable error up through the pipeline.
pub type Result<T> = std::result::Result<T, TriageError>;
