//! # Triage Rules
//!
//! Static analysis stages that never need the network: manifest parsing,
//! forensic magic-byte checks, regex rule matching, and best-effort
//! deobfuscation. Each is grounded in the matching module under
//! `original_source/core/triage/` and implemented without any dependency
//! beyond `triage-core` and `triage-archive`.

mod deobfuscator;
mod error;
mod forensic;
mod manifest;
mod rules;

pub use deobfuscator::{DeobfuscationResult, Deobfuscator};
pub use error::RulesError;
pub use forensic::{ForensicChecker, ForensicScanResult};
pub use manifest::{ManifestScanner, MetadataScanResult};
pub use rules::{RuleEngine, RuleScanResult};
