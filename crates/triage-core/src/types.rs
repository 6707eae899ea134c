//! Data model shared by every stage: packages, publishers, findings, and the
//! scan state machine. Grounded in `original_source/db/models.py`'s schema,
//! with the PostgreSQL-specific bits (serial ids, `ON CONFLICT`) replaced by
//! plain Rust types that `triage-store` persists into `sled`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// `(extension_id, version)` uniquely identifies a scanned package.
/// `extension_id` is always `publisher_name.extension_name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Package {
    pub extension_id: String,
    pub version: String,
}

impl Package {
    pub fn new(extension_id: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            extension_id: extension_id.into(),
            version: version.into(),
        }
    }

    /// Extension ids are matched case-insensitively on input, but the
    /// canonical casing supplied at first registration is what gets stored
    /// and displayed (spec.md §9, open question 3).
    pub fn matches_id(&self, other: &str) -> bool {
        self.extension_id.eq_ignore_ascii_case(other)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Publisher {
    pub publisher_id: String,
    pub publisher_name: String,
    pub domain: Option<String>,
    pub is_domain_verified: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Extension {
    pub extension_id: String,
    pub version: String,
    pub display_name: Option<String>,
    pub vsix_hash_sha256: Option<String>,
    pub install_count: u64,
    pub average_rating: f64,
    pub publisher_id: Option<String>,
    pub scan_state: ScanState,
    pub latest_state: LatestState,
    pub risk_score: Option<f64>,
}

/// The archive-scan state machine (spec.md §3). `StaticScanned` carries the
/// legacy name `STATIC_COMPLETE` used by older rows in the original schema;
/// both serialize/deserialize to the same variant so historical data loads
/// cleanly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanState {
    Queued,
    Downloading,
    StaticScanning,
    #[serde(alias = "STATIC_COMPLETE")]
    StaticScanned,
    Heavyweight,
    Clean,
    Flagged,
}

impl ScanState {
    /// Whether `self -> next` is a legal transition. Any state may reset back
    /// to `Queued` (a rescan); otherwise transitions only move forward
    /// through the pipeline below, per spec.md invariant (b).
    pub fn can_transition_to(self, next: ScanState) -> bool {
        use ScanState::*;
        if next == Queued || next == self {
            return true;
        }
        matches!(
            (self, next),
            (Queued, Downloading)
                | (Downloading, StaticScanning)
                | (StaticScanning, StaticScanned)
                | (StaticScanning, Heavyweight)
                | (Heavyweight, StaticScanned)
                | (StaticScanned, Clean)
                | (StaticScanned, Flagged)
        )
    }

    /// Derived dashboard bucket, kept even though the dashboard itself is a
    /// non-goal: it is pure state-machine logic, not UI.
    pub fn latest_state(self) -> LatestState {
        match self {
            ScanState::Clean => LatestState::Clean,
            ScanState::Flagged => LatestState::Flagged,
            ScanState::StaticScanning | ScanState::Downloading | ScanState::Heavyweight => {
                LatestState::Scanning
            }
            ScanState::Queued | ScanState::StaticScanned => LatestState::Pending,
        }
    }
}

impl fmt::Display for ScanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ScanState::Queued => "QUEUED",
            ScanState::Downloading => "DOWNLOADING",
            ScanState::StaticScanning => "STATIC_SCANNING",
            ScanState::StaticScanned => "STATIC_SCANNED",
            ScanState::Heavyweight => "HEAVYWEIGHT",
            ScanState::Clean => "CLEAN",
            ScanState::Flagged => "FLAGGED",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LatestState {
    Pending,
    Scanning,
    Clean,
    Flagged,
}

impl fmt::Display for LatestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LatestState::Pending => "pending",
            LatestState::Scanning => "scanning",
            LatestState::Clean => "clean",
            LatestState::Flagged => "flagged",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlocklistRemovalType {
    Malware,
    Impersonation,
    Untrustworthy,
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlocklistEntry {
    pub extension_id: String,
    pub removal_date: String,
    pub removal_type: BlocklistRemovalType,
}

/// A single append-only scan-history row as written by `ReportBuilder`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanHistoryRow {
    pub extension_db_id: String,
    pub scan_type: String,
    pub ai_vibe_score: f64,
    pub static_score: f64,
    pub behavioral_score: f64,
    pub trust_score: f64,
    pub composite_score: f64,
    pub risk_score: f64,
    pub findings_json: String,
    pub raw_ai_response: Option<String>,
}

/// Severity of a single finding, shared across every analysis stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Weight used in every severity-weighted risk sum in the pipeline
    /// (`metadata_scanner.py`, `forensic_check.py`, `yara_engine.py` all use
    /// this exact table).
    pub fn weight(self) -> f64 {
        match self {
            Severity::Critical => 0.4,
            Severity::High => 0.15,
            Severity::Medium => 0.05,
            Severity::Low => 0.02,
            Severity::Info => 0.01,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Critical => "CRITICAL",
            Severity::High => "HIGH",
            Severity::Medium => "MEDIUM",
            Severity::Low => "LOW",
            Severity::Info => "INFO",
        };
        write!(f, "{s}")
    }
}

/// A single finding emitted by any static-analysis stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub severity: Severity,
    pub category: String,
    pub description: String,
    pub file_path: Option<String>,
    pub line_number: Option<u32>,
    pub matched_text: Option<String>,
}

impl Finding {
    pub fn new(severity: Severity, category: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            severity,
            category: category.into(),
            description: description.into(),
            file_path: None,
            line_number: None,
            matched_text: None,
        }
    }

    pub fn with_file(mut self, path: impl Into<String>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    pub fn with_line(mut self, line: u32) -> Self {
        self.line_number = Some(line);
        self
    }

    pub fn with_match(mut self, matched: impl Into<String>) -> Self {
        let mut text: String = matched.into();
        text.truncate(200);
        self.matched_text = Some(text);
        self
    }
}

/// Sum `severity.weight()` across `findings`, capped at 1.0. The common risk
/// formula shared by ManifestScanner, ForensicChecker, and RuleEngine.
pub fn weighted_risk(findings: &[Finding]) -> f64 {
    findings.iter().map(|f| f.severity.weight()).sum::<f64>().min(1.0)
}
