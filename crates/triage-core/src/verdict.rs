//! The final triage/report verdict.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of a scan or a report. `Error` is reserved for the one case
/// spec'd as always out-of-band: `build_report` was asked about an extension
/// database id that doesn't exist (spec.md §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    Clean,
    Suspicious,
    Malicious,
    Unknown,
    Error,
}

impl Verdict {
    pub fn is_escalated(self) -> bool {
        matches!(self, Verdict::Suspicious | Verdict::Malicious)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Verdict::Clean => "CLEAN",
            Verdict::Suspicious => "SUSPICIOUS",
            Verdict::Malicious => "MALICIOUS",
            Verdict::Unknown => "UNKNOWN",
            Verdict::Error => "ERROR",
        };
        write!(f, "{s}")
    }
}

impl Default for Verdict {
    fn default() -> Self {
        Verdict::Unknown
    }
}
