//! Orchestration layer: runs the static-analysis and AI stages in sequence,
//! computes the triage composite, and (via `ReportBuilder`) fuses that
//! composite with marketplace trust signals into a persisted report.
//!
//! ```text
//! Pipeline::run()  ->  PipelineResult  ->  ReportBuilder::build()  ->  ThreatReport
//!                                                  |
//!                                                  v
//!                                          triage_store::Store
//! ```

mod pipeline;
mod report;
mod stage;

pub use pipeline::{Pipeline, PipelineResult};
pub use report::{FindingsBySeverity, ReportBuilder, ReportInputs, ThreatReport};
pub use stage::StageOutcome;
