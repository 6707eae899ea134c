//! ReportBuilder: fuses a `PipelineResult` with marketplace trust signals,
//! optional external reputation, and an optional campaign score into the
//! final `ThreatReport`, then persists one `ScanHistory` row. Grounded in
//! `original_source/core/triage/report_builder.py`.

use serde::{Deserialize, Serialize};
use triage_core::{Finding, Publisher, ScanHistoryRow, ScanState, Severity, Verdict};
use triage_store::{StorageError, Store};

use crate::pipeline::PipelineResult;

const MALICIOUS_THRESHOLD: f64 = 0.7;
const SUSPICIOUS_THRESHOLD: f64 = 0.35;

/// Marketplace/reputation/cross-reference inputs ReportBuilder combines
/// with the triage composite. All optional, since marketplace lookups and
/// reputation enrichment are out of scope for this core (spec.md §1) —
/// callers that have them wire them in here.
#[derive(Debug, Clone, Default)]
pub struct ReportInputs<'a> {
    pub publisher: Option<&'a Publisher>,
    pub install_count: u64,
    pub average_rating: f64,
    pub is_blocklisted: bool,
    /// `Some(d)` when an external reputation service reports `d` malicious
    /// detections for this package.
    pub external_malicious_detections: Option<u32>,
    /// `Some(score)` in `[0,1]` when cross-reference analysis ties this
    /// package to a known campaign.
    pub campaign_score: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FindingsBySeverity {
    pub critical: Vec<Finding>,
    pub high: Vec<Finding>,
    pub medium: Vec<Finding>,
    pub info_and_low: Vec<Finding>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreatReport {
    pub extension_id: String,
    pub version: String,
    pub verdict: Verdict,
    pub confidence: f64,
    pub composite_score: f64,
    pub ai_vibe_score: f64,
    pub static_analysis_score: f64,
    pub behavioral_score: f64,
    pub trust_score: f64,
    pub findings: FindingsBySeverity,
    pub escalation_reasons: Vec<String>,
}

pub struct ReportBuilder<'a> {
    store: &'a Store,
    scoring: triage_core::ScoringWeights,
}

impl<'a> ReportBuilder<'a> {
    pub fn new(store: &'a Store, scoring: triage_core::ScoringWeights) -> Self {
        Self { store, scoring }
    }

    pub fn build(
        &self,
        extension_id: &str,
        version: &str,
        pipeline_result: &PipelineResult,
        inputs: &ReportInputs,
    ) -> Result<ThreatReport, StorageError> {
        let trust_score = trust_signal_score(inputs);

        let ai_risk = pipeline_result.ai_risk();
        let meta_risk = pipeline_result.meta_risk();
        let forensic_risk = pipeline_result.forensic_risk();
        let yara_risk = pipeline_result.yara_risk();
        let static_analysis_score = meta_risk.max(forensic_risk).max(yara_risk);

        // No sandbox detonation is performed in this core, so the behavioral
        // term is always 0 — yara_risk already entered the composite above
        // as part of static_analysis_score and must not be counted twice.
        let behavioral_score = 0.0;

        let w = &self.scoring;
        let triage_composite = ai_risk * w.ai_vibe_weight
            + static_analysis_score * w.static_analysis_weight
            + behavioral_score * w.behavioral_weight
            + trust_score * w.trust_signal_weight;

        let reputation_bonus = inputs
            .external_malicious_detections
            .map(|d| (d as f64 / 10.0).min(0.5))
            .unwrap_or(0.0);
        let campaign_bonus = inputs.campaign_score.unwrap_or(0.0) * 0.1;

        let findings = partition_findings(pipeline_result.all_findings());

        let composite_score = if inputs.is_blocklisted {
            1.0
        } else {
            (triage_composite + reputation_bonus + campaign_bonus).min(1.0)
        };

        let verdict = final_verdict(inputs, composite_score, findings.critical.len());
        let confidence = confidence_score(inputs, ai_risk);

        let report = ThreatReport {
            extension_id: extension_id.to_string(),
            version: version.to_string(),
            verdict,
            confidence,
            composite_score,
            ai_vibe_score: ai_risk,
            static_analysis_score,
            behavioral_score,
            trust_score,
            findings,
            escalation_reasons: pipeline_result.escalation_reasons.clone(),
        };

        self.persist(extension_id, version, &report)?;
        Ok(report)
    }

    fn persist(&self, extension_id: &str, version: &str, report: &ThreatReport) -> Result<(), StorageError> {
        let summary = serde_json::json!({
            "critical": report.findings.critical.len(),
            "high": report.findings.high.len(),
            "medium": report.findings.medium.len(),
            "info": report.findings.info_and_low.len(),
            "verdict": report.verdict.to_string(),
        });

        let row = ScanHistoryRow {
            extension_db_id: format!("{extension_id}@{version}"),
            scan_type: "full".to_string(),
            ai_vibe_score: report.ai_vibe_score,
            static_score: report.static_analysis_score,
            behavioral_score: report.behavioral_score,
            trust_score: report.trust_score,
            composite_score: report.composite_score,
            risk_score: report.composite_score,
            findings_json: summary.to_string(),
            raw_ai_response: None,
        };
        self.store.append_scan_history(&row)?;

        let next_state = if report.verdict.is_escalated() { ScanState::Flagged } else { ScanState::Clean };
        self.store.update_scan_state(extension_id, version, next_state)?;

        Ok(())
    }
}

/// Trust-signal score: 0 = fully trusted, 1 = fully untrusted. Starts at
/// 0.5 and is nudged by marketplace signals (spec.md §4.8).
fn trust_signal_score(inputs: &ReportInputs) -> f64 {
    if inputs.is_blocklisted {
        return 1.0;
    }

    let mut score = 0.5;

    if inputs.install_count >= 1_000_000 {
        score -= 0.3;
    } else if inputs.install_count >= 100_000 {
        score -= 0.2;
    } else if inputs.install_count >= 10_000 {
        score -= 0.1;
    } else if inputs.install_count < 10 {
        score += 0.25;
    } else if inputs.install_count < 100 {
        score += 0.15;
    }

    match inputs.publisher {
        Some(p) if p.is_domain_verified => score -= 0.15,
        _ => score += 0.10,
    }

    if inputs.average_rating >= 4.0 {
        score -= 0.05;
    } else if inputs.average_rating > 0.0 && inputs.average_rating < 2.0 {
        score += 0.10;
    }

    score.clamp(0.0, 1.0)
}

fn final_verdict(inputs: &ReportInputs, composite_score: f64, critical_count: usize) -> Verdict {
    if inputs.is_blocklisted {
        return Verdict::Malicious;
    }
    if inputs.external_malicious_detections.unwrap_or(0) >= 5 {
        return Verdict::Malicious;
    }
    if composite_score >= MALICIOUS_THRESHOLD {
        return Verdict::Malicious;
    }
    if composite_score >= SUSPICIOUS_THRESHOLD {
        return Verdict::Suspicious;
    }
    if critical_count > 0 {
        return Verdict::Suspicious;
    }
    Verdict::Clean
}

fn confidence_score(inputs: &ReportInputs, ai_risk: f64) -> f64 {
    let mut confidence = 0.5;
    if inputs.external_malicious_detections.is_some() {
        confidence += 0.15;
    }
    if ai_risk > 0.0 {
        confidence += 0.10;
    }
    if inputs.campaign_score.is_some() {
        confidence += 0.15;
    }
    if inputs.is_blocklisted {
        confidence += 0.30;
    }
    confidence.min(1.0)
}

fn partition_findings(findings: Vec<&Finding>) -> FindingsBySeverity {
    let mut out = FindingsBySeverity {
        critical: Vec::new(),
        high: Vec::new(),
        medium: Vec::new(),
        info_and_low: Vec::new(),
    };
    for f in findings {
        match f.severity {
            Severity::Critical => out.critical.push(f.clone()),
            Severity::High => out.high.push(f.clone()),
            Severity::Medium => out.medium.push(f.clone()),
            Severity::Low | Severity::Info => out.info_and_low.push(f.clone()),
        }
    }
    out
}
