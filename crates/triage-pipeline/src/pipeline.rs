//! Sequential scan orchestration: manifest -> forensic -> rules -> (optional)
//! AI, folding each stage's contribution into a composite risk score.
//! Grounded in `original_source/core/triage/pipeline.py`'s stage ordering,
//! and in `sentinel-council`'s "run each participant, fold into a consensus
//! score" shape for the orchestrator itself.

use std::path::Path;

use tracing::{info, warn};
use triage_archive::ArchiveReader;
use triage_core::{Finding, ScoringWeights, Severity, TriageConfig, TriageError, Verdict};
use triage_rules::{ForensicChecker, ForensicScanResult, ManifestScanner, MetadataScanResult, RuleEngine, RuleScanResult};
use triage_ai::{AiAnalysisResult, AiAnalyzer};

use crate::stage::StageOutcome;

const MALICIOUS_THRESHOLD: f64 = 0.8;
const SUSPICIOUS_THRESHOLD: f64 = 0.4;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PipelineResult {
    pub manifest: StageOutcome<MetadataScanResult>,
    pub forensic: StageOutcome<ForensicScanResult>,
    pub rules: StageOutcome<RuleScanResult>,
    pub ai: Option<AiAnalysisResult>,
    pub composite_risk: f64,
    pub verdict: Verdict,
    pub escalate: bool,
    pub escalation_reasons: Vec<String>,
}

impl PipelineResult {
    pub fn meta_risk(&self) -> f64 {
        self.manifest.result.as_ref().map(|m| m.risk_score).unwrap_or(0.0)
    }

    pub fn forensic_risk(&self) -> f64 {
        self.forensic.result.as_ref().map(|f| f.risk_score).unwrap_or(0.0)
    }

    pub fn yara_risk(&self) -> f64 {
        self.rules.result.as_ref().map(|r| r.risk_score).unwrap_or(0.0)
    }

    pub fn ai_risk(&self) -> f64 {
        self.ai.as_ref().map(|a| a.risk_score).unwrap_or(0.0)
    }

    /// Every finding produced by the three static stages. The AI stage
    /// never emits `Finding`s of its own — its output is a verdict and a
    /// prose summary, not line-level matches.
    pub fn all_findings(&self) -> Vec<&triage_core::Finding> {
        let mut out = Vec::new();
        if let Some(m) = &self.manifest.result {
            out.extend(m.findings.iter());
        }
        if let Some(f) = &self.forensic.result {
            out.extend(f.findings.iter());
        }
        if let Some(r) = &self.rules.result {
            out.extend(r.findings.iter());
        }
        out
    }

    pub fn critical_count(&self) -> usize {
        self.all_findings().iter().filter(|f| f.severity == Severity::Critical).count()
    }

    pub fn high_count(&self) -> usize {
        self.all_findings().iter().filter(|f| f.severity == Severity::High).count()
    }
}

pub struct Pipeline {
    manifest_scanner: ManifestScanner,
    forensic_checker: ForensicChecker,
    rule_engine: RuleEngine,
    ai_analyzer: AiAnalyzer,
    scoring: ScoringWeights,
    entry_cap_bytes: u64,
}

impl Pipeline {
    pub fn new(config: &TriageConfig) -> Self {
        let rule_cap = config.resources.rule_engine_read_cap_mb * 1024 * 1024;
        let manifest_cap = config.resources.manifest_read_cap_mb * 1024 * 1024;
        let entry_cap_bytes = config.resources.entry_max_mb * 1024 * 1024;
        Self {
            manifest_scanner: ManifestScanner::new(manifest_cap),
            forensic_checker: ForensicChecker::new(rule_cap),
            rule_engine: RuleEngine::new(rule_cap),
            ai_analyzer: AiAnalyzer::new(config.ai.clone()),
            scoring: config.scoring.clone(),
            entry_cap_bytes,
        }
    }

    /// Runs every stage against the archive at `archive_path`.
    ///
    /// `pre_ai`, if given, is invoked once RuleEngine completes and strictly
    /// before AIAnalyzer starts, with the intermediate result — this is the
    /// hook a caller uses to emit an early report and persist
    /// `STATIC_SCANNED` before the slow AI stage begins. Returning `false`
    /// skips the AI call entirely. `stop_check`, if given, is a cooperative
    /// cancellation point consulted at the same spot.
    ///
    /// Triage always returns a `PipelineResult`, never a hard error: an
    /// unreadable archive records a CRITICAL `BAD_ARCHIVE` finding (and
    /// skips the remaining stages, since there is nothing left to read), and
    /// a missing manifest records a CRITICAL `MISSING_MANIFEST` finding with
    /// the manifest stage's risk pinned to 1.0, then continues on to
    /// forensic/rule scanning of the rest of the archive (spec.md §7).
    pub async fn run(
        &self,
        archive_path: &Path,
        pre_ai: Option<&dyn Fn(&PipelineResult) -> bool>,
        stop_check: Option<&dyn Fn() -> bool>,
    ) -> Result<PipelineResult, TriageError> {
        let mut archive = match ArchiveReader::open(archive_path, self.entry_cap_bytes) {
            Ok(archive) => archive,
            Err(e) => {
                warn!("failed to open archive: {e}");
                return Ok(self.finish(PipelineResult {
                    manifest: StageOutcome::ok(bad_archive_result(&e)),
                    forensic: StageOutcome::failed("archive could not be opened, forensic scan skipped"),
                    rules: StageOutcome::failed("archive could not be opened, rule scan skipped"),
                    ai: None,
                    composite_risk: 0.0,
                    verdict: Verdict::Unknown,
                    escalate: false,
                    escalation_reasons: Vec::new(),
                }));
            }
        };

        let manifest = match self.manifest_scanner.scan(&mut archive) {
            Ok(Some(r)) => StageOutcome::ok(r),
            Ok(None) => {
                warn!("no package.json manifest found in archive");
                StageOutcome::ok(missing_manifest_result())
            }
            Err(e) => {
                warn!("manifest scan failed: {e}");
                StageOutcome::failed(e)
            }
        };

        let forensic = match self.forensic_checker.scan(&mut archive) {
            Ok(r) => StageOutcome::ok(r),
            Err(e) => {
                warn!("forensic scan failed: {e}");
                StageOutcome::failed(e)
            }
        };

        let rules = match self.rule_engine.scan(&mut archive) {
            Ok(r) => StageOutcome::ok(r),
            Err(e) => {
                warn!("rule scan failed: {e}");
                StageOutcome::failed(e)
            }
        };

        let mut result = PipelineResult {
            manifest,
            forensic,
            rules,
            ai: None,
            composite_risk: 0.0,
            verdict: Verdict::Unknown,
            escalate: false,
            escalation_reasons: Vec::new(),
        };

        let run_ai = pre_ai.map(|f| f(&result)).unwrap_or(true);
        let stopped = stop_check.map(|f| f()).unwrap_or(false);

        if run_ai && !stopped {
            let flagged: Vec<String> = result
                .rules
                .result
                .as_ref()
                .map(|r| r.findings.iter().filter_map(|f| f.file_path.clone()).collect())
                .unwrap_or_default();
            let main = result.manifest.result.as_ref().and_then(|m| m.main_entry.as_deref());
            let browser = result.manifest.result.as_ref().and_then(|m| m.browser_entry.as_deref());
            result.ai = Some(self.ai_analyzer.analyze(&mut archive, &flagged, main, browser).await);
        }

        Ok(self.finish(result))
    }

    /// Computes the composite/verdict/escalation fields on a result whose
    /// stage outcomes are already settled.
    fn finish(&self, mut result: PipelineResult) -> PipelineResult {
        result.composite_risk = self.composite(&result);
        result.verdict = self.triage_verdict(&result);
        result.escalate = result.verdict.is_escalated();
        result.escalation_reasons = self.escalation_reasons(&result);

        info!(composite = result.composite_risk, verdict = %result.verdict, "pipeline scan complete");
        result
    }

    /// Composite risk formula (spec.md §4.7). `meta_risk` is weighted twice
    /// on purpose: once folded into the static-analysis pairing with
    /// `forensic_risk`, once again standalone against `trust_signal_weight`.
    /// `ReportBuilder`'s final composite reuses these same four weights but
    /// pairs `static_analysis_weight` with `max(meta, forensic, yara)`
    /// instead of this average — see DESIGN.md.
    fn composite(&self, result: &PipelineResult) -> f64 {
        let meta_risk = result.meta_risk();
        let forensic_risk = result.forensic_risk();
        let yara_risk = result.yara_risk();
        let ai_risk = result.ai_risk();

        let w = &self.scoring;
        let composite = ai_risk * w.ai_vibe_weight
            + ((meta_risk + forensic_risk) / 2.0) * w.static_analysis_weight
            + yara_risk * w.behavioral_weight
            + meta_risk * w.trust_signal_weight;

        composite.min(1.0)
    }

    fn triage_verdict(&self, result: &PipelineResult) -> Verdict {
        if result.composite_risk >= MALICIOUS_THRESHOLD {
            Verdict::Malicious
        } else if result.composite_risk >= SUSPICIOUS_THRESHOLD {
            Verdict::Suspicious
        } else if result.critical_count() > 0 {
            Verdict::Suspicious
        } else {
            Verdict::Clean
        }
    }

    fn escalation_reasons(&self, result: &PipelineResult) -> Vec<String> {
        if !result.verdict.is_escalated() {
            return Vec::new();
        }
        let mut reasons = Vec::new();
        if result.critical_count() >= 1 {
            reasons.push(format!("{} CRITICAL finding(s)", result.critical_count()));
        }
        if result.high_count() >= 3 {
            reasons.push(format!("{} HIGH finding(s)", result.high_count()));
        }
        if result.composite_risk >= SUSPICIOUS_THRESHOLD {
            reasons.push(format!("composite risk {:.2} crossed the escalation threshold", result.composite_risk));
        }
        if let Some(ai) = &result.ai {
            if ai.verdict.is_escalated() {
                reasons.push(format!("AI Vibe Check verdict {}: {}", ai.verdict, ai.summary));
            }
        }
        reasons
    }
}

/// Synthetic manifest-stage result for an archive that could not be opened
/// at all (zip-slip, truncation, zip-bomb cap). Forensic and rule stages
/// have nothing left to scan, so this is the only finding the result
/// carries — it alone is enough to force an escalated verdict.
fn bad_archive_result(err: &TriageError) -> MetadataScanResult {
    MetadataScanResult {
        risk_score: 1.0,
        findings: vec![Finding::new(
            Severity::Critical,
            "BAD_ARCHIVE",
            format!("archive could not be opened: {err}"),
        )],
        ..Default::default()
    }
}

/// Synthetic manifest-stage result for an archive with no `package.json`.
/// Unlike `bad_archive_result`, the archive itself is still readable, so
/// the forensic and rule stages keep running against it.
fn missing_manifest_result() -> MetadataScanResult {
    MetadataScanResult {
        risk_score: 1.0,
        findings: vec![Finding::new(
            Severity::Critical,
            "MISSING_MANIFEST",
            "archive has no extension/package.json or package.json",
        )],
        ..Default::default()
    }
}
