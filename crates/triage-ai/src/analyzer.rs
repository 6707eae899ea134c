//! AIAnalyzer: the "AI Vibe Check" stage. Sends selected source chunks to
//! an inference endpoint and folds the model's per-chunk judgments into a
//! single verdict for the package. Grounded in
//! `original_source/core/triage/ai_vibe_check.py`.

use serde::{Deserialize, Serialize};
use tracing::warn;
use triage_archive::ArchiveReader;
use triage_core::{AiConfig, Verdict};

use crate::chunker::chunk_source;
use crate::client::ChatClient;
use crate::prompts::{user_prompt, SYSTEM_PROMPT};
use crate::targets::select_targets;

/// The model's judgment on one file, after fusing its chunks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileAnalysis {
    pub file_path: String,
    pub risk_score: f64,
    pub confidence: f64,
    pub verdict: Verdict,
    pub summary: String,
}

/// The fused result across every file the analyzer looked at.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiAnalysisResult {
    pub verdict: Verdict,
    pub risk_score: f64,
    pub confidence: f64,
    pub files: Vec<FileAnalysis>,
    pub summary: String,
}

impl AiAnalysisResult {
    fn not_configured() -> Self {
        Self {
            verdict: Verdict::Unknown,
            risk_score: 0.0,
            confidence: 0.0,
            files: Vec::new(),
            summary: "no inference endpoint configured, AI Vibe Check skipped".to_string(),
        }
    }

    fn unknown(reason: &str) -> Self {
        Self {
            verdict: Verdict::Unknown,
            risk_score: 0.0,
            confidence: 0.0,
            files: Vec::new(),
            summary: reason.to_string(),
        }
    }
}

pub struct AiAnalyzer {
    config: AiConfig,
    client: Option<ChatClient>,
}

impl AiAnalyzer {
    pub fn new(config: AiConfig) -> Self {
        let client = match ChatClient::new(&config) {
            Ok(client) => Some(client),
            Err(e) => {
                warn!("AI analyzer disabled: {e}");
                None
            }
        };
        Self { config, client }
    }

    pub async fn analyze(
        &self,
        archive: &mut ArchiveReader,
        flagged_files: &[String],
        manifest_main: Option<&str>,
        manifest_browser: Option<&str>,
    ) -> AiAnalysisResult {
        let Some(client) = &self.client else {
            return AiAnalysisResult::not_configured();
        };

        let targets = select_targets(flagged_files, manifest_main, manifest_browser);
        if targets.is_empty() {
            return AiAnalysisResult::unknown("no analyzable source files found");
        }

        let mut files = Vec::new();
        for target in &targets {
            let Ok(bytes) = archive.read(target, 2 * 1024 * 1024) else {
                continue;
            };
            let Ok(source) = String::from_utf8(bytes) else {
                continue;
            };
            let chunks = chunk_source(&source, self.config.max_chunk_tokens, self.config.max_chunks_per_file);
            if chunks.is_empty() {
                continue;
            }

            let mut chunk_results = Vec::new();
            for chunk in &chunks {
                chunk_results.push(self.analyze_chunk(client, target, chunk).await);
            }
            files.push(fuse_chunks(target, chunk_results));
        }

        if files.is_empty() {
            return AiAnalysisResult::unknown("no files produced analyzable content");
        }

        fuse_files(files)
    }

    async fn analyze_chunk(&self, client: &ChatClient, file: &str, chunk: &str) -> FileAnalysis {
        let prompt = user_prompt(file, chunk);
        match client
            .stream_chat(SYSTEM_PROMPT, &prompt, self.config.max_tokens, self.config.temperature)
            .await
        {
            Ok(outcome) => parse_model_response(file, &outcome.content),
            Err(e) => {
                warn!("AI analysis request for {file} failed: {e}");
                connection_fallback(file)
            }
        }
    }
}

/// The model is expected to answer with a bare JSON object; anything else
/// gets the non-JSON fallback rather than being treated as a hard failure,
/// since a chatty model that wraps JSON in prose still usually means the
/// request succeeded.
fn parse_model_response(file: &str, content: &str) -> FileAnalysis {
    let trimmed = extract_json_object(content);
    match trimmed.and_then(|s| serde_json::from_str::<serde_json::Value>(s).ok()) {
        Some(value) => {
            let risk_score = value["risk_score"].as_f64().unwrap_or(0.5).clamp(0.0, 1.0);
            let confidence = value["confidence"].as_f64().unwrap_or(0.3).clamp(0.0, 1.0);
            let verdict = match value["verdict"].as_str().unwrap_or("").to_uppercase().as_str() {
                "MALICIOUS" => Verdict::Malicious,
                "SUSPICIOUS" => Verdict::Suspicious,
                "CLEAN" => Verdict::Clean,
                _ => Verdict::Unknown,
            };
            let summary = value["summary"].as_str().unwrap_or("").to_string();
            FileAnalysis { file_path: file.to_string(), risk_score, confidence, verdict, summary }
        }
        None => non_json_fallback(file),
    }
}

fn extract_json_object(content: &str) -> Option<&str> {
    let start = content.find('{')?;
    let end = content.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&content[start..=end])
}

fn non_json_fallback(file: &str) -> FileAnalysis {
    FileAnalysis {
        file_path: file.to_string(),
        risk_score: 0.5,
        confidence: 0.3,
        verdict: Verdict::Suspicious,
        summary: "model response was not valid JSON".to_string(),
    }
}

fn connection_fallback(file: &str) -> FileAnalysis {
    FileAnalysis {
        file_path: file.to_string(),
        risk_score: 0.5,
        confidence: 0.0,
        verdict: Verdict::Unknown,
        summary: "AI analysis unavailable".to_string(),
    }
}

/// Chunks within a single file share a fixed confidence: a multi-chunk file
/// is one judgment spread over several requests, not several independent
/// opinions, so the aggregate confidence doesn't average up with sample
/// size the way the cross-file aggregate does.
fn fuse_chunks(file: &str, chunk_results: Vec<FileAnalysis>) -> FileAnalysis {
    if chunk_results.len() == 1 {
        return chunk_results.into_iter().next().unwrap();
    }

    let risk_score = chunk_results.iter().map(|c| c.risk_score).fold(0.0_f64, f64::max);
    let verdict = worst_verdict(chunk_results.iter().map(|c| c.verdict));
    let summary = chunk_results
        .iter()
        .find(|c| c.verdict == verdict)
        .map(|c| c.summary.clone())
        .unwrap_or_default();

    FileAnalysis {
        file_path: file.to_string(),
        risk_score,
        confidence: 0.7,
        verdict,
        summary,
    }
}

fn fuse_files(files: Vec<FileAnalysis>) -> AiAnalysisResult {
    let risk_score = files.iter().map(|f| f.risk_score).fold(0.0_f64, f64::max);
    let confidence = files.iter().map(|f| f.confidence).fold(1.0_f64, f64::min);
    let verdict = worst_verdict(files.iter().map(|f| f.verdict));
    let summary = files
        .iter()
        .find(|f| f.verdict == verdict)
        .map(|f| f.summary.clone())
        .unwrap_or_else(|| "no significant findings".to_string());

    AiAnalysisResult { verdict, risk_score, confidence, files, summary }
}

/// MALICIOUS beats SUSPICIOUS beats CLEAN; UNKNOWN never wins a comparison
/// but is the result when nothing else was observed.
fn worst_verdict(verdicts: impl Iterator<Item = Verdict>) -> Verdict {
    let rank = |v: &Verdict| match v {
        Verdict::Malicious => 3,
        Verdict::Suspicious => 2,
        Verdict::Clean => 1,
        Verdict::Unknown | Verdict::Error => 0,
    };
    verdicts
        .filter(|v| !matches!(v, Verdict::Unknown))
        .max_by_key(rank)
        .unwrap_or(Verdict::Unknown)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_json_response() {
        let content = r#"{"risk_score": 0.9, "confidence": 0.8, "verdict": "MALICIOUS", "summary": "exfiltrates env vars"}"#;
        let analysis = parse_model_response("f.js", content);
        assert_eq!(analysis.verdict, Verdict::Malicious);
        assert_eq!(analysis.risk_score, 0.9);
    }

    #[test]
    fn extracts_json_wrapped_in_prose() {
        let content = "Sure, here is my analysis:\n{\"risk_score\": 0.1, \"confidence\": 0.9, \"verdict\": \"CLEAN\", \"summary\": \"looks fine\"}\nHope that helps!";
        let analysis = parse_model_response("f.js", content);
        assert_eq!(analysis.verdict, Verdict::Clean);
    }

    #[test]
    fn falls_back_when_response_has_no_json() {
        let analysis = parse_model_response("f.js", "I cannot analyze this file.");
        assert_eq!(analysis.verdict, Verdict::Suspicious);
        assert_eq!(analysis.confidence, 0.3);
    }

    #[test]
    fn worst_verdict_prefers_malicious_over_suspicious() {
        let v = worst_verdict(vec![Verdict::Suspicious, Verdict::Malicious, Verdict::Clean].into_iter());
        assert_eq!(v, Verdict::Malicious);
    }

    #[test]
    fn worst_verdict_ignores_unknown_unless_alone() {
        let v = worst_verdict(vec![Verdict::Unknown, Verdict::Clean].into_iter());
        assert_eq!(v, Verdict::Clean);
        let v = worst_verdict(vec![Verdict::Unknown, Verdict::Unknown].into_iter());
        assert_eq!(v, Verdict::Unknown);
    }

    #[test]
    fn multi_chunk_fusion_uses_fixed_confidence() {
        let chunks = vec![
            FileAnalysis { file_path: "f.js".into(), risk_score: 0.2, confidence: 0.9, verdict: Verdict::Clean, summary: "ok".into() },
            FileAnalysis { file_path: "f.js".into(), risk_score: 0.8, confidence: 0.6, verdict: Verdict::Malicious, summary: "bad".into() },
        ];
        let fused = fuse_chunks("f.js", chunks);
        assert_eq!(fused.confidence, 0.7);
        assert_eq!(fused.verdict, Verdict::Malicious);
        assert_eq!(fused.risk_score, 0.8);
    }

    #[test]
    fn cross_file_fusion_takes_minimum_confidence() {
        let files = vec![
            FileAnalysis { file_path: "a.js".into(), risk_score: 0.3, confidence: 0.9, verdict: Verdict::Clean, summary: "ok".into() },
            FileAnalysis { file_path: "b.js".into(), risk_score: 0.7, confidence: 0.4, verdict: Verdict::Suspicious, summary: "meh".into() },
        ];
        let fused = fuse_files(files);
        assert_eq!(fused.confidence, 0.4);
        assert_eq!(fused.verdict, Verdict::Suspicious);
    }
}
