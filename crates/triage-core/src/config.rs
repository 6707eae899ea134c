//! Configuration for the triage pipeline. TOML-loadable via the `toml` crate
//! at the CLI boundary; every field mirrors spec.md §6 and every default
//! value matches the documented default.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level triage configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TriageConfig {
    pub scoring: ScoringWeights,
    pub ai: AiConfig,
    pub storage: StorageConfig,
    pub resources: ResourceConfig,
    pub marketplace: MarketplaceConfig,
}

/// Composite-risk weights. Reused, with different meaning, at two layers:
/// the pipeline's `composite_risk` formula and the report builder's final
/// `composite_score` formula each read these same four numbers but combine
/// them differently (see `triage-pipeline`'s two composite functions — this
/// is intentional, not a bug, and is documented in DESIGN.md).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringWeights {
    pub ai_vibe_weight: f64,
    pub static_analysis_weight: f64,
    pub behavioral_weight: f64,
    pub trust_signal_weight: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            ai_vibe_weight: 0.35,
            static_analysis_weight: 0.25,
            behavioral_weight: 0.25,
            trust_signal_weight: 0.15,
        }
    }
}

/// AI backend configuration. Unlike the original, `inference_url` has no
/// default — the original's hardcoded internal IP is infrastructure, not a
/// contract, and shipping it here would point every deployment at a host
/// they don't control. Leaving it empty forces explicit configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    pub inference_url: String,
    pub chat_endpoint: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f64,
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
    pub max_chunk_tokens: usize,
    pub max_chunks_per_file: usize,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            inference_url: String::new(),
            chat_endpoint: "/v1/chat/completions".to_string(),
            model: "llama-server".to_string(),
            max_tokens: 2048,
            temperature: 0.1,
            connect_timeout_secs: 30,
            read_timeout_secs: 240,
            max_chunk_tokens: 1500,
            max_chunks_per_file: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub vsix_dir: PathBuf,
    pub max_vsix_size_mb: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            vsix_dir: PathBuf::from("./vsix"),
            max_vsix_size_mb: 20,
        }
    }
}

/// Resource caps enforced by the archive reader and the static stages
/// (spec.md §5). `archive_max_mb` is the default cap; a caller that opts
/// into `HEAVYWEIGHT` scanning may raise the ceiling up to `heavyweight_max_mb`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceConfig {
    pub archive_max_mb: u64,
    pub heavyweight_max_mb: u64,
    pub entry_max_mb: u64,
    pub rule_engine_read_cap_mb: u64,
    pub manifest_read_cap_mb: u64,
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            archive_max_mb: 20,
            heavyweight_max_mb: 200,
            entry_max_mb: 500,
            rule_engine_read_cap_mb: 5,
            manifest_read_cap_mb: 2,
        }
    }
}

/// Marketplace lookups are out of scope (non-goal); this struct exists only
/// so the config file's shape matches spec.md §6 and so `ReportBuilder`'s
/// optional reputation/crossref inputs have a place to read an external base
/// URL from, if a caller wires one up.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarketplaceConfig {
    pub base_url: Option<String>,
}
