//! AI Vibe Check: the optional LLM-backed semantic stage of the triage
//! pipeline.
//!
//! ```text
//!            flagged files / manifest entries
//!                        |
//!                        v
//!              +-------------------+
//!              |  target selection |
//!              +-------------------+
//!                        |
//!              chunk_source (per file)
//!                        |
//!                        v
//!              +-------------------+
//!              |   ChatClient SSE  |  <-- OpenAI-compatible /chat/completions
//!              +-------------------+
//!                        |
//!              fuse_chunks (per file)
//!                        |
//!              fuse_files (per package)
//!                        v
//!              AiAnalysisResult
//! ```
//!
//! The analyzer degrades instead of failing: a missing endpoint, a dead
//! connection, or a non-JSON response all produce a result with a verdict
//! and a confidence low enough for the pipeline to weight accordingly,
//! rather than aborting the scan. Grounded in
//! `original_source/core/triage/ai_vibe_check.py`.

mod analyzer;
mod chunker;
mod client;
mod error;
mod prompts;
mod targets;

pub use analyzer::{AiAnalysisResult, AiAnalyzer, FileAnalysis};
pub use error::AiError;
