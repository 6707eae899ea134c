//! Prompt templates for the inference endpoint. The model is asked for a
//! strict JSON object so the response can be parsed the same way regardless
//! of which OpenAI-compatible backend is serving it.

pub const SYSTEM_PROMPT: &str = "You are a static security reviewer for code extracted from an \
editor extension package. You will be shown one chunk of source code at a time. Judge whether \
the chunk contains behavior consistent with malware: credential theft, covert network exfiltration, \
destructive file operations, or deliberate obfuscation hiding intent. Respond with a single JSON \
object and nothing else, in the form: \
{\"risk_score\": <0.0-1.0>, \"confidence\": <0.0-1.0>, \"verdict\": \"CLEAN|SUSPICIOUS|MALICIOUS\", \
\"summary\": \"<one sentence>\"}.";

pub fn user_prompt(file_path: &str, chunk: &str) -> String {
    format!("File: {file_path}\n\n```\n{chunk}\n```")
}
