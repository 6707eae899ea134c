//! Thin SSE chat-completions client for an OpenAI-compatible inference
//! endpoint (the local `llama-server` the analyzer targets by default, or
//! any compatible backend an operator points it at).

use std::time::Duration;

use futures_util::StreamExt;
use serde_json::json;
use triage_core::AiConfig;

use crate::error::AiError;

/// Result of a completed (possibly truncated) streamed chat request.
pub struct StreamOutcome {
    pub content: String,
    /// `true` when the connection dropped or timed out after some content
    /// had already arrived — the caller still has something to parse.
    pub truncated: bool,
}

pub struct ChatClient {
    http: reqwest::Client,
    base_url: String,
    chat_endpoint: String,
    model: String,
}

impl ChatClient {
    pub fn new(config: &AiConfig) -> Result<Self, AiError> {
        if config.inference_url.is_empty() {
            return Err(AiError::NotConfigured);
        }
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.read_timeout_secs))
            .build()
            .map_err(|e| AiError::ClientBuild(e.to_string()))?;

        Ok(Self {
            http,
            base_url: config.inference_url.trim_end_matches('/').to_string(),
            chat_endpoint: config.chat_endpoint.clone(),
            model: config.model.clone(),
        })
    }

    pub async fn stream_chat(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        max_tokens: u32,
        temperature: f64,
    ) -> Result<StreamOutcome, AiError> {
        let url = format!("{}{}", self.base_url, self.chat_endpoint);
        let body = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system_prompt},
                {"role": "user", "content": user_prompt},
            ],
            "max_tokens": max_tokens,
            "temperature": temperature,
            "stream": true,
        });

        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(AiError::from_reqwest)?;

        if !response.status().is_success() {
            return Err(AiError::Connection(format!(
                "inference endpoint returned {}",
                response.status()
            )));
        }

        let mut stream = response.bytes_stream();
        let mut buf = String::new();
        let mut content = String::new();

        loop {
            match stream.next().await {
                Some(Ok(chunk)) => {
                    buf.push_str(&String::from_utf8_lossy(&chunk));
                    if let Some(done) = drain_sse_lines(&mut buf, &mut content) {
                        return Ok(StreamOutcome { content, truncated: !done });
                    }
                }
                Some(Err(e)) => {
                    if content.is_empty() {
                        return Err(AiError::from_reqwest(e));
                    }
                    return Ok(StreamOutcome { content, truncated: true });
                }
                None => return Ok(StreamOutcome { content, truncated: false }),
            }
        }
    }
}

/// Consumes complete `\n`-terminated lines out of `buf`, appending decoded
/// `delta.content` text to `out`. Returns `Some(true)` once a `data:
/// [DONE]` sentinel is seen (the caller should stop), otherwise `None` so
/// the stream keeps reading.
fn drain_sse_lines(buf: &mut String, out: &mut String) -> Option<bool> {
    while let Some(pos) = buf.find('\n') {
        let line = buf[..pos].trim_end_matches('\r').to_string();
        buf.drain(..=pos);

        let Some(data) = line.strip_prefix("data: ").or_else(|| line.strip_prefix("data:")) else {
            continue;
        };
        let data = data.trim();
        if data.is_empty() {
            continue;
        }
        if data == "[DONE]" {
            return Some(true);
        }
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(data) {
            if let Some(delta) = value["choices"][0]["delta"]["content"].as_str() {
                out.push_str(delta);
            }
        }
    }
    None
}
