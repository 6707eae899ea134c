use thiserror::Error;

/// Failures in setting up or talking to the inference endpoint. The
/// analyzer never lets these escape `analyze` — every variant is caught at
/// the call site and turned into a degraded [`crate::FileAnalysis`] instead,
/// so a dead or misconfigured model backend downgrades a scan rather than
/// failing it.
#[derive(Debug, Error)]
pub enum AiError {
    #[error("no inference endpoint configured")]
    NotConfigured,
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(String),
    #[error("connection to inference endpoint failed: {0}")]
    Connection(String),
    #[error("inference endpoint timed out")]
    Timeout,
}

impl AiError {
    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AiError::Timeout
        } else {
            AiError::Connection(err.to_string())
        }
    }
}
