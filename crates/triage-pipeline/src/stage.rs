//! A stage outcome wraps the result of one fallible scan stage. A stage
//! that fails never aborts the pipeline: its contribution to the composite
//! risk score is simply zero, and the failure reason is carried along for
//! the report rather than propagated as an error.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageOutcome<T> {
    pub result: Option<T>,
    pub error: Option<String>,
}

impl<T> StageOutcome<T> {
    pub fn ok(value: T) -> Self {
        Self { result: Some(value), error: None }
    }

    pub fn failed(error: impl std::fmt::Display) -> Self {
        Self { result: None, error: Some(error.to_string()) }
    }

    pub fn succeeded(&self) -> bool {
        self.result.is_some()
    }
}
