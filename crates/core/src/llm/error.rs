use crate::llm::Provider;
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone)]
pub struct LlmDiagnosticsError {
    pub provider: Provider,
    pub prompt: &'static str,
    pub stage: &'static str,
    pub detail: String,
    pub raw_output: Option<String>,
    pub raw_response_json: Option<Value>,
}

impl fmt::Display for LlmDiagnosticsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "LLM error (provider={:?}, prompt={}, stage={}): {}",
            self.provider, self.prompt, self.stage, self.detail
        )
    }
}

impl std::error::Error for LlmDiagnosticsError {}

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// The request never produced a usable HTTP exchange (connect, timeout, non-2xx).
    #[error("{0:#}")]
    Transport(anyhow::Error),

    /// The provider answered but the payload does not match the declared schema.
    #[error(transparent)]
    InvalidResponse(LlmDiagnosticsError),
}
