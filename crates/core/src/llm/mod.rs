pub mod anthropic;
pub mod error;
pub mod json;
pub mod prompts;

use crate::error::AnalysisError;
use crate::llm::error::{LlmDiagnosticsError, LlmError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Anthropic,
    Other(&'static str),
}

/// One rendered prompt plus the JSON schema its answer must satisfy.
#[derive(Debug, Clone)]
pub struct StructuredRequest {
    pub name: &'static str,
    pub description: &'static str,
    pub prompt: String,
    pub output_schema: Value,
}

#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    fn provider(&self) -> Provider;

    /// Submits the prompt and returns the model's JSON answer, undecoded.
    async fn complete_structured(&self, request: StructuredRequest) -> Result<Value, LlmError>;
}

/// A prompt template with typed input and output.
pub trait StructuredPrompt: Send + Sync {
    type Input: Serialize + Send + Sync;
    type Output: DeserializeOwned + Send;

    const NAME: &'static str;
    const DESCRIPTION: &'static str;

    fn render(&self, input: &Self::Input) -> String;

    fn output_schema(&self) -> Value;

    fn validate(&self, output: Self::Output) -> anyhow::Result<Self::Output>;
}

/// Runs one structured model call: render, submit, decode, validate. Never retries.
pub async fn invoke<P: StructuredPrompt>(
    client: &dyn LlmClient,
    prompt: &P,
    input: &P::Input,
) -> Result<P::Output, AnalysisError> {
    let request = StructuredRequest {
        name: P::NAME,
        description: P::DESCRIPTION,
        prompt: prompt.render(input),
        output_schema: prompt.output_schema(),
    };

    let provider = client.provider();
    tracing::debug!(prompt = P::NAME, ?provider, "submitting structured prompt");
    let raw = client.complete_structured(request).await?;

    let decoded = serde_json::from_value::<P::Output>(raw.clone())
        .map_err(|e| invalid_response(provider, P::NAME, "decode", e.to_string(), &raw))?;

    prompt
        .validate(decoded)
        .map_err(|e| invalid_response(provider, P::NAME, "validate", format!("{e:#}"), &raw))
}

fn invalid_response(
    provider: Provider,
    prompt: &'static str,
    stage: &'static str,
    detail: String,
    raw: &Value,
) -> AnalysisError {
    AnalysisError::InvalidResponse(LlmDiagnosticsError {
        provider,
        prompt,
        stage,
        detail,
        raw_output: Some(raw.to_string()),
        raw_response_json: Some(raw.clone()),
    })
}
