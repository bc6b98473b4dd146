use crate::config::Settings;
use crate::llm::error::{LlmDiagnosticsError, LlmError};
use crate::llm::json;
use crate::llm::{LlmClient, Provider, StructuredRequest};
use anyhow::Context;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_MODEL: &str = "claude-3-5-sonnet-latest";
const DEFAULT_MAX_TOKENS: u32 = 2048;

#[derive(Debug, Clone)]
pub struct AnthropicClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
}

impl AnthropicClient {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let api_key = settings.require_anthropic_api_key()?.to_string();
        let base_url =
            std::env::var("ANTHROPIC_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let model = std::env::var("ANTHROPIC_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let max_tokens = std::env::var("ANTHROPIC_MAX_TOKENS")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(DEFAULT_MAX_TOKENS);

        // No timeout unless configured: a hung call holds the request open.
        let timeout_secs = std::env::var("ANTHROPIC_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok());

        let mut builder = reqwest::Client::builder();
        if let Some(secs) = timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let http = builder.build().context("failed to build reqwest client")?;

        Ok(Self {
            http,
            api_key,
            base_url,
            model,
            max_tokens,
        })
    }

    async fn create_message(
        &self,
        prompt: &'static str,
        req: CreateMessageRequest,
    ) -> Result<(Value, CreateMessageResponse), LlmError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(&self.api_key)
                .context("ANTHROPIC_API_KEY is not a valid header value")
                .map_err(LlmError::Transport)?,
        );
        headers.insert(
            "anthropic-version",
            HeaderValue::from_static(ANTHROPIC_VERSION),
        );

        let url = format!("{}/v1/messages", self.base_url.trim_end_matches('/'));
        let res = self
            .http
            .post(url)
            .headers(headers)
            .json(&req)
            .send()
            .await
            .context("Anthropic request failed")
            .map_err(LlmError::Transport)?;

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read Anthropic response body")
            .map_err(LlmError::Transport)?;
        if !status.is_success() {
            let raw_response_json = serde_json::from_str::<Value>(&text).ok();
            let diag = LlmDiagnosticsError {
                provider: Provider::Anthropic,
                prompt,
                stage: "http",
                detail: format!("status={status}"),
                raw_output: Some(text),
                raw_response_json,
            };
            tracing::warn!(prompt, %status, raw = ?diag.raw_output, "Anthropic returned an error status");
            return Err(LlmError::Transport(diag.into()));
        }

        let raw_json = serde_json::from_str::<Value>(&text).map_err(|e| {
            LlmError::InvalidResponse(LlmDiagnosticsError {
                provider: Provider::Anthropic,
                prompt,
                stage: "response_json",
                detail: e.to_string(),
                raw_output: Some(text.clone()),
                raw_response_json: None,
            })
        })?;
        let parsed = serde_json::from_value::<CreateMessageResponse>(raw_json.clone()).map_err(|e| {
            LlmError::InvalidResponse(LlmDiagnosticsError {
                provider: Provider::Anthropic,
                prompt,
                stage: "response_shape",
                detail: e.to_string(),
                raw_output: None,
                raw_response_json: Some(raw_json.clone()),
            })
        })?;
        Ok((raw_json, parsed))
    }

    fn tool_name(request: &StructuredRequest) -> String {
        format!("emit_{}", request.name)
    }

    fn system_prompt() -> String {
        [
            "You are a financial risk analyst working with alternative data.",
            "Answer by calling the provided tool exactly once.",
            "If you cannot call the tool, return ONLY valid JSON matching the tool's input schema.",
            "Do not wrap JSON in markdown. Do not include any extra keys.",
        ]
        .join("\n")
    }

    fn response_text(res: &CreateMessageResponse) -> String {
        let mut out = String::new();
        for block in &res.content {
            if let ContentBlock::Text { text } = block {
                if !out.is_empty() {
                    out.push('\n');
                }
                out.push_str(text);
            }
        }
        out
    }

    fn response_tool_input(res: &CreateMessageResponse, tool_name: &str) -> Option<Value> {
        res.content.iter().find_map(|block| match block {
            ContentBlock::ToolUse { name, input, .. } if name == tool_name => Some(input.clone()),
            _ => None,
        })
    }
}

#[async_trait::async_trait]
impl LlmClient for AnthropicClient {
    fn provider(&self) -> Provider {
        Provider::Anthropic
    }

    async fn complete_structured(&self, request: StructuredRequest) -> Result<Value, LlmError> {
        let tool_name = Self::tool_name(&request);
        let req = CreateMessageRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            system: Some(Self::system_prompt()),
            messages: vec![Message {
                role: "user",
                content: request.prompt,
            }],
            tools: Some(vec![Tool {
                name: tool_name.clone(),
                description: request.description,
                input_schema: request.output_schema,
            }]),
            tool_choice: Some(ToolChoice::Tool {
                name: tool_name.clone(),
            }),
        };

        let (raw_json, res) = self.create_message(request.name, req).await?;

        if matches!(res.stop_reason.as_deref(), Some("max_tokens")) {
            tracing::warn!(
                prompt = request.name,
                max_tokens = self.max_tokens,
                "Anthropic stop_reason=max_tokens; output may be truncated"
            );
        }

        if let Some(input) = Self::response_tool_input(&res, &tool_name) {
            return Ok(input);
        }

        // Fallback to text (should be rare with a forced tool choice).
        let text = Self::response_text(&res);
        json::parse_object(&text).map_err(|e| {
            LlmError::InvalidResponse(LlmDiagnosticsError {
                provider: Provider::Anthropic,
                prompt: request.name,
                stage: "parse_text",
                detail: format!("{e:#}"),
                raw_output: Some(text),
                raw_response_json: Some(raw_json),
            })
        })
    }
}

#[derive(Debug, Clone, Serialize)]
struct CreateMessageRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<Message>,

    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<Tool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<ToolChoice>,
}

#[derive(Debug, Clone, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Debug, Clone, Deserialize)]
struct CreateMessageResponse {
    content: Vec<ContentBlock>,

    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
struct Tool {
    name: String,
    description: &'static str,
    input_schema: Value,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
enum ToolChoice {
    #[serde(rename = "tool")]
    Tool { name: String },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },

    #[serde(rename = "tool_use")]
    ToolUse {
        #[serde(default)]
        #[allow(dead_code)]
        id: String,
        #[serde(default)]
        name: String,
        #[serde(default)]
        input: Value,
    },

    #[serde(other)]
    Unknown,
}
