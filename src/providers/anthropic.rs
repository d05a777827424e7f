use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::deepgram::{provider_error, status_error};
use super::prompts::{
    build_interpretation_prompt, build_report_prompt, INTERPRETATION_SYSTEM_PROMPT,
    REPORT_SYSTEM_PROMPT,
};
use super::{InterpretationRequest, Interpreter, ReportRequest, ReportSynthesizer};
use crate::error::ProviderError;
use crate::models::{ComprehensiveReport, Interpretation};

const MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

/// Configuration for the Anthropic API client
#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    /// API key (from ANTHROPIC_API_KEY env var)
    pub api_key: String,
    /// Model to use (from ANTHROPIC_MODEL, defaulting to a Sonnet model)
    pub model: String,
    /// Temperature (0-1, lower = more deterministic)
    pub temperature: f64,
    /// Maximum tokens in response
    pub max_tokens: u32,
}

impl AnthropicConfig {
    /// Create config from environment variables
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .context("ANTHROPIC_API_KEY environment variable not set")?;
        let model = std::env::var("ANTHROPIC_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

        Ok(Self::new(api_key, model))
    }

    /// Create with custom settings
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            api_key,
            model,
            temperature: 0.1,
            max_tokens: 4096,
        }
    }
}

/// Anthropic API client used for interpretation and report synthesis
pub struct AnthropicClient {
    client: Client,
    config: AnthropicConfig,
}

impl AnthropicClient {
    pub fn new(config: AnthropicConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Send a message forcing one tool call and parse the tool input as `T`
    pub async fn send_with_tool<T: DeserializeOwned>(
        &self,
        system: &str,
        user: &str,
        tool: Tool,
    ) -> Result<T> {
        let tool_name = tool.name.clone();
        let request = AnthropicToolRequest {
            model: self.config.model.clone(),
            max_tokens: self.config.max_tokens,
            temperature: Some(self.config.temperature),
            system: Some(system.to_string()),
            messages: vec![Message {
                role: "user".to_string(),
                content: user.to_string(),
            }],
            tools: vec![tool],
            tool_choice: Some(ToolChoice {
                choice_type: "tool".to_string(),
                name: tool_name.clone(),
            }),
        };

        let response = self
            .client
            .post(MESSAGES_URL)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .context("Failed to send request to Anthropic API")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(status_error("Anthropic", status, &body).into());
        }

        let response: AnthropicResponse = response
            .json()
            .await
            .context("Failed to parse Anthropic API response")?;

        // Find the tool_use content block
        for content in &response.content {
            if content.content_type == "tool_use" && content.name.as_deref() == Some(tool_name.as_str()) {
                if let Some(input) = &content.input {
                    return serde_json::from_value(input.clone())
                        .with_context(|| format!("Failed to parse {} tool input", tool_name));
                }
            }
        }

        anyhow::bail!("No tool_use response found")
    }
}

#[derive(Debug, Deserialize)]
struct InterpretationToolInput {
    summary: String,
    #[serde(default)]
    competencies: Vec<CompetencyRating>,
    #[serde(default)]
    themes: Vec<String>,
    confidence: f64,
}

#[derive(Debug, Deserialize)]
struct CompetencyRating {
    name: String,
    rating: f64,
}

#[async_trait]
impl Interpreter for AnthropicClient {
    async fn interpret(&self, request: &InterpretationRequest) -> Result<Interpretation, ProviderError> {
        if request.corpus.is_empty() {
            return Err(ProviderError::Rejected("no text to interpret".to_string()));
        }

        let input: InterpretationToolInput = self
            .send_with_tool(
                INTERPRETATION_SYSTEM_PROMPT,
                &build_interpretation_prompt(request),
                interpretation_tool(),
            )
            .await
            .map_err(provider_error)?;

        Ok(Interpretation {
            summary: input.summary,
            competencies: input
                .competencies
                .into_iter()
                .map(|c| (c.name, c.rating.clamp(0.0, 1.0)))
                .collect(),
            themes: input.themes,
            confidence: input.confidence.clamp(0.0, 1.0),
            model: self.config.model.clone(),
        })
    }
}

#[async_trait]
impl ReportSynthesizer for AnthropicClient {
    async fn synthesize(&self, request: &ReportRequest) -> Result<ComprehensiveReport, ProviderError> {
        self.send_with_tool(REPORT_SYSTEM_PROMPT, &build_report_prompt(request), report_tool())
            .await
            .map_err(provider_error)
    }
}

fn interpretation_tool() -> Tool {
    Tool {
        name: "submit_interpretation".to_string(),
        description: "Submit the structured interpretation of the respondent's answers".to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "summary": {"type": "string"},
                "competencies": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "name": {"type": "string"},
                            "rating": {"type": "number", "minimum": 0, "maximum": 1}
                        },
                        "required": ["name", "rating"]
                    }
                },
                "themes": {
                    "type": "array",
                    "items": {"type": "string"}
                },
                "confidence": {"type": "number", "minimum": 0, "maximum": 1}
            },
            "required": ["summary", "competencies", "themes", "confidence"]
        }),
    }
}

fn report_tool() -> Tool {
    Tool {
        name: "submit_report".to_string(),
        description: "Submit the comprehensive assessment report".to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "headline": {"type": "string"},
                "sections": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "title": {"type": "string"},
                            "body": {"type": "string"}
                        },
                        "required": ["title", "body"]
                    }
                },
                "recommendations": {
                    "type": "array",
                    "items": {"type": "string"}
                }
            },
            "required": ["headline", "sections", "recommendations"]
        }),
    }
}

#[derive(Debug, Serialize)]
struct AnthropicToolRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<Message>,
    tools: Vec<Tool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<ToolChoice>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Tool {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct ToolChoice {
    #[serde(rename = "type")]
    choice_type: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    content_type: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    input: Option<serde_json::Value>,
}
