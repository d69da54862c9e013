//! Anthropic Claude messages client

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{http_client, send_json, AiProvider, CompletionRequest, ProviderError, ProviderReply};
use crate::models::TokenUsage;

pub const DEFAULT_MODEL: &str = "claude-3-5-haiku-latest";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Clone)]
pub struct ClaudeClient {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl ClaudeClient {
    pub fn new(api_key: String) -> Result<Self, ProviderError> {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(api_key: String, base_url: &str) -> Result<Self, ProviderError> {
        Ok(Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            client: http_client()?,
        })
    }
}

#[async_trait]
impl AiProvider for ClaudeClient {
    fn name(&self) -> &'static str {
        "claude"
    }

    async fn generate(&self, request: &CompletionRequest) -> Result<ProviderReply, ProviderError> {
        let http_request = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&build_body(request));

        let response: MessagesResponse = send_json(http_request).await?;
        parse_response(response)
    }
}

pub(crate) fn build_body(request: &CompletionRequest) -> Value {
    let mut body = json!({
        "model": request.model,
        "max_tokens": request.max_tokens,
        "temperature": request.temperature,
        "messages": [{"role": "user", "content": request.user_prompt}],
    });

    if let Some(system) = request.system_prompt.as_deref().filter(|s| !s.trim().is_empty()) {
        body["system"] = json!(system);
    }

    body
}

#[derive(Debug, Deserialize)]
pub(crate) struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: Option<u32>,
    output_tokens: Option<u32>,
}

pub(crate) fn parse_response(response: MessagesResponse) -> Result<ProviderReply, ProviderError> {
    let text = response
        .content
        .into_iter()
        .filter(|block| block.kind == "text")
        .filter_map(|block| block.text)
        .collect::<Vec<_>>()
        .join("");

    if text.trim().is_empty() {
        return Err(ProviderError::EmptyResponse);
    }

    Ok(ProviderReply {
        text,
        usage: response.usage.map(|u| TokenUsage {
            prompt_tokens: u.input_tokens,
            completion_tokens: u.output_tokens,
            total_tokens: match (u.input_tokens, u.output_tokens) {
                (Some(i), Some(o)) => Some(i + o),
                _ => None,
            },
        }),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_prompt_is_top_level() {
        let body = build_body(&CompletionRequest {
            system_prompt: Some("You are terse".to_string()),
            user_prompt: "Hi".to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: 64,
            temperature: 0.0,
        });
        assert_eq!(body["system"], "You are terse");
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_parse_sums_usage() {
        let response: MessagesResponse = serde_json::from_value(json!({
            "content": [{"type": "text", "text": "Done"}],
            "usage": {"input_tokens": 7, "output_tokens": 3}
        }))
        .unwrap();

        let reply = parse_response(response).unwrap();
        assert_eq!(reply.text, "Done");
        assert_eq!(reply.usage.unwrap().total_tokens, Some(10));
    }

    #[test]
    fn test_parse_ignores_non_text_blocks() {
        let response: MessagesResponse = serde_json::from_value(json!({
            "content": [{"type": "tool_use", "id": "x"}]
        }))
        .unwrap();
        assert!(matches!(parse_response(response), Err(ProviderError::EmptyResponse)));
    }
}
