use async_trait::async_trait;
use harvest_core::{
    AdvisorContext, AdvisorError, AdvisorResult, ReplacementAdvisor, ReplacementSuggestion,
};
use serde::{Deserialize, Serialize};

use crate::prompt::{build_prompt, parse_suggestion, SYSTEM_PROMPT};
use crate::AdvisorConfig;

const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Clone, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<Message>,
}

#[derive(Debug, Clone, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessagesResponse {
    #[serde(default)]
    pub content: Vec<ContentBlock>,
    #[serde(default)]
    pub stop_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: Option<String>,
}

impl MessagesResponse {
    /// Concatenated text blocks
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter(|b| b.kind == "text")
            .filter_map(|b| b.text.as_deref())
            .collect::<Vec<_>>()
            .join("")
    }
}

/// Replacement advisor backed by the Anthropic Messages API
#[derive(Clone)]
pub struct AnthropicAdvisor {
    client: reqwest::Client,
    config: AdvisorConfig,
    api_key: String,
}

impl AnthropicAdvisor {
    /// `None` when no API key is configured
    pub fn new(config: AdvisorConfig) -> Option<Self> {
        let api_key = config.api_key.clone().filter(|k| !k.trim().is_empty())?;
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Some(Self {
            client,
            config,
            api_key,
        })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    async fn complete(&self, prompt: String) -> AdvisorResult<MessagesResponse> {
        let request = MessagesRequest {
            model: &self.config.model,
            max_tokens: self.config.max_tokens,
            system: SYSTEM_PROMPT,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(format!("{}/v1/messages", self.config.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AdvisorError::Timeout
                } else {
                    AdvisorError::ServiceUnavailable(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(AdvisorError::ServiceUnavailable(format!(
                "Status: {}",
                response.status()
            )));
        }

        response
            .json::<MessagesResponse>()
            .await
            .map_err(|e| AdvisorError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl ReplacementAdvisor for AnthropicAdvisor {
    async fn suggest(&self, context: &AdvisorContext) -> AdvisorResult<ReplacementSuggestion> {
        let response = self.complete(build_prompt(context)).await?;

        if response.stop_reason.as_deref() == Some("max_tokens") {
            tracing::debug!("Advisor reply for {} hit the token limit", context.ticker);
        }

        let suggestion = parse_suggestion(&response.text())?;
        tracing::debug!(
            "Advisor suggested {} for {}",
            suggestion.replacement_ticker,
            context.ticker
        );
        Ok(suggestion)
    }

    fn backend_name(&self) -> &'static str {
        "anthropic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_text_joins_text_blocks() {
        let response: MessagesResponse = serde_json::from_str(
            r#"{
                "id": "msg_01",
                "type": "message",
                "role": "assistant",
                "content": [
                    {"type": "text", "text": "{\"replacement_ticker\": \"XLK\","},
                    {"type": "tool_use", "id": "t1", "name": "noop", "input": {}},
                    {"type": "text", "text": " \"replacement_name\": \"Technology Select Sector SPDR Fund\"}"}
                ],
                "stop_reason": "end_turn"
            }"#,
        )
        .unwrap();

        let suggestion = parse_suggestion(&response.text()).unwrap();
        assert_eq!(suggestion.replacement_ticker, "XLK");
        assert!(suggestion.action_steps.is_empty());
    }

    #[test]
    fn test_request_body_shape() {
        let request = MessagesRequest {
            model: "test-model",
            max_tokens: 512,
            system: SYSTEM_PROMPT,
            messages: vec![Message {
                role: "user",
                content: "hi".to_string(),
            }],
        };

        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["model"], "test-model");
        assert_eq!(body["max_tokens"], 512);
        assert_eq!(body["messages"][0]["role"], "user");
    }

    #[test]
    fn test_missing_key_means_no_advisor() {
        let config = AdvisorConfig {
            api_key: None,
            ..AdvisorConfig::default()
        };
        assert!(AnthropicAdvisor::new(config).is_none());

        let config = AdvisorConfig {
            api_key: Some("  ".to_string()),
            ..AdvisorConfig::default()
        };
        assert!(AnthropicAdvisor::new(config).is_none());

        let config = AdvisorConfig {
            api_key: Some("sk-test".to_string()),
            ..AdvisorConfig::default()
        };
        let advisor = AnthropicAdvisor::new(config).unwrap();
        assert_eq!(advisor.backend_name(), "anthropic");
    }
}
