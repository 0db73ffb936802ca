//! Anthropic Messages API integration.
//!
//! This API takes the system prompt as a top-level `system` field rather
//! than an in-band message, so `build_request` hoists it out of the turn
//! sequence. `max_tokens` is mandatory on the wire; callers that leave it
//! unset get 1024.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use virobench_core::error::{ModelError, Result, VirobenchError};
use virobench_core::message::{Message, UsageMetadata};
use virobench_core::model::{CallOptions, ChatModel, ChatResult};

const API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

// ---------------------------------------------------------------------------
// Anthropic Messages API request/response types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct AnthropicRequest {
    pub model: String,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub messages: Vec<AnthropicMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct AnthropicMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct AnthropicResponse {
    pub content: Vec<AnthropicContentBlock>,
    pub usage: AnthropicUsage,
}

/// A response content block. Only `text` blocks are expected here; other
/// block types deserialize with an empty `text` and are skipped.
#[derive(Debug, Deserialize)]
pub struct AnthropicContentBlock {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct AnthropicUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

#[derive(Debug, Deserialize)]
pub struct AnthropicError {
    pub error: AnthropicErrorDetail,
}

#[derive(Debug, Deserialize)]
pub struct AnthropicErrorDetail {
    pub message: String,
}

// ---------------------------------------------------------------------------
// ClaudeChatModel
// ---------------------------------------------------------------------------

pub struct ClaudeChatModel {
    api_key: String,
    model_id: String,
    client: reqwest::Client,
}

impl ClaudeChatModel {
    pub fn new(api_key: String, model_id: String) -> Self {
        Self {
            api_key,
            model_id,
            client: reqwest::Client::new(),
        }
    }

    pub fn build_request(&self, messages: &[Message], options: &CallOptions) -> AnthropicRequest {
        let mut system: Option<String> = None;
        let mut api_messages: Vec<AnthropicMessage> = Vec::new();

        for msg in messages {
            match msg {
                Message::System { content } => {
                    // Last system turn wins; assembled prompts carry one.
                    system = Some(content.clone());
                }
                Message::User { content } => {
                    api_messages.push(AnthropicMessage {
                        role: "user".into(),
                        content: content.clone(),
                    });
                }
                Message::Assistant { content } => {
                    api_messages.push(AnthropicMessage {
                        role: "assistant".into(),
                        content: content.clone(),
                    });
                }
            }
        }

        AnthropicRequest {
            model: self.model_id.clone(),
            max_tokens: options.max_tokens.unwrap_or(1024),
            system,
            messages: api_messages,
            temperature: options.temperature,
        }
    }
}

#[async_trait]
impl ChatModel for ClaudeChatModel {
    async fn generate(&self, messages: &[Message], options: &CallOptions) -> Result<ChatResult> {
        let request_body = self.build_request(messages, options);

        let response = self
            .client
            .post(API_URL)
            .timeout(REQUEST_TIMEOUT)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| VirobenchError::Model(ModelError::ApiRequest(e.to_string())))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after_secs = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "failed to read response body".into());
            let error_msg = serde_json::from_str::<AnthropicError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(VirobenchError::Model(match status.as_u16() {
                401 => ModelError::Auth(error_msg),
                429 => ModelError::RateLimited { retry_after_secs },
                _ => ModelError::ApiRequest(format!("HTTP {status}: {error_msg}")),
            }));
        }

        let api_response: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| VirobenchError::Model(ModelError::InvalidResponse(e.to_string())))?;

        let text: String = api_response
            .content
            .iter()
            .map(|block| block.text.as_str())
            .collect();
        if text.is_empty() {
            return Err(VirobenchError::Model(ModelError::EmptyResponse));
        }

        let usage = UsageMetadata {
            input_tokens: api_response.usage.input_tokens,
            output_tokens: api_response.usage.output_tokens,
            total_tokens: api_response.usage.input_tokens + api_response.usage.output_tokens,
        };

        Ok(ChatResult {
            message: Message::assistant(text),
            usage: Some(usage),
        })
    }

    fn model_name(&self) -> &str {
        &self.model_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_model() -> ClaudeChatModel {
        ClaudeChatModel::new("test-key".into(), "claude-sonnet-4-5-20250929".into())
    }

    #[test]
    fn build_request_basic() {
        let model = make_model();
        let messages = vec![Message::user("Hello")];
        let options = CallOptions::default();
        let req = model.build_request(&messages, &options);
        assert_eq!(req.model, "claude-sonnet-4-5-20250929");
        assert_eq!(req.messages.len(), 1);
        assert_eq!(req.messages[0].role, "user");
        assert!(req.system.is_none());
    }

    #[test]
    fn build_request_system_hoisted() {
        let model = make_model();
        let messages = vec![
            Message::system("You are a virologist."),
            Message::user("Which option is correct?"),
        ];
        let options = CallOptions::default();
        let req = model.build_request(&messages, &options);
        assert_eq!(req.system.as_deref(), Some("You are a virologist."));
        // system not in messages
        assert_eq!(req.messages.len(), 1);
        assert_eq!(req.messages[0].role, "user");
    }

    #[test]
    fn build_request_preserves_exam_turn_order() {
        let model = make_model();
        let messages = vec![
            Message::system("sys"),
            Message::user("q1"),
            Message::assistant("a1"),
            Message::user("q2"),
        ];
        let req = model.build_request(&messages, &CallOptions::default());
        let roles: Vec<&str> = req.messages.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, ["user", "assistant", "user"]);
    }

    #[test]
    fn build_request_max_tokens_defaults_to_1024() {
        let model = make_model();
        let messages = vec![Message::user("Hello")];
        let req = model.build_request(&messages, &CallOptions::default());
        assert_eq!(req.max_tokens, 1024);
    }

    #[test]
    fn build_request_max_tokens_override() {
        let model = make_model();
        let messages = vec![Message::user("Hello")];
        let options = CallOptions {
            max_tokens: Some(256),
            temperature: Some(0.0),
        };
        let req = model.build_request(&messages, &options);
        assert_eq!(req.max_tokens, 256);
        assert_eq!(req.temperature, Some(0.0));
    }

    #[test]
    fn build_request_omits_absent_system() {
        let model = make_model();
        let messages = vec![Message::user("Hello")];
        let req = model.build_request(&messages, &CallOptions::default());
        let json = serde_json::to_string(&req).unwrap();
        assert!(!json.contains("system"));
    }

    #[test]
    fn parse_response_text() {
        let json = r#"{
            "content": [{"type": "text", "text": "Answer: B"}],
            "usage": {"input_tokens": 10, "output_tokens": 5}
        }"#;
        let resp: AnthropicResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.content[0].text, "Answer: B");
    }

    #[test]
    fn parse_response_joins_text_blocks() {
        let json = r#"{
            "content": [
                {"type": "text", "text": "The answer is clear. "},
                {"type": "text", "text": "Answer: D"}
            ],
            "usage": {"input_tokens": 10, "output_tokens": 5}
        }"#;
        let resp: AnthropicResponse = serde_json::from_str(json).unwrap();
        let text: String = resp.content.iter().map(|b| b.text.as_str()).collect();
        assert_eq!(text, "The answer is clear. Answer: D");
    }

    #[test]
    fn parse_response_usage() {
        let json = r#"{
            "content": [{"type": "text", "text": "Hi"}],
            "usage": {"input_tokens": 15, "output_tokens": 25}
        }"#;
        let resp: AnthropicResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.usage.input_tokens, 15);
        assert_eq!(resp.usage.output_tokens, 25);
    }

    #[test]
    fn parse_error_body() {
        let json = r#"{"type": "error", "error": {"type": "authentication_error", "message": "invalid x-api-key"}}"#;
        let err: AnthropicError = serde_json::from_str(json).unwrap();
        assert_eq!(err.error.message, "invalid x-api-key");
    }
}
