use crate::error::ModelError;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::debug;
use ureq::{Agent, ErrorKind};

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// One request to the generative model
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelRequest {
    pub model: String,
    pub system_instruction: String,
    pub user_prompt: String,
    pub temperature: f32,
}

/// Raw model output plus the units it consumed
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub text: String,
    pub tokens_used: u64,
}

#[cfg_attr(test, mockall::automock)]
pub trait TextModel: Send + Sync {
    fn complete(&self, request: &ModelRequest) -> Result<Completion, ModelError>;
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    total_tokens: u64,
}

/// Chat-completions client for OpenAI-compatible endpoints
pub struct OpenAiClient {
    agent: Agent,
    base_url: String,
    api_key: String,
}

impl OpenAiClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(60))
            .build();
        OpenAiClient {
            agent,
            base_url: OPENAI_BASE_URL.to_string(),
            api_key: api_key.into(),
        }
    }
}

impl TextModel for OpenAiClient {
    fn complete(&self, request: &ModelRequest) -> Result<Completion, ModelError> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let body = json!({
            "model": request.model,
            "temperature": request.temperature,
            "messages": [
                {"role": "system", "content": request.system_instruction},
                {"role": "user", "content": request.user_prompt},
            ],
        });

        debug!(model = %request.model, "sending chat completion request");
        let response = self
            .agent
            .post(&url)
            .set("Authorization", &format!("Bearer {}", self.api_key))
            .send_json(body)
            .map_err(classify)?;

        let parsed: ChatResponse = response
            .into_json()
            .map_err(|e| ModelError::Fatal(format!("unreadable completion response: {e}")))?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ModelError::Fatal("completion response had no content".to_string()))?;

        Ok(Completion {
            text,
            tokens_used: parsed.usage.map(|u| u.total_tokens).unwrap_or(0),
        })
    }
}

/// Throttling, server errors and connection trouble are transient; everything else is not
fn classify(err: ureq::Error) -> ModelError {
    match err {
        ureq::Error::Status(status, response) => {
            let body = response.into_string().unwrap_or_default();
            if is_transient_status(status) {
                ModelError::Transient(format!("status {status}: {body}"))
            } else {
                ModelError::Fatal(format!("status {status}: {body}"))
            }
        }
        ureq::Error::Transport(transport) => match transport.kind() {
            ErrorKind::Dns | ErrorKind::ConnectionFailed | ErrorKind::Io => {
                ModelError::Transient(transport.to_string())
            }
            _ => ModelError::Fatal(transport.to_string()),
        },
    }
}

fn is_transient_status(status: u16) -> bool {
    status == 429 || (500..=599).contains(&status)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn throttling_and_server_errors_are_transient() {
        assert!(is_transient_status(429));
        assert!(is_transient_status(500));
        assert!(is_transient_status(503));
        assert!(!is_transient_status(400));
        assert!(!is_transient_status(401));
        assert!(!is_transient_status(404));
    }

    #[test]
    fn chat_response_decodes_content_and_usage() {
        let raw = r#"{
            "id": "chatcmpl-1",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "[]"}}],
            "usage": {"prompt_tokens": 40, "completion_tokens": 2, "total_tokens": 42}
        }"#;
        let parsed: ChatResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.choices[0].message.content.as_deref(), Some("[]"));
        assert_eq!(parsed.usage.unwrap().total_tokens, 42);
    }
}
