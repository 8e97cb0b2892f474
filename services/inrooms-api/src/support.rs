//! Chat support proxy to the OpenAI chat completions API

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument};

const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

pub const MAX_MESSAGES: usize = 20;
pub const MAX_MESSAGE_CHARS: usize = 4000;

const SYSTEM_PROMPT: &str = "You are the inRooms support assistant. inRooms hosts live \
networking events, product demos and rooms. Help users with registration, event quotas, \
subscription plans (Starter, Professional, Enterprise), billing and demo recordings. \
Be concise and friendly. If you cannot resolve an issue, ask the user to email \
support@inrooms.io. Never ask for passwords or full card numbers.";

/// Chat support settings
#[derive(Clone)]
pub struct SupportConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl SupportConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: "gpt-4o-mini".to_string(),
            base_url: OPENAI_API_BASE.to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Who said a chat line. The system prompt is fixed server-side, so clients
/// can only send these two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

#[derive(Debug, thiserror::Error)]
pub enum SupportError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("chat provider returned {status}")]
    Upstream { status: u16 },

    #[error("chat provider request failed: {0}")]
    Transport(String),
}

/// Check the conversation against the request limits
pub fn validate_messages(messages: &[ChatMessage]) -> Result<(), SupportError> {
    if messages.is_empty() || messages.len() > MAX_MESSAGES {
        return Err(SupportError::InvalidInput(format!(
            "between 1 and {MAX_MESSAGES} messages are required"
        )));
    }
    for message in messages {
        if message.content.trim().is_empty() {
            return Err(SupportError::InvalidInput("messages cannot be empty".into()));
        }
        if message.content.chars().count() > MAX_MESSAGE_CHARS {
            return Err(SupportError::InvalidInput(format!(
                "message too long (max {MAX_MESSAGE_CHARS} chars)"
            )));
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// OpenAI chat completions client
#[derive(Clone)]
pub struct SupportClient {
    client: Client,
    config: SupportConfig,
}

impl SupportClient {
    pub fn new(config: SupportConfig) -> Result<Self, SupportError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| SupportError::Transport(e.to_string()))?;
        Ok(Self { client, config })
    }

    /// Answer the last user message in the context of the conversation
    #[instrument(skip(self, messages), fields(messages = messages.len()))]
    pub async fn reply(&self, messages: &[ChatMessage]) -> Result<String, SupportError> {
        validate_messages(messages)?;

        let mut wire = Vec::with_capacity(messages.len() + 1);
        wire.push(WireMessage {
            role: "system",
            content: SYSTEM_PROMPT,
        });
        wire.extend(messages.iter().map(|m| WireMessage {
            role: match m.role {
                ChatRole::User => "user",
                ChatRole::Assistant => "assistant",
            },
            content: &m.content,
        }));

        let body = CompletionRequest {
            model: &self.config.model,
            messages: wire,
            temperature: 0.3,
            max_tokens: 500,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.config.base_url))
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "Chat provider request failed");
                SupportError::Transport(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            error!(status = %status, "Chat provider error");
            return Err(SupportError::Upstream {
                status: status.as_u16(),
            });
        }

        let completion: CompletionResponse = response
            .json()
            .await
            .map_err(|e| SupportError::Transport(e.to_string()))?;

        let reply = completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(SupportError::Upstream {
                status: status.as_u16(),
            })?;

        debug!(chars = reply.len(), "Chat reply received");
        Ok(reply)
    }
}
