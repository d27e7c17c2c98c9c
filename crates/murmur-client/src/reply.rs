//! Simulated counterpart replies.
//!
//! Each send runs `Idle -> Thinking -> Replied | Failed`: wait the fixed
//! thinking delay, ask the [`ReplyBackend`] for a reply in the contact's
//! persona, and turn any failure into the fallback notice. Nothing in here
//! ever returns an error to the session.

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::ClientConfig;

#[derive(Error, Debug)]
pub enum ReplyError {
    #[error("Reply transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Reply backend answered {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed reply payload: {0}")]
    MalformedPayload(String),

    #[error("No API key configured")]
    MissingApiKey,
}

/// Produces a reply for `text` written to `persona`.
pub trait ReplyBackend: Send + Sync {
    fn generate<'a>(&'a self, persona: &'a str, text: &'a str) -> BoxFuture<'a, Result<String, ReplyError>>;
}

/// How one pending reply resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyOutcome {
    Replied(String),
    /// The backend failed; `notice` is shown in place of a reply.
    Failed { notice: String, reason: String },
}

impl ReplyOutcome {
    pub fn text(&self) -> &str {
        match self {
            ReplyOutcome::Replied(text) => text,
            ReplyOutcome::Failed { notice, .. } => notice,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, ReplyOutcome::Failed { .. })
    }
}

/// Runs the thinking delay and the backend call for one send.
#[derive(Clone)]
pub struct ReplySimulator {
    backend: Arc<dyn ReplyBackend>,
    delay: Duration,
    fallback_notice: String,
}

impl ReplySimulator {
    pub fn new(backend: Arc<dyn ReplyBackend>, delay: Duration, fallback_notice: impl Into<String>) -> Self {
        Self {
            backend,
            delay,
            fallback_notice: fallback_notice.into(),
        }
    }

    pub async fn reply(&self, persona: &str, text: &str) -> ReplyOutcome {
        tokio::time::sleep(self.delay).await;

        match self.backend.generate(persona, text).await {
            Ok(reply) => {
                debug!(persona, len = reply.len(), "Reply received");
                ReplyOutcome::Replied(reply)
            }
            Err(e) => {
                warn!(persona, error = %e, "Reply backend failed, using fallback notice");
                ReplyOutcome::Failed {
                    notice: self.fallback_notice.clone(),
                    reason: e.to_string(),
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Chat-completions backend
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: [ChatTurn<'a>; 2],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatTurn<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: Option<CompletionMessage>,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

/// Persona instruction sent as the system turn.
pub fn persona_prompt(persona: &str) -> String {
    format!(
        "You are {persona}, a friendly and helpful assistant. Respond naturally to the \
         user's message. Keep responses conversational and appropriate length."
    )
}

/// Pull the reply text out of a chat-completions response body.
fn extract_reply(body: &str) -> Result<String, ReplyError> {
    let response: CompletionResponse =
        serde_json::from_str(body).map_err(|e| ReplyError::MalformedPayload(e.to_string()))?;

    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message)
        .and_then(|message| message.content)
        .filter(|content| !content.trim().is_empty())
        .ok_or_else(|| ReplyError::MalformedPayload("no reply content".to_string()))
}

/// HTTPS chat-completions client.
pub struct ChatCompletionsBackend {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl ChatCompletionsBackend {
    pub fn new(config: &ClientConfig) -> Result<Self, ReplyError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            client,
            endpoint: config.reply_endpoint.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }

    async fn request(&self, persona: &str, text: &str) -> Result<String, ReplyError> {
        let api_key = self.api_key.as_deref().ok_or(ReplyError::MissingApiKey)?;
        let system = persona_prompt(persona);
        let body = CompletionRequest {
            model: &self.model,
            messages: [
                ChatTurn {
                    role: "system",
                    content: &system,
                },
                ChatTurn {
                    role: "user",
                    content: text,
                },
            ],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        let payload = resp.text().await?;
        if !status.is_success() {
            return Err(ReplyError::Status {
                status: status.as_u16(),
                body: payload,
            });
        }

        extract_reply(&payload)
    }
}

impl ReplyBackend for ChatCompletionsBackend {
    fn generate<'a>(&'a self, persona: &'a str, text: &'a str) -> BoxFuture<'a, Result<String, ReplyError>> {
        Box::pin(self.request(persona, text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Scripted(Result<&'static str, u16>);

    impl ReplyBackend for Scripted {
        fn generate<'a>(&'a self, _persona: &'a str, _text: &'a str) -> BoxFuture<'a, Result<String, ReplyError>> {
            Box::pin(async move {
                match self.0 {
                    Ok(text) => Ok(text.to_string()),
                    Err(status) => Err(ReplyError::Status {
                        status,
                        body: "nope".to_string(),
                    }),
                }
            })
        }
    }

    #[test]
    fn test_extract_reply() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"Hello!"}}]}"#;
        assert_eq!(extract_reply(body).unwrap(), "Hello!");
    }

    #[test]
    fn test_extract_reply_malformed() {
        assert!(matches!(extract_reply("not json"), Err(ReplyError::MalformedPayload(_))));
        assert!(matches!(extract_reply(r#"{"choices":[]}"#), Err(ReplyError::MalformedPayload(_))));
        assert!(matches!(
            extract_reply(r#"{"choices":[{"message":{"content":"  "}}]}"#),
            Err(ReplyError::MalformedPayload(_))
        ));
        assert!(matches!(extract_reply(r#"{}"#), Err(ReplyError::MalformedPayload(_))));
    }

    #[test]
    fn test_persona_prompt_names_contact() {
        assert!(persona_prompt("Alice Johnson").starts_with("You are Alice Johnson,"));
    }

    #[test]
    fn test_request_body_shape() {
        let body = CompletionRequest {
            model: "m",
            messages: [
                ChatTurn { role: "system", content: "s" },
                ChatTurn { role: "user", content: "u" },
            ],
            max_tokens: 150,
            temperature: 0.5,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["messages"][1]["role"], "user");
        assert_eq!(json["messages"][1]["content"], "u");
        assert_eq!(json["max_tokens"], 150);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reply_waits_thinking_delay() {
        let sim = ReplySimulator::new(Arc::new(Scripted(Ok("Hello!"))), Duration::from_millis(1000), "fallback");
        let started = tokio::time::Instant::now();
        let outcome = sim.reply("Alice", "Hi").await;
        assert_eq!(outcome, ReplyOutcome::Replied("Hello!".to_string()));
        assert!(started.elapsed() >= Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_becomes_notice() {
        let sim = ReplySimulator::new(Arc::new(Scripted(Err(500))), Duration::from_millis(1000), "fallback");
        let outcome = sim.reply("Alice", "Hi").await;
        assert!(outcome.is_failure());
        assert_eq!(outcome.text(), "fallback");
    }

    #[tokio::test]
    async fn test_missing_api_key_fails_without_network() {
        let backend = ChatCompletionsBackend::new(&ClientConfig::default()).unwrap();
        let err = backend.generate("Alice", "Hi").await.unwrap_err();
        assert!(matches!(err, ReplyError::MissingApiKey));
    }
}
