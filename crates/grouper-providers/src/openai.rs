//! OpenAI-compatible API provider.
//!
//! Talks to OpenAI's chat-completions API; `base_url` can point elsewhere.

use async_trait::async_trait;
use grouper_core::{
    config::OpenAiConfig,
    context::{ApiMessage, Context},
    error::GrouperError,
    traits::Provider,
};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, warn};

/// Replies are one or two chat sentences, or a single YES/NO.
const MAX_REPLY_TOKENS: u32 = 300;

/// OpenAI-compatible provider.
pub struct OpenAiProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiProvider {
    /// Create from config values.
    pub fn from_config(config: &OpenAiConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    fn authorized(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.bearer_auth(&self.api_key)
    }
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct Request<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    max_tokens: u32,
}

/// Borrow the system prompt and history as request messages.
fn request_messages<'a>(system: &'a str, history: &'a [ApiMessage]) -> Vec<Message<'a>> {
    let system = (!system.is_empty()).then_some(Message {
        role: "system",
        content: system,
    });
    system
        .into_iter()
        .chain(history.iter().map(|m| Message {
            role: &m.role,
            content: &m.content,
        }))
        .collect()
}

#[derive(Deserialize)]
struct Response {
    #[serde(default)]
    choices: Vec<Choice>,
    model: Option<String>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: Option<ReplyMessage>,
}

#[derive(Deserialize)]
struct ReplyMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    total_tokens: Option<u64>,
}

/// `{"error": {"message": ...}}` body of a failed call.
#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

impl Response {
    fn into_text(self) -> Option<String> {
        self.choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .filter(|t| !t.trim().is_empty())
    }
}

/// Readable reason for a non-2xx reply.
fn failure_reason(status: reqwest::StatusCode, body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => format!("openai returned {status}: {}", envelope.error.message),
        Err(_) if body.trim().is_empty() => format!("openai returned {status}"),
        Err(_) => format!("openai returned {status}: {}", body.trim()),
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn complete(&self, context: &Context) -> Result<String, GrouperError> {
        let (system, history) = context.to_api_messages();
        let model = context.model.as_deref().unwrap_or(&self.model);
        let body = Request {
            model,
            messages: request_messages(&system, &history),
            max_tokens: MAX_REPLY_TOKENS,
        };

        let started = Instant::now();
        let resp = self
            .authorized(self.client.post(self.endpoint("chat/completions")))
            .json(&body)
            .send()
            .await
            .map_err(|e| GrouperError::Provider(format!("openai request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp
                .text()
                .await
                .map_err(|e| GrouperError::Provider(format!("openai returned {status}: {e}")))?;
            return Err(GrouperError::Provider(failure_reason(status, &text)));
        }

        let parsed: Response = resp
            .json()
            .await
            .map_err(|e| GrouperError::Provider(format!("openai: unreadable response: {e}")))?;
        let served_by = parsed.model.clone().unwrap_or_else(|| model.to_string());
        let tokens = parsed.usage.as_ref().and_then(|u| u.total_tokens);

        let text = parsed
            .into_text()
            .ok_or_else(|| GrouperError::Provider("openai: empty response".to_string()))?;

        debug!(
            "openai: {served_by} answered in {}ms ({} tokens)",
            started.elapsed().as_millis(),
            tokens.map_or_else(|| "?".to_string(), |n| n.to_string())
        );
        Ok(text)
    }

    async fn is_available(&self) -> bool {
        if self.api_key.is_empty() {
            warn!("openai: no API key configured");
            return false;
        }
        match self
            .authorized(self.client.get(self.endpoint("models")))
            .send()
            .await
        {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                warn!("openai not available: {e}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_defaults() {
        let p = OpenAiProvider::from_config(&OpenAiConfig::default());
        assert_eq!(p.name(), "openai");
        assert_eq!(p.model, "gpt-4o-mini");
        assert_eq!(
            p.endpoint("chat/completions"),
            "https://api.openai.com/v1/chat/completions"
        );
    }

    #[test]
    fn test_request_puts_system_prompt_first() {
        let mut ctx = Context::new("How?");
        ctx.system_prompt = "Be brief.".to_string();
        ctx.push_exchange("Hi", "Hello!");
        let (system, history) = ctx.to_api_messages();

        let body = serde_json::to_value(Request {
            model: "m",
            messages: request_messages(&system, &history),
            max_tokens: MAX_REPLY_TOKENS,
        })
        .unwrap();

        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[0]["content"], "Be brief.");
        assert_eq!(messages[3]["content"], "How?");
        assert_eq!(body["max_tokens"], MAX_REPLY_TOKENS);
    }

    #[test]
    fn test_empty_system_prompt_is_omitted() {
        let history = vec![ApiMessage {
            role: "user".into(),
            content: "Hi".into(),
        }];
        let messages = request_messages("", &history);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, "user");
    }

    #[test]
    fn test_response_text_and_blank_choices() {
        let json = r#"{"choices":[{"message":{"role":"assistant","content":"YES"}}],"usage":{"total_tokens":12}}"#;
        let resp: Response = serde_json::from_str(json).unwrap();
        assert_eq!(resp.into_text().as_deref(), Some("YES"));

        let blank: Response =
            serde_json::from_str(r#"{"choices":[{"message":{"content":"  "}}]}"#).unwrap();
        assert_eq!(blank.into_text(), None);

        let none: Response = serde_json::from_str("{}").unwrap();
        assert_eq!(none.into_text(), None);
    }

    #[test]
    fn test_failure_reason_prefers_error_envelope() {
        let status = reqwest::StatusCode::UNAUTHORIZED;
        assert_eq!(
            failure_reason(status, r#"{"error":{"message":"bad key","type":"auth"}}"#),
            "openai returned 401 Unauthorized: bad key"
        );
        assert_eq!(failure_reason(status, " "), "openai returned 401 Unauthorized");
        assert_eq!(
            failure_reason(status, "gateway says no"),
            "openai returned 401 Unauthorized: gateway says no"
        );
    }

    #[tokio::test]
    async fn test_unavailable_without_api_key() {
        let p = OpenAiProvider::from_config(&OpenAiConfig::default());
        assert!(!p.is_available().await);
    }
}
