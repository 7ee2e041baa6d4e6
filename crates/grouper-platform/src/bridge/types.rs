//! Bridge wire types.

use chrono::{DateTime, Utc};
use grouper_core::{
    error::PlatformError,
    message::{ConversationKind, EventContent, InboundEvent},
};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub(crate) struct EventsPage {
    #[serde(default)]
    pub events: Vec<WireEvent>,
    pub cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireEvent {
    pub conversation_id: String,
    pub sender_inbox_id: String,
    pub sender_address: Option<String>,
    pub sender_name: Option<String>,
    /// "text", "intent", "reaction", "reply", ...
    pub content_type: String,
    pub text: Option<String>,
    pub action_id: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
}

impl WireEvent {
    /// Map a bridge event into the core event model.
    pub fn into_inbound(self) -> InboundEvent {
        let content = match (self.content_type.as_str(), self.text, self.action_id) {
            ("text", Some(text), _) => EventContent::Text { text },
            ("intent", _, Some(action_id)) => EventContent::Action { action_id },
            (other, _, _) => EventContent::Other {
                content_type: other.to_string(),
            },
        };
        InboundEvent {
            id: Uuid::new_v4(),
            conversation_id: self.conversation_id,
            sender_inbox_id: self.sender_inbox_id,
            sender_address: self.sender_address,
            sender_name: self.sender_name,
            content,
            timestamp: self.sent_at.unwrap_or_else(Utc::now),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireConversation {
    pub id: String,
    pub kind: ConversationKind,
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireGroups {
    #[serde(default)]
    pub groups: Vec<WireConversation>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireInbox {
    pub inbox_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireMe {
    pub inbox_id: String,
    pub address: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireError {
    message: String,
    code: Option<String>,
}

/// Decode a non-2xx bridge response into a [`PlatformError`].
pub(crate) fn decode_error(status: u16, body: &str) -> PlatformError {
    match serde_json::from_str::<WireError>(body) {
        Ok(e) => PlatformError {
            message: e.message,
            code: e.code,
        },
        Err(_) => {
            let message = if body.trim().is_empty() {
                format!("bridge returned HTTP {status}")
            } else {
                body.trim().to_string()
            };
            PlatformError::with_code(message, format!("HTTP_{status}"))
        }
    }
}
