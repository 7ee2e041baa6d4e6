use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An inbound event from the messaging platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundEvent {
    pub id: Uuid,
    /// Conversation (DM or group) the event was posted in.
    pub conversation_id: String,
    /// Platform-level recipient identifier of the sender.
    pub sender_inbox_id: String,
    /// Wallet / account address of the sender, if the platform exposes it.
    #[serde(default)]
    pub sender_address: Option<String>,
    /// Human-readable handle of the sender (e.g. "alice.eth").
    #[serde(default)]
    pub sender_name: Option<String>,
    pub content: EventContent,
    pub timestamp: DateTime<Utc>,
}

impl InboundEvent {
    /// Short text used in logs and audit rows.
    pub fn summary(&self) -> String {
        match &self.content {
            EventContent::Text { text } => text.clone(),
            EventContent::Action { action_id } => format!("[action] {action_id}"),
            EventContent::Other { content_type } => format!("[{content_type}]"),
        }
    }
}

/// Payload of an inbound event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventContent {
    /// Free text typed by a human.
    Text { text: String },
    /// A button click on a previously sent [`Invitation`].
    Action { action_id: String },
    /// Anything else (reactions, attachments, read receipts...). Ignored.
    Other { content_type: String },
}

/// Whether a conversation is a direct message or a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationKind {
    Dm,
    Group,
}

/// Visual weight of an invitation button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionStyle {
    Primary,
    Secondary,
}

/// One button on a structured invitation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvitationAction {
    pub id: String,
    pub label: String,
    pub style: ActionStyle,
}

/// Structured invitation rendered by the platform as a set of buttons.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invitation {
    pub id: String,
    pub description: String,
    pub actions: Vec<InvitationAction>,
}

/// Content sent back into a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutgoingContent {
    Text { text: String },
    Actions(Invitation),
}

impl OutgoingContent {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// The plain text of this content, if it is a text message.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            Self::Actions(_) => None,
        }
    }
}
