//! Conversation and group handles backed by bridge REST calls.

use super::BridgeClient;
use async_trait::async_trait;
use grouper_core::{
    error::PlatformError,
    message::{ConversationKind, OutgoingContent},
    traits::{Conversation, GroupHandle},
};
use reqwest::Method;
use serde_json::json;
use tracing::debug;

/// Body of `POST /v1/conversations/{id}/messages`.
pub(crate) fn message_body(content: &OutgoingContent) -> Result<serde_json::Value, PlatformError> {
    serde_json::to_value(content)
        .map(|content| json!({ "content": content }))
        .map_err(|e| PlatformError::new(format!("failed to encode message: {e}")))
}

async fn post_message(
    http: &BridgeClient,
    conversation_id: &str,
    content: OutgoingContent,
) -> Result<(), PlatformError> {
    let body = message_body(&content)?;
    http.call_required::<serde_json::Value>(
        Method::POST,
        &format!("/v1/conversations/{conversation_id}/messages"),
        Some(body),
    )
    .await?;
    debug!("bridge: sent message to {conversation_id}");
    Ok(())
}

/// A DM (or a group seen only as a conversation).
pub(crate) struct BridgeConversation {
    pub(crate) http: BridgeClient,
    pub(crate) id: String,
    pub(crate) kind: ConversationKind,
}

#[async_trait]
impl Conversation for BridgeConversation {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> ConversationKind {
        self.kind
    }

    async fn send(&self, content: OutgoingContent) -> Result<(), PlatformError> {
        post_message(&self.http, &self.id, content).await
    }
}

/// A group the agent is a member of.
pub(crate) struct BridgeGroup {
    pub(crate) http: BridgeClient,
    pub(crate) id: String,
    pub(crate) name: Option<String>,
}

#[async_trait]
impl Conversation for BridgeGroup {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> ConversationKind {
        ConversationKind::Group
    }

    async fn send(&self, content: OutgoingContent) -> Result<(), PlatformError> {
        post_message(&self.http, &self.id, content).await
    }
}

#[async_trait]
impl GroupHandle for BridgeGroup {
    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    async fn rename(&self, name: &str) -> Result<(), PlatformError> {
        self.http
            .call_required::<serde_json::Value>(
                Method::PUT,
                &format!("/v1/groups/{}/name", self.id),
                Some(json!({ "name": name })),
            )
            .await?;
        Ok(())
    }

    async fn add_super_admin(&self, inbox_id: &str) -> Result<(), PlatformError> {
        self.http
            .call_required::<serde_json::Value>(
                Method::POST,
                &format!("/v1/groups/{}/super-admins", self.id),
                Some(json!({ "inbox_id": inbox_id })),
            )
            .await?;
        Ok(())
    }

    async fn add_members(&self, inbox_ids: &[String]) -> Result<(), PlatformError> {
        self.http
            .call_required::<serde_json::Value>(
                Method::POST,
                &format!("/v1/groups/{}/members", self.id),
                Some(json!({ "inbox_ids": inbox_ids })),
            )
            .await?;
        Ok(())
    }
}
