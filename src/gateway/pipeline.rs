//! Per-event pipeline: filter, classify, dispatch, reply, audit.

use super::Gateway;
use crate::actions::{self, QuickAction};
use crate::deadline::with_deadline;
use crate::orchestrator::SidebarError;
use grouper_core::message::{ConversationKind, EventContent, InboundEvent, OutgoingContent};
use grouper_memory::audit::{AuditEntry, AuditStatus};
use tracing::{debug, info, warn};

/// What handling one event produced.
#[derive(Debug)]
pub(super) struct Reply {
    /// Audit label ("create", "join", "chat"...).
    pub kind: &'static str,
    pub text: Option<String>,
    pub status: AuditStatus,
    pub reason: Option<String>,
}

impl Reply {
    pub fn ok(kind: &'static str, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: Some(text.into()),
            status: AuditStatus::Ok,
            reason: None,
        }
    }

    pub fn silent(kind: &'static str) -> Self {
        Self {
            kind,
            text: None,
            status: AuditStatus::Ok,
            reason: None,
        }
    }

    /// Reply with the error's user text; validation problems are not failures.
    pub fn failed(kind: &'static str, err: &SidebarError) -> Self {
        let status = match err {
            SidebarError::Validation(_) | SidebarError::AlreadySatisfied(_) => AuditStatus::Ok,
            SidebarError::Authorization { .. } => AuditStatus::Denied,
            _ => AuditStatus::Error,
        };
        Self {
            kind,
            text: Some(err.user_message()),
            status,
            reason: Some(err.to_string()),
        }
    }
}

fn preview(text: &str) -> String {
    if text.chars().count() > 60 {
        let truncated: String = text.chars().take(60).collect();
        format!("{truncated}...")
    } else {
        text.to_string()
    }
}

impl Gateway {
    /// Process a single inbound event through the full pipeline.
    pub(super) async fn handle_event(&self, event: InboundEvent) {
        if event.sender_inbox_id == self.platform.self_inbox_id() {
            debug!("ignoring own event {}", event.id);
            return;
        }

        self.capture_identity(&event).await;

        if let EventContent::Other { content_type } = &event.content {
            debug!("ignoring {content_type} event in {}", event.conversation_id);
            return;
        }

        let conversation = match with_deadline(
            self.call_timeout,
            "get_conversation",
            self.platform.get_conversation(&event.conversation_id),
        )
        .await
        {
            Ok(Some(conversation)) => conversation,
            Ok(None) => {
                warn!(
                    "conversation {} not found, skipping event {}",
                    event.conversation_id, event.id
                );
                return;
            }
            Err(e) => {
                warn!(
                    "failed to load conversation {}: {e}, skipping event {}",
                    event.conversation_id, event.id
                );
                return;
            }
        };
        let kind = conversation.kind();

        info!(
            "[{}] {} says: {}",
            event.conversation_id,
            event.sender_name.as_deref().unwrap_or(&event.sender_inbox_id),
            preview(&event.summary())
        );

        let (input, mut reply) = match &event.content {
            EventContent::Action { action_id } => {
                (event.summary(), self.handle_action(action_id, &event).await)
            }
            EventContent::Text { text } => {
                let text = match kind {
                    ConversationKind::Dm => text.trim().to_string(),
                    ConversationKind::Group => {
                        if !self.grammar.mentions_agent(text) {
                            debug!("not addressed to @{}, skipping", self.grammar.handle());
                            return;
                        }
                        self.grammar.strip_agent_mention(text)
                    }
                };
                let reply = self.handle_text(&event, kind, &text).await;
                if let Some(answer) = &reply.text {
                    self.conversations
                        .record_exchange(&event.sender_inbox_id, &text, answer);
                }
                (text, reply)
            }
            EventContent::Other { .. } => return,
        };

        if let Some(text) = &reply.text {
            let sent = with_deadline(
                self.call_timeout,
                "send_reply",
                conversation.send(OutgoingContent::text(text.clone())),
            )
            .await;
            if let Err(e) = sent {
                warn!("reply to {} failed: {e}", event.conversation_id);
                reply.status = AuditStatus::Error;
                reply.reason = Some(format!("reply not delivered: {e}"));
            }
        }

        self.audit_event(&event, &input, &reply).await;
    }

    /// Route a button click.
    async fn handle_action(&self, action_id: &str, event: &InboundEvent) -> Reply {
        let action = QuickAction::parse(action_id);
        match actions::dispatch(&self.orchestrator, &action, &event.sender_inbox_id).await {
            Ok(text) => Reply::ok(action.kind(), text),
            Err(e) => Reply::failed(action.kind(), &e),
        }
    }

    /// Remember who the sender is for later mention resolution. Never blocks
    /// the event for longer than one call deadline.
    async fn capture_identity(&self, event: &InboundEvent) {
        let capture = tokio::time::timeout(self.call_timeout, self.resolver.remember_sender(event));
        if capture.await.is_err() {
            warn!("identity capture for {} timed out", event.sender_inbox_id);
        }
    }

    async fn audit_event(&self, event: &InboundEvent, input: &str, reply: &Reply) {
        let entry = AuditEntry {
            conversation_id: event.conversation_id.clone(),
            sender_id: event.sender_inbox_id.clone(),
            sender_name: event.sender_name.clone(),
            kind: reply.kind.to_string(),
            input_text: input.to_string(),
            output_text: reply.text.clone(),
            status: reply.status,
            reason: reply.reason.clone(),
        };
        if let Err(e) = self.audit.log(&entry).await {
            warn!("audit write failed: {e}");
        }
    }
}
