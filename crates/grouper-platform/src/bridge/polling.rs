//! Long-polling event loop and MessagingPlatform trait implementation.

use super::conversation::{BridgeConversation, BridgeGroup};
use super::types::{EventsPage, WireConversation, WireGroups, WireInbox};
use super::BridgePlatform;
use async_trait::async_trait;
use grouper_core::{
    error::{GrouperError, PlatformError},
    message::{ConversationKind, InboundEvent},
    traits::{Conversation, GroupHandle, MessagingPlatform},
};
use reqwest::Method;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info};

/// Events path for the given cursor.
pub(crate) fn events_path(cursor: Option<&str>, timeout_secs: u64) -> String {
    match cursor {
        Some(c) => format!("/v1/events?timeout={timeout_secs}&cursor={c}"),
        None => format!("/v1/events?timeout={timeout_secs}"),
    }
}

impl BridgePlatform {
    fn group_handle(&self, wire: WireConversation) -> Arc<dyn GroupHandle> {
        Arc::new(BridgeGroup {
            http: self.http.clone(),
            id: wire.id,
            name: wire.name,
        })
    }
}

#[async_trait]
impl MessagingPlatform for BridgePlatform {
    fn name(&self) -> &str {
        "bridge"
    }

    fn self_inbox_id(&self) -> &str {
        &self.inbox_id
    }

    async fn start(&self) -> Result<mpsc::Receiver<InboundEvent>, GrouperError> {
        let (tx, rx) = mpsc::channel(64);
        let http = self.http.clone();
        let cursor = self.cursor.clone();
        let timeout_secs = self.poll_timeout_secs;

        info!("bridge: starting event long polling...");

        let handle = tokio::spawn(async move {
            let mut backoff_secs: u64 = 1;

            loop {
                let current = cursor.lock().await.clone();
                let path = events_path(current.as_deref(), timeout_secs);

                let page: EventsPage = match http.call_required(Method::GET, &path, None).await {
                    Ok(p) => p,
                    Err(e) => {
                        error!("bridge poll error (retry in {backoff_secs}s): {e}");
                        tokio::time::sleep(std::time::Duration::from_secs(backoff_secs)).await;
                        backoff_secs = (backoff_secs * 2).min(60);
                        continue;
                    }
                };

                // Successful poll -- reset backoff.
                backoff_secs = 1;

                if let Some(next) = page.cursor {
                    *cursor.lock().await = Some(next);
                }

                for wire in page.events {
                    if tx.send(wire.into_inbound()).await.is_err() {
                        info!("bridge event receiver dropped, stopping poll");
                        return;
                    }
                }
            }
        });

        if let Some(previous) = self.poller.lock().await.replace(handle) {
            previous.abort();
        }
        Ok(rx)
    }

    async fn create_group(&self, members: &[String]) -> Result<Arc<dyn GroupHandle>, PlatformError> {
        let wire: WireConversation = self
            .http
            .call_required(
                Method::POST,
                "/v1/groups",
                Some(json!({ "members": members })),
            )
            .await?;
        info!("bridge: created group {}", wire.id);
        Ok(self.group_handle(wire))
    }

    async fn list_groups(&self) -> Result<Vec<Arc<dyn GroupHandle>>, PlatformError> {
        let wire: WireGroups = self
            .http
            .call_required(Method::GET, "/v1/groups", None)
            .await?;
        Ok(wire
            .groups
            .into_iter()
            .map(|g| self.group_handle(g))
            .collect())
    }

    async fn get_group_by_id(
        &self,
        id: &str,
    ) -> Result<Option<Arc<dyn GroupHandle>>, PlatformError> {
        let wire: Option<WireConversation> = self
            .http
            .call(Method::GET, &format!("/v1/conversations/{id}"), None)
            .await?;
        Ok(wire
            .filter(|c| c.kind == ConversationKind::Group)
            .map(|c| self.group_handle(c)))
    }

    async fn get_conversation(
        &self,
        id: &str,
    ) -> Result<Option<Arc<dyn Conversation>>, PlatformError> {
        let wire: Option<WireConversation> = self
            .http
            .call(Method::GET, &format!("/v1/conversations/{id}"), None)
            .await?;
        Ok(wire.map(|c| {
            Arc::new(BridgeConversation {
                http: self.http.clone(),
                id: c.id,
                kind: c.kind,
            }) as Arc<dyn Conversation>
        }))
    }

    async fn resolve_address_to_recipient(
        &self,
        address: &str,
    ) -> Result<Option<String>, PlatformError> {
        let wire: Option<WireInbox> = self
            .http
            .call(
                Method::GET,
                &format!("/v1/inboxes/by-address/{}", address.to_lowercase()),
                None,
            )
            .await?;
        Ok(wire.and_then(|w| w.inbox_id))
    }

    async fn stop(&self) -> Result<(), GrouperError> {
        if let Some(poller) = self.poller.lock().await.take() {
            poller.abort();
        }
        info!("bridge platform stopped");
        Ok(())
    }
}
