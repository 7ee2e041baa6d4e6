//! The event loop between the platform and the orchestration core.
//!
//! Events are handled one at a time in arrival order; the next event is not
//! pulled until the current one is finished. A background task sweeps idle
//! conversation state and stale invitations.

mod flow;
mod pipeline;

#[cfg(test)]
mod tests;

use crate::grammar::CommandGrammar;
use crate::orchestrator::Orchestrator;
use crate::resolver::HandleResolver;
use crate::state::ConversationStore;
use grouper_core::{
    config::ConversationConfig,
    traits::{MessagingPlatform, Provider},
};
use grouper_memory::{AuditLogger, Store};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// Routes inbound platform events into the conversation flow.
pub struct Gateway {
    pub(super) platform: Arc<dyn MessagingPlatform>,
    pub(super) provider: Arc<dyn Provider>,
    pub(super) orchestrator: Arc<Orchestrator>,
    pub(super) resolver: Arc<HandleResolver>,
    pub(super) grammar: CommandGrammar,
    pub(super) conversations: Arc<ConversationStore>,
    pub(super) audit: AuditLogger,
    pub(super) conversation_config: ConversationConfig,
    /// Deadline for platform and generator calls made directly by the router.
    pub(super) call_timeout: Duration,
    pub(super) agent_name: String,
}

impl Gateway {
    /// Create a new gateway.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        platform: Arc<dyn MessagingPlatform>,
        provider: Arc<dyn Provider>,
        orchestrator: Arc<Orchestrator>,
        resolver: Arc<HandleResolver>,
        grammar: CommandGrammar,
        memory: &Store,
        conversation_config: ConversationConfig,
        call_timeout: Duration,
        agent_name: String,
    ) -> Self {
        Self {
            platform,
            provider,
            orchestrator,
            resolver,
            grammar,
            conversations: Arc::new(ConversationStore::from_config(&conversation_config)),
            audit: AuditLogger::new(memory.pool().clone()),
            conversation_config,
            call_timeout,
            agent_name,
        }
    }

    /// Per-sender conversation state.
    pub fn conversations(&self) -> &ConversationStore {
        &self.conversations
    }

    /// Run the main event loop until the event stream ends or Ctrl-C.
    pub async fn run(self: Arc<Self>) -> anyhow::Result<()> {
        info!(
            "{} gateway running | platform: {} ({}) | provider: {} | handle: @{}",
            self.agent_name,
            self.platform.name(),
            self.platform.self_inbox_id(),
            self.provider.name(),
            self.grammar.handle(),
        );

        let mut rx = self.platform.start().await?;

        let sweep_handle = tokio::spawn(Self::sweeper(
            self.conversations.clone(),
            self.orchestrator.clone(),
            self.conversation_config.sweep_interval(),
            self.conversation_config.invitation_ttl(),
        ));

        loop {
            tokio::select! {
                event = rx.recv() => match event {
                    Some(event) => self.handle_event(event).await,
                    None => {
                        info!("event stream closed");
                        break;
                    }
                },
                _ = tokio::signal::ctrl_c() => {
                    info!("Received shutdown signal");
                    break;
                }
            }
        }

        self.shutdown(&sweep_handle).await;
        Ok(())
    }

    /// Periodically evict idle conversations and expired invitations.
    async fn sweeper(
        conversations: Arc<ConversationStore>,
        orchestrator: Arc<Orchestrator>,
        every: Duration,
        invitation_ttl: Duration,
    ) {
        let mut ticker = tokio::time::interval(every);
        // First tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            conversations.sweep();
            orchestrator.groups().sweep_invitations(invitation_ttl);
            debug!(
                "sweep done: {} live conversations, {} sidebar groups",
                conversations.len(),
                orchestrator.groups().len()
            );
        }
    }

    async fn shutdown(&self, sweep_handle: &tokio::task::JoinHandle<()>) {
        info!("Shutting down...");
        sweep_handle.abort();
        if let Err(e) = self.platform.stop().await {
            error!("failed to stop {}: {e}", self.platform.name());
        }
        info!("Shutdown complete.");
    }
}
