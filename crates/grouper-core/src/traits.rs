use crate::{
    context::Context,
    error::{GrouperError, PlatformError},
    message::{ConversationKind, InboundEvent, OutgoingContent},
};
use async_trait::async_trait;
use std::sync::Arc;

/// A conversation the agent can post into (DM or group).
#[async_trait]
pub trait Conversation: Send + Sync {
    /// Platform conversation id.
    fn id(&self) -> &str;

    fn kind(&self) -> ConversationKind;

    /// Post text or a structured invitation into this conversation.
    async fn send(&self, content: OutgoingContent) -> Result<(), PlatformError>;
}

/// Group-only capabilities. The orchestrator only ever touches a group
/// through this narrow surface.
#[async_trait]
pub trait GroupHandle: Conversation {
    /// Current display name of the group, if the platform reports one.
    fn name(&self) -> Option<&str>;

    async fn rename(&self, name: &str) -> Result<(), PlatformError>;

    async fn add_super_admin(&self, inbox_id: &str) -> Result<(), PlatformError>;

    async fn add_members(&self, inbox_ids: &[String]) -> Result<(), PlatformError>;
}

/// Messaging platform client.
#[async_trait]
pub trait MessagingPlatform: Send + Sync {
    /// Human-readable platform name.
    fn name(&self) -> &str;

    /// The agent's own recipient identifier. Events authored by this id are ignored.
    fn self_inbox_id(&self) -> &str;

    /// Start listening for inbound events.
    async fn start(&self) -> Result<tokio::sync::mpsc::Receiver<InboundEvent>, GrouperError>;

    /// Create a group whose initial members are `members`.
    async fn create_group(&self, members: &[String]) -> Result<Arc<dyn GroupHandle>, PlatformError>;

    /// All groups the agent can currently see.
    async fn list_groups(&self) -> Result<Vec<Arc<dyn GroupHandle>>, PlatformError>;

    /// Look up a group by id. `Ok(None)` when the agent has no access.
    async fn get_group_by_id(&self, id: &str)
        -> Result<Option<Arc<dyn GroupHandle>>, PlatformError>;

    /// Look up any conversation (DM or group) by id.
    async fn get_conversation(
        &self,
        id: &str,
    ) -> Result<Option<Arc<dyn Conversation>>, PlatformError>;

    /// Map a wallet/account address to the platform recipient identifier.
    async fn resolve_address_to_recipient(
        &self,
        address: &str,
    ) -> Result<Option<String>, PlatformError>;

    /// Graceful shutdown.
    async fn stop(&self) -> Result<(), GrouperError>;
}

/// External directory / name service (ENS and friends).
#[async_trait]
pub trait NameService: Send + Sync {
    fn name(&self) -> &str;

    /// Resolve a human handle (e.g. "bob.eth") to an address.
    async fn resolve_handle_to_address(&self, handle: &str)
        -> Result<Option<String>, GrouperError>;
}

/// Local persisted handle ↔ identity cache.
#[async_trait]
pub trait HandleCache: Send + Sync {
    async fn lookup(&self, handle: &str) -> Result<Option<String>, GrouperError>;

    async fn remember(
        &self,
        handle: &str,
        inbox_id: &str,
        address: Option<&str>,
    ) -> Result<(), GrouperError>;
}

/// Text generator, used for free-text fallback replies and yes/no oracles.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Human-readable provider name.
    fn name(&self) -> &str;

    /// Send a prompt plus context to the generator and get its text back.
    async fn complete(&self, context: &Context) -> Result<String, GrouperError>;

    /// Check if the provider is available and ready.
    async fn is_available(&self) -> bool;
}
