//! Sidebar group lifecycle against the messaging platform.
//!
//! Creation is a chain of remote calls where only the first one (creating the
//! group) may fail the operation; rename, admin promotion and the various
//! announcements are best effort. Membership changes are classified into
//! [`SidebarError`] so callers can show one message per outcome.

mod create;
mod errors;
mod groups;
mod membership;


pub use create::CreateOutcome;
pub use errors::SidebarError;
pub use groups::{GroupTable, Origin, PendingInvitation, SidebarGroup, DM_ORIGIN};
pub use membership::AddMembersReport;

use crate::deadline::with_deadline;
use crate::resolver::HandleResolver;
use grouper_core::{
    error::PlatformError,
    message::OutgoingContent,
    traits::{Conversation, MessagingPlatform},
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Creates sidebar groups and manages their membership.
pub struct Orchestrator {
    platform: Arc<dyn MessagingPlatform>,
    resolver: Arc<HandleResolver>,
    groups: GroupTable,
    call_timeout: Duration,
}

impl Orchestrator {
    pub fn new(
        platform: Arc<dyn MessagingPlatform>,
        resolver: Arc<HandleResolver>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            platform,
            resolver,
            groups: GroupTable::new(),
            call_timeout,
        }
    }

    /// Local record of every group created so far.
    pub fn groups(&self) -> &GroupTable {
        &self.groups
    }

    /// Run one remote call under the configured deadline.
    async fn call<T, F>(&self, operation: &str, fut: F) -> Result<T, PlatformError>
    where
        F: Future<Output = Result<T, PlatformError>>,
    {
        with_deadline(self.call_timeout, operation, fut).await
    }

    /// Post text into a conversation, logging instead of failing.
    async fn announce<C>(&self, conversation: &C, text: String, what: &str) -> bool
    where
        C: Conversation + ?Sized,
    {
        match self
            .call(what, conversation.send(OutgoingContent::text(text)))
            .await
        {
            Ok(()) => true,
            Err(e) => {
                warn!("{what} in {} failed: {e}", conversation.id());
                false
            }
        }
    }
}
