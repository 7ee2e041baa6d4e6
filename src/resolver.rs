//! Mention token → platform recipient resolution.
//!
//! Tokens are tried against three sources, first hit wins:
//! 1. the token already is a recipient (inbox id) or an address the platform
//!    can map;
//! 2. the local handle cache;
//! 3. the configured name services, one candidate handle at a time.
//!
//! Nothing in here returns an error. Every failing stage is logged and the
//! chain moves on; a token nobody can place resolves to `None`.

use crate::deadline::with_deadline;
use futures::future::join_all;
use grouper_core::{
    message::InboundEvent,
    traits::{HandleCache, MessagingPlatform, NameService},
};
use grouper_platform::directory::is_address;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Outcome for one token of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// The token as it was given.
    pub token: String,
    pub recipient: Option<String>,
}

impl Resolution {
    pub fn is_resolved(&self) -> bool {
        self.recipient.is_some()
    }
}

#[derive(Debug, PartialEq, Eq)]
enum TokenForm {
    Inbox(String),
    Address(String),
    Handle(String),
}

/// Platform inbox ids are 64 hex characters.
fn is_inbox_id(s: &str) -> bool {
    s.len() == 64 && s.chars().all(|c| c.is_ascii_hexdigit())
}

/// Strip the `@`, trailing sentence punctuation, and case.
pub(crate) fn normalize_token(token: &str) -> String {
    token
        .trim()
        .trim_start_matches('@')
        .trim_end_matches(['.', '-'])
        .to_lowercase()
}

fn classify(token: &str) -> Option<TokenForm> {
    let normalized = normalize_token(token);
    if normalized.is_empty() {
        return None;
    }
    if is_inbox_id(&normalized) {
        Some(TokenForm::Inbox(normalized))
    } else if is_address(&normalized) {
        Some(TokenForm::Address(normalized))
    } else {
        Some(TokenForm::Handle(normalized))
    }
}

/// Staged resolver over the platform, the local cache and the name services.
pub struct HandleResolver {
    platform: Arc<dyn MessagingPlatform>,
    cache: Arc<dyn HandleCache>,
    services: Vec<Arc<dyn NameService>>,
    /// Appended to bare handles ("bob" → "bob.eth").
    suffixes: Vec<String>,
    call_timeout: Duration,
}

impl HandleResolver {
    pub fn new(
        platform: Arc<dyn MessagingPlatform>,
        cache: Arc<dyn HandleCache>,
        services: Vec<Arc<dyn NameService>>,
        suffixes: Vec<String>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            platform,
            cache,
            services,
            suffixes,
            call_timeout,
        }
    }

    /// Resolve one mention token to a recipient id.
    pub async fn resolve(&self, token: &str) -> Option<String> {
        let recipient = match classify(token)? {
            TokenForm::Inbox(inbox) => Some(inbox),
            // The platform may still accept a raw address when it has no inbox on file.
            TokenForm::Address(address) => Some(
                self.address_to_recipient(&address)
                    .await
                    .unwrap_or(address),
            ),
            TokenForm::Handle(handle) => self.resolve_handle(&handle).await,
        };

        match &recipient {
            Some(r) => debug!("resolved {token} → {r}"),
            None => info!("could not resolve {token}"),
        }
        recipient
    }

    /// Resolve every token concurrently. One entry per input token, in input
    /// order; a slow or failing token never affects its siblings.
    pub async fn resolve_batch(&self, tokens: &[String]) -> Vec<Resolution> {
        join_all(tokens.iter().map(|token| async move {
            Resolution {
                token: token.clone(),
                recipient: self.resolve(token).await,
            }
        }))
        .await
    }

    /// Remember the sender's display handle so later mentions of it resolve
    /// locally. Returns whether anything was stored.
    pub async fn remember_sender(&self, event: &InboundEvent) -> bool {
        let Some(name) = event.sender_name.as_deref() else {
            return false;
        };
        let handle = normalize_token(name);
        if handle.is_empty() || is_address(&handle) || is_inbox_id(&handle) {
            return false;
        }

        match self
            .cache
            .remember(
                &handle,
                &event.sender_inbox_id,
                event.sender_address.as_deref(),
            )
            .await
        {
            Ok(()) => {
                debug!("captured identity {handle} → {}", event.sender_inbox_id);
                true
            }
            Err(e) => {
                warn!("identity capture for {handle} failed: {e}");
                false
            }
        }
    }

    async fn resolve_handle(&self, handle: &str) -> Option<String> {
        match self.cache.lookup(handle).await {
            Ok(Some(inbox)) => return Some(inbox),
            Ok(None) => {}
            Err(e) => warn!("handle cache lookup for {handle} failed: {e}"),
        }

        let (address, recipient) = self.lookup_directory(handle).await?;

        if let Err(e) = self.cache.remember(handle, &recipient, Some(&address)).await {
            warn!("failed to cache {handle}: {e}");
        }
        Some(recipient)
    }

    /// Handles to ask the name services for, most specific first.
    fn candidates(&self, handle: &str) -> Vec<String> {
        if handle.contains('.') || self.suffixes.is_empty() {
            return vec![handle.to_string()];
        }
        self.suffixes
            .iter()
            .map(|suffix| format!("{handle}{suffix}"))
            .collect()
    }

    /// First `(address, recipient)` any name service yields for the handle.
    async fn lookup_directory(&self, handle: &str) -> Option<(String, String)> {
        for candidate in self.candidates(handle) {
            for service in &self.services {
                let lookup = with_deadline(
                    self.call_timeout,
                    service.name(),
                    service.resolve_handle_to_address(&candidate),
                )
                .await;

                let address = match lookup {
                    Ok(Some(address)) => address.to_lowercase(),
                    Ok(None) => continue,
                    Err(e) => {
                        warn!("{} lookup for {candidate} failed: {e}", service.name());
                        continue;
                    }
                };

                match self.address_to_recipient(&address).await {
                    Some(recipient) => {
                        info!("{} resolved {candidate} → {address}", service.name());
                        return Some((address, recipient));
                    }
                    None => debug!("{address} ({candidate}) has no inbox on the platform"),
                }
            }
        }
        None
    }

    async fn address_to_recipient(&self, address: &str) -> Option<String> {
        let lookup = with_deadline(
            self.call_timeout,
            "resolve_address_to_recipient",
            self.platform.resolve_address_to_recipient(address),
        )
        .await;

        match lookup {
            Ok(recipient) => recipient,
            Err(e) => {
                warn!("address lookup for {address} failed: {e}");
                None
            }
        }
    }
}
