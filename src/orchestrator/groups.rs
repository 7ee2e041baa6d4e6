//! In-memory table of sidebar groups the agent created.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::info;

/// `original_group_id` of a group started from a direct message.
pub const DM_ORIGIN: &str = "dm";

/// Where a create command came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    Dm,
    /// A shared group; the invitation goes back there.
    Group(String),
    /// A group command marked `private`; no public invitation.
    PrivateGroup(String),
}

impl Origin {
    pub fn original_group_id(&self) -> &str {
        match self {
            Self::Dm => DM_ORIGIN,
            Self::Group(id) | Self::PrivateGroup(id) => id,
        }
    }
}

/// A group created on someone's behalf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidebarGroup {
    pub id: String,
    pub name: String,
    pub origin: Origin,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    /// Recipient ids, insertion ordered, no duplicates.
    pub members: Vec<String>,
}

impl SidebarGroup {
    pub fn new(id: &str, name: &str, origin: Origin, created_by: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            origin,
            created_by: created_by.to_string(),
            created_at: Utc::now(),
            members: vec![created_by.to_string()],
        }
    }

    /// Append a member. Returns false if already present.
    pub fn add_member(&mut self, inbox_id: &str) -> bool {
        if self.members.iter().any(|m| m == inbox_id) {
            return false;
        }
        self.members.push(inbox_id.to_string());
        true
    }

    pub fn has_member(&self, inbox_id: &str) -> bool {
        self.members.iter().any(|m| m == inbox_id)
    }
}

/// An invitation posted into a shared group. Anyone who sees it may join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingInvitation {
    pub group_id: String,
    pub original_group_id: String,
    pub created_at: DateTime<Utc>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Sidebar groups and their invitations, keyed by group id.
#[derive(Default)]
pub struct GroupTable {
    groups: Mutex<HashMap<String, SidebarGroup>>,
    invitations: Mutex<HashMap<String, PendingInvitation>>,
}

impl GroupTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new group. The id of an existing record is never rebound.
    pub fn insert(&self, group: SidebarGroup) -> bool {
        let mut groups = lock(&self.groups);
        if groups.contains_key(&group.id) {
            return false;
        }
        groups.insert(group.id.clone(), group);
        true
    }

    pub fn get(&self, group_id: &str) -> Option<SidebarGroup> {
        lock(&self.groups).get(group_id).cloned()
    }

    /// Record a member locally. Returns false if unknown group or already a member.
    pub fn add_member(&self, group_id: &str, inbox_id: &str) -> bool {
        lock(&self.groups)
            .get_mut(group_id)
            .is_some_and(|g| g.add_member(inbox_id))
    }

    /// Most recent group created by `creator`.
    pub fn latest_created_by(&self, creator: &str) -> Option<SidebarGroup> {
        lock(&self.groups)
            .values()
            .filter(|g| g.created_by == creator)
            .max_by_key(|g| g.created_at)
            .cloned()
    }

    pub fn record_invitation(&self, group_id: &str, original_group_id: &str) {
        lock(&self.invitations).insert(
            group_id.to_string(),
            PendingInvitation {
                group_id: group_id.to_string(),
                original_group_id: original_group_id.to_string(),
                created_at: Utc::now(),
            },
        );
    }

    #[cfg(test)]
    pub(crate) fn invitation(&self, group_id: &str) -> Option<PendingInvitation> {
        lock(&self.invitations).get(group_id).cloned()
    }

    /// Drop invitations older than `ttl`.
    pub fn sweep_invitations(&self, ttl: Duration) -> usize {
        self.sweep_invitations_at(Utc::now(), ttl)
    }

    pub(crate) fn sweep_invitations_at(&self, now: DateTime<Utc>, ttl: Duration) -> usize {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::days(1));
        let cutoff = now - ttl;
        let mut invitations = lock(&self.invitations);
        let before = invitations.len();
        invitations.retain(|_, inv| inv.created_at >= cutoff);
        let removed = before - invitations.len();
        if removed > 0 {
            info!("expired {removed} pending invitations");
        }
        removed
    }

    pub fn len(&self) -> usize {
        lock(&self.groups).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
