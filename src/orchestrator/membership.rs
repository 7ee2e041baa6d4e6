use super::{Orchestrator, SidebarError};
use crate::resolver::normalize_token;
use grouper_core::traits::Conversation;
use std::fmt::Write;
use tracing::{error, info, warn};

/// How an `add_members` request went, token by token.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AddMembersReport {
    pub group_name: String,
    pub added: Vec<String>,
    pub already_members: Vec<String>,
    pub unresolved: Vec<String>,
    /// `(token, reason)`
    pub failed: Vec<(String, String)>,
    /// `(token, earlier token)` pairs naming a recipient already targeted.
    pub same_as: Vec<(String, String)>,
}

const FORMAT_HINT: &str = "💡 Mention people by ENS name (@name.eth), Base name \
                           (@name.base.eth) or wallet address (@0x…).";

fn mention_list<'a>(tokens: impl IntoIterator<Item = &'a String>) -> String {
    tokens
        .into_iter()
        .map(|t| format!("@{}", t.trim_start_matches('@')))
        .collect::<Vec<_>>()
        .join(", ")
}

impl AddMembersReport {
    pub fn any_added(&self) -> bool {
        !self.added.is_empty()
    }

    /// Reply text listing successes and failures separately.
    pub fn summary(&self) -> String {
        let mut lines = Vec::new();
        if !self.added.is_empty() {
            lines.push(format!(
                "✅ Added to \"{}\": {}",
                self.group_name,
                mention_list(&self.added)
            ));
        }
        if !self.already_members.is_empty() {
            lines.push(format!(
                "ℹ️ Already in \"{}\": {}",
                self.group_name,
                mention_list(&self.already_members)
            ));
        }
        if !self.same_as.is_empty() {
            let pairs = self
                .same_as
                .iter()
                .map(|(token, first)| {
                    format!(
                        "@{} is @{}",
                        token.trim_start_matches('@'),
                        first.trim_start_matches('@')
                    )
                })
                .collect::<Vec<_>>();
            lines.push(format!("🔁 Same person: {}", pairs.join(", ")));
        }
        if !self.unresolved.is_empty() {
            lines.push(format!("⚠️ Couldn't find: {}", mention_list(&self.unresolved)));
        }
        if !self.failed.is_empty() {
            let mut line = "❌ Couldn't add:".to_string();
            for (i, (token, reason)) in self.failed.iter().enumerate() {
                let sep = if i == 0 { " " } else { ", " };
                let _ = write!(line, "{sep}@{} ({reason})", token.trim_start_matches('@'));
            }
            lines.push(line);
        }
        if !self.unresolved.is_empty() || !self.failed.is_empty() {
            lines.push(FORMAT_HINT.to_string());
        }
        lines.join("\n")
    }
}

/// Short reason for one failed addition.
fn failure_reason(err: &SidebarError) -> String {
    match err {
        SidebarError::TransientPlatform(_) => "network busy, try again shortly".to_string(),
        SidebarError::Unknown(raw) => raw.message.clone(),
        other => other.to_string(),
    }
}

impl Orchestrator {
    /// Add `user_id` to a sidebar group. Joining twice is success both times.
    pub async fn join(&self, group_id: &str, user_id: &str) -> Result<String, SidebarError> {
        let record = self
            .groups
            .get(group_id)
            .ok_or_else(|| SidebarError::NotFound(group_id.to_string()))?;

        let remote = self
            .call("list_groups", self.platform.list_groups())
            .await
            .map_err(SidebarError::from)?
            .into_iter()
            .find(|g| g.id() == group_id)
            .ok_or_else(|| {
                warn!("lost access to sidebar {group_id}");
                SidebarError::NotFound(group_id.to_string())
            })?;

        match self
            .call("add_members", remote.add_members(&[user_id.to_string()]))
            .await
            .map_err(SidebarError::from)
        {
            Ok(()) => {
                self.groups.add_member(group_id, user_id);
                info!("{user_id} joined sidebar {group_id}");
                self.announce(
                    remote.as_ref(),
                    format!("👋 A new member just joined \"{}\"!", record.name),
                    "join announcement",
                )
                .await;
                Ok(format!(
                    "✅ You've joined \"{}\"! Check your conversations for the new group.",
                    record.name
                ))
            }
            Err(e) if e.is_already_satisfied() => {
                self.groups.add_member(group_id, user_id);
                info!("{user_id} was already in sidebar {group_id}");
                Ok(format!("✅ You're already a member of \"{}\".", record.name))
            }
            Err(e) => {
                match &e {
                    SidebarError::Unknown(raw) => error!("adding {user_id} to {group_id}: {raw}"),
                    other => warn!("adding {user_id} to {group_id}: {other}"),
                }
                Err(e)
            }
        }
    }

    /// Acknowledge a declined invitation. Touches nothing remote.
    pub fn decline(&self, group_id: &str, user_id: &str) -> String {
        info!("{user_id} declined sidebar {group_id}");
        match self.groups.get(group_id) {
            Some(group) => format!("👌 No problem, you won't be added to \"{}\".", group.name),
            None => "👌 No problem.".to_string(),
        }
    }

    /// Resolve `tokens` and add every resolvable one to the group.
    ///
    /// Only the group's creator may do this; anyone else is rejected before
    /// any remote call. Individual failures are collected, never propagated.
    pub async fn add_members(
        &self,
        group_id: &str,
        tokens: &[String],
        requester_id: &str,
    ) -> Result<AddMembersReport, SidebarError> {
        let record = self
            .groups
            .get(group_id)
            .ok_or_else(|| SidebarError::NotFound(group_id.to_string()))?;

        if record.created_by != requester_id {
            warn!("{requester_id} tried to add members to {group_id} owned by {}", record.created_by);
            return Err(SidebarError::Authorization {
                group_id: group_id.to_string(),
                requester: requester_id.to_string(),
            });
        }

        if tokens.is_empty() {
            return Err(SidebarError::Validation(format!(
                "Mention the people to add, like @alice @bob.eth.\n{FORMAT_HINT}"
            )));
        }

        let mut report = AddMembersReport {
            group_name: record.name.clone(),
            ..AddMembersReport::default()
        };

        let mut targets: Vec<(String, String)> = Vec::new();
        for resolution in self.resolver.resolve_batch(tokens).await {
            match resolution.recipient {
                Some(recipient) => match targets.iter().find(|(_, r)| *r == recipient) {
                    // A literal repeat is the same mention, not a second name.
                    Some((first, _))
                        if normalize_token(first) == normalize_token(&resolution.token) => {}
                    Some((first, _)) => report.same_as.push((resolution.token, first.clone())),
                    None => targets.push((resolution.token, recipient)),
                },
                None => report.unresolved.push(resolution.token),
            }
        }

        if targets.is_empty() {
            return Ok(report);
        }

        let remote = self
            .call("get_group_by_id", self.platform.get_group_by_id(group_id))
            .await
            .map_err(SidebarError::from)?
            .ok_or_else(|| SidebarError::NotFound(group_id.to_string()))?;

        for (token, recipient) in targets {
            let outcome = self
                .call("add_members", remote.add_members(std::slice::from_ref(&recipient)))
                .await
                .map_err(SidebarError::from);
            match outcome {
                Ok(()) => {
                    self.groups.add_member(group_id, &recipient);
                    report.added.push(token);
                }
                Err(e) if e.is_already_satisfied() => {
                    self.groups.add_member(group_id, &recipient);
                    report.already_members.push(token);
                }
                Err(e) => {
                    warn!("adding {token} ({recipient}) to {group_id} failed: {e}");
                    report.failed.push((token, failure_reason(&e)));
                }
            }
        }

        if report.any_added() {
            self.announce(
                remote.as_ref(),
                format!(
                    "👋 Welcome {}! You were added to \"{}\".",
                    mention_list(&report.added),
                    record.name
                ),
                "member notice",
            )
            .await;
        }

        info!(
            "add_members {group_id}: {} added, {} already, {} unresolved, {} failed",
            report.added.len(),
            report.already_members.len(),
            report.unresolved.len(),
            report.failed.len()
        );
        Ok(report)
    }
}
