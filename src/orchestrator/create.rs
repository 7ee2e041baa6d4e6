use super::{Orchestrator, Origin, SidebarError, SidebarGroup};
use crate::actions;
use grouper_core::{
    message::{ActionStyle, Invitation, InvitationAction, OutgoingContent},
    traits::Conversation,
};
use tracing::{error, info, warn};

/// Result of a successful create.
#[derive(Debug, Clone)]
pub struct CreateOutcome {
    pub group: SidebarGroup,
    /// Reply for the conversation the command came from. `None` when the
    /// invitation itself was the reply.
    pub reply: Option<String>,
}

pub(crate) const EMPTY_NAME_HINT: &str =
    "✏️ Your group needs a name. Try something like `create Project X`.";

fn welcome_text(name: &str) -> String {
    format!(
        "👋 Welcome to \"{name}\"! This sidebar is for a focused conversation. \
         Its creator is the admin and can invite more people."
    )
}

fn ask_for_members(name: &str) -> String {
    format!(
        "✅ Created \"{name}\"! Who should I add? Mention them like @alice @bob.eth \
         or paste their wallet addresses. Say \"done\" to skip."
    )
}

fn invitation_fallback(name: &str) -> String {
    format!(
        "✅ Created \"{name}\", but I couldn't post the invitation here. \
         Mention the people to add and I'll invite them directly."
    )
}

/// The join/decline invitation for a group.
pub(crate) fn invitation_for(group: &SidebarGroup) -> Invitation {
    Invitation {
        id: format!("sidebar_invite_{}", group.id),
        description: format!(
            "🎯 \"{}\" sidebar created! Join to continue the conversation there.",
            group.name
        ),
        actions: vec![
            InvitationAction {
                id: actions::join_sidebar_id(&group.id),
                label: "✅ Join".to_string(),
                style: ActionStyle::Primary,
            },
            InvitationAction {
                id: actions::decline_sidebar_id(&group.id),
                label: "❌ Decline".to_string(),
                style: ActionStyle::Secondary,
            },
        ],
    }
}

impl Orchestrator {
    /// Create a sidebar group named `name` with `creator_id` as its admin.
    ///
    /// Only the remote create call can fail this; everything after it is
    /// logged and skipped on failure.
    pub async fn create(
        &self,
        name: &str,
        creator_id: &str,
        origin: Origin,
    ) -> Result<CreateOutcome, SidebarError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(SidebarError::Validation(EMPTY_NAME_HINT.to_string()));
        }

        info!(
            "creating sidebar \"{name}\" for {creator_id} (from {})",
            origin.original_group_id()
        );

        let group = self
            .call(
                "create_group",
                self.platform.create_group(&[creator_id.to_string()]),
            )
            .await
            .map_err(|e| {
                let err = SidebarError::from(e);
                match &err {
                    SidebarError::Unknown(raw) => error!("create_group failed: {raw}"),
                    other => warn!("create_group failed: {other}"),
                }
                err
            })?;
        let group_id = group.id().to_string();

        if let Err(e) = self.call("rename", group.rename(name)).await {
            warn!("renaming {group_id} to \"{name}\" failed: {e}");
        }

        let record = SidebarGroup::new(&group_id, name, origin.clone(), creator_id);
        self.groups.insert(record.clone());

        if let Err(e) = self
            .call("add_super_admin", group.add_super_admin(creator_id))
            .await
        {
            warn!("promoting {creator_id} in {group_id} failed: {e}");
        }

        self.announce(group.as_ref(), welcome_text(name), "welcome message")
            .await;

        let reply = match &origin {
            Origin::Dm | Origin::PrivateGroup(_) => Some(ask_for_members(name)),
            Origin::Group(conversation_id) => self.invite(&record, conversation_id).await,
        };

        info!("sidebar \"{name}\" ready as {group_id}");
        Ok(CreateOutcome {
            group: record,
            reply,
        })
    }

    /// Post the join/decline invitation into the originating conversation.
    async fn invite(&self, group: &SidebarGroup, conversation_id: &str) -> Option<String> {
        let conversation = match self
            .call(
                "get_conversation",
                self.platform.get_conversation(conversation_id),
            )
            .await
        {
            Ok(Some(conversation)) => conversation,
            Ok(None) => {
                warn!("origin conversation {conversation_id} not found, no invitation sent");
                return Some(invitation_fallback(&group.name));
            }
            Err(e) => {
                warn!("fetching origin conversation {conversation_id} failed: {e}");
                return Some(invitation_fallback(&group.name));
            }
        };

        let invitation = OutgoingContent::Actions(invitation_for(group));
        match self.call("send_invitation", conversation.send(invitation)).await {
            Ok(()) => {
                self.groups.record_invitation(&group.id, conversation_id);
                None
            }
            Err(e) => {
                warn!("invitation for {} failed: {e}", group.id);
                Some(invitation_fallback(&group.name))
            }
        }
    }
}
