//! Free-text conversation flow.
//!
//! A structural create command always wins. Otherwise the sender's current
//! step decides how the text is read; anything the step does not expect is
//! read again as if the sender were idle.

use super::pipeline::Reply;
use super::Gateway;
use crate::deadline::with_deadline;
use crate::grammar::{is_affirmative, is_decline, is_greeting, parse_mentions, ParsedCommand};
use crate::orchestrator::{Origin, SidebarError, SidebarGroup};
use crate::state::{Step, Transition};
use grouper_core::{
    context::Context,
    message::{ConversationKind, InboundEvent},
};
use grouper_memory::audit::AuditStatus;
use tracing::{debug, info, warn};

/// Instruction for the yes/no "is this asking to add people" oracle.
pub(super) const ADD_MEMBERS_ORACLE: &str = "You classify chat messages sent to a group \
    assistant. Decide whether the message asks to add or invite the mentioned people to a \
    group. Answer YES or NO only.";

const ASK_GROUP_NAME: &str = "🎯 Great! What should the group be called?";
const NOT_NOW: &str = "👌 No problem. Say hi whenever you need a sidebar.";
const NAME_CANCELLED: &str = "👌 Okay, no group for now.";
const ADD_REMINDER: &str =
    "👥 Mention the people to add, like @alice @bob.eth, or say \"done\" to finish.";
const ALL_SET: &str = "👍 All set! Enjoy your sidebar.";
const GENERATOR_UNAVAILABLE: &str =
    "🤖 I can't answer that right now. Try `create <name>` to start a sidebar group.";

fn greeting(agent_name: &str) -> String {
    format!(
        "👋 Hi! I'm {agent_name}. I can spin up a sidebar group for a focused conversation. \
         Want me to create one?"
    )
}

impl Gateway {
    /// Handle a text message already stripped of the agent mention.
    pub(super) async fn handle_text(
        &self,
        event: &InboundEvent,
        kind: ConversationKind,
        text: &str,
    ) -> Reply {
        let sender = event.sender_inbox_id.as_str();
        let state = self.conversations.observe(sender);

        if let Some(command) = self.grammar.parse_command(text) {
            return self.run_command(event, kind, command).await;
        }

        debug!("{sender} in {}: {text}", state.step);
        match state.step {
            Step::Idle => self.idle_text(event, text).await,

            Step::AskedCreateGroup => {
                if is_affirmative(text) {
                    self.advance(sender, Transition::Affirmative);
                    Reply::ok("flow", ASK_GROUP_NAME)
                } else if is_decline(text) {
                    self.advance(sender, Transition::Decline);
                    Reply::ok("flow", NOT_NOW)
                } else {
                    self.conversations.reset(sender);
                    self.idle_text(event, text).await
                }
            }

            Step::WaitingForGroupName => {
                if is_decline(text) {
                    self.conversations.reset(sender);
                    Reply::ok("flow", NAME_CANCELLED)
                } else {
                    self.create_sidebar(event, kind, text.trim(), false).await
                }
            }

            Step::AskedAddUsers | Step::WaitingForUsernames => {
                let mentions = parse_mentions(text);
                if !mentions.is_empty() {
                    match state.pending_group_id {
                        Some(group_id) => {
                            let reply = self.add_members(&group_id, &mentions, sender).await;
                            self.advance(sender, Transition::MentionsProcessed);
                            reply
                        }
                        None => {
                            self.conversations.reset(sender);
                            self.idle_text(event, text).await
                        }
                    }
                } else if is_decline(text) {
                    self.advance(sender, Transition::Decline);
                    Reply::ok("flow", ALL_SET)
                } else {
                    if state.step == Step::AskedAddUsers {
                        self.advance(sender, Transition::AwaitMentions);
                    }
                    Reply::ok("flow", ADD_REMINDER)
                }
            }
        }
    }

    /// Text from an idle sender: greeting, add-members request, or chat.
    async fn idle_text(&self, event: &InboundEvent, text: &str) -> Reply {
        let sender = event.sender_inbox_id.as_str();

        if is_greeting(text) {
            self.advance(sender, Transition::Greeting);
            return Reply::ok("flow", greeting(&self.agent_name));
        }

        let mentions = parse_mentions(text);
        if !mentions.is_empty() {
            if let Some(group) = self.recent_group(sender) {
                if self.wants_to_add_members(text).await {
                    return self.add_members(&group.id, &mentions, sender).await;
                }
            }
        }

        self.chat(event, text).await
    }

    /// A create command resets the sender and walks the flow from the top.
    async fn run_command(
        &self,
        event: &InboundEvent,
        kind: ConversationKind,
        command: ParsedCommand,
    ) -> Reply {
        let sender = event.sender_inbox_id.as_str();
        info!(
            "{sender}: {} command{} for \"{}\"",
            command.verb,
            if command.private { " (private)" } else { "" },
            command.name
        );
        self.conversations.reset(sender);
        self.advance(sender, Transition::Greeting);
        self.advance(sender, Transition::Affirmative);
        self.create_sidebar(event, kind, &command.name, command.private)
            .await
    }

    /// Create the group and move the sender on according to where they asked.
    async fn create_sidebar(
        &self,
        event: &InboundEvent,
        kind: ConversationKind,
        name: &str,
        private: bool,
    ) -> Reply {
        let sender = event.sender_inbox_id.as_str();
        let origin = match kind {
            ConversationKind::Dm => Origin::Dm,
            ConversationKind::Group if private => {
                Origin::PrivateGroup(event.conversation_id.clone())
            }
            ConversationKind::Group => Origin::Group(event.conversation_id.clone()),
        };

        match self.orchestrator.create(name, sender, origin).await {
            Ok(outcome) => {
                // A group-origin invitation is extra; the creator may still
                // mention people or say "done".
                self.advance(sender, Transition::GroupCreated);
                self.conversations
                    .set_pending_group(sender, &outcome.group.id, &outcome.group.name);
                Reply {
                    text: outcome.reply,
                    ..Reply::silent("create")
                }
            }
            // Still waiting for a usable name.
            Err(e @ SidebarError::Validation(_)) => Reply::failed("create", &e),
            Err(e) => {
                self.conversations.reset(sender);
                Reply::failed("create", &e)
            }
        }
    }

    async fn add_members(&self, group_id: &str, mentions: &[String], sender: &str) -> Reply {
        match self
            .orchestrator
            .add_members(group_id, mentions, sender)
            .await
        {
            Ok(report) => Reply::ok("add_members", report.summary()),
            Err(e) => Reply::failed("add_members", &e),
        }
    }

    /// The group an idle sender most plausibly means: the one pending in their
    /// flow, else the latest one they created while their history is fresh.
    fn recent_group(&self, sender: &str) -> Option<SidebarGroup> {
        let groups = self.orchestrator.groups();
        if let Some(group) = self
            .conversations
            .snapshot(sender)
            .pending_group_id
            .and_then(|id| groups.get(&id))
        {
            return Some(group);
        }
        if self.conversations.history(sender).is_empty() {
            return None;
        }
        groups.latest_created_by(sender)
    }

    /// Ask the text generator whether the message requests adding people.
    async fn wants_to_add_members(&self, text: &str) -> bool {
        let context = Context {
            system_prompt: ADD_MEMBERS_ORACLE.to_string(),
            history: Vec::new(),
            current_message: text.to_string(),
            model: None,
        };
        match with_deadline(self.call_timeout, "add_members_oracle", self.provider.complete(&context))
            .await
        {
            Ok(answer) => answer.trim().to_uppercase().starts_with("YES"),
            Err(e) => {
                warn!("add-members oracle failed: {e}");
                false
            }
        }
    }

    /// Free-text fallback through the text generator.
    async fn chat(&self, event: &InboundEvent, text: &str) -> Reply {
        let mut context = Context::new(text);
        for entry in self.conversations.history(&event.sender_inbox_id) {
            context.push_exchange(&entry.user_message, &entry.bot_response);
        }

        match with_deadline(self.call_timeout, "generate", self.provider.complete(&context)).await {
            Ok(answer) if !answer.trim().is_empty() => Reply::ok("chat", answer.trim()),
            Ok(_) => Reply::ok("chat", GENERATOR_UNAVAILABLE),
            Err(e) => {
                warn!("{} failed: {e}", self.provider.name());
                Reply {
                    reason: Some(e.to_string()),
                    status: AuditStatus::Error,
                    ..Reply::ok("chat", GENERATOR_UNAVAILABLE)
                }
            }
        }
    }

    fn advance(&self, sender: &str, transition: Transition) {
        if let Err(e) = self.conversations.apply(sender, transition) {
            warn!("conversation {sender}: {e}");
        }
    }
}
