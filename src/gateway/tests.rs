use super::*;
use crate::actions::join_sidebar_id;
use crate::state::Step;
use crate::testing::{action_event, text_event, FakePlatform, FakeProvider, AGENT_INBOX};
use grouper_core::{
    error::PlatformError,
    message::{InboundEvent, OutgoingContent},
};
use grouper_memory::audit::AuditStatus;

struct Harness {
    platform: FakePlatform,
    provider: Arc<FakeProvider>,
    store: Store,
    gateway: Arc<Gateway>,
}

impl Harness {
    async fn new() -> Self {
        Self::with_provider(FakeProvider::new("happy to help", "NO")).await
    }

    async fn with_provider(provider: FakeProvider) -> Self {
        let platform = FakePlatform::new();
        let store = Store::in_memory().await.unwrap();
        let timeout = Duration::from_secs(1);

        let dyn_platform: Arc<dyn MessagingPlatform> = Arc::new(platform.clone());
        let resolver = Arc::new(HandleResolver::new(
            dyn_platform.clone(),
            Arc::new(store.clone()),
            vec![],
            vec![],
            timeout,
        ));
        let orchestrator = Arc::new(Orchestrator::new(
            dyn_platform.clone(),
            resolver.clone(),
            timeout,
        ));
        let provider = Arc::new(provider);
        let gateway = Gateway::new(
            dyn_platform,
            provider.clone(),
            orchestrator,
            resolver,
            CommandGrammar::new("grouper").unwrap(),
            &store,
            ConversationConfig::default(),
            timeout,
            "Grouper".to_string(),
        );

        Self {
            platform,
            provider,
            store,
            gateway: Arc::new(gateway),
        }
    }

    async fn send(&self, event: InboundEvent) {
        self.gateway.handle_event(event).await;
    }

    async fn say(&self, conversation: &str, sender: &str, text: &str) {
        self.send(text_event(conversation, sender, text)).await;
    }

    fn last_text(&self, conversation: &str) -> String {
        self.platform
            .state()
            .texts_to(conversation)
            .last()
            .cloned()
            .unwrap_or_default()
    }

    fn step(&self, sender: &str) -> Step {
        self.gateway.conversations().snapshot(sender).step
    }

    async fn audited(&self, status: AuditStatus) -> i64 {
        self.gateway.audit.count(status).await.unwrap()
    }
}


#[tokio::test]
async fn test_group_create_then_join_end_to_end() {
    let h = Harness::new().await;
    h.platform.add_group("team", &["u1", "u2", AGENT_INBOX]);

    h.say("team", "u1", "@grouper create Project X").await;

    let group = h
        .gateway
        .orchestrator
        .groups()
        .latest_created_by("u1")
        .unwrap();
    assert_eq!(group.name, "Project X");

    let sent = h.platform.state().sent_to("team");
    assert_eq!(sent.len(), 1, "only the invitation goes to the origin");
    let OutgoingContent::Actions(invitation) = &sent[0] else {
        panic!("expected invitation, got {sent:?}");
    };
    assert_eq!(invitation.actions.len(), 2);
    assert_eq!(invitation.actions[0].id, format!("join_sidebar_{}", group.id));
    assert_eq!(invitation.actions[1].id, format!("decline_sidebar_{}", group.id));
    assert_eq!(h.step("u1"), Step::AskedAddUsers);

    h.send(action_event("team", "u2", &join_sidebar_id(&group.id)))
        .await;

    let record = h.gateway.orchestrator.groups().get(&group.id).unwrap();
    assert!(record.has_member("u2"));
    assert!(h.last_text("team").contains("Project X"));
    assert_eq!(h.audited(AuditStatus::Ok).await, 2);
}

#[tokio::test]
async fn test_group_guided_flow_reaches_add_users() {
    let h = Harness::new().await;
    h.platform.add_group("team", &["u1", "u2", AGENT_INBOX]);
    h.store
        .cache_handle("alice", "inbox-alice", None)
        .await
        .unwrap();

    h.say("team", "u1", "@grouper hi").await;
    assert_eq!(h.step("u1"), Step::AskedCreateGroup);
    h.say("team", "u1", "@grouper yes").await;
    assert_eq!(h.step("u1"), Step::WaitingForGroupName);
    h.say("team", "u1", "@grouper Project X").await;
    assert_eq!(h.step("u1"), Step::AskedAddUsers);

    let group = h
        .gateway
        .orchestrator
        .groups()
        .latest_created_by("u1")
        .unwrap();
    assert_eq!(group.name, "Project X");
    assert_eq!(
        h.gateway.conversations().snapshot("u1").pending_group_id,
        Some(group.id.clone())
    );
    assert!(matches!(
        h.platform.state().sent_to("team").last(),
        Some(OutgoingContent::Actions(_))
    ));

    h.say("team", "u1", "@grouper @alice").await;
    assert_eq!(h.step("u1"), Step::Idle);
    assert!(h.last_text("team").contains("Added to \"Project X\": @alice"));
    assert!(h.platform.state().groups[&group.id]
        .members
        .contains(&"inbox-alice".to_string()));
}

#[tokio::test]
async fn test_own_events_are_ignored() {
    let h = Harness::new().await;
    h.platform.add_dm("dm-1");
    h.say("dm-1", AGENT_INBOX, "hi").await;
    assert!(h.platform.state().calls.is_empty());
    assert_eq!(h.audited(AuditStatus::Ok).await, 0);
}

#[tokio::test]
async fn test_group_message_without_mention_is_skipped() {
    let h = Harness::new().await;
    h.platform.add_group("team", &["u1"]);
    h.say("team", "u1", "create Project X").await;

    assert!(h.gateway.orchestrator.groups().is_empty());
    assert!(h.platform.state().sent_to("team").is_empty());
    assert_eq!(h.audited(AuditStatus::Ok).await, 0);
}

#[tokio::test]
async fn test_unknown_conversation_is_skipped() {
    let h = Harness::new().await;
    h.say("nowhere", "u1", "hi").await;
    assert!(h.platform.state().sent.is_empty());
    assert_eq!(h.step("u1"), Step::Idle);
}

#[tokio::test]
async fn test_other_content_is_ignored() {
    let h = Harness::new().await;
    h.platform.add_dm("dm-1");
    let mut event = text_event("dm-1", "u1", "");
    event.content = grouper_core::message::EventContent::Other {
        content_type: "reaction".to_string(),
    };
    h.send(event).await;
    assert!(h.platform.state().sent.is_empty());
}

#[tokio::test]
async fn test_dm_guided_flow() {
    let h = Harness::new().await;
    h.platform.add_dm("dm-1");
    h.store
        .cache_handle("alice", "inbox-alice", None)
        .await
        .unwrap();

    h.say("dm-1", "u1", "hello").await;
    assert_eq!(h.step("u1"), Step::AskedCreateGroup);
    assert!(h.last_text("dm-1").contains("Want me to create one?"));

    h.say("dm-1", "u1", "yes!").await;
    assert_eq!(h.step("u1"), Step::WaitingForGroupName);

    h.say("dm-1", "u1", "Launch Plan").await;
    assert_eq!(h.step("u1"), Step::AskedAddUsers);
    assert!(h.last_text("dm-1").contains("Created \"Launch Plan\""));
    let group = h
        .gateway
        .orchestrator
        .groups()
        .latest_created_by("u1")
        .unwrap();
    assert_eq!(
        h.gateway.conversations().snapshot("u1").pending_group_id,
        Some(group.id.clone())
    );

    h.say("dm-1", "u1", "add @alice and @ghost please").await;
    assert_eq!(h.step("u1"), Step::Idle);
    let reply = h.last_text("dm-1");
    assert!(reply.contains("Added to \"Launch Plan\": @alice"));
    assert!(reply.contains("Couldn't find: @ghost"));
    assert!(h.platform.state().groups[&group.id]
        .members
        .contains(&"inbox-alice".to_string()));
}

#[tokio::test]
async fn test_dm_flow_decline_paths() {
    let h = Harness::new().await;
    h.platform.add_dm("dm-1");

    h.say("dm-1", "u1", "hey").await;
    h.say("dm-1", "u1", "no thanks").await;
    assert_eq!(h.step("u1"), Step::Idle);

    h.say("dm-1", "u1", "hey").await;
    h.say("dm-1", "u1", "sure").await;
    h.say("dm-1", "u1", "nope").await;
    assert_eq!(h.step("u1"), Step::Idle);
    assert!(h.gateway.orchestrator.groups().is_empty());
}

#[tokio::test]
async fn test_waiting_for_usernames_reminds_then_finishes() {
    let h = Harness::new().await;
    h.platform.add_dm("dm-1");

    h.say("dm-1", "u1", "create Ops").await;
    assert_eq!(h.step("u1"), Step::AskedAddUsers);

    h.say("dm-1", "u1", "hmm let me think").await;
    assert_eq!(h.step("u1"), Step::WaitingForUsernames);
    assert!(h.last_text("dm-1").contains("Mention the people"));

    h.say("dm-1", "u1", "done").await;
    assert_eq!(h.step("u1"), Step::Idle);
}

#[tokio::test]
async fn test_command_overrides_current_step() {
    let h = Harness::new().await;
    h.platform.add_dm("dm-1");

    h.say("dm-1", "u1", "hi").await;
    h.say("dm-1", "u1", "make Design Crit").await;

    assert_eq!(h.step("u1"), Step::AskedAddUsers);
    let group = h
        .gateway
        .orchestrator
        .groups()
        .latest_created_by("u1")
        .unwrap();
    assert_eq!(group.name, "Design Crit");
}

#[tokio::test]
async fn test_command_without_name_waits_for_one() {
    let h = Harness::new().await;
    h.platform.add_dm("dm-1");

    h.say("dm-1", "u1", "create").await;
    assert_eq!(h.step("u1"), Step::WaitingForGroupName);
    assert!(h.last_text("dm-1").contains("needs a name"));
    assert!(h.platform.state().calls.iter().all(|c| c != "create_group"));

    h.say("dm-1", "u1", "Retro").await;
    assert_eq!(h.step("u1"), Step::AskedAddUsers);
}

#[tokio::test]
async fn test_failed_create_resets_and_reports() {
    let h = Harness::new().await;
    h.platform.add_dm("dm-1");
    h.platform
        .fail("create_group", PlatformError::new("group sync failed"));

    h.say("dm-1", "u1", "create Ops").await;
    assert_eq!(h.step("u1"), Step::Idle);
    assert!(h.last_text("dm-1").contains("try again"));
    assert_eq!(h.audited(AuditStatus::Error).await, 1);
}

#[tokio::test]
async fn test_private_group_command_asks_for_mentions() {
    let h = Harness::new().await;
    h.platform.add_group("team", &["u1"]);

    h.say("team", "u1", "@grouper create private Board").await;
    assert!(h.last_text("team").contains("Who should I add?"));
    assert_eq!(h.step("u1"), Step::AskedAddUsers);
    assert!(h
        .platform
        .state()
        .sent_to("team")
        .iter()
        .all(|c| matches!(c, OutgoingContent::Text { .. })));
}

#[tokio::test]
async fn test_free_text_goes_to_generator_with_history() {
    let h = Harness::new().await;
    h.platform.add_dm("dm-1");

    h.say("dm-1", "u1", "what can you do?").await;
    assert_eq!(h.last_text("dm-1"), "happy to help");

    h.say("dm-1", "u1", "and what else?").await;
    let prompts = h.provider.prompts.lock().unwrap();
    let last = prompts.last().unwrap();
    assert_eq!(last.current_message, "and what else?");
    assert_eq!(last.history.len(), 2);
    assert_eq!(last.history[0].content, "what can you do?");
}

#[tokio::test]
async fn test_generator_failure_is_reported_softly() {
    let mut provider = FakeProvider::new("unused", "NO");
    provider.fail = true;
    let h = Harness::with_provider(provider).await;
    h.platform.add_dm("dm-1");

    h.say("dm-1", "u1", "tell me a joke").await;
    assert!(h.last_text("dm-1").contains("create <name>"));
    assert_eq!(h.audited(AuditStatus::Error).await, 1);
}

#[tokio::test]
async fn test_idle_mentions_use_oracle_for_recent_group() {
    let h = Harness::with_provider(FakeProvider::new("chat reply", "YES")).await;
    h.platform.add_dm("dm-1");
    h.store
        .cache_handle("alice", "inbox-alice", None)
        .await
        .unwrap();

    h.say("dm-1", "u1", "create Ops").await;
    h.say("dm-1", "u1", "done").await;
    assert_eq!(h.step("u1"), Step::Idle);

    h.say("dm-1", "u1", "oh wait, can you bring in @alice too").await;
    assert!(h.last_text("dm-1").contains("Added to \"Ops\": @alice"));
}

#[tokio::test]
async fn test_idle_mentions_without_add_intent_chat() {
    let h = Harness::with_provider(FakeProvider::new("chat reply", "NO")).await;
    h.platform.add_dm("dm-1");

    h.say("dm-1", "u1", "create Ops").await;
    h.say("dm-1", "u1", "done").await;
    h.say("dm-1", "u1", "did @alice say anything?").await;
    assert_eq!(h.last_text("dm-1"), "chat reply");
}

#[tokio::test]
async fn test_unknown_action_gets_acknowledged() {
    let h = Harness::new().await;
    h.platform.add_group("team", &["u1"]);
    h.send(action_event("team", "u1", "vote_poll_9")).await;
    assert_eq!(h.last_text("team"), "👍 Got it!");
}

#[tokio::test]
async fn test_join_stale_group_tells_user_to_recreate() {
    let h = Harness::new().await;
    h.platform.add_group("team", &["u1"]);
    h.send(action_event("team", "u2", "join_sidebar_gone")).await;
    assert!(h.last_text("team").contains("start a new one"));
}

#[tokio::test]
async fn test_identity_capture_feeds_resolution() {
    let h = Harness::new().await;
    h.platform.add_dm("dm-1");
    let mut event = text_event("dm-1", "inbox-carol", "hi");
    event.sender_name = Some("carol.eth".to_string());
    h.send(event).await;

    assert_eq!(
        h.store.cached_inbox("carol.eth").await.unwrap().as_deref(),
        Some("inbox-carol")
    );
}

#[tokio::test]
async fn test_reply_delivery_failure_is_audited() {
    let h = Harness::new().await;
    h.platform.add_dm("dm-1");
    h.platform.fail("send", PlatformError::new("boom"));
    h.say("dm-1", "u1", "hi").await;
    assert_eq!(h.audited(AuditStatus::Error).await, 1);
    // The flow still advanced.
    assert_eq!(h.step("u1"), Step::AskedCreateGroup);
}

#[tokio::test]
async fn test_run_processes_queue_in_order_and_stops() {
    let h = Harness::new().await;
    h.platform.add_dm("dm-1");
    h.platform.queue(text_event("dm-1", "u1", "hi"));
    h.platform.queue(text_event("dm-1", "u1", "yes"));
    h.platform.queue(text_event("dm-1", "u1", "Roadmap"));

    h.gateway.clone().run().await.unwrap();

    assert_eq!(h.step("u1"), Step::AskedAddUsers);
    assert_eq!(
        h.gateway
            .orchestrator
            .groups()
            .latest_created_by("u1")
            .unwrap()
            .name,
        "Roadmap"
    );
    assert!(h.platform.state().calls.contains(&"stop".to_string()));
}
