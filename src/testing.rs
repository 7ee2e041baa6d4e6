//! In-memory doubles for the platform, directory, cache and text generator.

use async_trait::async_trait;
use chrono::Utc;
use grouper_core::{
    context::Context,
    error::{GrouperError, PlatformError},
    message::{ConversationKind, EventContent, InboundEvent, OutgoingContent},
    traits::{Conversation, GroupHandle, HandleCache, MessagingPlatform, NameService, Provider},
};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

pub(crate) const AGENT_INBOX: &str = "agent-inbox";

pub(crate) fn text_event(conversation: &str, sender: &str, text: &str) -> InboundEvent {
    InboundEvent {
        id: Uuid::new_v4(),
        conversation_id: conversation.to_string(),
        sender_inbox_id: sender.to_string(),
        sender_address: None,
        sender_name: None,
        content: EventContent::Text {
            text: text.to_string(),
        },
        timestamp: Utc::now(),
    }
}

pub(crate) fn action_event(conversation: &str, sender: &str, action_id: &str) -> InboundEvent {
    InboundEvent {
        content: EventContent::Action {
            action_id: action_id.to_string(),
        },
        ..text_event(conversation, sender, "")
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct FakeGroupState {
    pub name: Option<String>,
    pub members: Vec<String>,
    pub admins: Vec<String>,
}

/// Everything the fake platform knows, plus a log of what was asked of it.
#[derive(Default)]
pub(crate) struct FakeState {
    pub groups: HashMap<String, FakeGroupState>,
    pub dms: HashSet<String>,
    /// Conversation id -> everything posted there, in order.
    pub sent: HashMap<String, Vec<OutgoingContent>>,
    /// Remote operations in call order, e.g. `"create_group"`, `"add_members:g1"`.
    pub calls: Vec<String>,
    pub addresses: HashMap<String, String>,
    /// Operation name -> error returned instead of doing the work.
    pub failures: HashMap<String, PlatformError>,
    /// Inbox id -> error returned when adding that member.
    pub member_failures: HashMap<String, PlatformError>,
    /// Groups that exist but are missing from `list_groups`.
    pub hidden: HashSet<String>,
    /// Operation name -> artificial latency.
    pub delays: HashMap<String, Duration>,
    pub queued: Vec<InboundEvent>,
    next_group: u32,
}

impl FakeState {
    fn check(&mut self, op: &str) -> Result<(), PlatformError> {
        self.calls.push(op.to_string());
        match self.failures.get(op.split(':').next().unwrap_or(op)) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    pub fn sent_to(&self, conversation: &str) -> Vec<OutgoingContent> {
        self.sent.get(conversation).cloned().unwrap_or_default()
    }

    pub fn texts_to(&self, conversation: &str) -> Vec<String> {
        self.sent_to(conversation)
            .iter()
            .filter_map(|c| c.as_text().map(str::to_string))
            .collect()
    }

    pub fn count_calls(&self, prefix: &str) -> usize {
        self.calls.iter().filter(|c| c.starts_with(prefix)).count()
    }
}

#[derive(Clone)]
pub(crate) struct FakePlatform {
    state: Arc<Mutex<FakeState>>,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(FakeState::default())),
        }
    }

    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub fn add_dm(&self, id: &str) {
        self.state().dms.insert(id.to_string());
    }

    pub fn add_group(&self, id: &str, members: &[&str]) {
        self.state().groups.insert(
            id.to_string(),
            FakeGroupState {
                name: None,
                members: members.iter().map(|m| m.to_string()).collect(),
                admins: Vec::new(),
            },
        );
    }

    pub fn fail(&self, op: &str, err: PlatformError) {
        self.state().failures.insert(op.to_string(), err);
    }

    pub fn fail_member(&self, inbox: &str, err: PlatformError) {
        self.state()
            .member_failures
            .insert(inbox.to_string(), err);
    }

    pub fn delay(&self, op: &str, by: Duration) {
        self.state().delays.insert(op.to_string(), by);
    }

    pub fn known_address(&self, address: &str, inbox: &str) {
        self.state()
            .addresses
            .insert(address.to_lowercase(), inbox.to_string());
    }

    pub fn queue(&self, event: InboundEvent) {
        self.state().queued.push(event);
    }

    async fn pause(&self, op: &str) {
        let delay = self.state().delays.get(op).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn group(&self, id: &str) -> Arc<dyn GroupHandle> {
        Arc::new(FakeGroup {
            id: id.to_string(),
            name: self.state().groups.get(id).and_then(|g| g.name.clone()),
            state: self.state.clone(),
        })
    }
}

#[async_trait]
impl MessagingPlatform for FakePlatform {
    fn name(&self) -> &str {
        "fake"
    }

    fn self_inbox_id(&self) -> &str {
        AGENT_INBOX
    }

    async fn start(&self) -> Result<mpsc::Receiver<InboundEvent>, GrouperError> {
        let events: Vec<_> = self.state().queued.drain(..).collect();
        let (tx, rx) = mpsc::channel(events.len().max(1));
        for event in events {
            let _ = tx.send(event).await;
        }
        Ok(rx)
    }

    async fn create_group(&self, members: &[String]) -> Result<Arc<dyn GroupHandle>, PlatformError> {
        self.pause("create_group").await;
        let id = {
            let mut state = self.state();
            state.check("create_group")?;
            state.next_group += 1;
            let id = format!("group-{}", state.next_group);
            let mut all = vec![AGENT_INBOX.to_string()];
            all.extend(members.iter().cloned());
            state.groups.insert(
                id.clone(),
                FakeGroupState {
                    name: None,
                    members: all,
                    admins: Vec::new(),
                },
            );
            id
        };
        Ok(self.group(&id))
    }

    async fn list_groups(&self) -> Result<Vec<Arc<dyn GroupHandle>>, PlatformError> {
        self.pause("list_groups").await;
        let ids: Vec<String> = {
            let mut state = self.state();
            state.check("list_groups")?;
            state
                .groups
                .keys()
                .filter(|id| !state.hidden.contains(*id))
                .cloned()
                .collect()
        };
        Ok(ids.iter().map(|id| self.group(id)).collect())
    }

    async fn get_group_by_id(&self, id: &str) -> Result<Option<Arc<dyn GroupHandle>>, PlatformError> {
        let exists = {
            let mut state = self.state();
            state.check(&format!("get_group_by_id:{id}"))?;
            state.groups.contains_key(id) && !state.hidden.contains(id)
        };
        Ok(exists.then(|| self.group(id)))
    }

    async fn get_conversation(&self, id: &str) -> Result<Option<Arc<dyn Conversation>>, PlatformError> {
        self.pause("get_conversation").await;
        let mut state = self.state();
        state.check(&format!("get_conversation:{id}"))?;
        let kind = if state.dms.contains(id) {
            ConversationKind::Dm
        } else if state.groups.contains_key(id) {
            ConversationKind::Group
        } else {
            return Ok(None);
        };
        Ok(Some(Arc::new(FakeConversation {
            id: id.to_string(),
            kind,
            state: self.state.clone(),
        })))
    }

    async fn resolve_address_to_recipient(&self, address: &str) -> Result<Option<String>, PlatformError> {
        let mut state = self.state();
        state.check(&format!("resolve_address:{address}"))?;
        Ok(state.addresses.get(&address.to_lowercase()).cloned())
    }

    async fn stop(&self) -> Result<(), GrouperError> {
        self.state().calls.push("stop".to_string());
        Ok(())
    }
}

fn record_send(
    state: &Arc<Mutex<FakeState>>,
    id: &str,
    content: OutgoingContent,
) -> Result<(), PlatformError> {
    let mut state = state.lock().unwrap();
    state.check(&format!("send:{id}"))?;
    state.sent.entry(id.to_string()).or_default().push(content);
    Ok(())
}

pub(crate) struct FakeConversation {
    id: String,
    kind: ConversationKind,
    state: Arc<Mutex<FakeState>>,
}

#[async_trait]
impl Conversation for FakeConversation {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> ConversationKind {
        self.kind
    }

    async fn send(&self, content: OutgoingContent) -> Result<(), PlatformError> {
        record_send(&self.state, &self.id, content)
    }
}

pub(crate) struct FakeGroup {
    id: String,
    name: Option<String>,
    state: Arc<Mutex<FakeState>>,
}

#[async_trait]
impl Conversation for FakeGroup {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> ConversationKind {
        ConversationKind::Group
    }

    async fn send(&self, content: OutgoingContent) -> Result<(), PlatformError> {
        record_send(&self.state, &self.id, content)
    }
}

#[async_trait]
impl GroupHandle for FakeGroup {
    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    async fn rename(&self, name: &str) -> Result<(), PlatformError> {
        let mut state = self.state.lock().unwrap();
        state.check(&format!("rename:{}", self.id))?;
        if let Some(group) = state.groups.get_mut(&self.id) {
            group.name = Some(name.to_string());
        }
        Ok(())
    }

    async fn add_super_admin(&self, inbox_id: &str) -> Result<(), PlatformError> {
        let mut state = self.state.lock().unwrap();
        state.check(&format!("add_super_admin:{}", self.id))?;
        if let Some(group) = state.groups.get_mut(&self.id) {
            group.admins.push(inbox_id.to_string());
        }
        Ok(())
    }

    async fn add_members(&self, inbox_ids: &[String]) -> Result<(), PlatformError> {
        let mut state = self.state.lock().unwrap();
        state.check(&format!("add_members:{}", self.id))?;
        for inbox in inbox_ids {
            if let Some(err) = state.member_failures.get(inbox) {
                return Err(err.clone());
            }
        }
        let group = state
            .groups
            .get_mut(&self.id)
            .ok_or_else(|| PlatformError::with_code("group not found", "NOT_FOUND"))?;
        for inbox in inbox_ids {
            if group.members.contains(inbox) {
                return Err(PlatformError::with_code(
                    format!("inbox {inbox} is already a member"),
                    "ALREADY_EXISTS",
                ));
            }
        }
        group.members.extend(inbox_ids.iter().cloned());
        Ok(())
    }
}

/// Name service backed by a fixed table.
pub(crate) struct FakeNameService {
    pub name: String,
    pub entries: HashMap<String, String>,
    pub fail: bool,
    pub delay: Option<Duration>,
    pub lookups: Mutex<Vec<String>>,
}

impl FakeNameService {
    pub fn new(name: &str, entries: &[(&str, &str)]) -> Self {
        Self {
            name: name.to_string(),
            entries: entries
                .iter()
                .map(|(h, a)| (h.to_string(), a.to_string()))
                .collect(),
            fail: false,
            delay: None,
            lookups: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(name: &str) -> Self {
        Self {
            fail: true,
            ..Self::new(name, &[])
        }
    }
}

#[async_trait]
impl NameService for FakeNameService {
    fn name(&self) -> &str {
        &self.name
    }

    async fn resolve_handle_to_address(&self, handle: &str) -> Result<Option<String>, GrouperError> {
        self.lookups.lock().unwrap().push(handle.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(GrouperError::Directory(format!("{} is down", self.name)));
        }
        Ok(self.entries.get(handle).cloned())
    }
}

/// Handle cache backed by a map.
#[derive(Default)]
pub(crate) struct FakeCache {
    pub entries: Mutex<HashMap<String, String>>,
    pub fail: bool,
}

impl FakeCache {
    pub fn with(entries: &[(&str, &str)]) -> Self {
        Self {
            entries: Mutex::new(
                entries
                    .iter()
                    .map(|(h, i)| (h.to_string(), i.to_string()))
                    .collect(),
            ),
            fail: false,
        }
    }

    pub fn get(&self, handle: &str) -> Option<String> {
        self.entries.lock().unwrap().get(handle).cloned()
    }
}

#[async_trait]
impl HandleCache for FakeCache {
    async fn lookup(&self, handle: &str) -> Result<Option<String>, GrouperError> {
        if self.fail {
            return Err(GrouperError::Memory("cache offline".to_string()));
        }
        Ok(self.get(&handle.to_lowercase()))
    }

    async fn remember(&self, handle: &str, inbox_id: &str, _address: Option<&str>) -> Result<(), GrouperError> {
        if self.fail {
            return Err(GrouperError::Memory("cache offline".to_string()));
        }
        self.entries
            .lock()
            .unwrap()
            .insert(handle.to_lowercase(), inbox_id.to_string());
        Ok(())
    }
}

/// Text generator with canned answers.
pub(crate) struct FakeProvider {
    pub reply: String,
    /// Answer to yes/no questions.
    pub oracle: String,
    pub fail: bool,
    pub prompts: Mutex<Vec<Context>>,
}

impl FakeProvider {
    pub fn new(reply: &str, oracle: &str) -> Self {
        Self {
            reply: reply.to_string(),
            oracle: oracle.to_string(),
            fail: false,
            prompts: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Provider for FakeProvider {
    fn name(&self) -> &str {
        "fake"
    }

    async fn complete(&self, context: &Context) -> Result<String, GrouperError> {
        self.prompts.lock().unwrap().push(context.clone());
        if self.fail {
            return Err(GrouperError::Provider("generator offline".to_string()));
        }
        if context.system_prompt.contains("YES or NO") {
            return Ok(self.oracle.clone());
        }
        Ok(self.reply.clone())
    }

    async fn is_available(&self) -> bool {
        !self.fail
    }
}
