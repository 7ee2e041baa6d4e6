//! Ephemeral per-sender conversation state.
//!
//! Holds each sender's step in the create-group flow plus a short ring buffer
//! of recent exchanges. Nothing here is persisted; a periodic sweep evicts
//! senders idle for longer than the configured timeout.

mod machine;


pub use machine::{next_step, Step, Transition};

use chrono::{DateTime, Utc};
use grouper_core::config::ConversationConfig;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info};

/// A sender's position in the flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationState {
    pub step: Step,
    pub pending_group_name: Option<String>,
    pub pending_group_id: Option<String>,
    pub last_updated: DateTime<Utc>,
}

impl ConversationState {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            step: Step::Idle,
            pending_group_name: None,
            pending_group_id: None,
            last_updated: now,
        }
    }
}

/// One recent exchange with a sender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub user_message: String,
    pub bot_response: String,
    pub timestamp: DateTime<Utc>,
}

/// A transition that has no edge from the sender's current step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("no transition {transition:?} from {from}")]
pub struct InvalidTransition {
    pub from: Step,
    pub transition: Transition,
}

/// What one sweep removed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepStats {
    pub states: usize,
    pub histories: usize,
}

/// Per-sender state machine plus recent-exchange history.
pub struct ConversationStore {
    states: Mutex<HashMap<String, ConversationState>>,
    history: Mutex<HashMap<String, VecDeque<HistoryEntry>>>,
    idle_timeout: chrono::Duration,
    history_len: usize,
}

/// Lock a map, recovering the data if a previous holder panicked.
fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ConversationStore {
    pub fn new(idle_timeout: Duration, history_len: usize) -> Self {
        Self {
            states: Mutex::new(HashMap::new()),
            history: Mutex::new(HashMap::new()),
            idle_timeout: chrono::Duration::from_std(idle_timeout)
                .unwrap_or_else(|_| chrono::Duration::hours(1)),
            history_len: history_len.max(1),
        }
    }

    pub fn from_config(config: &ConversationConfig) -> Self {
        Self::new(config.idle_timeout(), config.history_len)
    }

    /// Current state without creating or touching anything.
    /// Unknown senders are `IDLE`.
    pub fn snapshot(&self, sender: &str) -> ConversationState {
        lock(&self.states)
            .get(sender)
            .cloned()
            .unwrap_or_else(|| ConversationState::new(Utc::now()))
    }

    /// Record activity from a sender, creating their state on first sight.
    pub fn observe(&self, sender: &str) -> ConversationState {
        let now = Utc::now();
        let mut states = lock(&self.states);
        let state = states
            .entry(sender.to_string())
            .or_insert_with(|| ConversationState::new(now));
        state.last_updated = now;
        state.clone()
    }

    /// Move a sender along an edge of the flow.
    ///
    /// Leaves the state untouched and returns an error when the edge does not
    /// exist from the sender's current step.
    pub fn apply(&self, sender: &str, transition: Transition) -> Result<Step, InvalidTransition> {
        let now = Utc::now();
        let mut states = lock(&self.states);
        let state = states
            .entry(sender.to_string())
            .or_insert_with(|| ConversationState::new(now));

        let from = state.step;
        let to = next_step(from, transition).ok_or(InvalidTransition { from, transition })?;
        state.step = to;
        state.last_updated = now;
        if to == Step::Idle {
            state.pending_group_name = None;
            state.pending_group_id = None;
        }
        debug!("conversation {sender}: {from} --{transition:?}--> {to}");
        Ok(to)
    }

    /// Remember which group the sender is currently filling.
    pub fn set_pending_group(&self, sender: &str, group_id: &str, group_name: &str) {
        let now = Utc::now();
        let mut states = lock(&self.states);
        let state = states
            .entry(sender.to_string())
            .or_insert_with(|| ConversationState::new(now));
        state.pending_group_id = Some(group_id.to_string());
        state.pending_group_name = Some(group_name.to_string());
        state.last_updated = now;
    }

    /// Back to `IDLE`, clearing pending data. History is kept.
    pub fn reset(&self, sender: &str) {
        let now = Utc::now();
        lock(&self.states).insert(sender.to_string(), ConversationState::new(now));
    }

    /// Append an exchange to the sender's ring buffer.
    pub fn record_exchange(&self, sender: &str, user_message: &str, bot_response: &str) {
        let mut history = lock(&self.history);
        let entries = history.entry(sender.to_string()).or_default();
        entries.push_back(HistoryEntry {
            user_message: user_message.to_string(),
            bot_response: bot_response.to_string(),
            timestamp: Utc::now(),
        });
        while entries.len() > self.history_len {
            entries.pop_front();
        }
    }

    /// Recent exchanges, oldest first.
    pub fn history(&self, sender: &str) -> Vec<HistoryEntry> {
        lock(&self.history)
            .get(sender)
            .map(|entries| entries.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Evict everything idle for longer than the timeout.
    pub fn sweep(&self) -> SweepStats {
        self.sweep_at(Utc::now())
    }

    pub(crate) fn sweep_at(&self, now: DateTime<Utc>) -> SweepStats {
        let cutoff = now - self.idle_timeout;

        let mut states = lock(&self.states);
        let before = states.len();
        states.retain(|_, s| s.last_updated >= cutoff);
        let removed_states = before - states.len();
        drop(states);

        let mut history = lock(&self.history);
        let before = history.len();
        history.retain(|_, entries| entries.back().is_some_and(|e| e.timestamp >= cutoff));
        let removed_histories = before - history.len();
        drop(history);

        let stats = SweepStats {
            states: removed_states,
            histories: removed_histories,
        };
        if stats != SweepStats::default() {
            info!(
                "conversation sweep evicted {} states and {} histories",
                stats.states, stats.histories
            );
        }
        stats
    }

    /// Number of senders with live state.
    pub fn len(&self) -> usize {
        lock(&self.states).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
