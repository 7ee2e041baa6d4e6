//! Conversation steps and the edges between them.

use std::fmt;

/// Where a sender is in the create-group conversation.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    #[default]
    Idle,
    AskedCreateGroup,
    WaitingForGroupName,
    AskedAddUsers,
    WaitingForUsernames,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "IDLE",
            Self::AskedCreateGroup => "ASKED_CREATE_GROUP",
            Self::WaitingForGroupName => "WAITING_FOR_GROUP_NAME",
            Self::AskedAddUsers => "ASKED_ADD_USERS",
            Self::WaitingForUsernames => "WAITING_FOR_USERNAMES",
        })
    }
}

/// Something that moves a sender between steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Greeting,
    Affirmative,
    Decline,
    /// A non-empty name was supplied and the group exists.
    GroupCreated,
    /// Nothing to add yet; keep waiting for mentions.
    AwaitMentions,
    /// Mentions were handled (all added, some failed, or none resolvable).
    MentionsProcessed,
    /// Inactivity expiry.
    Timeout,
}

/// The step reached by applying `transition` in `from`, or `None` when no
/// such edge exists.
pub fn next_step(from: Step, transition: Transition) -> Option<Step> {
    use Step::*;
    use Transition::*;

    match (from, transition) {
        (_, Timeout) => Some(Idle),
        (Idle, Greeting) => Some(AskedCreateGroup),
        (AskedCreateGroup, Affirmative) => Some(WaitingForGroupName),
        (AskedCreateGroup, Decline) => Some(Idle),
        (WaitingForGroupName, GroupCreated) => Some(AskedAddUsers),
        (AskedAddUsers, AwaitMentions) => Some(WaitingForUsernames),
        (AskedAddUsers | WaitingForUsernames, MentionsProcessed | Decline) => Some(Idle),
        _ => None,
    }
}
