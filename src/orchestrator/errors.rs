//! Failure taxonomy for group operations and the user-facing text for each.

use grouper_core::error::{PlatformError, DEADLINE_EXCEEDED};
use thiserror::Error;

/// Why a sidebar operation did not (fully) happen.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SidebarError {
    /// Malformed or missing argument. The string is the corrective message.
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("group {0} not found")]
    NotFound(String),

    #[error("platform temporarily unavailable: {0}")]
    TransientPlatform(PlatformError),

    /// The platform says the change is already in place.
    #[error("already satisfied: {0}")]
    AlreadySatisfied(PlatformError),

    #[error("{requester} is not the creator of group {group_id}")]
    Authorization { group_id: String, requester: String },

    #[error("platform error: {0}")]
    Unknown(PlatformError),
}

const ALREADY_CODES: &[&str] = &["ALREADY_EXISTS", "ALREADY_MEMBER", "HTTP_409"];
const ALREADY_PATTERNS: &[&str] = &[
    "already a member",
    "already in group",
    "already in the group",
    "already exists",
    "already added",
    "duplicate",
];

const TRANSIENT_CODES: &[&str] = &[
    DEADLINE_EXCEEDED,
    "UNAVAILABLE",
    "NETWORK",
    "SYNC_FAILED",
    "RESOURCE_EXHAUSTED",
    "HTTP_502",
    "HTTP_503",
    "HTTP_504",
];
const TRANSIENT_PATTERNS: &[&str] = &[
    "sync",
    "verif",
    "timed out",
    "timeout",
    "temporarily",
    "unavailable",
    "try again",
    "network",
    "connection reset",
    "epoch",
];

fn matches(err: &PlatformError, codes: &[&str], patterns: &[&str]) -> bool {
    let code_hit = err
        .code
        .as_deref()
        .is_some_and(|code| codes.iter().any(|c| c.eq_ignore_ascii_case(code)));
    if code_hit {
        return true;
    }
    let message = err.message.to_lowercase();
    patterns.iter().any(|p| message.contains(p))
}

impl SidebarError {
    /// Classify a raw platform failure.
    pub fn from_platform(err: PlatformError) -> Self {
        if matches(&err, ALREADY_CODES, ALREADY_PATTERNS) {
            Self::AlreadySatisfied(err)
        } else if matches(&err, TRANSIENT_CODES, TRANSIENT_PATTERNS) {
            Self::TransientPlatform(err)
        } else {
            Self::Unknown(err)
        }
    }

    /// Whether this should be reported to the user as success.
    pub fn is_already_satisfied(&self) -> bool {
        matches!(self, Self::AlreadySatisfied(_))
    }

    /// Text shown to the user in the conversation.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(msg) => msg.clone(),
            Self::NotFound(_) => "❌ I can't find that group anymore. \
                                  Ask its creator to start a new one with `create <name>`."
                .to_string(),
            Self::TransientPlatform(_) => {
                "⏳ The network is still syncing. Please try again in a few moments.".to_string()
            }
            Self::AlreadySatisfied(_) => "✅ You're already in this group.".to_string(),
            Self::Authorization { .. } => {
                "🔒 Only the person who created this group can add members.".to_string()
            }
            Self::Unknown(err) => format!("❌ Something went wrong: {}", err.message),
        }
    }
}

impl From<PlatformError> for SidebarError {
    fn from(err: PlatformError) -> Self {
        Self::from_platform(err)
    }
}
