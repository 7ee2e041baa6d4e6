//! Button-click routing.
//!
//! Action ids are namespaced as `<verb>_<entity>_<id>`; the dispatcher routes
//! on the `<verb>_<entity>_` prefix. Ids nobody claims get a generic
//! acknowledgement.

use crate::orchestrator::{Orchestrator, SidebarError};
use tracing::info;

pub const JOIN_SIDEBAR_PREFIX: &str = "join_sidebar_";
pub const DECLINE_SIDEBAR_PREFIX: &str = "decline_sidebar_";

const GENERIC_ACK: &str = "👍 Got it!";

/// Build a `<verb>_<entity>_<id>` action id.
pub fn action_id(verb: &str, entity: &str, id: &str) -> String {
    format!("{verb}_{entity}_{id}")
}

pub fn join_sidebar_id(group_id: &str) -> String {
    action_id("join", "sidebar", group_id)
}

pub fn decline_sidebar_id(group_id: &str) -> String {
    action_id("decline", "sidebar", group_id)
}

/// A recognized button click.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuickAction {
    JoinSidebar { group_id: String },
    DeclineSidebar { group_id: String },
    Unknown(String),
}

fn join_route(group_id: &str) -> QuickAction {
    QuickAction::JoinSidebar {
        group_id: group_id.to_string(),
    }
}

fn decline_route(group_id: &str) -> QuickAction {
    QuickAction::DeclineSidebar {
        group_id: group_id.to_string(),
    }
}

const ROUTES: &[(&str, fn(&str) -> QuickAction)] = &[
    (JOIN_SIDEBAR_PREFIX, join_route),
    (DECLINE_SIDEBAR_PREFIX, decline_route),
];

impl QuickAction {
    pub fn parse(action_id: &str) -> Self {
        ROUTES
            .iter()
            .find_map(|(prefix, route)| {
                action_id
                    .strip_prefix(*prefix)
                    .filter(|entity| !entity.is_empty())
                    .map(route)
            })
            .unwrap_or_else(|| Self::Unknown(action_id.to_string()))
    }

    /// Audit label.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::JoinSidebar { .. } => "join",
            Self::DeclineSidebar { .. } => "decline",
            Self::Unknown(_) => "action",
        }
    }
}

/// Run the operation behind a button click for `user_id`.
///
/// Returns the reply for the clicker. Unknown ids are acknowledged, not
/// rejected.
pub async fn dispatch(
    orchestrator: &Orchestrator,
    action: &QuickAction,
    user_id: &str,
) -> Result<String, SidebarError> {
    match action {
        QuickAction::JoinSidebar { group_id } => orchestrator.join(group_id, user_id).await,
        QuickAction::DeclineSidebar { group_id } => Ok(orchestrator.decline(group_id, user_id)),
        QuickAction::Unknown(id) => {
            info!("unhandled action {id} from {user_id}");
            Ok(GENERIC_ACK.to_string())
        }
    }
}
