use serde::{Deserialize, Serialize};

/// A single entry in the prompt history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextEntry {
    /// "user" or "assistant".
    pub role: String,
    /// The message content.
    pub content: String,
}

/// Prompt context passed to a text generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Context {
    /// System prompt prepended to every request.
    pub system_prompt: String,
    /// Conversation history (oldest first).
    pub history: Vec<ContextEntry>,
    /// The current user message.
    pub current_message: String,
    /// Override the provider's default model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// A structured message for API-based providers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiMessage {
    /// "system", "user" or "assistant".
    pub role: String,
    pub content: String,
}

impl Context {
    /// Create a context with just a current message and the default system prompt.
    pub fn new(message: &str) -> Self {
        Self {
            system_prompt: default_system_prompt(),
            history: Vec::new(),
            current_message: message.to_string(),
            model: None,
        }
    }

    /// Add one past user/assistant exchange to the history.
    pub fn push_exchange(&mut self, user: &str, assistant: &str) {
        self.history.push(ContextEntry {
            role: "user".to_string(),
            content: user.to_string(),
        });
        self.history.push(ContextEntry {
            role: "assistant".to_string(),
            content: assistant.to_string(),
        });
    }

    /// Convert context to structured API messages.
    ///
    /// Returns `(system_prompt, messages)`; callers decide where the system
    /// prompt goes.
    pub fn to_api_messages(&self) -> (String, Vec<ApiMessage>) {
        let mut messages = Vec::with_capacity(self.history.len() + 1);

        for entry in &self.history {
            messages.push(ApiMessage {
                role: entry.role.clone(),
                content: entry.content.clone(),
            });
        }

        messages.push(ApiMessage {
            role: "user".to_string(),
            content: self.current_message.clone(),
        });

        (self.system_prompt.clone(), messages)
    }
}

fn default_system_prompt() -> String {
    "You are Grouper, an agent that lives in group chats and direct messages. \
     You help people spin off focused sidebar groups: \"@grouper create <name>\" \
     makes a new group, and mentioning people (@alice @bob.eth) adds them. \
     Be brief and friendly; one or two sentences."
        .to_string()
}
