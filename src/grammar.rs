//! Command grammar: text to intent parsing.
//!
//! Recognizes group-creation commands (with or without an agent mention in
//! front), extracts `@mention` tokens, and classifies the short replies the
//! conversation flow asks for (greetings, yes, no).

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

static MENTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@([A-Za-z0-9.-]+)").expect("mention pattern is valid"));

/// Verb that introduced a create command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Create,
    Make,
    New,
    Sidebar,
}

impl Verb {
    fn from_word(word: &str) -> Option<Self> {
        match word.to_ascii_lowercase().as_str() {
            "create" => Some(Self::Create),
            "make" => Some(Self::Make),
            "new" => Some(Self::New),
            "sidebar" => Some(Self::Sidebar),
            _ => None,
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Create => "create",
            Self::Make => "make",
            Self::New => "new",
            Self::Sidebar => "sidebar",
        })
    }
}

/// A parsed group-creation command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub verb: Verb,
    pub private: bool,
    /// Group name, trimmed. May be empty; callers reject that.
    pub name: String,
}

/// Create-command grammar bound to the agent's handle.
pub struct CommandGrammar {
    handle: String,
    /// Tried in order; first match wins.
    patterns: Vec<(Regex, bool)>,
    agent_mention: Regex,
}

impl CommandGrammar {
    /// Build the grammar for an agent mentioned as `@<handle>`.
    pub fn new(handle: &str) -> Result<Self, regex::Error> {
        let handle = handle.trim().trim_start_matches('@').to_string();
        let mention = format!(r"@{}(?:\.[A-Za-z0-9.-]+)?", regex::escape(&handle));
        let verbs = r"(create|make|new|sidebar)";

        let build = |prefix: &str, private: bool| -> Result<(Regex, bool), regex::Error> {
            let qualifier = if private { r"\s+private\b" } else { "" };
            let pattern = format!(r"(?is)^\s*{prefix}{verbs}\b{qualifier}\s*(.*)$");
            Ok((Regex::new(&pattern)?, private))
        };

        let mention_prefix = format!(r"{mention}[\s,:]+");
        let patterns = vec![
            build(&mention_prefix, true)?,
            build(&mention_prefix, false)?,
            build("", true)?,
            build("", false)?,
        ];

        let agent_mention = Regex::new(&format!(r"(?i){mention}\b[,:]?"))?;

        Ok(Self {
            handle,
            patterns,
            agent_mention,
        })
    }

    pub fn handle(&self) -> &str {
        &self.handle
    }

    /// Parse a create command.
    ///
    /// Precedence: mention-prefixed private, mention-prefixed plain, bare
    /// private, bare plain.
    pub fn parse_command(&self, text: &str) -> Option<ParsedCommand> {
        self.patterns.iter().find_map(|(re, private)| {
            let caps = re.captures(text)?;
            let verb = Verb::from_word(caps.get(1)?.as_str())?;
            let name = caps.get(2).map(|m| m.as_str().trim()).unwrap_or_default();
            Some(ParsedCommand {
                verb,
                private: *private,
                name: name.to_string(),
            })
        })
    }

    /// Whether the text mentions the agent.
    pub fn mentions_agent(&self, text: &str) -> bool {
        self.agent_mention.is_match(text)
    }

    /// Remove every mention of the agent and collapse the leftover whitespace.
    pub fn strip_agent_mention(&self, text: &str) -> String {
        let stripped = self.agent_mention.replace_all(text, " ");
        stripped.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

/// Every `@token` in the text, without the `@`, in order, duplicates kept.
pub fn parse_mentions(text: &str) -> Vec<String> {
    MENTION_RE
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .collect()
}

const GREETINGS: &[&str] = &[
    "hi", "hello", "hey", "heya", "hiya", "yo", "gm", "sup", "howdy", "hola",
    "good morning", "good afternoon", "good evening",
];

const AFFIRMATIVE: &[&str] = &[
    "yes", "y", "yeah", "yep", "yup", "sure", "ok", "okay", "please", "yes please",
    "let's do it", "lets do it", "do it", "absolutely",
];

const DECLINE: &[&str] = &[
    "no", "n", "nope", "nah", "no thanks", "not now", "cancel", "skip", "done", "stop",
    "never mind", "nevermind",
];

/// Lowercase and drop trailing punctuation / emoji noise.
fn normalize_reply(text: &str) -> String {
    text.trim()
        .trim_end_matches(|c: char| !c.is_alphanumeric())
        .trim()
        .to_lowercase()
}

fn matches_vocab(text: &str, vocab: &[&str]) -> bool {
    let normalized = normalize_reply(text);
    !normalized.is_empty() && vocab.contains(&normalized.as_str())
}

pub fn is_greeting(text: &str) -> bool {
    let normalized = normalize_reply(text);
    if matches_vocab(&normalized, GREETINGS) {
        return true;
    }
    // "hey there", "hello grouper", "gm frens"
    normalized
        .split_whitespace()
        .next()
        .is_some_and(|first| GREETINGS.contains(&first) && normalized.split_whitespace().count() <= 3)
}

pub fn is_affirmative(text: &str) -> bool {
    matches_vocab(text, AFFIRMATIVE)
}

pub fn is_decline(text: &str) -> bool {
    matches_vocab(text, DECLINE)
}
