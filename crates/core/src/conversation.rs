//! Conversation turn types and the bounded LLM message window

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Role in a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    System,
    User,
    Assistant,
}

/// A single turn in a conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub role: TurnRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    pub fn new(role: TurnRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(TurnRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(TurnRole::Assistant, content)
    }
}

/// Sliding window over conversation turns handed to the language model.
///
/// The window keeps the most recent `max_turns` user/assistant turns; system
/// turns are never stored here, the profile system prompt is supplied
/// separately.
#[derive(Debug, Clone)]
pub struct MessageWindow {
    turns: Vec<Turn>,
    max_turns: usize,
}

impl MessageWindow {
    pub fn new(max_turns: usize) -> Self {
        Self {
            turns: Vec::new(),
            max_turns: max_turns.max(1),
        }
    }

    /// Append a turn, evicting the oldest when the window is full
    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
        if self.turns.len() > self.max_turns {
            let excess = self.turns.len() - self.max_turns;
            self.turns.drain(..excess);
        }
    }

    /// All turns currently in the window, oldest first
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Most recent user turn, if any
    pub fn last_user(&self) -> Option<&Turn> {
        self.turns.iter().rev().find(|t| t.role == TurnRole::User)
    }

    /// Full transcript as plain text, one line per turn
    pub fn as_transcript(&self) -> String {
        self.turns
            .iter()
            .map(|t| {
                let role = match t.role {
                    TurnRole::System => "system",
                    TurnRole::User => "user",
                    TurnRole::Assistant => "assistant",
                };
                format!("{}: {}", role, t.content)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_eviction() {
        let mut window = MessageWindow::new(3);
        for i in 0..5 {
            window.push(Turn::user(format!("message {}", i)));
        }

        assert_eq!(window.len(), 3);
        assert_eq!(window.turns()[0].content, "message 2");
        assert_eq!(window.turns()[2].content, "message 4");
    }

    #[test]
    fn test_last_user() {
        let mut window = MessageWindow::new(8);
        window.push(Turn::user("hallo"));
        window.push(Turn::assistant("Guten Tag!"));

        assert_eq!(window.last_user().unwrap().content, "hallo");
    }
}
