use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use soldy_core::Catalog;
use tracing::debug;

use crate::summary::summarize;

pub const DEFAULT_HISTORY_CAP: usize = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// Bounded conversation memory plus a keyword summary of what scrolled out.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConversationHistory {
    cap: usize,
    turns: VecDeque<ConversationTurn>,
    summary: String,
}

impl Default for ConversationHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAP)
    }
}

impl ConversationHistory {
    pub fn new(cap: usize) -> Self {
        let cap = cap.max(1);
        Self { cap, turns: VecDeque::with_capacity(cap + 1), summary: String::new() }
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn turns(&self) -> impl Iterator<Item = &ConversationTurn> {
        self.turns.iter()
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }

    /// Appends a turn. System instructions are never stored. When the cap is
    /// exceeded the summary is rebuilt from the full pre-trim history before
    /// the oldest turns are dropped.
    pub fn append(&mut self, turn: ConversationTurn, catalog: &Catalog) {
        if turn.role == Role::System {
            debug!(event_name = "agent.history.system_turn_skipped", "system turn not stored");
            return;
        }

        let is_assistant = turn.role == Role::Assistant;
        self.turns.push_back(turn);

        if self.turns.len() > self.cap {
            self.summary = summarize(self.turns.iter(), catalog);
            while self.turns.len() > self.cap {
                self.turns.pop_front();
            }
        } else if is_assistant {
            self.summary = summarize(self.turns.iter(), catalog);
        }
    }

    /// The bounded window that would be sent if `turn` were appended.
    pub fn window_with(&self, turn: &ConversationTurn) -> Vec<ConversationTurn> {
        let total = self.turns.len() + 1;
        let skip = total.saturating_sub(self.cap);
        self.turns.iter().chain(std::iter::once(turn)).skip(skip).cloned().collect()
    }

    pub fn clear(&mut self) {
        self.turns.clear();
        self.summary.clear();
    }
}

#[cfg(test)]
mod tests {
    use soldy_core::Catalog;

    use super::{ConversationHistory, ConversationTurn, Role};
    use crate::test_support::catalog;

    #[test]
    fn keeps_only_the_most_recent_turns() {
        let catalog = Catalog::empty();
        let mut history = ConversationHistory::new(4);
        for index in 0..7 {
            history.append(ConversationTurn::user(format!("mensaje {index}")), &catalog);
        }

        assert_eq!(history.len(), 4);
        let contents: Vec<&str> = history.turns().map(|turn| turn.content.as_str()).collect();
        assert_eq!(contents, vec!["mensaje 3", "mensaje 4", "mensaje 5", "mensaje 6"]);
    }

    #[test]
    fn summary_is_built_from_pre_trim_history() {
        let catalog = catalog();
        let mut history = ConversationHistory::new(2);
        history.append(ConversationTurn::user("Tengo una casa de 120 m² y mucho frío"), &catalog);
        history.append(ConversationTurn::user("¿qué me conviene?"), &catalog);
        history.append(ConversationTurn::user("gracias"), &catalog);

        assert_eq!(history.len(), 2);
        assert!(history.turns().all(|turn| !turn.content.contains("120")));
        assert!(history.summary().contains("120 m²"));
        assert!(history.summary().contains("casa"));
    }

    #[test]
    fn system_turns_are_never_stored() {
        let catalog = Catalog::empty();
        let mut history = ConversationHistory::default();
        history.append(
            ConversationTurn { role: Role::System, content: "sos Soldy".to_owned() },
            &catalog,
        );

        assert!(history.is_empty());
        assert_eq!(history.cap(), 10);
    }

    #[test]
    fn window_with_does_not_mutate() {
        let catalog = Catalog::empty();
        let mut history = ConversationHistory::new(3);
        for index in 0..3 {
            history.append(ConversationTurn::user(format!("m{index}")), &catalog);
        }

        let window = history.window_with(&ConversationTurn::user("nuevo"));
        let contents: Vec<&str> = window.iter().map(|turn| turn.content.as_str()).collect();
        assert_eq!(contents, vec!["m1", "m2", "nuevo"]);
        assert_eq!(history.len(), 3);
    }

    #[test]
    fn assistant_turn_refreshes_summary() {
        let catalog = catalog();
        let mut history = ConversationHistory::default();
        history.append(ConversationTurn::user("necesito calefacción"), &catalog);
        assert!(history.summary().is_empty());

        history.append(ConversationTurn::assistant("Te recomiendo la Prima Tec Smart."), &catalog);
        assert!(history.summary().contains("Prima Tec Smart"));
        assert!(history.summary().contains("calefacción"));
    }
}
