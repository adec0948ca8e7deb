use std::fmt;

use serde::{Deserialize, Serialize};
use soldy_core::QuestionnaireState;
use uuid::Uuid;

use crate::conversation::ConversationHistory;

/// Opaque conversation key. Clients may bring their own; new ones are uuids.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(String);

impl ConversationId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Trimmed, non-empty ids only.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        (!trimmed.is_empty()).then(|| Self(trimmed.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    #[default]
    Menu,
    Guided,
    Chat,
    Catalog,
}

/// Everything mutable about one conversation.
#[derive(Clone, Debug)]
pub struct Session {
    pub id: ConversationId,
    pub history: ConversationHistory,
    pub questionnaire: QuestionnaireState,
    pub mode: Mode,
    anchor: Option<String>,
}

impl Session {
    pub fn new(id: ConversationId, history_cap: usize) -> Self {
        Self {
            id,
            history: ConversationHistory::new(history_cap),
            questionnaire: QuestionnaireState::default(),
            mode: Mode::Menu,
            anchor: None,
        }
    }

    /// Model name of the last product surfaced by either flow.
    pub fn anchor(&self) -> Option<&str> {
        self.anchor.as_deref()
    }

    pub fn set_anchor(&mut self, model: impl Into<String>) {
        self.anchor = Some(model.into());
    }

    pub fn reset(&mut self) {
        self.history.clear();
        self.questionnaire = QuestionnaireState::default();
        self.mode = Mode::Menu;
        self.anchor = None;
    }
}
