use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::recommend::Recommendation;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeatingSystem {
    FloorHeating,
    Radiators,
    Boilers,
}

impl HeatingSystem {
    pub const ALL: [HeatingSystem; 3] = [Self::FloorHeating, Self::Radiators, Self::Boilers];

    pub fn label(self) -> &'static str {
        match self {
            Self::FloorHeating => "Piso radiante",
            Self::Radiators => "Radiadores",
            Self::Boilers => "Calderas",
        }
    }
}

/// Progress through the guided questionnaire. `current_step == 0` means the
/// questionnaire has not been started (or has just finished).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionnaireState {
    pub current_step: u8,
    pub system: Option<HeatingSystem>,
    pub answers: BTreeMap<String, String>,
    pub derived_context: Vec<ContextEntry>,
}

impl QuestionnaireState {
    pub fn started() -> Self {
        Self { current_step: 1, ..Self::default() }
    }

    pub fn is_active(&self) -> bool {
        self.current_step > 0
    }

    pub fn answer(&self, field: &str) -> Option<&str> {
        self.answers.get(field).map(String::as_str)
    }

    pub(crate) fn record_context(&mut self, label: &str, value: String) {
        match self.derived_context.iter_mut().find(|entry| entry.label == label) {
            Some(entry) => entry.value = value,
            None => self.derived_context.push(ContextEntry { label: label.to_owned(), value }),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextEntry {
    pub label: String,
    pub value: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputType {
    Number,
    Multiple,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputField {
    pub name: String,
    pub label: String,
}

/// One rendered questionnaire node. Shared by the in-process dispatcher and
/// the remote `/start` + `/reply` protocol.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeResponse {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_type: Option<InputType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inputs: Option<Vec<InputField>>,
    pub is_final: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expert_state: Option<QuestionnaireState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<Recommendation>,
}

/// A user answer: either free text / a chosen option label, or named values
/// from a multi-field input.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Answer {
    Text(String),
    Values(BTreeMap<String, String>),
}

impl Answer {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub fn value(&self, field: &str) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text.as_str()),
            Self::Values(values) => values.get(field).map(String::as_str),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct StepOutcome {
    pub state: QuestionnaireState,
    pub response: NodeResponse,
}
