//! Routes widget intents to the guided questionnaire, the assistant or the
//! catalog browser. Every outcome is a structured reply; rendering is left to
//! the client.

use serde::{Deserialize, Serialize};
use soldy_core::flows::{InputField, InputType, ASK_QUESTION, NEW_CALCULATION};
use soldy_core::{
    Answer, Catalog, NodeResponse, Product, ProductFamily, QuestionnaireEngine, QuestionnaireError,
    QuestionnaireState,
};
use tracing::{debug, warn};

use crate::guardrails::{Branch, BranchContact};
use crate::runtime::AgentRuntime;
use crate::session::{Mode, Session};

pub const WELCOME: &str = "¡Hola! Soy Soldy tu asistente inteligente de SOLDASUR. Puedo \
     ayudarte de diferentes formas. ¿Qué necesitas?";
pub const GUIDE_ME: &str = "Guíame en un cálculo";
pub const HAVE_QUESTION: &str = "Tengo una pregunta";
pub const BROWSE_PRODUCTS: &str = "Buscar productos";
pub const SHOW_ALL: &str = "Ver todos";
pub const OTHER_CATEGORIES: &str = "Ver otras categorías";
pub const START_CALCULATION: &str = "Hacer un cálculo";
pub const BACK: &str = "Volver";
pub const CHAT_PROMPT: &str = "¿Qué necesitas saber?";
pub const ASSISTANT_ERROR: &str =
    "Lo siento, hubo un error al procesar tu consulta. Por favor, intenta nuevamente.";

const NEW_CALCULATION_TEXT: &str = "¡Perfecto! Iniciemos un nuevo cálculo.";
const NO_CALCULATION: &str = "No hay un cálculo en curso. ¿Querés empezar uno?";
const CATEGORY_QUESTION: &str = "¿Qué tipo de producto te interesa?";
const CATALOG_HINT: &str = "Hacé clic en cualquier producto para ver más detalles en nuestra web.";
const CALCULATION_FAILED: &str =
    "No pudimos completar el cálculo con esos datos. Empecemos de nuevo.";

/// Featured selection for "Ver todos": family and how many of each.
const FEATURED: [(ProductFamily, usize); 4] = [
    (ProductFamily::Boilers, 2),
    (ProductFamily::Radiators, 2),
    (ProductFamily::ThermalTanks, 1),
    (ProductFamily::PoolHeaters, 1),
];

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum UserIntent {
    OpenMenu,
    StartGuidedCalculation,
    AskQuestion,
    BrowseCatalog,
    BrowseFamily(ProductFamily),
    ShowAllProducts,
    ExpertAnswer { step: u8, answer: Answer },
    FreeText(String),
    ChooseBranch(Branch),
    NewCalculation,
    Back,
}

impl UserIntent {
    /// Maps a clicked option label to an intent. While a calculation is in
    /// progress every label is an answer to the current step.
    pub fn from_option(session: &Session, label: &str) -> Self {
        let trimmed = label.trim();
        if trimmed == BACK {
            return Self::Back;
        }
        if session.mode == Mode::Guided && session.questionnaire.is_active() {
            return Self::ExpertAnswer {
                step: session.questionnaire.current_step,
                answer: Answer::text(trimmed),
            };
        }

        match trimmed {
            GUIDE_ME => Self::StartGuidedCalculation,
            HAVE_QUESTION | ASK_QUESTION => Self::AskQuestion,
            BROWSE_PRODUCTS | OTHER_CATEGORIES => Self::BrowseCatalog,
            SHOW_ALL => Self::ShowAllProducts,
            NEW_CALCULATION | START_CALCULATION => Self::NewCalculation,
            other => {
                if let Some(family) = ProductFamily::parse(other) {
                    Self::BrowseFamily(family)
                } else if let Some(branch) = Branch::parse(other) {
                    Self::ChooseBranch(branch)
                } else {
                    Self::FreeText(other.to_owned())
                }
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputKind {
    Number,
    Multiple,
    FreeText,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputRequest {
    pub kind: InputKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<InputField>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct DispatchReply {
    pub messages: Vec<String>,
    pub options: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<InputRequest>,
    pub products: Vec<Product>,
    pub quick_replies: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<BranchContact>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expert_state: Option<QuestionnaireState>,
    pub mode: Mode,
}

impl DispatchReply {
    fn message(text: impl Into<String>) -> Self {
        Self { messages: vec![text.into()], ..Self::default() }
    }

    fn with_options(mut self, options: &[&str]) -> Self {
        self.options = options.iter().map(|option| (*option).to_owned()).collect();
        self
    }

    fn from_node(node: NodeResponse) -> Self {
        let input = node.input_type.map(|input_type| InputRequest {
            kind: match input_type {
                InputType::Number => InputKind::Number,
                InputType::Multiple => InputKind::Multiple,
            },
            fields: node.inputs.clone().unwrap_or_default(),
        });
        Self {
            messages: vec![node.text],
            options: node.options.unwrap_or_default(),
            input,
            products: node.recommendation.map(|r| vec![r.product]).unwrap_or_default(),
            expert_state: node.expert_state,
            ..Self::default()
        }
    }
}

pub struct Dispatcher<'a> {
    runtime: &'a AgentRuntime,
    catalog: &'a Catalog,
}

impl<'a> Dispatcher<'a> {
    pub fn new(runtime: &'a AgentRuntime, catalog: &'a Catalog) -> Self {
        Self { runtime, catalog }
    }

    pub async fn handle(&self, session: &mut Session, intent: UserIntent) -> DispatchReply {
        debug!(
            event_name = "agent.dispatch.intent",
            conversation_id = %session.id,
            mode = ?session.mode,
            intent = ?intent
        );

        let mut reply = match (session.mode, intent) {
            (_, UserIntent::OpenMenu) => self.menu(session),
            (_, UserIntent::Back) => {
                // history survives; only the calculation is dropped
                session.questionnaire = QuestionnaireState::default();
                self.menu(session)
            }
            (_, UserIntent::StartGuidedCalculation) => self.start_guided(session, None),
            (_, UserIntent::NewCalculation) => self.start_guided(session, Some(NEW_CALCULATION_TEXT)),
            (Mode::Guided, UserIntent::ExpertAnswer { step, answer }) => {
                self.expert_answer(session, step, &answer)
            }
            (Mode::Guided, UserIntent::FreeText(text)) if session.questionnaire.is_active() => {
                let step = session.questionnaire.current_step;
                self.expert_answer(session, step, &Answer::text(text))
            }
            (_, UserIntent::ExpertAnswer { .. }) => {
                DispatchReply::message(NO_CALCULATION).with_options(&[GUIDE_ME, HAVE_QUESTION])
            }
            (_, UserIntent::AskQuestion) => {
                session.mode = Mode::Chat;
                DispatchReply {
                    input: Some(InputRequest { kind: InputKind::FreeText, fields: Vec::new() }),
                    ..DispatchReply::message(CHAT_PROMPT)
                }
            }
            (_, UserIntent::FreeText(text)) => self.free_text(session, &text).await,
            (_, UserIntent::BrowseCatalog) => self.category_menu(session),
            (_, UserIntent::BrowseFamily(family)) => self.browse_family(session, family),
            (_, UserIntent::ShowAllProducts) => self.show_all(session),
            (_, UserIntent::ChooseBranch(branch)) => {
                let contact = branch.contact();
                DispatchReply { branch: Some(contact.clone()), ..DispatchReply::message(contact.message()) }
            }
        };
        reply.mode = session.mode;
        reply
    }

    fn menu(&self, session: &mut Session) -> DispatchReply {
        session.mode = Mode::Menu;
        DispatchReply::message(WELCOME).with_options(&[GUIDE_ME, HAVE_QUESTION, BROWSE_PRODUCTS])
    }

    fn start_guided(&self, session: &mut Session, preface: Option<&str>) -> DispatchReply {
        let (state, node) = QuestionnaireEngine::new(self.catalog).start();
        session.questionnaire = state;
        session.mode = Mode::Guided;
        let mut reply = DispatchReply::from_node(node);
        if let Some(preface) = preface {
            reply.messages.insert(0, preface.to_owned());
        }
        reply
    }

    fn expert_answer(&self, session: &mut Session, step: u8, answer: &Answer) -> DispatchReply {
        let engine = QuestionnaireEngine::new(self.catalog);
        match engine.handle_answer(&session.questionnaire, step, answer) {
            Ok(outcome) => {
                session.questionnaire = outcome.state;
                let finished = outcome.response.is_final;
                if let Some(recommendation) = &outcome.response.recommendation {
                    session.set_anchor(recommendation.product.model.clone());
                }
                if finished {
                    session.mode = Mode::Menu;
                }
                DispatchReply::from_node(outcome.response)
            }
            Err(error) => {
                if let Some(reprompt) = error.reprompt() {
                    return DispatchReply::from_node(reprompt.clone());
                }
                match error {
                    QuestionnaireError::StepMismatch { .. } | QuestionnaireError::NotStarted => {
                        DispatchReply::from_node(engine.prompt(&session.questionnaire))
                    }
                    other => {
                        warn!(
                            event_name = "agent.dispatch.calculation_failed",
                            conversation_id = %session.id,
                            error = %other
                        );
                        self.start_guided(session, Some(CALCULATION_FAILED))
                    }
                }
            }
        }
    }

    async fn free_text(&self, session: &mut Session, text: &str) -> DispatchReply {
        session.mode = Mode::Chat;
        match self.runtime.ask(text, session, self.catalog).await {
            Ok(answer) => DispatchReply {
                products: answer.products,
                quick_replies: answer.quick_replies,
                input: Some(InputRequest { kind: InputKind::FreeText, fields: Vec::new() }),
                ..DispatchReply::message(answer.answer)
            },
            Err(_) => DispatchReply {
                input: Some(InputRequest { kind: InputKind::FreeText, fields: Vec::new() }),
                ..DispatchReply::message(ASSISTANT_ERROR)
            },
        }
    }

    fn category_menu(&self, session: &mut Session) -> DispatchReply {
        session.mode = Mode::Catalog;
        let mut options: Vec<String> = ProductFamily::ALL
            .into_iter()
            .filter(|family| *family != ProductFamily::Thermostats)
            .map(|family| family.label().to_owned())
            .collect();
        options.push(SHOW_ALL.to_owned());
        DispatchReply { options, ..DispatchReply::message(CATEGORY_QUESTION) }
    }

    fn browse_family(&self, session: &mut Session, family: ProductFamily) -> DispatchReply {
        session.mode = Mode::Catalog;
        let products: Vec<Product> = self.catalog.by_family(family).into_iter().cloned().collect();
        if products.is_empty() {
            return DispatchReply::message(format!(
                "Lo siento, no encontré productos en la categoría {family}. ¿Te gustaría ver otra categoría?"
            ))
            .with_options(&[OTHER_CATEGORIES, START_CALCULATION, ASK_QUESTION]);
        }
        DispatchReply {
            messages: vec![
                format!("Aquí están nuestros {} productos de {family}:", products.len()),
                CATALOG_HINT.to_owned(),
            ],
            products,
            ..DispatchReply::default()
        }
        .with_options(&[START_CALCULATION, ASK_QUESTION, OTHER_CATEGORIES])
    }

    fn show_all(&self, session: &mut Session) -> DispatchReply {
        session.mode = Mode::Catalog;
        let products: Vec<Product> = FEATURED
            .iter()
            .flat_map(|(family, count)| self.catalog.by_family(*family).into_iter().take(*count))
            .cloned()
            .collect();
        DispatchReply {
            messages: vec![
                "Aquí está una selección de nuestros productos destacados:".to_owned(),
                format!("Tenemos {} productos en total.", self.catalog.len()),
            ],
            products,
            ..DispatchReply::default()
        }
        .with_options(&[START_CALCULATION, ASK_QUESTION, OTHER_CATEGORIES])
    }
}
