use thiserror::Error;
use tracing::info;

use crate::catalog::Catalog;
use crate::flows::states::{
    Answer, HeatingSystem, InputField, InputType, NodeResponse, QuestionnaireState, StepOutcome,
};
use crate::heating::{
    self, ClimateZone, HeatLoad, InsulationLevel, InsulationQuality, LoadError,
    RADIATOR_MODULE_OUTPUT_KCAL_H,
};
use crate::radiators::{self, RadiatorObjective};
use crate::recommend::{RadiatorPreferences, RecommendationRequest, Recommender};
use crate::text;

pub const START_TEXT: &str =
    "¡Perfecto! Te guiaré paso a paso para calcular tu sistema de calefacción.";
pub const SYSTEM_QUESTION: &str = "¿Qué tipo de calefacción deseas calcular?";
pub const NEW_CALCULATION: &str = "Nuevo cálculo";
pub const ASK_QUESTION: &str = "Hacer una pregunta";
pub const TOWEL_DRYING: &str = "Secado de toallas";
pub const ANY_COLOR: &str = "Indistinto";

const NUMBER_HINT: &str = "Ingresá un número mayor a cero.";
const OPTION_HINT: &str = "Elegí una de las opciones disponibles.";

#[derive(Clone, Debug, Error, PartialEq)]
pub enum QuestionnaireError {
    #[error("questionnaire has not been started")]
    NotStarted,
    #[error("answer for step {received} does not match current step {expected}")]
    StepMismatch { expected: u8, received: u8 },
    #[error("invalid value `{value}` for `{field}` at step {step}")]
    InvalidInput { step: u8, field: &'static str, value: String, reprompt: Box<NodeResponse> },
    #[error("`{answer}` is not an option at step {step}")]
    InvalidOption { step: u8, answer: String, reprompt: Box<NodeResponse> },
    #[error("missing stored answer for `{field}`")]
    MissingAnswer { field: &'static str },
    #[error(transparent)]
    Calculation(#[from] LoadError),
}

impl QuestionnaireError {
    /// The node to show again when the answer was rejected.
    pub fn reprompt(&self) -> Option<&NodeResponse> {
        match self {
            Self::InvalidInput { reprompt, .. } | Self::InvalidOption { reprompt, .. } => {
                Some(reprompt)
            }
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepKind {
    Choice(&'static [&'static str]),
    Number { label: &'static str },
    Dimensions,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StepSpec {
    pub field: &'static str,
    pub context_label: &'static str,
    pub question: &'static str,
    pub kind: StepKind,
}

/// What the terminal step (or a short-circuit) hands to the recommender.
#[derive(Clone, Debug, PartialEq)]
pub struct Computation {
    pub request: RecommendationRequest,
    pub load: Option<HeatLoad>,
    pub extra_context: Vec<(&'static str, String)>,
}

/// One questionnaire branch. Step 1 (system choice) is shared and handled by
/// the engine; steps `2..step_count()` are input steps and `step_count()` is
/// the compute step.
pub trait SystemFlow: Sync {
    fn system(&self) -> HeatingSystem;
    fn step_count(&self) -> u8;
    fn step(&self, step: u8) -> Option<StepSpec>;
    fn compute(&self, state: &QuestionnaireState) -> Result<Computation, QuestionnaireError>;

    fn short_circuit(&self, _state: &QuestionnaireState) -> Option<Computation> {
        None
    }
}

const ZONES: &[&str] = &["Norte", "Centro", "Sur"];
const QUALITIES: &[&str] = &["Buena", "Regular", "Mala"];
const OBJECTIVES: &[&str] = &["Calefacción principal", "Calefacción complementaria", TOWEL_DRYING];
const LEVELS: &[&str] = &["Alta", "Media", "Baja"];
const INSTALLATIONS: &[&str] = &["Superficie", "Empotrada"];
const STYLES: &[&str] = &["Clásico", "Moderno"];
const COLORS: &[&str] = &["Blanco", "Negro", "Cromo", ANY_COLOR];
const YES_NO: &[&str] = &["Sí", "No"];

const DIMENSION_FIELDS: [(&str, &str); 3] =
    [("length_m", "Largo (m)"), ("width_m", "Ancho (m)"), ("height_m", "Alto (m)")];

#[derive(Clone, Copy, Debug, Default)]
pub struct FloorHeatingFlow;

impl SystemFlow for FloorHeatingFlow {
    fn system(&self) -> HeatingSystem {
        HeatingSystem::FloorHeating
    }

    fn step_count(&self) -> u8 {
        5
    }

    fn step(&self, step: u8) -> Option<StepSpec> {
        match step {
            2 => Some(StepSpec {
                field: "area_m2",
                context_label: "Superficie",
                question: "¿Cuál es la superficie a calefaccionar?",
                kind: StepKind::Number { label: "Superficie en m²" },
            }),
            3 => Some(StepSpec {
                field: "zone",
                context_label: "Zona",
                question: "¿En qué zona geográfica se encuentra?",
                kind: StepKind::Choice(ZONES),
            }),
            4 => Some(StepSpec {
                field: "insulation",
                context_label: "Aislación",
                question: "¿Cuál es el nivel de aislación térmica de la vivienda?",
                kind: StepKind::Choice(QUALITIES),
            }),
            _ => None,
        }
    }

    fn compute(&self, state: &QuestionnaireState) -> Result<Computation, QuestionnaireError> {
        let area = stored_number(state, "area_m2")?;
        let zone = match stored(state, "zone")? {
            "Norte" => ClimateZone::North,
            "Centro" => ClimateZone::Central,
            _ => ClimateZone::South,
        };
        let insulation = match stored(state, "insulation")? {
            "Buena" => InsulationQuality::Good,
            "Regular" => InsulationQuality::Average,
            _ => InsulationQuality::Poor,
        };
        let load = heating::area_load(area, zone, insulation)?;
        Ok(Computation {
            request: RecommendationRequest::FloorHeating { area_m2: area },
            load: Some(load),
            extra_context: Vec::new(),
        })
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct RadiatorFlow;

impl SystemFlow for RadiatorFlow {
    fn system(&self) -> HeatingSystem {
        HeatingSystem::Radiators
    }

    fn step_count(&self) -> u8 {
        8
    }

    fn step(&self, step: u8) -> Option<StepSpec> {
        match step {
            2 => Some(StepSpec {
                field: "objective",
                context_label: "Objetivo",
                question: "¿Cuál es el objetivo de los radiadores?",
                kind: StepKind::Choice(OBJECTIVES),
            }),
            3 => Some(StepSpec {
                field: "dimensions",
                context_label: "Ambiente",
                question: "Ingresá las medidas del ambiente en metros.",
                kind: StepKind::Dimensions,
            }),
            4 => Some(StepSpec {
                field: "insulation",
                context_label: "Aislación",
                question: "¿Qué nivel de aislación tiene el ambiente?",
                kind: StepKind::Choice(LEVELS),
            }),
            5 => Some(StepSpec {
                field: "installation",
                context_label: "Instalación",
                question: "¿Qué tipo de instalación preferís?",
                kind: StepKind::Choice(INSTALLATIONS),
            }),
            6 => Some(StepSpec {
                field: "style",
                context_label: "Estilo",
                question: "¿Qué estilo de radiador preferís?",
                kind: StepKind::Choice(STYLES),
            }),
            7 => Some(StepSpec {
                field: "color",
                context_label: "Color",
                question: "¿De qué color lo preferís?",
                kind: StepKind::Choice(COLORS),
            }),
            _ => None,
        }
    }

    fn short_circuit(&self, state: &QuestionnaireState) -> Option<Computation> {
        (state.answer("objective") == Some(TOWEL_DRYING)).then(|| Computation {
            request: RecommendationRequest::TowelWarmer,
            load: None,
            extra_context: Vec::new(),
        })
    }

    fn compute(&self, state: &QuestionnaireState) -> Result<Computation, QuestionnaireError> {
        let length = stored_number(state, "length_m")?;
        let width = stored_number(state, "width_m")?;
        let height = stored_number(state, "height_m")?;
        let insulation = match stored(state, "insulation")? {
            "Alta" => InsulationLevel::High,
            "Media" => InsulationLevel::Medium,
            _ => InsulationLevel::Low,
        };
        let load = heating::volume_load(length, width, height, insulation)?;
        let modules = heating::radiator_modules(load, RADIATOR_MODULE_OUTPUT_KCAL_H)?;
        let objective = RadiatorObjective::parse(stored(state, "objective")?)
            .ok_or(QuestionnaireError::MissingAnswer { field: "objective" })?;
        let color = stored(state, "color")?;
        let preferences = RadiatorPreferences {
            color: (color != ANY_COLOR).then(|| color.to_owned()),
            style: state.answer("style").map(str::to_owned),
            installation: state.answer("installation").map(str::to_owned),
            objective: Some(objective),
        };

        let mut extra_context = vec![
            ("Volumen", format!("{} m³", format_quantity(length * width * height))),
            ("Elementos sugeridos", modules.to_string()),
        ];
        let sizes = radiators::rank_sizes(objective, &preferences, load)?;
        if !sizes.is_empty() {
            let listed: Vec<String> = sizes.iter().map(|size| size.summary()).collect();
            extra_context.push(("Modelos sugeridos", listed.join("; ")));
        }

        Ok(Computation {
            request: RecommendationRequest::Radiators { load, preferences },
            load: Some(load),
            extra_context,
        })
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct BoilerFlow;

impl SystemFlow for BoilerFlow {
    fn system(&self) -> HeatingSystem {
        HeatingSystem::Boilers
    }

    fn step_count(&self) -> u8 {
        4
    }

    fn step(&self, step: u8) -> Option<StepSpec> {
        match step {
            2 => Some(StepSpec {
                field: "declared_kcal_h",
                context_label: "Carga declarada",
                question: "¿Cuál es la carga térmica total a cubrir?",
                kind: StepKind::Number { label: "Carga térmica en kcal/h" },
            }),
            3 => Some(StepSpec {
                field: "hot_water",
                context_label: "Agua caliente",
                question: "¿Necesitás también agua caliente sanitaria?",
                kind: StepKind::Choice(YES_NO),
            }),
            _ => None,
        }
    }

    fn compute(&self, state: &QuestionnaireState) -> Result<Computation, QuestionnaireError> {
        let declared = stored_number(state, "declared_kcal_h")?;
        let hot_water = stored(state, "hot_water")? == "Sí";
        let required = heating::boiler_required_power(declared)?;
        Ok(Computation {
            request: RecommendationRequest::BoilerByPower { required, hot_water },
            load: Some(required),
            extra_context: Vec::new(),
        })
    }
}

pub fn flow_for(system: HeatingSystem) -> &'static dyn SystemFlow {
    match system {
        HeatingSystem::FloorHeating => &FloorHeatingFlow,
        HeatingSystem::Radiators => &RadiatorFlow,
        HeatingSystem::Boilers => &BoilerFlow,
    }
}

fn stored<'s>(state: &'s QuestionnaireState, field: &'static str) -> Result<&'s str, QuestionnaireError> {
    state.answer(field).ok_or(QuestionnaireError::MissingAnswer { field })
}

fn stored_number(state: &QuestionnaireState, field: &'static str) -> Result<f64, QuestionnaireError> {
    stored(state, field)?.parse::<f64>().map_err(|_| QuestionnaireError::MissingAnswer { field })
}

fn format_quantity(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        let rounded = (value * 100.0).round() / 100.0;
        format!("{rounded}")
    }
}

fn positive(raw: &str) -> Option<f64> {
    text::parse_number(raw).filter(|value| *value > 0.0)
}

fn match_option(options: &[&'static str], raw: &str) -> Option<&'static str> {
    let wanted = text::fold(raw.trim());
    options.iter().copied().find(|option| text::fold(option) == wanted)
}

/// Splits "4 x 3 x 2,5" style free text into three numbers.
fn parse_dimensions(raw: &str) -> Option<[f64; 3]> {
    let parts: Vec<&str> = raw
        .split(|ch: char| ch == 'x' || ch == 'X' || ch == '*' || ch.is_whitespace() || ch == ';')
        .filter(|part| !part.is_empty())
        .collect();
    match parts.as_slice() {
        [length, width, height] => Some([positive(length)?, positive(width)?, positive(height)?]),
        _ => None,
    }
}

/// Drives the guided questionnaire. Transitions are deterministic functions
/// of `(system, current_step, answer)`.
#[derive(Clone, Copy, Debug)]
pub struct QuestionnaireEngine<'a> {
    catalog: &'a Catalog,
}

impl<'a> QuestionnaireEngine<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        Self { catalog }
    }

    pub fn start(&self) -> (QuestionnaireState, NodeResponse) {
        let state = QuestionnaireState::started();
        let mut response = self.prompt(&state);
        response.text = format!("{START_TEXT}\n\n{}", response.text);
        (state, response)
    }

    pub fn prompt(&self, state: &QuestionnaireState) -> NodeResponse {
        let spec = state.system.and_then(|system| flow_for(system).step(state.current_step));
        match (state.current_step, spec) {
            (0, _) | (1, _) | (_, None) => NodeResponse {
                text: SYSTEM_QUESTION.to_owned(),
                options: Some(HeatingSystem::ALL.iter().map(|s| s.label().to_owned()).collect()),
                expert_state: Some(QuestionnaireState::started()),
                ..NodeResponse::default()
            },
            (_, Some(spec)) => render_step(spec, state),
        }
    }

    pub fn handle_answer(
        &self,
        state: &QuestionnaireState,
        step: u8,
        answer: &Answer,
    ) -> Result<StepOutcome, QuestionnaireError> {
        if !state.is_active() {
            return Err(QuestionnaireError::NotStarted);
        }
        if step != state.current_step {
            return Err(QuestionnaireError::StepMismatch {
                expected: state.current_step,
                received: step,
            });
        }

        let mut next = state.clone();
        if step == 1 {
            let raw = answer.value("system").unwrap_or_default();
            let system = HeatingSystem::ALL
                .into_iter()
                .find(|system| text::fold(system.label()) == text::fold(raw.trim()))
                .ok_or_else(|| QuestionnaireError::InvalidOption {
                    step,
                    answer: raw.to_owned(),
                    reprompt: Box::new(self.reprompt(state, OPTION_HINT)),
                })?;
            next.system = Some(system);
            next.answers.insert("system".to_owned(), system.label().to_owned());
            next.record_context("Sistema", system.label().to_owned());
            next.current_step = 2;
            info!(
                event_name = "domain.questionnaire.system_selected",
                system = system.label(),
                "questionnaire branch selected"
            );
            let response = self.prompt(&next);
            return Ok(StepOutcome { state: next, response });
        }

        let flow = match state.system {
            Some(system) => flow_for(system),
            None => return Err(QuestionnaireError::NotStarted),
        };
        let Some(spec) = flow.step(step) else {
            return Err(QuestionnaireError::StepMismatch {
                expected: flow.step_count(),
                received: step,
            });
        };

        self.record_answer(state, &mut next, spec, step, answer)?;
        next.current_step = step + 1;

        if let Some(computation) = flow.short_circuit(&next) {
            return Ok(self.finish(next, computation));
        }
        if next.current_step >= flow.step_count() {
            let computation = flow.compute(&next)?;
            return Ok(self.finish(next, computation));
        }

        let response = self.prompt(&next);
        Ok(StepOutcome { state: next, response })
    }

    fn record_answer(
        &self,
        state: &QuestionnaireState,
        next: &mut QuestionnaireState,
        spec: StepSpec,
        step: u8,
        answer: &Answer,
    ) -> Result<(), QuestionnaireError> {
        match spec.kind {
            StepKind::Choice(options) => {
                let raw = answer.value(spec.field).unwrap_or_default();
                let chosen =
                    match_option(options, raw).ok_or_else(|| QuestionnaireError::InvalidOption {
                        step,
                        answer: raw.to_owned(),
                        reprompt: Box::new(self.reprompt(state, OPTION_HINT)),
                    })?;
                next.answers.insert(spec.field.to_owned(), chosen.to_owned());
                next.record_context(spec.context_label, chosen.to_owned());
            }
            StepKind::Number { .. } => {
                let raw = answer.value(spec.field).unwrap_or_default();
                let value = positive(raw).ok_or_else(|| QuestionnaireError::InvalidInput {
                    step,
                    field: spec.field,
                    value: raw.to_owned(),
                    reprompt: Box::new(self.reprompt(state, NUMBER_HINT)),
                })?;
                next.answers.insert(spec.field.to_owned(), value.to_string());
                let shown = match spec.field {
                    "area_m2" => format!("{} m²", format_quantity(value)),
                    _ => format!("{} kcal/h", format_quantity(value)),
                };
                next.record_context(spec.context_label, shown);
            }
            StepKind::Dimensions => {
                let values = match answer {
                    Answer::Text(raw) => parse_dimensions(raw),
                    Answer::Values(_) => {
                        let mut parsed = [0.0; 3];
                        let mut complete = true;
                        for (slot, (field, _)) in parsed.iter_mut().zip(DIMENSION_FIELDS) {
                            match answer.value(field).and_then(positive) {
                                Some(value) => *slot = value,
                                None => complete = false,
                            }
                        }
                        complete.then_some(parsed)
                    }
                };
                let [length, width, height] =
                    values.ok_or_else(|| QuestionnaireError::InvalidInput {
                        step,
                        field: spec.field,
                        value: format!("{answer:?}"),
                        reprompt: Box::new(self.reprompt(state, NUMBER_HINT)),
                    })?;
                for ((field, _), value) in DIMENSION_FIELDS.iter().zip([length, width, height]) {
                    next.answers.insert((*field).to_owned(), value.to_string());
                }
                next.record_context(
                    spec.context_label,
                    format!(
                        "{} x {} x {} m",
                        format_quantity(length),
                        format_quantity(width),
                        format_quantity(height)
                    ),
                );
            }
        }
        Ok(())
    }

    fn reprompt(&self, state: &QuestionnaireState, hint: &str) -> NodeResponse {
        let mut response = self.prompt(state);
        response.text = format!("{hint}\n\n{}", response.text);
        response
    }

    fn finish(&self, mut state: QuestionnaireState, computation: Computation) -> StepOutcome {
        if let Some(load) = computation.load {
            state.record_context("Carga térmica", load.to_string());
        }
        for (label, value) in &computation.extra_context {
            state.record_context(label, value.clone());
        }

        let recommendation = Recommender::new(self.catalog).recommend(&computation.request);
        let mut text = String::from("¡Cálculo completado!\n\nResultados:");
        for entry in &state.derived_context {
            text.push_str(&format!("\n- {}: {}", entry.label, entry.value));
        }
        match &recommendation {
            Some(recommendation) => text.push_str(&format!(
                "\n\nProducto recomendado: {} ({}).",
                recommendation.product.model, recommendation.product.description
            )),
            None => text.push_str(
                "\n\nNo pudimos obtener una recomendación en este momento, reintentá más tarde.",
            ),
        }

        info!(
            event_name = "domain.questionnaire.completed",
            system = state.system.map(HeatingSystem::label).unwrap_or_default(),
            model = recommendation.as_ref().map(|r| r.product.model.as_str()).unwrap_or_default(),
            "questionnaire completed"
        );

        let reset = QuestionnaireState::default();
        StepOutcome {
            state: reset.clone(),
            response: NodeResponse {
                text,
                options: Some(vec![NEW_CALCULATION.to_owned(), ASK_QUESTION.to_owned()]),
                is_final: true,
                expert_state: Some(reset),
                recommendation,
                ..NodeResponse::default()
            },
        }
    }
}

fn render_step(spec: StepSpec, state: &QuestionnaireState) -> NodeResponse {
    let base = NodeResponse {
        text: spec.question.to_owned(),
        expert_state: Some(state.clone()),
        ..NodeResponse::default()
    };
    match spec.kind {
        StepKind::Choice(options) => NodeResponse {
            options: Some(options.iter().map(|option| (*option).to_owned()).collect()),
            ..base
        },
        StepKind::Number { label } => NodeResponse {
            input_type: Some(InputType::Number),
            inputs: Some(vec![InputField { name: spec.field.to_owned(), label: label.to_owned() }]),
            ..base
        },
        StepKind::Dimensions => NodeResponse {
            input_type: Some(InputType::Multiple),
            inputs: Some(
                DIMENSION_FIELDS
                    .iter()
                    .map(|(name, label)| InputField {
                        name: (*name).to_owned(),
                        label: (*label).to_owned(),
                    })
                    .collect(),
            ),
            ..base
        },
    }
}
