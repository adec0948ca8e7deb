pub mod engine;
pub mod states;

pub use engine::{
    flow_for, BoilerFlow, Computation, FloorHeatingFlow, QuestionnaireEngine, QuestionnaireError,
    RadiatorFlow, StepKind, StepSpec, SystemFlow, ASK_QUESTION, NEW_CALCULATION,
};
pub use states::{
    Answer, ContextEntry, HeatingSystem, InputField, InputType, NodeResponse, QuestionnaireState,
    StepOutcome,
};
