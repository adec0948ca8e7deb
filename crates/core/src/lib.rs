pub mod catalog;
pub mod config;
pub mod domain;
pub mod errors;
pub mod flows;
pub mod heating;
pub mod radiators;
pub mod recommend;
pub mod text;

pub use catalog::{Catalog, CatalogError, CatalogFilter};
pub use domain::product::{Product, ProductFamily};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use flows::{
    Answer, HeatingSystem, NodeResponse, QuestionnaireEngine, QuestionnaireError,
    QuestionnaireState, StepOutcome,
};
pub use heating::{ClimateZone, HeatLoad, InsulationLevel, InsulationQuality, LoadError, LoadUnit};
pub use radiators::{RadiatorObjective, SizedRadiator};
pub use recommend::{
    FallbackLevel, RadiatorPreferences, Recommendation, RecommendationRequest, Recommender,
};
