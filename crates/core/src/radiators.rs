//! Sized water-radiator lines.
//!
//! Every catalog radiator line ships in several heights. Each height scales the
//! nominal module output by a coefficient, which decides how many modules a
//! room needs. The table also records whether a line is meant to be the main
//! heat source, a complement, or both.

use serde::{Deserialize, Serialize};

use crate::heating::{self, HeatLoad, LoadError, RADIATOR_MODULE_OUTPUT_KCAL_H};
use crate::recommend::RadiatorPreferences;
use crate::text;

pub const MAX_SIZED_OPTIONS: usize = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RadiatorObjective {
    Primary,
    Complementary,
}

impl RadiatorObjective {
    pub fn label(self) -> &'static str {
        match self {
            Self::Primary => "Calefacción principal",
            Self::Complementary => "Calefacción complementaria",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let folded = text::fold(raw.trim());
        [Self::Primary, Self::Complementary]
            .into_iter()
            .find(|objective| text::fold(objective.label()) == folded)
    }
}

const PRIMARY: &[RadiatorObjective] = &[RadiatorObjective::Primary];
const COMPLEMENTARY: &[RadiatorObjective] = &[RadiatorObjective::Complementary];
const BOTH: &[RadiatorObjective] = &[RadiatorObjective::Primary, RadiatorObjective::Complementary];

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RadiatorSize {
    pub name: &'static str,
    /// Catalog model the size belongs to.
    pub line: &'static str,
    pub coefficient: f64,
    pub description: &'static str,
    objectives: &'static [RadiatorObjective],
    installation: &'static [&'static str],
    style: &'static str,
    colors: &'static [&'static str],
}

impl RadiatorSize {
    pub fn output_kcal_h(&self) -> f64 {
        RADIATOR_MODULE_OUTPUT_KCAL_H * self.coefficient
    }

    pub fn supports(&self, objective: RadiatorObjective) -> bool {
        self.objectives.contains(&objective)
    }

    fn accepts(&self, preferences: &RadiatorPreferences) -> bool {
        preferences.matches(
            self.colors.iter().copied(),
            Some(self.style),
            self.installation.iter().copied(),
        )
    }
}

const fn size(
    name: &'static str,
    line: &'static str,
    coefficient: f64,
    objectives: &'static [RadiatorObjective],
    installation: &'static [&'static str],
    style: &'static str,
    colors: &'static [&'static str],
    description: &'static str,
) -> RadiatorSize {
    RadiatorSize { name, line, coefficient, description, objectives, installation, style, colors }
}

const SURFACE: &[&str] = &["superficie"];
const SURFACE_OR_RECESSED: &[&str] = &["empotrada", "superficie"];
const WHITE: &[&str] = &["blanco"];
const WHITE_OR_BLACK: &[&str] = &["blanco", "negro"];

pub const RADIATOR_SIZES: &[RadiatorSize] = &[
    size("Tropical 350", "Tropical", 0.75, PRIMARY, SURFACE, "clásico", WHITE,
        "Radiador de aluminio inyectado, ideal para calefacción principal"),
    size("Tropical 500", "Tropical", 1.0, PRIMARY, SURFACE, "clásico", WHITE,
        "Radiador de aluminio inyectado, alto rendimiento"),
    size("Tropical 600", "Tropical", 1.16, PRIMARY, SURFACE, "clásico", WHITE,
        "Radiador de aluminio inyectado, máxima potencia"),
    size("Broen 350", "Broen", 0.75, BOTH, SURFACE, "moderno", WHITE_OR_BLACK,
        "Diseño discreto y moderno, disponible en dos colores"),
    size("Broen 500", "Broen", 1.0, BOTH, SURFACE, "moderno", WHITE_OR_BLACK,
        "Versión intermedia de la línea Broen"),
    size("Broen 600", "Broen", 1.16, BOTH, SURFACE, "moderno", WHITE_OR_BLACK,
        "Máxima potencia en la línea Broen clásica"),
    size("Broen Plus 700", "Broen Plus", 1.27, BOTH, SURFACE_OR_RECESSED, "moderno", WHITE,
        "Emisores mixtos con gran versatilidad de instalación"),
    size("Broen Plus 800", "Broen Plus", 1.4, BOTH, SURFACE_OR_RECESSED, "moderno", WHITE,
        "Alto rendimiento con diseño de líneas modernas"),
    size("Broen Plus 1000", "Broen Plus", 1.65, BOTH, SURFACE_OR_RECESSED, "moderno", WHITE,
        "Máxima potencia en la línea Broen Plus"),
    size("Gamma 500", "Gamma", 0.93, COMPLEMENTARY, SURFACE, "moderno", WHITE,
        "Radiador de aluminio con alma de acero, resistente a la corrosión"),
];

/// `None` when the model is not a sized water-radiator line.
pub fn line_supports(model: &str, objective: RadiatorObjective) -> Option<bool> {
    let folded = text::fold(model);
    let sizes: Vec<&RadiatorSize> =
        RADIATOR_SIZES.iter().filter(|size| text::fold(size.line) == folded).collect();
    (!sizes.is_empty()).then(|| sizes.iter().any(|size| size.supports(objective)))
}

/// Whether the catalog model is one of the high-output lines.
pub fn is_high_output_line(model: &str) -> bool {
    let folded = text::fold(model);
    RADIATOR_SIZES
        .iter()
        .any(|size| size.coefficient >= HIGH_OUTPUT_COEFFICIENT && text::fold(size.line) == folded)
}

const HIGH_OUTPUT_COEFFICIENT: f64 = 1.25;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SizedRadiator {
    pub name: String,
    pub line: String,
    pub output_kcal_h: f64,
    pub modules: u32,
}

impl SizedRadiator {
    pub fn summary(&self) -> String {
        format!("{}: {} módulos de {:.0} kcal/h", self.name, self.modules, self.output_kcal_h)
    }
}

/// Up to three sizes for the objective and preferences, closest module
/// output to the load first. Ties keep table order.
pub fn rank_sizes(
    objective: RadiatorObjective,
    preferences: &RadiatorPreferences,
    load: HeatLoad,
) -> Result<Vec<SizedRadiator>, LoadError> {
    let target = load.to_kcal_per_hour();
    let mut matching: Vec<&RadiatorSize> = RADIATOR_SIZES
        .iter()
        .filter(|size| size.supports(objective) && size.accepts(preferences))
        .collect();
    matching.sort_by(|left, right| {
        (left.output_kcal_h() - target).abs().total_cmp(&(right.output_kcal_h() - target).abs())
    });

    matching
        .into_iter()
        .take(MAX_SIZED_OPTIONS)
        .map(|size| {
            Ok(SizedRadiator {
                name: size.name.to_owned(),
                line: size.line.to_owned(),
                output_kcal_h: size.output_kcal_h(),
                modules: heating::radiator_modules(load, size.output_kcal_h())?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{is_high_output_line, line_supports, rank_sizes, RadiatorObjective};
    use crate::heating::{HeatLoad, LoadError};
    use crate::recommend::RadiatorPreferences;

    fn names(sizes: &[super::SizedRadiator]) -> Vec<&str> {
        sizes.iter().map(|size| size.name.as_str()).collect()
    }

    #[test]
    fn objective_parses_questionnaire_labels() {
        assert_eq!(
            RadiatorObjective::parse("calefaccion complementaria"),
            Some(RadiatorObjective::Complementary)
        );
        assert_eq!(RadiatorObjective::parse("Calefacción principal"), Some(RadiatorObjective::Primary));
        assert_eq!(RadiatorObjective::parse("Secado de toallas"), None);
    }

    #[test]
    fn complementary_excludes_primary_only_lines() {
        let sizes = rank_sizes(
            RadiatorObjective::Complementary,
            &RadiatorPreferences::default(),
            HeatLoad::kcal_per_hour(150.0),
        )
        .expect("ranked");

        assert!(sizes.iter().all(|size| size.line != "Tropical"));
        assert_eq!(names(&sizes), vec!["Broen 350", "Gamma 500", "Broen 500"]);
        assert_eq!(sizes[0].modules, 2);
    }

    #[test]
    fn ranking_prefers_output_closest_to_load_and_counts_modules() {
        let sizes = rank_sizes(
            RadiatorObjective::Primary,
            &RadiatorPreferences::default(),
            HeatLoad::kcal_per_hour(1200.0),
        )
        .expect("ranked");

        assert_eq!(names(&sizes), vec!["Broen Plus 1000", "Broen Plus 800", "Broen Plus 700"]);
        let modules: Vec<u32> = sizes.iter().map(|size| size.modules).collect();
        assert_eq!(modules, vec![4, 5, 6]);
        assert_eq!(sizes[0].summary(), "Broen Plus 1000: 4 módulos de 305 kcal/h");
    }

    #[test]
    fn preferences_narrow_the_sizes() {
        let black = RadiatorPreferences { color: Some("Negro".to_owned()), ..RadiatorPreferences::default() };
        let sizes = rank_sizes(RadiatorObjective::Primary, &black, HeatLoad::watts(2000.0))
            .expect("ranked");

        assert_eq!(names(&sizes), vec!["Broen 600", "Broen 500", "Broen 350"]);

        let green = RadiatorPreferences { color: Some("verde".to_owned()), ..RadiatorPreferences::default() };
        let none = rank_sizes(RadiatorObjective::Primary, &green, HeatLoad::watts(2000.0))
            .expect("ranked");
        assert!(none.is_empty());
    }

    #[test]
    fn invalid_load_is_rejected() {
        let error = rank_sizes(
            RadiatorObjective::Primary,
            &RadiatorPreferences::default(),
            HeatLoad::kcal_per_hour(0.0),
        )
        .expect_err("zero load");

        assert!(matches!(error, LoadError::InvalidInput { field: "load", .. }));
    }

    #[test]
    fn line_lookups_follow_the_table() {
        assert_eq!(line_supports("Tropical", RadiatorObjective::Complementary), Some(false));
        assert_eq!(line_supports("broen", RadiatorObjective::Complementary), Some(true));
        assert_eq!(line_supports("Gamma", RadiatorObjective::Primary), Some(false));
        assert_eq!(line_supports("BR 500", RadiatorObjective::Primary), None);

        assert!(is_high_output_line("Broen Plus"));
        assert!(!is_high_output_line("Broen"));
        assert!(!is_high_output_line("Tropical"));
    }
}
