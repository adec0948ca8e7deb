//! Tiered product selection over the catalog.
//!
//! Every request resolves to a tier (label, flagship model, candidate
//! predicate) inside a broader family set. Selection walks a fixed fallback
//! chain so a recommendation degrades gracefully when the catalog changes.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::catalog::Catalog;
use crate::domain::product::{Product, ProductFamily};
use crate::heating::HeatLoad;
use crate::radiators::{self, RadiatorObjective};
use crate::text;

pub const POPULAR_MODELS: [&str; 3] = ["Prima Tec Smart", "Radiador Eléctrico Broen E", "Diva DS"];

pub const MAX_OPTIONS: usize = 3;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RadiatorPreferences {
    pub color: Option<String>,
    pub style: Option<String>,
    pub installation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub objective: Option<RadiatorObjective>,
}

impl RadiatorPreferences {
    pub fn is_empty(&self) -> bool {
        self.color.is_none()
            && self.style.is_none()
            && self.installation.is_none()
            && self.objective.is_none()
    }

    /// Color, style and installation check; unset preferences accept anything.
    pub(crate) fn matches<'v>(
        &self,
        mut colors: impl Iterator<Item = &'v str>,
        style: Option<&str>,
        mut installation: impl Iterator<Item = &'v str>,
    ) -> bool {
        let same = |left: &str, right: &str| text::fold(left) == text::fold(right);
        let color_ok =
            self.color.as_deref().map_or(true, |wanted| colors.any(|color| same(color, wanted)));
        let style_ok = self
            .style
            .as_deref()
            .map_or(true, |wanted| style.is_some_and(|style| same(style, wanted)));
        let installation_ok = self
            .installation
            .as_deref()
            .map_or(true, |wanted| installation.any(|kind| same(kind, wanted)));
        color_ok && style_ok && installation_ok
    }

    fn accepts(&self, product: &Product) -> bool {
        let objective_ok = self.objective.map_or(true, |objective| {
            radiators::line_supports(&product.model, objective).unwrap_or(true)
        });
        objective_ok
            && self.matches(
                product.colors.iter().map(String::as_str),
                product.style.as_deref(),
                product.installation.iter().map(String::as_str),
            )
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecommendationRequest {
    Radiators {
        load: HeatLoad,
        #[serde(default)]
        preferences: RadiatorPreferences,
    },
    TowelWarmer,
    BoilerByArea {
        area_m2: f64,
    },
    BoilerByPower {
        required: HeatLoad,
        hot_water: bool,
    },
    FloorHeating {
        area_m2: f64,
    },
}

/// Which step of the fallback chain produced the product.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackLevel {
    Flagship,
    TierCandidate,
    FamilyFallback,
    PopularFallback,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub product: Product,
    pub tier: String,
    pub fallback: FallbackLevel,
}

struct Tier {
    label: &'static str,
    flagship: &'static str,
    candidate: fn(&Product) -> bool,
}

struct Selection {
    family: fn(&Product) -> bool,
    tier: Tier,
    preferences: Option<RadiatorPreferences>,
}

fn is_boiler(product: &Product) -> bool {
    product.family == ProductFamily::Boilers
}

fn is_radiator(product: &Product) -> bool {
    product.family == ProductFamily::Radiators
}

fn is_towel_warmer(product: &Product) -> bool {
    product.family == ProductFamily::TowelWarmers
}

fn is_electric_radiator(product: &Product) -> bool {
    is_radiator(product) && product.is_electric()
}

fn is_water_radiator(product: &Product) -> bool {
    is_radiator(product) && !product.is_electric()
}

fn is_high_output_radiator(product: &Product) -> bool {
    is_water_radiator(product) && radiators::is_high_output_line(&product.model)
}

fn is_standard_radiator(product: &Product) -> bool {
    is_water_radiator(product) && !radiators::is_high_output_line(&product.model)
}

fn is_electric_towel_warmer(product: &Product) -> bool {
    is_towel_warmer(product) && product.is_electric()
}

fn is_wall_boiler(product: &Product) -> bool {
    is_boiler(product) && !product.is_electric() && text::fold(&product.category).contains("mural")
}

fn is_central_boiler(product: &Product) -> bool {
    is_boiler(product) && text::fold(&product.category).contains("potencia")
}

fn is_dual_purpose_boiler(product: &Product) -> bool {
    is_boiler(product) && product.supplies_hot_water()
}

fn is_heating_only_boiler(product: &Product) -> bool {
    is_boiler(product) && !product.supplies_hot_water()
}

fn is_dual_purpose_wall_boiler(product: &Product) -> bool {
    is_wall_boiler(product) && product.supplies_hot_water()
}

fn kcal(load: HeatLoad) -> f64 {
    load.to_kcal_per_hour()
}

fn selection_for(request: &RecommendationRequest) -> Selection {
    match request {
        RecommendationRequest::Radiators { load, preferences } => {
            let kcal_h = kcal(*load);
            let tier = if kcal_h < 1500.0 {
                Tier {
                    label: "radiadores eléctricos",
                    flagship: "Radiador Eléctrico Broen E",
                    candidate: is_electric_radiator,
                }
            } else if kcal_h < 3000.0 {
                Tier {
                    label: "radiadores por agua",
                    flagship: "Broen",
                    candidate: is_standard_radiator,
                }
            } else {
                Tier {
                    label: "radiadores de alto rendimiento",
                    flagship: "Broen Plus",
                    candidate: is_high_output_radiator,
                }
            };
            Selection { family: is_radiator, tier, preferences: Some(preferences.clone()) }
        }
        RecommendationRequest::TowelWarmer => Selection {
            family: is_towel_warmer,
            tier: Tier {
                label: "toalleros eléctricos",
                flagship: "Scala E",
                candidate: is_electric_towel_warmer,
            },
            preferences: None,
        },
        RecommendationRequest::BoilerByArea { area_m2 } => {
            let tier = if *area_m2 < 80.0 {
                Tier {
                    label: "caldera mural de calefacción",
                    flagship: "Diva C",
                    candidate: is_wall_boiler,
                }
            } else if *area_m2 < 150.0 {
                Tier {
                    label: "caldera doble servicio",
                    flagship: "Prima Tec Smart",
                    candidate: is_dual_purpose_wall_boiler,
                }
            } else {
                Tier {
                    label: "caldera central de potencia",
                    flagship: "Optima Condens",
                    candidate: is_central_boiler,
                }
            };
            Selection { family: is_boiler, tier, preferences: None }
        }
        RecommendationRequest::BoilerByPower { required, hot_water } => {
            let kcal_h = kcal(*required);
            let tier = match (*hot_water, kcal_h) {
                (true, power) if power < 25_000.0 => Tier {
                    label: "caldera doble servicio chica",
                    flagship: "Diva DS",
                    candidate: is_dual_purpose_boiler,
                },
                (true, power) if power < 35_000.0 => Tier {
                    label: "caldera doble servicio mediana",
                    flagship: "Prima Tec Smart",
                    candidate: is_dual_purpose_boiler,
                },
                (true, _) => Tier {
                    label: "caldera doble servicio grande",
                    flagship: "Summa Condens",
                    candidate: is_dual_purpose_boiler,
                },
                (false, power) if power < 30_000.0 => Tier {
                    label: "caldera de calefacción chica",
                    flagship: "Diva C",
                    candidate: is_wall_boiler,
                },
                (false, power) if power < 100_000.0 => Tier {
                    label: "caldera de calefacción mediana",
                    flagship: "Magna",
                    candidate: is_central_boiler,
                },
                (false, _) => Tier {
                    label: "caldera de calefacción grande",
                    flagship: "XP",
                    candidate: is_central_boiler,
                },
            };
            let family: fn(&Product) -> bool =
                if *hot_water { is_dual_purpose_boiler } else { is_heating_only_boiler };
            Selection { family, tier, preferences: None }
        }
        RecommendationRequest::FloorHeating { area_m2 } => {
            let tier = if *area_m2 < 100.0 {
                Tier {
                    label: "caldera doble servicio chica",
                    flagship: "Prima Tec Smart",
                    candidate: is_dual_purpose_boiler,
                }
            } else if *area_m2 < 200.0 {
                Tier {
                    label: "caldera doble servicio mediana",
                    flagship: "Summa Condens",
                    candidate: is_dual_purpose_boiler,
                }
            } else {
                Tier {
                    label: "caldera de condensación grande",
                    flagship: "Optima Condens",
                    candidate: is_dual_purpose_boiler,
                }
            };
            Selection { family: is_dual_purpose_boiler, tier, preferences: None }
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Recommender<'a> {
    catalog: &'a Catalog,
}

impl<'a> Recommender<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        Self { catalog }
    }

    pub fn recommend(&self, request: &RecommendationRequest) -> Option<Recommendation> {
        let selection = selection_for(request);
        let family_set = self.family_set(&selection);
        let candidates: Vec<&Product> =
            family_set.iter().copied().filter(|product| (selection.tier.candidate)(product)).collect();

        let chosen = candidates
            .iter()
            .find(|product| product.model == selection.tier.flagship)
            .map(|product| (*product, FallbackLevel::Flagship))
            .or_else(|| candidates.first().map(|product| (*product, FallbackLevel::TierCandidate)))
            .or_else(|| family_set.first().map(|product| (*product, FallbackLevel::FamilyFallback)))
            .or_else(|| self.popular().map(|product| (product, FallbackLevel::PopularFallback)));

        match chosen {
            Some((product, fallback)) => {
                debug!(
                    event_name = "domain.recommend.selected",
                    tier = selection.tier.label,
                    model = %product.model,
                    fallback = ?fallback,
                    "recommendation selected"
                );
                Some(Recommendation {
                    product: product.clone(),
                    tier: selection.tier.label.to_owned(),
                    fallback,
                })
            }
            None => {
                warn!(
                    event_name = "domain.recommend.empty",
                    tier = selection.tier.label,
                    "no product available for recommendation"
                );
                None
            }
        }
    }

    /// Up to three products for the same request: the primary pick followed by
    /// the remaining tier candidates, then the rest of the family set.
    pub fn recommend_options(&self, request: &RecommendationRequest) -> Vec<Recommendation> {
        let Some(primary) = self.recommend(request) else {
            return Vec::new();
        };
        let selection = selection_for(request);
        let family_set = self.family_set(&selection);
        let tier_label = primary.tier.clone();

        let mut options = vec![primary];
        let extras = family_set
            .iter()
            .filter(|product| (selection.tier.candidate)(product))
            .map(|product| (*product, FallbackLevel::TierCandidate))
            .chain(family_set.iter().map(|product| (*product, FallbackLevel::FamilyFallback)));
        for (product, fallback) in extras {
            if options.len() >= MAX_OPTIONS {
                break;
            }
            if options.iter().any(|option| option.product.model == product.model) {
                continue;
            }
            options.push(Recommendation {
                product: product.clone(),
                tier: tier_label.clone(),
                fallback,
            });
        }
        options
    }

    fn family_set(&self, selection: &Selection) -> Vec<&'a Product> {
        let family: Vec<&'a Product> =
            self.catalog.products().iter().filter(|product| (selection.family)(product)).collect();
        match &selection.preferences {
            Some(preferences) if !preferences.is_empty() => {
                let filtered: Vec<&'a Product> =
                    family.iter().copied().filter(|product| preferences.accepts(product)).collect();
                if filtered.is_empty() {
                    family
                } else {
                    filtered
                }
            }
            _ => family,
        }
    }

    fn popular(&self) -> Option<&'a Product> {
        POPULAR_MODELS.iter().find_map(|model| self.catalog.find(model))
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::{
        FallbackLevel, RadiatorPreferences, RecommendationRequest, Recommender, MAX_OPTIONS,
        POPULAR_MODELS,
    };
    use crate::catalog::{fixtures, Catalog};
    use crate::heating::HeatLoad;
    use crate::radiators::RadiatorObjective;

    fn model_for(catalog: &Catalog, request: RecommendationRequest) -> String {
        Recommender::new(catalog).recommend(&request).expect("recommendation").product.model
    }

    fn radiators(kcal_h: f64) -> RecommendationRequest {
        RecommendationRequest::Radiators {
            load: HeatLoad::kcal_per_hour(kcal_h),
            preferences: RadiatorPreferences::default(),
        }
    }

    #[test]
    fn radiator_tiers_switch_on_inclusive_lower_bounds() {
        let catalog = fixtures::catalog();

        assert_eq!(model_for(&catalog, radiators(1499.0)), "Radiador Eléctrico Broen E");
        assert_eq!(model_for(&catalog, radiators(1500.0)), "Broen");
        assert_eq!(model_for(&catalog, radiators(2999.0)), "Broen");
        assert_eq!(model_for(&catalog, radiators(3000.0)), "Broen Plus");
    }

    #[test]
    fn radiator_load_in_watts_is_converted_before_tiering() {
        let catalog = fixtures::catalog();
        let request = RecommendationRequest::Radiators {
            load: HeatLoad::watts(2000.0),
            preferences: RadiatorPreferences::default(),
        };

        assert_eq!(model_for(&catalog, request), "Broen");
    }

    #[test]
    fn boiler_tiers_follow_area_and_power() {
        let catalog = fixtures::catalog();

        assert_eq!(model_for(&catalog, RecommendationRequest::BoilerByArea { area_m2: 60.0 }), "Diva C");
        assert_eq!(
            model_for(&catalog, RecommendationRequest::BoilerByArea { area_m2: 80.0 }),
            "Prima Tec Smart"
        );
        assert_eq!(
            model_for(&catalog, RecommendationRequest::BoilerByArea { area_m2: 150.0 }),
            "Optima Condens"
        );

        let by_power = |kcal_h: f64, hot_water: bool| {
            model_for(
                &catalog,
                RecommendationRequest::BoilerByPower {
                    required: HeatLoad::kcal_per_hour(kcal_h),
                    hot_water,
                },
            )
        };
        assert_eq!(by_power(24_000.0, true), "Diva DS");
        assert_eq!(by_power(25_000.0, true), "Prima Tec Smart");
        assert_eq!(by_power(35_000.0, true), "Summa Condens");
        assert_eq!(by_power(29_999.0, false), "Diva C");
    }

    #[test]
    fn heating_only_path_never_picks_hot_water_boilers() {
        let catalog = fixtures::catalog();
        let recommender = Recommender::new(&catalog);

        for kcal_h in [12_000.0, 30_000.0, 100_000.0, 250_000.0] {
            let request = RecommendationRequest::BoilerByPower {
                required: HeatLoad::kcal_per_hour(kcal_h),
                hot_water: false,
            };
            let picked = recommender.recommend(&request).expect("heating-only boiler");
            assert!(!picked.product.supplies_hot_water(), "{kcal_h}: {}", picked.product.model);
            for option in recommender.recommend_options(&request) {
                assert!(!option.product.supplies_hot_water(), "{}", option.product.model);
            }
        }

        let central = Catalog::from_json(
            Path::new("inline.json"),
            r#"[{"model":"Diva C","family":"Calderas","category":"Caldera mural","description":"Caldera para Calefacción","url":"u"},
                {"model":"Magna","family":"Calderas","category":"Caldera de potencia","description":"Caldera para calefacción","url":"u"},
                {"model":"XP","family":"Calderas","category":"Caldera de potencia","description":"Caldera para calefacción","url":"u"},
                {"model":"Magna ACS","family":"Calderas","category":"Caldera de potencia","description":"Caldera para calefacción y agua caliente","url":"u"}]"#,
        )
        .expect("inline catalog");
        let by_power = |kcal_h: f64| {
            model_for(
                &central,
                RecommendationRequest::BoilerByPower {
                    required: HeatLoad::kcal_per_hour(kcal_h),
                    hot_water: false,
                },
            )
        };
        assert_eq!(by_power(29_999.0), "Diva C");
        assert_eq!(by_power(30_000.0), "Magna");
        assert_eq!(by_power(100_000.0), "XP");
    }

    #[test]
    fn floor_heating_always_picks_dual_purpose_boiler() {
        let catalog = fixtures::catalog();

        for (area, expected) in
            [(50.0, "Prima Tec Smart"), (100.0, "Summa Condens"), (250.0, "Optima Condens")]
        {
            let recommendation = Recommender::new(&catalog)
                .recommend(&RecommendationRequest::FloorHeating { area_m2: area })
                .expect("floor heating recommendation");
            assert_eq!(recommendation.product.model, expected);
            assert!(recommendation.product.supplies_hot_water());
            assert_eq!(recommendation.fallback, FallbackLevel::Flagship);
        }
    }

    #[test]
    fn towel_warmer_prefers_electric_flagship() {
        let catalog = fixtures::catalog();
        assert_eq!(model_for(&catalog, RecommendationRequest::TowelWarmer), "Scala E");
    }

    #[test]
    fn preferences_filter_and_fall_back_when_empty() {
        let catalog = fixtures::catalog();
        let black = RecommendationRequest::Radiators {
            load: HeatLoad::kcal_per_hour(3500.0),
            preferences: RadiatorPreferences {
                color: Some("Negro".to_owned()),
                ..RadiatorPreferences::default()
            },
        };
        let recommendation =
            Recommender::new(&catalog).recommend(&black).expect("black radiator");
        assert_eq!(recommendation.product.model, "Broen");
        assert_eq!(recommendation.fallback, FallbackLevel::FamilyFallback);

        let impossible = RecommendationRequest::Radiators {
            load: HeatLoad::kcal_per_hour(3500.0),
            preferences: RadiatorPreferences {
                color: Some("verde".to_owned()),
                ..RadiatorPreferences::default()
            },
        };
        assert_eq!(model_for(&catalog, impossible), "Broen Plus");
    }

    #[test]
    fn standard_and_high_output_tiers_do_not_share_candidates() {
        let without_plus = Catalog::from_json(
            Path::new("inline.json"),
            r#"[{"model":"Broen","family":"Radiadores","category":"Radiadores","description":"x","url":"u"},
                {"model":"Tropical","family":"Radiadores","category":"Radiadores","description":"x","url":"u"}]"#,
        )
        .expect("inline catalog");
        let recommender = Recommender::new(&without_plus);

        let standard = recommender.recommend(&radiators(2000.0)).expect("standard");
        assert_eq!(standard.fallback, FallbackLevel::Flagship);
        let high = recommender.recommend(&radiators(3500.0)).expect("high output");
        assert_eq!(high.fallback, FallbackLevel::FamilyFallback);

        let catalog = fixtures::catalog();
        let options = Recommender::new(&catalog).recommend_options(&radiators(2000.0));
        assert!(options
            .iter()
            .filter(|option| option.fallback == FallbackLevel::TierCandidate)
            .all(|option| option.product.model != "Broen Plus"));
    }

    #[test]
    fn complementary_objective_skips_primary_only_lines() {
        let catalog = fixtures::catalog();
        let complementary = RecommendationRequest::Radiators {
            load: HeatLoad::kcal_per_hour(2000.0),
            preferences: RadiatorPreferences {
                style: Some("Clásico".to_owned()),
                objective: Some(RadiatorObjective::Complementary),
                ..RadiatorPreferences::default()
            },
        };

        let options = Recommender::new(&catalog).recommend_options(&complementary);
        assert!(!options.is_empty());
        assert!(options.iter().all(|option| option.product.model != "Tropical"));
        assert_eq!(options[0].product.model, "BR 500");
    }

    #[test]
    fn popular_list_resolves_against_bundled_catalog() {
        let catalog = fixtures::catalog();
        assert!(POPULAR_MODELS.iter().all(|model| catalog.find(model).is_some()));
    }

    #[test]
    fn fallback_chain_reaches_family_then_popular_then_none() {
        let only_gamma = Catalog::from_json(
            Path::new("inline.json"),
            r#"[{"model":"Gamma","family":"Radiadores","category":"Radiadores","description":"x","url":"u"},
                {"model":"Prima Tec Smart","family":"Calderas","category":"Caldera Mural","description":"Caldera doble servicio","url":"u"}]"#,
        )
        .expect("inline catalog");
        let recommender = Recommender::new(&only_gamma);

        let electric = recommender.recommend(&radiators(500.0)).expect("family fallback");
        assert_eq!(electric.product.model, "Gamma");
        assert_eq!(electric.fallback, FallbackLevel::FamilyFallback);

        let towel = recommender.recommend(&RecommendationRequest::TowelWarmer).expect("popular");
        assert_eq!(towel.product.model, "Prima Tec Smart");
        assert_eq!(towel.fallback, FallbackLevel::PopularFallback);

        assert!(Recommender::new(&Catalog::empty())
            .recommend(&RecommendationRequest::TowelWarmer)
            .is_none());
    }

    #[test]
    fn options_start_with_primary_and_are_distinct() {
        let catalog = fixtures::catalog();
        let options = Recommender::new(&catalog).recommend_options(&radiators(2000.0));

        assert_eq!(options.len(), MAX_OPTIONS);
        assert_eq!(options[0].product.model, "Broen");
        let mut models: Vec<&str> = options.iter().map(|o| o.product.model.as_str()).collect();
        models.dedup();
        assert_eq!(models.len(), MAX_OPTIONS);
    }
}
