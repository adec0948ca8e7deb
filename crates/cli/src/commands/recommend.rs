use soldy_core::config::{AppConfig, LoadOptions};
use soldy_core::{Catalog, Recommendation, RecommendationRequest, Recommender};

use crate::commands::{CommandResult, EXIT_CATALOG, EXIT_CONFIG, EXIT_INVALID_INPUT, EXIT_NOT_READY};

pub fn run(raw_request: &str, options: bool) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "recommend",
                "config_validation",
                error.to_string(),
                EXIT_CONFIG,
            )
        }
    };

    let request: RecommendationRequest = match serde_json::from_str(raw_request) {
        Ok(request) => request,
        Err(error) => {
            return CommandResult::failure(
                "recommend",
                "invalid_request",
                format!("could not parse recommendation request: {error}"),
                EXIT_INVALID_INPUT,
            )
        }
    };

    let catalog = match Catalog::load(&config.catalog.path) {
        Ok(catalog) => catalog,
        Err(error) => {
            return CommandResult::failure(
                "recommend",
                "catalog_unavailable",
                error.to_string(),
                EXIT_CATALOG,
            )
        }
    };

    let recommender = Recommender::new(&catalog);
    let picks: Vec<Recommendation> = if options {
        recommender.recommend_options(&request)
    } else {
        recommender.recommend(&request).into_iter().collect()
    };
    if picks.is_empty() {
        return CommandResult::failure(
            "recommend",
            "no_recommendation",
            "the catalog has no product for this request",
            EXIT_NOT_READY,
        );
    }

    let lines: Vec<String> = picks.iter().map(render_pick).collect();
    CommandResult::success("recommend", lines.join("\n"))
}

fn render_pick(pick: &Recommendation) -> String {
    let fallback = serde_json::to_value(pick.fallback)
        .ok()
        .and_then(|value| value.as_str().map(str::to_owned))
        .unwrap_or_default();
    format!("- {} [{}] tier: {}, via: {fallback}", pick.product.model, pick.product.family, pick.tier)
}
