use soldy_core::text;
use soldy_core::{Catalog, Product};

pub const MAX_MENTIONS: usize = 3;

pub const RECOMMENDATION_MARKERS: [&str; 6] =
    ["te recomiendo", "te sugiero", "recomiendo", "recomendamos", "i recommend", "i suggest"];

pub fn has_recommendation_marker(reply: &str) -> bool {
    let folded = text::fold(reply);
    RECOMMENDATION_MARKERS.iter().any(|marker| folded.contains(marker))
}

/// Products the reply explicitly recommends, in order of appearance. Empty
/// unless the reply contains a recommendation marker.
pub fn detect_mentioned<'c>(reply: &str, catalog: &'c Catalog) -> Vec<&'c Product> {
    if !has_recommendation_marker(reply) {
        return Vec::new();
    }
    let mut found = find_models(reply, catalog);
    found.truncate(MAX_MENTIONS);
    found
}

/// Every catalog model named literally in `content`, in order of appearance.
/// Longer names are matched first and a shorter name occurring inside an
/// already matched span is not counted.
pub fn find_models<'c>(content: &str, catalog: &'c Catalog) -> Vec<&'c Product> {
    let folded = text::fold(content);
    let mut candidates: Vec<(&'c Product, String)> = catalog
        .products()
        .iter()
        .map(|product| (product, text::fold(&product.model)))
        .filter(|(_, model)| !model.is_empty())
        .collect();
    candidates.sort_by(|left, right| right.1.chars().count().cmp(&left.1.chars().count()));

    let mut accepted: Vec<(usize, usize, &'c Product)> = Vec::new();
    for (product, model) in candidates {
        let hit = text::find_all(&folded, &model).into_iter().find(|start| {
            let end = start + model.len();
            is_boundary(&folded, *start, end)
                && !accepted.iter().any(|(taken_start, taken_end, _)| {
                    *start < *taken_end && end > *taken_start
                })
        });
        if let Some(start) = hit {
            accepted.push((start, start + model.len(), product));
        }
    }

    accepted.sort_by_key(|(start, _, _)| *start);
    accepted.into_iter().map(|(_, _, product)| product).collect()
}

fn is_boundary(folded: &str, start: usize, end: usize) -> bool {
    let before = folded[..start].chars().next_back();
    let after = folded[end..].chars().next();
    !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
}

#[cfg(test)]
mod tests {
    use super::{detect_mentioned, find_models, has_recommendation_marker, MAX_MENTIONS};
    use crate::test_support::catalog;

    fn models(products: Vec<&soldy_core::Product>) -> Vec<&str> {
        products.into_iter().map(|product| product.model.as_str()).collect()
    }

    #[test]
    fn no_marker_means_no_mentions() {
        let catalog = catalog();
        let reply = "La Prima Tec Smart es una caldera doble servicio.";

        assert!(!has_recommendation_marker(reply));
        assert!(detect_mentioned(reply, &catalog).is_empty());
    }

    #[test]
    fn contained_names_are_not_double_counted() {
        let catalog = catalog();
        let reply = "Te recomiendo el Radiador Eléctrico Broen E para el dormitorio.";

        let found = models(detect_mentioned(reply, &catalog));
        assert_eq!(found, vec!["Radiador Eléctrico Broen E"]);
    }

    #[test]
    fn longer_name_wins_over_prefix() {
        let catalog = catalog();
        let reply = "Te sugiero Broen Plus, o si no Broen.";

        let found = models(detect_mentioned(reply, &catalog));
        assert_eq!(found, vec!["Broen Plus", "Broen"]);
    }

    #[test]
    fn mentions_are_capped_and_ordered_by_position() {
        let catalog = catalog();
        let reply = "Recomendamos Diva C, Magna, XP y Optima Condens según la potencia.";

        let found = models(detect_mentioned(reply, &catalog));
        assert_eq!(found.len(), MAX_MENTIONS);
        assert_eq!(found, vec!["Diva C", "Magna", "XP"]);
    }

    #[test]
    fn short_models_require_word_boundaries() {
        let catalog = catalog();
        let found = models(find_models("Tenemos mucha experiencia con calderas CM.", &catalog));

        assert_eq!(found, vec!["CM"]);
    }
}
