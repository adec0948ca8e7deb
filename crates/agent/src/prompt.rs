use serde::Serialize;
use soldy_core::recommend::POPULAR_MODELS;
use soldy_core::text;
use soldy_core::{Catalog, Product, ProductFamily};
use tera::{Context, Tera};
use thiserror::Error;

pub const MAX_CONTEXT_PRODUCTS: usize = 5;
const ANCHOR_PEERS: usize = 2;
const MAX_ADVANTAGES: usize = 3;
const TEMPLATE_NAME: &str = "system_prompt.txt";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Bucket {
    Family(ProductFamily),
    ElectricRadiators,
}

/// Checked in order; more specific buckets come first.
const KEYWORD_BUCKETS: &[(&[&str], &[Bucket])] = &[
    (&["toalla", "toallero"], &[Bucket::Family(ProductFamily::TowelWarmers)]),
    (&["electric", "enchuf"], &[Bucket::ElectricRadiators]),
    (&["radiador"], &[Bucket::Family(ProductFamily::Radiators)]),
    (&["caldera"], &[Bucket::Family(ProductFamily::Boilers)]),
    (
        &["agua caliente", "ducha", "termotanque", "calefon"],
        &[
            Bucket::Family(ProductFamily::WaterHeaters),
            Bucket::Family(ProductFamily::ThermalTanks),
        ],
    ),
    (&["calefac", "calentar", "frio", "helad"], &[Bucket::Family(ProductFamily::Boilers)]),
];

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("system prompt template failed: {0}")]
    Template(#[from] tera::Error),
    #[error("catalog excerpt could not be serialized: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Catalog products handed to the model: the anchor with its family peers,
/// else keyword-guessed families, else the popular list.
pub fn select_context<'c>(
    message: &str,
    anchor: Option<&str>,
    catalog: &'c Catalog,
) -> Vec<&'c Product> {
    let mut selected: Vec<&'c Product> = Vec::new();

    if let Some(anchor) = anchor.and_then(|model| catalog.find(model)) {
        selected.push(anchor);
        selected.extend(
            catalog
                .by_family(anchor.family)
                .into_iter()
                .filter(|peer| peer.model != anchor.model)
                .take(ANCHOR_PEERS),
        );
        return selected;
    }

    let folded = text::fold(message);
    for (keywords, buckets) in KEYWORD_BUCKETS {
        if !text::contains_any(&folded, keywords) {
            continue;
        }
        for bucket in *buckets {
            for product in bucket_products(*bucket, catalog) {
                push_unique(&mut selected, product);
            }
        }
    }

    if selected.is_empty() {
        for model in POPULAR_MODELS {
            if let Some(product) = catalog.find(model) {
                push_unique(&mut selected, product);
            }
        }
    }

    selected.truncate(MAX_CONTEXT_PRODUCTS);
    selected
}

fn bucket_products(bucket: Bucket, catalog: &Catalog) -> Vec<&Product> {
    match bucket {
        Bucket::Family(family) => catalog.by_family(family),
        Bucket::ElectricRadiators => catalog
            .by_family(ProductFamily::Radiators)
            .into_iter()
            .filter(|product| product.is_electric())
            .collect(),
    }
}

fn push_unique<'c>(selected: &mut Vec<&'c Product>, product: &'c Product) {
    if !selected.iter().any(|existing| existing.model == product.model) {
        selected.push(product);
    }
}

#[derive(Serialize)]
struct ProductExcerpt<'a> {
    modelo: &'a str,
    familia: &'static str,
    categoria: &'a str,
    descripcion: &'a str,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    ventajas: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    potencia_w: Option<u32>,
}

impl<'a> From<&'a Product> for ProductExcerpt<'a> {
    fn from(product: &'a Product) -> Self {
        let advantages = &product.advantages[..product.advantages.len().min(MAX_ADVANTAGES)];
        Self {
            modelo: &product.model,
            familia: product.family.label(),
            categoria: &product.category,
            descripcion: &product.description,
            ventajas: advantages,
            potencia_w: product.power_w,
        }
    }
}

pub struct PromptBuilder {
    tera: Tera,
}

impl PromptBuilder {
    pub fn new() -> Result<Self, PromptError> {
        let mut tera = Tera::default();
        tera.add_raw_template(TEMPLATE_NAME, include_str!("../templates/system_prompt.txt"))?;
        Ok(Self { tera })
    }

    pub fn render(
        &self,
        products: &[&Product],
        summary: &str,
        anchor: Option<&str>,
    ) -> Result<String, PromptError> {
        let excerpt: Vec<ProductExcerpt<'_>> =
            products.iter().map(|product| ProductExcerpt::from(*product)).collect();

        let mut context = Context::new();
        context.insert("catalog_json", &serde_json::to_string_pretty(&excerpt)?);
        context.insert("summary", summary);
        context.insert("anchor", &anchor.unwrap_or_default());
        Ok(self.tera.render(TEMPLATE_NAME, &context)?)
    }
}

#[cfg(test)]
mod tests {
    use soldy_core::{Catalog, ProductFamily};

    use super::{select_context, PromptBuilder, MAX_CONTEXT_PRODUCTS};
    use crate::test_support::catalog;

    fn models<'a>(products: &[&'a soldy_core::Product]) -> Vec<&'a str> {
        products.iter().map(|product| product.model.as_str()).collect()
    }

    #[test]
    fn anchor_comes_first_with_two_peers() {
        let catalog = catalog();
        let selected = select_context("¿y esa cuánto rinde?", Some("Diva DS"), &catalog);

        assert_eq!(models(&selected), vec!["Diva DS", "Prima Tec Smart", "Prima Tec"]);
    }

    #[test]
    fn anchor_excludes_keyword_families() {
        let catalog = catalog();
        let selected = select_context("¿y si quiero un radiador?", Some("Diva DS"), &catalog);

        assert_eq!(models(&selected), vec!["Diva DS", "Prima Tec Smart", "Prima Tec"]);
        assert!(selected.iter().all(|product| product.family == ProductFamily::Boilers));
    }

    #[test]
    fn unknown_anchor_falls_back_to_keywords() {
        let catalog = catalog();
        let selected = select_context("un radiador", Some("Modelo Inexistente"), &catalog);

        assert!(!selected.is_empty());
        assert!(selected.iter().all(|product| product.family == ProductFamily::Radiators));
    }

    #[test]
    fn keyword_guess_selects_families() {
        let catalog = catalog();

        let towels = select_context("Quiero secar toallas en el baño", None, &catalog);
        assert!(towels.iter().all(|product| product.family == ProductFamily::TowelWarmers));
        assert_eq!(towels.len(), MAX_CONTEXT_PRODUCTS);

        let electric = select_context("un radiador eléctrico para el cuarto", None, &catalog);
        assert_eq!(electric[0].model, "Radiador Eléctrico Broen E Smart con Wifi");
        assert!(electric[..3].iter().all(|product| product.is_electric()));

        let water = select_context("necesito agua caliente", None, &catalog);
        assert_eq!(models(&water), vec![
            "Digital 14 TBF",
            "Acqua",
            "Termotanque Eléctrico Digital",
            "Termotanque Eléctrico Analógico",
            "Termotanque solar presurizado",
        ]);
    }

    #[test]
    fn falls_back_to_popular_models() {
        let catalog = catalog();
        let selected = select_context("hola", None, &catalog);

        assert_eq!(
            models(&selected),
            vec!["Prima Tec Smart", "Radiador Eléctrico Broen E", "Diva DS"]
        );
        assert!(select_context("hola", None, &Catalog::empty()).is_empty());
    }

    #[test]
    fn renders_rules_catalog_summary_and_anchor() {
        let catalog = catalog();
        let products = select_context("caldera", None, &catalog);
        let builder = PromptBuilder::new().expect("template");

        let prompt = builder
            .render(&products, "necesidades: frío", Some("Prima Tec Smart"))
            .expect("render");

        assert!(prompt.starts_with("Sos Soldy"));
        assert!(prompt.contains("¿estás en Río Grande o Ushuaia?"));
        assert!(prompt.contains("\"modelo\": \"Diva DS\""));
        assert!(prompt.contains("Resumen de la conversación: necesidades: frío"));
        assert!(prompt.contains("viene hablando de Prima Tec Smart"));

        assert!(!prompt.contains("potencia_w"));

        let towels = select_context("toallero", None, &catalog);
        let towel_prompt = builder.render(&towels, "", None).expect("render");
        assert!(towel_prompt.contains("\"potencia_w\": 632"));

        let bare = builder.render(&products, "", None).expect("render");
        assert!(!bare.contains("Resumen de la conversación"));
        assert!(!bare.contains("viene hablando"));
    }
}
