use soldy_core::text;
use soldy_core::Catalog;

use crate::conversation::{ConversationTurn, Role};
use crate::mentions::find_models;

const NEEDS: &[(&[&str], &str)] = &[
    (&["frio", "helad"], "frío"),
    (&["calefac", "calentar", "calefaccionar"], "calefacción"),
    (&["agua caliente", "ducha"], "agua caliente"),
];

const SITUATIONS: &[(&[&str], &str)] = &[
    (&["casa", "vivienda"], "casa"),
    (&["departamento", "depto"], "departamento"),
    (&["familia", "hijos", "chicos"], "familia"),
    (&["oficina", "local"], "oficina"),
];

const TOPICS: &[(&[&str], &str)] = &[
    (&["caldera"], "calderas"),
    (&["radiador"], "radiadores"),
    (&["electric"], "eléctricos"),
    (&["medida", "dimension", "tamano"], "medidas"),
];

const SURFACE_UNITS: &[&str] = &["m2", "m²", "mts", "metros"];

/// Keyword summary of a conversation. Rebuilt from scratch on every call.
pub fn summarize<'a>(
    turns: impl IntoIterator<Item = &'a ConversationTurn>,
    catalog: &Catalog,
) -> String {
    let mut needs = Vec::new();
    let mut situation = Vec::new();
    let mut topics = Vec::new();
    let mut models: Vec<String> = Vec::new();

    for turn in turns {
        match turn.role {
            Role::User => {
                let folded = text::fold(&turn.content);
                collect_substrings(&folded, NEEDS, &mut needs);
                collect_words(&folded, SITUATIONS, &mut situation);
                if let Some(surface) = declared_surface(&folded) {
                    push_unique(&mut situation, surface);
                }
                collect_substrings(&folded, TOPICS, &mut topics);
            }
            Role::Assistant => {
                for product in find_models(&turn.content, catalog) {
                    push_unique(&mut models, product.model.clone());
                }
            }
            Role::System => {}
        }
    }

    [
        ("necesidades", needs),
        ("situación", situation),
        ("temas", topics),
        ("productos mencionados", models),
    ]
    .into_iter()
    .filter(|(_, values)| !values.is_empty())
    .map(|(label, values)| format!("{label}: {}", values.join(", ")))
    .collect::<Vec<_>>()
    .join("; ")
}

fn push_unique(values: &mut Vec<String>, value: String) {
    if !values.contains(&value) {
        values.push(value);
    }
}

fn collect_substrings(folded: &str, table: &[(&[&str], &str)], out: &mut Vec<String>) {
    for (needles, label) in table {
        if text::contains_any(folded, needles) {
            push_unique(out, (*label).to_owned());
        }
    }
}

fn collect_words(folded: &str, table: &[(&[&str], &str)], out: &mut Vec<String>) {
    for (words, label) in table {
        if words.iter().any(|word| text::contains_word(folded, word)) {
            push_unique(out, (*label).to_owned());
        }
    }
}

/// Finds "80 m²", "80m2" or "80 metros" in folded text.
fn declared_surface(folded: &str) -> Option<String> {
    let tokens = text::tokenize(folded);
    for (index, token) in tokens.iter().enumerate() {
        if let Some(number) = SURFACE_UNITS.iter().find_map(|unit| token.strip_suffix(unit)) {
            if !number.is_empty() && number.chars().all(|ch| ch.is_ascii_digit()) {
                return Some(format!("{number} m²"));
            }
        }
        if token.chars().all(|ch| ch.is_ascii_digit()) {
            let unit = tokens.get(index + 1).map(String::as_str);
            if unit.is_some_and(|unit| SURFACE_UNITS.contains(&unit)) {
                return Some(format!("{token} m²"));
            }
        }
    }
    None
}
