//! Cleanup applied to every generated reply before it reaches the widget:
//! markup stripping, brevity, brand terminology and price sanitizing, in
//! that order.

use std::sync::LazyLock;

use regex::Regex;

pub const PRICE_PLACEHOLDER: &str = "precio a consultar";

const TERMINOLOGY: &[(&str, &str)] = &[
    ("sucursales de PEISA", "sucursales de SOLDASUR"),
    ("sucursal de PEISA", "sucursal de SOLDASUR"),
    ("locales de PEISA", "locales de SOLDASUR"),
    ("tiendas de PEISA", "tiendas de SOLDASUR"),
    ("tienda de PEISA", "tienda de SOLDASUR"),
    ("tienda PEISA", "tienda SOLDASUR"),
    ("visitar PEISA", "visitar SOLDASUR"),
    ("visitá PEISA", "visitá SOLDASUR"),
    ("comprar en PEISA", "comprar en SOLDASUR"),
    ("contactar a PEISA", "contactar a SOLDASUR"),
    ("PEISA's store", "SOLDASUR's store"),
    ("PEISA store", "SOLDASUR store"),
];

/// Only real tags: a `<` followed by a letter or `/`. Comparisons such as
/// "cargas < 1500" survive.
static HTML_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"</?[A-Za-z][^<>]*>").expect("tag pattern compiles"));

static CODE_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*```[^\n]*\n?").expect("fence pattern compiles"));

static HEADER_MARK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*#+[ \t]*").expect("header pattern compiles"));

static EMPHASIS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*|__|[*`]").expect("emphasis pattern compiles"));

/// "$ 1.234,56", "$1500", "USD 300", "1500 pesos". Bare numbers and
/// technical units do not match.
static CURRENCY_AMOUNT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:\$|\b(?:us\$|u\$s|usd|ars))\s*\d(?:[\d.,]*\d)?|\b\d(?:[\d.,]*\d)?\s*(?:pesos?|d[oó]lares|usd|ars)\b",
    )
    .expect("currency pattern compiles")
});

static TERMINOLOGY_RULES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    TERMINOLOGY
        .iter()
        .map(|(wrong, right)| {
            let pattern = format!("(?i){}", regex::escape(wrong));
            (Regex::new(&pattern).expect("terminology pattern compiles"), *right)
        })
        .collect()
});

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PostProcessor {
    max_words: usize,
}

impl PostProcessor {
    pub fn new(max_words: usize) -> Self {
        Self { max_words }
    }

    pub fn process(&self, raw: &str) -> String {
        let stripped = strip_markup(raw);
        let brief = enforce_brevity(&stripped, self.max_words);
        let branded = correct_terminology(&brief);
        sanitize_prices(&branded)
    }
}

pub fn strip_markup(input: &str) -> String {
    let without_tags = HTML_TAG.replace_all(input, " ");
    let without_fences = CODE_FENCE.replace_all(&without_tags, "");
    let without_headers = HEADER_MARK.replace_all(&without_fences, "");
    EMPHASIS.replace_all(&without_headers, "").into_owned()
}

/// Collapses whitespace and keeps the reply under `max_words`, preferring
/// whole sentences.
pub fn enforce_brevity(input: &str, max_words: usize) -> String {
    let words: Vec<&str> = input.split_whitespace().collect();
    if words.is_empty() {
        return String::new();
    }
    if words.len() <= max_words {
        return ensure_terminal_punctuation(&words.join(" "));
    }

    let collapsed = words.join(" ");
    let mut kept = String::new();
    let mut kept_words = 0;
    for sentence in split_sentences(&collapsed) {
        let count = sentence.split_whitespace().count();
        if kept_words + count > max_words {
            break;
        }
        if !kept.is_empty() {
            kept.push(' ');
        }
        kept.push_str(sentence);
        kept_words += count;
    }

    if kept.is_empty() {
        kept = words[..max_words].join(" ");
    }
    ensure_terminal_punctuation(&kept)
}

fn split_sentences(input: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = input.char_indices().peekable();
    while let Some((index, ch)) = chars.next() {
        if matches!(ch, '.' | '!' | '?') {
            let next_is_space = chars.peek().map_or(true, |(_, next)| next.is_whitespace());
            if next_is_space {
                let end = index + ch.len_utf8();
                let sentence = input[start..end].trim();
                if !sentence.is_empty() {
                    sentences.push(sentence);
                }
                start = end;
            }
        }
    }
    let tail = input[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }
    sentences
}

pub fn ensure_terminal_punctuation(input: &str) -> String {
    let trimmed = input.trim_end();
    if trimmed.is_empty() {
        return String::new();
    }
    if trimmed.ends_with(['.', '!', '?', '…']) {
        return trimmed.to_owned();
    }
    let base = trimmed.trim_end_matches([',', ';', ':', '-']).trim_end();
    format!("{base}.")
}

pub fn correct_terminology(input: &str) -> String {
    TERMINOLOGY_RULES.iter().fold(input.to_owned(), |current, (pattern, right)| {
        pattern.replace_all(&current, *right).into_owned()
    })
}

pub fn contains_currency_amount(input: &str) -> bool {
    CURRENCY_AMOUNT.is_match(input)
}

pub fn sanitize_prices(input: &str) -> String {
    CURRENCY_AMOUNT.replace_all(input, PRICE_PLACEHOLDER).into_owned()
}

#[cfg(test)]
mod tests {
    use super::{
        contains_currency_amount, correct_terminology, enforce_brevity, ensure_terminal_punctuation,
        sanitize_prices, strip_markup, PostProcessor,
    };

    #[test]
    fn strips_tags_headers_emphasis_and_fences() {
        let raw = "## Opción ideal\n```\ncode\n```\nLa **Prima Tec Smart** es <b>ideal</b>.";
        let cleaned = strip_markup(raw);

        assert!(!cleaned.contains('#'));
        assert!(!cleaned.contains("**"));
        assert!(!cleaned.contains("<b>"));
        assert!(!cleaned.contains("```"));
        assert!(cleaned.contains("Prima Tec Smart"));
    }

    #[test]
    fn bare_comparison_signs_are_not_tags() {
        let reply = PostProcessor::new(70).process(
            "Para cargas < 1500 kcal/h te recomiendo el Radiador Eléctrico Broen E, ideal para dormitorios.",
        );

        assert_eq!(
            reply,
            "Para cargas < 1500 kcal/h te recomiendo el Radiador Eléctrico Broen E, ideal para dormitorios."
        );
        assert_eq!(strip_markup("potencia > 3000 y <br/>fin"), "potencia > 3000 y  fin");
    }

    #[test]
    fn brevity_keeps_whole_sentences() {
        let text = "Primera oración corta. Segunda oración también corta! Tercera oración que ya no entra en el límite?";
        let brief = enforce_brevity(text, 7);

        assert_eq!(brief, "Primera oración corta. Segunda oración también corta!");
    }

    #[test]
    fn brevity_hard_truncates_single_long_sentence() {
        let text = "uno dos tres cuatro cinco seis siete ocho nueve diez";
        assert_eq!(enforce_brevity(text, 4), "uno dos tres cuatro.");
    }

    #[test]
    fn brevity_collapses_whitespace_and_adds_period() {
        assert_eq!(enforce_brevity("  hola   \n\n mundo  ", 70), "hola mundo.");
        assert_eq!(ensure_terminal_punctuation("¿Río Grande o Ushuaia?"), "¿Río Grande o Ushuaia?");
        assert_eq!(ensure_terminal_punctuation("listo,"), "listo.");
    }

    #[test]
    fn terminology_fixes_brand_company_confusions_only() {
        let fixed = correct_terminology("Podés visitar peisa o las sucursales de PEISA.");
        assert_eq!(fixed, "Podés visitar SOLDASUR o las sucursales de SOLDASUR.");

        let untouched = correct_terminology("Las calderas PEISA son eficientes.");
        assert_eq!(untouched, "Las calderas PEISA son eficientes.");

        assert_eq!(correct_terminology("Ir a VISITÁ PEISA hoy"), "Ir a visitá SOLDASUR hoy");
    }

    #[test]
    fn sanitizes_currency_amounts_but_not_technical_figures() {
        assert_eq!(
            sanitize_prices("Cuesta $ 1.234,56 y la otra USD 300."),
            "Cuesta precio a consultar y la otra precio a consultar."
        );
        assert_eq!(sanitize_prices("Sale $1500, barata"), "Sale precio a consultar, barata");
        assert_eq!(sanitize_prices("Unos 1500 pesos."), "Unos precio a consultar.");
        assert_eq!(sanitize_prices("Entrega 24000 W de potencia."), "Entrega 24000 W de potencia.");
        assert!(!contains_currency_amount("Para 80 m² alcanza"));
        assert!(!contains_currency_amount("La Diva DS 24 rinde 20.640 kcal/h"));
        assert!(contains_currency_amount("¿la dejan en 300 dólares?"));
    }

    #[test]
    fn processor_applies_steps_in_order() {
        let processor = PostProcessor::new(70);
        let reply = processor.process("**Te recomiendo** la Diva DS, cuesta $ 900.000 en la tienda PEISA");

        assert_eq!(
            reply,
            "Te recomiendo la Diva DS, cuesta precio a consultar en la tienda SOLDASUR."
        );
    }
}
