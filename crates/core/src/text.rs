//! Small text helpers shared by the catalog search, the summarizer and the
//! assistant guardrails. Matching is literal: lowercase plus accent folding,
//! no pattern engine.

pub fn fold(input: &str) -> String {
    input.chars().flat_map(char::to_lowercase).map(strip_accent).collect()
}

fn strip_accent(ch: char) -> char {
    match ch {
        'á' | 'à' | 'ä' | 'â' => 'a',
        'é' | 'è' | 'ë' | 'ê' => 'e',
        'í' | 'ì' | 'ï' | 'î' => 'i',
        'ó' | 'ò' | 'ö' | 'ô' => 'o',
        'ú' | 'ù' | 'ü' | 'û' => 'u',
        other => other,
    }
}

/// Case and accent insensitive containment.
pub fn contains_folded(haystack: &str, needle: &str) -> bool {
    fold(haystack).contains(&fold(needle))
}

pub fn contains_any(folded_haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| folded_haystack.contains(&fold(needle)))
}

/// Whole-word match against an already folded haystack.
pub fn contains_word(folded_haystack: &str, word: &str) -> bool {
    let word = fold(word);
    tokenize(folded_haystack).iter().any(|token| token == &word)
}

pub fn tokenize(input: &str) -> Vec<String> {
    input
        .split(|ch: char| !ch.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Byte offsets (into the folded string) of every occurrence of `needle`.
pub fn find_all(folded_haystack: &str, folded_needle: &str) -> Vec<usize> {
    if folded_needle.is_empty() {
        return Vec::new();
    }
    folded_haystack.match_indices(folded_needle).map(|(offset, _)| offset).collect()
}

/// Parses numbers written the local way ("1.500", "2,5") as well as plain
/// decimals. Returns `None` for anything that is not a finite number.
pub fn parse_number(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let normalized = if trimmed.contains(',') {
        trimmed.replace('.', "").replace(',', ".")
    } else if trimmed.matches('.').count() > 1 || has_thousands_group(trimmed) {
        trimmed.replace('.', "")
    } else {
        trimmed.to_owned()
    };
    normalized.parse::<f64>().ok().filter(|value| value.is_finite())
}

fn has_thousands_group(raw: &str) -> bool {
    match raw.split_once('.') {
        Some((head, tail)) => {
            !head.is_empty() && tail.len() == 3 && tail.chars().all(|ch| ch.is_ascii_digit())
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::{contains_folded, contains_word, find_all, fold, parse_number, tokenize};

    #[test]
    fn fold_lowercases_and_strips_accents() {
        assert_eq!(fold("Calefacción ELÉCTRICA"), "calefaccion electrica");
        assert!(contains_folded("Necesito CALEFACCION", "calefacción"));
    }

    #[test]
    fn word_match_requires_token_boundaries() {
        let folded = fold("Tengo una casa de 80 m2");
        assert!(contains_word(&folded, "casa"));
        assert!(!contains_word(&folded, "cas"));
        assert_eq!(tokenize("hola, ¿qué tal?"), vec!["hola", "qué", "tal"]);
    }

    #[test]
    fn find_all_reports_each_offset() {
        assert_eq!(find_all("broen y broen plus", "broen"), vec![0, 8]);
        assert!(find_all("broen", "").is_empty());
    }

    #[test]
    fn parse_number_handles_local_formats() {
        assert_eq!(parse_number("80"), Some(80.0));
        assert_eq!(parse_number("2,5"), Some(2.5));
        assert_eq!(parse_number("1.234,5"), Some(1234.5));
        assert_eq!(parse_number("1.500.000"), Some(1_500_000.0));
        assert_eq!(parse_number("25.000"), Some(25_000.0));
        assert_eq!(parse_number("2.5"), Some(2.5));
        assert_eq!(parse_number("abc"), None);
        assert_eq!(parse_number("NaN"), None);
        assert_eq!(parse_number(""), None);
    }
}
