use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::Result;
use crate::service::numeric::packaging_spans;

/// Hard cap on search-key length, in tokens.
pub const MAX_KEY_WORDS: usize = 6;

/// Unit and packaging tokens dropped from every key regardless of the
/// configured lexicon.
const BUILTIN_STOPWORDS: &[&str] = &[
    "шт", "штука", "штук", "уп", "упак", "кор", "бут", "пач", "ед", "кг", "гр", "г", "л", "мл",
    "литр", "литра", "литров", "kg", "ml", "pcs",
];

const TOKEN_EDGE_CHARS: &[char] = &[
    '.', ',', ';', ':', '!', '?', '"', '\'', '(', ')', '[', ']', '{', '}', '<', '>', '/', '\\',
    '|',
];

/// Synonym map and stopword list for search-key generation. Constructed
/// explicitly and passed in, so normalization is deterministic and testable
/// without hidden load order.
#[derive(Debug, Clone, Default)]
pub struct NormalizerConfig {
    token_map: HashMap<String, String>,
    stopwords: HashSet<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LexiconFile {
    #[serde(default)]
    token_map: HashMap<String, String>,
    #[serde(default)]
    stopwords: Vec<String>,
}

impl NormalizerConfig {
    pub fn new<I, J>(token_map: I, stopwords: J) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
        J: IntoIterator<Item = String>,
    {
        Self {
            token_map: token_map
                .into_iter()
                .map(|(k, v)| (k.to_lowercase(), v.to_lowercase()))
                .collect(),
            stopwords: stopwords.into_iter().map(|w| w.to_lowercase()).collect(),
        }
    }

    /// Load the lexicon from a JSON file (`token_map` object, `stopwords`
    /// array; both optional).
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let data = fs::read_to_string(path)?;
        let lexicon: LexiconFile = serde_json::from_str(&data)?;
        Ok(Self::new(lexicon.token_map, lexicon.stopwords))
    }

    /// Reduce raw text to a canonical search key: normalize, strip packaging
    /// descriptors, tokenize, map synonyms, drop noise, keep the first
    /// `max_words` tokens. Returns None when fewer than `min_words` tokens
    /// survive, so weak names never match everything.
    pub fn search_key(&self, text: &str, min_words: usize, max_words: usize) -> Option<String> {
        let base = normalize_base(text);
        if base.is_empty() {
            return None;
        }
        let stripped = strip_packaging(&base);
        let tokens = tokenize(&stripped);
        let tokens = self.apply_synonyms(tokens);
        let tokens = self.drop_noise(tokens);
        if tokens.len() < min_words {
            return None;
        }
        Some(tokens[..tokens.len().min(max_words)].join(" "))
    }

    /// Search key for a catalog row: name and unit text combined, a single
    /// surviving token is enough.
    pub fn catalog_search_key(&self, name_raw: &str, unit_raw: Option<&str>) -> Option<String> {
        let combined = match unit_raw {
            Some(unit) => format!("{} {}", name_raw, unit),
            None => name_raw.to_string(),
        };
        self.search_key(&combined, 1, MAX_KEY_WORDS)
    }

    fn apply_synonyms(&self, tokens: Vec<String>) -> Vec<String> {
        tokens
            .into_iter()
            .map(|t| self.token_map.get(&t).cloned().unwrap_or(t))
            .collect()
    }

    fn drop_noise(&self, tokens: Vec<String>) -> Vec<String> {
        tokens
            .into_iter()
            .filter(|t| {
                if self.stopwords.contains(t) || BUILTIN_STOPWORDS.contains(&t.as_str()) {
                    return false;
                }
                // percentage markers (fat content etc.) are discriminating
                if t.ends_with('%') {
                    return true;
                }
                if t.chars().all(|c| c.is_ascii_digit() || c == '.' || c == ',') {
                    return false;
                }
                t.chars().count() >= 2
            })
            .collect()
    }
}

/// Lowercase, fold `ё` to `е`, keep only letters, digits, `% * . , - /` and
/// spaces, collapse whitespace runs.
pub fn normalize_base(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.to_lowercase().chars() {
        let c = if c == 'ё' { 'е' } else { c };
        let keep = c.is_ascii_lowercase()
            || c.is_ascii_digit()
            || ('а'..='я').contains(&c)
            || matches!(c, '%' | '*' | '.' | ',' | '-' | '/');
        if keep {
            out.push(c);
        } else {
            out.push(' ');
        }
    }
    collapse_spaces(&out)
}

/// Plain normalized form stored alongside the raw name (no packaging
/// stripping, no token surgery); the similarity fallback column.
pub fn normalize_name(text: &str) -> String {
    normalize_base(text)
}

/// Remove `N x Q unit` / `Q unit` packaging descriptors so packaging does
/// not pollute the match key.
pub fn strip_packaging(text: &str) -> String {
    let spans = packaging_spans(text);
    if spans.is_empty() {
        return text.trim().to_string();
    }
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for (start, end) in spans {
        out.extend(&chars[cursor..start]);
        out.push(' ');
        cursor = end;
    }
    out.extend(&chars[cursor..]);
    collapse_spaces(&out)
}

/// Split on whitespace, trim punctuation from token edges and break tokens
/// joined by hyphens or slashes.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    for raw in text.split_whitespace() {
        let trimmed = raw.trim_matches(TOKEN_EDGE_CHARS);
        if trimmed.is_empty() {
            continue;
        }
        for part in trimmed.split(['-', '/', '\\']) {
            if !part.is_empty() {
                tokens.push(part.to_string());
            }
        }
    }
    tokens
}

fn collapse_spaces(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> NormalizerConfig {
        NormalizerConfig::new(
            [("молочко".to_string(), "молоко".to_string())],
            ["охлажденный".to_string(), "вес".to_string()],
        )
    }

    #[test]
    fn normalize_base_folds_and_filters() {
        assert_eq!(normalize_base("Сыр «Моцарелла»  50%"), "сыр моцарелла 50%");
        assert_eq!(normalize_base("Ёлочка"), "елочка");
    }

    #[test]
    fn packaging_is_stripped_from_keys() {
        let key = cfg().search_key("Сыр Моцарелла 10 x 500 г", 1, MAX_KEY_WORDS);
        assert_eq!(key.as_deref(), Some("сыр моцарелла"));
        let key = cfg().search_key("Вода минеральная 0,5л", 1, MAX_KEY_WORDS);
        assert_eq!(key.as_deref(), Some("вода минеральная"));
    }

    #[test]
    fn synonyms_and_stopwords_apply() {
        let key = cfg().search_key("Молочко охлажденный 3.2%", 1, MAX_KEY_WORDS);
        assert_eq!(key.as_deref(), Some("молоко 3.2%"));
    }

    #[test]
    fn percent_tokens_survive_noise_filter() {
        let key = cfg().search_key("Творог 9%", 1, MAX_KEY_WORDS);
        assert_eq!(key.as_deref(), Some("творог 9%"));
    }

    #[test]
    fn short_and_numeric_tokens_are_dropped() {
        let key = cfg().search_key("Мука в/с 50", 1, MAX_KEY_WORDS);
        assert_eq!(key.as_deref(), Some("мука"));
    }

    #[test]
    fn min_token_guard_returns_none() {
        assert_eq!(cfg().search_key("сыр", 2, MAX_KEY_WORDS), None);
        assert_eq!(cfg().search_key("", 1, MAX_KEY_WORDS), None);
        assert_eq!(cfg().search_key("12 34", 1, MAX_KEY_WORDS), None);
    }

    #[test]
    fn normalization_is_idempotent() {
        let cfg = cfg();
        let once = cfg
            .search_key("Сыр Моцарелла мини 125г в рассоле", 1, MAX_KEY_WORDS)
            .unwrap();
        let twice = cfg.search_key(&once, 1, MAX_KEY_WORDS).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn key_is_capped_at_max_words() {
        let key = cfg()
            .search_key("один два три четыре пять шесть семь восемь", 1, MAX_KEY_WORDS)
            .unwrap();
        assert_eq!(key.split(' ').count(), MAX_KEY_WORDS);
    }
}
