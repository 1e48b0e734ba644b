use serde::{Deserialize, Serialize};

/// Closed category set for catalog and tender rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Fresh,
    Canned,
    Frozen,
}

impl Category {
    pub fn code(self) -> &'static str {
        match self {
            Category::Fresh => "fresh",
            Category::Canned => "canned",
            Category::Frozen => "frozen",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "fresh" => Some(Category::Fresh),
            "canned" => Some(Category::Canned),
            "frozen" => Some(Category::Frozen),
            _ => None,
        }
    }
}

const CANNED_KEYWORDS: &[&str] = &[
    "консерв",
    "марин",
    "солен",
    "вялен",
    "в рассоле",
    "в собственном соку",
];

// both stems: "заморож" (замороженный) and "замороз" (заморозка)
const FROZEN_KEYWORDS: &[&str] = &["заморож", "замороз", "frozen"];

/// Classify a product name into a category. Total for non-empty input:
/// anything without a canned/frozen keyword counts as fresh.
pub fn classify(text: &str) -> Option<Category> {
    let lowered = text.trim().to_lowercase();
    if lowered.is_empty() {
        return None;
    }
    if CANNED_KEYWORDS.iter().any(|k| lowered.contains(k)) {
        return Some(Category::Canned);
    }
    if FROZEN_KEYWORDS.iter().any(|k| lowered.contains(k)) {
        return Some(Category::Frozen);
    }
    Some(Category::Fresh)
}

/// Map a free-text category label (e.g. from an uploaded tender sheet) to
/// the closed code set. Unlike `classify` there is no fresh default:
/// unrecognized labels yield None.
pub fn normalize_category_value(text: &str) -> Option<Category> {
    let lowered = text.trim().to_lowercase();
    if lowered.is_empty() {
        return None;
    }
    const MAPPER: &[(&str, Category)] = &[
        ("fresh", Category::Fresh),
        ("свеж", Category::Fresh),
        ("консерв", Category::Canned),
        ("марин", Category::Canned),
        ("солен", Category::Canned),
        ("вялен", Category::Canned),
        ("заморож", Category::Frozen),
        ("замороз", Category::Frozen),
        ("frozen", Category::Frozen),
    ];
    for (key, category) in MAPPER {
        if lowered.contains(key) {
            return Some(*category);
        }
    }
    Category::from_code(&lowered)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keywords_classify_canned_and_frozen() {
        assert_eq!(classify("Огурцы маринованные"), Some(Category::Canned));
        assert_eq!(classify("Тунец в собственном соку"), Some(Category::Canned));
        assert_eq!(classify("Ягоды замороженные"), Some(Category::Frozen));
        assert_eq!(classify("Смесь овощная быстрой заморозки"), Some(Category::Frozen));
    }

    #[test]
    fn everything_else_defaults_to_fresh() {
        assert_eq!(classify("Сыр Моцарелла"), Some(Category::Fresh));
        assert_eq!(classify(""), None);
        assert_eq!(classify("   "), None);
    }

    #[test]
    fn free_text_labels_normalize_without_fresh_default() {
        assert_eq!(normalize_category_value("Свежие овощи"), Some(Category::Fresh));
        assert_eq!(normalize_category_value("заморозка"), Some(Category::Frozen));
        assert_eq!(
            normalize_category_value("замороженные продукты"),
            Some(Category::Frozen)
        );
        assert_eq!(normalize_category_value("canned"), Some(Category::Canned));
        assert_eq!(normalize_category_value("бакалея"), None);
        assert_eq!(normalize_category_value(""), None);
    }
}
