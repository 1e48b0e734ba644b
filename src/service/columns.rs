use bigdecimal::ToPrimitive;
use serde::Serialize;

use crate::models::{RawCell, Sheet};
use crate::service::numeric::parse_price;

/// Header keyword vocabularies, matched against normalized header text.
const NAME_KEYS: &[&str] = &[
    "наименование",
    "наименованиетовара",
    "товар",
    "описание",
    "позиция",
    "product",
    "item",
    "название",
];

const CODE_KEYS: &[&str] = &[
    "код",
    "кодтовара",
    "артикул",
    "art",
    "sku",
    "код1с",
    "штрихкод",
    "баркод",
];

const UNIT_KEYS: &[&str] = &[
    "ед",
    "едизм",
    "единицаизмерения",
    "единица",
    "unit",
    "едиз",
    "упак",
    "уп",
    "шт",
    "кг",
    "л",
    "литр",
];

const PRICE_KEYS: &[&str] = &[
    "цена",
    "ценабезндс",
    "ценасндс",
    "ценаруб",
    "стоимость",
    "price",
    "отпускнаяцена",
    "сумма",
    "руб",
];

const KNOWN_UNITS: &[&str] = &[
    "шт", "кг", "г", "гр", "л", "мл", "уп", "упак", "пач", "бут", "кор", "ящ", "кан", "меш",
    "pcs", "kg", "g", "l", "ml",
];

/// How many leading rows to scan for a header.
const HEADER_SCAN_LIMIT: usize = 80;
/// How many data rows to sample for content-based detection.
const SAMPLE_ROWS: usize = 50;

/// Column indices as inferred, any of which may be missing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ColumnMap {
    pub name: Option<usize>,
    pub code: Option<usize>,
    pub unit: Option<usize>,
    pub price: Option<usize>,
}

/// A column map with the two mandatory columns resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedColumns {
    pub name: usize,
    pub price: usize,
    pub unit: Option<usize>,
    pub code: Option<usize>,
}

impl From<ResolvedColumns> for ColumnMap {
    fn from(cols: ResolvedColumns) -> Self {
        ColumnMap {
            name: Some(cols.name),
            code: cols.code,
            unit: cols.unit,
            price: Some(cols.price),
        }
    }
}

/// Outcome of column inference over one sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnInference {
    Resolved {
        columns: ResolvedColumns,
        header_row: Option<usize>,
    },
    /// Name or price could not be located; the partial map is kept for the
    /// ingest report.
    NotDetected(ColumnMap),
}

/// Strip whitespace and separator punctuation so header variants like
/// "Ед. изм." and "ед_изм" compare equal.
pub fn normalize_header(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '.' | ',' | ';' | ':' | '-' | '_' | '/' | '\\'))
        .collect()
}

fn header_matches(normalized: &str, key: &str) -> bool {
    if key.chars().count() <= 3 {
        normalized == key || normalized.starts_with(key)
    } else {
        normalized == key || normalized.contains(key)
    }
}

fn row_headers(row: &[RawCell]) -> Vec<String> {
    row.iter()
        .map(|c| c.text().map(|t| normalize_header(&t)).unwrap_or_default())
        .collect()
}

/// Find the first row among the leading rows that carries both a name and a
/// price keyword. Data rows never satisfy both at once.
pub fn find_header_row(sheet: &Sheet) -> Option<usize> {
    for (idx, row) in sheet.rows.iter().take(HEADER_SCAN_LIMIT).enumerate() {
        let headers = row_headers(row);
        let has_name = headers
            .iter()
            .any(|h| !h.is_empty() && NAME_KEYS.iter().any(|k| header_matches(h, k)));
        let has_price = headers
            .iter()
            .any(|h| !h.is_empty() && PRICE_KEYS.iter().any(|k| header_matches(h, k)));
        if has_name && has_price {
            return Some(idx);
        }
    }
    None
}

fn claim_by_keys(headers: &[String], keys: &[&str], taken: &ColumnMap) -> Option<usize> {
    let used = [taken.name, taken.price, taken.code, taken.unit];
    for (idx, header) in headers.iter().enumerate() {
        if header.is_empty() || used.contains(&Some(idx)) {
            continue;
        }
        if keys.iter().any(|k| header_matches(header, k)) {
            return Some(idx);
        }
    }
    None
}

/// Infer columns from a header row: name first, then price, code, unit, each
/// claiming at most one column.
fn detect_by_header(headers: &[String]) -> ColumnMap {
    let mut map = ColumnMap::default();
    map.name = claim_by_keys(headers, NAME_KEYS, &map);
    map.price = claim_by_keys(headers, PRICE_KEYS, &map);
    map.code = claim_by_keys(headers, CODE_KEYS, &map);
    map.unit = claim_by_keys(headers, UNIT_KEYS, &map);
    map
}

struct ColumnProfile {
    texts: usize,
    numeric: usize,
    unit_like: usize,
    code_like: usize,
    total_len: usize,
    numeric_sum: f64,
}

fn looks_like_unit(text: &str) -> bool {
    let lowered = text.trim().to_lowercase();
    let lowered = lowered.trim_matches('.');
    if lowered.is_empty() {
        return false;
    }
    let len = lowered.chars().count();
    KNOWN_UNITS.contains(&lowered) || (1..=5).contains(&len)
}

fn looks_like_code(text: &str) -> bool {
    let trimmed = text.trim();
    let len = trimmed.chars().count();
    if !(2..=24).contains(&len)
        || !trimmed
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '/' | '.'))
    {
        return false;
    }
    // short pure-digit cells are quantities, not article codes
    trimmed.chars().any(|c| c.is_alphabetic()) || len >= 6
}

fn profile_column(rows: &[&Vec<RawCell>], col: usize) -> ColumnProfile {
    let mut p = ColumnProfile {
        texts: 0,
        numeric: 0,
        unit_like: 0,
        code_like: 0,
        total_len: 0,
        numeric_sum: 0.0,
    };
    for row in rows {
        let Some(text) = row.get(col).and_then(|c| c.text()) else {
            continue;
        };
        p.texts += 1;
        p.total_len += text.chars().count();
        if let Some(value) = parse_price(&text).and_then(|d| d.to_f64()) {
            p.numeric += 1;
            p.numeric_sum += value;
        }
        if looks_like_unit(&text) {
            p.unit_like += 1;
        }
        if looks_like_code(&text) {
            p.code_like += 1;
        }
    }
    p
}

/// Infer columns from data content when headers were missing or incomplete.
/// Only fills slots still empty in `map`.
fn detect_by_sample(sheet: &Sheet, data_start: usize, map: &mut ColumnMap) {
    let rows: Vec<&Vec<RawCell>> = sheet
        .rows
        .iter()
        .skip(data_start)
        .filter(|r| r.iter().any(|c| !c.is_empty()))
        .take(SAMPLE_ROWS)
        .collect();
    if rows.is_empty() {
        return;
    }
    let width = rows.iter().map(|r| r.len()).max().unwrap_or(0);
    let profiles: Vec<ColumnProfile> = (0..width).map(|col| profile_column(&rows, col)).collect();
    let taken = |map: &ColumnMap, col: usize| {
        [map.name, map.price, map.code, map.unit].contains(&Some(col))
    };

    if map.name.is_none() {
        // the name column has the longest average text
        map.name = profiles
            .iter()
            .enumerate()
            .filter(|(col, p)| !taken(map, *col) && p.texts > 0)
            .map(|(col, p)| (col, p.total_len as f64 / p.texts as f64))
            .filter(|(_, mean)| *mean > 3.0)
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(col, _)| col);
    }
    if map.price.is_none() {
        // densest numeric column over the whole sample; ratio ties go to the
        // higher mean value, so prices beat quantities
        let sample = rows.len() as f64;
        map.price = profiles
            .iter()
            .enumerate()
            .filter(|(col, p)| !taken(map, *col) && p.numeric > 0)
            .map(|(col, p)| {
                (
                    col,
                    p.numeric as f64 / sample,
                    p.numeric_sum / p.numeric as f64,
                )
            })
            .filter(|(_, ratio, _)| *ratio >= 0.5)
            .max_by(|a, b| {
                (a.1, a.2)
                    .partial_cmp(&(b.1, b.2))
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|(col, _, _)| col);
    }
    if map.unit.is_none() {
        map.unit = profiles
            .iter()
            .enumerate()
            .filter(|(col, p)| !taken(map, *col) && p.texts > 0 && p.unit_like * 2 > p.texts)
            .max_by_key(|(_, p)| p.unit_like)
            .map(|(col, _)| col);
    }
    if map.code.is_none() {
        map.code = profiles
            .iter()
            .enumerate()
            .filter(|(col, p)| !taken(map, *col) && p.texts > 0 && p.code_like * 2 > p.texts)
            .max_by_key(|(_, p)| p.code_like)
            .map(|(col, _)| col);
    }
}

/// Two-stage column inference: header keywords first, content sampling for
/// whatever the header pass left open. Name and price are mandatory.
pub fn infer_columns(sheet: &Sheet) -> ColumnInference {
    let header_row = find_header_row(sheet);
    let mut map = match header_row {
        Some(idx) => detect_by_header(&row_headers(&sheet.rows[idx])),
        None => ColumnMap::default(),
    };
    let data_start = header_row.map(|i| i + 1).unwrap_or(0);
    if map.name.is_none() || map.price.is_none() || map.unit.is_none() || map.code.is_none() {
        detect_by_sample(sheet, data_start, &mut map);
    }
    match (map.name, map.price) {
        (Some(name), Some(price)) => ColumnInference::Resolved {
            columns: ResolvedColumns {
                name,
                price,
                unit: map.unit,
                code: map.code,
            },
            header_row,
        },
        _ => ColumnInference::NotDetected(map),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_row(cells: &[&str]) -> Vec<RawCell> {
        cells.iter().map(|c| RawCell::Text(c.to_string())).collect()
    }

    fn sheet(rows: Vec<Vec<RawCell>>) -> Sheet {
        Sheet {
            name: "Лист1".to_string(),
            rows,
        }
    }

    #[test]
    fn header_keywords_resolve_columns() {
        let s = sheet(vec![
            text_row(&["Прайс-лист ООО Ромашка", "", "", ""]),
            text_row(&["Наименование", "Кол-во", "Ед.", "Цена"]),
            text_row(&["Сыр Моцарелла", "10", "шт", "250,00"]),
        ]);
        match infer_columns(&s) {
            ColumnInference::Resolved {
                columns,
                header_row,
            } => {
                assert_eq!(header_row, Some(1));
                assert_eq!(columns.name, 0);
                assert_eq!(columns.price, 3);
                assert_eq!(columns.unit, Some(2));
                assert_eq!(columns.code, None);
            }
            other => panic!("expected resolved columns, got {:?}", other),
        }
    }

    #[test]
    fn short_keys_match_by_prefix_only() {
        assert!(header_matches(&normalize_header("Ед. изм."), "ед"));
        assert!(!header_matches(&normalize_header("Цена"), "ед"));
        // long keys may match as a substring
        assert!(header_matches(
            &normalize_header("Отпускная цена, руб"),
            "цена"
        ));
    }

    #[test]
    fn headerless_sheet_falls_back_to_sampling() {
        let rows = (0..10)
            .map(|i| {
                vec![
                    RawCell::Text(format!("Колбаса вареная молочная {}", i)),
                    RawCell::Text("кг".to_string()),
                    RawCell::Number(350.0 + i as f64),
                ]
            })
            .collect();
        match infer_columns(&sheet(rows)) {
            ColumnInference::Resolved { columns, header_row } => {
                assert_eq!(header_row, None);
                assert_eq!(columns.name, 0);
                assert_eq!(columns.unit, Some(1));
                assert_eq!(columns.price, 2);
            }
            other => panic!("expected resolved columns, got {:?}", other),
        }
    }

    #[test]
    fn price_ties_break_toward_higher_values() {
        // two fully numeric columns: prices around 350, quantities all 2
        let rows = (0..10)
            .map(|i| {
                vec![
                    RawCell::Text(format!("Колбаса вареная молочная {}", i)),
                    RawCell::Number(350.0 + i as f64),
                    RawCell::Number(2.0),
                ]
            })
            .collect();
        match infer_columns(&sheet(rows)) {
            ColumnInference::Resolved { columns, .. } => {
                assert_eq!(columns.name, 0);
                assert_eq!(columns.price, 1);
            }
            other => panic!("expected resolved columns, got {:?}", other),
        }
    }

    #[test]
    fn sparse_numeric_column_does_not_outrank_price() {
        // col2 holds big numbers but only in 2 of 10 rows
        let rows = (0..10)
            .map(|i| {
                vec![
                    RawCell::Text(format!("Колбаса вареная молочная {}", i)),
                    RawCell::Number(350.0 + i as f64),
                    if i < 2 {
                        RawCell::Number(9999.0)
                    } else {
                        RawCell::Empty
                    },
                ]
            })
            .collect();
        match infer_columns(&sheet(rows)) {
            ColumnInference::Resolved { columns, .. } => {
                assert_eq!(columns.price, 1);
            }
            other => panic!("expected resolved columns, got {:?}", other),
        }
    }

    #[test]
    fn undetectable_sheet_reports_partial_map() {
        let s = sheet(vec![text_row(&["а", "б"]), text_row(&["в", "г"])]);
        match infer_columns(&s) {
            ColumnInference::NotDetected(map) => {
                assert_eq!(map.price, None);
            }
            other => panic!("expected not-detected, got {:?}", other),
        }
    }

    #[test]
    fn header_normalization_strips_separators() {
        assert_eq!(normalize_header("Ед. изм."), "едизм");
        assert_eq!(normalize_header("Цена, руб"), "ценаруб");
        assert_eq!(normalize_header("КОД_ТОВАРА"), "кодтовара");
    }
}
