use std::str::FromStr;

use bigdecimal::{BigDecimal, Zero};

/// Canonical measurement unit a catalog price is normalized to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseUnit {
    Kg,
    L,
    Pcs,
}

impl BaseUnit {
    pub fn code(self) -> &'static str {
        match self {
            BaseUnit::Kg => "kg",
            BaseUnit::L => "l",
            BaseUnit::Pcs => "pcs",
        }
    }
}

/// Derived comparison metrics for one catalog row.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitMetrics {
    pub base_unit: Option<BaseUnit>,
    pub base_qty: Option<BigDecimal>,
    pub price_per_unit: Option<BigDecimal>,
}

/// Weight tokens and their kilogram conversion factors. Longer tokens first
/// so `гр` is not shadowed by `г`.
pub(crate) const WEIGHT_UNITS: &[(&str, &str)] = &[
    ("кг", "1"),
    ("грам", "0.001"),
    ("гр", "0.001"),
    ("г", "0.001"),
    ("kg", "1"),
];

/// Volume tokens and their liter conversion factors.
pub(crate) const VOLUME_UNITS: &[(&str, &str)] = &[
    ("литров", "1"),
    ("литра", "1"),
    ("литр", "1"),
    ("мл", "0.001"),
    ("ml", "0.001"),
    ("л", "1"),
];

const PIECE_UNITS: &[&str] = &["шт", "штука", "штук", "уп", "упак", "кор", "коробка"];

const CURRENCY_TOKENS: &[&str] = &["руб", "р."];

/// Parse a locale-formatted price string into an exact decimal. Whitespace
/// and currency tokens are stripped, comma decimal separators accepted.
/// Returns None for empty or unparsable input; no rounding happens here.
pub fn parse_price(raw: &str) -> Option<BigDecimal> {
    let mut v: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    for token in CURRENCY_TOKENS {
        v = v.replace(token, "");
    }
    v = v.replace('р', "");
    let v: String = v
        .replace(',', ".")
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    if v.is_empty() {
        return None;
    }
    BigDecimal::from_str(&v).ok()
}

/// Round half-up at `scale` decimal places.
pub fn round_half_up(value: &BigDecimal, scale: i64) -> BigDecimal {
    let truncated = value.with_scale(scale);
    let remainder = value - &truncated;
    let step = BigDecimal::from(1) / BigDecimal::from(10_i64.pow(scale as u32));
    let half = BigDecimal::from(5) / BigDecimal::from(10_i64.pow(scale as u32 + 1));
    if remainder >= half {
        truncated + step
    } else if remainder <= -half.clone() {
        truncated - step
    } else {
        truncated
    }
}

/// Number of discrete supplier packages needed to cover a requested quantity:
/// ceil(requested / base_qty). None when base_qty is not positive.
pub fn packs_needed(requested: &BigDecimal, base_qty: &BigDecimal) -> Option<BigDecimal> {
    if base_qty <= &BigDecimal::zero() {
        return None;
    }
    let ratio = requested / base_qty;
    let floor = ratio.with_scale(0);
    if floor < ratio {
        Some(floor + BigDecimal::from(1))
    } else {
        Some(floor)
    }
}

/// A packaging descriptor found in free text, e.g. `10 x 500 г` or `0.5л`.
/// `qty` already carries the multiplier and the unit conversion factor.
#[derive(Debug, Clone)]
pub(crate) struct PackMatch {
    pub start: usize,
    pub end: usize,
    pub qty: BigDecimal,
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric()
}

fn is_multiplier_sep(c: char) -> bool {
    matches!(c, 'x' | 'х' | '*')
}

fn skip_spaces(chars: &[char], mut i: usize) -> usize {
    while i < chars.len() && chars[i] == ' ' {
        i += 1;
    }
    i
}

/// Parse a decimal number (dot or comma separator) starting at `i`.
fn parse_number_at(chars: &[char], i: usize) -> Option<(BigDecimal, usize)> {
    let mut j = i;
    let mut seen_digit = false;
    let mut seen_sep = false;
    while j < chars.len() {
        let c = chars[j];
        if c.is_ascii_digit() {
            seen_digit = true;
            j += 1;
        } else if (c == '.' || c == ',') && seen_digit && !seen_sep {
            seen_sep = true;
            j += 1;
        } else {
            break;
        }
    }
    if !seen_digit {
        return None;
    }
    // a trailing separator belongs to the surrounding text, not the number
    if j > i && (chars[j - 1] == '.' || chars[j - 1] == ',') {
        j -= 1;
    }
    let text: String = chars[i..j].iter().collect::<String>().replace(',', ".");
    BigDecimal::from_str(&text).ok().map(|d| (d, j))
}

/// Match one unit token at `i`, requiring a word boundary right after it.
fn match_unit_at(chars: &[char], i: usize, units: &[(&str, &str)]) -> Option<(BigDecimal, usize)> {
    for (token, factor) in units {
        let token_chars: Vec<char> = token.chars().collect();
        let end = i + token_chars.len();
        if end > chars.len() || chars[i..end] != token_chars[..] {
            continue;
        }
        if end < chars.len() && is_word_char(chars[end]) {
            continue;
        }
        let factor = BigDecimal::from_str(factor).expect("unit factor is a valid decimal");
        return Some((factor, end));
    }
    None
}

/// Try to match `N x Q unit` (with_multiplier) or `Q unit` at `start`.
fn match_packaging_at(
    chars: &[char],
    start: usize,
    units: &[(&str, &str)],
    with_multiplier: bool,
) -> Option<PackMatch> {
    let (first, after_first) = parse_number_at(chars, start)?;
    if with_multiplier {
        let sep = skip_spaces(chars, after_first);
        if sep >= chars.len() || !is_multiplier_sep(chars[sep]) {
            return None;
        }
        let qty_start = skip_spaces(chars, sep + 1);
        let (qty, after_qty) = parse_number_at(chars, qty_start)?;
        let unit_start = skip_spaces(chars, after_qty);
        let (factor, end) = match_unit_at(chars, unit_start, units)?;
        Some(PackMatch {
            start,
            end,
            qty: first * qty * factor,
        })
    } else {
        let unit_start = skip_spaces(chars, after_first);
        let (factor, end) = match_unit_at(chars, unit_start, units)?;
        Some(PackMatch {
            start,
            end,
            qty: first * factor,
        })
    }
}

/// Find the first packaging descriptor in `chars`. Numbers glued to a
/// preceding word character (as in the `1` inside `10x1л`) are not treated
/// as new starting points.
pub(crate) fn find_packaging(
    chars: &[char],
    units: &[(&str, &str)],
    with_multiplier: bool,
) -> Option<PackMatch> {
    let mut i = 0;
    while i < chars.len() {
        if chars[i].is_ascii_digit() && (i == 0 || !is_word_char(chars[i - 1])) {
            if let Some(m) = match_packaging_at(chars, i, units, with_multiplier) {
                return Some(m);
            }
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.' || chars[i] == ',')
            {
                i += 1;
            }
        } else {
            i += 1;
        }
    }
    None
}

/// All packaging spans (char offsets) in `text`, for both weight and volume
/// vocabularies. Used by the search-key generator to strip packaging noise.
pub(crate) fn packaging_spans(text: &str) -> Vec<(usize, usize)> {
    let chars: Vec<char> = text.chars().collect();
    let units: Vec<(&str, &str)> = WEIGHT_UNITS
        .iter()
        .chain(VOLUME_UNITS.iter())
        .copied()
        .collect();
    let mut spans = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        if chars[i].is_ascii_digit() && (i == 0 || !is_word_char(chars[i - 1])) {
            let m = match_packaging_at(&chars, i, &units, true)
                .or_else(|| match_packaging_at(&chars, i, &units, false));
            if let Some(m) = m {
                i = m.end;
                spans.push((m.start, m.end));
                continue;
            }
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.' || chars[i] == ',')
            {
                i += 1;
            }
        } else {
            i += 1;
        }
    }
    spans
}

fn direct_unit(unit_norm: &str) -> Option<(BaseUnit, BigDecimal)> {
    match unit_norm {
        "кг" | "kg" => Some((BaseUnit::Kg, BigDecimal::from(1))),
        "л" | "литр" | "литров" | "l" => Some((BaseUnit::L, BigDecimal::from(1))),
        "мл" | "ml" => Some((
            BaseUnit::L,
            BigDecimal::from_str("0.001").expect("valid decimal"),
        )),
        _ => None,
    }
}

/// Derive the base unit, base quantity and price-per-base-unit for a catalog
/// row. The unit column wins when it names a weight/volume unit directly;
/// otherwise packaging descriptors embedded in the product name are scanned
/// with an ordered cascade (multiplier+weight, weight, multiplier+volume,
/// volume; first match wins). Piece-like units fall back to (pcs, 1).
pub fn compute_unit_metrics(
    name_raw: &str,
    unit_raw: Option<&str>,
    price: Option<&BigDecimal>,
) -> UnitMetrics {
    let unit_norm = unit_raw
        .unwrap_or("")
        .trim()
        .to_lowercase()
        .replace('.', "");

    let mut base_unit = None;
    let mut base_qty = None;

    if let Some((unit, qty)) = direct_unit(&unit_norm) {
        base_unit = Some(unit);
        base_qty = Some(qty);
    } else {
        let name_lower = name_raw.to_lowercase();
        let chars: Vec<char> = name_lower.chars().collect();
        let cascade = [
            (BaseUnit::Kg, WEIGHT_UNITS, true),
            (BaseUnit::Kg, WEIGHT_UNITS, false),
            (BaseUnit::L, VOLUME_UNITS, true),
            (BaseUnit::L, VOLUME_UNITS, false),
        ];
        for (unit, units, with_multiplier) in cascade {
            if let Some(m) = find_packaging(&chars, units, with_multiplier) {
                base_unit = Some(unit);
                base_qty = Some(round_half_up(&m.qty, 6));
                break;
            }
        }
        if base_unit.is_none() && PIECE_UNITS.contains(&unit_norm.as_str()) {
            base_unit = Some(BaseUnit::Pcs);
            base_qty = Some(BigDecimal::from(1));
        }
    }

    let price_per_unit = match (&base_qty, price) {
        (Some(qty), Some(price)) if qty > &BigDecimal::zero() => {
            Some(round_half_up(&(price / qty), 4))
        }
        _ => None,
    };

    UnitMetrics {
        base_unit,
        base_qty,
        price_per_unit,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    #[test]
    fn parse_price_accepts_dot_and_comma() {
        assert_eq!(parse_price("1234.56"), Some(dec("1234.56")));
        assert_eq!(parse_price("1234,56"), Some(dec("1234.56")));
        assert_eq!(parse_price("1 234,56 руб"), Some(dec("1234.56")));
        assert_eq!(parse_price("99 р."), Some(dec("99")));
        assert_eq!(parse_price("500"), Some(dec("500")));
    }

    #[test]
    fn parse_price_rejects_garbage() {
        assert_eq!(parse_price(""), None);
        assert_eq!(parse_price("   "), None);
        assert_eq!(parse_price("договорная"), None);
        assert_eq!(parse_price("руб"), None);
    }

    #[test]
    fn round_half_up_at_four_places() {
        assert_eq!(round_half_up(&dec("1.00005"), 4), dec("1.0001"));
        assert_eq!(round_half_up(&dec("1.00004"), 4), dec("1.0000"));
        assert_eq!(round_half_up(&dec("500"), 4), dec("500.0000"));
    }

    #[test]
    fn kg_in_name_with_piece_unit() {
        let m = compute_unit_metrics("Сыр Моцарелла 1кг", Some("шт"), Some(&dec("500")));
        assert_eq!(m.base_unit, Some(BaseUnit::Kg));
        assert_eq!(m.base_qty, Some(dec("1.000000")));
        assert_eq!(m.price_per_unit, Some(dec("500.0000")));
    }

    #[test]
    fn multiplier_volume_in_name() {
        let m = compute_unit_metrics("Сок яблочный 10x1л", None, Some(&dec("800")));
        assert_eq!(m.base_unit, Some(BaseUnit::L));
        assert_eq!(m.base_qty, Some(dec("10.000000")));
        assert_eq!(m.price_per_unit, Some(dec("80.0000")));
    }

    #[test]
    fn grams_convert_to_kilograms() {
        let m = compute_unit_metrics("Масло сливочное 500 гр", Some("шт"), Some(&dec("250")));
        assert_eq!(m.base_unit, Some(BaseUnit::Kg));
        assert_eq!(m.base_qty, Some(dec("0.500000")));
        assert_eq!(m.price_per_unit, Some(dec("500.0000")));
    }

    #[test]
    fn comma_decimal_quantity() {
        let m = compute_unit_metrics("Вода 0,5л", None, Some(&dec("40")));
        assert_eq!(m.base_unit, Some(BaseUnit::L));
        assert_eq!(m.base_qty, Some(dec("0.500000")));
        assert_eq!(m.price_per_unit, Some(dec("80.0000")));
    }

    #[test]
    fn direct_unit_column_wins() {
        let m = compute_unit_metrics("Молоко 900мл", Some("л"), Some(&dec("70")));
        assert_eq!(m.base_unit, Some(BaseUnit::L));
        assert_eq!(m.base_qty, Some(BigDecimal::from(1)));
        assert_eq!(m.price_per_unit, Some(dec("70.0000")));
    }

    #[test]
    fn piece_fallback_when_nothing_matches() {
        let m = compute_unit_metrics("Перчатки хозяйственные", Some("шт"), Some(&dec("30")));
        assert_eq!(m.base_unit, Some(BaseUnit::Pcs));
        assert_eq!(m.base_qty, Some(BigDecimal::from(1)));
        assert_eq!(m.price_per_unit, Some(dec("30.0000")));
    }

    #[test]
    fn unknown_unit_and_no_descriptor_yields_nothing() {
        let m = compute_unit_metrics("Салфетки бумажные", None, Some(&dec("10")));
        assert_eq!(m.base_unit, None);
        assert_eq!(m.base_qty, None);
        assert_eq!(m.price_per_unit, None);
    }

    #[test]
    fn unit_metrics_are_idempotent() {
        let a = compute_unit_metrics("Творог 5% 0.4 кг", Some("шт"), Some(&dec("120")));
        let b = compute_unit_metrics("Творог 5% 0.4 кг", Some("шт"), Some(&dec("120")));
        assert_eq!(a, b);
    }

    #[test]
    fn packs_needed_is_ceiling() {
        assert_eq!(packs_needed(&dec("10"), &dec("3")), Some(dec("4")));
        assert_eq!(packs_needed(&dec("9"), &dec("3")), Some(dec("3")));
        assert_eq!(packs_needed(&dec("2.5"), &dec("0.5")), Some(dec("5")));
        assert_eq!(packs_needed(&dec("0.7"), &dec("0.7")), Some(dec("1")));
        assert_eq!(packs_needed(&dec("1"), &dec("0")), None);
    }
}
