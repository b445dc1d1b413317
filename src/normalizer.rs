// Normalization of pain tags and plan values
use crate::model::{PainCategory, PainKind, Row};
use regex::Regex;
use std::sync::LazyLock;
use tracing::warn;

/// Literal fixes applied before anything else; the garbled and doubled
/// forms of "Безопасность" come from copy-pasted spreadsheet cells.
const COMPOUND_TYPOS: [(&str, &str); 3] = [
    ("Безопасностьасность", "Безопасность"),
    ("Безопасность, Безопасность", "Безопасность"),
    ("Безопасность,Безопасность", "Безопасность"),
];

const SPELLING_VARIANTS: [(&str, &str); 4] = [
    ("Лёгкость", "Легкость"),
    ("лёгкость", "легкость"),
    ("Лекость", "Легкость"),
    ("Безопастность", "Безопасность"),
];

/// Abbreviations honoured only when they make up the whole tag.
const ABBREVIATIONS: [(&str, PainCategory); 3] = [
    ("Безоп", PainCategory::Security),
    ("Эконом", PainCategory::Savings),
    ("Сроки", PainCategory::Speed),
];

/// Lowercase stems of each spelling family, checked in this order.
const STEMS: [(&str, PainCategory); 6] = [
    ("легк", PainCategory::Ease),
    ("лёгк", PainCategory::Ease),
    ("безоп", PainCategory::Security),
    ("эконом", PainCategory::Savings),
    ("скор", PainCategory::Speed),
    ("срок", PainCategory::Speed),
];

/// Maps a free-text pain label onto one of the four canonical categories.
/// Unrecognized labels are logged and dropped.
pub fn normalize_category(raw: &str) -> Option<PainCategory> {
    let mut tag = raw.trim().to_string();
    if tag.is_empty() {
        return None;
    }

    for (from, to) in COMPOUND_TYPOS.iter().chain(SPELLING_VARIANTS.iter()) {
        if tag.contains(from) {
            tag = tag.replace(from, to);
        }
    }

    if let Some((_, category)) = ABBREVIATIONS.iter().find(|(abbr, _)| *abbr == tag) {
        return Some(*category);
    }

    if let Some(category) = PainCategory::from_canonical(&tag) {
        return Some(category);
    }

    let lower = tag.to_lowercase();
    if let Some((_, category)) = STEMS.iter().find(|(stem, _)| lower.contains(stem)) {
        return Some(*category);
    }

    warn!("Unknown pain category: '{}'", tag);
    None
}

/// Splits every part on commas, normalizes each tag and joins the distinct
/// categories with ", " in order of first appearance.
pub fn consolidate_pains<I, S>(parts: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut unique: Vec<PainCategory> = Vec::new();
    for part in parts {
        for piece in part.as_ref().split(',') {
            let piece = piece.trim();
            if piece.is_empty() {
                continue;
            }
            if let Some(category) = normalize_category(piece) {
                if !unique.contains(&category) {
                    unique.push(category);
                }
            }
        }
    }

    unique
        .iter()
        .map(|c| c.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Consolidated tags of one kind: canonical column first, then the legacy ones.
pub fn row_pains(row: &Row, kind: PainKind) -> String {
    let canonical = row.text(kind.field());
    let legacy = kind.legacy_columns().iter().map(|c| row.text(c));
    consolidate_pains(std::iter::once(canonical).chain(legacy))
}

/// Moves legacy pain columns of one kind into the canonical field and blanks
/// them. Returns true when the canonical field changed.
pub fn consolidate_row(row: &mut Row, kind: PainKind) -> bool {
    let merged = row_pains(row, kind);
    let changed = row.text(kind.field()) != merged.as_str();
    row.set(kind.field(), merged);
    for column in kind.legacy_columns() {
        row.set(column, "");
    }
    changed
}

static MIN_PER_DAY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Мин\s+(\d+)\s+рд").expect("valid regex"));
static MAX_PER_DAY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Макс\s+(\d+)\s+рд").expect("valid regex"));
static LEADING_MIN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^Мин\s+").expect("valid regex"));
static LEADING_MAX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^Макс\s+").expect("valid regex"));
static PER_DAY_UNIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s+рд\b").expect("valid regex"));

const PER_DAY: &str = "раз в день";

/// Expands the shorthand managers type into plan cells, e.g.
/// "Мин 10 рд" becomes "Минимум 10 раз в день". Applying it twice changes
/// nothing.
pub fn expand_abbreviations(value: &str) -> String {
    if value.is_empty() || value == "-" || value == "+" {
        return value.to_string();
    }

    let mut value = value.trim().to_string();
    value = MIN_PER_DAY
        .replace_all(&value, "Минимум $1 раз в день")
        .into_owned();
    value = MAX_PER_DAY
        .replace_all(&value, "Максимум $1 раз в день")
        .into_owned();

    if !value.contains("Минимум") && !value.contains("Максимум") {
        value = LEADING_MIN.replace(&value, "Минимум ").into_owned();
        value = LEADING_MAX.replace(&value, "Максимум ").into_owned();
    }

    if !value.contains(PER_DAY) {
        value = PER_DAY_UNIT.replace_all(&value, " раз в день").into_owned();
        for unit in [" р/д", " р.д.", " р.д"] {
            value = value.replace(unit, " раз в день");
        }
    }

    value
}
