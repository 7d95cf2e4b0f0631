use regex::Regex;
use std::sync::LazyLock;

static DETAILS_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([A-Z\s]+DETAILS)").unwrap());
static LEADING_NUMBERS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\d\s.]+").unwrap());
static TOTAL_ARROW_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^total\s*->\s*[\d.\s]+").unwrap());
static PLUS_THICKNESS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+\s*[\d.]+\s*").unwrap());
static LEADING_THK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^[\d.\s]+(thk)?\s*").unwrap());

/// Clean a table title line into the table's display name.
///
/// - "TOTAL -> 12.55 139.19 10073 COVER DETAILS" -> "COVER DETAILS"
/// - "12 2 24 1743 MAJOR DETAILS" -> "MAJOR DETAILS"
///
/// The result is uppercased. A title that cleans down to nothing is
/// returned unchanged.
pub fn clean_table_title(title: &str) -> String {
    let upper = title.trim().to_uppercase();

    if upper.contains("TOTAL") && upper.contains("DETAILS") {
        if let Some(m) = DETAILS_NAME_RE.captures(&upper).and_then(|c| c.get(1)) {
            return m.as_str().trim().to_string();
        }
    }

    let clean = LEADING_NUMBERS_RE.replace(&upper, "").trim().to_string();
    if clean.is_empty() {
        title.trim().to_string()
    } else {
        clean
    }
}

/// Clean a tube-table material cell into a material name.
///
/// Steps:
/// 1. Known vendor materials map to their canonical names
/// 2. "Total -> 12.55 ..." garbage prefixes are dropped
/// 3. "+ 0.1875 Wdman Duct" thickness prefixes are dropped
/// 4. "Each ... = name" keeps the part after '='
/// 5. Leading numbers (and a "thk" after them) are dropped
pub fn clean_material_name(name: &str) -> String {
    let mut clean = name.trim().to_string();
    let lower = clean.to_lowercase();

    if lower.contains("wdman tube") {
        return "Wdman Tube".into();
    }
    if lower.contains("wdman duct") {
        return "Wdman Duct".into();
    }
    if lower.contains("wdg stk") || lower.contains("wd stk") {
        return "Wd Wdg Stk".into();
    }
    if lower.contains("core duct") && lower.contains("wdman") {
        return "Wdman Duct".into();
    }

    if lower.starts_with("total") && lower.contains("->") {
        if lower.contains("wdma") {
            return "Wdman Tube".into();
        }
        clean = TOTAL_ARROW_RE.replace(&clean, "").to_string();
    }

    if clean.starts_with('+') {
        clean = PLUS_THICKNESS_RE.replace(&clean, "").to_string();
    }

    if clean.contains('=') {
        if let Some(after) = name.split('=').nth(1).map(str::trim) {
            if !after.is_empty() {
                clean = after.to_string();
            }
        }
    }

    LEADING_THK_RE.replace(&clean, "").to_string()
}
