//! Canonical SKU, lot, and company-key normalization.
//!
//! Vendor order data spells product and lot identifiers inconsistently
//! (free-text item names, hand-typed notes, legacy codes). Everything the
//! sync engine persists goes through these functions first so that the
//! distribution ledger joins on a single spelling of each identifier.

use regex::Regex;

/// Full lot prefix carried by every normalized lot code.
pub const LOT_PREFIX: &str = "SLQ-";

/// Short prefix variant seen on hand-typed lots; rewritten to [`LOT_PREFIX`].
const LOT_PREFIX_SHORT: &str = "SLQ";

/// Retired sample-kit code that still appears on old orders. Line items
/// resolving to this SKU are dropped during aggregation.
pub const LEGACY_SAMPLE_SKU: &str = "106610SPT";

/// Product-family digit codes and the canonical SKU each maps to.
///
/// Item SKU/name text carrying one of these French-size digit pairs anywhere
/// resolves to the fixed product code, regardless of surrounding text.
const SKU_FAMILIES: [(&str, &str); 3] = [
    ("14", "211410SPT"),
    ("16", "211610SPT"),
    ("18", "211810SPT"),
];

/// Maps raw vendor SKU or item-name text to a canonical product code.
///
/// Matching rules, first hit wins:
/// 1. The uppercased input contains a recognized family digit pair
///    (`"14"`, `"16"`, `"18"`) → the corresponding fixed 9-character code.
/// 2. The input already is a canonical code (`^\d{6}SPT$`) → returned as-is.
/// 3. Anything else → `None` (unrecognized product).
#[must_use]
pub fn canonicalize_sku(raw: &str) -> Option<String> {
    let upper = raw.trim().to_uppercase();
    for (digits, code) in SKU_FAMILIES {
        if upper.contains(digits) {
            return Some(code.to_owned());
        }
    }
    if is_canonical_code(&upper) {
        return Some(upper);
    }
    None
}

/// Returns `true` when `s` matches `^\d{6}SPT$`.
fn is_canonical_code(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.len() == 9 && bytes[..6].iter().all(u8::is_ascii_digit) && &bytes[6..] == b"SPT"
}

/// Normalizes a raw lot code to the fixed-prefix format.
///
/// Uppercases and trims, then ensures the `SLQ-` prefix: an existing full
/// prefix is preserved, the bare `SLQ` variant is rewritten, and anything
/// else gets the prefix prepended. The result is never empty — empty input
/// yields the bare prefix string, which downstream lookups treat as an
/// unknown lot. Idempotent.
#[must_use]
pub fn normalize_lot(raw: &str) -> String {
    let upper = raw.trim().to_uppercase();
    if upper.starts_with(LOT_PREFIX) {
        return upper;
    }
    if let Some(rest) = upper.strip_prefix(LOT_PREFIX_SHORT) {
        return format!("{LOT_PREFIX}{rest}");
    }
    format!("{LOT_PREFIX}{upper}")
}

/// Abbreviation expansions applied before stripping. Word-bounded and
/// case-insensitive; the ampersand is the one non-word pattern.
const COMPANY_ABBREVIATIONS: [(&str, &str); 7] = [
    (r"&", " AND "),
    (r"(?i)\bHOSP\b", "HOSPITAL"),
    (r"(?i)\bMED\b", "MEDICAL"),
    (r"(?i)\b(?:CTR|CNTR)\b", "CENTER"),
    (r"(?i)\bDEPT\b", "DEPARTMENT"),
    (r"(?i)\bUNIV\b", "UNIVERSITY"),
    (r"(?i)\bINST\b", "INSTITUTE"),
];

/// Derives the stable dedup key for a facility name.
///
/// Expands common medical-facility abbreviations, strips everything but
/// alphanumerics and spaces, uppercases, collapses whitespace runs, and
/// truncates to 15 characters. `"Mercy Hosp & Clinic"` and
/// `"MERCY HOSPITAL AND CLINIC"` key identically.
#[must_use]
pub fn normalize_company_key(name: &str) -> String {
    let mut expanded = name.to_owned();
    for (pattern, replacement) in COMPANY_ABBREVIATIONS {
        let re = Regex::new(pattern).expect("valid abbreviation regex");
        expanded = re.replace_all(&expanded, replacement).into_owned();
    }

    let stripped: String = expanded
        .to_uppercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { ' ' })
        .collect();

    let collapsed = stripped.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.chars().take(15).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    // -----------------------------------------------------------------------
    // canonicalize_sku
    // -----------------------------------------------------------------------

    #[test]
    fn family_digits_map_to_fixed_codes() {
        assert_eq!(canonicalize_sku("catheter-14fr").as_deref(), Some("211410SPT"));
        assert_eq!(canonicalize_sku("16 Fr single").as_deref(), Some("211610SPT"));
        assert_eq!(canonicalize_sku("KIT-18").as_deref(), Some("211810SPT"));
    }

    #[test]
    fn family_match_is_case_insensitive_and_position_independent() {
        assert_eq!(canonicalize_sku("X-14").as_deref(), Some("211410SPT"));
        assert_eq!(canonicalize_sku("14-something-else").as_deref(), Some("211410SPT"));
    }

    #[test]
    fn canonical_pattern_passes_through_unchanged() {
        assert_eq!(canonicalize_sku("999999SPT").as_deref(), Some("999999SPT"));
        assert_eq!(canonicalize_sku("999999spt").as_deref(), Some("999999SPT"));
    }

    #[test]
    fn family_digits_win_over_passthrough() {
        // "211410SPT" contains "14" so the family rule fires first; the
        // result is the same code either way.
        assert_eq!(canonicalize_sku("211410SPT").as_deref(), Some("211410SPT"));
    }

    #[test]
    fn unrecognized_text_returns_none() {
        assert!(canonicalize_sku("widget").is_none());
        assert!(canonicalize_sku("").is_none());
        assert!(canonicalize_sku("12345SPT").is_none());
        assert!(canonicalize_sku("ABCDEFSPT").is_none());
    }

    // -----------------------------------------------------------------------
    // normalize_lot
    // -----------------------------------------------------------------------

    #[test]
    fn bare_code_gets_prefix() {
        assert_eq!(normalize_lot("ABC12345"), "SLQ-ABC12345");
    }

    #[test]
    fn short_prefix_variant_is_rewritten() {
        assert_eq!(normalize_lot("slq123"), "SLQ-123");
        assert_eq!(normalize_lot("SLQ123"), "SLQ-123");
    }

    #[test]
    fn full_prefix_is_preserved() {
        assert_eq!(normalize_lot("SLQ-456"), "SLQ-456");
        assert_eq!(normalize_lot("slq-456"), "SLQ-456");
    }

    #[test]
    fn normalize_lot_is_idempotent() {
        for input in ["slq123", "SLQ-456", "ABC12345", "", "  slq-9 "] {
            let once = normalize_lot(input);
            assert_eq!(normalize_lot(&once), once, "not idempotent for {input:?}");
        }
    }

    #[test]
    fn empty_input_yields_bare_prefix() {
        // Latent edge case: the result is never empty, even for empty input.
        assert_eq!(normalize_lot(""), "SLQ-");
        assert_eq!(normalize_lot("   "), "SLQ-");
    }

    // -----------------------------------------------------------------------
    // normalize_company_key
    // -----------------------------------------------------------------------

    #[test]
    fn ampersand_expands_to_and() {
        assert_eq!(normalize_company_key("A & B"), "A AND B");
    }

    #[test]
    fn medical_abbreviations_expand() {
        assert_eq!(normalize_company_key("Mercy Hosp"), "MERCY HOSPITAL");
        assert_eq!(normalize_company_key("Med Ctr"), "MEDICAL CENTER");
    }

    #[test]
    fn punctuation_is_stripped_and_whitespace_collapsed() {
        assert_eq!(normalize_company_key("St. Mary's"), "ST MARY S");
    }

    #[test]
    fn key_is_truncated_to_fifteen_chars() {
        let key = normalize_company_key("University of Somewhere Medical Center");
        assert_eq!(key.chars().count(), 15);
        assert_eq!(key, "UNIVERSITY OF S");
    }

    #[test]
    fn abbreviated_and_spelled_out_names_key_identically() {
        assert_eq!(
            normalize_company_key("Gen Hosp & Univ Clinic"),
            normalize_company_key("Gen Hospital and University Clinic")
        );
    }
}
