//! Extraction of (SKU, lot) evidence from an order's free-text fields.
//!
//! Evidence sources are consulted in strict priority order and the first
//! source yielding any candidate wins for the whole order — sources are
//! exclusive, never merged:
//!
//! 1. `LOT:`-labeled codes in the internal notes, resolved to SKUs through
//!    the external lot log and filtered to SKUs the order actually carries.
//! 2. Bare `SLQ…` codes anywhere in the notes, resolved the same way.
//! 3. `SKU:<code> LOT:<code>` pairs in the two custom fields, first field
//!    then second; malformed pairs are logged and skipped individually.
//!
//! When no source yields anything, the reconciliation engine falls back to
//! one `UNKNOWN`-lot line per resolved item SKU.

use std::collections::{HashMap, HashSet};

use regex::Regex;

use tracelot_core::{canonicalize_sku, normalize_lot};

use crate::lot_log::LotLog;

/// One piece of (SKU, lot) evidence for an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LotCandidate {
    pub sku: String,
    pub lot: String,
}

/// Runs the priority ladder and returns the winning candidate list,
/// deduplicated by (SKU, lot) in discovery order.
#[must_use]
pub fn extract_candidates(
    internal_notes: Option<&str>,
    custom_field1: Option<&str>,
    custom_field2: Option<&str>,
    item_skus: &HashMap<String, i32>,
    lot_log: &LotLog,
) -> Vec<LotCandidate> {
    if let Some(notes) = internal_notes {
        let labeled = labeled_note_candidates(notes, item_skus, lot_log);
        if !labeled.is_empty() {
            return labeled;
        }
        let bare = bare_note_candidates(notes, item_skus, lot_log);
        if !bare.is_empty() {
            return bare;
        }
    }

    for field in [custom_field1, custom_field2] {
        if let Some(text) = field {
            let parsed = custom_field_candidates(text);
            if !parsed.is_empty() {
                return parsed;
            }
        }
    }

    Vec::new()
}

/// Collapses the winning candidate list into a SKU→lot map where the first
/// lot discovered for a SKU across the whole order wins.
#[must_use]
pub fn extract_lot_assignments(
    internal_notes: Option<&str>,
    custom_field1: Option<&str>,
    custom_field2: Option<&str>,
    item_skus: &HashMap<String, i32>,
    lot_log: &LotLog,
) -> HashMap<String, String> {
    let mut by_sku = HashMap::new();
    for candidate in extract_candidates(
        internal_notes,
        custom_field1,
        custom_field2,
        item_skus,
        lot_log,
    ) {
        by_sku.entry(candidate.sku).or_insert(candidate.lot);
    }
    by_sku
}

/// Stage 1: `LOT: <code>` markers in the internal notes.
fn labeled_note_candidates(
    notes: &str,
    item_skus: &HashMap<String, i32>,
    lot_log: &LotLog,
) -> Vec<LotCandidate> {
    let re = Regex::new(r"(?i)\bLOT:\s*([A-Z0-9][A-Z0-9-]*)").expect("valid lot marker regex");
    let codes = re
        .captures_iter(notes)
        .map(|c| c[1].to_owned())
        .collect::<Vec<_>>();
    resolve_note_codes(&codes, item_skus, lot_log)
}

/// Stage 2: bare prefix-plus-alphanumerics codes anywhere in the notes, for
/// lots not explicitly labeled `LOT:`.
fn bare_note_candidates(
    notes: &str,
    item_skus: &HashMap<String, i32>,
    lot_log: &LotLog,
) -> Vec<LotCandidate> {
    let re = Regex::new(r"(?i)\bSLQ-?[A-Z0-9]{5,}\b").expect("valid bare lot regex");
    let codes = re
        .find_iter(notes)
        .map(|m| m.as_str().to_owned())
        .collect::<Vec<_>>();
    resolve_note_codes(&codes, item_skus, lot_log)
}

/// Shared resolution for note-derived codes: normalize, look up the SKU in
/// the lot log, keep only SKUs the order's items actually resolved to, and
/// dedup by (SKU, lot).
fn resolve_note_codes(
    codes: &[String],
    item_skus: &HashMap<String, i32>,
    lot_log: &LotLog,
) -> Vec<LotCandidate> {
    let mut seen = HashSet::new();
    let mut candidates = Vec::new();
    for code in codes {
        let lot = normalize_lot(code);
        let Some(sku) = lot_log.lookup_sku(code) else {
            tracing::debug!(lot = %lot, "note lot code not present in lot log");
            continue;
        };
        if !item_skus.contains_key(sku) {
            tracing::debug!(lot = %lot, sku, "note lot resolves to a SKU the order does not carry");
            continue;
        }
        if seen.insert((sku.to_owned(), lot.clone())) {
            candidates.push(LotCandidate {
                sku: sku.to_owned(),
                lot,
            });
        }
    }
    candidates
}

/// Stage 3: `SKU:<code> LOT:<code>` pairs in one custom field. A pair whose
/// SKU part does not canonicalize is malformed; it is logged and skipped
/// without aborting the rest of the field.
fn custom_field_candidates(text: &str) -> Vec<LotCandidate> {
    let re = Regex::new(r"(?i)SKU:\s*([A-Z0-9-]+)\s+LOT:\s*([A-Z0-9-]+)")
        .expect("valid sku-lot pair regex");

    let mut seen = HashSet::new();
    let mut candidates = Vec::new();
    for caps in re.captures_iter(text) {
        let raw_sku = &caps[1];
        let Some(sku) = canonicalize_sku(raw_sku) else {
            tracing::warn!(raw_sku, "skipping malformed SKU:LOT pair in custom field");
            continue;
        };
        let lot = normalize_lot(&caps[2]);
        if seen.insert((sku.clone(), lot.clone())) {
            candidates.push(LotCandidate { sku, lot });
        }
    }
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item_skus(entries: &[(&str, i32)]) -> HashMap<String, i32> {
        entries
            .iter()
            .map(|(sku, qty)| ((*sku).to_owned(), *qty))
            .collect()
    }

    fn log() -> LotLog {
        LotLog::from_pairs([("ABC12345", "211410SPT"), ("DEF67890", "211610SPT")])
    }

    #[test]
    fn labeled_note_lot_resolves_through_lot_log() {
        let skus = item_skus(&[("211410SPT", 20)]);
        let candidates =
            extract_candidates(Some("LOT: ABC12345"), None, None, &skus, &log());
        assert_eq!(
            candidates,
            vec![LotCandidate {
                sku: "211410SPT".to_owned(),
                lot: "SLQ-ABC12345".to_owned(),
            }]
        );
    }

    #[test]
    fn labeled_lots_for_absent_skus_are_dropped() {
        // ABC12345 maps to 211410SPT, but the order only carries 211610SPT.
        let skus = item_skus(&[("211610SPT", 5)]);
        let candidates =
            extract_candidates(Some("LOT: ABC12345"), None, None, &skus, &log());
        assert!(candidates.is_empty());
    }

    #[test]
    fn repeated_labeled_lots_dedup() {
        let skus = item_skus(&[("211410SPT", 20)]);
        let candidates = extract_candidates(
            Some("LOT: ABC12345 and again LOT: ABC12345"),
            None,
            None,
            &skus,
            &log(),
        );
        assert_eq!(candidates.len(), 1);
    }

    #[test]
    fn labeled_notes_win_over_custom_fields() {
        // Priority is exclusive: when notes produce a valid pair, the custom
        // fields are never consulted, even though they carry a different lot.
        let skus = item_skus(&[("211410SPT", 20)]);
        let candidates = extract_candidates(
            Some("LOT: ABC12345"),
            Some("SKU:211410SPT LOT:ZZZ11111"),
            None,
            &skus,
            &log(),
        );
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].lot, "SLQ-ABC12345");
    }

    #[test]
    fn bare_codes_are_found_when_no_labeled_marker() {
        let skus = item_skus(&[("211610SPT", 5)]);
        let candidates = extract_candidates(
            Some("shipped from batch SLQ-DEF67890 today"),
            None,
            None,
            &skus,
            &log(),
        );
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].sku, "211610SPT");
        assert_eq!(candidates[0].lot, "SLQ-DEF67890");
    }

    #[test]
    fn custom_field_pairs_parse_when_notes_are_empty() {
        let skus = item_skus(&[("211410SPT", 20)]);
        let candidates = extract_candidates(
            None,
            Some("SKU:211410SPT LOT:XYZ99"),
            None,
            &skus,
            &log(),
        );
        assert_eq!(
            candidates,
            vec![LotCandidate {
                sku: "211410SPT".to_owned(),
                lot: "SLQ-XYZ99".to_owned(),
            }]
        );
    }

    #[test]
    fn second_custom_field_is_tried_when_first_yields_nothing() {
        let skus = item_skus(&[("211410SPT", 20)]);
        let candidates = extract_candidates(
            None,
            Some("no pairs here"),
            Some("SKU:211410SPT LOT:XYZ99"),
            &skus,
            &log(),
        );
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].lot, "SLQ-XYZ99");
    }

    #[test]
    fn malformed_custom_field_pair_is_skipped_not_fatal() {
        let skus = item_skus(&[("211410SPT", 20)]);
        let candidates = extract_candidates(
            None,
            Some("SKU:BOGUS LOT:AAA11 SKU:211410SPT LOT:BBB22"),
            None,
            &skus,
            &log(),
        );
        assert_eq!(candidates.len(), 1, "the well-formed pair survives");
        assert_eq!(candidates[0].lot, "SLQ-BBB22");
    }

    #[test]
    fn no_evidence_anywhere_yields_empty() {
        let skus = item_skus(&[("211410SPT", 20)]);
        let candidates =
            extract_candidates(Some("ship promptly"), Some("n/a"), Some(""), &skus, &log());
        assert!(candidates.is_empty());
    }

    #[test]
    fn assignments_keep_first_lot_per_sku() {
        let skus = item_skus(&[("211410SPT", 20), ("211610SPT", 5)]);
        let log = LotLog::from_pairs([
            ("AAA11111", "211410SPT"),
            ("BBB22222", "211410SPT"),
            ("CCC33333", "211610SPT"),
        ]);
        let assignments = extract_lot_assignments(
            Some("LOT: AAA11111 LOT: BBB22222 LOT: CCC33333"),
            None,
            None,
            &skus,
            &log,
        );
        assert_eq!(assignments.len(), 2);
        assert_eq!(assignments["211410SPT"], "SLQ-AAA11111");
        assert_eq!(assignments["211610SPT"], "SLQ-CCC33333");
    }
}
