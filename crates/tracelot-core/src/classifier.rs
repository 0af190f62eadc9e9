//! Pack/unit disambiguation for order line items.
//!
//! Devices ship either as single units or as 10-packs, and the vendor feed
//! does not say which a line item is. Item names sometimes state it
//! outright; when they don't, the observed weight-per-line-quantity is
//! compared against running per-SKU baselines learned from the explicitly
//! labeled items seen earlier in the same run.
//!
//! [`ClassifierState`] starts cold on every sync run. Until an explicitly
//! labeled exemplar for a SKU has been observed, ambiguous items for that
//! SKU fall through to the default-to-singles rule — implementation-defined
//! behavior carried over from the production heuristic, preserved as-is.

use std::collections::HashMap;

/// Units contained in one pack.
pub const UNITS_PER_PACK: i32 = 10;

/// Item-name markers that explicitly state a 10-pack, uppercased.
const PACK_MARKERS: [&str; 3] = ["10-PACK", "10 PACK", "10PACK"];

/// Item-name marker that explicitly states a single unit, uppercased.
const SINGLE_MARKER: &str = "SINGLE";

/// With only a pack baseline, ratios above this fraction of the pack mean
/// classify as packs.
const PACK_ONLY_FLOOR: f64 = 0.75;

/// With only a unit baseline, ratios below this multiple of the unit mean
/// classify as singles.
const UNIT_ONLY_CEILING: f64 = 1.25;

/// A line item as seen by the classifier: display name, line quantity, the
/// line's total weight if the vendor reported one, and the canonical SKU if
/// the item resolved to one.
#[derive(Debug, Clone, Copy)]
pub struct ItemMeasure<'a> {
    pub name: &'a str,
    pub quantity: i32,
    pub total_weight: Option<f64>,
    pub sku: Option<&'a str>,
}

/// Running mean of observed weight-per-line-quantity for one SKU.
#[derive(Debug, Default, Clone)]
struct Baseline {
    total_weight: f64,
    observations: u32,
}

impl Baseline {
    fn add(&mut self, per_quantity_weight: f64) {
        self.total_weight += per_quantity_weight;
        self.observations += 1;
    }

    fn mean(&self) -> Option<f64> {
        if self.observations == 0 {
            None
        } else {
            Some(self.total_weight / f64::from(self.observations))
        }
    }
}

/// Per-run weight baselines, segmented by pack/single, keyed by canonical
/// SKU. Passed explicitly through the run — never process-global — so
/// independent runs cannot cross-contaminate.
#[derive(Debug, Default, Clone)]
pub struct ClassifierState {
    pack: HashMap<String, Baseline>,
    unit: HashMap<String, Baseline>,
}

impl ClassifierState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records weight evidence from an item whose name explicitly states
    /// pack or single. Items without an explicit marker, without a weight,
    /// or without a positive quantity teach nothing.
    pub fn observe(&mut self, item: &ItemMeasure<'_>) {
        let (Some(sku), Some(weight)) = (item.sku, item.total_weight) else {
            return;
        };
        if item.quantity <= 0 || weight <= 0.0 {
            return;
        }
        let ratio = weight / f64::from(item.quantity);
        let upper = item.name.to_uppercase();
        if PACK_MARKERS.iter().any(|m| upper.contains(m)) {
            self.pack.entry(sku.to_owned()).or_default().add(ratio);
        } else if upper.contains(SINGLE_MARKER) {
            self.unit.entry(sku.to_owned()).or_default().add(ratio);
        }
    }

    fn pack_mean(&self, sku: &str) -> Option<f64> {
        self.pack.get(sku).and_then(Baseline::mean)
    }

    fn unit_mean(&self, sku: &str) -> Option<f64> {
        self.unit.get(sku).and_then(Baseline::mean)
    }
}

/// Splits a line quantity into `(packs, units)` where exactly one side is
/// nonzero and `units == quantity` or `units == packs * 10`.
///
/// Priority order, first match wins:
/// 1. Quantity ≤ 0 → `(0, 0)`.
/// 2. Name carries a 10-pack marker → the full quantity counts packs.
/// 3. Name carries a single marker → the full quantity counts units.
/// 4. With a canonical SKU and a reported weight, the per-quantity weight
///    ratio is compared against the run's baselines: closer mean wins when
///    both exist; with only one baseline, the 0.75×/1.25× threshold rules
///    apply.
/// 5. Default: treat as singles.
#[must_use]
pub fn classify_quantity(item: &ItemMeasure<'_>, state: &ClassifierState) -> (i32, i32) {
    if item.quantity <= 0 {
        return (0, 0);
    }

    let as_packs = (item.quantity, item.quantity * UNITS_PER_PACK);
    let as_units = (0, item.quantity);

    let upper = item.name.to_uppercase();
    if PACK_MARKERS.iter().any(|m| upper.contains(m)) {
        return as_packs;
    }
    if upper.contains(SINGLE_MARKER) {
        return as_units;
    }

    if let (Some(sku), Some(weight)) = (item.sku, item.total_weight) {
        if weight > 0.0 {
            let ratio = weight / f64::from(item.quantity);
            match (state.pack_mean(sku), state.unit_mean(sku)) {
                (Some(pack), Some(unit)) => {
                    if (ratio - pack).abs() < (ratio - unit).abs() {
                        return as_packs;
                    }
                    return as_units;
                }
                (Some(pack), None) => {
                    if ratio > PACK_ONLY_FLOOR * pack {
                        return as_packs;
                    }
                    return as_units;
                }
                (None, Some(unit)) => {
                    if ratio < UNIT_ONLY_CEILING * unit {
                        return as_units;
                    }
                    return as_packs;
                }
                (None, None) => {}
            }
        }
    }

    as_units
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item<'a>(
        name: &'a str,
        quantity: i32,
        total_weight: Option<f64>,
        sku: Option<&'a str>,
    ) -> ItemMeasure<'a> {
        ItemMeasure {
            name,
            quantity,
            total_weight,
            sku,
        }
    }

    fn assert_sum_invariant(packs: i32, units: i32) {
        assert!(
            packs == 0 || units == packs * UNITS_PER_PACK,
            "units must equal packs*10 when packs are counted: ({packs}, {units})"
        );
    }

    #[test]
    fn non_positive_quantity_yields_zero() {
        let state = ClassifierState::new();
        assert_eq!(classify_quantity(&item("10-Pack", 0, None, None), &state), (0, 0));
        assert_eq!(classify_quantity(&item("Single", -3, None, None), &state), (0, 0));
    }

    #[test]
    fn pack_marker_counts_full_quantity_as_packs() {
        let state = ClassifierState::new();
        for name in ["10-Pack Catheter", "Catheter 10 Pack", "10PACK kit"] {
            let (packs, units) = classify_quantity(&item(name, 2, None, None), &state);
            assert_eq!((packs, units), (2, 20), "for name {name:?}");
            assert_sum_invariant(packs, units);
        }
    }

    #[test]
    fn single_marker_counts_full_quantity_as_units() {
        let state = ClassifierState::new();
        assert_eq!(
            classify_quantity(&item("Single 14Fr Catheter", 5, None, None), &state),
            (0, 5)
        );
    }

    #[test]
    fn name_marker_wins_over_weight_evidence() {
        let mut state = ClassifierState::new();
        state.observe(&item("Single unit", 1, Some(1.0), Some("211410SPT")));
        // Weight looks nothing like a single, but the name says single.
        assert_eq!(
            classify_quantity(&item("Single", 2, Some(40.0), Some("211410SPT")), &state),
            (0, 2)
        );
    }

    #[test]
    fn cold_state_defaults_to_singles() {
        // First ambiguous occurrence of a SKU in a run has no baseline to
        // consult and falls through to the singles default, whatever the
        // true pack size was. Carried over from the production heuristic.
        let state = ClassifierState::new();
        assert_eq!(
            classify_quantity(&item("Catheter Tray", 4, Some(40.0), Some("211410SPT")), &state),
            (0, 4)
        );
    }

    #[test]
    fn both_baselines_pick_numerically_closer_mean() {
        let mut state = ClassifierState::new();
        state.observe(&item("10-Pack", 1, Some(10.0), Some("211410SPT")));
        state.observe(&item("Single", 1, Some(1.0), Some("211410SPT")));

        // Ratio 9.0 is closer to the pack mean (10.0) than the unit mean (1.0).
        let (packs, units) =
            classify_quantity(&item("Catheter", 2, Some(18.0), Some("211410SPT")), &state);
        assert_eq!((packs, units), (2, 20));
        assert_sum_invariant(packs, units);

        // Ratio 1.5 is closer to the unit mean.
        assert_eq!(
            classify_quantity(&item("Catheter", 2, Some(3.0), Some("211410SPT")), &state),
            (0, 2)
        );
    }

    #[test]
    fn pack_only_baseline_uses_three_quarters_floor() {
        let mut state = ClassifierState::new();
        state.observe(&item("10-Pack", 1, Some(10.0), Some("211410SPT")));

        // 8.0 > 0.75 * 10.0 → pack.
        assert_eq!(
            classify_quantity(&item("Catheter", 1, Some(8.0), Some("211410SPT")), &state),
            (1, 10)
        );
        // 7.0 < 7.5 → single.
        assert_eq!(
            classify_quantity(&item("Catheter", 1, Some(7.0), Some("211410SPT")), &state),
            (0, 1)
        );
    }

    #[test]
    fn unit_only_baseline_uses_five_quarters_ceiling() {
        let mut state = ClassifierState::new();
        state.observe(&item("Single", 1, Some(1.0), Some("211410SPT")));

        // 1.2 < 1.25 * 1.0 → single.
        assert_eq!(
            classify_quantity(&item("Catheter", 3, Some(3.6), Some("211410SPT")), &state),
            (0, 3)
        );
        // 1.3 ≥ 1.25 → pack.
        assert_eq!(
            classify_quantity(&item("Catheter", 3, Some(3.9), Some("211410SPT")), &state),
            (3, 30)
        );
    }

    #[test]
    fn baselines_are_per_sku() {
        let mut state = ClassifierState::new();
        state.observe(&item("10-Pack", 1, Some(10.0), Some("211410SPT")));

        // A different SKU has no baseline and falls to the singles default.
        assert_eq!(
            classify_quantity(&item("Catheter", 1, Some(10.0), Some("211610SPT")), &state),
            (0, 1)
        );
    }

    #[test]
    fn observe_ignores_unlabeled_and_weightless_items() {
        let mut state = ClassifierState::new();
        state.observe(&item("Catheter Tray", 1, Some(10.0), Some("211410SPT")));
        state.observe(&item("10-Pack", 1, None, Some("211410SPT")));
        state.observe(&item("10-Pack", 0, Some(10.0), Some("211410SPT")));
        state.observe(&item("10-Pack", 1, Some(10.0), None));
        assert!(state.pack_mean("211410SPT").is_none());
        assert!(state.unit_mean("211410SPT").is_none());
    }

    #[test]
    fn observed_means_accumulate() {
        let mut state = ClassifierState::new();
        state.observe(&item("10-Pack", 1, Some(10.0), Some("211410SPT")));
        state.observe(&item("10-Pack", 2, Some(24.0), Some("211410SPT")));
        let mean = state.pack_mean("211410SPT").unwrap();
        assert!((mean - 11.0).abs() < 1e-9, "mean was {mean}");
    }
}
