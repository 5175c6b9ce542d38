//! Hybrid-score weight renormalization (spec.md §4.5 "Weight
//! renormalization"), grounded verbatim on `original_source/server/api.py`'s
//! three call sites (hybrid, venue, author search all perform the same
//! check before dispatching).

/// The legacy default weight. A caller-supplied weight equal to this value
/// is assumed to be the "unset" side when the pair doesn't sum to 1.
const LEGACY_DEFAULT_PAPER_WEIGHT: f64 = 0.4;

/// Snaps `(w_p, w_c)` to sum to 1 by replacing whichever side equals
/// [`LEGACY_DEFAULT_PAPER_WEIGHT`] with `1 - other`. Preserved for test
/// compatibility with the source behavior rather than redesigned into a
/// proportional renormalization (spec.md explicitly calls this out).
pub fn normalize_weights(w_p: f64, w_c: f64) -> (f64, f64) {
    if (w_p + w_c - 1.0).abs() < f64::EPSILON {
        return (w_p, w_c);
    }

    if (w_p - LEGACY_DEFAULT_PAPER_WEIGHT).abs() < f64::EPSILON {
        (1.0 - w_c, w_c)
    } else {
        (w_p, 1.0 - w_p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn already_normalized_pair_is_untouched() {
        assert_eq!(normalize_weights(0.7, 0.3), (0.7, 0.3));
    }

    #[test]
    fn default_paper_side_is_replaced() {
        assert_eq!(normalize_weights(0.4, 0.8), (0.2, 0.8));
    }

    #[test]
    fn non_default_paper_side_wins_when_default_is_ambiguous() {
        // w_p isn't the legacy default, so w_c is replaced instead.
        assert_eq!(normalize_weights(0.9, 0.4), (0.9, 0.1_f64));
    }

    #[test]
    fn both_default_snaps_by_replacing_concept_side() {
        // Tie-break: w_p == default takes priority, matching the source's
        // `if paper_weight == 0.4` check running before any `w_c` check.
        assert_eq!(normalize_weights(0.4, 0.4), (0.6, 0.4));
    }
}
