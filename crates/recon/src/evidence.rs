use std::collections::BTreeMap;

use crate::model::{ReconSummary, ReconciledRow, SkippedJoin, Source};

/// Compute summary statistics for a run from the deduplicated rows.
pub fn compute_summary(
    referral_rows_in: usize,
    joined: &[Source],
    skipped: &[SkippedJoin],
    rows: &[ReconciledRow],
) -> ReconSummary {
    let mut rule_counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut valid = 0;
    let mut invalid = 0;

    for r in rows {
        *rule_counts.entry(r.verdict.rule.to_string()).or_insert(0) += 1;
        if r.verdict.valid {
            valid += 1;
        } else {
            invalid += 1;
        }
    }

    ReconSummary {
        referral_rows_in,
        rows_out: rows.len(),
        duplicates_dropped: referral_rows_in.saturating_sub(rows.len()),
        valid,
        invalid,
        rule_counts,
        sources_joined: joined.to_vec(),
        sources_skipped: skipped.to_vec(),
        sources_profiled: Vec::new(),
    }
}
