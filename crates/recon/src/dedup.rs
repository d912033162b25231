use std::cmp::Ordering;

use crate::model::ReconciledRow;
use crate::parse::parse_number;

/// Total order over referral ids: numeric ids first (by value, then text),
/// then non-numeric ids lexically, then nulls. Two ids compare equal only
/// when their text is identical.
pub fn cmp_referral_id(a: Option<&str>, b: Option<&str>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => match (parse_number(a), parse_number(b)) {
            (Some(x), Some(y)) => x.total_cmp(&y).then_with(|| a.cmp(b)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => a.cmp(b),
        },
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Descending with nulls last.
fn cmp_desc_nulls_last<T: Ord>(a: &Option<T>, b: &Option<T>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.cmp(a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Collapse rows to one per referral id.
///
/// Sort by referral id ascending, then local transaction time descending, then
/// `updated_at` descending (nulls last in both), and keep the first row of each id.
/// The sort is stable, so full ties keep input order. Rows with a null referral id
/// form a single group.
pub fn deduplicate(mut rows: Vec<ReconciledRow>) -> Vec<ReconciledRow> {
    rows.sort_by(|a, b| {
        cmp_referral_id(a.record.referral_id.as_deref(), b.record.referral_id.as_deref())
            .then_with(|| cmp_desc_nulls_last(&a.derived.transaction_at_local, &b.derived.transaction_at_local))
            .then_with(|| cmp_desc_nulls_last(&a.record.updated_at, &b.record.updated_at))
    });

    let mut out: Vec<ReconciledRow> = Vec::with_capacity(rows.len());
    for row in rows {
        let dup = out
            .last()
            .is_some_and(|prev| prev.record.referral_id == row.record.referral_id);
        if !dup {
            out.push(row);
        }
    }
    out
}
