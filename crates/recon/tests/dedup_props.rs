use chrono::{DateTime, NaiveDateTime, Utc};
use proptest::prelude::*;

use std::cmp::Ordering;

use referral_recon::dedup::{cmp_referral_id, deduplicate};
use referral_recon::model::{DerivedFields, ReconciledRow, ReferralRecord};
use referral_recon::validity::{ValidityRule, Verdict};

fn at(secs: i64) -> NaiveDateTime {
    DateTime::<Utc>::from_timestamp(secs, 0).unwrap().naive_utc()
}

fn row(referral_id: &str, tx_secs: Option<i64>, updated_secs: Option<i64>, tag: usize) -> ReconciledRow {
    ReconciledRow {
        cells: vec![Some(tag.to_string())],
        record: ReferralRecord {
            referral_id: Some(referral_id.to_string()),
            updated_at: updated_secs.and_then(|s| DateTime::<Utc>::from_timestamp(s, 0)),
            ..Default::default()
        },
        derived: DerivedFields {
            transaction_at_local: tx_secs.map(at),
            ..Default::default()
        },
        verdict: Verdict {
            valid: false,
            rule: ValidityRule::Default,
        },
    }
}

proptest! {
    /// Three rows for one referral with distinct transaction times: the latest wins,
    /// whatever the input order and whatever the updated_at values.
    #[test]
    fn latest_transaction_always_kept(
        base in 1_600_000_000i64..1_700_000_000,
        gaps in (1i64..1_000_000, 1i64..1_000_000),
        updated in proptest::collection::vec(proptest::option::of(1_600_000_000i64..1_800_000_000), 3),
        rotation in 0usize..3,
    ) {
        let t2 = base;
        let t1 = t2 + gaps.0;
        let t3 = t1 + gaps.1;

        let mut rows = vec![
            row("42", Some(t1), updated[0], 1),
            row("42", Some(t2), updated[1], 2),
            row("42", Some(t3), updated[2], 3),
        ];
        rows.rotate_left(rotation);
        rows.push(row("7", None, None, 99));

        let out = deduplicate(rows);
        prop_assert_eq!(out.len(), 2);
        let kept = out
            .iter()
            .find(|r| r.record.referral_id.as_deref() == Some("42"))
            .unwrap();
        prop_assert_eq!(kept.derived.transaction_at_local, Some(at(t3)));
    }

    /// Every distinct referral id survives exactly once, in strictly ascending id
    /// order, even when numeric and alphanumeric ids are mixed.
    #[test]
    fn one_row_per_referral_id(
        ids in proptest::collection::vec(
            prop_oneof!["[0-9]{1,2}", "[0-9][a-z]", "[a-z]{1,2}"],
            0..60,
        ),
    ) {
        let rows: Vec<ReconciledRow> = ids
            .iter()
            .enumerate()
            .map(|(i, id)| row(id, Some(i as i64), None, i))
            .collect();

        let out = deduplicate(rows);
        let mut distinct = ids.clone();
        distinct.sort_unstable();
        distinct.dedup();
        prop_assert_eq!(out.len(), distinct.len());

        for pair in out.windows(2) {
            prop_assert_eq!(
                cmp_referral_id(pair[0].record.referral_id.as_deref(), pair[1].record.referral_id.as_deref()),
                Ordering::Less
            );
        }
    }
}
