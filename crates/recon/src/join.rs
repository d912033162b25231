//! Join Engine — left-joins the referral table against its auxiliary sources.
//!
//! Every join is optional. A join runs only when the left key column exists,
//! the right key column exists and the right table has rows; otherwise the
//! referral rows pass through untouched and the skip is recorded.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::aggregate::aggregate_event_log;
use crate::model::columns::{
    ID, LEAD_ID, REFERRAL_REWARD_ID, REFERRER_ID, TRANSACTION_ID, USER_REFERRAL_ID,
    USER_REFERRAL_STATUS_ID,
};
use crate::model::{SkippedJoin, Source, SourceTables};
use crate::parse::normalize_key;
use crate::table::Table;

/// One auxiliary join: right side is prefixed, then matched on `left_key ↔ right_key`.
/// `right_key` names the column *after* prefixing.
#[derive(Debug, Clone, Copy)]
pub struct JoinSpec {
    pub source: Source,
    pub prefix: &'static str,
    pub left_key: &'static str,
    pub right_key: &'static str,
}

/// Prefixed joins, in execution order. The event-log join runs after these.
pub const JOIN_PLAN: [JoinSpec; 5] = [
    JoinSpec { source: Source::Rewards, prefix: "reward_", left_key: REFERRAL_REWARD_ID, right_key: "reward_id" },
    JoinSpec { source: Source::Statuses, prefix: "status_", left_key: USER_REFERRAL_STATUS_ID, right_key: "status_id" },
    JoinSpec { source: Source::PaidTransactions, prefix: "tx_", left_key: TRANSACTION_ID, right_key: "tx_transaction_id" },
    JoinSpec { source: Source::UserLogs, prefix: "referrer_", left_key: REFERRER_ID, right_key: "referrer_user_id" },
    JoinSpec { source: Source::LeadLogs, prefix: "lead_", left_key: LEAD_ID, right_key: "lead_lead_id" },
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinOutcome {
    Joined { matched_rows: usize },
    Skipped(String),
}

/// Left-join `right` onto `left` when both key columns exist and `right` has rows.
///
/// Right keys are unique per match: a repeated right key keeps its first row so the
/// result has exactly one row per left row, in left order. Right columns that collide
/// with an existing left column get a `_y` suffix.
pub fn join_if_possible(left: Table, right: &Table, left_key: &str, right_key: &str) -> (Table, JoinOutcome) {
    let Some(left_idx) = left.column_index(left_key) else {
        return (left, JoinOutcome::Skipped(format!("left key '{left_key}' missing")));
    };
    if right.is_empty() {
        return (left, JoinOutcome::Skipped("source is empty".into()));
    }
    let Some(right_idx) = right.column_index(right_key) else {
        return (left, JoinOutcome::Skipped(format!("right key '{right_key}' missing")));
    };

    let mut index: HashMap<String, usize> = HashMap::new();
    let mut duplicate_keys = 0usize;
    for (i, row) in right.rows.iter().enumerate() {
        let Some(key) = row.get(right_idx).and_then(|c| c.as_deref()).and_then(normalize_key) else {
            continue;
        };
        if index.contains_key(&key) {
            duplicate_keys += 1;
        } else {
            index.insert(key, i);
        }
    }
    if duplicate_keys > 0 {
        warn!(source = %right.name, key = right_key, duplicate_keys, "repeated right key, keeping first row");
    }

    let mut columns = left.columns.clone();
    for c in &right.columns {
        if columns.contains(c) {
            columns.push(format!("{c}_y"));
        } else {
            columns.push(c.clone());
        }
    }

    let left_width = left.columns.len();
    let width = right.columns.len();
    let mut matched_rows = 0usize;
    let rows = left
        .rows
        .into_iter()
        .map(|mut row| {
            let hit = row
                .get(left_idx)
                .and_then(|c| c.as_deref())
                .and_then(normalize_key)
                .and_then(|k| index.get(&k).copied());
            // ragged rows are padded so right columns line up with the header
            row.resize(left_width, None);
            if let Some(r) = hit {
                matched_rows += 1;
                row.extend(right.rows[r].iter().take(width).cloned());
            }
            row.resize(left_width + width, None);
            row
        })
        .collect();

    let joined = Table {
        name: left.name,
        columns,
        rows,
    };
    (joined, JoinOutcome::Joined { matched_rows })
}

/// The enriched referral table plus a record of which joins ran.
#[derive(Debug, Clone)]
pub struct Enriched {
    pub table: Table,
    pub joined: Vec<Source>,
    pub skipped: Vec<SkippedJoin>,
}

/// Run every auxiliary join against the referral table. Auxiliary tables are only read.
pub fn enrich(tables: &SourceTables) -> Enriched {
    let mut table = tables.referrals.clone();
    let mut joined = Vec::new();
    let mut skipped = Vec::new();

    let mut record = |source: Source, outcome: JoinOutcome| match outcome {
        JoinOutcome::Joined { matched_rows } => {
            debug!(%source, matched_rows, "joined");
            joined.push(source);
        }
        JoinOutcome::Skipped(reason) => {
            debug!(%source, %reason, "join skipped");
            skipped.push(SkippedJoin { source, reason });
        }
    };

    if table.is_empty() {
        for spec in &JOIN_PLAN {
            record(spec.source, JoinOutcome::Skipped("referral table is empty".into()));
        }
        record(Source::ReferralLogs, JoinOutcome::Skipped("referral table is empty".into()));
        return Enriched { table, joined, skipped };
    }

    for spec in &JOIN_PLAN {
        let right = tables.get(spec.source).with_prefix(spec.prefix);
        let (next, outcome) = join_if_possible(table, &right, spec.left_key, spec.right_key);
        table = next;
        record(spec.source, outcome);
    }

    let events = &tables.referral_logs;
    if events.is_empty() {
        record(Source::ReferralLogs, JoinOutcome::Skipped("source is empty".into()));
    } else if !events.has_column(USER_REFERRAL_ID) {
        record(
            Source::ReferralLogs,
            JoinOutcome::Skipped(format!("right key '{USER_REFERRAL_ID}' missing")),
        );
    } else {
        let agg = aggregate_event_log(events);
        let (next, outcome) = join_if_possible(table, &agg, ID, USER_REFERRAL_ID);
        table = next;
        record(Source::ReferralLogs, outcome);
    }

    Enriched { table, joined, skipped }
}
