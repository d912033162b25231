use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;

use crate::parse::{parse_bool, parse_number, parse_timestamp};
use crate::table::{Cell, Table};

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

/// The seven input sources of a referral reconciliation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Referrals,
    PaidTransactions,
    Rewards,
    UserLogs,
    LeadLogs,
    ReferralLogs,
    Statuses,
}

impl Source {
    /// Profiling order.
    pub const ALL: [Source; 7] = [
        Source::Referrals,
        Source::PaidTransactions,
        Source::Rewards,
        Source::UserLogs,
        Source::LeadLogs,
        Source::ReferralLogs,
        Source::Statuses,
    ];

    /// Name used for the profile file (`profile_<name>.csv`) and in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Referrals => "user_referrals",
            Self::PaidTransactions => "paid_transactions",
            Self::Rewards => "referral_rewards",
            Self::UserLogs => "user_logs",
            Self::LeadLogs => "lead_logs",
            Self::ReferralLogs => "user_referral_logs",
            Self::Statuses => "user_referral_statuses",
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// All loaded input tables. A missing source is an empty table, never an absent field.
#[derive(Debug, Clone)]
pub struct SourceTables {
    pub referrals: Table,
    pub paid_transactions: Table,
    pub rewards: Table,
    pub user_logs: Table,
    pub lead_logs: Table,
    pub referral_logs: Table,
    pub statuses: Table,
}

impl SourceTables {
    pub fn empty() -> Self {
        Self {
            referrals: Table::empty(Source::Referrals.name()),
            paid_transactions: Table::empty(Source::PaidTransactions.name()),
            rewards: Table::empty(Source::Rewards.name()),
            user_logs: Table::empty(Source::UserLogs.name()),
            lead_logs: Table::empty(Source::LeadLogs.name()),
            referral_logs: Table::empty(Source::ReferralLogs.name()),
            statuses: Table::empty(Source::Statuses.name()),
        }
    }

    pub fn get(&self, source: Source) -> &Table {
        match source {
            Source::Referrals => &self.referrals,
            Source::PaidTransactions => &self.paid_transactions,
            Source::Rewards => &self.rewards,
            Source::UserLogs => &self.user_logs,
            Source::LeadLogs => &self.lead_logs,
            Source::ReferralLogs => &self.referral_logs,
            Source::Statuses => &self.statuses,
        }
    }

    pub fn set(&mut self, source: Source, table: Table) {
        let slot = match source {
            Source::Referrals => &mut self.referrals,
            Source::PaidTransactions => &mut self.paid_transactions,
            Source::Rewards => &mut self.rewards,
            Source::UserLogs => &mut self.user_logs,
            Source::LeadLogs => &mut self.lead_logs,
            Source::ReferralLogs => &mut self.referral_logs,
            Source::Statuses => &mut self.statuses,
        };
        *slot = table;
    }
}

// ---------------------------------------------------------------------------
// Typed record view
// ---------------------------------------------------------------------------

/// Column positions in the enriched table for every field the later stages read.
/// Resolved once per table; a column the joins did not produce stays `None`.
#[derive(Debug, Clone, Default)]
pub struct RecordColumns {
    referral_id: Option<usize>,
    transaction_id: Option<usize>,
    referral_source: Option<usize>,
    referral_status: Option<usize>,
    referral_at: Option<usize>,
    updated_at: Option<usize>,
    reward_value: Option<usize>,
    status_description: Option<usize>,
    tx_transaction_at: Option<usize>,
    tx_transaction_status: Option<usize>,
    tx_transaction_type: Option<usize>,
    tx_timezone: Option<usize>,
    referrer_timezone: Option<usize>,
    referrer_is_deleted: Option<usize>,
    referrer_membership_expired_date: Option<usize>,
    lead_source_category: Option<usize>,
    log_is_reward_granted: Option<usize>,
    log_created_at: Option<usize>,
}

pub mod columns {
    pub const REFERRAL_ID: &str = "referral_id";
    pub const ID: &str = "id";
    pub const REFERRER_ID: &str = "referrer_id";
    pub const LEAD_ID: &str = "lead_id";
    pub const TRANSACTION_ID: &str = "transaction_id";
    pub const REFERRAL_SOURCE: &str = "referral_source";
    pub const REFERRAL_STATUS: &str = "referral_status";
    pub const REFERRAL_REWARD_ID: &str = "referral_reward_id";
    pub const USER_REFERRAL_STATUS_ID: &str = "user_referral_status_id";
    pub const REFERRAL_AT: &str = "referral_at";
    pub const UPDATED_AT: &str = "updated_at";

    pub const REWARD_VALUE: &str = "reward_reward_value";
    pub const STATUS_DESCRIPTION: &str = "status_description";
    pub const TX_TRANSACTION_AT: &str = "tx_transaction_at";
    pub const TX_TRANSACTION_STATUS: &str = "tx_transaction_status";
    pub const TX_TRANSACTION_TYPE: &str = "tx_transaction_type";
    pub const TX_TIMEZONE: &str = "tx_timezone_transaction";
    pub const REFERRER_TIMEZONE: &str = "referrer_timezone_homeclub";
    pub const REFERRER_IS_DELETED: &str = "referrer_is_deleted";
    pub const REFERRER_MEMBERSHIP_EXPIRED: &str = "referrer_membership_expired_date";
    pub const LEAD_SOURCE_CATEGORY: &str = "lead_source_category";

    pub const USER_REFERRAL_ID: &str = "user_referral_id";
    pub const LOG_IS_REWARD_GRANTED: &str = "log_is_reward_granted";
    pub const LOG_CREATED_AT: &str = "log_created_at";

    /// Columns whose cells are re-rendered in normalized form in the final report.
    pub const COERCED: [&str; 5] = [
        REWARD_VALUE,
        REFERRAL_AT,
        UPDATED_AT,
        TX_TRANSACTION_AT,
        LOG_CREATED_AT,
    ];
}

impl RecordColumns {
    pub fn resolve(table: &Table) -> Self {
        use columns::*;
        let idx = |name: &str| table.column_index(name);
        Self {
            referral_id: idx(REFERRAL_ID),
            transaction_id: idx(TRANSACTION_ID),
            referral_source: idx(REFERRAL_SOURCE),
            referral_status: idx(REFERRAL_STATUS),
            referral_at: idx(REFERRAL_AT),
            updated_at: idx(UPDATED_AT),
            reward_value: idx(REWARD_VALUE),
            status_description: idx(STATUS_DESCRIPTION),
            tx_transaction_at: idx(TX_TRANSACTION_AT),
            tx_transaction_status: idx(TX_TRANSACTION_STATUS),
            tx_transaction_type: idx(TX_TRANSACTION_TYPE),
            tx_timezone: idx(TX_TIMEZONE),
            referrer_timezone: idx(REFERRER_TIMEZONE),
            referrer_is_deleted: idx(REFERRER_IS_DELETED),
            referrer_membership_expired_date: idx(REFERRER_MEMBERSHIP_EXPIRED),
            lead_source_category: idx(LEAD_SOURCE_CATEGORY),
            log_is_reward_granted: idx(LOG_IS_REWARD_GRANTED),
            log_created_at: idx(LOG_CREATED_AT),
        }
    }

    pub fn read(&self, row: &[Cell]) -> ReferralRecord {
        let text = |i: Option<usize>| -> Option<String> {
            i.and_then(|i| row.get(i)).and_then(|c| c.clone())
        };
        let ts = |i: Option<usize>| text(i).as_deref().and_then(parse_timestamp);

        ReferralRecord {
            referral_id: text(self.referral_id),
            transaction_id: text(self.transaction_id),
            referral_source: text(self.referral_source),
            referral_status: text(self.referral_status),
            referral_at: ts(self.referral_at),
            updated_at: ts(self.updated_at),
            reward_value: text(self.reward_value).as_deref().and_then(parse_number),
            status_description: text(self.status_description),
            transaction_at: ts(self.tx_transaction_at),
            transaction_status: text(self.tx_transaction_status),
            transaction_type: text(self.tx_transaction_type),
            transaction_timezone: text(self.tx_timezone),
            referrer_timezone: text(self.referrer_timezone),
            referrer_is_deleted: text(self.referrer_is_deleted).as_deref().and_then(parse_bool),
            referrer_membership_expired_date: text(self.referrer_membership_expired_date),
            lead_source_category: text(self.lead_source_category),
            log_is_reward_granted: text(self.log_is_reward_granted).as_deref().and_then(parse_bool),
            log_created_at: ts(self.log_created_at),
        }
    }
}

/// Typed view of one enriched referral row, with coercions already applied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReferralRecord {
    pub referral_id: Option<String>,
    pub transaction_id: Option<String>,
    pub referral_source: Option<String>,
    pub referral_status: Option<String>,
    pub referral_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub reward_value: Option<f64>,
    pub status_description: Option<String>,
    pub transaction_at: Option<DateTime<Utc>>,
    pub transaction_status: Option<String>,
    pub transaction_type: Option<String>,
    pub transaction_timezone: Option<String>,
    pub referrer_timezone: Option<String>,
    pub referrer_is_deleted: Option<bool>,
    pub referrer_membership_expired_date: Option<String>,
    pub lead_source_category: Option<String>,
    pub log_is_reward_granted: Option<bool>,
    pub log_created_at: Option<DateTime<Utc>>,
}

/// Columns appended by the derivation stage, in output order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DerivedFields {
    pub referral_source_category: Option<String>,
    pub referral_at_local: Option<NaiveDateTime>,
    pub transaction_at_local: Option<NaiveDateTime>,
    pub referral_status_norm: String,
    pub transaction_status_norm: String,
    pub transaction_type_norm: String,
    pub reward_granted_flag: bool,
    pub has_transaction: bool,
    pub tx_after_referral: bool,
    pub tx_same_month: bool,
    pub referrer_membership_valid: bool,
}

impl DerivedFields {
    pub const COLUMNS: [&'static str; 10] = [
        "referral_source_category",
        "referral_at_local",
        "transaction_at_local",
        "referral_status_norm",
        "transaction_status_norm",
        "transaction_type_norm",
        "reward_granted_flag",
        "tx_after_referral",
        "tx_same_month",
        "referrer_membership_valid",
    ];
}

/// One referral row after join, derivation and validity evaluation.
#[derive(Debug, Clone)]
pub struct ReconciledRow {
    /// Raw enriched cells, in the enriched table's column order.
    pub cells: Vec<Cell>,
    pub record: ReferralRecord,
    pub derived: DerivedFields,
    pub verdict: crate::validity::Verdict,
}

// ---------------------------------------------------------------------------
// Join report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedJoin {
    pub source: Source,
    pub reason: String,
}

// ---------------------------------------------------------------------------
// Summary + Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReconSummary {
    pub referral_rows_in: usize,
    pub rows_out: usize,
    pub duplicates_dropped: usize,
    pub valid: usize,
    pub invalid: usize,
    pub rule_counts: BTreeMap<String, usize>,
    pub sources_joined: Vec<Source>,
    pub sources_skipped: Vec<SkippedJoin>,
    pub sources_profiled: Vec<Source>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconMeta {
    pub config_name: String,
    pub engine_version: String,
    pub run_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconResult {
    pub meta: ReconMeta,
    pub summary: ReconSummary,
    /// The deduplicated final report as written to the sink.
    #[serde(skip)]
    pub report: Table,
}
