use std::collections::BTreeMap;

use tracing::{info, warn};

use crate::config::ReconConfig;
use crate::dedup::deduplicate;
use crate::derive::derive;
use crate::error::ReconError;
use crate::evidence::compute_summary;
use crate::join::{enrich, Enriched};
use crate::model::columns::{self, COERCED};
use crate::model::{
    DerivedFields, RecordColumns, ReconMeta, ReconResult, ReconSummary, ReconciledRow, Source,
    SourceTables,
};
use crate::parse::{render_bool, render_instant, render_local};
use crate::profile::{profile_as_table, profile_table};
use crate::table::{Cell, Table};
use crate::validity::{evaluate, RuleInput};

pub const IS_VALID_COLUMN: &str = "is_business_logic_valid";
pub const VALIDITY_RULE_COLUMN: &str = "validity_rule";

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

/// Supplies the input tables. A source that does not exist is `Ok(Table::empty(..))`.
pub trait Loader {
    fn load(&self, source: Source) -> Result<Table, ReconError>;
}

/// Persists the profiling tables and the final report.
pub trait ReportSink {
    fn write_profile(&mut self, source: Source, profile: &Table) -> Result<(), ReconError>;
    fn write_report(&mut self, report: &Table) -> Result<(), ReconError>;
}

impl Loader for SourceTables {
    fn load(&self, source: Source) -> Result<Table, ReconError> {
        Ok(self.get(source).clone())
    }
}

/// Sink that keeps everything in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub profiles: BTreeMap<Source, Table>,
    pub report: Option<Table>,
}

impl ReportSink for MemorySink {
    fn write_profile(&mut self, source: Source, profile: &Table) -> Result<(), ReconError> {
        self.profiles.insert(source, profile.clone());
        Ok(())
    }

    fn write_report(&mut self, report: &Table) -> Result<(), ReconError> {
        self.report = Some(report.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Load every source. Load failures degrade to an empty table.
pub fn load_sources(loader: &dyn Loader) -> SourceTables {
    let mut tables = SourceTables::empty();
    for source in Source::ALL {
        match loader.load(source) {
            Ok(table) => {
                info!(%source, rows = table.len(), columns = table.columns.len(), "loaded");
                tables.set(source, table);
            }
            Err(e) => warn!(%source, error = %e, "source unavailable, treating as empty"),
        }
    }
    tables
}

/// Output of the pure reconciliation core.
#[derive(Debug, Clone)]
pub struct Reconciliation {
    pub report: Table,
    pub rows: Vec<ReconciledRow>,
    pub summary: ReconSummary,
}

/// Join, derive, evaluate and deduplicate. No IO.
pub fn reconcile(tables: &SourceTables) -> Reconciliation {
    let referral_rows_in = tables.referrals.len();
    let Enriched { table, joined, skipped } = enrich(tables);
    info!(rows = table.len(), joined = joined.len(), skipped = skipped.len(), "join stage done");

    let cols = RecordColumns::resolve(&table);
    let rows: Vec<ReconciledRow> = table
        .rows
        .iter()
        .map(|cells| {
            let record = cols.read(cells);
            let derived = derive(&record);
            let verdict = evaluate(&RuleInput::new(&record, &derived));
            ReconciledRow {
                cells: cells.clone(),
                record,
                derived,
                verdict,
            }
        })
        .collect();

    let rows = deduplicate(rows);
    let summary = compute_summary(referral_rows_in, &joined, &skipped, &rows);
    info!(rows_out = summary.rows_out, valid = summary.valid, invalid = summary.invalid, "reconciled");

    let report = build_report(&table, &rows);
    Reconciliation { report, rows, summary }
}

/// Final table: enriched columns (coerced ones re-rendered), then derived columns,
/// then the validity flag and the rule that decided it.
pub fn build_report(enriched: &Table, rows: &[ReconciledRow]) -> Table {
    let mut header = enriched.columns.clone();
    header.extend(DerivedFields::COLUMNS.iter().map(|c| c.to_string()));
    header.push(IS_VALID_COLUMN.into());
    header.push(VALIDITY_RULE_COLUMN.into());

    let coerced: Vec<(usize, &str)> = COERCED
        .iter()
        .filter_map(|name| enriched.column_index(name).map(|i| (i, *name)))
        .collect();

    let mut report = Table::new(enriched.name.clone(), header);
    report.rows = rows
        .iter()
        .map(|row| {
            let mut cells = row.cells.clone();
            cells.resize(enriched.columns.len(), None);
            for &(i, name) in &coerced {
                cells[i] = coerced_cell(row, name);
            }
            cells.extend(derived_cells(&row.derived));
            cells.push(Some(render_bool(row.verdict.valid)));
            cells.push(Some(row.verdict.rule.to_string()));
            cells
        })
        .collect();
    report
}

fn coerced_cell(row: &ReconciledRow, column: &str) -> Cell {
    let r = &row.record;
    match column {
        columns::REWARD_VALUE => r.reward_value.map(|v| v.to_string()),
        columns::REFERRAL_AT => r.referral_at.as_ref().map(render_instant),
        columns::UPDATED_AT => r.updated_at.as_ref().map(render_instant),
        columns::TX_TRANSACTION_AT => r.transaction_at.as_ref().map(render_instant),
        columns::LOG_CREATED_AT => r.log_created_at.as_ref().map(render_instant),
        _ => None,
    }
}

fn derived_cells(d: &DerivedFields) -> [Cell; 10] {
    [
        d.referral_source_category.clone(),
        d.referral_at_local.as_ref().map(render_local),
        d.transaction_at_local.as_ref().map(render_local),
        Some(d.referral_status_norm.clone()),
        Some(d.transaction_status_norm.clone()),
        Some(d.transaction_type_norm.clone()),
        Some(render_bool(d.reward_granted_flag)),
        Some(render_bool(d.tx_after_referral)),
        Some(render_bool(d.tx_same_month)),
        Some(render_bool(d.referrer_membership_valid)),
    ]
}

/// Run once: load, profile, reconcile, write. Only sink errors abort.
pub fn run(
    config: &ReconConfig,
    loader: &dyn Loader,
    sink: &mut dyn ReportSink,
) -> Result<ReconResult, ReconError> {
    let tables = load_sources(loader);

    let mut profiled = Vec::new();
    for source in Source::ALL {
        let table = tables.get(source);
        if table.is_empty() {
            continue;
        }
        let profile = profile_as_table(source.name(), &profile_table(table));
        sink.write_profile(source, &profile)?;
        profiled.push(source);
    }

    let Reconciliation { report, mut summary, .. } = reconcile(&tables);
    summary.sources_profiled = profiled;
    sink.write_report(&report)?;

    Ok(ReconResult {
        meta: ReconMeta {
            config_name: config.name.clone(),
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            run_at: chrono::Utc::now().to_rfc3339(),
        },
        summary,
        report,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tables() -> SourceTables {
        let mut t = SourceTables::empty();
        t.referrals = Table::from_csv_str(
            "user_referrals",
            "\
referral_id,id,referral_source,referral_status,referral_reward_id,referral_at,updated_at
1,1,User Sign Up,Menunggu,,2024-03-01 10:00:00,2024-03-01 10:00:00
2,2,Lead,Menunggu,5,2024-03-02 10:00:00,not-a-date
",
        )
        .unwrap();
        t.rewards = Table::from_csv_str("referral_rewards", "id,reward_value\n5,50\n").unwrap();
        t
    }

    #[test]
    fn report_layout() {
        let rec = reconcile(&tables());
        let r = &rec.report;
        assert_eq!(r.len(), 2);
        assert_eq!(r.columns.last().map(String::as_str), Some(VALIDITY_RULE_COLUMN));
        assert!(r.has_column("reward_reward_value"));
        assert!(r.has_column("referral_source_category"));

        assert_eq!(r.get(0, "referral_source_category"), Some("Online"));
        assert_eq!(r.get(0, IS_VALID_COLUMN), Some("true"));
        assert_eq!(r.get(1, "reward_reward_value"), Some("50"));
        assert_eq!(r.get(1, IS_VALID_COLUMN), Some("false"));
        assert_eq!(r.get(1, VALIDITY_RULE_COLUMN), Some("reward_without_success"));
        // coerced columns are re-rendered; unparsable becomes empty
        assert_eq!(r.get(0, "referral_at"), Some("2024-03-01 10:00:00+00:00"));
        assert_eq!(r.get(1, "updated_at"), None);
    }

    #[test]
    fn run_profiles_non_empty_sources_only() {
        let config = ReconConfig::new("in", "out");
        let mut sink = MemorySink::default();
        let result = run(&config, &tables(), &mut sink).unwrap();

        assert_eq!(sink.profiles.len(), 2);
        assert!(sink.profiles.contains_key(&Source::Referrals));
        assert!(sink.profiles.contains_key(&Source::Rewards));
        assert_eq!(result.summary.sources_profiled, vec![Source::Referrals, Source::Rewards]);
        assert_eq!(sink.report.as_ref().map(Table::len), Some(2));
        assert_eq!(result.summary.rows_out, 2);
    }

    #[test]
    fn ragged_referral_rows_keep_report_aligned() {
        let mut t = SourceTables::empty();
        t.referrals = Table::new(
            "user_referrals",
            vec!["referral_id".into(), "referral_source".into(), "referral_at".into()],
        );
        t.referrals.rows.push(vec![Some("1".into())]);
        t.referrals.rows.push(vec![
            Some("2".into()),
            Some("User Sign Up".into()),
            Some("2024-03-01 10:00:00".into()),
            Some("stray".into()),
        ]);

        let r = reconcile(&t).report;
        assert_eq!(r.len(), 2);
        assert!(r.rows.iter().all(|row| row.len() == r.columns.len()));
        assert_eq!(r.get(0, "referral_at"), None);
        assert_eq!(r.get(1, "referral_source_category"), Some("Online"));
        assert_eq!(r.get(1, "referral_at"), Some("2024-03-01 10:00:00+00:00"));
    }

    struct FailingLoader;

    impl Loader for FailingLoader {
        fn load(&self, source: Source) -> Result<Table, ReconError> {
            Err(ReconError::SourceRead {
                source: source.name().into(),
                message: "permission denied".into(),
            })
        }
    }

    #[test]
    fn unreadable_sources_degrade_to_empty() {
        let config = ReconConfig::new("in", "out");
        let mut sink = MemorySink::default();
        let result = run(&config, &FailingLoader, &mut sink).unwrap();
        assert!(sink.profiles.is_empty());
        assert_eq!(result.summary.rows_out, 0);
        assert_eq!(sink.report.map(|r| r.len()), Some(0));
    }

    struct ReadOnlySink;

    impl ReportSink for ReadOnlySink {
        fn write_profile(&mut self, _: Source, _: &Table) -> Result<(), ReconError> {
            Err(ReconError::OutputWrite {
                path: "profile.csv".into(),
                message: "read-only".into(),
            })
        }

        fn write_report(&mut self, _: &Table) -> Result<(), ReconError> {
            Ok(())
        }
    }

    #[test]
    fn sink_errors_abort() {
        let config = ReconConfig::new("in", "out");
        let err = run(&config, &tables(), &mut ReadOnlySink).unwrap_err();
        assert!(err.is_fatal());
    }
}
