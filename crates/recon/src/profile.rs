use std::collections::HashSet;

use serde::Serialize;

use crate::table::Table;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnProfile {
    pub column: String,
    pub null_count: usize,
    pub distinct_count: usize,
}

/// Per-column null and distinct (non-null) counts, in column order.
pub fn profile_table(table: &Table) -> Vec<ColumnProfile> {
    table
        .columns
        .iter()
        .enumerate()
        .map(|(i, column)| {
            let mut distinct: HashSet<&str> = HashSet::new();
            let mut null_count = 0;
            for row in &table.rows {
                match row.get(i).and_then(|c| c.as_deref()) {
                    Some(v) => {
                        distinct.insert(v);
                    }
                    None => null_count += 1,
                }
            }
            ColumnProfile {
                column: column.clone(),
                null_count,
                distinct_count: distinct.len(),
            }
        })
        .collect()
}

/// The profile as a three-column table (`column`, `null_count`, `distinct_count`).
pub fn profile_as_table(name: &str, profile: &[ColumnProfile]) -> Table {
    let mut t = Table::new(
        name,
        vec!["column".into(), "null_count".into(), "distinct_count".into()],
    );
    t.rows = profile
        .iter()
        .map(|p| {
            vec![
                Some(p.column.clone()),
                Some(p.null_count.to_string()),
                Some(p.distinct_count.to_string()),
            ]
        })
        .collect();
    t
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_nulls_and_distinct() {
        let t = Table::from_csv_str(
            "paid_transactions",
            "\
transaction_id,transaction_status,timezone_transaction
T1,PAID,Asia/Jakarta
T2,PAID,
T3,,
",
        )
        .unwrap();
        let p = profile_table(&t);
        assert_eq!(
            p,
            vec![
                ColumnProfile { column: "transaction_id".into(), null_count: 0, distinct_count: 3 },
                ColumnProfile { column: "transaction_status".into(), null_count: 1, distinct_count: 1 },
                ColumnProfile { column: "timezone_transaction".into(), null_count: 2, distinct_count: 1 },
            ]
        );

        let as_table = profile_as_table("profile_paid_transactions", &p);
        assert_eq!(as_table.get(1, "null_count"), Some("1"));
        assert_eq!(as_table.len(), 3);
    }
}
