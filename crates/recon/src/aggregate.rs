use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::model::columns::{LOG_CREATED_AT, LOG_IS_REWARD_GRANTED, USER_REFERRAL_ID};
use crate::parse::{normalize_key, parse_bool, parse_timestamp, render_bool, render_instant};
use crate::table::Table;

const EVENT_GRANTED: &str = "is_reward_granted";
const EVENT_CREATED_AT: &str = "created_at";

/// Collapse referral event logs to one row per `user_referral_id`:
/// granted = any event granted (max), created_at = earliest event (min).
///
/// Output columns are `user_referral_id`, `log_is_reward_granted`, `log_created_at`,
/// ordered by referral id. Events with a null referral id are dropped. A group whose
/// flags / timestamps never parse keeps a null in that column.
pub fn aggregate_event_log(events: &Table) -> Table {
    let mut out = Table::new(
        events.name.clone(),
        vec![
            USER_REFERRAL_ID.to_string(),
            LOG_IS_REWARD_GRANTED.to_string(),
            LOG_CREATED_AT.to_string(),
        ],
    );

    let Some(key_idx) = events.column_index(USER_REFERRAL_ID) else {
        return out;
    };
    let granted_idx = events.column_index(EVENT_GRANTED);
    let created_idx = events.column_index(EVENT_CREATED_AT);

    let mut groups: BTreeMap<String, (Option<bool>, Option<DateTime<Utc>>)> = BTreeMap::new();

    for row in &events.rows {
        let Some(key) = row.get(key_idx).and_then(|c| c.as_deref()).and_then(normalize_key) else {
            continue;
        };
        let granted = granted_idx
            .and_then(|i| row.get(i)?.as_deref())
            .and_then(parse_bool);
        let created = created_idx
            .and_then(|i| row.get(i)?.as_deref())
            .and_then(parse_timestamp);

        let entry = groups.entry(key).or_insert((None, None));
        if let Some(g) = granted {
            entry.0 = Some(entry.0.unwrap_or(false) || g);
        }
        if let Some(c) = created {
            if entry.1.map_or(true, |cur| c < cur) {
                entry.1 = Some(c);
            }
        }
    }

    out.rows = groups
        .into_iter()
        .map(|(key, (granted, created))| {
            vec![
                Some(key),
                granted.map(render_bool),
                created.as_ref().map(render_instant),
            ]
        })
        .collect();
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn events(csv: &str) -> Table {
        Table::from_csv_str("user_referral_logs", csv).unwrap()
    }

    #[test]
    fn granted_is_any_and_created_is_earliest() {
        let t = events(
            "\
id,user_referral_id,is_reward_granted,created_at
1,10,False,2024-05-03 10:00:00
2,10,True,2024-05-01 09:00:00
3,10,False,2024-05-02 08:00:00
4,11,False,2024-06-01 00:00:00
",
        );
        let agg = aggregate_event_log(&t);
        assert_eq!(agg.len(), 2);
        assert_eq!(agg.get(0, USER_REFERRAL_ID), Some("10"));
        assert_eq!(agg.get(0, LOG_IS_REWARD_GRANTED), Some("true"));
        assert_eq!(agg.get(0, LOG_CREATED_AT), Some("2024-05-01 09:00:00+00:00"));
        assert_eq!(agg.get(1, LOG_IS_REWARD_GRANTED), Some("false"));
    }

    #[test]
    fn unparsable_values_stay_null() {
        let t = events(
            "\
user_referral_id,is_reward_granted,created_at
5,maybe,yesterday
",
        );
        let agg = aggregate_event_log(&t);
        assert_eq!(agg.len(), 1);
        assert_eq!(agg.get(0, LOG_IS_REWARD_GRANTED), None);
        assert_eq!(agg.get(0, LOG_CREATED_AT), None);
    }

    #[test]
    fn float_keys_group_with_integer_keys() {
        let t = events(
            "\
user_referral_id,is_reward_granted,created_at
7,False,2024-01-02 00:00:00
7.0,True,2024-01-01 00:00:00
,True,2024-01-01 00:00:00
",
        );
        let agg = aggregate_event_log(&t);
        assert_eq!(agg.len(), 1);
        assert_eq!(agg.get(0, USER_REFERRAL_ID), Some("7"));
        assert_eq!(agg.get(0, LOG_IS_REWARD_GRANTED), Some("true"));
    }

    #[test]
    fn missing_key_column_yields_no_rows() {
        let t = events("id,is_reward_granted\n1,True\n");
        let agg = aggregate_event_log(&t);
        assert!(agg.is_empty());
        assert_eq!(agg.columns.len(), 3);
    }

    #[test]
    fn short_event_rows_are_tolerated() {
        let mut t = Table::new(
            "user_referral_logs",
            vec![
                "is_reward_granted".into(),
                "created_at".into(),
                USER_REFERRAL_ID.into(),
            ],
        );
        t.rows.push(vec![Some("True".into())]);
        t.rows.push(vec![Some("False".into()), None, Some("3".into())]);
        let agg = aggregate_event_log(&t);
        assert_eq!(agg.len(), 1);
        assert_eq!(agg.get(0, USER_REFERRAL_ID), Some("3"));
        assert_eq!(agg.get(0, LOG_IS_REWARD_GRANTED), Some("false"));
    }
}
