//! Derivation Engine — per-row computed fields on top of the joined record.

use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDateTime, Utc};
use chrono_tz::Tz;
use tracing::debug;

use crate::model::{DerivedFields, ReferralRecord};
use crate::parse::parse_date;

pub const SOURCE_USER_SIGN_UP: &str = "User Sign Up";
pub const SOURCE_DRAFT_TRANSACTION: &str = "Draft Transaction";
pub const SOURCE_LEAD: &str = "Lead";

/// Map a referral source to its category. Lead referrals take the lead's own category.
pub fn derive_category(source: Option<&str>, lead_category: Option<&str>) -> Option<String> {
    match source.map(str::trim)? {
        SOURCE_USER_SIGN_UP => Some("Online".into()),
        SOURCE_DRAFT_TRANSACTION => Some("Offline".into()),
        SOURCE_LEAD => lead_category.map(str::to_string),
        _ => None,
    }
}

/// Render an instant as wall-clock time in `timezone`, offset dropped.
///
/// No timezone (or a blank one) and unrecognized names both give the UTC wall clock.
pub fn to_local(instant: Option<DateTime<Utc>>, timezone: Option<&str>) -> Option<NaiveDateTime> {
    let instant = instant?;
    let name = match timezone.map(str::trim) {
        None | Some("") => return Some(instant.naive_utc()),
        Some(name) => name,
    };
    match Tz::from_str(name) {
        Ok(tz) => Some(instant.with_timezone(&tz).naive_local()),
        Err(_) => {
            debug!(timezone = name, "unknown timezone, using UTC");
            Some(instant.naive_utc())
        }
    }
}

/// Lower-cased, trimmed; missing is the empty string.
pub fn normalize(value: Option<&str>) -> String {
    value.map(|v| v.trim().to_lowercase()).unwrap_or_default()
}

pub fn is_after(later: Option<NaiveDateTime>, earlier: Option<NaiveDateTime>) -> bool {
    matches!((later, earlier), (Some(a), Some(b)) if a > b)
}

pub fn is_same_month(a: Option<NaiveDateTime>, b: Option<NaiveDateTime>) -> bool {
    matches!((a, b), (Some(a), Some(b)) if a.year() == b.year() && a.month() == b.month())
}

/// Membership is valid unless a parseable expiry date falls on or before the
/// referral's local date. Only the date components are compared.
pub fn membership_valid(expired: Option<&str>, referral_local: Option<NaiveDateTime>) -> bool {
    match (expired.and_then(parse_date), referral_local) {
        (Some(expiry), Some(local)) => expiry > local.date(),
        _ => true,
    }
}

pub fn derive(record: &ReferralRecord) -> DerivedFields {
    let referral_at_local = to_local(record.referral_at, record.referrer_timezone.as_deref());
    let transaction_at_local =
        to_local(record.transaction_at, record.transaction_timezone.as_deref());

    let status = record
        .status_description
        .as_deref()
        .or(record.referral_status.as_deref());

    DerivedFields {
        referral_source_category: derive_category(
            record.referral_source.as_deref(),
            record.lead_source_category.as_deref(),
        ),
        referral_at_local,
        transaction_at_local,
        referral_status_norm: normalize(status),
        transaction_status_norm: normalize(record.transaction_status.as_deref()),
        transaction_type_norm: normalize(record.transaction_type.as_deref()),
        reward_granted_flag: record.log_is_reward_granted.unwrap_or(false),
        has_transaction: record
            .transaction_id
            .as_deref()
            .is_some_and(|t| !t.trim().is_empty()),
        tx_after_referral: is_after(transaction_at_local, referral_at_local),
        tx_same_month: is_same_month(transaction_at_local, referral_at_local),
        referrer_membership_valid: membership_valid(
            record.referrer_membership_expired_date.as_deref(),
            referral_at_local,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_timestamp;
    use chrono::NaiveDate;

    fn naive(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    #[test]
    fn category_table() {
        assert_eq!(derive_category(Some("User Sign Up"), Some("x")), Some("Online".into()));
        assert_eq!(derive_category(Some("Draft Transaction"), None), Some("Offline".into()));
        assert_eq!(derive_category(Some("Lead"), Some("Event")), Some("Event".into()));
        assert_eq!(derive_category(Some("Lead"), None), None);
        assert_eq!(derive_category(Some("Walk In"), Some("Event")), None);
        assert_eq!(derive_category(None, Some("Event")), None);
    }

    #[test]
    fn to_local_named_zone() {
        let t = parse_timestamp("2024-01-31 20:00:00").unwrap();
        assert_eq!(to_local(Some(t), Some("Asia/Jakarta")), Some(naive("2024-02-01 03:00:00")));
    }

    #[test]
    fn to_local_falls_back_to_utc() {
        let t = parse_timestamp("2024-01-31 20:00:00").unwrap();
        let utc = Some(naive("2024-01-31 20:00:00"));
        assert_eq!(to_local(Some(t), None), utc);
        assert_eq!(to_local(Some(t), Some("")), utc);
        assert_eq!(to_local(Some(t), Some("Invalid/Zone")), utc);
        assert_eq!(to_local(None, Some("Asia/Jakarta")), None);
        assert_eq!(to_local(None, None), None);
    }

    #[test]
    fn temporal_flags() {
        let a = Some(naive("2024-03-01 10:00:00"));
        let b = Some(naive("2024-03-20 10:00:00"));
        let c = Some(naive("2024-04-01 00:00:00"));
        assert!(is_after(b, a));
        assert!(!is_after(a, a));
        assert!(!is_after(None, a));
        assert!(is_same_month(a, b));
        assert!(!is_same_month(b, c));
        assert!(!is_same_month(None, None));
    }

    #[test]
    fn membership_rules() {
        let local = Some(naive("2024-03-10 23:00:00"));
        assert!(membership_valid(None, local));
        assert!(membership_valid(Some("garbage"), local));
        assert!(membership_valid(Some("2024-03-11"), local));
        assert!(!membership_valid(Some("2024-03-10"), local));
        assert!(!membership_valid(Some("2024-03-10 23:59:59"), local));
        assert!(membership_valid(Some("2020-01-01"), None));
    }

    #[test]
    fn derive_uses_status_fallback_and_defaults() {
        let record = ReferralRecord {
            referral_status: Some(" Menunggu ".into()),
            transaction_id: Some("  ".into()),
            ..Default::default()
        };
        let d = derive(&record);
        assert_eq!(d.referral_status_norm, "menunggu");
        assert_eq!(d.transaction_status_norm, "");
        assert!(!d.reward_granted_flag);
        assert!(!d.has_transaction);
        assert!(d.referrer_membership_valid);

        let record = ReferralRecord {
            referral_status: Some("Menunggu".into()),
            status_description: Some("Berhasil".into()),
            ..Default::default()
        };
        assert_eq!(derive(&record).referral_status_norm, "berhasil");
    }

    #[test]
    fn derive_localizes_both_timestamps() {
        let record = ReferralRecord {
            referral_at: parse_timestamp("2024-05-31 18:00:00"),
            referrer_timezone: Some("Asia/Jakarta".into()),
            transaction_at: parse_timestamp("2024-05-31 20:00:00"),
            transaction_timezone: None,
            ..Default::default()
        };
        let d = derive(&record);
        assert_eq!(d.referral_at_local.map(|t| t.date()), NaiveDate::from_ymd_opt(2024, 6, 1));
        assert_eq!(d.transaction_at_local, Some(naive("2024-05-31 20:00:00")));
        // local clocks compared as-is: 20:00 on May 31 is before 01:00 on June 1
        assert!(!d.tx_after_referral);
        assert!(!d.tx_same_month);
    }
}
