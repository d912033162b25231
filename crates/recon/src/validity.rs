//! Validity Evaluator — ordered decision table over a joined + derived referral.
//!
//! Rules are evaluated top to bottom; the first predicate that holds decides the
//! outcome. Rule 5 shadows rule 7 for an unrewarded referral whose paid transaction
//! is at or before the referral; both outcomes are `false`, and the order is kept.

use serde::Serialize;

use crate::model::{DerivedFields, ReferralRecord};

const STATUS_SUCCEEDED: &str = "berhasil";
const STATUS_PENDING: &str = "menunggu";
const STATUS_FAILED: &str = "tidak berhasil";
const TX_STATUS_PAID: &str = "paid";
const TX_TYPE_NEW: &str = "new";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidityRule {
    RewardPaid,
    NoRewardPending,
    RewardWithoutSuccess,
    RewardWithoutTransaction,
    PaidTransactionWithoutReward,
    SuccessWithoutReward,
    TransactionBeforeReferral,
    Default,
    EvaluationError,
}

impl std::fmt::Display for ValidityRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RewardPaid => write!(f, "reward_paid"),
            Self::NoRewardPending => write!(f, "no_reward_pending"),
            Self::RewardWithoutSuccess => write!(f, "reward_without_success"),
            Self::RewardWithoutTransaction => write!(f, "reward_without_transaction"),
            Self::PaidTransactionWithoutReward => write!(f, "paid_transaction_without_reward"),
            Self::SuccessWithoutReward => write!(f, "success_without_reward"),
            Self::TransactionBeforeReferral => write!(f, "transaction_before_referral"),
            Self::Default => write!(f, "default"),
            Self::EvaluationError => write!(f, "evaluation_error"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Verdict {
    pub valid: bool,
    pub rule: ValidityRule,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EvalError {
    NonFiniteReward(f64),
}

impl std::fmt::Display for EvalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NonFiniteReward(v) => write!(f, "reward value is not finite: {v}"),
        }
    }
}

/// Everything the decision table reads, in one place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleInput {
    pub reward_value: Option<f64>,
    pub status: String,
    pub has_transaction: bool,
    pub transaction_status: String,
    pub transaction_type: String,
    pub tx_after_referral: bool,
    pub tx_same_month: bool,
    /// Both local timestamps present and the transaction is at or before the referral.
    pub tx_at_or_before_referral: bool,
    pub membership_valid: bool,
    pub referrer_deleted: bool,
    pub reward_granted: bool,
}

impl RuleInput {
    pub fn new(record: &ReferralRecord, derived: &DerivedFields) -> Self {
        let tx_at_or_before_referral = matches!(
            (derived.transaction_at_local, derived.referral_at_local),
            (Some(tx), Some(referral)) if tx <= referral
        );
        Self {
            reward_value: record.reward_value,
            status: derived.referral_status_norm.clone(),
            has_transaction: derived.has_transaction,
            transaction_status: derived.transaction_status_norm.clone(),
            transaction_type: derived.transaction_type_norm.clone(),
            tx_after_referral: derived.tx_after_referral,
            tx_same_month: derived.tx_same_month,
            tx_at_or_before_referral,
            membership_valid: derived.referrer_membership_valid,
            referrer_deleted: record.referrer_is_deleted.unwrap_or(false),
            reward_granted: derived.reward_granted_flag,
        }
    }

    fn reward(&self) -> Result<Option<f64>, EvalError> {
        match self.reward_value {
            Some(v) if !v.is_finite() => Err(EvalError::NonFiniteReward(v)),
            other => Ok(other),
        }
    }

    fn has_reward(&self) -> Result<bool, EvalError> {
        Ok(self.reward()?.is_some_and(|v| v > 0.0))
    }

    fn no_reward(&self) -> Result<bool, EvalError> {
        Ok(self.reward()?.map_or(true, |v| v == 0.0))
    }
}

pub type Predicate = fn(&RuleInput) -> Result<bool, EvalError>;

pub struct Rule {
    pub id: ValidityRule,
    pub outcome: bool,
    pub predicate: Predicate,
}

pub const RULES: [Rule; 7] = [
    Rule {
        id: ValidityRule::RewardPaid,
        outcome: true,
        predicate: |r| {
            Ok(r.has_reward()?
                && r.status == STATUS_SUCCEEDED
                && r.has_transaction
                && r.transaction_status == TX_STATUS_PAID
                && r.transaction_type == TX_TYPE_NEW
                && r.tx_after_referral
                && r.tx_same_month
                && r.membership_valid
                && !r.referrer_deleted
                && r.reward_granted)
        },
    },
    Rule {
        id: ValidityRule::NoRewardPending,
        outcome: true,
        predicate: |r| Ok((r.status == STATUS_PENDING || r.status == STATUS_FAILED) && r.no_reward()?),
    },
    Rule {
        id: ValidityRule::RewardWithoutSuccess,
        outcome: false,
        predicate: |r| Ok(r.has_reward()? && r.status != STATUS_SUCCEEDED),
    },
    Rule {
        id: ValidityRule::RewardWithoutTransaction,
        outcome: false,
        predicate: |r| Ok(r.has_reward()? && !r.has_transaction),
    },
    Rule {
        id: ValidityRule::PaidTransactionWithoutReward,
        outcome: false,
        predicate: |r| {
            Ok(r.no_reward()?
                && r.has_transaction
                && r.transaction_status == TX_STATUS_PAID
                && r.tx_after_referral)
        },
    },
    Rule {
        id: ValidityRule::SuccessWithoutReward,
        outcome: false,
        predicate: |r| Ok(r.status == STATUS_SUCCEEDED && r.no_reward()?),
    },
    Rule {
        id: ValidityRule::TransactionBeforeReferral,
        outcome: false,
        predicate: |r| Ok(r.has_transaction && r.tx_at_or_before_referral),
    },
];

/// First matching rule wins. A predicate error makes the record invalid.
pub fn evaluate(input: &RuleInput) -> Verdict {
    for rule in &RULES {
        match (rule.predicate)(input) {
            Ok(true) => {
                return Verdict {
                    valid: rule.outcome,
                    rule: rule.id,
                }
            }
            Ok(false) => {}
            Err(e) => {
                tracing::debug!(rule = %rule.id, error = %e, "validity evaluation failed");
                return Verdict {
                    valid: false,
                    rule: ValidityRule::EvaluationError,
                };
            }
        }
    }
    Verdict {
        valid: false,
        rule: ValidityRule::Default,
    }
}
