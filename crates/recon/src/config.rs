use std::collections::HashSet;
use std::path::PathBuf;

use serde::Deserialize;

use crate::error::ReconError;
use crate::model::Source;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ReconConfig {
    #[serde(default = "default_name")]
    pub name: String,
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    #[serde(default)]
    pub sources: SourceFiles,
    #[serde(default)]
    pub output: OutputConfig,
}

fn default_name() -> String {
    "referral-recon".into()
}

// ---------------------------------------------------------------------------
// Source file names
// ---------------------------------------------------------------------------

/// File name of each source, relative to `input_dir`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourceFiles {
    pub referrals: String,
    pub paid_transactions: String,
    pub rewards: String,
    pub statuses: String,
    pub user_logs: String,
    pub lead_logs: String,
    pub referral_logs: String,
}

impl Default for SourceFiles {
    fn default() -> Self {
        Self {
            referrals: "user_referrals.csv".into(),
            paid_transactions: "paid_transactions.csv".into(),
            rewards: "referral_rewards.csv".into(),
            statuses: "user_referral_statuses.csv".into(),
            user_logs: "user_logs.csv".into(),
            lead_logs: "lead_log.csv".into(),
            referral_logs: "user_referral_logs.csv".into(),
        }
    }
}

impl SourceFiles {
    pub fn file_for(&self, source: Source) -> &str {
        match source {
            Source::Referrals => &self.referrals,
            Source::PaidTransactions => &self.paid_transactions,
            Source::Rewards => &self.rewards,
            Source::Statuses => &self.statuses,
            Source::UserLogs => &self.user_logs,
            Source::LeadLogs => &self.lead_logs,
            Source::ReferralLogs => &self.referral_logs,
        }
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub final_report: String,
    pub profile_prefix: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            final_report: "final_report.csv".into(),
            profile_prefix: "profile_".into(),
        }
    }
}

impl OutputConfig {
    pub fn profile_file(&self, source: Source) -> String {
        format!("{}{}.csv", self.profile_prefix, source.name())
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl ReconConfig {
    /// Config with default file names for the given directories.
    pub fn new(input_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            name: default_name(),
            input_dir: input_dir.into(),
            output_dir: output_dir.into(),
            sources: SourceFiles::default(),
            output: OutputConfig::default(),
        }
    }

    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let config: ReconConfig =
            toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        if self.input_dir.as_os_str().is_empty() {
            return Err(ReconError::ConfigValidation("input_dir must not be empty".into()));
        }
        if self.output_dir.as_os_str().is_empty() {
            return Err(ReconError::ConfigValidation("output_dir must not be empty".into()));
        }

        let mut seen = HashSet::new();
        for source in Source::ALL {
            let file = self.sources.file_for(source);
            if file.trim().is_empty() {
                return Err(ReconError::ConfigValidation(format!(
                    "sources.{source}: file name must not be empty"
                )));
            }
            if !seen.insert(file) {
                return Err(ReconError::ConfigValidation(format!(
                    "sources: '{file}' is used by more than one source"
                )));
            }
        }

        if self.output.final_report.trim().is_empty() {
            return Err(ReconError::ConfigValidation(
                "output.final_report must not be empty".into(),
            ));
        }
        for source in Source::ALL {
            if self.output.profile_file(source) == self.output.final_report {
                return Err(ReconError::ConfigValidation(format!(
                    "output.final_report '{}' collides with the {source} profile",
                    self.output.final_report
                )));
            }
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
