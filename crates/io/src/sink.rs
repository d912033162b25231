use std::path::PathBuf;

use referral_recon::config::OutputConfig;
use referral_recon::{ReconConfig, ReconError, ReportSink, Source, Table};
use tracing::info;

use crate::csv::export;

/// Writes `profile_<source>.csv` files and the final report into `output_dir`.
#[derive(Debug, Clone)]
pub struct CsvDirSink {
    pub output_dir: PathBuf,
    pub output: OutputConfig,
}

impl CsvDirSink {
    /// Create the output directory if needed.
    pub fn create(output_dir: impl Into<PathBuf>, output: OutputConfig) -> Result<Self, ReconError> {
        let output_dir = output_dir.into();
        std::fs::create_dir_all(&output_dir)
            .map_err(|e| ReconError::Io(format!("{}: {e}", output_dir.display())))?;
        Ok(Self { output_dir, output })
    }

    pub fn from_config(config: &ReconConfig) -> Result<Self, ReconError> {
        Self::create(&config.output_dir, config.output.clone())
    }

    pub fn report_path(&self) -> PathBuf {
        self.output_dir.join(&self.output.final_report)
    }

    pub fn profile_path(&self, source: Source) -> PathBuf {
        self.output_dir.join(self.output.profile_file(source))
    }

    fn write(&self, path: PathBuf, table: &Table) -> Result<(), ReconError> {
        export(table, &path).map_err(|message| ReconError::OutputWrite {
            path: path.display().to_string(),
            message,
        })?;
        info!(path = %path.display(), rows = table.len(), "wrote");
        Ok(())
    }
}

impl ReportSink for CsvDirSink {
    fn write_profile(&mut self, source: Source, profile: &Table) -> Result<(), ReconError> {
        self.write(self.profile_path(source), profile)
    }

    fn write_report(&mut self, report: &Table) -> Result<(), ReconError> {
        self.write(self.report_path(), report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn creates_nested_output_dir() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("a/b/out");
        let mut sink = CsvDirSink::create(&out, OutputConfig::default()).unwrap();

        let mut t = Table::new("user_referrals", vec!["referral_id".into(), "note".into()]);
        t.rows.push(vec![Some("1".into()), None]);
        sink.write_report(&t).unwrap();

        let text = fs::read_to_string(out.join("final_report.csv")).unwrap();
        assert_eq!(text, "referral_id,note\n1,\n");
    }

    #[test]
    fn profile_file_names_follow_prefix() {
        let dir = tempdir().unwrap();
        let output = OutputConfig {
            profile_prefix: "prof_".into(),
            ..OutputConfig::default()
        };
        let mut sink = CsvDirSink::create(dir.path(), output).unwrap();
        let t = Table::new("x", vec!["column".into()]);
        sink.write_profile(Source::PaidTransactions, &t).unwrap();
        assert!(dir.path().join("prof_paid_transactions.csv").exists());
    }

    #[test]
    fn unwritable_target_is_output_error() {
        let dir = tempdir().unwrap();
        let mut sink = CsvDirSink::create(dir.path(), OutputConfig::default()).unwrap();
        // a directory where the report file should go
        fs::create_dir(dir.path().join("final_report.csv")).unwrap();
        let err = sink.write_report(&Table::new("r", vec!["a".into()])).unwrap_err();
        assert!(matches!(err, ReconError::OutputWrite { .. }));
        assert!(err.is_fatal());
    }
}
