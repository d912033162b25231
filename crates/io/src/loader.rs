use std::io::ErrorKind;
use std::path::PathBuf;

use referral_recon::config::SourceFiles;
use referral_recon::{Loader, ReconConfig, ReconError, Source, Table};
use tracing::debug;

use crate::csv::{import, ImportError};

/// Reads each source from `input_dir/<file name>`.
///
/// A file that does not exist loads as an empty table. Any other failure
/// is reported, and the engine decides whether to degrade.
#[derive(Debug, Clone)]
pub struct CsvDirLoader {
    pub input_dir: PathBuf,
    pub files: SourceFiles,
}

impl CsvDirLoader {
    pub fn new(input_dir: impl Into<PathBuf>, files: SourceFiles) -> Self {
        Self {
            input_dir: input_dir.into(),
            files,
        }
    }

    pub fn from_config(config: &ReconConfig) -> Self {
        Self::new(&config.input_dir, config.sources.clone())
    }

    pub fn path_for(&self, source: Source) -> PathBuf {
        self.input_dir.join(self.files.file_for(source))
    }
}

impl Loader for CsvDirLoader {
    fn load(&self, source: Source) -> Result<Table, ReconError> {
        let path = self.path_for(source);
        match import(&path, source.name()) {
            Ok(table) => Ok(table),
            Err(ImportError::Read(e)) if e.kind() == ErrorKind::NotFound => {
                debug!(%source, path = %path.display(), "source file absent");
                Ok(Table::empty(source.name()))
            }
            Err(ImportError::Read(e)) => Err(ReconError::SourceRead {
                source: source.name().into(),
                message: format!("{}: {e}", path.display()),
            }),
            Err(ImportError::Parse(message)) => Err(ReconError::SourceParse {
                source: source.name().into(),
                message,
            }),
        }
    }
}
