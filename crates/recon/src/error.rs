use std::fmt;

#[derive(Debug)]
pub enum ReconError {
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Config validation error (empty directory, colliding file names, etc.).
    ConfigValidation(String),
    /// A source file exists but could not be read.
    SourceRead { source: String, message: String },
    /// A source file was read but is not well-formed CSV.
    SourceParse { source: String, message: String },
    /// Writing a profile or the final report failed.
    OutputWrite { path: String, message: String },
    /// Other IO error (directory creation, etc.).
    Io(String),
}

impl fmt::Display for ReconError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "config validation error: {msg}"),
            Self::SourceRead { source, message } => {
                write!(f, "source '{source}': cannot read: {message}")
            }
            Self::SourceParse { source, message } => {
                write!(f, "source '{source}': malformed CSV: {message}")
            }
            Self::OutputWrite { path, message } => {
                write!(f, "cannot write '{path}': {message}")
            }
            Self::Io(msg) => write!(f, "IO error: {msg}"),
        }
    }
}

impl std::error::Error for ReconError {}

impl ReconError {
    /// True for errors that must abort a run. Everything on the input side degrades instead.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::OutputWrite { .. } | Self::Io(_))
    }
}
