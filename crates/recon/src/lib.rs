//! `referral-recon` — referral reconciliation engine.
//!
//! Pure engine crate: receives pre-loaded tables through a [`Loader`], joins,
//! derives, validates and deduplicates them, and hands the results to a
//! [`ReportSink`]. No filesystem access.

pub mod aggregate;
pub mod config;
pub mod dedup;
pub mod derive;
pub mod engine;
pub mod error;
pub mod evidence;
pub mod join;
pub mod model;
pub mod parse;
pub mod profile;
pub mod table;
pub mod validity;

pub use config::ReconConfig;
pub use engine::{reconcile, run, Loader, MemorySink, ReportSink};
pub use error::ReconError;
pub use model::{ReconResult, ReconSummary, Source, SourceTables};
pub use table::Table;
pub use validity::{ValidityRule, Verdict};
