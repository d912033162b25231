//! CLI Exit Code Registry
//!
//! Single source of truth for `refrecon` exit codes. Scripts rely on them.
//!
//! | Code | Meaning                                          |
//! |------|--------------------------------------------------|
//! | 0    | Success                                          |
//! | 1    | General error (unspecified)                      |
//! | 2    | CLI usage error (bad args, unreadable config)    |
//! | 60   | Config failed to parse or validate               |
//! | 61   | Runtime failure during a run                     |
//! | 62   | Profile or final report could not be written     |
//!
//! Invalid referrals are data, not failures: a run that flags rows invalid
//! still exits 0.

use referral_recon::ReconError;

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, missing required options.
pub const EXIT_USAGE: u8 = 2;

/// Config file is not valid TOML, or fails validation.
pub const EXIT_RECON_INVALID_CONFIG: u8 = 60;

/// Run failed for a reason other than config or output.
pub const EXIT_RECON_RUNTIME: u8 = 61;

/// Output directory or a report file could not be written.
pub const EXIT_RECON_OUTPUT: u8 = 62;

/// Map a library error to its exit code.
pub fn recon_exit_code(err: &ReconError) -> u8 {
    match err {
        ReconError::ConfigParse(_) | ReconError::ConfigValidation(_) => EXIT_RECON_INVALID_CONFIG,
        ReconError::OutputWrite { .. } | ReconError::Io(_) => EXIT_RECON_OUTPUT,
        ReconError::SourceRead { .. } | ReconError::SourceParse { .. } => EXIT_RECON_RUNTIME,
    }
}
