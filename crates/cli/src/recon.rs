//! `refrecon run` and `refrecon validate`.

use std::path::{Path, PathBuf};

use referral_recon::{ReconConfig, ReconError, ReconResult};
use referral_recon_io::{CsvDirLoader, CsvDirSink};
use tracing::info;

use crate::exit_codes::{recon_exit_code, EXIT_ERROR, EXIT_USAGE};
use crate::CliError;

fn recon_err(err: ReconError) -> CliError {
    CliError::new(recon_exit_code(&err), err.to_string())
}

fn read_config(config_path: &Path) -> Result<ReconConfig, CliError> {
    let config_str = std::fs::read_to_string(config_path).map_err(|e| {
        CliError::new(EXIT_USAGE, format!("cannot read config {}: {e}", config_path.display()))
    })?;
    let mut config = ReconConfig::from_toml(&config_str).map_err(recon_err)?;

    // Resolve directories relative to the config file's directory
    let base_dir = config_path.parent().unwrap_or_else(|| Path::new("."));
    if config.input_dir.is_relative() {
        config.input_dir = base_dir.join(&config.input_dir);
    }
    if config.output_dir.is_relative() {
        config.output_dir = base_dir.join(&config.output_dir);
    }
    Ok(config)
}

/// Config file (if any) with `--input`/`--output` applied on top.
fn resolve_config(
    config_path: Option<PathBuf>,
    input: Option<PathBuf>,
    output: Option<PathBuf>,
) -> Result<ReconConfig, CliError> {
    let mut config = match (config_path, input.as_ref(), output.as_ref()) {
        (Some(path), _, _) => read_config(&path)?,
        (None, Some(input), Some(output)) => ReconConfig::new(input, output),
        (None, _, _) => {
            return Err(CliError::args("no config file and no --input/--output given")
                .with_hint("refrecon run recon.toml, or refrecon run --input DIR --output DIR"));
        }
    };

    if let Some(input) = input {
        config.input_dir = input;
    }
    if let Some(output) = output {
        config.output_dir = output;
    }
    config.validate().map_err(recon_err)?;
    Ok(config)
}

pub fn cmd_run(
    config_path: Option<PathBuf>,
    input: Option<PathBuf>,
    output: Option<PathBuf>,
    json_output: bool,
) -> Result<(), CliError> {
    let config = resolve_config(config_path, input, output)?;
    info!(
        name = %config.name,
        input = %config.input_dir.display(),
        output = %config.output_dir.display(),
        "starting run"
    );

    let loader = CsvDirLoader::from_config(&config);
    let mut sink = CsvDirSink::from_config(&config).map_err(recon_err)?;
    let result = referral_recon::run(&config, &loader, &mut sink).map_err(recon_err)?;

    if json_output {
        let json_str = serde_json::to_string_pretty(&result)
            .map_err(|e| CliError::new(EXIT_ERROR, format!("JSON serialization error: {e}")))?;
        println!("{json_str}");
    }

    eprintln!("{}", summary_line(&result, &sink.report_path()));
    Ok(())
}

fn summary_line(result: &ReconResult, report_path: &Path) -> String {
    let s = &result.summary;
    let mut line = format!(
        "{}: {} referral rows, {} in report ({} duplicates dropped): {} valid, {} invalid",
        result.meta.config_name, s.referral_rows_in, s.rows_out, s.duplicates_dropped, s.valid, s.invalid,
    );
    if !s.sources_skipped.is_empty() {
        let names: Vec<String> = s.sources_skipped.iter().map(|j| j.source.to_string()).collect();
        line.push_str(&format!("; not joined: {}", names.join(", ")));
    }
    line.push_str(&format!("; wrote {}", report_path.display()));
    line
}

pub fn cmd_validate(config_path: PathBuf) -> Result<(), CliError> {
    let config = read_config(&config_path)?;
    eprintln!(
        "valid: '{}' reads {} and writes {}",
        config.name,
        config.input_dir.display(),
        config.output_dir.display(),
    );
    Ok(())
}
