//! `locator` CLI: single-event, batch, and (behind the `service` feature)
//! server-launch modes over the location engine.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode as ProcessExitCode;

use clap::{Parser, ValueEnum};

use neic_locator::core::aux_cache::AuxCache;
use neic_locator::core::config::EngineConfig;
use neic_locator::core::engine::Engine;
use neic_locator::io::{hydra, request::LocationRequest, response::LocationResponse};
use neic_locator::logging;
use neic_locator::{EngineError, ExitCode, Result};

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Mode {
    Single,
    Batch,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum WireFormat {
    Json,
    Hydra,
}

/// Iterative seismic event locator.
#[derive(Parser, Debug)]
#[command(name = "locator", version, about)]
struct Cli {
    /// Run mode: a single request file, or every file in a directory.
    #[arg(long, value_enum, default_value = "single")]
    mode: Mode,

    /// Directory holding the craton polygon / zone-key / zone-stat reference
    /// files (cratons.json, zone.key, zone.stat) and the bincode cache.
    #[arg(long, default_value = "model")]
    model_path: PathBuf,

    /// Input file for `--mode single`.
    #[arg(long)]
    file_path: Option<PathBuf>,

    /// Input directory for `--mode batch`.
    #[arg(long)]
    input_dir: Option<PathBuf>,

    /// Output directory for `--mode batch`.
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Wire format of input files.
    #[arg(long, value_enum, default_value = "json")]
    input_type: WireFormat,

    /// Wire format of output files.
    #[arg(long, value_enum, default_value = "json")]
    output_type: WireFormat,

    /// Write logs to this file in addition to stderr.
    #[arg(long)]
    log_path: Option<PathBuf>,

    /// Logging verbosity.
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> ProcessExitCode {
    let cli = Cli::parse();
    let log_level = match cli.log_level.parse() {
        Ok(level) => level,
        Err(err) => {
            eprintln!("invalid --log-level: {err}");
            return ProcessExitCode::FAILURE;
        }
    };
    if let Err(err) = logging::init(log_level, cli.log_path.as_deref()) {
        eprintln!("failed to initialize logging: {err}");
        return ProcessExitCode::FAILURE;
    }

    match run(&cli) {
        Ok(status) => {
            if status.process_status() == 0 {
                ProcessExitCode::SUCCESS
            } else {
                ProcessExitCode::FAILURE
            }
        }
        Err(err) => {
            log::error!("{err}");
            ProcessExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<ExitCode> {
    let engine = build_engine(&cli.model_path)?;

    match cli.mode {
        Mode::Single => {
            let path = cli
                .file_path
                .as_ref()
                .ok_or_else(|| EngineError::bad_input("--file-path is required for --mode single"))?;
            let mut engine = engine;
            let (status, response) = locate_file(&mut engine, path, cli.input_type)?;
            print!("{}", render(&response, cli.output_type));
            Ok(status)
        }
        Mode::Batch => {
            let input_dir = cli
                .input_dir
                .as_ref()
                .ok_or_else(|| EngineError::bad_input("--input-dir is required for --mode batch"))?;
            let output_dir = cli
                .output_dir
                .as_ref()
                .ok_or_else(|| EngineError::bad_input("--output-dir is required for --mode batch"))?;
            fs::create_dir_all(output_dir)?;

            let mut engine = engine;
            let mut worst = ExitCode::Success;
            for entry in fs::read_dir(input_dir)? {
                let entry = entry?;
                let path = entry.path();
                if !path.is_file() {
                    continue;
                }
                let (status, response) = locate_file(&mut engine, &path, cli.input_type)?;
                if !status.is_success_family() {
                    worst = status;
                }
                let out_path = output_dir.join(path.file_name().expect("file_name"));
                fs::write(out_path, render(&response, cli.output_type))?;
            }
            Ok(worst)
        }
    }
}

fn locate_file(
    engine: &mut Engine,
    path: &Path,
    input_type: WireFormat,
) -> Result<(ExitCode, LocationResponse)> {
    let text = fs::read_to_string(path)?;
    let request = parse(&text, input_type)?;
    let mut event = request.into_event()?;
    let (status, ellipsoid) = engine.locate(&mut event);
    let response = LocationResponse::from_event(&event, status, ellipsoid);
    Ok((status, response))
}

fn parse(text: &str, input_type: WireFormat) -> Result<LocationRequest> {
    match input_type {
        WireFormat::Json => serde_json::from_str(text).map_err(EngineError::from),
        WireFormat::Hydra => hydra::parse_request(text),
    }
}

fn render(response: &LocationResponse, output_type: WireFormat) -> String {
    match output_type {
        WireFormat::Json => serde_json::to_string_pretty(response).unwrap_or_default(),
        WireFormat::Hydra => hydra::write_response(response),
    }
}

fn build_engine(model_path: &Path) -> Result<Engine> {
    let cache_path = model_path.join("aux.bin");
    let aux_cache = AuxCache::new(cache_path);
    Engine::with_ak135(
        EngineConfig::default(),
        &aux_cache,
        &model_path.join("cratons.json"),
        &model_path.join("zone.key"),
        &model_path.join("zone.stat"),
    )
}
