use std::{fs, path::Path, process::ExitCode};

use clap::Parser;
use log::{error, info};
use serde_json::Value;

use capstan::{
    cli::{Cli, Commands},
    engine::StorageManager,
    platform::{offline::OfflineEngine, LogProgress},
    CAPSTAN_VERSION,
};
use capstan_api::{
    config::{ConversionRegistry, StorageConfig},
    error::{CapstanError, CapstanResultExt, InvalidInputError, ReportError, ServicingError},
};

fn load_document(path: &Path) -> Result<Value, CapstanError> {
    let contents = fs::read_to_string(path).structured(InvalidInputError::LoadStorageConfig {
        path: path.display().to_string(),
    })?;
    // YAML is a superset of JSON, so one parser covers both file formats.
    serde_yaml::from_str(&contents).structured(InvalidInputError::ParseStorageConfig)
}

fn build_manager(config: &Path, devices: &Path) -> Result<StorageManager, CapstanError> {
    let engine = OfflineEngine::from_file(devices)?;
    let mut manager = StorageManager::new(
        Box::new(engine),
        ConversionRegistry::with_builtin_sections(),
    );
    let document = load_document(config)?;
    manager
        .load_wire_config(&document)
        .message(format!("Failed to load configuration from {config:?}"))?;
    Ok(manager)
}

fn write_or_print(outfile: Option<&Path>, contents: &str) -> Result<(), CapstanError> {
    match outfile {
        Some(path) => fs::write(path, contents).structured(ServicingError::WriteStatus {
            path: path.display().to_string(),
        }),
        None => {
            println!("{contents}");
            Ok(())
        }
    }
}

fn run(args: &Cli) -> Result<(), CapstanError> {
    info!("Capstan version: {}", CAPSTAN_VERSION);

    match &args.command {
        Commands::Validate { config } => {
            let document = load_document(config)?;
            let registry = ConversionRegistry::with_builtin_sections();
            let parsed = StorageConfig::parse(&registry, &document)
                .map_err(|e| CapstanError::new(InvalidInputError::ConvertStorageConfig(e)))?;
            parsed
                .validate()
                .map_err(|e| CapstanError::new(InvalidInputError::InvalidStorageConfig(e)))?;
            info!("Storage configuration is valid");
            Ok(())
        }

        Commands::Propose {
            config,
            devices,
            outfile,
        } => {
            let mut manager = build_manager(config, devices)?;
            manager.probe(&mut LogProgress::new())?;
            let proposal = manager
                .proposal()
                .structured(ServicingError::NoFeasibleProposal)?;
            let rendered = serde_yaml::to_string(proposal)
                .structured(ServicingError::WriteStatus {
                    path: outfile
                        .as_deref()
                        .map(|p| p.display().to_string())
                        .unwrap_or_else(|| "-".into()),
                })?;
            write_or_print(outfile.as_deref(), &rendered)
        }

        Commands::Install {
            config,
            devices,
            status,
            error: _,
        } => {
            let mut manager = build_manager(config, devices)?;
            let mut progress = LogProgress::new();
            manager.probe(&mut progress)?;
            let result = manager.install(&mut progress);

            // The status reflects the tracker even when the install failed,
            // so the failing action and the remaining pending ones are
            // visible in the output file.
            if let Some(path) = status {
                let rendered = serde_yaml::to_string(&manager.status()).structured(
                    ServicingError::WriteStatus {
                        path: path.display().to_string(),
                    },
                )?;
                fs::write(path, rendered).structured(ServicingError::WriteStatus {
                    path: path.display().to_string(),
                })?;
            }
            result
        }
    }
}

fn main() -> ExitCode {
    let args = Cli::parse();
    env_logger::Builder::new()
        .filter_level(args.verbosity)
        .init();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:?}");

            // Persist the structured error next to the status if requested.
            if let Commands::Install {
                error: Some(path), ..
            } = &args.command
            {
                match serde_yaml::to_string(&e) {
                    Ok(rendered) => {
                        if let Err(write_error) = fs::write(path, rendered) {
                            error!("Failed to write error file to {path:?}: {write_error}");
                        }
                    }
                    Err(serialize_error) => {
                        error!("Failed to serialize error: {serialize_error}");
                    }
                }
            }
            ExitCode::FAILURE
        }
    }
}
