use std::path::PathBuf;

use clap::{Parser, Subcommand};
use log::LevelFilter;

use crate::CAPSTAN_VERSION;

#[derive(Parser, Debug)]
#[clap(version = CAPSTAN_VERSION)]
pub struct Cli {
    /// Logging verbosity [OFF, ERROR, WARN, INFO, DEBUG, TRACE]
    #[arg(global = true, short, long, default_value_t = LevelFilter::Info)]
    pub verbosity: LevelFilter,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate a storage configuration document
    Validate {
        /// The configuration document to validate
        #[clap(index = 1)]
        config: PathBuf,
    },

    /// Calculate a storage proposal against a device listing
    Propose {
        /// The configuration document to realize
        #[clap(index = 1)]
        config: PathBuf,

        /// Device listing to propose against
        #[clap(short, long)]
        devices: PathBuf,

        /// Path to save the resulting proposal instead of printing it
        #[clap(short, long)]
        outfile: Option<PathBuf>,
    },

    /// Execute a proposal as a dry run against a device listing
    Install {
        /// The configuration document to realize
        #[clap(index = 1)]
        config: PathBuf,

        /// Device listing to install against
        #[clap(short, long)]
        devices: PathBuf,

        /// Path to save the resulting manager status
        #[clap(short, long)]
        status: Option<PathBuf>,

        /// Path to save an eventual fatal error
        #[clap(short, long)]
        error: Option<PathBuf>,
    },
}
