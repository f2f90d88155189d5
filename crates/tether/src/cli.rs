//! Command-line arguments for the `tether` binary.

use std::path::PathBuf;

use clap::Parser;

use crate::config::{DEFAULT_SETTINGS_PATH, SETTINGS_ENV};

#[derive(Parser, Debug)]
#[command(name = "tether")]
#[command(about = "Keeps a game bot connected, reconnecting with backoff when it drops")]
#[command(version)]
pub struct Cli {
    /// Settings file (JSON)
    #[arg(long, env = SETTINGS_ENV, default_value = DEFAULT_SETTINGS_PATH)]
    pub config: PathBuf,
}
