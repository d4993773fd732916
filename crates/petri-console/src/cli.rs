//! Command-line flags.

use std::path::PathBuf;

use clap::Parser;

/// Flags accepted by `petri-console`.
#[derive(Parser, Debug)]
#[command(
    name = "petri-console",
    version,
    about = "Drive a remote bacteria resistance simulation from the terminal"
)]
pub struct Cli {
    /// Path to the YAML configuration file.
    #[arg(long, env = "PETRI_CONFIG", default_value = "petri-config.yaml")]
    pub config: PathBuf,

    /// Use the in-process stub engine instead of the HTTP engine.
    #[arg(long)]
    pub offline: bool,
}
