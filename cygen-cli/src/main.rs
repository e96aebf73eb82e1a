use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use cygen_codegen::Config;

#[derive(Parser)]
#[command(name = "cygen", version, about = "Generate Cython wrapper sources from C/C++ API descriptions")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Increase log verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// Run a full generation pass from a configuration file.
    Generate {
        /// Path to the configuration file.
        #[arg(short, long, default_value = "cygen.toml")]
        config: PathBuf,
    },
    /// Parse and validate a configuration file without generating anything.
    Check {
        /// Path to the configuration file.
        #[arg(short, long, default_value = "cygen.toml")]
        config: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();

    match cli.command {
        Command::Generate { config } => {
            let config = Config::load(&config)
                .with_context(|| format!("failed to load configuration {}", config.display()))?;
            cygen_codegen::run_generate(&config).context("generation failed")?;
        }
        Command::Check { config } => {
            let loaded = Config::load(&config)
                .with_context(|| format!("failed to load configuration {}", config.display()))?;
            log::info!(
                "configuration ok: input {}, output {}",
                loaded.paths.env_input.display(),
                loaded.paths.out_dir.display()
            );
        }
    }
    Ok(())
}
