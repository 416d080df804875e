use clap::{Parser, Subcommand};
use miette::{miette, Result};
use std::path::PathBuf;

use algoviz_rs::cli;
use algoviz_rs::{AnalysisConfig, RenderMode};

#[derive(Parser)]
#[command(name = "algoviz")]
#[command(about = "Classify algorithmic behavior from recorded execution traces")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every detector and analyzer and print the full report
    Analyze {
        /// Trace file (JSON array of events)
        input: PathBuf,

        /// Output format (text, json)
        #[arg(short, long)]
        mode: Option<RenderMode>,

        /// Skip the generic multi-signal report
        #[arg(long)]
        no_generic: bool,

        /// JSON configuration file; explicit flags take precedence
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// List the detected algorithm patterns
    Patterns {
        /// Trace file (JSON array of events)
        input: PathBuf,
    },

    /// Show how DP tables were filled in
    Dp {
        /// Trace file (JSON array of events)
        input: PathBuf,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    env_logger::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze {
            input,
            mode,
            no_generic,
            config,
        } => {
            let base = match config {
                Some(path) => AnalysisConfig::load(&path).map_err(|e| miette!("{}", e))?,
                None => AnalysisConfig::default(),
            };
            let config = base.with_overrides(mode, no_generic);
            cli::analyze::analyze(&input, &config).map_err(|e| miette!("{}", e))
        }
        Commands::Patterns { input } => {
            cli::patterns::patterns(&input).map_err(|e| miette!("{}", e))
        }
        Commands::Dp { input } => cli::dp::dp(&input).map_err(|e| miette!("{}", e)),
    }
}
