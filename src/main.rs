use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "compat-advisor")]
#[command(version, about = "Package compatibility analysis for platform upgrades")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Analyze a batch query file against its target platform
    Analyze {
        /// Batch query JSON file
        #[arg(long)]
        input: PathBuf,

        /// Engine configuration JSON file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Cache snapshot to load before and save after the run
        #[arg(long)]
        snapshot: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Analyze {
            input,
            config,
            snapshot,
        } => tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?
            .block_on(compat_advisor::cli::run_analyze(input, config, snapshot)),
    }
}
