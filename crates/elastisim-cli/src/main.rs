//! elastisim — runs auto-scaling scenarios over virtual time.
//!
//! # Usage
//!
//! ```text
//! elastisim scaffold --output elastisim.toml
//! elastisim run --config elastisim.toml --store runs.redb
//! elastisim report --store runs.redb --run-id seed-42
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "elastisim",
    about = "elastisim — auto-scaling control loop simulator",
    version,
    propagate_version = true,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scenario described by a config file.
    Run {
        /// Scenario config (TOML).
        #[arg(short, long, default_value = "elastisim.toml")]
        config: PathBuf,
        /// Record ticks and scaling events into this redb file.
        #[arg(short, long)]
        store: Option<PathBuf>,
        /// Run id used as the record key prefix (default: seed-<seed>).
        #[arg(long)]
        run_id: Option<String>,
        /// Override the workload seed from the config.
        #[arg(long)]
        seed: Option<u64>,
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },
    /// Write a starter config.
    Scaffold {
        /// Destination file; printed to stdout when omitted.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Show runs recorded in a store.
    ///
    /// Without --run-id, lists the recorded runs.
    Report {
        #[arg(short, long)]
        store: PathBuf,
        #[arg(long)]
        run_id: Option<String>,
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("elastisim_sim=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            store,
            run_id,
            seed,
            format,
        } => commands::run::run(&config, store.as_deref(), run_id, seed, &format),
        Commands::Scaffold { output } => commands::scaffold::scaffold(output.as_deref()),
        Commands::Report {
            store,
            run_id,
            format,
        } => commands::report::report(&store, run_id.as_deref(), &format),
    }
}
