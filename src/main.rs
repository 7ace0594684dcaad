//! # Atlas CLI (`atlas`)
//!
//! ## Usage
//!
//! ```bash
//! atlas --config ./config/atlas.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `atlas init` | Create the SQLite database, tables, and seed tags |
//! | `atlas serve` | Start the directory HTTP API |
//! | `atlas enrich` | Backfill missing profile images |
//! | `atlas probe "<name>"` | Run the image pipeline once and show each stage |
//! | `atlas tags` | Print the tag vocabulary |
//!
//! Logging goes to stderr through `tracing`. `--verbose` raises the crate's
//! level to debug; `RUST_LOG` overrides both.

use atlas::{config, enrich_cmd, migrate, server, tags};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Atlas: a real-estate agent directory with profile image enrichment.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/atlas.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "atlas",
    about = "Atlas: a real-estate agent directory with profile image enrichment",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/atlas.toml")]
    config: PathBuf,

    /// Log at debug level.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite file and all tables, and seeds the tag list from
    /// `[directory].default_tags` the first time. Safe to run repeatedly.
    Init,

    /// Start the directory HTTP API on `[server].bind`.
    Serve,

    /// Find profile images for agents that have none.
    Enrich {
        /// Re-run for every agent, replacing existing images.
        #[arg(long)]
        all: bool,
    },

    /// Run the enrichment pipeline once without touching the database.
    Probe {
        /// Agent's full name, as it would appear in image alt text.
        full_name: String,

        /// Agent website to scan.
        #[arg(long)]
        website: Option<String>,

        /// City or region, used by the search fallback.
        #[arg(long, default_value = "")]
        locality: String,
    },

    /// Print the current tag vocabulary.
    Tags,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "atlas=debug" } else { "atlas=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Enrich { all } => {
            enrich_cmd::run_enrich(&cfg, all).await?;
        }
        Commands::Probe {
            full_name,
            website,
            locality,
        } => {
            enrich_cmd::run_probe(&cfg, &full_name, website.as_deref(), &locality).await?;
        }
        Commands::Tags => {
            tags::run_tags(&cfg).await?;
        }
    }

    Ok(())
}
