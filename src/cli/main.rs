//! owid-catalog command line

mod commands;
mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use owid_catalog::catalog::CatalogQuery;
use owid_catalog::config::CatalogConfig;
use owid_catalog::meta::Channel;

#[derive(Parser)]
#[command(name = "owid-catalog", about = "Search, inspect and validate OWID catalog tables")]
struct Cli {
    /// Path to a TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rebuild catalog.json from a local catalog directory
    Reindex {
        /// Catalog root (<channel>/<namespace>/<version>/<dataset>/)
        root: PathBuf,
    },
    /// Search the catalog
    Find {
        /// Substring of the table name (case-insensitive)
        table: Option<String>,

        #[arg(long)]
        namespace: Option<String>,

        #[arg(long)]
        dataset: Option<String>,

        #[arg(long)]
        version: Option<String>,

        /// Restrict to channels (repeatable)
        #[arg(long = "channel")]
        channels: Vec<Channel>,

        /// Catalog URL or local directory, overrides the config
        #[arg(long)]
        catalog: Option<String>,

        /// Only the most recent version
        #[arg(long)]
        latest: bool,

        #[arg(long)]
        json: bool,
    },
    /// Print a table's metadata and first rows
    Show {
        /// Table file (.feather, .parquet or .csv)
        path: PathBuf,

        /// Number of rows to print
        #[arg(short = 'n', long, default_value_t = 10)]
        rows: usize,

        /// Print the metadata sidecar as JSON
        #[arg(long)]
        json: bool,
    },
    /// Check metadata completeness of a dataset or table
    Validate {
        /// Dataset directory or table file
        path: PathBuf,

        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Reindex { root } => commands::handle_reindex(&root),
        Commands::Find {
            table,
            namespace,
            dataset,
            version,
            channels,
            catalog,
            latest,
            json,
        } => {
            let mut config = CatalogConfig::load(cli.config.as_deref())?;
            if let Some(catalog) = catalog {
                config = config.with_catalog_url(catalog);
            }
            let query = CatalogQuery {
                table,
                namespace,
                dataset,
                version,
                channels,
            };
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?;
            runtime.block_on(commands::handle_find(&config, query, latest, json))
        }
        Commands::Show { path, rows, json } => commands::handle_show(&path, rows, json),
        Commands::Validate { path, json } => commands::handle_validate(&path, json),
    }
}
