//! catsync CLI
//!
//! Mirrors a Shopify product catalog into a local journaled store and
//! serves the vehicle lookups derived from it.
//!
//! # Commands
//!
//! - `sync` - Run a sync cycle now and then on a fixed interval
//! - `query` - Read-only lookups, printed as a JSON envelope
//! - `version` - Show version information

mod commands;
mod http;

use catsync_engine::{RetryConfig, ShopifyConfig, SyncConfig, MAX_PAGE_SIZE};
use clap::{Parser, Subcommand};
use commands::query::Lookup;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Catalog synchronization tools.
#[derive(Parser)]
#[command(name = "catsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the catalog journal file
    #[arg(global = true, short, long, env = "CATSYNC_STORE")]
    store: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sync the remote catalog into the store, then repeat on an interval
    Sync {
        /// Shop subdomain ({shop}.myshopify.com)
        #[arg(long, env = "SHOPIFY_SHOP_NAME")]
        shop: String,

        /// Admin API access token
        #[arg(long, env = "SHOPIFY_ACCESS_TOKEN", hide_env_values = true)]
        token: String,

        /// Admin API version
        #[arg(long, default_value = "2025-07")]
        api_version: String,

        /// Records requested per page (at most 250)
        #[arg(long, default_value_t = MAX_PAGE_SIZE)]
        page_size: u32,

        /// Hours between sync cycles
        #[arg(long, default_value_t = 12)]
        interval_hours: u64,

        /// Run one cycle and exit
        #[arg(long)]
        once: bool,
    },

    /// Read-only lookups against the synced catalog
    Query {
        #[command(subcommand)]
        lookup: QueryCommand,
    },

    /// Show version information
    Version,
}

#[derive(Subcommand)]
enum QueryCommand {
    /// List every metadata key observed
    Keys,
    /// List every year
    Years,
    /// List makes for a year
    Makes {
        /// Model year
        year: i32,
    },
    /// List models for a make
    Models {
        /// Make name
        make: String,
    },
    /// Find the record for a vehicle and option
    Spec {
        /// Model year
        year: i32,
        /// Make name
        make: String,
        /// Model name
        model: String,
        /// Option, matched against the record title
        option: String,
    },
    /// List every option
    Options,
}

impl From<QueryCommand> for Lookup {
    fn from(command: QueryCommand) -> Self {
        match command {
            QueryCommand::Keys => Lookup::Keys,
            QueryCommand::Years => Lookup::Years,
            QueryCommand::Makes { year } => Lookup::Makes { year },
            QueryCommand::Models { make } => Lookup::Models { make },
            QueryCommand::Spec {
                year,
                make,
                model,
                option,
            } => Lookup::Spec {
                year,
                make,
                model,
                option,
            },
            QueryCommand::Options => Lookup::Options,
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging; RUST_LOG takes precedence when set.
    let default = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Sync {
            shop,
            token,
            api_version,
            page_size,
            interval_hours,
            once,
        } => {
            let path = cli.store.ok_or("Store path required for sync")?;
            let options = commands::sync::SyncOptions {
                shopify: ShopifyConfig::new(shop, token).with_api_version(api_version),
                sync: SyncConfig::new()
                    .with_page_size(page_size)
                    .with_retry(RetryConfig::default()),
                interval: Duration::from_secs(interval_hours.saturating_mul(3600)),
                once,
            };
            commands::sync::run(&path, options)?;
        }
        Commands::Query { lookup } => {
            let path = cli.store.ok_or("Store path required for query")?;
            commands::query::run(&path, &lookup.into())?;
        }
        Commands::Version => {
            println!("catsync CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
