//! ag - fetch installers and package metadata from remote sources.

use clap::{Parser, Subcommand};
use console::style;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use ag_core::{Config, Error};
use ag_io::create_client;

mod commands;
mod display;

#[derive(Parser)]
#[command(name = "ag")]
#[command(about = "ag - download installers and look up packages")]
#[command(version)]
struct Cli {
    /// JSON config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Catalog base URL (overrides the config file)
    #[arg(long, global = true)]
    catalog_url: Option<String>,

    /// SQLite file for caching catalog responses
    #[arg(long, global = true)]
    cache: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download an installer
    Download {
        /// Source URL
        source: String,

        /// Directory to save into (default: current directory)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        /// File name to save as (default: resolved from the source)
        #[arg(long)]
        name: Option<String>,
    },

    /// Show catalog information about a package
    Info {
        /// Package name
        name: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print a small text resource, bypassing caches
    Fetch {
        /// Source URL
        source: String,
    },

    /// Print the file name a download would be saved under
    Resolve {
        /// Source URL
        source: String,
    },

    /// Remove cached catalog responses
    Cleanup {
        /// Only remove responses older than this many days (default: remove all)
        #[arg(long)]
        prune: Option<u32>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("{} {}", style("error:").red().bold(), e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("warn,ag_core=debug,ag_io=debug,ag_cli=debug")
    } else {
        EnvFilter::try_from_env("AG_LOG")
            .or_else(|_| EnvFilter::try_from_default_env())
            .unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<(), Error> {
    let config = load_config(cli.config.as_deref(), cli.catalog_url)?;
    debug!(
        catalog = %config.catalog_url,
        cache = ?cli.cache,
        "configuration loaded"
    );
    let client = create_client(&config, cli.cache.as_deref());

    match cli.command {
        Commands::Download {
            source,
            output,
            name,
        } => {
            let cancel = CancellationToken::new();
            cancel_on_ctrl_c(cancel.clone());
            commands::download::run(&client.dispatcher, &source, output, name, &cancel)
                .await
                .map(|_| ())
        }
        Commands::Info { name, json } => {
            commands::info::run_info(&client.catalog, &name, json).await
        }
        Commands::Fetch { source } => commands::source::run_fetch(&client.dispatcher, &source).await,
        Commands::Resolve { source } => {
            commands::source::run_resolve(&client.dispatcher, &source).await
        }
        Commands::Cleanup { prune } => {
            commands::cleanup::run_cleanup(cli.cache.as_deref(), prune).map(|_| ())
        }
    }
}

/// Config file (or defaults) with command-line overrides applied.
fn load_config(path: Option<&Path>, catalog_url: Option<String>) -> Result<Config, Error> {
    let mut config = match path {
        Some(path) => Config::from_json_file(path)?,
        None => Config::default(),
    };
    if let Some(url) = catalog_url {
        config = config.with_catalog_url(url);
    }
    Ok(config)
}

fn cancel_on_ctrl_c(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });
}
