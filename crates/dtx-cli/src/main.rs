//! 🚀 dtx-cli — the front door, the bouncer, the maitre d' of dtx.
//!
//! 🎬 *[narrator voice]* "It all started with a simple main() function..."
//! 📦 This binary is the thin wrapper that parses args, sets up logging,
//! loads config, and then lets the library do the heavy lifting. Like a manager. 🦆

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dtx::common::{DateRange, parse_bound};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

// -- 🔧 the ol' reliable: picked up from the working directory if it exists
const DEFAULT_CONFIG_FILE: &str = "dtx.toml";

#[derive(Parser)]
#[command(
    name = "dtx",
    version,
    about = "Copy rows from a relational source into a document index, one chunk at a time"
)]
struct Cli {
    /// Path to a TOML config file (default: ./dtx.toml if present, else env vars only)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Copy every row updated in the date window (the default command)
    Copy {
        /// Inclusive start, YYYY-MM-DD or YYYY-MM-DDTHH:MM:SS (default: 2000-01-01)
        #[arg(long)]
        start: Option<String>,
        /// Inclusive end, same formats (default: start of today)
        #[arg(long)]
        end: Option<String>,
    },
    /// List a table's columns and types
    Describe {
        table: String,
        /// Schema to look in; required when the table name exists in several
        #[arg(long)]
        schema: Option<String>,
    },
}

/// 🔒 Resolve which config file to use, if any.
///
/// An explicit `--config` must exist. The default file is optional.
fn resolve_config_path(explicit: Option<PathBuf>) -> Result<Option<PathBuf>> {
    match explicit {
        Some(path) => {
            let exists = path.try_exists().with_context(|| {
                format!("💀 Couldn't check whether '{}' exists.", path.display())
            })?;
            if !exists {
                anyhow::bail!(
                    "💀 Configuration file '{}' does not exist. If it's a relative path, \
                     try an absolute one to be absolutely certain.",
                    path.display()
                );
            }
            Ok(Some(path))
        }
        None => {
            let default = Path::new(DEFAULT_CONFIG_FILE);
            Ok(default.try_exists().unwrap_or(false).then(|| default.to_path_buf()))
        }
    }
}

async fn execute(cli: Cli) -> Result<()> {
    let config_path = resolve_config_path(cli.config)?;
    let app_config = dtx::app_config::load_config(config_path.as_deref())
        .context("💀 Couldn't load the config. Check the file and any DTX_* env vars.")?;

    match cli.command.unwrap_or(Commands::Copy { start: None, end: None }) {
        Commands::Copy { start, end } => {
            let today = chrono::Local::now().date_naive();
            let configured = app_config.transfer.date_range(today)?;
            let range = DateRange::new(
                start.as_deref().map(parse_bound).transpose()?.unwrap_or(configured.start()),
                end.as_deref().map(parse_bound).transpose()?.unwrap_or(configured.end()),
            )?;
            let summary = dtx::run(app_config, range).await?;
            info!("🏁 Run summary:\n{}", summary.render_table());
        }
        Commands::Describe { table, schema } => {
            let columns = dtx::describe(&app_config, &table, schema.as_deref()).await?;
            for column in columns {
                println!("{}\t{}", column.name, column.data_type);
            }
        }
    }
    Ok(())
}

/// 🕵️ Sniff the error chain for the smell of an unreachable service.
fn looks_like_connection_trouble(err: &anyhow::Error) -> bool {
    err.chain().skip(1).any(|cause| {
        let cause_str = cause.to_string();
        cause_str.contains("error sending request")
            || cause_str.contains("connection refused")
            || cause_str.contains("Connection refused")
            || cause_str.contains("tcp connect error")
            || cause_str.contains("dns error")
            || cause_str.contains("error connecting to server")
    })
}

/// 🚀 main() — where it all begins.
///
/// 🔧 Steps:
/// 1. Init tracing (so we can see what goes wrong, and when)
/// 2. Parse args
/// 3. Load config, run the thing
/// 4. On failure: print the whole onion of causes, and exit 1
#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    if let Err(err) = execute(cli).await {
        error!("💀 error: {}", err);
        // -- 🧅 peel the onion of sadness, one layer at a time
        for cause in err.chain().skip(1) {
            error!("⚠️  cause: {}", cause);
        }
        if looks_like_connection_trouble(&err) {
            error!(
                "🔧 hint: looks like a service isn't reachable. \
                Double-check that the database and the search cluster are actually running. \
                If you're using Docker, try `docker ps` to see what's up. ☕"
            );
        }
        std::process::exit(1);
    }
}
