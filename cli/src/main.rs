//! Admin CLI for a Cozy-style document store.
//!
//! Imports templated fixture documents and runs one-off data migrations
//! against a store instance over its HTTP API.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{filter::EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use cozy_admin_lib::{CozyClient, Migration, import_file};

/// Environment variable consulted when `--token` is not given.
const TOKEN_ENV: &str = "COZY_ADMIN_TOKEN";

#[derive(Parser)]
#[command(name = "cozy-admin")]
#[command(about = "Import fixtures into and run migrations against a Cozy-style store", long_about = None)]
struct Cli {
    /// URL of the store instance
    #[arg(long, global = true, default_value = "http://cozy.localhost:8080")]
    url: String,

    /// Auth token (falls back to COZY_ADMIN_TOKEN)
    #[arg(long, global = true)]
    token: Option<String>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', action = clap::ArgAction::Count, global = true)]
    log_verbosity: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import documents described by a templated JSON fixture file
    Import {
        /// The fixture file to import
        #[arg(value_name = "FILE", default_value = "example-data.json")]
        file: PathBuf,

        /// JSON file of template helper overrides
        #[arg(long, value_name = "FILE")]
        helpers: Option<PathBuf>,
    },

    /// Run a data migration (dry run unless --execute is given)
    Migrate {
        /// Name of the migration; omit to list the available ones
        #[arg(value_name = "NAME")]
        name: Option<String>,

        /// Apply the writes instead of printing what would change
        #[arg(long)]
        execute: bool,
    },
}

/// Initialize the tracing subscriber from RUST_LOG or the -v flags.
fn init_tracing(verbose: u8) {
    let base_filter = match std::env::var("RUST_LOG") {
        Ok(filter) => filter,
        Err(_) => match verbose {
            0 => "info".to_string(),
            1 => "info,cozy_admin_lib=debug".to_string(),
            _ => "debug,cozy_admin_lib=trace".to_string(),
        },
    };
    let filter = EnvFilter::try_new(&base_filter).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr)
                .compact(),
        )
        .init();
}

fn resolve_token(flag: Option<String>) -> Result<String, Box<dyn std::error::Error>> {
    if let Some(token) = flag {
        return Ok(token);
    }
    std::env::var(TOKEN_ENV)
        .map_err(|_| format!("no auth token: pass --token or set {TOKEN_ENV}").into())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.log_verbosity);

    match cli.command {
        Commands::Import { file, helpers } => {
            let token = resolve_token(cli.token)?;
            let client = CozyClient::new(&cli.url, token)?;
            import_file(&client, &file, helpers.as_deref()).await?;
        }
        Commands::Migrate { name, execute } => {
            let Some(name) = name else {
                println!("available migrations:");
                for migration in Migration::all() {
                    println!("  {}  ({})", migration.name(), migration.doctypes().join(", "));
                }
                return Ok(());
            };
            let migration = Migration::from_name(&name)?;
            let token = resolve_token(cli.token)?;
            let client = CozyClient::new(&cli.url, token)?;
            let report = migration.run(&client, !execute).await?;
            if report.dry_run {
                tracing::info!("dry run finished; re-run with --execute to apply");
            }
        }
    }

    Ok(())
}
