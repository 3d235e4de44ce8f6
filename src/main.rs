//! Referral store - command-line interface.
//!
//! Runs store operations against a JSON workbook snapshot on disk.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use referral_store::db::{ReferralStore, StoreConfig, ENV_TARGET};
use referral_store::engine::{ListOptions, ListResult};
use referral_store::entities::EntityKind;
use referral_store::storage::InMemoryBackend;

#[derive(Parser)]
#[command(name = "referral-store")]
#[command(version = "0.1.0")]
#[command(about = "Referral tracking store over a tabular workbook")]
struct Cli {
    /// JSON workbook snapshot; created if absent
    #[arg(short, long, global = true, default_value = "referral-store.json")]
    snapshot: PathBuf,

    /// TOML configuration file (defaults to the environment)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create every sheet and column the store needs
    Bootstrap,

    /// List records of one entity
    List {
        /// applicants, referrers, companies or applications
        entity: String,

        /// Case-insensitive substring search
        #[arg(long)]
        search: Option<String>,

        /// Exact status match
        #[arg(long)]
        status: Option<String>,

        /// Page size; 0 lists everything
        #[arg(short, long)]
        limit: Option<usize>,

        #[arg(short, long, default_value = "0")]
        offset: usize,

        /// Include archived records
        #[arg(long)]
        include_archived: bool,
    },

    /// Print the next identifier an entity would receive
    NextId {
        entity: String,
    },
}

fn load_config(cli: &Cli) -> Result<StoreConfig, Box<dyn std::error::Error>> {
    let config = match &cli.config {
        Some(path) => StoreConfig::from_toml_file(path)?,
        None if std::env::var_os(ENV_TARGET).is_some() => StoreConfig::from_env()?,
        None => StoreConfig::new(cli.snapshot.display().to_string()),
    };
    Ok(config)
}

fn parse_entity(name: &str) -> Result<&'static EntityKind, Box<dyn std::error::Error>> {
    EntityKind::parse(name).ok_or_else(|| format!("unknown entity: {}", name).into())
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(&cli)?;
    let backend = InMemoryBackend::open_or_empty(&cli.snapshot)?;
    let store = ReferralStore::new(Arc::new(backend.clone()), config)?;

    match cli.command {
        Commands::Bootstrap => {
            for report in store.bootstrap().await? {
                println!(
                    "{}\t{:?}\t{}",
                    report.entity,
                    report.status,
                    report.added_columns.join(",")
                );
            }
            backend.save_snapshot(&cli.snapshot)?;
        }
        Commands::List {
            entity,
            search,
            status,
            limit,
            offset,
            include_archived,
        } => {
            let kind = parse_entity(&entity)?;
            let mut options = ListOptions::new()
                .offset(offset)
                .include_archived(include_archived);
            options.search = search;
            options.status = status;
            options.limit = limit;

            let result = store.entity(kind).list(&options).await?;
            print_list(kind, &result);
        }
        Commands::NextId { entity } => {
            let kind = parse_entity(&entity)?;
            println!("{}", store.entity(kind).next_id().await?);
        }
    }
    Ok(())
}

fn print_list(kind: &EntityKind, result: &ListResult) {
    println!("row\t{}\t{}\t{}\tmissing", kind.id_column, kind.list.status_column, kind.list.created_column);
    for item in &result.items {
        let record = &item.record;
        println!(
            "{}\t{}\t{}\t{}\t{}",
            record.row(),
            record.get(kind.id_column),
            record.get(kind.list.status_column),
            record.get(kind.list.created_column),
            item.missing_fields.join(",")
        );
    }
    println!("({} of {} records)", result.items.len(), result.total);
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
