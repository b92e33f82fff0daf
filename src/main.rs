use std::fs;
use std::path::PathBuf;

use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use tallybook::core::tree::CategoryNode;
use tallybook::core::{CategoryDraft, NO_CATEGORY_ID, recurrence};
use tallybook::export::csv::write_csv;
use tallybook::export::qif::{QifExportOptions, write_qif};
use tallybook::import::qif::QifDateFormat;
use tallybook::import::{self, StatementImporter, csv::CsvImporter, qif};
use tallybook::store::SqliteStore;
use tracing_subscriber::EnvFilter;

#[derive(Serialize, Deserialize)]
struct Config {
    db_path: String,
    currency: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: "tallybook.db".to_string(),
            currency: "USD".to_string(),
        }
    }
}

#[derive(Parser)]
#[command(name = "tallybook", about = "Track personal finances in a local store")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, default_value = "tallybook.toml")]
    config: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum DateOrder {
    /// day/month/year
    Dm,
    /// month/day/year
    Md,
}

impl From<DateOrder> for QifDateFormat {
    fn from(value: DateOrder) -> Self {
        match value {
            DateOrder::Dm => QifDateFormat::DayMonth,
            DateOrder::Md => QifDateFormat::MonthDay,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the category tree
    Category {
        #[command(subcommand)]
        command: CategoryCommands,
    },
    /// Import a statement file
    Import {
        path: PathBuf,
        /// QIF date field order (ignored for CSV)
        #[arg(long, value_enum, default_value = "dm")]
        date_order: DateOrder,
    },
    /// Export the store to a statement file
    Export {
        path: PathBuf,
        #[arg(long, value_enum, default_value = "dm")]
        date_order: DateOrder,
    },
    /// List accounts
    Accounts,
    /// List scheduled transactions with their next firing
    Schedules,
}

#[derive(Subcommand)]
enum CategoryCommands {
    /// Add a category, keeping siblings sorted by title
    Add {
        title: String,
        #[arg(long, default_value_t = NO_CATEGORY_ID)]
        parent: i64,
    },
    /// Rename a category and/or move it under a new parent
    Move {
        id: i64,
        #[arg(long)]
        parent: i64,
        #[arg(long)]
        title: Option<String>,
    },
    /// Delete a category and its whole subtree
    Rm { id: i64 },
    /// Print the category hierarchy
    Tree,
}

#[derive(Debug)]
enum CliError {
    InvalidConfig(String),
    UnsupportedFormat(String),
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::InvalidConfig(msg) => write!(f, "invalid configuration: {msg}"),
            CliError::UnsupportedFormat(ext) => {
                write!(f, "unsupported statement format: {ext}")
            }
        }
    }
}

impl std::error::Error for CliError {}

fn load_config(path: &PathBuf) -> Result<Config, CliError> {
    match fs::read_to_string(path) {
        Ok(data) => toml::from_str(&data).map_err(|e| CliError::InvalidConfig(e.to_string())),
        Err(_) => Ok(Config::default()),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;
    let mut store = SqliteStore::open(&config.db_path)?;

    match cli.command {
        Commands::Category { command } => run_category(&mut store, command)?,
        Commands::Import { path, date_order } => {
            let statement = match extension(&path).as_str() {
                "qif" => qif::parse_with_format(&path, date_order.into())?,
                "csv" => CsvImporter::parse(&path)?,
                other => return Err(CliError::UnsupportedFormat(other.to_string()).into()),
            };
            let summary = import::apply(&mut store, &statement, &config.currency)?;
            println!(
                "imported {} transactions into {} accounts ({} categories)",
                summary.transactions, summary.accounts, summary.categories
            );
        }
        Commands::Export { path, date_order } => {
            match extension(&path).as_str() {
                "qif" => {
                    let mut out = fs::File::create(&path)?;
                    let options = QifExportOptions {
                        date_format: date_order.into(),
                    };
                    write_qif(&store, &mut out, &options)?;
                }
                "csv" => {
                    let out = fs::File::create(&path)?;
                    write_csv(&store, out, true)?;
                }
                other => return Err(CliError::UnsupportedFormat(other.to_string()).into()),
            }
            println!("exported to {}", path.display());
        }
        Commands::Accounts => {
            for account in store.all_accounts()? {
                println!(
                    "{:>4}  {} ({}, {})",
                    account.id, account.title, account.kind, account.currency
                );
            }
        }
        Commands::Schedules => {
            let now = Utc::now();
            for upcoming in recurrence::sorted_schedules(store.scheduled_transactions()?, now) {
                let next = upcoming
                    .next
                    .map(|d| d.to_rfc3339())
                    .unwrap_or_else(|| "expired".to_string());
                println!("{:>4}  next: {next}", upcoming.schedule.id);
            }
        }
    }
    Ok(())
}

fn run_category(
    store: &mut SqliteStore,
    command: CategoryCommands,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        CategoryCommands::Add { title, parent } => {
            let id = store.insert_or_update_category(&CategoryDraft::new(parent, title), &[])?;
            println!("created category {id}");
        }
        CategoryCommands::Move { id, parent, title } => {
            let title = match title {
                Some(t) => t,
                None => store.category(id)?.title,
            };
            store.move_category(id, parent, &title)?;
            println!("moved category {id}");
        }
        CategoryCommands::Rm { id } => {
            store.delete_category(id)?;
            println!("deleted category {id}");
        }
        CategoryCommands::Tree => {
            let tree = store.category_tree(false)?;
            print_nodes(&tree.roots, 0);
        }
    }
    Ok(())
}

fn print_nodes(nodes: &[CategoryNode], depth: usize) {
    for node in nodes {
        println!(
            "{}{} [{}]",
            "  ".repeat(depth),
            node.category.title,
            node.category.id
        );
        print_nodes(&node.children, depth + 1);
    }
}

fn extension(path: &PathBuf) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase()
}
