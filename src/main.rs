//! # Contact Directory CLI (`contacts`)
//!
//! ## Usage
//!
//! ```bash
//! contacts --config ./config/contacts.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `contacts init` | Create the SQLite database and schema |
//! | `contacts serve` | Start the HTTP server |
//! | `contacts list` | Print one page of contacts |
//! | `contacts get <id>` | Print one contact |
//!
//! Logging goes to stderr and honours `RUST_LOG`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use contact_directory::{config, get, list, migrate, server};

/// Contact Directory: list, search, and edit contacts over HTTP.
#[derive(Parser)]
#[command(name = "contacts", version)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/contacts.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run repeatedly.
    Init,

    /// Start the HTTP server on `[server].bind`.
    Serve,

    /// Print one page of contacts.
    List {
        /// Case-insensitive text matched against names and email address.
        #[arg(long)]
        search: Option<String>,

        /// Only contacts with this gender code (`M` or `F`).
        #[arg(long)]
        gender: Option<String>,

        /// 1-based page number.
        #[arg(long, default_value_t = 1)]
        page: u32,
    },

    /// Print a contact by id.
    Get {
        /// Contact id.
        id: i64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("contact_directory=info,tower_http=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::List {
            search,
            gender,
            page,
        } => {
            list::run_list(&cfg, search, gender, page).await?;
        }
        Commands::Get { id } => {
            get::run_get(&cfg, id).await?;
        }
    }

    Ok(())
}
