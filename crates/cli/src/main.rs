//! Atelier CLI - Database migrations and management tools.
//!
//! # Usage
//!
//! ```bash
//! # Apply database migrations (catalog schema and session table)
//! atelier-cli migrate
//!
//! # Load the catalog from YAML, overwriting products with the same slug
//! atelier-cli seed products data/products.yaml --replace
//!
//! # Generate an admin API token
//! atelier-cli token
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `seed products` - Seed the catalog from YAML
//! - `token` - Print a new random admin API token

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "atelier-cli")]
#[command(author, version, about = "Atelier CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Seed the database
    Seed {
        #[command(subcommand)]
        target: SeedTarget,
    },
    /// Print a new random admin API token
    Token,
}

#[derive(Subcommand)]
enum SeedTarget {
    /// Load catalog products from a YAML file
    Products {
        /// Path to the YAML file
        file: PathBuf,

        /// Overwrite products whose slug already exists
        #[arg(long)]
        replace: bool,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Seed { target } => match target {
            SeedTarget::Products { file, replace } => {
                commands::seed::products(&file, replace).await?;
            }
        },
        Commands::Token => {
            #[allow(clippy::print_stdout)]
            {
                println!("{}", commands::token::generate());
            }
        }
    }
    Ok(())
}
