//! Bulava CLI - Database migrations and catalog seeding.
//!
//! # Usage
//!
//! ```bash
//! # Run storefront migrations and create the session table
//! bulava-cli migrate
//!
//! # Load categories and products from a YAML fixture
//! bulava-cli seed catalog fixtures/catalog.yaml
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "bulava-cli")]
#[command(author, version, about = "Bulava storefront CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Seed the database from fixture files
    Seed {
        #[command(subcommand)]
        target: SeedTarget,
    },
}

#[derive(Subcommand)]
enum SeedTarget {
    /// Upsert categories and products from a YAML file
    Catalog {
        /// Path to the catalog fixture
        file: PathBuf,
    },
    /// Create customer accounts from a YAML file
    Users {
        /// Path to the users fixture
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() {
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
        Commands::Migrate => commands::migrate::storefront().await?,
        Commands::Seed { target } => match target {
            SeedTarget::Catalog { file } => commands::seed::catalog(&file).await?,
            SeedTarget::Users { file } => commands::seed::users(&file).await?,
        },
    }
    Ok(())
}
