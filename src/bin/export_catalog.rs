use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use canil_console::config;
use canil_console::db;

#[derive(Debug, Parser)]
#[command(about = "Export the dog catalog to a JSON file.")]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Output file
    #[arg(long, default_value = "catalog.json")]
    out: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;

    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| format!("sqlite://{}/canil.db?mode=rwc", cfg.app.data_dir));
    let pool = db::init_pool(&database_url).await?;
    db::run_migrations(&pool).await?;

    let dogs = db::list_dogs(&pool).await?;
    let json = serde_json::to_string_pretty(&dogs)?;
    std::fs::write(&args.out, json)
        .with_context(|| format!("failed to write {}", args.out.display()))?;
    println!("Exported {} dogs to {}.", dogs.len(), args.out.display());
    Ok(())
}
