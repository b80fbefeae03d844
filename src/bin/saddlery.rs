//! saddlery: storefront catalog CLI
//!
//! Fetches catalog data through the optimizer and prints it as JSON.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;

use saddlery::{ApiOptimizer, Catalog, Config};

/// Storefront catalog CLI
#[derive(Parser)]
#[command(name = "saddlery")]
#[command(version = saddlery::PKG_VERSION)]
#[command(about = "Query a storefront backend through the saddlery cache")]
struct Args {
    /// Path to configuration file.
    #[arg(short, long, env = "SADDLERY_CONFIG")]
    config: Option<std::path::PathBuf>,

    /// Override the backend base URL from the config file.
    #[arg(long)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the critical preload queue and print cache statistics
    Preload {
        /// Also preload listings for these category slugs
        #[arg(short, long)]
        category: Vec<String>,
    },

    /// List products
    Products {
        /// Only products in this category
        #[arg(short, long)]
        category: Option<String>,
    },

    /// Show a single product
    Product {
        /// Product id
        id: String,
    },

    /// List categories
    Categories,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if let Err(e) = run(args).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = Config::load(args.config.as_deref())?;
    if let Some(base_url) = args.base_url {
        config.api.base_url = base_url;
    }

    info!(version = %saddlery::version_string(), base_url = %config.api.base_url, "saddlery starting");

    let client = config.client()?;
    let optimizer = ApiOptimizer::new(config.optimizer_config());
    let catalog = Catalog::new(Arc::new(client), optimizer.clone());

    match args.command {
        Command::Preload { category } => {
            catalog.preload_critical();
            for slug in &category {
                catalog.preload_category(slug);
            }
            // Drain until nothing is runnable. A pass that finds another
            // pass running waits for it and tries again.
            loop {
                let report = optimizer.process_queue().await;
                if !report.already_running {
                    info!(
                        executed = report.executed,
                        failed = report.failed,
                        blocked = report.blocked,
                        "preload finished"
                    );
                    break;
                }
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            }
            print_json(&optimizer.cache_stats())?;
        }
        Command::Products { category } => {
            let products = match category {
                Some(slug) => catalog.products_in_category(&slug).await?,
                None => catalog.products().await?,
            };
            print_json(&products)?;
        }
        Command::Product { id } => {
            print_json(&catalog.product(&id).await?)?;
        }
        Command::Categories => {
            print_json(&catalog.categories().await?)?;
        }
    }

    optimizer.dispose();
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
