use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use gamekeys_ingest::store::{connect, run_migrations, PgCatalogStore, PgSettingsStore};
use gamekeys_ingest::{IngestConfig, IngestService};
use gamekeys_web::{serve, AppState};

#[derive(Debug, Parser)]
#[command(name = "gamekeys-cli")]
#[command(about = "Game keys catalog ingestion tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Scrape one product page into the catalog.
    Scrape {
        url: String,
        /// Category to attach to the ingested record.
        #[arg(long)]
        category: Option<Uuid>,
    },
    /// Scrape several product pages, reporting per-URL outcomes.
    Bulk {
        urls: Vec<String>,
        #[arg(long)]
        category: Option<Uuid>,
    },
    /// Re-fetch current prices for the given catalog ids.
    RefreshPrices { game_ids: Vec<String> },
    /// Convert a UAH price using the stored rate and markup.
    CalcPrice {
        uah_price: f64,
        /// Markup percent overriding the stored default.
        #[arg(long)]
        markup: Option<f64>,
    },
    /// Show the store settings, or update them when flags are given.
    Settings {
        #[arg(long)]
        exchange_rate: Option<f64>,
        #[arg(long)]
        markup_percent: Option<f64>,
    },
    /// Apply pending database migrations.
    Migrate,
    /// Run the admin JSON API.
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let config = IngestConfig::from_env();
    let pool = connect(&config.database_url).await?;

    if let Commands::Migrate = cli.command {
        run_migrations(&pool).await?;
        println!("migrations applied");
        return Ok(());
    }

    let service = IngestService::from_config(
        &config,
        Box::new(PgCatalogStore::new(pool.clone())),
        Box::new(PgSettingsStore::new(pool)),
    )?;

    match cli.command {
        Commands::Scrape { url, category } => {
            let record = service.scrape_one(&url, category).await?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        Commands::Bulk { urls, category } => {
            let report = service.scrape_bulk(&urls, category).await;
            println!(
                "bulk scrape: {} processed, {} succeeded, {} failed",
                report.total_processed, report.success_count, report.failed_count
            );
            for entry in &report.failures {
                println!("  failed {}: {}", entry.url, entry.error);
            }
        }
        Commands::RefreshPrices { game_ids } => {
            let report = service.refresh_prices(&game_ids).await;
            println!(
                "price refresh: {} processed, {} updated, {} failed",
                report.total_processed, report.success_count, report.failed_count
            );
            for entry in &report.updated_games {
                println!(
                    "  {} -> {:?} ({})",
                    entry.title, entry.discount_price, entry.discount_percentage
                );
            }
            for entry in &report.failures {
                println!("  failed {}: {}", entry.game_id, entry.error);
            }
        }
        Commands::CalcPrice { uah_price, markup } => {
            let quote = service.calculate_price(uah_price, markup).await?;
            println!("{}", serde_json::to_string_pretty(&quote)?);
        }
        Commands::Settings {
            exchange_rate,
            markup_percent,
        } => {
            let settings = if exchange_rate.is_none() && markup_percent.is_none() {
                service.get_or_init_settings().await?
            } else {
                service.update_settings(exchange_rate, markup_percent).await?
            };
            println!("{}", serde_json::to_string_pretty(&settings)?);
        }
        Commands::Serve => {
            println!("listening on 0.0.0.0:{}", config.web_port);
            serve(AppState::new(Arc::new(service)), config.web_port).await?;
        }
        Commands::Migrate => unreachable!("handled above"),
    }

    Ok(())
}
