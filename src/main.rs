use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use review_crawler::cli::{Cli, Command};
use review_crawler::{App, Config, Shutdown};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .json()
        .flatten_event(true)
        .with_current_span(true)
        .with_span_list(true)
        .init();

    let cli = Cli::parse();
    let cfg = Config::from_env()?;
    tracing::info!(
        database = %cfg.database_name,
        max_reviews = cfg.max_reviews_to_scrape,
        max_retries = cfg.max_retries,
        force_crawling = cfg.force_crawling,
        translation_enabled = cfg.translation_enabled,
        "Loaded configuration"
    );

    let shutdown = Shutdown::new();
    shutdown.listen_for_ctrl_c();
    let app = App::bootstrap(&cfg, shutdown).await?;

    match cli.command() {
        Command::Products => {
            let summary = app.product_crawler().run().await?;
            tracing::info!(summary = ?summary, "Products done");
        }
        Command::Reviews => {
            let summary = app.review_crawler().run().await?;
            tracing::info!(summary = ?summary, "Reviews done");
        }
        Command::Translate { limit } => {
            let summary = app.backfill(limit).await?;
            tracing::info!(summary = ?summary, "Backfill done");
        }
        Command::Run => {
            let listing = app.product_crawler().run().await?;
            tracing::info!(summary = ?listing, "Products done");
            let reviews = app.review_crawler().run().await?;
            tracing::info!(summary = ?reviews, "Reviews done");
        }
    }
    Ok(())
}
