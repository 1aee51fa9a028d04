use clap::Parser;
use event_scraper::config::Config;
use event_scraper::logging;
use event_scraper::pipeline::Pipeline;
use tracing::{error, info, warn};

/// Scrapes upcoming Eventbrite Singapore events for the configured period,
/// saves them under `results/<batch>/` and writes a summary report.
#[derive(Parser)]
#[command(name = "event_scraper")]
#[command(about = "Eventbrite Singapore event scraper and report generator")]
#[command(version = "0.1.0")]
struct Cli {}

// Always exits successfully; failures are reported through the logs.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    logging::init_logging();
    let _cli = Cli::parse();

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            warn!("Invalid configuration, falling back to defaults: {}", e);
            let mut config = Config::default();
            config.apply_env();
            config
        }
    };

    println!("🚀 Scraping {} events...", config.scrape.period);
    match Pipeline::run(&config).await {
        Ok(result) => {
            info!(folder = %result.batch_id, "Run finished");
            println!("\n📊 Results for {}:", result.period);
            println!("   Listings found: {}", result.listings_found);
            println!("   Listings saved: {}", result.listings_saved);
            println!("   Output folder: {}", result.output_dir.display());
            match &result.report_path {
                Some(path) => println!("   Report: {}", path.display()),
                None => println!("   ⚠️  Report was not generated, see logs"),
            }
        }
        Err(e) => {
            error!("Run failed: {}", e);
            println!("❌ Run failed: {}", e);
        }
    }

    Ok(())
}
