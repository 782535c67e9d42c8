use std::io;
use std::time::Duration;

use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::FmtSubscriber;

use super::audit::Auditor;
use super::chart::show_chart;
use super::config::{AuditConfig, Cli};
use super::data_io::{load_websites, write_report};
use super::error::AuditError;
use super::estimate::CarbonApiEstimator;
use super::loader::WebDriverLoader;
use super::progress::ProgressBar;
use super::webdriver::{WebDriverClient, ensure_driver};

const CARBON_API_TIMEOUT: Duration = Duration::from_secs(30);
const WEBDRIVER_REQUEST_SLACK: Duration = Duration::from_secs(30);

fn init_logging(config: &AuditConfig) -> Result<(), AuditError> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(tracing::Level::from(config.log_level))
        .with_target(false)
        .with_writer(io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| AuditError::Logging(e.to_string()))
}

pub async fn run() -> Result<(), AuditError> {
    let config = AuditConfig::from(Cli::parse());
    init_logging(&config)?;
    debug!(?config, "configuration resolved");

    let websites = load_websites(&config.dataset_path)?;

    // Held until the run ends; dropping it stops an autostarted chromedriver.
    let (endpoint, _driver) = ensure_driver(&config.webdriver).await?;
    let client = WebDriverClient::new(&endpoint, config.page_timeout + WEBDRIVER_REQUEST_SLACK)?;
    let loader = WebDriverLoader::new(client, config.webdriver.chrome_binary.clone());
    let estimator = CarbonApiEstimator::new(&config.carbon_api_url, CARBON_API_TIMEOUT)
        .map_err(|source| AuditError::Estimate {
            page_url: config.carbon_api_url.clone(),
            source,
        })?;
    let auditor = Auditor::new(loader, estimator, config.correction, config.page_timeout);

    let mut progress = if config.show_progress {
        ProgressBar::new(io::stdout())
    } else {
        ProgressBar::hidden()
    };
    let report = auditor.run(&websites, &mut progress).await?;

    write_report(&config.output_path, config.output_format, &report)?;
    info!(
        pages = report.pages().count(),
        websites = report.chart.len(),
        "audit finished"
    );
    println!(
        "Analysis complete. Results saved to {}",
        config.output_path.display()
    );

    if config.show_chart && !report.chart.is_empty() {
        show_chart(&report.chart)?;
    }
    Ok(())
}
