use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};

use super::correction::{ARCHIVE_REDUCTION_PERCENT, ArchiveCorrection};
use super::data_io::{DEFAULT_DATASET_PATH, DEFAULT_OUTPUT_PATH, DataFormat, detect_data_format};
use super::estimate::CARBON_API_URL;

pub const DEFAULT_WEBDRIVER_URL: &str = "http://localhost:9515";
pub const PAGE_LOAD_CEILING: Duration = Duration::from_secs(60);

#[derive(Debug, Parser, Clone)]
#[command(
    name = "pagecarbon",
    version,
    about = "Measures page weight in headless Chrome and estimates CO2e per page and per website"
)]
pub struct Cli {
    /// CSV with a `Website` column and `Page 1` .. `Page 20` URL columns.
    #[arg(long, value_name = "FILE", default_value = DEFAULT_DATASET_PATH)]
    pub dataset: PathBuf,

    #[arg(short, long, value_name = "FILE", default_value = DEFAULT_OUTPUT_PATH)]
    pub output: PathBuf,

    /// Output format; a `.json` or `.csv` output extension wins.
    #[arg(long, value_enum, default_value_t = FileFormatArg::Csv)]
    pub format: FileFormatArg,

    /// Share of an archived page's weight attributed to the archive itself.
    #[arg(
        long,
        value_name = "PERCENT",
        default_value_t = ARCHIVE_REDUCTION_PERCENT,
        value_parser = parse_reduction_percent
    )]
    pub reduction_percent: f64,

    #[arg(long, value_name = "MS", default_value_t = 60_000)]
    pub timeout_ms: u64,

    #[arg(long, value_name = "URL", default_value = DEFAULT_WEBDRIVER_URL)]
    pub webdriver_url: String,

    #[arg(long, value_name = "PATH", default_value = "chromedriver")]
    pub webdriver_binary: PathBuf,

    #[arg(long, value_name = "PATH")]
    pub chrome_binary: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub no_webdriver_autostart: bool,

    #[arg(long, value_name = "MS", default_value_t = 10_000)]
    pub webdriver_start_timeout_ms: u64,

    #[arg(long, value_name = "URL", default_value = CARBON_API_URL)]
    pub carbon_api_url: String,

    #[arg(long, default_value_t = false)]
    pub no_chart: bool,

    #[arg(long, default_value_t = false)]
    pub no_progress: bool,

    #[arg(long, value_enum, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,
}

fn parse_reduction_percent(raw: &str) -> Result<f64, String> {
    let value: f64 = raw
        .trim()
        .parse()
        .map_err(|e| format!("`{raw}` is not a number: {e}"))?;
    if !value.is_finite() || !(0.0..100.0).contains(&value) {
        return Err(format!("`{raw}` must be at least 0 and below 100"));
    }
    Ok(value)
}

#[derive(Debug, Copy, Clone, ValueEnum, PartialEq, Eq)]
pub enum FileFormatArg {
    Csv,
    Json,
}

impl From<FileFormatArg> for DataFormat {
    fn from(value: FileFormatArg) -> Self {
        match value {
            FileFormatArg::Csv => DataFormat::Csv,
            FileFormatArg::Json => DataFormat::Json,
        }
    }
}

#[derive(Debug, Copy, Clone, ValueEnum, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for tracing::Level {
    fn from(value: LogLevel) -> Self {
        match value {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebDriverSettings {
    pub endpoint: String,
    pub driver_binary: PathBuf,
    pub chrome_binary: Option<PathBuf>,
    pub autostart: bool,
    pub start_timeout: Duration,
}

impl Default for WebDriverSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_WEBDRIVER_URL.to_string(),
            driver_binary: PathBuf::from("chromedriver"),
            chrome_binary: None,
            autostart: true,
            start_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AuditConfig {
    pub dataset_path: PathBuf,
    pub output_path: PathBuf,
    pub output_format: DataFormat,
    pub correction: ArchiveCorrection,
    pub page_timeout: Duration,
    pub webdriver: WebDriverSettings,
    pub carbon_api_url: String,
    pub show_chart: bool,
    pub show_progress: bool,
    pub log_level: LogLevel,
}

impl From<Cli> for AuditConfig {
    fn from(cli: Cli) -> Self {
        let output_format = detect_data_format(&cli.output, cli.format.into());
        let page_timeout = Duration::from_millis(cli.timeout_ms.max(1)).min(PAGE_LOAD_CEILING);
        Self {
            dataset_path: cli.dataset,
            output_path: cli.output,
            output_format,
            correction: ArchiveCorrection::default().with_reduction_percent(cli.reduction_percent),
            page_timeout,
            webdriver: WebDriverSettings {
                endpoint: cli.webdriver_url,
                driver_binary: cli.webdriver_binary,
                chrome_binary: cli.chrome_binary,
                autostart: !cli.no_webdriver_autostart,
                start_timeout: Duration::from_millis(cli.webdriver_start_timeout_ms),
            },
            carbon_api_url: cli.carbon_api_url,
            show_chart: !cli.no_chart,
            show_progress: !cli.no_progress,
            log_level: cli.log_level,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> AuditConfig {
        let argv = std::iter::once("pagecarbon").chain(args.iter().copied());
        Cli::try_parse_from(argv).unwrap().into()
    }

    #[test]
    fn defaults_reproduce_fixed_behaviour() {
        let config = parse(&[]);
        assert_eq!(config.dataset_path, PathBuf::from("./data/dataset.csv"));
        assert_eq!(config.output_path, PathBuf::from("./data/results.csv"));
        assert_eq!(config.output_format, DataFormat::Csv);
        assert_eq!(config.correction, ArchiveCorrection::default());
        assert_eq!(config.page_timeout, Duration::from_secs(60));
        assert_eq!(config.webdriver, WebDriverSettings::default());
        assert_eq!(config.carbon_api_url, CARBON_API_URL);
        assert!(config.show_chart);
        assert!(config.show_progress);
        assert_eq!(config.log_level, LogLevel::Info);
    }

    #[test]
    fn reduction_percent_must_stay_below_hundred() {
        for bad in ["150", "100", "NaN", "inf", "-0.5", "lots"] {
            let argv = ["pagecarbon", "--reduction-percent", bad];
            assert!(Cli::try_parse_from(argv).is_err(), "{bad} was accepted");
        }
        assert_eq!(
            parse(&["--reduction-percent", "99.9"]).correction.reduction_percent,
            99.9
        );
        assert_eq!(
            parse(&["--reduction-percent", "0"]).correction.reduction_percent,
            0.0
        );
    }

    #[test]
    fn timeout_is_capped_at_ceiling() {
        assert_eq!(
            parse(&["--timeout-ms", "120000"]).page_timeout,
            PAGE_LOAD_CEILING
        );
        assert_eq!(
            parse(&["--timeout-ms", "1500"]).page_timeout,
            Duration::from_millis(1500)
        );
    }

    #[test]
    fn output_extension_selects_format() {
        assert_eq!(
            parse(&["--output", "out/results.json"]).output_format,
            DataFormat::Json
        );
        assert_eq!(
            parse(&["--output", "out/results.csv", "--format", "json"]).output_format,
            DataFormat::Csv
        );
        assert_eq!(
            parse(&["--output", "out/results", "--format", "json"]).output_format,
            DataFormat::Json
        );
    }

    #[test]
    fn flags_flow_into_config() {
        let config = parse(&[
            "--reduction-percent",
            "0",
            "--no-webdriver-autostart",
            "--webdriver-url",
            "http://127.0.0.1:4444",
            "--chrome-binary",
            "/opt/chrome",
            "--no-chart",
            "--no-progress",
            "--log-level",
            "debug",
        ]);
        assert_eq!(config.correction.reduction_percent, 0.0);
        assert!(!config.webdriver.autostart);
        assert_eq!(config.webdriver.endpoint, "http://127.0.0.1:4444");
        assert_eq!(
            config.webdriver.chrome_binary,
            Some(PathBuf::from("/opt/chrome"))
        );
        assert!(!config.show_chart);
        assert!(!config.show_progress);
        assert_eq!(tracing::Level::from(config.log_level), tracing::Level::DEBUG);
    }
}
