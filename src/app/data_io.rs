use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use super::rating::Rating;
use super::types::{
    AuditReport, Breakdown, EmissionsRange, MAX_PAGES_PER_WEBSITE, OutputRow, PageResult,
    WebsiteInput, WebsiteSummary,
};

pub const DEFAULT_DATASET_PATH: &str = "./data/dataset.csv";
pub const DEFAULT_OUTPUT_PATH: &str = "./data/results.csv";

pub const OUTPUT_HEADERS: [&str; 15] = [
    "Website",
    "Page URL",
    "Total Size (KB)",
    "CO2e (grams)",
    "Rating",
    "HTML (KB)",
    "HTML (%)",
    "Stylesheets (KB)",
    "Stylesheets (%)",
    "Scripts (KB)",
    "Scripts (%)",
    "Images (KB)",
    "Images (%)",
    "Other (KB)",
    "Other (%)",
];

#[derive(Debug, Error)]
pub enum DataError {
    #[error("{}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{}: missing `Website` column", path.display())]
    MissingWebsiteColumn { path: PathBuf },
    #[error("{}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DataFormat {
    Csv,
    Json,
}

pub fn detect_data_format(path: &Path, fallback: DataFormat) -> DataFormat {
    let lower = path.to_string_lossy().to_ascii_lowercase();
    if lower.ends_with(".json") {
        DataFormat::Json
    } else if lower.ends_with(".csv") {
        DataFormat::Csv
    } else {
        fallback
    }
}

pub fn load_websites(path: &Path) -> Result<Vec<WebsiteInput>, DataError> {
    let file = File::open(path).map_err(|source| DataError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let websites = read_websites(file, path)?;
    debug!(path = %path.display(), websites = websites.len(), "dataset loaded");
    Ok(websites)
}

/// Reads `Website, Page 1 .. Page 20` rows. `origin` only labels errors.
pub fn read_websites<R: Read>(reader: R, origin: &Path) -> Result<Vec<WebsiteInput>, DataError> {
    let csv_err = |source: csv::Error| DataError::Csv {
        path: origin.to_path_buf(),
        source,
    };
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(reader);
    let headers = rdr
        .headers()
        .map_err(csv_err)?
        .iter()
        .map(|h| h.trim().to_ascii_lowercase())
        .collect::<Vec<_>>();
    let idx = |name: &str| headers.iter().position(|h| h == name);

    let website_idx = idx("website").ok_or_else(|| DataError::MissingWebsiteColumn {
        path: origin.to_path_buf(),
    })?;
    let page_idx = (1..=MAX_PAGES_PER_WEBSITE)
        .filter_map(|n| idx(&format!("page {n}")))
        .collect::<Vec<_>>();

    let mut websites = Vec::new();
    for record in rdr.records() {
        let record = record.map_err(csv_err)?;
        let name = record.get(website_idx).unwrap_or_default().trim();
        let pages = page_idx
            .iter()
            .filter_map(|&i| record.get(i))
            .map(str::trim)
            .filter(|cell| !cell.is_empty())
            .collect::<Vec<_>>();
        if name.is_empty() && pages.is_empty() {
            continue;
        }
        websites.push(WebsiteInput::new(name, pages));
    }
    Ok(websites)
}

fn fmt_size(kb: f64) -> String {
    format!("{kb:.2}")
}

fn fmt_co2(grams: f64) -> String {
    format!("{grams:.3}")
}

fn fmt_percent(percent: f64) -> String {
    format!("{percent:.1}")
}

fn csv_fields(
    website: &str,
    page_url: &str,
    total_kb: f64,
    co2_grams: f64,
    rating: Rating,
    breakdown: &Breakdown,
) -> Vec<String> {
    let mut fields = vec![
        website.to_string(),
        page_url.to_string(),
        fmt_size(total_kb),
        fmt_co2(co2_grams),
        rating.label().to_string(),
    ];
    for share in breakdown.shares() {
        fields.push(fmt_size(share.kb));
        fields.push(fmt_percent(share.percent));
    }
    fields
}

pub fn write_csv_report<W: Write>(writer: W, report: &AuditReport) -> Result<(), csv::Error> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(OUTPUT_HEADERS)?;
    for row in &report.rows {
        match row {
            OutputRow::Page(page) => wtr.write_record(csv_fields(
                &page.website,
                &page.page_url,
                page.total_kb(),
                page.co2_grams,
                page.rating,
                &page.breakdown,
            ))?,
            OutputRow::Summary(summary) => wtr.write_record(csv_fields(
                &summary.label(),
                "",
                summary.average_kb,
                summary.average_co2_grams,
                summary.rating,
                &summary.breakdown,
            ))?,
            OutputRow::Separator => wtr.write_record([""; OUTPUT_HEADERS.len()])?,
        }
    }
    wtr.flush()?;
    Ok(())
}

#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum ExportRecord<'a> {
    Page {
        website: &'a str,
        page_url: &'a str,
        total_kb: f64,
        co2_grams: f64,
        rating: Rating,
        breakdown: &'a Breakdown,
    },
    Summary {
        website: &'a str,
        label: String,
        pages: usize,
        average_kb: f64,
        average_co2_grams: f64,
        rating: Rating,
        breakdown: &'a Breakdown,
        min_co2_grams: f64,
        max_co2_grams: f64,
    },
}

impl<'a> From<&'a PageResult> for ExportRecord<'a> {
    fn from(page: &'a PageResult) -> Self {
        ExportRecord::Page {
            website: &page.website,
            page_url: &page.page_url,
            total_kb: page.total_kb(),
            co2_grams: page.co2_grams,
            rating: page.rating,
            breakdown: &page.breakdown,
        }
    }
}

impl<'a> From<&'a WebsiteSummary> for ExportRecord<'a> {
    fn from(summary: &'a WebsiteSummary) -> Self {
        ExportRecord::Summary {
            website: &summary.website,
            label: summary.label(),
            pages: summary.pages,
            average_kb: summary.average_kb,
            average_co2_grams: summary.average_co2_grams,
            rating: summary.rating,
            breakdown: &summary.breakdown,
            min_co2_grams: summary.min_co2_grams,
            max_co2_grams: summary.max_co2_grams,
        }
    }
}

#[derive(Debug, Serialize)]
struct ExportDocument<'a> {
    generated_at: String,
    rows: Vec<ExportRecord<'a>>,
    chart: &'a [EmissionsRange],
}

pub fn write_json_report<W: Write>(writer: W, report: &AuditReport) -> serde_json::Result<()> {
    let rows = report
        .rows
        .iter()
        .filter_map(|row| match row {
            OutputRow::Page(page) => Some(ExportRecord::from(page)),
            OutputRow::Summary(summary) => Some(ExportRecord::from(summary)),
            OutputRow::Separator => None,
        })
        .collect();
    let doc = ExportDocument {
        generated_at: Utc::now().to_rfc3339(),
        rows,
        chart: &report.chart,
    };
    serde_json::to_writer_pretty(writer, &doc)
}

pub fn write_report(
    path: &Path,
    format: DataFormat,
    report: &AuditReport,
) -> Result<(), DataError> {
    let io_err = |source: io::Error| DataError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        warn!(dir = %parent.display(), "output directory missing, creating it");
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    let file = File::create(path).map_err(io_err)?;
    let mut out = BufWriter::new(file);
    match format {
        DataFormat::Csv => write_csv_report(&mut out, report).map_err(|source| DataError::Csv {
            path: path.to_path_buf(),
            source,
        })?,
        DataFormat::Json => {
            write_json_report(&mut out, report).map_err(|source| DataError::Json {
                path: path.to_path_buf(),
                source,
            })?
        }
    }
    out.flush().map_err(io_err)
}
