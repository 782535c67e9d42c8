use std::future::Future;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;
use url::Url;

use super::rating::Rating;
use super::truncate_for_log;

pub const CARBON_API_URL: &str = "https://api.websitecarbon.com";

#[derive(Debug, Error)]
pub enum EstimateError {
    #[error("invalid carbon API url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("carbon API request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("carbon API returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("carbon API response malformed: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Estimate {
    pub co2_grams: f64,
    pub rating: Rating,
}

pub trait Estimator {
    fn estimate(&self, total_bytes: f64) -> impl Future<Output = Result<Estimate, EstimateError>>;
}

#[derive(Debug, Deserialize)]
struct CarbonApiResponse {
    statistics: CarbonStatistics,
    rating: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CarbonStatistics {
    co2: CarbonCo2,
}

#[derive(Debug, Deserialize)]
struct CarbonCo2 {
    grid: CarbonGrid,
}

#[derive(Debug, Deserialize)]
struct CarbonGrid {
    grams: f64,
}

pub fn parse_carbon_response(body: &str) -> Result<Estimate, EstimateError> {
    let parsed: CarbonApiResponse = serde_json::from_str(body).map_err(|e| {
        EstimateError::Malformed(format!("{e}; body={}", truncate_for_log(body, 200)))
    })?;
    if !parsed.statistics.co2.grid.grams.is_finite() {
        return Err(EstimateError::Malformed(
            "statistics.co2.grid.grams is not a finite number".to_string(),
        ));
    }
    let rating = parsed
        .rating
        .as_deref()
        .map(Rating::from_reported)
        .unwrap_or(Rating::NotAvailable);
    Ok(Estimate {
        co2_grams: parsed.statistics.co2.grid.grams,
        rating,
    })
}

#[derive(Debug, Clone)]
pub struct CarbonApiEstimator {
    client: reqwest::Client,
    base_url: Url,
}

impl CarbonApiEstimator {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, EstimateError> {
        let base_url = Url::parse(base_url).map_err(|e| EstimateError::InvalidUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base_url })
    }

    pub fn request_url(&self, total_bytes: f64) -> Result<Url, EstimateError> {
        let bytes = total_bytes.max(0.0).round() as u64;
        let mut url = self
            .base_url
            .join("data")
            .map_err(|e| EstimateError::InvalidUrl {
                url: self.base_url.to_string(),
                reason: e.to_string(),
            })?;
        url.query_pairs_mut()
            .append_pair("bytes", &bytes.to_string())
            .append_pair("green", "0");
        Ok(url)
    }
}

impl Estimator for CarbonApiEstimator {
    async fn estimate(&self, total_bytes: f64) -> Result<Estimate, EstimateError> {
        let url = self.request_url(total_bytes)?;
        debug!(%url, "requesting emissions estimate");
        let res = self.client.get(url).send().await?;
        let status = res.status();
        let body = res.text().await?;
        if !status.is_success() {
            return Err(EstimateError::Status {
                status: status.as_u16(),
                body: truncate_for_log(&body, 240),
            });
        }
        parse_carbon_response(&body)
    }
}
