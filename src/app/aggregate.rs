use super::correction::CorrectedSizes;
use super::estimate::Estimate;
use super::rating::average_rating;
use super::types::{Breakdown, CategoryShare, PageResult, ResourceCategory, WebsiteSummary};

pub const BYTES_PER_KB: f64 = 1024.0;
pub const SIZE_DECIMALS: u32 = 2;
pub const CO2_DECIMALS: u32 = 3;
pub const PERCENT_DECIMALS: u32 = 1;

/// Rounds half away from zero at `decimals` places.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

pub fn bytes_to_kb(bytes: f64) -> f64 {
    bytes / BYTES_PER_KB
}

fn percent_of(part_kb: f64, total_kb: f64) -> f64 {
    if total_kb > 0.0 {
        part_kb / total_kb * 100.0
    } else {
        0.0
    }
}

impl PageResult {
    pub fn new(
        website: &str,
        page_url: &str,
        corrected: &CorrectedSizes,
        estimate: Estimate,
    ) -> Self {
        let total_kb = bytes_to_kb(corrected.total_bytes);
        let mut breakdown = Breakdown::default();
        for category in ResourceCategory::REPORTED {
            let kb = round_to(
                bytes_to_kb(corrected.sizes.get(category) as f64),
                SIZE_DECIMALS,
            );
            breakdown.set(
                category,
                CategoryShare {
                    kb,
                    percent: round_to(percent_of(kb, total_kb), PERCENT_DECIMALS),
                },
            );
        }

        Self {
            website: website.to_string(),
            page_url: page_url.to_string(),
            total_bytes: corrected.total_bytes,
            co2_grams: estimate.co2_grams,
            rating: estimate.rating,
            breakdown,
        }
    }

    pub fn total_kb(&self) -> f64 {
        round_to(bytes_to_kb(self.total_bytes), SIZE_DECIMALS)
    }
}

/// Running totals for one website. Every update is commutative, so the
/// order pages are added in does not change the summary.
#[derive(Debug, Clone)]
pub struct WebsiteAccumulator {
    website: String,
    pages: usize,
    size_bytes_sum: f64,
    co2_sum: f64,
    rating_sum: u32,
    breakdown_sum: Breakdown,
    min_co2: f64,
    max_co2: f64,
}

impl WebsiteAccumulator {
    pub fn new(website: impl Into<String>) -> Self {
        Self {
            website: website.into(),
            pages: 0,
            size_bytes_sum: 0.0,
            co2_sum: 0.0,
            rating_sum: 0,
            breakdown_sum: Breakdown::default(),
            min_co2: f64::INFINITY,
            max_co2: f64::NEG_INFINITY,
        }
    }

    pub fn add_page(&mut self, page: &PageResult) {
        self.pages += 1;
        self.size_bytes_sum += page.total_bytes;
        self.co2_sum += page.co2_grams;
        self.rating_sum += u32::from(page.rating.numeric());
        self.min_co2 = self.min_co2.min(page.co2_grams);
        self.max_co2 = self.max_co2.max(page.co2_grams);
        for category in ResourceCategory::REPORTED {
            let sum = self.breakdown_sum.get(category);
            let share = page.breakdown.get(category);
            self.breakdown_sum.set(
                category,
                CategoryShare {
                    kb: sum.kb + share.kb,
                    percent: sum.percent + share.percent,
                },
            );
        }
    }

    pub fn pages(&self) -> usize {
        self.pages
    }

    /// `None` when no page of the website was processed.
    pub fn finish(self) -> Option<WebsiteSummary> {
        if self.pages == 0 {
            return None;
        }
        let n = self.pages as f64;
        let mut breakdown = Breakdown::default();
        for category in ResourceCategory::REPORTED {
            let sum = self.breakdown_sum.get(category);
            breakdown.set(
                category,
                CategoryShare {
                    kb: round_to(sum.kb / n, SIZE_DECIMALS),
                    percent: round_to(sum.percent / n, PERCENT_DECIMALS),
                },
            );
        }

        Some(WebsiteSummary {
            average_kb: round_to(bytes_to_kb(self.size_bytes_sum / n), SIZE_DECIMALS),
            average_co2_grams: round_to(self.co2_sum / n, CO2_DECIMALS),
            rating: average_rating(self.rating_sum, self.pages),
            breakdown,
            min_co2_grams: self.min_co2,
            max_co2_grams: self.max_co2,
            pages: self.pages,
            website: self.website,
        })
    }
}
