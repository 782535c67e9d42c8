use std::io::Write;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::aggregate::WebsiteAccumulator;
use super::correction::ArchiveCorrection;
use super::error::AuditError;
use super::estimate::Estimator;
use super::loader::PageLoader;
use super::progress::ProgressBar;
use super::types::{AuditReport, PageResult, WebsiteInput};
use super::url_norm::{is_archive_url, normalize_archive_url};

pub struct Auditor<L, E> {
    loader: L,
    estimator: E,
    correction: ArchiveCorrection,
    page_timeout: Duration,
}

impl<L: PageLoader, E: Estimator> Auditor<L, E> {
    pub fn new(
        loader: L,
        estimator: E,
        correction: ArchiveCorrection,
        page_timeout: Duration,
    ) -> Self {
        Self {
            loader,
            estimator,
            correction,
            page_timeout,
        }
    }

    pub async fn measure_page(
        &self,
        website: &str,
        page_url: &str,
    ) -> Result<PageResult, AuditError> {
        let target = normalize_archive_url(page_url);
        if target != page_url {
            debug!(original = %page_url, normalized = %target, "hiding archive toolbar");
        }
        let sizes = self.loader.load(&target, self.page_timeout).await?;
        let corrected = self.correction.apply(&sizes, is_archive_url(&target));
        if corrected.corrected {
            debug!(
                url = %page_url,
                measured = sizes.total(),
                corrected = corrected.total_bytes,
                "applied archive correction"
            );
        }
        let estimate = self
            .estimator
            .estimate(corrected.total_bytes)
            .await
            .map_err(|source| AuditError::Estimate {
                page_url: page_url.to_string(),
                source,
            })?;
        Ok(PageResult::new(website, page_url, &corrected, estimate))
    }

    pub async fn run<W: Write>(
        &self,
        websites: &[WebsiteInput],
        progress: &mut ProgressBar<W>,
    ) -> Result<AuditReport, AuditError> {
        let total: usize = websites.iter().map(WebsiteInput::total_pages).sum();
        let mut processed = 0;
        let mut report = AuditReport::default();
        info!(websites = websites.len(), pages = total, "starting audit");

        for website in websites {
            if website.total_pages() == 0 {
                debug!(website = %website.name, "no pages configured, skipping");
                continue;
            }
            let mut acc = WebsiteAccumulator::new(&website.name);
            for page_url in &website.pages {
                progress.update(processed, total, &website.name)?;
                let page = self.measure_page(&website.name, page_url).await?;
                info!(
                    website = %website.name,
                    url = %page_url,
                    kb = page.total_kb(),
                    co2_grams = page.co2_grams,
                    rating = %page.rating,
                    "page measured"
                );
                acc.add_page(&page);
                report.push_page(page);
                processed += 1;
            }

            match acc.finish() {
                Some(summary) => report.push_summary(summary),
                None => warn!(website = %website.name, "no pages processed, omitting averages"),
            }
        }

        progress.update(processed, total, "done")?;
        progress.finish()?;
        Ok(report)
    }
}
