pub mod aggregate;
pub mod audit;
pub mod chart;
pub mod classify;
pub mod config;
pub mod correction;
pub mod data_io;
pub mod error;
pub mod estimate;
pub mod loader;
pub mod progress;
pub mod rating;
pub mod runtime;
pub mod types;
pub mod url_norm;
pub mod webdriver;

pub use audit::Auditor;
pub use correction::ArchiveCorrection;
pub use error::AuditError;
pub use estimate::{Estimate, EstimateError, Estimator};
pub use loader::PageLoader;
pub use rating::Rating;
pub use runtime::run;
pub use types::{
    AuditReport, OutputRow, PageResult, ResourceCategory, ResourceSizeMap, WebsiteInput,
    WebsiteSummary,
};
pub use webdriver::BrowserError;

pub(crate) fn truncate_for_log(input: &str, max_chars: usize) -> String {
    let mut out = input.chars().take(max_chars).collect::<String>();
    if input.chars().count() > max_chars {
        out.push_str("...");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::truncate_for_log;

    #[test]
    fn truncates_on_char_boundaries() {
        assert_eq!(truncate_for_log("short", 10), "short");
        assert_eq!(truncate_for_log("ééééé", 2), "éé...");
    }
}
