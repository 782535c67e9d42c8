use super::types::{ResourceCategory, ResourceSizeMap};

// Empirical calibration of the Wayback Machine's own overhead on archived
// snapshots. These are fixed values, not measured per page.
pub const ARCHIVE_REDUCTION_PERCENT: f64 = 8.5;
pub const ARCHIVE_HTML_OFFSET_BYTES: u64 = 800;
pub const ARCHIVE_STYLESHEET_OFFSET_BYTES: u64 = 800;
pub const ARCHIVE_SCRIPT_OFFSET_BYTES: u64 = 1500;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArchiveCorrection {
    pub reduction_percent: f64,
    pub html_offset: u64,
    pub stylesheet_offset: u64,
    pub script_offset: u64,
}

impl Default for ArchiveCorrection {
    fn default() -> Self {
        Self {
            reduction_percent: ARCHIVE_REDUCTION_PERCENT,
            html_offset: ARCHIVE_HTML_OFFSET_BYTES,
            stylesheet_offset: ARCHIVE_STYLESHEET_OFFSET_BYTES,
            script_offset: ARCHIVE_SCRIPT_OFFSET_BYTES,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CorrectedSizes {
    pub total_bytes: f64,
    pub sizes: ResourceSizeMap,
    pub corrected: bool,
}

impl ArchiveCorrection {
    pub fn disabled() -> Self {
        Self {
            reduction_percent: 0.0,
            ..Self::default()
        }
    }

    pub fn with_reduction_percent(mut self, percent: f64) -> Self {
        self.reduction_percent = percent;
        self
    }

    /// The total shrinks by the percentage over every category; only
    /// Document, Script and Stylesheet also lose their fixed offsets.
    pub fn apply(&self, sizes: &ResourceSizeMap, is_archive: bool) -> CorrectedSizes {
        let measured = sizes.total() as f64;
        if !is_archive || self.reduction_percent.is_nan() || self.reduction_percent <= 0.0 {
            return CorrectedSizes {
                total_bytes: measured,
                sizes: *sizes,
                corrected: false,
            };
        }

        let mut corrected = *sizes;
        for (category, offset) in [
            (ResourceCategory::Document, self.html_offset),
            (ResourceCategory::Script, self.script_offset),
            (ResourceCategory::Stylesheet, self.stylesheet_offset),
        ] {
            corrected.set(category, sizes.get(category).saturating_sub(offset));
        }

        CorrectedSizes {
            total_bytes: measured * (1.0 - self.reduction_percent / 100.0),
            sizes: corrected,
            corrected: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ResourceSizeMap {
        ResourceSizeMap::new()
            .with(ResourceCategory::Document, 1000)
            .with(ResourceCategory::Script, 500)
            .with(ResourceCategory::Stylesheet, 300)
            .with(ResourceCategory::Image, 200)
            .with(ResourceCategory::Font, 50)
            .with(ResourceCategory::Other, 25)
    }

    #[test]
    fn live_pages_are_untouched() {
        let corrected = ArchiveCorrection::default().apply(&sample(), false);
        assert!(!corrected.corrected);
        assert_eq!(corrected.total_bytes, 2075.0);
        assert_eq!(corrected.sizes, sample());
    }

    #[test]
    fn zero_percent_disables_correction() {
        let corrected = ArchiveCorrection::disabled().apply(&sample(), true);
        assert!(!corrected.corrected);
        assert_eq!(corrected.total_bytes, 2075.0);
        assert_eq!(corrected.sizes, sample());

        let negative = ArchiveCorrection::default()
            .with_reduction_percent(-5.0)
            .apply(&sample(), true);
        assert!(!negative.corrected);

        let nan = ArchiveCorrection::default()
            .with_reduction_percent(f64::NAN)
            .apply(&sample(), true);
        assert!(!nan.corrected);
        assert_eq!(nan.total_bytes, 2075.0);
    }

    #[test]
    fn archive_pages_shrink_and_offsets_floor_at_zero() {
        let corrected = ArchiveCorrection::default().apply(&sample(), true);
        assert!(corrected.corrected);
        assert!((corrected.total_bytes - 2075.0 * 0.915).abs() < 1e-9);
        assert_eq!(corrected.sizes.get(ResourceCategory::Document), 200);
        assert_eq!(corrected.sizes.get(ResourceCategory::Script), 0);
        assert_eq!(corrected.sizes.get(ResourceCategory::Stylesheet), 0);
        assert_eq!(corrected.sizes.get(ResourceCategory::Image), 200);
        assert_eq!(corrected.sizes.get(ResourceCategory::Font), 50);
        assert_eq!(corrected.sizes.get(ResourceCategory::Other), 25);
    }

    #[test]
    fn total_scales_linearly_for_any_size_and_percentage() {
        for bytes in [0u64, 1, 799, 1024, 65_536, 10_000_000] {
            for percent in [0.0, 0.5, 8.5, 50.0, 99.9] {
                let sizes = ResourceSizeMap::new()
                    .with(ResourceCategory::Document, bytes)
                    .with(ResourceCategory::Script, bytes / 2)
                    .with(ResourceCategory::Stylesheet, bytes / 3);
                let measured = sizes.total() as f64;
                let corrected = ArchiveCorrection::default()
                    .with_reduction_percent(percent)
                    .apply(&sizes, true);
                let expected = measured * (1.0 - percent / 100.0);
                assert!((corrected.total_bytes - expected).abs() < 1e-6);
                assert!(corrected.total_bytes >= 0.0);
                assert!(corrected.sizes.total() <= sizes.total());
            }
        }
    }
}
