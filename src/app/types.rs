use std::fmt;

use serde::Serialize;

use super::rating::Rating;

pub const MAX_PAGES_PER_WEBSITE: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ResourceCategory {
    Document,
    Script,
    Stylesheet,
    Image,
    Font,
    Other,
}

impl ResourceCategory {
    pub const ALL: [ResourceCategory; 6] = [
        ResourceCategory::Document,
        ResourceCategory::Script,
        ResourceCategory::Stylesheet,
        ResourceCategory::Image,
        ResourceCategory::Font,
        ResourceCategory::Other,
    ];

    /// Categories with their own output columns, in column order. Fonts only
    /// count toward the page total.
    pub const REPORTED: [ResourceCategory; 5] = [
        ResourceCategory::Document,
        ResourceCategory::Stylesheet,
        ResourceCategory::Script,
        ResourceCategory::Image,
        ResourceCategory::Other,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ResourceCategory::Document => "Document",
            ResourceCategory::Script => "Script",
            ResourceCategory::Stylesheet => "Stylesheet",
            ResourceCategory::Image => "Image",
            ResourceCategory::Font => "Font",
            ResourceCategory::Other => "Other",
        }
    }

    fn slot(self) -> usize {
        self as usize
    }
}

impl fmt::Display for ResourceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceSizeMap {
    bytes: [u64; 6],
}

impl ResourceSizeMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, category: ResourceCategory) -> u64 {
        self.bytes[category.slot()]
    }

    pub fn set(&mut self, category: ResourceCategory, bytes: u64) {
        self.bytes[category.slot()] = bytes;
    }

    pub fn add(&mut self, category: ResourceCategory, bytes: u64) {
        let slot = &mut self.bytes[category.slot()];
        *slot = slot.saturating_add(bytes);
    }

    pub fn with(mut self, category: ResourceCategory, bytes: u64) -> Self {
        self.set(category, bytes);
        self
    }

    pub fn total(&self) -> u64 {
        self.bytes.iter().fold(0u64, |acc, b| acc.saturating_add(*b))
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (ResourceCategory, u64)> + '_ {
        ResourceCategory::ALL
            .into_iter()
            .map(|category| (category, self.get(category)))
    }
}

impl FromIterator<(ResourceCategory, u64)> for ResourceSizeMap {
    fn from_iter<I: IntoIterator<Item = (ResourceCategory, u64)>>(iter: I) -> Self {
        let mut map = ResourceSizeMap::new();
        for (category, bytes) in iter {
            map.add(category, bytes);
        }
        map
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CategoryShare {
    pub kb: f64,
    pub percent: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Breakdown {
    pub html: CategoryShare,
    pub stylesheets: CategoryShare,
    pub scripts: CategoryShare,
    pub images: CategoryShare,
    pub other: CategoryShare,
}

impl Breakdown {
    pub fn get(&self, category: ResourceCategory) -> CategoryShare {
        match category {
            ResourceCategory::Document => self.html,
            ResourceCategory::Stylesheet => self.stylesheets,
            ResourceCategory::Script => self.scripts,
            ResourceCategory::Image => self.images,
            ResourceCategory::Other => self.other,
            ResourceCategory::Font => CategoryShare::default(),
        }
    }

    pub fn set(&mut self, category: ResourceCategory, share: CategoryShare) {
        match category {
            ResourceCategory::Document => self.html = share,
            ResourceCategory::Stylesheet => self.stylesheets = share,
            ResourceCategory::Script => self.scripts = share,
            ResourceCategory::Image => self.images = share,
            ResourceCategory::Other => self.other = share,
            ResourceCategory::Font => {}
        }
    }

    pub fn shares(&self) -> [CategoryShare; 5] {
        ResourceCategory::REPORTED.map(|category| self.get(category))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageResult {
    pub website: String,
    pub page_url: String,
    /// Bytes after archive correction. Fractional once the percentage
    /// reduction has been applied.
    pub total_bytes: f64,
    pub co2_grams: f64,
    pub rating: Rating,
    pub breakdown: Breakdown,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WebsiteSummary {
    pub website: String,
    pub pages: usize,
    pub average_kb: f64,
    pub average_co2_grams: f64,
    pub rating: Rating,
    pub breakdown: Breakdown,
    pub min_co2_grams: f64,
    pub max_co2_grams: f64,
}

impl WebsiteSummary {
    pub fn label(&self) -> String {
        format!("{} Averages", self.website)
    }

    pub fn emissions_range(&self) -> EmissionsRange {
        EmissionsRange {
            website: self.website.clone(),
            min: self.min_co2_grams,
            avg: self.average_co2_grams,
            max: self.max_co2_grams,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmissionsRange {
    pub website: String,
    pub min: f64,
    pub avg: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OutputRow {
    Page(PageResult),
    Summary(WebsiteSummary),
    Separator,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuditReport {
    pub rows: Vec<OutputRow>,
    pub chart: Vec<EmissionsRange>,
}

impl AuditReport {
    pub fn push_page(&mut self, page: PageResult) {
        self.rows.push(OutputRow::Page(page));
    }

    pub fn push_summary(&mut self, summary: WebsiteSummary) {
        self.chart.push(summary.emissions_range());
        self.rows.push(OutputRow::Summary(summary));
        self.rows.push(OutputRow::Separator);
    }

    pub fn pages(&self) -> impl Iterator<Item = &PageResult> {
        self.rows.iter().filter_map(|row| match row {
            OutputRow::Page(page) => Some(page),
            _ => None,
        })
    }

    pub fn summaries(&self) -> impl Iterator<Item = &WebsiteSummary> {
        self.rows.iter().filter_map(|row| match row {
            OutputRow::Summary(summary) => Some(summary),
            _ => None,
        })
    }

    pub fn summary_for(&self, website: &str) -> Option<&WebsiteSummary> {
        self.summaries().find(|summary| summary.website == website)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WebsiteInput {
    pub name: String,
    pub pages: Vec<String>,
}

impl WebsiteInput {
    pub fn new(
        name: impl Into<String>,
        pages: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            name: name.into(),
            pages: pages.into_iter().map(Into::into).collect(),
        }
    }

    pub fn total_pages(&self) -> usize {
        self.pages.len()
    }
}
