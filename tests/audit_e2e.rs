use std::fs;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use pagecarbon::app::data_io::{DataFormat, load_websites, write_report};
use pagecarbon::app::progress::ProgressBar;
use pagecarbon::app::{
    ArchiveCorrection, AuditError, Auditor, BrowserError, Estimate, EstimateError, Estimator,
    OutputRow, PageLoader, Rating, ResourceCategory, ResourceSizeMap, WebsiteInput,
};

fn sample_sizes() -> ResourceSizeMap {
    ResourceSizeMap::new()
        .with(ResourceCategory::Document, 1000)
        .with(ResourceCategory::Script, 500)
        .with(ResourceCategory::Stylesheet, 300)
        .with(ResourceCategory::Image, 200)
}

struct FixedLoader {
    sizes: ResourceSizeMap,
    loads: AtomicUsize,
}

impl FixedLoader {
    fn new(sizes: ResourceSizeMap) -> Self {
        Self {
            sizes,
            loads: AtomicUsize::new(0),
        }
    }
}

impl PageLoader for &FixedLoader {
    async fn load(&self, _url: &str, _timeout: Duration) -> Result<ResourceSizeMap, BrowserError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(self.sizes)
    }
}

struct FixedEstimator {
    estimate: Estimate,
    seen_bytes: Mutex<Vec<f64>>,
}

impl FixedEstimator {
    fn new(co2_grams: f64, rating: Rating) -> Self {
        Self {
            estimate: Estimate { co2_grams, rating },
            seen_bytes: Mutex::new(Vec::new()),
        }
    }
}

impl Estimator for &FixedEstimator {
    async fn estimate(&self, total_bytes: f64) -> Result<Estimate, EstimateError> {
        self.seen_bytes.lock().unwrap().push(total_bytes);
        Ok(self.estimate)
    }
}

struct FailingEstimator {
    fail_at: usize,
    calls: AtomicUsize,
}

impl Estimator for FailingEstimator {
    async fn estimate(&self, _total_bytes: f64) -> Result<Estimate, EstimateError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call == self.fail_at {
            return Err(EstimateError::Status {
                status: 500,
                body: "internal error".to_string(),
            });
        }
        Ok(Estimate {
            co2_grams: 1.0,
            rating: Rating::A,
        })
    }
}

fn two_by_two() -> Vec<WebsiteInput> {
    vec![
        WebsiteInput::new("Alpha", ["https://alpha.example/", "https://alpha.example/about"]),
        WebsiteInput::new("Beta", ["https://beta.example/", "https://beta.example/contact"]),
    ]
}

fn auditor<L: PageLoader, E: Estimator>(loader: L, estimator: E) -> Auditor<L, E> {
    Auditor::new(loader, estimator, ArchiveCorrection::default(), Duration::from_secs(60))
}

#[tokio::test]
async fn two_websites_two_pages_each() {
    let loader = FixedLoader::new(sample_sizes());
    let estimator = FixedEstimator::new(10.0, Rating::B);
    let report = auditor(&loader, &estimator)
        .run(&two_by_two(), &mut ProgressBar::<Vec<u8>>::hidden())
        .await
        .unwrap();

    assert_eq!(loader.loads.load(Ordering::SeqCst), 4);
    assert_eq!(estimator.seen_bytes.lock().unwrap().as_slice(), [2000.0; 4]);
    assert_eq!(report.pages().count(), 4);
    assert_eq!(report.rows.len(), 8);
    assert_eq!(report.rows[3], OutputRow::Separator);
    assert_eq!(report.rows[7], OutputRow::Separator);

    for website in ["Alpha", "Beta"] {
        let summary = report.summary_for(website).unwrap();
        assert_eq!(summary.label(), format!("{website} Averages"));
        assert_eq!(summary.average_kb, 1.95);
        assert_eq!(summary.rating, Rating::B);
        assert_eq!(summary.average_co2_grams, 10.0);
        assert_eq!(summary.breakdown.html.kb, 0.98);
        assert_eq!(summary.breakdown.html.percent, 50.2);
    }
    assert_eq!(report.chart.len(), 2);
    assert_eq!(report.chart[1].website, "Beta");

    let mut csv = Vec::new();
    pagecarbon::app::data_io::write_csv_report(&mut csv, &report).unwrap();
    let csv = String::from_utf8(csv).unwrap();
    assert!(csv.contains("Alpha Averages,,1.95,10.000,B,"));
}

#[tokio::test]
async fn estimator_failure_aborts_the_run() {
    let loader = FixedLoader::new(sample_sizes());
    let err = auditor(
        &loader,
        FailingEstimator {
            fail_at: 2,
            calls: AtomicUsize::new(0),
        },
    )
    .run(&two_by_two(), &mut ProgressBar::<Vec<u8>>::hidden())
    .await
    .unwrap_err();

    match &err {
        AuditError::Estimate { page_url, source } => {
            assert_eq!(page_url, "https://beta.example/");
            assert!(matches!(source, EstimateError::Status { status: 500, .. }));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(err.exit_code(), 1);
    assert_eq!(loader.loads.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn failed_navigation_still_yields_zero_size_pages() {
    let loader = FixedLoader::new(ResourceSizeMap::new());
    let estimator = FixedEstimator::new(0.0, Rating::APlus);
    let websites = vec![WebsiteInput::new(
        "Offline",
        ["https://offline.example/", "https://offline.example/2"],
    )];
    let report = auditor(&loader, &estimator)
        .run(&websites, &mut ProgressBar::<Vec<u8>>::hidden())
        .await
        .unwrap();

    let pages = report.pages().collect::<Vec<_>>();
    assert_eq!(pages.len(), 2);
    for page in pages {
        assert_eq!(page.total_kb(), 0.0);
        assert_eq!(page.breakdown.html.percent, 0.0);
    }
    let summary = report.summary_for("Offline").unwrap();
    assert_eq!(summary.pages, 2);
    assert_eq!(summary.average_kb, 0.0);
    assert_eq!(summary.rating, Rating::APlus);
}

#[tokio::test]
async fn website_without_pages_is_left_out() {
    let loader = FixedLoader::new(sample_sizes());
    let estimator = FixedEstimator::new(1.0, Rating::C);
    let websites = vec![
        WebsiteInput::new("Nothing", Vec::<String>::new()),
        WebsiteInput::new("Something", ["https://something.example/"]),
    ];
    let report = auditor(&loader, &estimator)
        .run(&websites, &mut ProgressBar::<Vec<u8>>::hidden())
        .await
        .unwrap();

    assert!(report.summary_for("Nothing").is_none());
    assert_eq!(report.chart.len(), 1);
    assert_eq!(report.chart[0].website, "Something");
    assert!(
        report
            .pages()
            .all(|page| page.website == "Something")
    );
}

#[tokio::test]
async fn archived_snapshots_are_priced_after_correction() {
    let loader = FixedLoader::new(sample_sizes());
    let estimator = FixedEstimator::new(0.5, Rating::A);
    let websites = vec![WebsiteInput::new(
        "Archived",
        ["https://web.archive.org/web/20200101000000/http://archived.example/"],
    )];
    let report = auditor(&loader, &estimator)
        .run(&websites, &mut ProgressBar::<Vec<u8>>::hidden())
        .await
        .unwrap();

    let page = report.pages().next().unwrap();
    assert_eq!(estimator.seen_bytes.lock().unwrap().len(), 1);
    assert!((page.total_bytes - 2000.0 * 0.915).abs() < 1e-9);
    assert_eq!(
        page.page_url,
        "https://web.archive.org/web/20200101000000/http://archived.example/"
    );
    // Document 1000 - 800 = 200 bytes; scripts and stylesheets floor at zero.
    assert_eq!(page.breakdown.html.kb, 0.2);
    assert_eq!(page.breakdown.scripts.kb, 0.0);
    assert_eq!(page.breakdown.stylesheets.kb, 0.0);
}

#[tokio::test]
async fn dataset_to_results_file() {
    let dir = tempfile::tempdir().unwrap();
    let dataset = dir.path().join("dataset.csv");
    fs::write(
        &dataset,
        "Website,Page 1,Page 2\nAlpha,https://alpha.example/,https://alpha.example/about\n",
    )
    .unwrap();

    let websites = load_websites(&dataset).unwrap();
    let loader = FixedLoader::new(sample_sizes());
    let estimator = FixedEstimator::new(10.0, Rating::B);
    let report = auditor(&loader, &estimator)
        .run(&websites, &mut ProgressBar::<Vec<u8>>::hidden())
        .await
        .unwrap();

    let output = dir.path().join("out").join("results.csv");
    write_report(&output, DataFormat::Csv, &report).unwrap();
    let text = fs::read_to_string(&output).unwrap();
    let lines = text.lines().collect::<Vec<_>>();
    assert_eq!(lines.len(), 5);
    assert!(lines[0].starts_with("Website,Page URL,Total Size (KB),CO2e (grams),Rating"));
    assert!(lines[1].starts_with("Alpha,https://alpha.example/,1.95,10.000,B,0.98,50.2"));
    assert!(lines[3].starts_with("Alpha Averages,,1.95,10.000,B"));
    assert!(lines[4].chars().all(|c| c == ','));
}
