use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::{debug, trace, warn};

use super::classify::{ObservedResponse, ResourceCollector};
use super::types::ResourceSizeMap;
use super::webdriver::{BrowserError, Session, WebDriverClient};

pub const NETWORK_QUIET_PERIOD: Duration = Duration::from_millis(500);
pub const NETWORK_POLL_INTERVAL: Duration = Duration::from_millis(250);

pub trait PageLoader {
    fn load(
        &self,
        url: &str,
        timeout: Duration,
    ) -> impl Future<Output = Result<ResourceSizeMap, BrowserError>>;
}

#[derive(Debug, Default)]
struct PendingBody {
    response: Option<ObservedResponse>,
    received: u64,
}

#[derive(Debug)]
pub struct NetworkTracker {
    collector: ResourceCollector,
    in_flight: HashSet<String>,
    pending: HashMap<String, PendingBody>,
    last_activity: Instant,
}

impl NetworkTracker {
    pub fn new(now: Instant) -> Self {
        Self {
            collector: ResourceCollector::new(),
            in_flight: HashSet::new(),
            pending: HashMap::new(),
            last_activity: now,
        }
    }

    pub fn ingest(&mut self, event: &Value, now: Instant) {
        let Some(method) = event.get("method").and_then(|m| m.as_str()) else {
            return;
        };
        if !method.starts_with("Network.") {
            return;
        }
        let params = event.get("params").unwrap_or(&Value::Null);
        let Some(request_id) = params.get("requestId").and_then(|v| v.as_str()) else {
            return;
        };
        self.last_activity = now;

        match method {
            "Network.requestWillBeSent" => {
                self.in_flight.insert(request_id.to_string());
            }
            "Network.responseReceived" => {
                let Some(response) = observed_response(params) else {
                    return;
                };
                if response.content_length.is_some() {
                    self.record(&response);
                } else {
                    self.pending.entry(request_id.to_string()).or_default().response =
                        Some(response);
                }
            }
            "Network.dataReceived" => {
                let len = params
                    .get("dataLength")
                    .and_then(|v| v.as_u64())
                    .unwrap_or(0);
                let body = self.pending.entry(request_id.to_string()).or_default();
                body.received = body.received.saturating_add(len);
            }
            "Network.loadingFinished" => {
                self.in_flight.remove(request_id);
                if let Some(body) = self.pending.remove(request_id)
                    && let Some(response) = body.response
                {
                    self.record(&response.with_body_len(body.received));
                }
            }
            "Network.loadingFailed" => {
                self.in_flight.remove(request_id);
                if self.pending.remove(request_id).is_some() {
                    trace!(request_id, "dropping response whose loading failed");
                }
            }
            _ => {}
        }
    }

    fn record(&mut self, response: &ObservedResponse) {
        if let Some((category, bytes)) = self.collector.record(response) {
            trace!(url = %response.url, %category, bytes, "counted response");
        }
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Nothing in flight and no network event for `quiet`.
    pub fn is_idle(&self, now: Instant, quiet: Duration) -> bool {
        self.in_flight.is_empty() && now.saturating_duration_since(self.last_activity) >= quiet
    }

    pub fn sizes(&self) -> &ResourceSizeMap {
        self.collector.sizes()
    }

    pub fn into_sizes(self) -> ResourceSizeMap {
        self.collector.into_sizes()
    }
}

fn header<'a>(headers: &'a Value, name: &str) -> Option<&'a str> {
    headers
        .as_object()?
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .and_then(|(_, value)| value.as_str())
}

pub fn observed_response(params: &Value) -> Option<ObservedResponse> {
    let response = params.get("response")?;
    let url = response.get("url")?.as_str()?;
    let status = response
        .get("status")
        .and_then(|v| v.as_f64())
        .map(|s| s as u16)
        .unwrap_or(0);
    let headers = response.get("headers").unwrap_or(&Value::Null);
    let content_type = header(headers, "content-type")
        .or_else(|| response.get("mimeType").and_then(|v| v.as_str()))
        .unwrap_or_default();

    let mut observed = ObservedResponse::new(url, status, content_type);
    let content_length = header(headers, "content-length").and_then(|v| v.trim().parse().ok());
    if let Some(length) = content_length {
        observed = observed.with_content_length(length);
    }
    Some(observed)
}

#[derive(Debug, Clone)]
pub struct WebDriverLoader {
    driver: WebDriverClient,
    chrome_binary: Option<PathBuf>,
}

impl WebDriverLoader {
    pub fn new(driver: WebDriverClient, chrome_binary: Option<PathBuf>) -> Self {
        Self {
            driver,
            chrome_binary,
        }
    }
}

impl PageLoader for WebDriverLoader {
    async fn load(&self, url: &str, timeout: Duration) -> Result<ResourceSizeMap, BrowserError> {
        let session = self
            .driver
            .create_session(self.chrome_binary.as_deref())
            .await?;
        let mut tracker = NetworkTracker::new(Instant::now());
        if let Err(err) = capture(&session, &mut tracker, url, timeout).await {
            warn!(%url, error = %err, "page load failed, keeping partial measurements");
        }
        session.close().await;

        let sizes = tracker.into_sizes();
        debug!(%url, bytes = sizes.total(), "page measured");
        Ok(sizes)
    }
}

async fn drain_log(
    session: &Session<'_>,
    tracker: &mut NetworkTracker,
) -> Result<(), BrowserError> {
    let events = session.performance_log().await?;
    let now = Instant::now();
    for event in &events {
        tracker.ingest(event, now);
    }
    Ok(())
}

async fn capture(
    session: &Session<'_>,
    tracker: &mut NetworkTracker,
    url: &str,
    timeout: Duration,
) -> Result<(), BrowserError> {
    let deadline = Instant::now() + timeout;
    session.set_page_load_timeout(timeout).await?;

    if let Err(err) = session.navigate(url).await {
        if err.is_timeout() {
            warn!(%url, ?timeout, "navigation timed out");
        } else {
            warn!(%url, error = %err, "navigation failed");
        }
        // Whatever arrived before the failure still counts.
        drain_log(session, tracker).await?;
        return Err(err);
    }

    loop {
        drain_log(session, tracker).await?;
        let now = Instant::now();
        if tracker.is_idle(now, NETWORK_QUIET_PERIOD) {
            return Ok(());
        }
        if now >= deadline {
            warn!(
                %url,
                ?timeout,
                in_flight = tracker.in_flight(),
                "navigation timed out before the network went idle"
            );
            return Ok(());
        }
        tokio::time::sleep(NETWORK_POLL_INTERVAL).await;
    }
}
