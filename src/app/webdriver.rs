use std::fs::{self, File};
use std::io;
use std::net::{TcpListener, TcpStream, ToSocketAddrs};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use serde_json::{Value, json};
use tempfile::{NamedTempFile, TempDir};
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use super::config::WebDriverSettings;
use super::truncate_for_log;

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("invalid webdriver url {url}: {reason}")]
    InvalidEndpoint { url: String, reason: String },
    #[error("webdriver request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{context} HTTP {status}: {body}")]
    Status {
        context: &'static str,
        status: u16,
        body: String,
    },
    #[error("{context} webdriver error {error}: {message}")]
    WebDriver {
        context: &'static str,
        error: String,
        message: String,
    },
    #[error("{context} response malformed: {detail}")]
    Malformed {
        context: &'static str,
        detail: String,
    },
    #[error("webdriver endpoint {0} is unreachable and autostart is disabled")]
    Unreachable(String),
    #[error("failed to start {binary}: {reason}")]
    Autostart { binary: String, reason: String },
    #[error("browser profile setup failed: {0}")]
    Profile(#[from] io::Error),
}

impl BrowserError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, BrowserError::WebDriver { error, .. } if error == "timeout")
    }
}

#[derive(Debug, Clone)]
pub struct WebDriverClient {
    client: reqwest::Client,
    base: String,
}

impl WebDriverClient {
    pub fn new(endpoint: &str, request_timeout: Duration) -> Result<Self, BrowserError> {
        Url::parse(endpoint).map_err(|e| BrowserError::InvalidEndpoint {
            url: endpoint.to_string(),
            reason: e.to_string(),
        })?;
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;
        Ok(Self {
            client,
            base: endpoint.trim_end_matches('/').to_string(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.base
    }

    async fn call(
        &self,
        context: &'static str,
        request: reqwest::RequestBuilder,
    ) -> Result<Value, BrowserError> {
        let res = request.send().await?;
        let status = res.status();
        let body = res.text().await?;
        let value: Value = serde_json::from_str(&body).unwrap_or_default();
        if let Some(error) = value.pointer("/value/error").and_then(|v| v.as_str()) {
            let message = value
                .pointer("/value/message")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown webdriver error");
            return Err(BrowserError::WebDriver {
                context,
                error: error.to_string(),
                message: truncate_for_log(message, 240),
            });
        }
        if !status.is_success() {
            return Err(BrowserError::Status {
                context,
                status: status.as_u16(),
                body: truncate_for_log(&body, 240),
            });
        }
        Ok(value)
    }

    /// Starts a fresh headless Chrome with its own throwaway profile.
    pub async fn create_session(
        &self,
        chrome_binary: Option<&Path>,
    ) -> Result<Session<'_>, BrowserError> {
        let profile = tempfile::Builder::new()
            .prefix("pagecarbon-chrome-profile-")
            .tempdir()?;
        let caps = chrome_capabilities(profile.path(), chrome_binary);
        let value = self
            .call(
                "session create",
                self.client.post(format!("{}/session", self.base)).json(&caps),
            )
            .await?;
        let id = value
            .pointer("/value/sessionId")
            .and_then(|v| v.as_str())
            .or_else(|| value.pointer("/sessionId").and_then(|v| v.as_str()))
            .ok_or_else(|| BrowserError::Malformed {
                context: "session create",
                detail: format!(
                    "missing sessionId in {}",
                    truncate_for_log(&value.to_string(), 220)
                ),
            })?
            .to_string();
        debug!(session = %id, "webdriver session created");
        Ok(Session {
            driver: self,
            id,
            _profile: profile,
        })
    }
}

/// One browser instance. Call [`Session::close`] when done; the profile
/// directory is removed once the session is dropped.
#[derive(Debug)]
pub struct Session<'a> {
    driver: &'a WebDriverClient,
    id: String,
    _profile: TempDir,
}

impl Session<'_> {
    pub fn id(&self) -> &str {
        &self.id
    }

    fn url(&self, suffix: &str) -> String {
        format!("{}/session/{}{}", self.driver.base, self.id, suffix)
    }

    pub async fn set_page_load_timeout(&self, timeout: Duration) -> Result<(), BrowserError> {
        let body = json!({ "pageLoad": timeout.as_millis() as u64 });
        self.driver
            .call(
                "set timeouts",
                self.driver.client.post(self.url("/timeouts")).json(&body),
            )
            .await?;
        Ok(())
    }

    pub async fn navigate(&self, url: &str) -> Result<(), BrowserError> {
        self.driver
            .call(
                "navigate",
                self.driver
                    .client
                    .post(self.url("/url"))
                    .json(&json!({ "url": url })),
            )
            .await?;
        Ok(())
    }

    /// Drains Chrome's performance log and returns the DevTools events it
    /// held, each shaped `{"method": ..., "params": {...}}`.
    pub async fn performance_log(&self) -> Result<Vec<Value>, BrowserError> {
        let value = self
            .driver
            .call(
                "read performance log",
                self.driver
                    .client
                    .post(self.url("/se/log"))
                    .json(&json!({ "type": "performance" })),
            )
            .await?;
        Ok(devtools_events(&value))
    }

    pub async fn close(self) {
        let res = self
            .driver
            .call("delete session", self.driver.client.delete(self.url("")))
            .await;
        match res {
            Ok(_) => debug!(session = %self.id, "webdriver session closed"),
            Err(err) => {
                warn!(session = %self.id, error = %err, "failed to close webdriver session")
            }
        }
    }
}

/// Unwraps the JSON-in-a-string envelope chromedriver uses for log entries.
pub fn devtools_events(log: &Value) -> Vec<Value> {
    let Some(entries) = log.pointer("/value").and_then(|v| v.as_array()) else {
        return Vec::new();
    };
    entries
        .iter()
        .filter_map(|entry| entry.get("message").and_then(|m| m.as_str()))
        .filter_map(|raw| serde_json::from_str::<Value>(raw).ok())
        .filter_map(|mut envelope| envelope.get_mut("message").map(Value::take))
        .collect()
}

pub fn chrome_capabilities(profile_dir: &Path, chrome_binary: Option<&Path>) -> Value {
    let mut args = vec![
        format!("--user-data-dir={}", profile_dir.display()),
        "--headless=new".to_string(),
        "--incognito".to_string(),
        "--window-size=1400,1200".to_string(),
        "--disable-gpu".to_string(),
        "--disable-dev-shm-usage".to_string(),
        "--no-first-run".to_string(),
        "--no-default-browser-check".to_string(),
        "--disable-crash-reporter".to_string(),
        "--disable-application-cache".to_string(),
        "--disk-cache-size=0".to_string(),
        "--media-cache-size=0".to_string(),
    ];
    if !cfg!(target_os = "macos") {
        args.push("--no-sandbox".to_string());
    }
    let mut chrome_options = json!({
        "args": args,
        "perfLoggingPrefs": {
            "enableNetwork": true,
            "enablePage": false
        }
    });
    if let Some(binary) = chrome_binary {
        chrome_options["binary"] = json!(binary.to_string_lossy().to_string());
    }
    json!({
        "capabilities": {
            "alwaysMatch": {
                "browserName": "chrome",
                "acceptInsecureCerts": true,
                "pageLoadStrategy": "normal",
                "goog:loggingPrefs": { "performance": "ALL" },
                "goog:chromeOptions": chrome_options
            }
        }
    })
}

pub fn webdriver_reachable(endpoint: &str) -> bool {
    let parsed = match Url::parse(endpoint) {
        Ok(u) => u,
        Err(_) => return false,
    };
    let host = match parsed.host_str() {
        Some(h) => h,
        None => return false,
    };
    let port = parsed.port_or_known_default().unwrap_or(9515);
    let Ok(addrs) = (host, port).to_socket_addrs() else {
        return false;
    };
    addrs
        .into_iter()
        .any(|addr| TcpStream::connect_timeout(&addr, Duration::from_secs(2)).is_ok())
}

fn find_free_local_port() -> io::Result<u16> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}

fn read_log_tail(path: &Path, lines: usize) -> Option<String> {
    let text = fs::read_to_string(path).ok()?;
    let tail = text
        .lines()
        .rev()
        .take(lines.max(1))
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect::<Vec<_>>()
        .join(" | ");
    if tail.is_empty() { None } else { Some(tail) }
}

#[derive(Debug)]
pub struct DriverProcess {
    child: Child,
    endpoint: String,
    _log: NamedTempFile,
}

impl DriverProcess {
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl Drop for DriverProcess {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
        debug!(endpoint = %self.endpoint, "chromedriver stopped");
    }
}

/// Returns a reachable WebDriver endpoint, launching chromedriver on a free
/// local port when the configured one is down.
pub async fn ensure_driver(
    settings: &WebDriverSettings,
) -> Result<(String, Option<DriverProcess>), BrowserError> {
    let requested = settings.endpoint.trim_end_matches('/').to_string();
    if webdriver_reachable(&requested) {
        info!(endpoint = %requested, "using running webdriver");
        return Ok((requested, None));
    }
    if !settings.autostart {
        return Err(BrowserError::Unreachable(requested));
    }

    let process = start_chromedriver(&settings.driver_binary, settings.start_timeout).await?;
    info!(
        endpoint = %process.endpoint,
        binary = %settings.driver_binary.display(),
        "chromedriver autostarted"
    );
    Ok((process.endpoint.clone(), Some(process)))
}

async fn start_chromedriver(
    binary: &Path,
    start_timeout: Duration,
) -> Result<DriverProcess, BrowserError> {
    let autostart_err = |reason: String| BrowserError::Autostart {
        binary: binary.display().to_string(),
        reason,
    };
    let port = find_free_local_port().map_err(|e| autostart_err(format!("no free port: {e}")))?;
    let endpoint = format!("http://127.0.0.1:{port}");

    let log = tempfile::Builder::new()
        .prefix("pagecarbon-chromedriver-")
        .suffix(".log")
        .tempfile()?;
    let log_file: File = log.reopen()?;
    let log_file_err = log_file.try_clone()?;

    let mut child = Command::new(binary)
        .arg(format!("--port={port}"))
        .arg("--log-level=SEVERE")
        .stdout(Stdio::from(log_file))
        .stderr(Stdio::from(log_file_err))
        .stdin(Stdio::null())
        .spawn()
        .map_err(|e| autostart_err(e.to_string()))?;

    let steps = (start_timeout.as_millis() / 200).max(1);
    for _ in 0..steps {
        if webdriver_reachable(&endpoint) {
            return Ok(DriverProcess {
                child,
                endpoint,
                _log: log,
            });
        }
        if let Ok(Some(status)) = child.try_wait() {
            let mut reason = format!("exited early with status {status}");
            if let Some(tail) = read_log_tail(log.path(), 30) {
                reason = format!("{reason}; tail: {tail}");
            }
            return Err(autostart_err(reason));
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
    }

    let _ = child.kill();
    let _ = child.wait();
    let mut reason = format!("did not become ready within {start_timeout:?}");
    if let Some(tail) = read_log_tail(log.path(), 30) {
        reason = format!("{reason}; tail: {tail}");
    }
    Err(autostart_err(reason))
}
