//! Durable run state, the flat lead ledger and HTTP fetch utilities for the lead agent.

use std::collections::HashSet;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use leadgen_core::{bool_flag, Lead, ABSENT};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const CRATE_NAME: &str = "leadgen-storage";

pub const PROGRESS_FILE: &str = "progress.json";
pub const VISITED_FILE: &str = "processed_businesses.json";
pub const CACHE_FILE: &str = "synced_cache.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub index: usize,
    #[serde(default)]
    pub date: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CacheRecord {
    #[serde(default)]
    pub names: Vec<String>,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub with_email: u64,
    #[serde(default)]
    pub last_sync: Option<String>,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("serializing {unit}: {source}")]
    Serialize {
        unit: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("writing {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Three independent JSON units (progress, visited ids, name cache) under one directory.
///
/// Reads never fail: a missing or unreadable unit loads as its empty default. Writes
/// replace the whole unit through a temp file + rename so a crash leaves either the
/// old or the new content on disk.
#[derive(Debug, Clone)]
pub struct StateStore {
    root: PathBuf,
}

impl StateStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn load_progress(&self) -> usize {
        self.read_unit::<ProgressRecord>(PROGRESS_FILE)
            .await
            .map(|r| r.index)
            .unwrap_or(0)
    }

    pub async fn save_progress(&self, index: usize) -> Result<(), StoreError> {
        let record = ProgressRecord {
            index,
            date: Utc::now().to_rfc3339(),
        };
        self.write_unit(PROGRESS_FILE, &record).await
    }

    pub async fn load_visited(&self) -> HashSet<String> {
        self.read_unit::<Vec<String>>(VISITED_FILE)
            .await
            .map(|ids| ids.into_iter().collect())
            .unwrap_or_default()
    }

    pub async fn save_visited(&self, visited: &HashSet<String>) -> Result<(), StoreError> {
        let mut ids = visited.iter().cloned().collect::<Vec<_>>();
        ids.sort();
        self.write_unit(VISITED_FILE, &ids).await
    }

    pub async fn load_cache(&self) -> CacheRecord {
        self.read_unit::<CacheRecord>(CACHE_FILE)
            .await
            .unwrap_or_default()
    }

    pub async fn save_cache<'a>(
        &self,
        names: impl IntoIterator<Item = &'a String>,
        total: u64,
        with_email: u64,
    ) -> Result<(), StoreError> {
        let mut names = names.into_iter().cloned().collect::<Vec<_>>();
        names.sort();
        let record = CacheRecord {
            names,
            total,
            with_email,
            last_sync: Some(Utc::now().to_rfc3339()),
        };
        self.write_unit(CACHE_FILE, &record).await
    }

    async fn read_unit<T: DeserializeOwned>(&self, unit: &'static str) -> Option<T> {
        let path = self.root.join(unit);
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(unit, "no saved state, starting empty");
                return None;
            }
            Err(err) => {
                warn!(unit, error = %err, "unreadable state unit, starting empty");
                return None;
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(unit, error = %err, "corrupt state unit, starting empty");
                None
            }
        }
    }

    async fn write_unit<T: Serialize>(&self, unit: &'static str, value: &T) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(value).map_err(|source| StoreError::Serialize { unit, source })?;
        let path = self.root.join(unit);
        let io_err = |source| StoreError::Io {
            path: path.display().to_string(),
            source,
        };

        fs::create_dir_all(&self.root).await.map_err(io_err)?;
        let temp_path = self.root.join(format!(".{}.{}.tmp", unit, Uuid::new_v4()));
        let mut file = fs::OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&temp_path)
            .await
            .map_err(io_err)?;
        file.write_all(&bytes).await.map_err(io_err)?;
        file.flush().await.map_err(io_err)?;
        drop(file);

        if let Err(err) = fs::rename(&temp_path, &path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(io_err(err));
        }
        Ok(())
    }
}

pub const LEDGER_COLUMNS: [&str; 10] = [
    "Business Name",
    "Email",
    "Phone",
    "Website",
    "Instagram",
    "Location",
    "Rating",
    "Reviews",
    "Business Type",
    "Has_Website",
];

/// One row of the flat ledger, in column order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadRow {
    #[serde(rename = "Business Name")]
    pub business_name: String,
    #[serde(rename = "Email")]
    pub email: String,
    #[serde(rename = "Phone")]
    pub phone: String,
    #[serde(rename = "Website")]
    pub website: String,
    #[serde(rename = "Instagram")]
    pub instagram: String,
    #[serde(rename = "Location")]
    pub location: String,
    #[serde(rename = "Rating")]
    pub rating: String,
    #[serde(rename = "Reviews")]
    pub reviews: String,
    #[serde(rename = "Business Type")]
    pub business_type: String,
    #[serde(rename = "Has_Website")]
    pub has_website: String,
}

impl LeadRow {
    pub fn from_lead(lead: &Lead) -> Self {
        Self {
            business_name: lead.business_name().to_string(),
            email: lead.email().unwrap_or(ABSENT).to_string(),
            phone: lead.phone().unwrap_or(ABSENT).to_string(),
            website: lead.website().unwrap_or(ABSENT).to_string(),
            instagram: lead.social_handle().unwrap_or(ABSENT).to_string(),
            location: lead.location().to_string(),
            rating: format_rating(lead.rating()),
            reviews: lead.review_count().to_string(),
            business_type: lead.business_type().to_string(),
            has_website: bool_flag(lead.has_website()).to_string(),
        }
    }

    pub fn values(&self) -> Vec<String> {
        vec![
            self.business_name.clone(),
            self.email.clone(),
            self.phone.clone(),
            self.website.clone(),
            self.instagram.clone(),
            self.location.clone(),
            self.rating.clone(),
            self.reviews.clone(),
            self.business_type.clone(),
            self.has_website.clone(),
        ]
    }
}

fn format_rating(rating: f64) -> String {
    if rating.fract() == 0.0 {
        format!("{}", rating as i64)
    } else {
        rating.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LedgerStats {
    pub rows: u64,
    pub with_email: u64,
}

#[derive(Debug, Error)]
pub enum LedgerFileError {
    #[error("opening ledger {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("encoding ledger row: {0}")]
    Csv(#[from] csv::Error),
    #[error("writing ledger: {0}")]
    Write(#[from] std::io::Error),
}

/// Append-only CSV file holding every captured lead.
#[derive(Debug, Clone)]
pub struct LeadLedger {
    path: PathBuf,
}

impl LeadLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one row in a single write. The header goes in only when the file is new or
    /// empty; a trailing partial row left by an interrupted write is closed off first.
    pub async fn append(&self, lead: &Lead) -> Result<(), LedgerFileError> {
        let open_err = |source| LedgerFileError::Open {
            path: self.path.display().to_string(),
            source,
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.map_err(open_err)?;
        }
        let existing_len = match fs::metadata(&self.path).await {
            Ok(meta) => meta.len(),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => 0,
            Err(err) => return Err(open_err(err)),
        };
        let torn_tail = existing_len > 0 && !ends_with_newline(&self.path).await.map_err(open_err)?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(existing_len == 0)
            .from_writer(Vec::new());
        writer.serialize(LeadRow::from_lead(lead))?;
        let mut bytes = writer.into_inner().map_err(|err| LedgerFileError::Write(err.into_error()))?;
        if torn_tail {
            warn!(path = %self.path.display(), "ledger ended mid-row, closing it off");
            bytes.insert(0, b'\n');
        }

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(open_err)?;
        file.write_all(&bytes).await?;
        file.flush().await?;
        Ok(())
    }

    /// All well-formed rows. Rows that do not decode (short, torn, garbled) are skipped
    /// with a warning; only an unreadable file is an error.
    pub async fn read_rows(&self) -> anyhow::Result<Vec<LeadRow>> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err).with_context(|| format!("reading {}", self.path.display())),
        };
        let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(bytes.as_slice());
        let mut rows = Vec::new();
        for (index, row) in reader.deserialize::<LeadRow>().enumerate() {
            match row {
                Ok(row) => rows.push(row),
                Err(err) => warn!(
                    path = %self.path.display(),
                    record = index + 1,
                    error = %err,
                    "skipping malformed ledger row"
                ),
            }
        }
        Ok(rows)
    }

    /// Row and with-email counts, used to rebuild dashboard counters at startup.
    pub async fn scan(&self) -> LedgerStats {
        match self.read_rows().await {
            Ok(rows) => {
                let stats = LedgerStats {
                    rows: rows.len() as u64,
                    with_email: rows.iter().filter(|r| r.email.contains('@')).count() as u64,
                };
                info!(rows = stats.rows, with_email = stats.with_email, "scanned lead ledger");
                stats
            }
            Err(err) => {
                let err = format!("{err:#}");
                warn!(error = %err, "could not scan lead ledger");
                LedgerStats::default()
            }
        }
    }
}

async fn ends_with_newline(path: &Path) -> std::io::Result<bool> {
    let mut file = fs::File::open(path).await?;
    file.seek(SeekFrom::End(-1)).await?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last).await?;
    Ok(last[0] == b'\n')
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDisposition {
    Retryable,
    NonRetryable,
}

pub fn classify_status(status: StatusCode) -> RetryDisposition {
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        RetryDisposition::Retryable
    } else {
        RetryDisposition::NonRetryable
    }
}

pub fn classify_reqwest_error(err: &reqwest::Error) -> RetryDisposition {
    if err.is_timeout() || err.is_connect() || err.is_request() {
        RetryDisposition::Retryable
    } else {
        RetryDisposition::NonRetryable
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    pub max_retries: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl BackoffPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn delay_for_attempt(&self, attempt_index: usize) -> Duration {
        let factor = 1u32.checked_shl(attempt_index as u32).unwrap_or(u32::MAX);
        let delay = self.base_delay.saturating_mul(factor);
        delay.min(self.max_delay)
    }
}

#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub timeout: Duration,
    pub user_agent: Option<String>,
    pub accept_invalid_certs: bool,
    pub backoff: BackoffPolicy,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            user_agent: None,
            accept_invalid_certs: false,
            backoff: BackoffPolicy::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetchedResponse {
    pub status: StatusCode,
    pub final_url: String,
    pub body: Vec<u8>,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("http status {status} for {url}")]
    HttpStatus { status: u16, url: String },
}

/// Thin reqwest wrapper with a fixed timeout and capped exponential retries.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    backoff: BackoffPolicy,
}

impl HttpFetcher {
    pub fn new(config: HttpClientConfig) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder()
            .gzip(true)
            .brotli(true)
            .timeout(config.timeout)
            .danger_accept_invalid_certs(config.accept_invalid_certs);

        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }

        let client = builder.build().context("building reqwest client")?;
        Ok(Self {
            client,
            backoff: config.backoff,
        })
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    pub async fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<FetchedResponse, FetchError> {
        self.fetch(url, query, None).await
    }

    /// Like [`HttpFetcher::get`] but stops reading the body after `max_bytes`.
    pub async fn get_capped(&self, url: &str, max_bytes: usize) -> Result<FetchedResponse, FetchError> {
        self.fetch(url, &[], Some(max_bytes)).await
    }

    async fn fetch(
        &self,
        url: &str,
        query: &[(&str, &str)],
        max_bytes: Option<usize>,
    ) -> Result<FetchedResponse, FetchError> {
        let mut attempt = 0;
        loop {
            let can_retry = attempt < self.backoff.max_retries;
            match self.client.get(url).query(query).send().await {
                Ok(resp) => {
                    let status = resp.status();
                    let final_url = resp.url().to_string();

                    if status.is_success() {
                        let body = read_body(resp, max_bytes).await?;
                        return Ok(FetchedResponse {
                            status,
                            final_url,
                            body,
                        });
                    }

                    if classify_status(status) == RetryDisposition::NonRetryable || !can_retry {
                        return Err(FetchError::HttpStatus {
                            status: status.as_u16(),
                            url: final_url,
                        });
                    }
                }
                Err(err) => {
                    if classify_reqwest_error(&err) == RetryDisposition::NonRetryable || !can_retry {
                        return Err(FetchError::Request(err));
                    }
                }
            }
            tokio::time::sleep(self.backoff.delay_for_attempt(attempt)).await;
            attempt += 1;
        }
    }
}

async fn read_body(mut resp: reqwest::Response, max_bytes: Option<usize>) -> Result<Vec<u8>, reqwest::Error> {
    let mut body = Vec::new();
    while let Some(chunk) = resp.chunk().await? {
        body.extend_from_slice(&chunk);
        if let Some(limit) = max_bytes {
            if body.len() >= limit {
                body.truncate(limit);
                break;
            }
        }
    }
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use leadgen_core::{ContactInfo, PlaceDetails};
    use tempfile::tempdir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fitzone(email: Option<&str>) -> Lead {
        Lead::from_details(
            &PlaceDetails {
                name: "FitZone".into(),
                address: Some("1 MG Road, Pune".into()),
                phone: Some("123".into()),
                website: Some("http://fitzone.example".into()),
                rating: Some(4.5),
                review_count: Some(10),
            },
            "Gym",
            ContactInfo {
                email: email.map(ToString::to_string),
                handle: None,
            },
            Utc.with_ymd_and_hms(2026, 2, 24, 12, 0, 0).single().unwrap(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn missing_units_load_as_defaults() {
        let dir = tempdir().expect("tempdir");
        let store = StateStore::new(dir.path());
        assert_eq!(store.load_progress().await, 0);
        assert!(store.load_visited().await.is_empty());
        assert_eq!(store.load_cache().await, CacheRecord::default());
    }

    #[tokio::test]
    async fn corrupt_units_load_as_defaults() {
        let dir = tempdir().expect("tempdir");
        std::fs::write(dir.path().join(PROGRESS_FILE), b"{not json").unwrap();
        std::fs::write(dir.path().join(VISITED_FILE), b"42").unwrap();
        std::fs::write(dir.path().join(CACHE_FILE), b"").unwrap();
        let store = StateStore::new(dir.path());
        assert_eq!(store.load_progress().await, 0);
        assert!(store.load_visited().await.is_empty());
        assert!(store.load_cache().await.names.is_empty());
    }

    #[tokio::test]
    async fn units_round_trip_and_overwrite() {
        let dir = tempdir().expect("tempdir");
        let store = StateStore::new(dir.path());
        store.save_progress(7).await.unwrap();
        store.save_progress(8).await.unwrap();
        assert_eq!(store.load_progress().await, 8);

        let visited = ["P1", "P2"].iter().map(|s| s.to_string()).collect::<HashSet<_>>();
        store.save_visited(&visited).await.unwrap();
        assert_eq!(store.load_visited().await, visited);

        let names = vec!["fitzone".to_string()];
        store.save_cache(&names, 3, 1).await.unwrap();
        let cache = store.load_cache().await;
        assert_eq!(cache.names, names);
        assert_eq!((cache.total, cache.with_email), (3, 1));
        assert!(cache.last_sync.is_some());

        let leftovers = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn ledger_writes_header_once_and_placeholders() {
        let dir = tempdir().expect("tempdir");
        let ledger = LeadLedger::new(dir.path().join("leads.csv"));
        ledger.append(&fitzone(None)).await.unwrap();
        ledger.append(&fitzone(Some("hi@fitzone.in"))).await.unwrap();

        let text = std::fs::read_to_string(ledger.path()).unwrap();
        let lines = text.lines().collect::<Vec<_>>();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], LEDGER_COLUMNS.join(","));
        assert_eq!(
            lines[1],
            "FitZone,-,123,http://fitzone.example,-,\"1 MG Road, Pune\",4.5,10,Gym,TRUE"
        );
        assert_eq!(ledger.scan().await, LedgerStats { rows: 2, with_email: 1 });
    }

    #[tokio::test]
    async fn torn_row_does_not_hide_intact_rows() {
        let dir = tempdir().expect("tempdir");
        let ledger = LeadLedger::new(dir.path().join("leads.csv"));
        ledger.append(&fitzone(None)).await.unwrap();
        ledger.append(&fitzone(Some("hi@fitzone.in"))).await.unwrap();

        // interrupted write: half a row, no line terminator
        let mut file = std::fs::OpenOptions::new().append(true).open(ledger.path()).unwrap();
        std::io::Write::write_all(&mut file, b"Zen Spa,a@b.in,-").unwrap();
        drop(file);

        ledger.append(&fitzone(Some("owner@fitzone.in"))).await.unwrap();

        let text = std::fs::read_to_string(ledger.path()).unwrap();
        assert!(text.contains("Zen Spa,a@b.in,-\nFitZone,owner@fitzone.in,"));
        let rows = ledger.read_rows().await.unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2].email, "owner@fitzone.in");
        assert_eq!(ledger.scan().await, LedgerStats { rows: 3, with_email: 2 });
    }

    #[tokio::test]
    async fn empty_ledger_file_gets_a_header() {
        let dir = tempdir().expect("tempdir");
        let ledger = LeadLedger::new(dir.path().join("leads.csv"));
        std::fs::write(ledger.path(), b"").unwrap();
        ledger.append(&fitzone(None)).await.unwrap();

        let text = std::fs::read_to_string(ledger.path()).unwrap();
        assert!(text.starts_with("Business Name,Email,"));
        assert_eq!(ledger.scan().await.rows, 1);
    }

    #[tokio::test]
    async fn ledger_at_directory_path_fails_to_append() {
        let dir = tempdir().expect("tempdir");
        let ledger = LeadLedger::new(dir.path().join("leads.csv"));
        std::fs::create_dir(ledger.path()).unwrap();
        assert!(ledger.append(&fitzone(None)).await.is_err());
        assert!(ledger.read_rows().await.is_err());
        assert_eq!(ledger.scan().await, LedgerStats::default());
    }

    #[test]
    fn whole_ratings_are_written_without_fraction() {
        assert_eq!(format_rating(4.0), "4");
        assert_eq!(format_rating(0.0), "0");
        assert_eq!(format_rating(3.7), "3.7");
    }

    #[tokio::test]
    async fn missing_ledger_scans_as_empty() {
        let dir = tempdir().expect("tempdir");
        let ledger = LeadLedger::new(dir.path().join("nope.csv"));
        assert_eq!(ledger.scan().await, LedgerStats::default());
    }

    #[test]
    fn backoff_logic_is_exponential_and_capped() {
        let policy = BackoffPolicy {
            max_retries: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(350),
        };

        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(350));
        assert_eq!(policy.delay_for_attempt(5), Duration::from_millis(350));
    }

    #[tokio::test]
    async fn fetcher_retries_server_errors_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(HttpClientConfig {
            backoff: BackoffPolicy {
                max_retries: 2,
                base_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(1),
            },
            ..Default::default()
        })
        .unwrap();
        let resp = fetcher.get(&format!("{}/flaky", server.uri()), &[]).await.unwrap();
        assert_eq!(resp.body, b"ok");
    }

    #[tokio::test]
    async fn fetcher_does_not_retry_client_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(HttpClientConfig::default()).unwrap();
        let err = fetcher.get(&format!("{}/missing", server.uri()), &[]).await.unwrap_err();
        assert!(matches!(err, FetchError::HttpStatus { status: 404, .. }));
    }

    #[tokio::test]
    async fn capped_fetch_truncates_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/big"))
            .respond_with(ResponseTemplate::new(200).set_body_string("x".repeat(10_000)))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(HttpClientConfig::default()).unwrap();
        let resp = fetcher.get_capped(&format!("{}/big", server.uri()), 1_000).await.unwrap();
        assert_eq!(resp.body.len(), 1_000);
    }
}
