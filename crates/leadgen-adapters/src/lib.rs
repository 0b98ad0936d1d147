//! External capability contracts (places lookup, remote ledger, website enrichment)
//! and their HTTP-backed implementations.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use leadgen_core::{Candidate, ContactInfo, Lead, PlaceDetails};
use leadgen_storage::{BackoffPolicy, FetchError, HttpClientConfig, HttpFetcher, LeadRow};
use regex::Regex;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub const CRATE_NAME: &str = "leadgen-adapters";

pub const DEFAULT_PLACES_BASE_URL: &str = "https://maps.googleapis.com/maps/api/place";
pub const DEFAULT_SHEETS_BASE_URL: &str = "https://sheets.googleapis.com/v4";
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
pub const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

const DETAIL_FIELDS: &str = "name,formatted_address,formatted_phone_number,website,rating,user_ratings_total";

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("decoding {context}: {source}")]
    Decode {
        context: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("api status {status}: {message}")]
    Api { status: String, message: String },
    #[error("auth: {0}")]
    Auth(String),
    #[error("{0}")]
    Message(String),
}

/// Places search + detail lookup.
#[async_trait]
pub trait PlacesApi: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<Candidate>, AdapterError>;

    /// `Ok(None)` when the place has no usable detail record.
    async fn details(&self, place_id: &str) -> Result<Option<PlaceDetails>, AdapterError>;
}

/// Best-effort website scrape. Never fails; absence is a normal outcome.
#[async_trait]
pub trait ContactExtractor: Send + Sync {
    async fn extract_contact(&self, url: &str) -> ContactInfo;
}

/// A row already present in the remote ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRecord {
    pub business_name: String,
    pub email: Option<String>,
}

impl LedgerRecord {
    pub fn has_email(&self) -> bool {
        self.email.as_deref().is_some_and(|e| e.contains('@'))
    }
}

/// Remote source of truth for captured businesses.
#[async_trait]
pub trait RemoteLedger: Send + Sync {
    fn is_enabled(&self) -> bool;

    async fn list_all_records(&self) -> Result<Vec<LedgerRecord>, AdapterError>;

    async fn append_records(&self, leads: &[Lead]) -> Result<(), AdapterError>;

    async fn append_record(&self, lead: &Lead) -> Result<(), AdapterError> {
        self.append_records(std::slice::from_ref(lead)).await
    }
}

/// Stand-in used when no remote ledger is configured: reads are empty, writes are dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledLedger;

#[async_trait]
impl RemoteLedger for DisabledLedger {
    fn is_enabled(&self) -> bool {
        false
    }

    async fn list_all_records(&self) -> Result<Vec<LedgerRecord>, AdapterError> {
        Ok(Vec::new())
    }

    async fn append_records(&self, _leads: &[Lead]) -> Result<(), AdapterError> {
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct TextSearchResponse {
    #[serde(default)]
    results: Vec<TextSearchResult>,
    status: String,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TextSearchResult {
    place_id: Option<String>,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DetailsResponse {
    result: Option<DetailsResult>,
    status: String,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DetailsResult {
    name: Option<String>,
    formatted_address: Option<String>,
    formatted_phone_number: Option<String>,
    website: Option<String>,
    rating: Option<f64>,
    user_ratings_total: Option<u32>,
}

fn check_places_status(status: &str, error_message: Option<String>) -> Result<(), AdapterError> {
    match status {
        "OK" | "ZERO_RESULTS" | "NOT_FOUND" => Ok(()),
        other => Err(AdapterError::Api {
            status: other.to_string(),
            message: error_message.unwrap_or_default(),
        }),
    }
}

fn decode<T: serde::de::DeserializeOwned>(context: &str, body: &[u8]) -> Result<T, AdapterError> {
    serde_json::from_slice(body).map_err(|source| AdapterError::Decode {
        context: context.to_string(),
        source,
    })
}

/// Google Places web service client (Text Search + Place Details).
#[derive(Debug, Clone)]
pub struct GooglePlacesClient {
    http: HttpFetcher,
    api_key: String,
    base_url: String,
}

impl GooglePlacesClient {
    pub fn new(api_key: impl Into<String>, http_config: HttpClientConfig) -> anyhow::Result<Self> {
        Ok(Self {
            http: HttpFetcher::new(http_config)?,
            api_key: api_key.into(),
            base_url: DEFAULT_PLACES_BASE_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl PlacesApi for GooglePlacesClient {
    async fn search(&self, query: &str) -> Result<Vec<Candidate>, AdapterError> {
        let url = format!("{}/textsearch/json", self.base_url);
        let resp = self
            .http
            .get(&url, &[("query", query), ("key", self.api_key.as_str())])
            .await?;
        let parsed: TextSearchResponse = decode("text search response", &resp.body)?;
        check_places_status(&parsed.status, parsed.error_message)?;
        Ok(parsed
            .results
            .into_iter()
            .filter_map(|r| {
                r.place_id
                    .filter(|id| !id.is_empty())
                    .map(|id| Candidate { id, name: r.name })
            })
            .collect())
    }

    async fn details(&self, place_id: &str) -> Result<Option<PlaceDetails>, AdapterError> {
        let url = format!("{}/details/json", self.base_url);
        let resp = self
            .http
            .get(
                &url,
                &[
                    ("place_id", place_id),
                    ("key", self.api_key.as_str()),
                    ("fields", DETAIL_FIELDS),
                ],
            )
            .await?;
        let parsed: DetailsResponse = decode("place details response", &resp.body)?;
        check_places_status(&parsed.status, parsed.error_message)?;
        let Some(result) = parsed.result else {
            return Ok(None);
        };
        let Some(name) = result.name.filter(|n| !n.trim().is_empty()) else {
            return Ok(None);
        };
        Ok(Some(PlaceDetails {
            name,
            address: result.formatted_address,
            phone: result.formatted_phone_number,
            website: result.website,
            rating: result.rating,
            review_count: result.user_ratings_total,
        }))
    }
}

#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    pub timeout: Duration,
    pub user_agent: String,
    pub max_body_bytes: usize,
    pub email_blocklist: Vec<String>,
    pub max_email_candidates: usize,
    pub reserved_handles: Vec<String>,
    pub max_handle_candidates: usize,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(3),
            user_agent: BROWSER_USER_AGENT.to_string(),
            max_body_bytes: 50_000,
            email_blocklist: ["example", "test", "noreply", "support@google", "support@facebook", "wix.com", "godaddy"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            max_email_candidates: 5,
            reserved_handles: ["instagram", "facebook", "twitter", "p", "reel"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            max_handle_candidates: 3,
        }
    }
}

/// Single-fetch scraper for a contact email and an Instagram handle.
///
/// Certificate verification is off: target sites are arbitrary third parties and a
/// bad certificate must not cost us the lead.
#[derive(Debug, Clone)]
pub struct WebsiteContactExtractor {
    http: HttpFetcher,
    config: ExtractorConfig,
    email_re: Regex,
    handle_re: Regex,
}

impl WebsiteContactExtractor {
    pub fn new(config: ExtractorConfig) -> anyhow::Result<Self> {
        let http = HttpFetcher::new(HttpClientConfig {
            timeout: config.timeout,
            user_agent: Some(config.user_agent.clone()),
            accept_invalid_certs: true,
            backoff: BackoffPolicy::none(),
        })?;
        Ok(Self {
            http,
            email_re: Regex::new(r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}")
                .context("compiling email pattern")?,
            handle_re: Regex::new(r"instagram\.com/([a-zA-Z0-9_.]+)").context("compiling handle pattern")?,
            config,
        })
    }

    /// First of the leading email matches whose lowercase form avoids the blocklist.
    pub fn extract_email(&self, text: &str) -> Option<String> {
        self.email_re
            .find_iter(text)
            .take(self.config.max_email_candidates)
            .map(|m| m.as_str())
            .find(|email| {
                let lower = email.to_lowercase();
                !self.config.email_blocklist.iter().any(|bad| lower.contains(bad.as_str()))
            })
            .map(ToString::to_string)
    }

    /// First profile path segment that is not a reserved route, as `@handle`.
    pub fn extract_handle(&self, text: &str) -> Option<String> {
        self.handle_re
            .captures_iter(text)
            .filter_map(|c| c.get(1))
            .take(self.config.max_handle_candidates)
            .map(|m| m.as_str())
            .find(|segment| {
                segment.chars().count() > 2 && !self.config.reserved_handles.iter().any(|r| r.as_str() == *segment)
            })
            .map(|segment| format!("@{segment}"))
    }
}

#[async_trait]
impl ContactExtractor for WebsiteContactExtractor {
    async fn extract_contact(&self, url: &str) -> ContactInfo {
        let resp = match self.http.get_capped(url, self.config.max_body_bytes).await {
            Ok(resp) => resp,
            Err(err) => {
                debug!(url, error = %err, "website fetch failed, no contact extracted");
                return ContactInfo::default();
            }
        };
        let text = String::from_utf8_lossy(&resp.body);
        ContactInfo {
            email: self.extract_email(&text),
            handle: self.extract_handle(&text),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl ServiceAccountKey {
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
    }
}

pub enum SheetsAuth {
    ServiceAccount {
        key: ServiceAccountKey,
        encoding_key: EncodingKey,
    },
    Bearer(String),
}

impl SheetsAuth {
    pub fn service_account(key: ServiceAccountKey) -> anyhow::Result<Self> {
        let encoding_key =
            EncodingKey::from_rsa_pem(key.private_key.as_bytes()).context("parsing service account private key")?;
        Ok(Self::ServiceAccount { key, encoding_key })
    }
}

#[derive(Debug, Serialize)]
struct JwtClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    3600
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    refresh_at: i64,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<JsonValue>>,
}

fn cell_text(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        JsonValue::Null => String::new(),
        other => other.to_string(),
    }
}

/// Map raw sheet rows (header first) to ledger records by column name.
pub fn records_from_rows(rows: &[Vec<JsonValue>]) -> Vec<LedgerRecord> {
    let Some((header, body)) = rows.split_first() else {
        return Vec::new();
    };
    let header = header.iter().map(cell_text).collect::<Vec<_>>();
    let position = |name: &str| header.iter().position(|h| h.trim() == name);
    let name_col = position("Business Name").or_else(|| position("name"));
    let email_col = position("Email");

    body.iter()
        .map(|row| {
            let cell = |col: Option<usize>| col.and_then(|c| row.get(c)).map(cell_text).unwrap_or_default();
            let email = cell(email_col);
            LedgerRecord {
                business_name: cell(name_col),
                email: (!email.trim().is_empty()).then_some(email),
            }
        })
        .collect()
}

/// Google Sheets values API ledger.
pub struct SheetsLedger {
    http: reqwest::Client,
    auth: SheetsAuth,
    spreadsheet_id: String,
    range: String,
    base_url: String,
    token: Mutex<Option<CachedToken>>,
}

impl SheetsLedger {
    pub fn new(
        auth: SheetsAuth,
        spreadsheet_id: impl Into<String>,
        range: impl Into<String>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("building sheets client")?;
        Ok(Self {
            http,
            auth,
            spreadsheet_id: spreadsheet_id.into(),
            range: range.into(),
            base_url: DEFAULT_SHEETS_BASE_URL.to_string(),
            token: Mutex::new(None),
        })
    }

    pub fn from_service_account_file(
        path: impl AsRef<Path>,
        spreadsheet_id: impl Into<String>,
        range: impl Into<String>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let key = ServiceAccountKey::from_file(path)?;
        Self::new(SheetsAuth::service_account(key)?, spreadsheet_id, range, timeout)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn values_url(&self, suffix: &str) -> Result<Url, AdapterError> {
        let mut url = Url::parse(&self.base_url).map_err(|e| AdapterError::Message(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| AdapterError::Message(format!("base url {} cannot hold a path", self.base_url)))?
            .pop_if_empty()
            .extend(["spreadsheets", self.spreadsheet_id.as_str(), "values"])
            .push(&format!("{}{}", self.range, suffix));
        Ok(url)
    }

    async fn access_token(&self) -> Result<String, AdapterError> {
        let (key, encoding_key) = match &self.auth {
            SheetsAuth::Bearer(token) => return Ok(token.clone()),
            SheetsAuth::ServiceAccount { key, encoding_key } => (key, encoding_key),
        };

        let now = Utc::now().timestamp();
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| t.refresh_at > now) {
            return Ok(token.access_token.clone());
        }

        let claims = JwtClaims {
            iss: &key.client_email,
            scope: SHEETS_SCOPE,
            aud: &key.token_uri,
            iat: now,
            exp: now + 3600,
        };
        let assertion = encode(&Header::new(Algorithm::RS256), &claims, encoding_key)
            .map_err(|e| AdapterError::Auth(format!("signing assertion: {e}")))?;
        let resp = self
            .http
            .post(&key.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await?;
        let status = resp.status();
        let body = resp.bytes().await?;
        if !status.is_success() {
            return Err(AdapterError::Auth(format!(
                "token endpoint returned {status}: {}",
                String::from_utf8_lossy(&body)
            )));
        }
        let token: TokenResponse = decode("token response", &body)?;
        *cached = Some(CachedToken {
            access_token: token.access_token.clone(),
            refresh_at: now + token.expires_in - 60,
        });
        Ok(token.access_token)
    }
}

#[async_trait]
impl RemoteLedger for SheetsLedger {
    fn is_enabled(&self) -> bool {
        true
    }

    async fn list_all_records(&self) -> Result<Vec<LedgerRecord>, AdapterError> {
        let token = self.access_token().await?;
        let url = self.values_url("")?;
        let resp = self.http.get(url).bearer_auth(token).send().await?;
        let status = resp.status();
        let body = resp.bytes().await?;
        if !status.is_success() {
            return Err(AdapterError::Api {
                status: status.as_u16().to_string(),
                message: String::from_utf8_lossy(&body).into_owned(),
            });
        }
        let range: ValueRange = decode("sheet values", &body)?;
        let records = records_from_rows(&range.values);
        info!(rows = records.len(), "read remote ledger");
        Ok(records)
    }

    async fn append_records(&self, leads: &[Lead]) -> Result<(), AdapterError> {
        if leads.is_empty() {
            return Ok(());
        }
        let token = self.access_token().await?;
        let mut url = self.values_url(":append")?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", "USER_ENTERED")
            .append_pair("insertDataOption", "INSERT_ROWS");
        let values = leads
            .iter()
            .map(|lead| LeadRow::from_lead(lead).values())
            .collect::<Vec<_>>();
        let resp = self
            .http
            .post(url)
            .bearer_auth(token)
            .json(&serde_json::json!({ "values": values }))
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!(%status, "remote ledger append rejected");
            return Err(AdapterError::Api {
                status: status.as_u16().to_string(),
                message: body,
            });
        }
        debug!(rows = leads.len(), "appended rows to remote ledger");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use leadgen_core::PlaceDetails;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn extractor() -> WebsiteContactExtractor {
        WebsiteContactExtractor::new(ExtractorConfig::default()).unwrap()
    }

    fn places(server: &MockServer) -> GooglePlacesClient {
        GooglePlacesClient::new(
            "test-key",
            HttpClientConfig {
                backoff: BackoffPolicy::none(),
                ..Default::default()
            },
        )
        .unwrap()
        .with_base_url(server.uri())
    }

    fn lead(name: &str) -> Lead {
        Lead::from_details(
            &PlaceDetails {
                name: name.to_string(),
                address: Some("Pune".into()),
                ..Default::default()
            },
            "Gym",
            ContactInfo::default(),
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn email_skips_blocklisted_addresses() {
        let html = r#"<a href="mailto:you@example.com">x</a> noreply@fitzone.in hello@fitzone.in"#;
        assert_eq!(extractor().extract_email(html).as_deref(), Some("hello@fitzone.in"));
    }

    #[test]
    fn email_only_considers_leading_matches() {
        let html = "a@wix.com b@wix.com c@wix.com d@wix.com e@wix.com real@gym.in";
        assert_eq!(extractor().extract_email(html), None);
    }

    #[test]
    fn handle_skips_reserved_segments() {
        let html = r#"instagram.com/p/abc instagram.com/reel/x instagram.com/fitzone.pune"#;
        assert_eq!(extractor().extract_handle(html).as_deref(), Some("@fitzone.pune"));
        assert_eq!(extractor().extract_handle("instagram.com/ab"), None);
        assert_eq!(extractor().extract_handle("no social links here"), None);
    }

    #[tokio::test]
    async fn extract_contact_reads_one_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<footer>Mail owner@fitzone.in · <a href="https://instagram.com/fitzone_pune">IG</a></footer>"#,
            ))
            .expect(1)
            .mount(&server)
            .await;

        let info = extractor().extract_contact(&server.uri()).await;
        assert_eq!(info.email.as_deref(), Some("owner@fitzone.in"));
        assert_eq!(info.handle.as_deref(), Some("@fitzone_pune"));
    }

    #[tokio::test]
    async fn extract_contact_timeout_yields_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("late@fitzone.in")
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let slow = WebsiteContactExtractor::new(ExtractorConfig {
            timeout: Duration::from_millis(200),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(slow.extract_contact(&server.uri()).await, ContactInfo::default());
    }

    #[tokio::test]
    async fn extract_contact_unreachable_yields_nothing() {
        let info = extractor().extract_contact("http://127.0.0.1:9/").await;
        assert_eq!(info, ContactInfo::default());
    }

    #[tokio::test]
    async fn places_search_maps_candidates() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/textsearch/json"))
            .and(query_param("query", "gym in Pune, India"))
            .and(query_param("key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "OK",
                "results": [
                    {"place_id": "P1", "name": "FitZone"},
                    {"name": "No Id"},
                    {"place_id": "P2"}
                ]
            })))
            .mount(&server)
            .await;

        let found = places(&server).search("gym in Pune, India").await.unwrap();
        assert_eq!(
            found,
            vec![
                Candidate { id: "P1".into(), name: Some("FitZone".into()) },
                Candidate { id: "P2".into(), name: None },
            ]
        );
    }

    #[tokio::test]
    async fn places_zero_results_is_empty_and_denied_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("query", "nothing"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ZERO_RESULTS", "results": []})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(query_param("query", "denied"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "REQUEST_DENIED",
                "error_message": "The provided API key is invalid."
            })))
            .mount(&server)
            .await;

        let client = places(&server);
        assert!(client.search("nothing").await.unwrap().is_empty());
        let err = client.search("denied").await.unwrap_err();
        assert!(matches!(err, AdapterError::Api { ref status, .. } if status == "REQUEST_DENIED"));
    }

    #[tokio::test]
    async fn places_details_maps_fields() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/details/json"))
            .and(query_param("place_id", "P1"))
            .and(query_param("fields", DETAIL_FIELDS))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "OK",
                "result": {
                    "name": "FitZone",
                    "formatted_address": "1 MG Road, Pune",
                    "formatted_phone_number": "123",
                    "website": "http://fitzone.example",
                    "rating": 4.5,
                    "user_ratings_total": 10
                }
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/details/json"))
            .and(query_param("place_id", "GONE"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "NOT_FOUND"})))
            .mount(&server)
            .await;

        let client = places(&server);
        let details = client.details("P1").await.unwrap().unwrap();
        assert_eq!(details.name, "FitZone");
        assert_eq!(details.website.as_deref(), Some("http://fitzone.example"));
        assert_eq!(details.review_count, Some(10));
        assert_eq!(client.details("GONE").await.unwrap(), None);
    }

    #[test]
    fn sheet_rows_map_by_header_name() {
        let rows = vec![
            vec![json!("Business Name"), json!("Email"), json!("Phone")],
            vec![json!("FitZone"), json!("a@fitzone.in"), json!(123)],
            vec![json!("Zen Spa"), json!("-")],
            vec![json!("Solo")],
        ];
        let records = records_from_rows(&rows);
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].business_name, "FitZone");
        assert!(records[0].has_email());
        assert_eq!(records[1].email.as_deref(), Some("-"));
        assert!(!records[1].has_email());
        assert_eq!(records[2].email, None);

        let legacy = records_from_rows(&[vec![json!("name")], vec![json!("Old Gym")]]);
        assert_eq!(legacy[0].business_name, "Old Gym");
        assert!(records_from_rows(&[]).is_empty());
    }

    #[tokio::test]
    async fn sheets_ledger_lists_and_appends_with_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/spreadsheets/SHEET/values/Sheet1"))
            .and(header("authorization", "Bearer tok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "values": [["Business Name", "Email"], ["FitZone", "a@fitzone.in"]]
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/spreadsheets/SHEET/values/Sheet1:append"))
            .and(query_param("valueInputOption", "USER_ENTERED"))
            .and(body_partial_json(json!({"values": [["Zen Spa", "-", "-", "-", "-", "Pune", "0", "0", "Gym", "FALSE"]]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let ledger = SheetsLedger::new(SheetsAuth::Bearer("tok".into()), "SHEET", "Sheet1", Duration::from_secs(5))
            .unwrap()
            .with_base_url(server.uri());
        let records = ledger.list_all_records().await.unwrap();
        assert_eq!(records, vec![LedgerRecord { business_name: "FitZone".into(), email: Some("a@fitzone.in".into()) }]);
        ledger.append_record(&lead("Zen Spa")).await.unwrap();
    }

    #[tokio::test]
    async fn disabled_ledger_is_inert() {
        let ledger = DisabledLedger;
        assert!(!ledger.is_enabled());
        assert!(ledger.list_all_records().await.unwrap().is_empty());
        ledger.append_record(&lead("Zen Spa")).await.unwrap();
    }
}
