//! Run orchestration: duplicate suppression, ledger fan-out, the resumable query loop
//! and the controller that owns it.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use leadgen_adapters::{
    ContactExtractor, DisabledLedger, ExtractorConfig, GooglePlacesClient, PlacesApi, RemoteLedger, SheetsLedger,
    WebsiteContactExtractor, BROWSER_USER_AGENT,
};
use leadgen_core::{normalize_name, Candidate, ContactInfo, Lead, Query, QueryCatalog, RunPhase, StatusSnapshot};
use leadgen_storage::{HttpClientConfig, LeadLedger, StateStore};
use serde::Serialize;
use tokio::fs;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

pub const CRATE_NAME: &str = "leadgen-sync";

#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub places_api_key: Option<String>,
    pub state_dir: PathBuf,
    pub leads_csv: PathBuf,
    pub queries_file: PathBuf,
    pub service_account_file: PathBuf,
    pub sheet_id: Option<String>,
    pub sheet_range: String,
    pub batch_size: usize,
    pub candidate_delay_ms: u64,
    pub query_delay_ms: u64,
    pub pause_poll_ms: u64,
    pub fetch_timeout_secs: u64,
    pub http_timeout_secs: u64,
    pub user_agent: String,
    pub web_host: String,
    pub web_port: u16,
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl AgentConfig {
    pub fn from_env() -> Self {
        let state_dir = std::env::var("LEADGEN_STATE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("."));
        Self {
            places_api_key: env_non_empty("GOOGLE_PLACES_API_KEY"),
            leads_csv: std::env::var("LEADGEN_LEADS_CSV")
                .map(PathBuf::from)
                .unwrap_or_else(|_| state_dir.join("leads.csv")),
            queries_file: std::env::var("LEADGEN_QUERIES_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("queries.yaml")),
            service_account_file: std::env::var("SERVICE_ACCOUNT_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("service-account.json")),
            sheet_id: env_non_empty("LEADGEN_SHEET_ID"),
            sheet_range: std::env::var("LEADGEN_SHEET_RANGE").unwrap_or_else(|_| "Sheet1".to_string()),
            batch_size: env_parse("LEADGEN_BATCH_SIZE", 10),
            candidate_delay_ms: env_parse("LEADGEN_CANDIDATE_DELAY_MS", 500),
            query_delay_ms: env_parse("LEADGEN_QUERY_DELAY_MS", 2_000),
            pause_poll_ms: env_parse("LEADGEN_PAUSE_POLL_MS", 1_000),
            fetch_timeout_secs: env_parse("LEADGEN_FETCH_TIMEOUT_SECS", 3),
            http_timeout_secs: env_parse("LEADGEN_HTTP_TIMEOUT_SECS", 10),
            user_agent: std::env::var("LEADGEN_USER_AGENT").unwrap_or_else(|_| BROWSER_USER_AGENT.to_string()),
            web_host: std::env::var("LEADGEN_WEB_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            web_port: env_parse("LEADGEN_WEB_PORT", 5_000),
            state_dir,
        }
    }

    pub fn run_settings(&self) -> RunSettings {
        RunSettings {
            batch_size: self.batch_size,
            candidate_delay: Duration::from_millis(self.candidate_delay_ms),
            query_delay: Duration::from_millis(self.query_delay_ms),
            pause_poll_interval: Duration::from_millis(self.pause_poll_ms),
        }
    }
}

/// Pacing and batching knobs for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSettings {
    pub batch_size: usize,
    pub candidate_delay: Duration,
    pub query_delay: Duration,
    pub pause_poll_interval: Duration,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            batch_size: 10,
            candidate_delay: Duration::from_millis(500),
            query_delay: Duration::from_secs(2),
            pause_poll_interval: Duration::from_secs(1),
        }
    }
}

impl RunSettings {
    fn poll_interval(&self) -> Duration {
        self.pause_poll_interval.max(Duration::from_millis(1))
    }
}

/// Load the query catalog from YAML; a missing file yields the built-in catalog.
pub async fn load_query_catalog(path: &Path) -> anyhow::Result<QueryCatalog> {
    if !path.exists() {
        debug!(path = %path.display(), "no query file, using built-in catalog");
        return Ok(QueryCatalog::default());
    }
    let text = fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    serde_yaml::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

/// Remote ledger for the config, or [`DisabledLedger`] when it is not usable.
pub fn remote_ledger_from_config(config: &AgentConfig) -> Arc<dyn RemoteLedger> {
    let Some(sheet_id) = config.sheet_id.clone() else {
        warn!("LEADGEN_SHEET_ID not set, remote ledger disabled");
        return Arc::new(DisabledLedger);
    };
    if !config.service_account_file.exists() {
        warn!(
            path = %config.service_account_file.display(),
            "service account key not found, remote ledger disabled"
        );
        return Arc::new(DisabledLedger);
    }
    match SheetsLedger::from_service_account_file(
        &config.service_account_file,
        sheet_id,
        config.sheet_range.clone(),
        Duration::from_secs(config.http_timeout_secs),
    ) {
        Ok(ledger) => Arc::new(ledger),
        Err(err) => {
            let err = format!("{err:#}");
            warn!(error = %err, "could not set up remote ledger, disabled");
            Arc::new(DisabledLedger)
        }
    }
}

/// Normalized business names already captured somewhere.
///
/// Exact match on the normalized form only: "FitZone" and "Fit Zone Gym" are different
/// businesses as far as this set is concerned.
#[derive(Debug, Clone, Default)]
pub struct DuplicateOracle {
    names: HashSet<String>,
}

impl DuplicateOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for name in names {
            self.add(name.as_ref());
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(&normalize_name(name))
    }

    /// Returns false for blank names and names already present.
    pub fn add(&mut self, name: &str) -> bool {
        let normalized = normalize_name(name);
        if normalized.is_empty() {
            return false;
        }
        self.names.insert(normalized)
    }

    pub fn replace<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.names.clear();
        self.seed(names);
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.names.iter()
    }
}

/// State shared between the controller and the worker task.
pub struct RunContext {
    status: watch::Sender<StatusSnapshot>,
    oracle: RwLock<DuplicateOracle>,
    active: AtomicBool,
    paused: AtomicBool,
    stop_requested: AtomicBool,
}

impl RunContext {
    pub fn new(snapshot: StatusSnapshot, oracle: DuplicateOracle) -> Self {
        let (status, _) = watch::channel(snapshot);
        Self {
            status,
            oracle: RwLock::new(oracle),
            active: AtomicBool::new(false),
            paused: AtomicBool::new(false),
            stop_requested: AtomicBool::new(false),
        }
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<StatusSnapshot> {
        self.status.subscribe()
    }

    pub fn update(&self, modify: impl FnOnce(&mut StatusSnapshot)) {
        self.status.send_modify(modify);
    }

    pub fn oracle(&self) -> &RwLock<DuplicateOracle> {
        &self.oracle
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn is_stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }

    /// Write the oracle names and current counters to the local cache unit.
    pub async fn persist_cache(&self, store: &StateStore) {
        let names = self.oracle.read().await.names().cloned().collect::<Vec<_>>();
        let (total, with_email) = {
            let status = self.status.borrow();
            (status.leads_found, status.leads_with_email)
        };
        if let Err(err) = store.save_cache(&names, total, with_email).await {
            warn!(error = %err, "could not refresh local cache");
        }
    }
}

/// Fans captured leads out to the flat ledger (immediately) and the remote ledger
/// (in batches of `batch_size`).
pub struct LedgerSync {
    ledger: LeadLedger,
    remote: Arc<dyn RemoteLedger>,
    store: StateStore,
    batch_size: usize,
    pending: Vec<Lead>,
}

impl LedgerSync {
    pub fn new(ledger: LeadLedger, remote: Arc<dyn RemoteLedger>, store: StateStore, batch_size: usize) -> Self {
        Self {
            ledger,
            remote,
            store,
            batch_size: batch_size.max(1),
            pending: Vec::new(),
        }
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Returns false when the flat ledger write failed; nothing else is touched then.
    pub async fn capture(&mut self, lead: Lead, ctx: &RunContext) -> bool {
        if let Err(err) = self.ledger.append(&lead).await {
            error!(name = lead.business_name(), error = %err, "could not write lead, dropping it");
            return false;
        }
        ctx.oracle.write().await.add(lead.business_name());
        ctx.update(|s| s.record_capture(&lead));
        self.pending.push(lead);
        if self.pending.len() >= self.batch_size {
            self.push_pending(ctx).await;
        }
        true
    }

    pub async fn flush(&mut self, ctx: &RunContext) {
        self.push_pending(ctx).await;
    }

    async fn push_pending(&mut self, ctx: &RunContext) {
        let batch = std::mem::take(&mut self.pending);
        if !batch.is_empty() && self.remote.is_enabled() {
            match self.remote.append_records(&batch).await {
                Ok(()) => {
                    info!(rows = batch.len(), "pushed leads to remote ledger");
                    ctx.update(|s| s.sheet_synced = true);
                }
                Err(err) => warn!(rows = batch.len(), error = %err, "remote ledger push failed, batch dropped"),
            }
        }
        ctx.persist_cache(&self.store).await;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    Completed { leads_found: u64 },
    Stopped { at_query: usize },
}

/// One pass over the query sequence, starting at the persisted checkpoint.
pub struct QueryDriver {
    ctx: Arc<RunContext>,
    queries: Arc<Vec<Query>>,
    places: Arc<dyn PlacesApi>,
    extractor: Arc<dyn ContactExtractor>,
    store: StateStore,
    sync: LedgerSync,
    settings: RunSettings,
}

impl QueryDriver {
    pub fn new(
        ctx: Arc<RunContext>,
        queries: Arc<Vec<Query>>,
        places: Arc<dyn PlacesApi>,
        extractor: Arc<dyn ContactExtractor>,
        store: StateStore,
        sync: LedgerSync,
        settings: RunSettings,
    ) -> Self {
        Self {
            ctx,
            queries,
            places,
            extractor,
            store,
            sync,
            settings,
        }
    }

    pub async fn run(mut self) -> RunOutcome {
        let queries = Arc::clone(&self.queries);
        let total = queries.len();
        let start = self.store.load_progress().await.min(total);
        let mut visited = self.store.load_visited().await;
        info!(start, total, visited = visited.len(), "run starting");
        self.ctx.update(|s| {
            s.progress = start;
            s.current_action = "Starting lead collection...".to_string();
        });

        let mut stopped_at = None;
        for (index, query) in queries.iter().enumerate().skip(start) {
            if !self.wait_until_runnable().await {
                stopped_at = Some(index);
                break;
            }

            let text = query.text();
            self.ctx.update(|s| {
                s.current_query = text.clone();
                s.progress = index;
                s.current_action = format!("Searching: {text}");
            });
            let candidates = match self.places.search(&text).await {
                Ok(candidates) => candidates,
                Err(err) => {
                    warn!(query = %text, error = %err, "search failed, treating as empty");
                    Vec::new()
                }
            };
            debug!(query = %text, candidates = candidates.len(), "search returned");

            let mut interrupted = false;
            for candidate in &candidates {
                if !self.wait_until_runnable().await {
                    interrupted = true;
                    break;
                }
                if candidate.id.is_empty() || !visited.insert(candidate.id.clone()) {
                    continue;
                }
                if self.process_candidate(candidate, query).await {
                    self.pace(self.settings.candidate_delay).await;
                }
            }

            if interrupted {
                self.save_visited(&visited).await;
                stopped_at = Some(index);
                break;
            }

            if let Err(err) = self.store.save_progress(index + 1).await {
                warn!(index, error = %err, "could not save progress checkpoint");
            }
            self.save_visited(&visited).await;
            self.ctx.update(|s| s.progress = index + 1);
            self.pace(self.settings.query_delay).await;
        }

        self.sync.flush(&self.ctx).await;
        let outcome = match stopped_at {
            Some(at_query) => RunOutcome::Stopped { at_query },
            None => RunOutcome::Completed {
                leads_found: self.ctx.snapshot().leads_found,
            },
        };
        let message = match outcome {
            RunOutcome::Completed { leads_found } => format!("Complete! Found {leads_found} leads"),
            RunOutcome::Stopped { at_query } => format!("Stopped at query {at_query}"),
        };
        info!(?outcome, "run finished");
        self.ctx.update(|s| {
            s.current_action = message;
            s.set_phase(RunPhase::Idle);
        });
        self.ctx.paused.store(false, Ordering::SeqCst);
        self.ctx.stop_requested.store(false, Ordering::SeqCst);
        self.ctx.active.store(false, Ordering::SeqCst);
        outcome
    }

    /// Returns true when the candidate became a lead.
    async fn process_candidate(&mut self, candidate: &Candidate, query: &Query) -> bool {
        let details = match self.places.details(&candidate.id).await {
            Ok(Some(details)) => details,
            Ok(None) => {
                debug!(place_id = %candidate.id, "no usable details, skipping");
                return false;
            }
            Err(err) => {
                warn!(place_id = %candidate.id, error = %err, "details lookup failed, skipping");
                return false;
            }
        };

        if self.ctx.oracle.read().await.contains(&details.name) {
            debug!(name = %details.name, "already captured, skipping");
            self.ctx.update(|s| s.skipped_duplicates += 1);
            return false;
        }

        let contact = match details.website() {
            Some(url) => self.extractor.extract_contact(url).await,
            None => ContactInfo::default(),
        };
        let lead = match Lead::from_details(&details, query.business_type_label(), contact, Utc::now()) {
            Ok(lead) => lead,
            Err(err) => {
                warn!(place_id = %candidate.id, error = %err, "invalid lead, skipping");
                return false;
            }
        };

        let short_name = lead.business_name().chars().take(30).collect::<String>();
        if !self.sync.capture(lead, &self.ctx).await {
            return false;
        }
        self.ctx.update(|s| s.current_action = format!("Found: {short_name}"));
        true
    }

    /// Blocks while paused. Returns false once a stop has been requested.
    async fn wait_until_runnable(&self) -> bool {
        let mut announced = false;
        loop {
            if self.ctx.is_stop_requested() {
                return false;
            }
            if !self.ctx.is_paused() {
                return true;
            }
            if !announced {
                debug!("paused");
                self.ctx.update(|s| s.current_action = "Paused".to_string());
                announced = true;
            }
            tokio::time::sleep(self.settings.poll_interval()).await;
        }
    }

    /// Sleep for `delay`, cut short by a stop request.
    async fn pace(&self, delay: Duration) {
        let deadline = Instant::now() + delay;
        loop {
            if self.ctx.is_stop_requested() {
                return;
            }
            let now = Instant::now();
            if now >= deadline {
                return;
            }
            tokio::time::sleep((deadline - now).min(self.settings.poll_interval())).await;
        }
    }

    async fn save_visited(&self, visited: &HashSet<String>) {
        if let Err(err) = self.store.save_visited(visited).await {
            warn!(error = %err, "could not save visited ids");
        }
    }
}

/// Everything a controller needs; built from [`AgentConfig`] in production and from
/// fakes in tests.
pub struct AgentParts {
    pub places: Arc<dyn PlacesApi>,
    pub extractor: Arc<dyn ContactExtractor>,
    pub remote: Arc<dyn RemoteLedger>,
    pub store: StateStore,
    pub ledger: LeadLedger,
    pub queries: Vec<Query>,
    pub settings: RunSettings,
}

impl AgentParts {
    /// Production wiring: Google Places, the website extractor and the configured remote ledger.
    pub async fn from_config(config: &AgentConfig) -> anyhow::Result<Self> {
        let catalog = load_query_catalog(&config.queries_file).await?;
        let api_key = config.places_api_key.clone().unwrap_or_else(|| {
            warn!("GOOGLE_PLACES_API_KEY not set, searches will be rejected");
            String::new()
        });
        let places = GooglePlacesClient::new(
            api_key,
            HttpClientConfig {
                timeout: Duration::from_secs(config.http_timeout_secs),
                user_agent: Some(config.user_agent.clone()),
                ..Default::default()
            },
        )?;
        let extractor = WebsiteContactExtractor::new(ExtractorConfig {
            timeout: Duration::from_secs(config.fetch_timeout_secs),
            user_agent: config.user_agent.clone(),
            ..Default::default()
        })?;

        Ok(Self {
            places: Arc::new(places),
            extractor: Arc::new(extractor),
            remote: remote_ledger_from_config(config),
            store: StateStore::new(&config.state_dir),
            ledger: LeadLedger::new(&config.leads_csv),
            queries: catalog.queries(),
            settings: config.run_settings(),
        })
    }
}

/// Start/pause/stop/reset/resync over a single background worker.
pub struct AgentController {
    ctx: Arc<RunContext>,
    places: Arc<dyn PlacesApi>,
    extractor: Arc<dyn ContactExtractor>,
    remote: Arc<dyn RemoteLedger>,
    store: StateStore,
    ledger: LeadLedger,
    queries: Arc<Vec<Query>>,
    settings: RunSettings,
    worker: Mutex<Option<JoinHandle<RunOutcome>>>,
}

impl AgentController {
    pub async fn from_config(config: &AgentConfig) -> anyhow::Result<Self> {
        Ok(Self::bootstrap(AgentParts::from_config(config).await?).await)
    }

    /// Rebuild the status counters and duplicate set from disk, falling back to a
    /// remote resync when no local cache exists.
    pub async fn bootstrap(parts: AgentParts) -> Self {
        let (controller, cached) = Self::assemble(parts).await;
        if !cached {
            info!("no local cache, syncing from remote ledger");
            controller.resync().await;
        }
        controller
    }

    /// Like [`AgentController::bootstrap`] but never reads the remote ledger.
    pub async fn restore(parts: AgentParts) -> Self {
        Self::assemble(parts).await.0
    }

    async fn assemble(parts: AgentParts) -> (Self, bool) {
        let total = parts.queries.len();
        let mut snapshot = StatusSnapshot::new(total);
        snapshot.progress = parts.store.load_progress().await.min(total);

        let stats = parts.ledger.scan().await;
        snapshot.leads_found = stats.rows;
        snapshot.leads_with_email = stats.with_email;

        let mut oracle = DuplicateOracle::new();
        oracle.seed(ledger_names(&parts.ledger).await);
        let cache = parts.store.load_cache().await;
        let cached = !cache.names.is_empty();
        if cached {
            oracle.seed(&cache.names);
            snapshot.leads_found = cache.total;
            snapshot.leads_with_email = cache.with_email;
            info!(names = cache.names.len(), "loaded duplicate cache");
        }

        let controller = Self {
            ctx: Arc::new(RunContext::new(snapshot, oracle)),
            places: parts.places,
            extractor: parts.extractor,
            remote: parts.remote,
            store: parts.store,
            ledger: parts.ledger,
            queries: Arc::new(parts.queries),
            settings: parts.settings,
            worker: Mutex::new(None),
        };
        (controller, cached)
    }

    pub fn context(&self) -> &Arc<RunContext> {
        &self.ctx
    }

    pub fn queries(&self) -> &[Query] {
        &self.queries
    }

    pub fn status(&self) -> StatusSnapshot {
        self.ctx.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<StatusSnapshot> {
        self.ctx.subscribe()
    }

    pub async fn known_business_count(&self) -> usize {
        self.ctx.oracle.read().await.len()
    }

    /// Spawn the worker. Returns false when a run is already active.
    pub async fn start(&self) -> bool {
        if self
            .ctx
            .active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }
        self.ctx.paused.store(false, Ordering::SeqCst);
        self.ctx.stop_requested.store(false, Ordering::SeqCst);
        self.ctx.update(|s| s.set_phase(RunPhase::Running));

        let sync = LedgerSync::new(
            self.ledger.clone(),
            Arc::clone(&self.remote),
            self.store.clone(),
            self.settings.batch_size,
        );
        let driver = QueryDriver::new(
            Arc::clone(&self.ctx),
            Arc::clone(&self.queries),
            Arc::clone(&self.places),
            Arc::clone(&self.extractor),
            self.store.clone(),
            sync,
            self.settings,
        );
        let run_id = Uuid::new_v4();
        let handle = tokio::spawn(driver.run().instrument(info_span!("run", %run_id)));
        *self.worker.lock().await = Some(handle);
        true
    }

    /// Toggle pause and return the new value. No effect while idle.
    pub fn pause(&self) -> bool {
        if !self.ctx.is_active() {
            return false;
        }
        let paused = !self.ctx.paused.fetch_xor(true, Ordering::SeqCst);
        self.ctx.update(|s| {
            if matches!(s.phase, RunPhase::Running | RunPhase::Paused) {
                s.set_phase(if paused { RunPhase::Paused } else { RunPhase::Running });
                if !paused {
                    s.current_action = "Resuming...".to_string();
                }
            }
        });
        info!(paused, "pause toggled");
        paused
    }

    pub fn stop(&self) {
        if !self.ctx.is_active() {
            return;
        }
        self.ctx.stop_requested.store(true, Ordering::SeqCst);
        self.ctx.update(|s| {
            if s.phase.is_active() {
                s.set_phase(RunPhase::Stopping);
                s.current_action = "Stopping...".to_string();
            }
        });
        info!("stop requested");
    }

    /// Rewind the checkpoint to the first query. Refused while a run is active.
    pub async fn reset(&self) -> bool {
        if self.ctx.is_active() {
            warn!("reset refused while a run is active");
            return false;
        }
        if let Err(err) = self.store.save_progress(0).await {
            error!(error = %err, "could not reset progress checkpoint");
            return false;
        }
        self.ctx.update(|s| {
            s.progress = 0;
            s.processed_today = 0;
            s.current_query.clear();
            s.current_action = "Progress reset".to_string();
        });
        info!("progress reset");
        true
    }

    /// Replace the duplicate set with the remote ledger's names (plus the flat ledger's)
    /// and return its new size. Returns 0 and changes nothing when the remote is
    /// unavailable.
    pub async fn resync(&self) -> usize {
        if !self.remote.is_enabled() {
            warn!("remote ledger not configured, resync skipped");
            return 0;
        }
        let records = match self.remote.list_all_records().await {
            Ok(records) => records,
            Err(err) => {
                warn!(error = %err, "could not read remote ledger");
                return 0;
            }
        };
        let total = records.len() as u64;
        let with_email = records.iter().filter(|r| r.has_email()).count() as u64;
        let local = ledger_names(&self.ledger).await;

        let count = {
            let mut oracle = self.ctx.oracle.write().await;
            oracle.replace(records.iter().map(|r| r.business_name.as_str()));
            oracle.seed(&local);
            oracle.len()
        };
        self.ctx.update(|s| {
            s.leads_found = total;
            s.leads_with_email = with_email;
            s.sheet_synced = true;
        });
        self.ctx.persist_cache(&self.store).await;
        info!(count, total, with_email, "synced duplicate set from remote ledger");
        count
    }

    /// Wait for the current worker, if any, and return how it ended.
    pub async fn wait(&self) -> Option<RunOutcome> {
        let handle = self.worker.lock().await.take()?;
        match handle.await {
            Ok(outcome) => Some(outcome),
            Err(err) => {
                error!(error = %err, "run worker failed");
                self.ctx.update(|s| s.set_phase(RunPhase::Idle));
                self.ctx.active.store(false, Ordering::SeqCst);
                None
            }
        }
    }
}

async fn ledger_names(ledger: &LeadLedger) -> Vec<String> {
    match ledger.read_rows().await {
        Ok(rows) => rows.into_iter().map(|row| row.business_name).collect(),
        Err(err) => {
            let err = format!("{err:#}");
            warn!(error = %err, "could not read lead ledger names");
            Vec::new()
        }
    }
}
