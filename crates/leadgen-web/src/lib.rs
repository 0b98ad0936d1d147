//! Axum + Askama dashboard and JSON control endpoints for the lead agent.

use std::sync::Arc;

use anyhow::Context;
use askama::Template;
use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use leadgen_core::{Query, StatusSnapshot};
use leadgen_sync::{AgentConfig, AgentController};
use serde_json::json;
use tokio::net::TcpListener;
use tracing::{info, warn};

pub const CRATE_NAME: &str = "leadgen-web";

#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<AgentController>,
}

impl AppState {
    pub fn new(controller: Arc<AgentController>) -> Self {
        Self { controller }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverageRow {
    pub region: String,
    pub queries: usize,
}

/// Query counts per region label, in sequence order. Queries without a country
/// qualifier are labelled by their city.
pub fn coverage(queries: &[Query]) -> Vec<CoverageRow> {
    let mut rows: Vec<CoverageRow> = Vec::new();
    for query in queries {
        let region = query.country.as_deref().unwrap_or(&query.city);
        match rows.last_mut() {
            Some(last) if last.region == region => last.queries += 1,
            _ => rows.push(CoverageRow {
                region: region.to_string(),
                queries: 1,
            }),
        }
    }
    rows
}

#[derive(Template)]
#[template(path = "dashboard.html")]
struct DashboardTemplate {
    status: StatusSnapshot,
    known_businesses: usize,
    coverage: Vec<CoverageRow>,
}

impl DashboardTemplate {
    fn percent(&self) -> usize {
        if self.status.total_queries == 0 {
            0
        } else {
            self.status.progress * 100 / self.status.total_queries
        }
    }
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(dashboard_handler))
        .route("/api/status", get(status_handler))
        .route("/api/start", get(start_handler).post(start_handler))
        .route("/api/stop", get(stop_handler).post(stop_handler))
        .route("/api/pause", get(pause_handler).post(pause_handler))
        .route("/api/reset", get(reset_handler).post(reset_handler))
        .route("/api/sync", get(sync_handler).post(sync_handler))
        .route("/api/existing-count", get(existing_count_handler))
        .with_state(Arc::new(state))
}

/// Serve until ctrl-c, then stop any active run and wait for it to flush.
pub async fn serve(controller: Arc<AgentController>, host: &str, port: u16) -> anyhow::Result<()> {
    let listener = TcpListener::bind((host, port))
        .await
        .with_context(|| format!("binding {host}:{port}"))?;
    info!(addr = %listener.local_addr()?, "dashboard listening");
    axum::serve(listener, app(AppState::new(Arc::clone(&controller))))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving dashboard")?;

    controller.stop();
    if let Some(outcome) = controller.wait().await {
        info!(?outcome, "run ended on shutdown");
    }
    Ok(())
}

pub async fn serve_from_env() -> anyhow::Result<()> {
    let config = AgentConfig::from_env();
    let controller = AgentController::from_config(&config).await?;
    serve(Arc::new(controller), &config.web_host, config.web_port).await
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "could not listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

async fn dashboard_handler(State(state): State<Arc<AppState>>) -> Response {
    let controller = &state.controller;
    render_html(DashboardTemplate {
        status: controller.status(),
        known_businesses: controller.known_business_count().await,
        coverage: coverage(controller.queries()),
    })
}

async fn status_handler(State(state): State<Arc<AppState>>) -> Json<StatusSnapshot> {
    Json(state.controller.status())
}

async fn start_handler(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    if state.controller.start().await {
        Json(json!({ "status": "started" }))
    } else {
        Json(json!({ "status": "already_running" }))
    }
}

async fn stop_handler(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    state.controller.stop();
    Json(json!({ "status": "stopped" }))
}

async fn pause_handler(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(json!({ "paused": state.controller.pause() }))
}

async fn reset_handler(State(state): State<Arc<AppState>>) -> Response {
    if state.controller.reset().await {
        Json(json!({ "status": "reset" })).into_response()
    } else {
        (StatusCode::CONFLICT, Json(json!({ "status": "busy" }))).into_response()
    }
}

async fn sync_handler(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let count = state.controller.resync().await;
    Json(json!({ "status": "synced", "existing_businesses": count }))
}

async fn existing_count_handler(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(json!({ "count": state.controller.known_business_count().await }))
}

fn render_html<T: Template>(tpl: T) -> Response {
    match tpl.render() {
        Ok(html) => Html(html).into_response(),
        Err(err) => server_error(anyhow::anyhow!(err.to_string())),
    }
}

fn server_error(err: anyhow::Error) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Html(format!("Server error: {}", err)),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{header, Request};
    use http_body_util::BodyExt;
    use leadgen_adapters::{AdapterError, ContactExtractor, DisabledLedger, PlacesApi};
    use leadgen_core::{Candidate, ContactInfo, PlaceDetails, QueryCatalog};
    use leadgen_storage::{LeadLedger, StateStore};
    use leadgen_sync::{AgentParts, RunSettings};
    use std::time::Duration;
    use tempfile::TempDir;
    use tower::ServiceExt;

    struct NoPlaces;

    #[async_trait]
    impl PlacesApi for NoPlaces {
        async fn search(&self, _query: &str) -> Result<Vec<Candidate>, AdapterError> {
            Ok(Vec::new())
        }

        async fn details(&self, _place_id: &str) -> Result<Option<PlaceDetails>, AdapterError> {
            Ok(None)
        }
    }

    struct NoContact;

    #[async_trait]
    impl ContactExtractor for NoContact {
        async fn extract_contact(&self, _url: &str) -> ContactInfo {
            ContactInfo::default()
        }
    }

    async fn test_app(dir: &TempDir, query_delay: Duration) -> (Router, Arc<AgentController>) {
        let controller = AgentController::bootstrap(AgentParts {
            places: Arc::new(NoPlaces),
            extractor: Arc::new(NoContact),
            remote: Arc::new(DisabledLedger),
            store: StateStore::new(dir.path()),
            ledger: LeadLedger::new(dir.path().join("leads.csv")),
            queries: QueryCatalog::default().queries(),
            settings: RunSettings {
                batch_size: 10,
                candidate_delay: Duration::ZERO,
                query_delay,
                pause_poll_interval: Duration::from_millis(10),
            },
        })
        .await;
        let controller = Arc::new(controller);
        (app(AppState::new(Arc::clone(&controller))), controller)
    }

    async fn call(app: &Router, method: &str, uri: &str) -> (StatusCode, String) {
        let resp = app
            .clone()
            .oneshot(Request::builder().method(method).uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    fn json_body(text: &str) -> serde_json::Value {
        serde_json::from_str(text).unwrap()
    }

    #[test]
    fn coverage_groups_default_catalog_by_region() {
        let rows = coverage(&QueryCatalog::default().queries());
        let summary = rows.iter().map(|r| (r.region.as_str(), r.queries)).collect::<Vec<_>>();
        assert_eq!(
            summary,
            vec![
                ("India", 325),
                ("USA", 90),
                ("UK", 60),
                ("Canada", 48),
                ("Australia", 36),
                ("UAE", 24),
                ("Singapore", 6),
            ]
        );
    }

    #[tokio::test]
    async fn handler_smoke_get_dashboard() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (app, _) = test_app(&dir, Duration::ZERO).await;
        let resp = app
            .clone()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(resp.headers()[header::CONTENT_TYPE].to_str().unwrap().starts_with("text/html"));
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("Lead Agent"));
        assert!(text.contains("Ready to start"));
        assert!(text.contains("589"));
    }

    #[tokio::test]
    async fn handler_smoke_status_and_counts() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (app, _) = test_app(&dir, Duration::ZERO).await;

        let (status, body) = call(&app, "GET", "/api/status").await;
        assert_eq!(status, StatusCode::OK);
        let snapshot = json_body(&body);
        assert_eq!(snapshot["total_queries"], 589);
        assert_eq!(snapshot["running"], false);
        assert_eq!(snapshot["phase"], "idle");
        assert!(snapshot["recent_leads"].as_array().unwrap().is_empty());

        let (_, body) = call(&app, "GET", "/api/existing-count").await;
        assert_eq!(json_body(&body), json!({ "count": 0 }));

        let (_, body) = call(&app, "POST", "/api/sync").await;
        assert_eq!(json_body(&body), json!({ "status": "synced", "existing_businesses": 0 }));

        let (_, body) = call(&app, "GET", "/api/pause").await;
        assert_eq!(json_body(&body), json!({ "paused": false }));

        let (status, body) = call(&app, "GET", "/api/reset").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json_body(&body), json!({ "status": "reset" }));
    }

    #[tokio::test]
    async fn handler_smoke_run_controls() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (app, controller) = test_app(&dir, Duration::from_millis(200)).await;

        let (_, body) = call(&app, "POST", "/api/start").await;
        assert_eq!(json_body(&body), json!({ "status": "started" }));
        let (_, body) = call(&app, "GET", "/api/start").await;
        assert_eq!(json_body(&body), json!({ "status": "already_running" }));

        let (_, body) = call(&app, "POST", "/api/pause").await;
        assert_eq!(json_body(&body), json!({ "paused": true }));

        let (status, body) = call(&app, "POST", "/api/reset").await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json_body(&body), json!({ "status": "busy" }));

        let (_, body) = call(&app, "GET", "/api/stop").await;
        assert_eq!(json_body(&body), json!({ "status": "stopped" }));
        tokio::time::timeout(Duration::from_secs(5), controller.wait())
            .await
            .unwrap()
            .unwrap();

        let (_, body) = call(&app, "GET", "/api/status").await;
        let snapshot = json_body(&body);
        assert_eq!(snapshot["running"], false);
        assert!(snapshot["current_action"].as_str().unwrap().starts_with("Stopped at query"));
    }
}
