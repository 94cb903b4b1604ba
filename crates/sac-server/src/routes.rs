use crate::state::AppState;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post};
use axum::Router;
use sac_analytics::export::{export_text, write_export};
use sac_analytics::{AggregateRow, FilterSelection};
use sac_core::error::SacError;
use sac_core::loader::{LoadOutcome, SourceKind};
use serde::{Deserialize, Serialize};

// ── Health ──────────────────────────────────────────────────────────────

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

// ── Dataset ─────────────────────────────────────────────────────────────

pub fn dataset_routes() -> Router<AppState> {
    Router::new()
        .route("/api/dataset", get(dataset_info))
        .route("/api/overview", get(overview))
}

#[derive(Debug, Serialize)]
struct DatasetInfo {
    origin: String,
    kind: SourceKind,
    notices: Vec<String>,
    rows: usize,
    attendants: Vec<String>,
    sentiments: Vec<String>,
}

async fn dataset_info(State(state): State<AppState>) -> impl IntoResponse {
    let outcome = state.cache.get().await;
    Json(DatasetInfo {
        origin: outcome.origin.clone(),
        kind: outcome.kind,
        notices: outcome.notices.clone(),
        rows: outcome.dataset.len(),
        attendants: outcome.dataset.attendants(),
        sentiments: outcome.dataset.sentiments(),
    })
}

async fn overview(State(state): State<AppState>) -> Json<Vec<AggregateRow>> {
    let outcome = state.cache.get().await;
    Json(state.aggregator.overview(outcome.dataset.records()))
}

// ── Filtered view ───────────────────────────────────────────────────────

pub fn filter_routes() -> Router<AppState> {
    Router::new()
        .route("/api/filtered", post(filtered))
        .route("/api/export", post(export))
}

#[derive(Debug, Deserialize)]
struct FilterRequest {
    attendant: String,
    #[serde(default)]
    sentiments: Vec<String>,
}

impl FilterRequest {
    /// Build the selection, rejecting attendants absent from the data.
    fn selection(self, outcome: &LoadOutcome) -> Result<FilterSelection, (StatusCode, String)> {
        if !outcome.dataset.contains_attendant(&self.attendant) {
            return Err((
                StatusCode::NOT_FOUND,
                SacError::UnknownAttendant(self.attendant).to_string(),
            ));
        }
        Ok(FilterSelection::new(self.attendant, self.sentiments))
    }
}

#[derive(Debug, Serialize)]
struct FilteredEntry {
    sentiment: String,
    count: u32,
    share: f64,
}

#[derive(Debug, Serialize)]
struct FilteredResponse {
    attendant: String,
    threshold_secs: u64,
    entries: Vec<FilteredEntry>,
    total: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

async fn filtered(
    State(state): State<AppState>,
    Json(req): Json<FilterRequest>,
) -> Result<Json<FilteredResponse>, (StatusCode, String)> {
    let outcome = state.cache.get().await;
    let selection = req.selection(&outcome)?;
    let counts = state
        .aggregator
        .filtered_counts(outcome.dataset.records(), &selection);

    let message = if counts.is_empty() {
        Some("No sentiments selected".to_string())
    } else if counts.is_all_zero() {
        Some("No calls matched the selected filters".to_string())
    } else {
        None
    };

    let entries = counts
        .entries
        .iter()
        .zip(counts.shares())
        .map(|((sentiment, count), (_, share))| FilteredEntry {
            sentiment: sentiment.clone(),
            count: *count,
            share,
        })
        .collect();

    Ok(Json(FilteredResponse {
        attendant: selection.attendant,
        threshold_secs: state.aggregator.threshold().as_secs(),
        entries,
        total: counts.total(),
        message,
    }))
}

async fn export(
    State(state): State<AppState>,
    Json(req): Json<FilterRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let outcome = state.cache.get().await;
    let selection = req.selection(&outcome)?;
    let records = state
        .aggregator
        .filtered_records(outcome.dataset.records(), &selection);

    let internal = |e: SacError| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
    let body = export_text(records.iter().copied()).map_err(internal)?;
    let path = write_export(&state.config.export_dir(), &selection, &records).map_err(internal)?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "sac_export.txt".to_string());

    let headers = [
        (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", file_name),
        ),
    ];
    Ok((headers, body))
}
