//! Control server: the command surface over HTTP.
//!
//! Typed routes (`/api/poll`, `/api/reload`, ...) plus a generic
//! `/api/command` endpoint that accepts the historical message names.

use anyhow::{Context, Result};
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use tab_reconciler::{DiagnosticsSnapshot, PollScheduler, Trigger};

use crate::config::{FileConfig, ResolvedConfig};
use crate::sources::{SharedResolver, build_resolver};

#[derive(Clone)]
pub struct AppState {
    pub scheduler: Arc<PollScheduler>,
    pub resolver: Arc<SharedResolver>,
    pub data_dir: PathBuf,
    pub config: Arc<RwLock<FileConfig>>,
}

impl AppState {
    pub fn new(
        scheduler: Arc<PollScheduler>,
        resolver: Arc<SharedResolver>,
        data_dir: PathBuf,
        config: FileConfig,
    ) -> Self {
        Self {
            scheduler,
            resolver,
            data_dir,
            config: Arc::new(RwLock::new(config)),
        }
    }

    fn redacted_config(&self) -> FileConfig {
        self.config
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .redacted()
    }

    /// Re-read the config stack and follows file, then swap the scheduler
    /// settings and the live-source chain.
    pub fn reload(&self) -> Result<FileConfig> {
        let resolved = ResolvedConfig::load(&self.data_dir)?;
        let chain = build_resolver(&resolved.live, &resolved.browser.site)
            .context("Failed to rebuild live sources")?;

        self.resolver.replace(chain);
        self.scheduler.update_settings(resolved.poll);
        *self
            .config
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = resolved.file;

        info!("Configuration reloaded");
        Ok(self.redacted_config())
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/poll", post(poll_handler))
        .route("/api/reload", post(reload_handler))
        .route("/api/toggle", post(toggle_handler))
        .route("/api/diagnostics", get(diagnostics_handler))
        .route("/api/command", post(command_handler))
        .route("/health/live", get(health_live_handler))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// =============================================================================
// Command names
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    Ping,
    Toggle,
    Reload,
    Force,
    Diagnose,
}

const COMMAND_ALIASES: &[(&str, Command)] = &[
    ("ttm/ping", Command::Ping),
    ("TTM_PING", Command::Ping),
    ("PING", Command::Ping),
    ("ping", Command::Ping),
    ("ttm/enable", Command::Toggle),
    ("TTM_TOGGLE", Command::Toggle),
    ("TOGGLE", Command::Toggle),
    ("toggle", Command::Toggle),
    ("ttm/reload_config", Command::Reload),
    ("TTM_RELOAD_CONFIG", Command::Reload),
    ("RELOAD_CONFIG", Command::Reload),
    ("reload_config", Command::Reload),
    ("ttm/force_poll", Command::Force),
    ("TTM_FORCE_POLL", Command::Force),
    ("FORCE_POLL", Command::Force),
    ("force_poll", Command::Force),
    ("ttm/diagnose", Command::Diagnose),
    ("TTM_DIAGNOSE", Command::Diagnose),
    ("TTM_DIAG", Command::Diagnose),
    ("DIAGNOSE", Command::Diagnose),
    ("diagnose", Command::Diagnose),
];

impl Command {
    /// Look up a message name: lowercased first, then exactly as given.
    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim();
        let lookup = |key: &str| {
            COMMAND_ALIASES
                .iter()
                .find(|(alias, _)| *alias == key)
                .map(|(_, cmd)| *cmd)
        };
        lookup(&name.to_lowercase()).or_else(|| lookup(name))
    }

    pub fn accepted() -> Vec<&'static str> {
        COMMAND_ALIASES.iter().map(|(alias, _)| *alias).collect()
    }
}

// =============================================================================
// Handlers
// =============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct ToggleRequest {
    #[serde(default)]
    pub enabled: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct CommandRequest {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub enabled: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct DiagnosticsResponse {
    #[serde(flatten)]
    pub snapshot: DiagnosticsSnapshot,
    pub sources: Vec<String>,
    pub config: FileConfig,
}

fn apply_toggle(state: &AppState, enabled: Option<bool>) -> bool {
    match enabled {
        Some(enabled) => {
            state.scheduler.set_enabled(enabled);
            enabled
        }
        None => state.scheduler.toggle(),
    }
}

fn diagnostics(state: &AppState) -> DiagnosticsResponse {
    DiagnosticsResponse {
        snapshot: state.scheduler.diagnostics(),
        sources: state.resolver.labels(),
        config: state.redacted_config(),
    }
}

/// Force a poll, waiting (bounded) for a running cycle to finish. The cycle
/// outlives the request if the client hangs up.
pub async fn poll_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.scheduler.trigger_detached(Trigger::Forced).await)
}

pub async fn reload_handler(
    State(state): State<AppState>,
) -> Result<Json<Value>, (StatusCode, String)> {
    let settings = state.reload().map_err(|e| {
        warn!("Reload failed: {:#}", e);
        (StatusCode::BAD_REQUEST, format!("{:#}", e))
    })?;
    Ok(Json(json!({ "ok": true, "settings": settings })))
}

pub async fn toggle_handler(
    State(state): State<AppState>,
    Json(req): Json<ToggleRequest>,
) -> impl IntoResponse {
    let enabled = apply_toggle(&state, req.enabled);
    Json(json!({ "ok": true, "enabled": enabled }))
}

pub async fn diagnostics_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(diagnostics(&state))
}

/// Generic command endpoint for the historical message names.
pub async fn command_handler(
    State(state): State<AppState>,
    Json(req): Json<CommandRequest>,
) -> impl IntoResponse {
    let Some(command) = Command::parse(&req.kind) else {
        return Json(json!({
            "ok": false,
            "error": "unknown_message",
            "type": req.kind,
            "accepted": Command::accepted(),
        }));
    };

    match command {
        Command::Ping => Json(json!({
            "ok": true,
            "alive": true,
            "enabled": state.scheduler.is_enabled(),
        })),
        Command::Toggle => {
            let enabled = apply_toggle(&state, req.enabled);
            Json(json!({ "ok": true, "enabled": enabled }))
        }
        Command::Reload => match state.reload() {
            Ok(settings) => Json(json!({ "ok": true, "settings": settings })),
            Err(e) => Json(json!({ "ok": false, "error": format!("{:#}", e) })),
        },
        Command::Force => {
            let outcome = state.scheduler.trigger_detached(Trigger::Forced).await;
            Json(json!({ "ok": true, "outcome": outcome }))
        }
        Command::Diagnose => Json(json!({ "ok": true, "diagnostics": diagnostics(&state) })),
    }
}

/// Liveness probe - returns 200 if the server is running
pub async fn health_live_handler() -> impl IntoResponse {
    Json(json!({ "status": "alive" }))
}

pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.scheduler.metrics().snapshot())
}
