//! Axum-based HTTP API over the dashboard

use crate::dashboard::{Dashboard, DashboardSnapshot};
use crate::error::{Result, WendeError};
use crate::series::Timestamp;
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::sync::{Mutex, watch};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

type Clock = Arc<dyn Fn() -> Timestamp + Send + Sync>;

/// Handlers that only read use `snapshot_rx`; `dashboard` is locked for
/// updates and session changes
#[derive(Clone)]
pub struct AppState {
    pub dashboard: Arc<Mutex<Dashboard>>,
    pub snapshot_rx: watch::Receiver<Arc<DashboardSnapshot>>,
    clock: Clock,
}

impl AppState {
    pub fn new(
        dashboard: Arc<Mutex<Dashboard>>,
        snapshot_rx: watch::Receiver<Arc<DashboardSnapshot>>,
    ) -> Self {
        Self {
            dashboard,
            snapshot_rx,
            clock: Arc::new(chrono::Utc::now),
        }
    }

    /// Replace the wall clock used by handlers
    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> Timestamp + Send + Sync + 'static,
    {
        self.clock = Arc::new(clock);
        self
    }

    fn now(&self) -> Timestamp {
        (self.clock)()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateBody {
    #[serde(default)]
    pub force: bool,
}

pub async fn health() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(serde_json::json!({"status": "ok", "version": env!("CARGO_PKG_VERSION")})),
    )
}

/// Last update result; never waits for an update in flight
pub async fn dashboard(State(state): State<AppState>) -> Response {
    let snapshot = state.snapshot_rx.borrow().clone();
    match &snapshot.last_update {
        Some(update) => Json(update).into_response(),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({"error": "no update has completed yet"})),
        )
            .into_response(),
    }
}

/// Run an update now; `force` drops today's cached share first
pub async fn update(State(state): State<AppState>, body: Option<Json<UpdateBody>>) -> Response {
    let force = body.map(|Json(b)| b.force).unwrap_or(false);
    let now = state.now();
    let mut dash = state.dashboard.lock().await;
    if force {
        dash.invalidate_today(now);
    }
    let result = dash.update(now).await;
    Json(result).into_response()
}

pub async fn session(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.snapshot_rx.borrow().clone();
    Json(snapshot.session.clone())
}

pub async fn session_reset(State(state): State<AppState>) -> impl IntoResponse {
    let now = state.now();
    let mut dash = state.dashboard.lock().await;
    let id = dash.reset_session(now);
    Json(serde_json::json!({"status": "ok", "session_id": id}))
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/dashboard", get(dashboard))
        .route("/api/update", post(update))
        .route("/api/session", get(session))
        .route("/api/session/reset", post(session_reset))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

pub async fn serve(state: AppState, host: &str, port: u16) -> Result<()> {
    let router = build_router(state);

    let logger = crate::logging::get_logger("web");
    logger.info(&format!(
        "Starting web server; requested host={}, port={}",
        host, port
    ));

    let addr: SocketAddr = match host.parse::<IpAddr>() {
        Ok(ip) => SocketAddr::new(ip, port),
        Err(_) => {
            logger.warn(&format!("Invalid host '{}'; falling back to 127.0.0.1", host));
            ([127, 0, 0, 1], port).into()
        }
    };

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| WendeError::web(format!("cannot bind {}: {}", addr, e)))?;
    let local_addr = listener.local_addr()?;
    logger.info(&format!(
        "Web server listening at http://{}:{} (API /api)",
        local_addr.ip(),
        local_addr.port()
    ));

    axum::serve(listener, router)
        .await
        .map_err(|e| WendeError::web(e.to_string()))?;
    Ok(())
}
