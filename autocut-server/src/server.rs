//! Control/read API. Every response is a `{success, data?, error?,
//! timestamp}` envelope; state mutations go through the engine's command
//! queue rather than touching program state directly.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::rejection::JsonRejection,
    extract::State,
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    response::Json as JsonResponse,
    routing::{get, post},
    serve, Router,
};
use chrono::{DateTime, Utc};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use autocut_core::{now_ts, CameraScore, DirectorConfig, ProgramState};
use autocut_director::{EngineCommand, EngineMode, ProgramShared};
use autocut_events::{encode, Bus, BusMessage};
use autocut_ingress::Ingress;

pub struct AppState {
    pub shared: Arc<ProgramShared>,
    pub ingress: Arc<Ingress>,
    pub bus: Arc<Bus>,
    pub config: DirectorConfig,
    pub app_start_time: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: f64,
}

fn ok<T: Serialize>(data: T) -> JsonResponse<ApiResponse<T>> {
    JsonResponse(ApiResponse {
        success: true,
        data: Some(data),
        error: None,
        timestamp: now_ts(),
    })
}

fn err(status: StatusCode, message: impl Into<String>) -> (StatusCode, JsonResponse<Value>) {
    (
        status,
        JsonResponse(json!({
            "success": false,
            "error": message.into(),
            "timestamp": now_ts(),
        })),
    )
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthData {
    pub status: String,
    pub current_cam: Option<String>,
    pub connected: bool,
    pub degraded: Vec<String>,
    pub uptime_secs: i64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateData {
    pub program: ProgramState,
    pub mode: String,
    pub scores: Vec<CameraScore>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigData {
    pub config: DirectorConfig,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ManualRequest {
    pub cam_id: Option<String>,
}

fn mode_name(mode: EngineMode) -> &'static str {
    match mode {
        EngineMode::Idle => "idle",
        EngineMode::Live => "live",
        EngineMode::Manual => "manual",
    }
}

pub async fn health(State(state): State<Arc<AppState>>) -> JsonResponse<ApiResponse<HealthData>> {
    let ingress = state.ingress.health();
    let status = if !state.shared.is_ready() {
        "loading"
    } else if !ingress.connected || !ingress.degraded.is_empty() {
        "degraded"
    } else {
        "healthy"
    };
    ok(HealthData {
        status: status.to_string(),
        current_cam: state.shared.current_cam(),
        connected: ingress.connected,
        degraded: ingress.degraded,
        uptime_secs: (Utc::now() - state.app_start_time).num_seconds(),
    })
}

pub async fn get_state(State(state): State<Arc<AppState>>) -> JsonResponse<ApiResponse<StateData>> {
    let mut scores = state.shared.latest_scores();
    scores.sort_by(|a, b| a.cam_id.cmp(&b.cam_id));
    ok(StateData {
        program: state.shared.snapshot(),
        mode: mode_name(state.shared.mode()).to_string(),
        scores,
    })
}

pub async fn get_config(
    State(state): State<Arc<AppState>>,
) -> JsonResponse<ApiResponse<ConfigData>> {
    ok(ConfigData {
        config: state.config.clone(),
    })
}

pub async fn manual(
    State(state): State<Arc<AppState>>,
    body: Result<JsonResponse<ManualRequest>, JsonRejection>,
) -> Result<JsonResponse<ApiResponse<Value>>, (StatusCode, JsonResponse<Value>)> {
    let JsonResponse(request) = body.map_err(|e| err(StatusCode::BAD_REQUEST, e.to_string()))?;

    if !state.shared.is_ready() {
        return Err(err(StatusCode::SERVICE_UNAVAILABLE, "core not ready"));
    }

    match request.cam_id {
        Some(cam_id) => {
            if state.shared.latest_score(&cam_id).is_none() {
                return Err(err(
                    StatusCode::NOT_FOUND,
                    format!("unknown camera {}", cam_id),
                ));
            }
            if state.shared.snapshot().in_cooldown(&cam_id, now_ts()) {
                return Err(err(
                    StatusCode::CONFLICT,
                    format!("camera {} is in cooldown", cam_id),
                ));
            }
            info!("manual override set to {}", cam_id);
            state
                .shared
                .push_command(EngineCommand::SetManual(cam_id.clone()));
            Ok(ok(json!({ "manualCam": cam_id })))
        }
        None => {
            info!("manual override cleared");
            state.shared.push_command(EngineCommand::ClearManual);
            Ok(ok(json!({ "manualCam": Value::Null })))
        }
    }
}

pub async fn reset(State(state): State<Arc<AppState>>) -> JsonResponse<ApiResponse<Value>> {
    info!("program state reset requested");
    state.shared.push_command(EngineCommand::Reset);
    ok(json!({ "reset": true }))
}

/// All three bus topics as one SSE stream of wire-encoded envelopes.
pub async fn events(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let scores = state.bus.subscribe_scores().map(BusMessage::Score);
    let switches = state.bus.subscribe_switches().map(BusMessage::from_decision);
    let narration = state.bus.subscribe_narration().map(BusMessage::Narration);
    let merged = futures::stream::select(scores, futures::stream::select(switches, narration));
    let stream = merged.filter_map(|message| async move {
        encode(&message)
            .ok()
            .map(|data| Ok(Event::default().data(data)))
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/state", get(get_state))
        .route("/config", get(get_config))
        .route("/manual", post(manual))
        .route("/reset", post(reset))
        .route("/events", get(events))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub struct Server {
    state: Arc<AppState>,
    addr: SocketAddr,
}

impl Server {
    pub fn new(state: Arc<AppState>, addr: SocketAddr) -> Self {
        Self { state, addr }
    }

    pub async fn start(self) -> anyhow::Result<()> {
        let app = create_router(self.state);
        info!("control api listening on {}", self.addr);
        match serve(TcpListener::bind(self.addr).await?, app.into_make_service()).await {
            Ok(()) => {
                info!("server stopped");
                Ok(())
            }
            Err(e) => {
                error!("server error: {}", e);
                Err(e.into())
            }
        }
    }
}
