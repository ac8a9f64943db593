use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::Utc;
use futures::StreamExt;
use tower::ServiceExt;

use autocut_analyzers::ObservationCache;
use autocut_core::{now_ts, CameraFeatures, CameraScore, DirectorConfig, SwitchAction};
use autocut_director::{DecisionEngine, ProgramShared};
use autocut_events::Bus;
use autocut_ingress::{Ingress, IngressConfig};
use autocut_server::{create_router, AppState};

struct Rig {
    router: Router,
    bus: Arc<Bus>,
    shared: Arc<ProgramShared>,
    _shutdown: tokio::sync::watch::Sender<bool>,
}

fn test_config() -> DirectorConfig {
    let mut cfg = DirectorConfig::default();
    cfg.decision_rate_hz = 50.0;
    cfg.policy.min_hold_sec = 0.0;
    cfg.policy.delta_s_threshold = 0.0;
    cfg.policy.cooldown_sec = 100.0;
    cfg.policy.enable_speech_align = false;
    cfg
}

/// Full pipeline minus media: a live decision engine fed over the bus.
async fn rig_with_engine(cfg: DirectorConfig) -> Rig {
    let bus = Arc::new(Bus::new());
    let cache = ObservationCache::new();
    let shared = ProgramShared::new();
    let ingress = Ingress::new(IngressConfig::default());

    let engine = DecisionEngine::new(
        shared.clone(),
        cache,
        bus.clone(),
        cfg.policy.clone(),
        cfg.decision_rate_hz,
    );
    let (shutdown, shutdown_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(engine.run(shutdown_rx));

    let state = Arc::new(AppState {
        shared: shared.clone(),
        ingress,
        bus: bus.clone(),
        config: cfg,
        app_start_time: Utc::now(),
    });
    Rig {
        router: create_router(state),
        bus,
        shared,
        _shutdown: shutdown,
    }
}

/// Router over a never-started core, for not-ready behavior.
fn rig_cold() -> Router {
    let state = Arc::new(AppState {
        shared: ProgramShared::new(),
        ingress: Ingress::new(IngressConfig::default()),
        bus: Arc::new(Bus::new()),
        config: DirectorConfig::default(),
        app_start_time: Utc::now(),
    });
    create_router(state)
}

fn score(cam: &str, value: f32) -> CameraScore {
    CameraScore {
        cam_id: cam.into(),
        timestamp: now_ts(),
        score: value,
        reason: "face visible".into(),
        features: CameraFeatures::default(),
    }
}

async fn get_json(router: &Router, path: &str) -> (StatusCode, serde_json::Value) {
    let response = router
        .clone()
        .oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

async fn post_json(router: &Router, path: &str, body: &str) -> (StatusCode, serde_json::Value) {
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(path)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

async fn wait_ready(shared: &ProgramShared) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(3);
    while !shared.is_ready() && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(shared.is_ready());
}

async fn wait_current(shared: &ProgramShared, cam: &str) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(3);
    while shared.current_cam().as_deref() != Some(cam)
        && tokio::time::Instant::now() < deadline
    {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(shared.current_cam().as_deref(), Some(cam));
}

#[tokio::test]
async fn health_reports_envelope_and_status() {
    let rig = rig_with_engine(test_config()).await;
    wait_ready(&rig.shared).await;

    let (status, body) = get_json(&rig.router, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert!(body["timestamp"].as_f64().is_some());
    // Ingress never connected in this rig.
    assert_eq!(body["data"]["status"], "degraded");
    assert_eq!(body["data"]["currentCam"], serde_json::Value::Null);
}

#[tokio::test]
async fn cold_core_is_loading() {
    let router = rig_cold();
    let (status, body) = get_json(&router, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "loading");
}

#[tokio::test]
async fn state_exposes_program_and_scores() {
    let rig = rig_with_engine(test_config()).await;
    wait_ready(&rig.shared).await;

    rig.bus.publish_score(score("cam-a", 0.9));
    rig.bus.publish_score(score("cam-b", 0.4));
    wait_current(&rig.shared, "cam-a").await;

    let (status, body) = get_json(&rig.router, "/state").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["program"]["currentCam"], "cam-a");
    assert_eq!(body["data"]["mode"], "live");
    let scores = body["data"]["scores"].as_array().unwrap();
    assert_eq!(scores.len(), 2);
    assert_eq!(scores[0]["camId"], "cam-a");
}

#[tokio::test]
async fn config_returns_policy_and_weights() {
    let rig = rig_with_engine(test_config()).await;
    let (status, body) = get_json(&rig.router, "/config").await;
    assert_eq!(status, StatusCode::OK);
    let config = &body["data"]["config"];
    assert_eq!(config["policy"]["cooldownSec"], 100.0);
    assert_eq!(config["weights"]["faceSalience"], 0.25);
    assert_eq!(config["analysisRateHz"], 10.0);
}

#[tokio::test]
async fn manual_rejects_before_ready() {
    let router = rig_cold();
    let (status, body) = post_json(&router, "/manual", r#"{"camId":"cam-a"}"#).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn manual_rejects_malformed_body() {
    let rig = rig_with_engine(test_config()).await;
    wait_ready(&rig.shared).await;
    let (status, _) = post_json(&rig.router, "/manual", "{not json").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn manual_rejects_unknown_camera() {
    let rig = rig_with_engine(test_config()).await;
    wait_ready(&rig.shared).await;
    let (status, body) = post_json(&rig.router, "/manual", r#"{"camId":"cam-ghost"}"#).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("cam-ghost"));
}

#[tokio::test]
async fn manual_rejects_camera_in_cooldown() {
    let rig = rig_with_engine(test_config()).await;
    wait_ready(&rig.shared).await;

    // a goes live, then b takes over, putting a in a long cooldown.
    rig.bus.publish_score(score("cam-a", 0.9));
    rig.bus.publish_score(score("cam-b", 0.1));
    wait_current(&rig.shared, "cam-a").await;
    rig.bus.publish_score(score("cam-a", 0.1));
    rig.bus.publish_score(score("cam-b", 0.9));
    wait_current(&rig.shared, "cam-b").await;

    let (status, _) = post_json(&rig.router, "/manual", r#"{"camId":"cam-a"}"#).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn manual_set_and_clear_flow() {
    let rig = rig_with_engine(test_config()).await;
    wait_ready(&rig.shared).await;
    let mut switches = rig.bus.subscribe_switches();

    rig.bus.publish_score(score("cam-a", 0.9));
    rig.bus.publish_score(score("cam-b", 0.4));
    wait_current(&rig.shared, "cam-a").await;

    let (status, body) = post_json(&rig.router, "/manual", r#"{"camId":"cam-b"}"#).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["manualCam"], "cam-b");
    wait_current(&rig.shared, "cam-b").await;

    // Setting the same target twice emits no second manual switch.
    let (status, _) = post_json(&rig.router, "/manual", r#"{"camId":"cam-b"}"#).await;
    assert_eq!(status, StatusCode::OK);
    tokio::time::sleep(Duration::from_millis(200)).await;

    // Count manual switches emitted up to now; the decision stream keeps
    // flowing, so read until a decision from after the cutoff.
    let cutoff = now_ts();
    let mut manual_switches = 0;
    loop {
        let decision = tokio::time::timeout(Duration::from_secs(2), switches.next())
            .await
            .expect("decision stream alive")
            .unwrap();
        if decision.timestamp > cutoff {
            break;
        }
        if decision.action == SwitchAction::Switch && decision.rationale == "manual" {
            manual_switches += 1;
        }
    }
    assert_eq!(manual_switches, 1);

    let (status, body) = post_json(&rig.router, "/manual", "{}").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["manualCam"], serde_json::Value::Null);
}

#[tokio::test]
async fn reset_returns_state_to_startup() {
    let rig = rig_with_engine(test_config()).await;
    wait_ready(&rig.shared).await;

    rig.bus.publish_score(score("cam-a", 0.9));
    wait_current(&rig.shared, "cam-a").await;

    let (status, body) = post_json(&rig.router, "/reset", "{}").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["reset"], true);

    // Next tick clears everything; no new scores arrive.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(3);
    while rig.shared.current_cam().is_some() && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let (_, body) = get_json(&rig.router, "/state").await;
    assert_eq!(body["data"]["program"]["currentCam"], serde_json::Value::Null);
    assert_eq!(body["data"]["mode"], "idle");
    assert!(body["data"]["scores"].as_array().unwrap().is_empty());
    assert!(body["data"]["program"]["history"].as_array().unwrap().is_empty());
}
