use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::watch;

use autocut_core::{CameraFeatures, CameraScore, SwitchAction, SwitchDecision};
use autocut_events::Bus;
use autocut_narrate::{Narrator, NarratorConfig, SilenceTts, TtsAudio, TtsEngine};

struct SlowTts {
    delay: Duration,
}

#[async_trait]
impl TtsEngine for SlowTts {
    async fn synthesize(&self, text: &str) -> Result<TtsAudio> {
        tokio::time::sleep(self.delay).await;
        SilenceTts::default().synthesize(text).await
    }
}

struct FailingTts;

#[async_trait]
impl TtsEngine for FailingTts {
    async fn synthesize(&self, _text: &str) -> Result<TtsAudio> {
        anyhow::bail!("backend down")
    }
}

fn score(cam: &str, tags: Vec<String>) -> CameraScore {
    CameraScore {
        cam_id: cam.into(),
        timestamp: 1.0,
        score: 0.8,
        reason: "high interest".into(),
        features: CameraFeatures {
            tags,
            ..Default::default()
        },
    }
}

fn switch_to(cam: &str, ts: f64) -> SwitchDecision {
    SwitchDecision {
        timestamp: ts,
        action: SwitchAction::Switch,
        from_cam: None,
        to_cam: Some(cam.into()),
        delta_score: None,
        rationale: "initial".into(),
        confidence: 1.0,
    }
}

fn spawn_narrator(bus: Arc<Bus>, tts: Arc<dyn TtsEngine>, cfg: NarratorConfig) -> watch::Sender<bool> {
    let (shutdown, shutdown_rx) = watch::channel(false);
    tokio::spawn(Narrator::new(bus, tts, cfg).run(shutdown_rx));
    shutdown
}

#[tokio::test]
async fn switch_produces_narration_from_features() {
    let bus = Arc::new(Bus::new());
    let mut narrations = bus.subscribe_narration();
    let _shutdown = spawn_narrator(
        bus.clone(),
        Arc::new(SilenceTts::default()),
        NarratorConfig::default(),
    );
    tokio::time::sleep(Duration::from_millis(30)).await;

    bus.publish_score(score("cam-a", vec!["concert".into()]));
    tokio::time::sleep(Duration::from_millis(30)).await;
    bus.publish_decision(switch_to("cam-a", 1.0));

    let narration = tokio::time::timeout(Duration::from_secs(2), narrations.next())
        .await
        .expect("narration in time")
        .unwrap();
    assert_eq!(narration.text, "A look at the concert scene");
    assert!(narration.audio_blob_ref.is_none());
}

#[tokio::test]
async fn hold_produces_no_narration() {
    let bus = Arc::new(Bus::new());
    let mut narrations = bus.subscribe_narration();
    let _shutdown = spawn_narrator(
        bus.clone(),
        Arc::new(SilenceTts::default()),
        NarratorConfig::default(),
    );
    tokio::time::sleep(Duration::from_millis(30)).await;

    bus.publish_decision(SwitchDecision::hold(1.0, Some("cam-a".into()), "same-best"));

    let result = tokio::time::timeout(Duration::from_millis(300), narrations.next()).await;
    assert!(result.is_err(), "no narration expected for HOLD");
}

#[tokio::test]
async fn newer_switch_cancels_in_flight_synthesis() {
    let bus = Arc::new(Bus::new());
    let mut narrations = bus.subscribe_narration();
    let cfg = NarratorConfig {
        max_tts_latency_ms: 5_000,
        ..Default::default()
    };
    let _shutdown = spawn_narrator(
        bus.clone(),
        Arc::new(SlowTts {
            delay: Duration::from_millis(300),
        }),
        cfg,
    );
    tokio::time::sleep(Duration::from_millis(30)).await;

    bus.publish_score(score("cam-a", vec!["first".into()]));
    bus.publish_score(score("cam-b", vec!["second".into()]));
    tokio::time::sleep(Duration::from_millis(30)).await;

    bus.publish_decision(switch_to("cam-a", 1.0));
    tokio::time::sleep(Duration::from_millis(50)).await;
    bus.publish_decision(switch_to("cam-b", 1.1));

    // Only the newer narration airs.
    let narration = tokio::time::timeout(Duration::from_secs(2), narrations.next())
        .await
        .expect("narration in time")
        .unwrap();
    assert_eq!(narration.text, "A look at the second scene");

    let extra = tokio::time::timeout(Duration::from_millis(300), narrations.next()).await;
    assert!(extra.is_err(), "cancelled narration must not air");
}

#[tokio::test]
async fn over_budget_narration_is_rejected() {
    let bus = Arc::new(Bus::new());
    let mut narrations = bus.subscribe_narration();
    let cfg = NarratorConfig {
        max_tts_latency_ms: 10,
        ..Default::default()
    };
    let _shutdown = spawn_narrator(
        bus.clone(),
        Arc::new(SlowTts {
            delay: Duration::from_millis(200),
        }),
        cfg,
    );
    tokio::time::sleep(Duration::from_millis(30)).await;

    bus.publish_decision(switch_to("cam-a", 1.0));

    let result = tokio::time::timeout(Duration::from_millis(500), narrations.next()).await;
    assert!(result.is_err(), "over-budget narration must be dropped");
}

#[tokio::test]
async fn tts_failure_skips_narration_silently() {
    let bus = Arc::new(Bus::new());
    let mut narrations = bus.subscribe_narration();
    let _shutdown = spawn_narrator(bus.clone(), Arc::new(FailingTts), NarratorConfig::default());
    tokio::time::sleep(Duration::from_millis(30)).await;

    bus.publish_decision(switch_to("cam-a", 1.0));

    let result = tokio::time::timeout(Duration::from_millis(300), narrations.next()).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn audio_blob_is_written_when_dir_configured() {
    let dir = std::env::temp_dir().join(format!("autocut-test-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();

    let bus = Arc::new(Bus::new());
    let mut narrations = bus.subscribe_narration();
    let cfg = NarratorConfig {
        audio_dir: Some(dir.clone()),
        ..Default::default()
    };
    let _shutdown = spawn_narrator(bus.clone(), Arc::new(SilenceTts::default()), cfg);
    tokio::time::sleep(Duration::from_millis(30)).await;

    bus.publish_decision(switch_to("cam-a", 1.0));

    let narration = tokio::time::timeout(Duration::from_secs(2), narrations.next())
        .await
        .expect("narration in time")
        .unwrap();
    let path = narration.audio_blob_ref.expect("blob ref");
    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(&bytes[0..4], b"RIFF");

    let _ = std::fs::remove_dir_all(&dir);
}
