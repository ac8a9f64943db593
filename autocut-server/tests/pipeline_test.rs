//! End-to-end smoke test: scripted room in, switch decisions and narration
//! out, with no external services.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;

use autocut_analyzers::{
    AnalyzerRegistry, CentroidTracker, DisabledDetector, DisabledSceneDescriber,
    EnergySpeechRecognizer, ObservationCache,
};
use autocut_core::{DirectorConfig, SwitchAction};
use autocut_director::ProgramShared;
use autocut_events::Bus;
use autocut_ingress::{Ingress, IngressConfig, ScriptedHandle, ScriptedRoom};
use autocut_narrate::SilenceTts;
use autocut_server::start_autocut;

#[tokio::test]
async fn loud_camera_becomes_program_and_gets_narrated() {
    let mut cfg = DirectorConfig::default();
    cfg.policy.enable_speech_align = false;
    cfg.policy.min_hold_sec = 0.5;

    let bus = Arc::new(Bus::new());
    let cache = ObservationCache::new();
    let shared = ProgramShared::new();

    let (room, handle) = ScriptedRoom::new();
    let ingress = Ingress::new(IngressConfig::default());
    ingress.start(room, "sim://room", "token").await.unwrap();

    let (registry, faults) = AnalyzerRegistry::new(
        Arc::new(DisabledDetector),
        Arc::new(DisabledSceneDescriber),
        Arc::new(EnergySpeechRecognizer::default()),
        Box::new(CentroidTracker::default()),
    );

    let mut switches = bus.subscribe_switches();
    let mut narrations = bus.subscribe_narration();

    let handles = start_autocut(
        &cfg,
        Arc::clone(&ingress),
        registry,
        faults,
        Arc::new(SilenceTts::default()),
        Arc::clone(&bus),
        cache,
        Arc::clone(&shared),
        None,
    )
    .await
    .unwrap();

    handle.join("cam-loud");
    handle.join("cam-quiet");
    tokio::time::sleep(Duration::from_millis(100)).await;

    // Feed both cameras: one with hot audio, one near-silent.
    let feeder = {
        let handle = handle.clone();
        tokio::spawn(async move {
            for _ in 0..80 {
                let ts = autocut_core::now_ts();
                handle.push_frame("cam-loud", ScriptedHandle::rgb_frame(320, 180, ts, 120));
                handle.push_frame("cam-quiet", ScriptedHandle::rgb_frame(320, 180, ts, 40));
                handle.push_audio("cam-loud", ScriptedHandle::tone_audio(ts, 0.1, 0.5));
                handle.push_audio("cam-quiet", ScriptedHandle::tone_audio(ts, 0.1, 0.001));
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        })
    };

    // At least one switch lands, and the loud camera ends up program.
    let switch = loop {
        let decision = tokio::time::timeout(Duration::from_secs(5), switches.next())
            .await
            .expect("decision stream alive")
            .unwrap();
        if decision.action == SwitchAction::Switch {
            break decision;
        }
    };
    assert!(switch.to_cam.is_some());

    let deadline = tokio::time::Instant::now() + Duration::from_secs(8);
    while shared.current_cam().as_deref() != Some("cam-loud")
        && tokio::time::Instant::now() < deadline
    {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert_eq!(shared.current_cam().as_deref(), Some("cam-loud"));

    // Switching produced at least one narration.
    let narration = tokio::time::timeout(Duration::from_secs(5), narrations.next())
        .await
        .expect("narration in time")
        .unwrap();
    assert!(!narration.text.is_empty());

    feeder.abort();
    handles.shutdown().await;
}
