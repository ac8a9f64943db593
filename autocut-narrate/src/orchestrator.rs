//! The narration orchestrator: one synthesis in flight at a time, newer
//! switches cancel older work, and anything over the latency budget is
//! rejected rather than published late.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use futures::StreamExt;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use autocut_core::{now_ts, CamId, CameraFeatures, Narration, SwitchAction};
use autocut_events::Bus;

use crate::template;
use crate::tts::TtsEngine;

#[derive(Debug, Clone)]
pub struct NarratorConfig {
    pub max_words: usize,
    pub max_tts_latency_ms: u64,
    /// Where synthesized WAVs land; `None` publishes text-only narrations.
    pub audio_dir: Option<PathBuf>,
}

impl Default for NarratorConfig {
    fn default() -> Self {
        Self {
            max_words: 12,
            max_tts_latency_ms: 600,
            audio_dir: None,
        }
    }
}

pub struct Narrator {
    bus: Arc<Bus>,
    tts: Arc<dyn TtsEngine>,
    cfg: NarratorConfig,
}

impl Narrator {
    pub fn new(bus: Arc<Bus>, tts: Arc<dyn TtsEngine>, cfg: NarratorConfig) -> Self {
        Self { bus, tts, cfg }
    }

    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut switches = self.bus.subscribe_switches();
        let mut scores = self.bus.subscribe_scores();
        let mut latest: HashMap<CamId, CameraFeatures> = HashMap::new();
        // Finished syntheses arrive tagged with their generation; anything
        // from a superseded switch is discarded.
        let (results_tx, mut results_rx) = mpsc::channel::<(u64, Narration)>(4);
        let mut generation: u64 = 0;
        let mut in_flight: Option<JoinHandle<()>> = None;
        info!("narrator running, {} word budget", self.cfg.max_words);

        loop {
            tokio::select! {
                score = scores.next() => {
                    if let Some(score) = score {
                        latest.insert(score.cam_id, score.features);
                    }
                }
                decision = switches.next() => {
                    let Some(decision) = decision else { continue };
                    if decision.action != SwitchAction::Switch {
                        continue;
                    }
                    let Some(to_cam) = decision.to_cam else { continue };
                    // The newer switch wins; cancel whatever was cooking.
                    if let Some(handle) = in_flight.take() {
                        debug!("cancelling in-flight narration");
                        handle.abort();
                    }
                    generation += 1;
                    let gen = generation;
                    let features = latest.get(&to_cam).cloned().unwrap_or_default();
                    let tts = Arc::clone(&self.tts);
                    let cfg = self.cfg.clone();
                    let results_tx = results_tx.clone();
                    in_flight = Some(tokio::spawn(async move {
                        if let Some(narration) = synthesize(&to_cam, &features, tts, &cfg).await {
                            let _ = results_tx.send((gen, narration)).await;
                        }
                    }));
                }
                result = results_rx.recv() => {
                    let Some((gen, narration)) = result else { continue };
                    if gen == generation {
                        in_flight = None;
                        self.bus.publish_narration(narration);
                    } else {
                        debug!("discarding narration from superseded switch");
                    }
                }
                _ = shutdown.changed() => {
                    if let Some(handle) = in_flight.take() {
                        handle.abort();
                    }
                    info!("narrator shutting down");
                    return;
                }
            }
        }
    }
}

async fn synthesize(
    to_cam: &str,
    features: &CameraFeatures,
    tts: Arc<dyn TtsEngine>,
    cfg: &NarratorConfig,
) -> Option<Narration> {
    let started = Instant::now();
    let (text, branch) = template::compose(to_cam, features, cfg.max_words);
    debug!("narrating {} via {:?}: {}", to_cam, branch, text);

    let audio = match tts.synthesize(&text).await {
        Ok(audio) => audio,
        Err(e) => {
            // The switch itself is unaffected; this narration just never airs.
            warn!("tts failed for '{}': {}", text, e);
            return None;
        }
    };

    let latency_ms = started.elapsed().as_millis() as u64;
    if latency_ms > cfg.max_tts_latency_ms {
        warn!(
            "narration over budget ({} ms > {} ms), dropping",
            latency_ms, cfg.max_tts_latency_ms
        );
        return None;
    }

    let audio_blob_ref = cfg.audio_dir.as_ref().and_then(|dir| {
        let path = dir.join(format!("narration-{}.wav", uuid::Uuid::new_v4()));
        match std::fs::write(&path, &audio.wav) {
            Ok(()) => Some(path.to_string_lossy().into_owned()),
            Err(e) => {
                warn!("failed to write narration audio: {}", e);
                None
            }
        }
    });

    Some(Narration {
        text,
        duration_ms: latency_ms,
        timestamp: now_ts(),
        audio_blob_ref,
    })
}
