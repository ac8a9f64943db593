//! Task orchestration: wires the bus, cache, and shared state together and
//! runs the long-lived pipeline tasks under one shutdown signal.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use autocut_analyzers::{AnalyzerFault, AnalyzerRegistry, ObservationCache, Sampler, SamplerConfig};
use autocut_core::DirectorConfig;
use autocut_director::{DecisionEngine, ProgramShared, Ranker, RankerConfig, WeightedSum};
use autocut_events::Bus;
use autocut_ingress::Ingress;
use autocut_narrate::{Narrator, NarratorConfig, TtsEngine};

pub struct AutocutHandles {
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
    grace: Duration,
}

impl AutocutHandles {
    /// Signal every task and drain in-flight work, forcing termination after
    /// the grace period.
    pub async fn shutdown(self) {
        info!("shutting down, {}s grace", self.grace.as_secs());
        let _ = self.shutdown.send(true);
        let drain = async {
            for task in self.tasks {
                let _ = task.await;
            }
        };
        if tokio::time::timeout(self.grace, drain).await.is_err() {
            warn!("graceful drain expired, forcing termination");
        }
    }
}

#[allow(clippy::too_many_arguments)]
pub async fn start_autocut(
    cfg: &DirectorConfig,
    ingress: Arc<Ingress>,
    registry: Arc<AnalyzerRegistry>,
    faults: mpsc::UnboundedReceiver<AnalyzerFault>,
    tts: Arc<dyn TtsEngine>,
    bus: Arc<Bus>,
    cache: Arc<ObservationCache>,
    shared: Arc<ProgramShared>,
    narration_audio_dir: Option<PathBuf>,
) -> Result<AutocutHandles> {
    registry.warm_up().await;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut tasks = Vec::new();

    tasks.push(tokio::spawn(report_faults(faults, shutdown_rx.clone())));

    let sampler = Sampler::new(
        Arc::clone(&ingress),
        Arc::clone(&registry),
        Arc::clone(&cache),
        SamplerConfig {
            analysis_rate_hz: cfg.analysis_rate_hz,
            scene_interval_ms: cfg.scene_interval_ms,
            audio_window_sec: cfg.audio_window_sec,
            audio_hop_sec: cfg.audio_hop_sec,
            deadlines: cfg.deadlines.clone(),
            max_parallel: cfg.analyzer_pool_size(cfg.max_cameras),
        },
    );
    tasks.push(tokio::spawn(sampler.run(shutdown_rx.clone())));

    let ranker = Ranker::new(
        Arc::clone(&cache),
        Arc::clone(&bus),
        Arc::clone(&shared),
        Box::new(WeightedSum::new(cfg.weights.clone())),
        RankerConfig::from(cfg),
    );
    tasks.push(tokio::spawn(ranker.run(shutdown_rx.clone())));

    let engine = DecisionEngine::new(
        Arc::clone(&shared),
        Arc::clone(&cache),
        Arc::clone(&bus),
        cfg.policy.clone(),
        cfg.decision_rate_hz,
    );
    tasks.push(tokio::spawn(engine.run(shutdown_rx.clone())));

    let narrator = Narrator::new(
        Arc::clone(&bus),
        tts,
        NarratorConfig {
            max_words: cfg.max_narration_words,
            max_tts_latency_ms: cfg.max_tts_latency_ms,
            audio_dir: narration_audio_dir,
        },
    );
    tasks.push(tokio::spawn(narrator.run(shutdown_rx)));

    info!("autocut pipeline started");
    Ok(AutocutHandles {
        shutdown: shutdown_tx,
        tasks,
        grace: Duration::from_secs(cfg.shutdown_grace_sec),
    })
}

/// Sideband analyzer fault reports: logged once each, they do not stop the
/// pipeline.
async fn report_faults(
    mut faults: mpsc::UnboundedReceiver<AnalyzerFault>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            fault = faults.recv() => {
                let Some(fault) = fault else { return };
                error!(
                    "{:?} analyzer is dead and will not recover this run: {}",
                    fault.modality, fault.error
                );
            }
            _ = shutdown.changed() => return,
        }
    }
}
