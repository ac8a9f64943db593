//! Wires concrete analyzer implementations at startup and tracks each
//! engine's lifecycle state.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{error, info};

use crate::traits::{AnalyzerState, Detector, SceneDescriber, SpeechRecognizer, Tracker};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modality {
    Detector,
    Tracker,
    Scene,
    Speech,
}

impl Modality {
    fn index(self) -> usize {
        match self {
            Modality::Detector => 0,
            Modality::Tracker => 1,
            Modality::Scene => 2,
            Modality::Speech => 3,
        }
    }
}

/// One-shot sideband report for a fatal analyzer failure.
#[derive(Debug, Clone)]
pub struct AnalyzerFault {
    pub modality: Modality,
    pub error: String,
}

pub struct AnalyzerRegistry {
    pub detector: Arc<dyn Detector>,
    pub scene: Arc<dyn SceneDescriber>,
    pub speech: Arc<dyn SpeechRecognizer>,
    pub tracker: Mutex<Box<dyn Tracker>>,
    states: Mutex<[AnalyzerState; 4]>,
    faults_tx: mpsc::UnboundedSender<AnalyzerFault>,
}

impl AnalyzerRegistry {
    pub fn new(
        detector: Arc<dyn Detector>,
        scene: Arc<dyn SceneDescriber>,
        speech: Arc<dyn SpeechRecognizer>,
        tracker: Box<dyn Tracker>,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<AnalyzerFault>) {
        let (faults_tx, faults_rx) = mpsc::unbounded_channel();
        (
            Arc::new(Self {
                detector,
                scene,
                speech,
                tracker: Mutex::new(tracker),
                states: Mutex::new([AnalyzerState::Cold; 4]),
                faults_tx,
            }),
            faults_rx,
        )
    }

    /// Drive every engine Cold -> Warming. A fatal init failure lands the
    /// engine in terminal Dead and is reported once on the fault channel.
    pub async fn warm_up(&self) {
        self.set_state(Modality::Detector, AnalyzerState::Warming);
        self.set_state(Modality::Scene, AnalyzerState::Warming);
        self.set_state(Modality::Speech, AnalyzerState::Warming);
        // The tracker has no model to load.
        self.set_state(Modality::Tracker, AnalyzerState::Ready);

        if let Err(e) = self.detector.warm_up().await {
            self.kill(Modality::Detector, &e);
        }
        if let Err(e) = self.scene.warm_up().await {
            self.kill(Modality::Scene, &e);
        }
        if let Err(e) = self.speech.warm_up().await {
            self.kill(Modality::Speech, &e);
        }
        info!("analyzer warm-up complete");
    }

    fn kill(&self, modality: Modality, error: &anyhow::Error) {
        error!("{:?} analyzer failed to initialize: {}", modality, error);
        self.set_state(modality, AnalyzerState::Dead);
        let _ = self.faults_tx.send(AnalyzerFault {
            modality,
            error: error.to_string(),
        });
    }

    pub fn state(&self, modality: Modality) -> AnalyzerState {
        self.states.lock()[modality.index()]
    }

    fn set_state(&self, modality: Modality, state: AnalyzerState) {
        self.states.lock()[modality.index()] = state;
    }

    /// First successful call moves Warming -> Ready. Dead is terminal.
    pub fn mark_ready(&self, modality: Modality) {
        let mut states = self.states.lock();
        let slot = &mut states[modality.index()];
        if matches!(*slot, AnalyzerState::Cold | AnalyzerState::Warming) {
            *slot = AnalyzerState::Ready;
        }
    }

    pub fn is_dead(&self, modality: Modality) -> bool {
        self.state(modality) == AnalyzerState::Dead
    }
}
