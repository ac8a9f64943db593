//! Deterministic analyzer implementations for tests and for running the
//! pipeline without external model services.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;

use autocut_core::{AudioChunk, Detection, Frame, SceneDescription, SpeechSegment};

use crate::traits::{Detector, SceneDescriber, SpeechRecognizer, Unavailable};

#[derive(Default)]
pub struct MockDetector {
    response: Mutex<Vec<Detection>>,
    unavailable: AtomicBool,
    warm_up_fails: AtomicBool,
    delay: Mutex<Option<Duration>>,
    pub calls: AtomicU64,
}

impl MockDetector {
    pub fn set_detections(&self, detections: Vec<Detection>) {
        *self.response.lock() = detections;
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock() = delay;
    }

    pub fn fail_warm_up(&self) {
        self.warm_up_fails.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl Detector for MockDetector {
    async fn warm_up(&self) -> Result<()> {
        if self.warm_up_fails.load(Ordering::SeqCst) {
            anyhow::bail!("model file missing");
        }
        Ok(())
    }

    async fn detect(&self, _frame: &Frame) -> Result<Vec<Detection>> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(Unavailable::new("mock detector unavailable"));
        }
        Ok(self.response.lock().clone())
    }
}

pub struct MockSceneDescriber {
    response: Mutex<SceneDescription>,
    unavailable: AtomicBool,
    delay: Mutex<Option<Duration>>,
    pub calls: AtomicU64,
}

impl Default for MockSceneDescriber {
    fn default() -> Self {
        Self {
            response: Mutex::new(SceneDescription {
                tags: vec![],
                caption: String::new(),
                interest: 1.0,
                confidence: 0.5,
            }),
            unavailable: AtomicBool::new(false),
            delay: Mutex::new(None),
            calls: AtomicU64::new(0),
        }
    }
}

impl MockSceneDescriber {
    pub fn set_scene(&self, scene: SceneDescription) {
        *self.response.lock() = scene;
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock() = delay;
    }
}

#[async_trait]
impl SceneDescriber for MockSceneDescriber {
    async fn describe(&self, _frame: &Frame, _detections: &[Detection]) -> Result<SceneDescription> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(Unavailable::new("mock scene unavailable"));
        }
        Ok(self.response.lock().clone())
    }
}

#[derive(Default)]
pub struct MockSpeechRecognizer {
    response: Mutex<Vec<SpeechSegment>>,
    unavailable: AtomicBool,
    pub calls: AtomicU64,
}

impl MockSpeechRecognizer {
    pub fn set_segments(&self, segments: Vec<SpeechSegment>) {
        *self.response.lock() = segments;
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

#[async_trait]
impl SpeechRecognizer for MockSpeechRecognizer {
    async fn transcribe(&self, _audio: &AudioChunk) -> Result<Vec<SpeechSegment>> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(Unavailable::new("mock asr unavailable"));
        }
        Ok(self.response.lock().clone())
    }
}
