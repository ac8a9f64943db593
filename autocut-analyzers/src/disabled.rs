//! Permanently-unavailable engines for modalities with no backend
//! configured. Their slots stay absent, so the scorer redistributes the
//! weight instead of zeroing the camera.

use anyhow::Result;
use async_trait::async_trait;

use autocut_core::{AudioChunk, Detection, Frame, SceneDescription, SpeechSegment};

use crate::traits::{Detector, SceneDescriber, SpeechRecognizer, Unavailable};

pub struct DisabledDetector;

#[async_trait]
impl Detector for DisabledDetector {
    async fn detect(&self, _frame: &Frame) -> Result<Vec<Detection>> {
        Err(Unavailable::new("no detector backend configured"))
    }
}

pub struct DisabledSceneDescriber;

#[async_trait]
impl SceneDescriber for DisabledSceneDescriber {
    async fn describe(
        &self,
        _frame: &Frame,
        _detections: &[Detection],
    ) -> Result<SceneDescription> {
        Err(Unavailable::new("no scene backend configured"))
    }
}

pub struct DisabledSpeechRecognizer;

#[async_trait]
impl SpeechRecognizer for DisabledSpeechRecognizer {
    async fn transcribe(&self, _audio: &AudioChunk) -> Result<Vec<SpeechSegment>> {
        Err(Unavailable::new("no asr backend configured"))
    }
}
