//! Analyzer capability interfaces. Concrete engines are wired through the
//! registry at startup, so the rest of the pipeline never names an
//! implementation.
//!
//! Analyzers are pure functions modulo internal model state: they never read
//! the bus and never touch program state.

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;

use autocut_core::{AudioChunk, Detection, Frame, SceneDescription, SpeechSegment, Track};

/// Returned (wrapped in anyhow) when an analyzer cannot serve a call right
/// now: model warming up, transient OOM, backend down. The ranker treats the
/// slot as absent, never as zero.
#[derive(Debug, Clone, Error)]
#[error("analyzer unavailable: {reason}")]
pub struct Unavailable {
    pub reason: String,
}

impl Unavailable {
    pub fn new(reason: impl Into<String>) -> anyhow::Error {
        anyhow::Error::new(Self {
            reason: reason.into(),
        })
    }
}

pub fn is_unavailable(err: &anyhow::Error) -> bool {
    err.downcast_ref::<Unavailable>().is_some()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalyzerState {
    Cold,
    Warming,
    Ready,
    /// Fatal init failure; reported once through the fault channel.
    Dead,
}

#[derive(Debug, Clone, Copy)]
pub struct FrameMeta {
    pub ts: f64,
    pub width: u32,
    pub height: u32,
}

#[async_trait]
pub trait Detector: Send + Sync {
    /// One-time model load. Default is a no-op for engines with nothing to
    /// warm.
    async fn warm_up(&self) -> Result<()> {
        Ok(())
    }

    async fn detect(&self, frame: &Frame) -> Result<Vec<Detection>>;
}

/// Per-camera multi-object tracking. Track ids survive across consecutive
/// frames of the same camera only; the registry owns one tracker for all
/// cams and it is called under a lock.
pub trait Tracker: Send {
    fn update(&mut self, cam_id: &str, detections: &[Detection], meta: FrameMeta) -> Vec<Track>;

    /// The camera's lead subject: longest-lived track seen within the last
    /// 30 ticks, nearest the frame center, ties broken by bbox area.
    fn main_subject(&self, cam_id: &str) -> Option<u64>;

    /// Drop all state for a camera that left.
    fn forget(&mut self, cam_id: &str);
}

#[async_trait]
pub trait SceneDescriber: Send + Sync {
    async fn warm_up(&self) -> Result<()> {
        Ok(())
    }

    /// Expensive; called at a lower cadence than detection.
    async fn describe(&self, frame: &Frame, detections: &[Detection]) -> Result<SceneDescription>;
}

#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    async fn warm_up(&self) -> Result<()> {
        Ok(())
    }

    /// Empty output means the window held no speech; that is a valid
    /// observation, distinct from `Unavailable`.
    async fn transcribe(&self, audio: &AudioChunk) -> Result<Vec<SpeechSegment>>;
}
