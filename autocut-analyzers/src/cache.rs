//! The observation cache: `camId -> latest observations`, written by
//! analyzer workers and read by the ranker. Records are immutable once
//! published; writers build a fresh record and swap it in, so readers never
//! see a half-updated camera.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use autocut_core::{CamId, Detection, SceneDescription, SpeechSegment, Track};

#[derive(Debug, Clone, Default)]
pub struct CamObservations {
    pub cam_id: CamId,
    /// Tick timestamp of the last update.
    pub ts: f64,
    pub frame_ts: Option<f64>,
    pub frame_size: Option<(u32, u32)>,
    /// `None` means the detector was unavailable this tick, which is not the
    /// same as an empty detection list.
    pub detections: Option<Vec<Detection>>,
    pub tracks: Option<Vec<Track>>,
    pub main_subject: Option<u64>,
    /// Carried forward between scene-describer calls.
    pub scene: Option<SceneDescription>,
    pub scene_ts: Option<f64>,
    pub speech: Option<Vec<SpeechSegment>>,
    pub speech_ts: Option<f64>,
    pub degraded: bool,
}

impl CamObservations {
    /// Start this tick's record from the previous one: per-tick slots reset,
    /// slow-cadence results (scene, speech) carry until refreshed.
    pub fn next_tick(prev: Option<&CamObservations>, cam_id: &str, ts: f64) -> Self {
        let mut rec = Self {
            cam_id: cam_id.to_string(),
            ts,
            ..Default::default()
        };
        if let Some(prev) = prev {
            rec.scene = prev.scene.clone();
            rec.scene_ts = prev.scene_ts;
            rec.speech = prev.speech.clone();
            rec.speech_ts = prev.speech_ts;
            rec.frame_size = prev.frame_size;
        }
        rec
    }

    pub fn latest_speech_end(&self) -> Option<f64> {
        self.speech
            .as_ref()?
            .iter()
            .map(|s| s.end_ts)
            .fold(None, |acc, ts| Some(acc.map_or(ts, |a: f64| a.max(ts))))
    }
}

#[derive(Default)]
pub struct ObservationCache {
    inner: RwLock<HashMap<CamId, Arc<CamObservations>>>,
    malformed: AtomicU64,
}

impl ObservationCache {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn get(&self, cam_id: &str) -> Option<Arc<CamObservations>> {
        self.inner.read().get(cam_id).cloned()
    }

    pub fn snapshot(&self) -> Vec<Arc<CamObservations>> {
        self.inner.read().values().cloned().collect()
    }

    /// Swap in a record, unless a newer tick already landed for that cam
    /// while this one's analysis was still in flight.
    pub fn upsert(&self, record: CamObservations) {
        let mut inner = self.inner.write();
        if let Some(existing) = inner.get(&record.cam_id) {
            if existing.ts > record.ts {
                return;
            }
        }
        inner.insert(record.cam_id.clone(), Arc::new(record));
    }

    pub fn remove(&self, cam_id: &str) {
        self.inner.write().remove(cam_id);
    }

    /// Drop cameras whose last update is older than the staleness window.
    pub fn prune_stale(&self, now: f64, window_sec: f64) -> Vec<CamId> {
        let mut removed = Vec::new();
        self.inner.write().retain(|cam_id, rec| {
            if now - rec.ts > window_sec {
                removed.push(cam_id.clone());
                false
            } else {
                true
            }
        });
        removed
    }

    pub fn count_malformed(&self) {
        self.malformed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn malformed_total(&self) -> u64 {
        self.malformed.load(Ordering::Relaxed)
    }
}
