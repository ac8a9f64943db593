//! The sampler: one logical clock at the analysis rate driving every
//! analyzer call. Frames are pulled, never pushed, so a slow tick drops
//! stale frames instead of queueing them.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Semaphore};
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, info, warn};

use autocut_core::{now_ts, AnalyzerDeadlines, AudioChunk, Frame};
use autocut_ingress::{CameraEvent, Ingress};

use crate::cache::{CamObservations, ObservationCache};
use crate::detector::validate_detections;
use crate::registry::{AnalyzerRegistry, Modality};
use crate::traits::{is_unavailable, FrameMeta};

#[derive(Debug, Clone)]
pub struct SamplerConfig {
    pub analysis_rate_hz: f64,
    pub scene_interval_ms: u64,
    pub audio_window_sec: f64,
    /// Transcription cadence; windows overlap by `window - hop`.
    pub audio_hop_sec: f64,
    pub deadlines: AnalyzerDeadlines,
    /// Upper bound on concurrent analyzer calls.
    pub max_parallel: usize,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            analysis_rate_hz: 10.0,
            scene_interval_ms: 700,
            audio_window_sec: 1.0,
            audio_hop_sec: 0.5,
            deadlines: AnalyzerDeadlines::default(),
            max_parallel: 8,
        }
    }
}

pub struct Sampler {
    ingress: Arc<Ingress>,
    registry: Arc<AnalyzerRegistry>,
    cache: Arc<ObservationCache>,
    cfg: SamplerConfig,
    semaphore: Arc<Semaphore>,
}

impl Sampler {
    pub fn new(
        ingress: Arc<Ingress>,
        registry: Arc<AnalyzerRegistry>,
        cache: Arc<ObservationCache>,
        cfg: SamplerConfig,
    ) -> Arc<Self> {
        let permits = cfg.max_parallel.max(1);
        Arc::new(Self {
            ingress,
            registry,
            cache,
            cfg,
            semaphore: Arc::new(Semaphore::new(permits)),
        })
    }

    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let period = Duration::from_secs_f64(1.0 / self.cfg.analysis_rate_hz);
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut camera_events = self.ingress.camera_events();

        info!(
            "sampler running at {:.1} Hz, {} analyzer permits",
            self.cfg.analysis_rate_hz,
            self.cfg.max_parallel.max(1)
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => self.tick(),
                event = camera_events.recv() => {
                    if let Ok(CameraEvent::Left(cam_id)) = event {
                        self.cache.remove(&cam_id);
                        self.registry.tracker.lock().forget(&cam_id);
                        debug!("cleared analyzer state for departed {}", cam_id);
                    }
                }
                _ = shutdown.changed() => {
                    info!("sampler shutting down");
                    return;
                }
            }
        }
    }

    fn tick(self: &Arc<Self>) {
        let now = now_ts();
        for cam_id in self.ingress.live_cams() {
            if self.ingress.is_degraded(&cam_id) {
                let mut rec =
                    CamObservations::next_tick(self.cache.get(&cam_id).as_deref(), &cam_id, now);
                rec.degraded = true;
                self.cache.upsert(rec);
                continue;
            }
            let frame = self.ingress.sample(&cam_id);
            let audio = self.ingress.audio_window(&cam_id, self.cfg.audio_window_sec);
            if frame.is_none() && audio.is_none() {
                // Nothing new: the record keeps its old timestamp and the
                // camera ages toward the staleness window.
                continue;
            }

            // Back-pressure by dropping: if the pool is saturated, this
            // camera simply skips the tick and catches the next frame.
            let permit = match Arc::clone(&self.semaphore).try_acquire_owned() {
                Ok(permit) => permit,
                Err(_) => {
                    debug!("analyzer pool saturated, dropping tick for {}", cam_id);
                    continue;
                }
            };

            let this = Arc::clone(self);
            tokio::spawn(async move {
                this.analyze_cam(cam_id, frame, audio, now).await;
                drop(permit);
            });
        }
    }

    async fn analyze_cam(
        &self,
        cam_id: String,
        frame: Option<Frame>,
        audio: Option<AudioChunk>,
        now: f64,
    ) {
        let mut rec = CamObservations::next_tick(self.cache.get(&cam_id).as_deref(), &cam_id, now);

        if let Some(frame) = &frame {
            rec.frame_ts = Some(frame.ts);
            rec.frame_size = Some((frame.width, frame.height));
            self.run_vision(frame, &mut rec, now).await;
        }

        if let Some(audio) = &audio {
            self.run_speech(audio, &mut rec, now).await;
        }

        self.cache.upsert(rec);
    }

    async fn run_vision(&self, frame: &Frame, rec: &mut CamObservations, now: f64) {
        if !self.registry.is_dead(Modality::Detector) {
            let deadline = Duration::from_millis(self.cfg.deadlines.detector_ms);
            match timeout(deadline, self.registry.detector.detect(frame)).await {
                Ok(Ok(detections)) => {
                    if validate_detections(&detections) {
                        self.registry.mark_ready(Modality::Detector);
                        let meta = FrameMeta {
                            ts: frame.ts,
                            width: frame.width,
                            height: frame.height,
                        };
                        let (tracks, main_subject) = {
                            let mut tracker = self.registry.tracker.lock();
                            let tracks = tracker.update(&frame.cam_id, &detections, meta);
                            (tracks, tracker.main_subject(&frame.cam_id))
                        };
                        rec.detections = Some(detections);
                        rec.tracks = Some(tracks);
                        rec.main_subject = main_subject;
                    } else {
                        self.cache.count_malformed();
                        warn!("malformed detections dropped for {}", frame.cam_id);
                    }
                }
                Ok(Err(e)) if is_unavailable(&e) => {
                    debug!("detector unavailable for {}: {}", frame.cam_id, e)
                }
                Ok(Err(e)) => warn!("detector error for {}: {}", frame.cam_id, e),
                Err(_) => debug!("detector deadline expired for {}", frame.cam_id),
            }
        }

        let scene_due = rec
            .scene_ts
            .map_or(true, |ts| (now - ts) * 1000.0 >= self.cfg.scene_interval_ms as f64);
        if scene_due && !self.registry.is_dead(Modality::Scene) {
            let deadline = Duration::from_millis(self.cfg.deadlines.scene_ms);
            let detections = rec.detections.clone().unwrap_or_default();
            match timeout(deadline, self.registry.scene.describe(frame, &detections)).await {
                Ok(Ok(scene)) => {
                    self.registry.mark_ready(Modality::Scene);
                    rec.scene = Some(scene);
                    rec.scene_ts = Some(now);
                }
                Ok(Err(e)) if is_unavailable(&e) => {
                    debug!("scene unavailable for {}: {}", frame.cam_id, e)
                }
                Ok(Err(e)) => warn!("scene error for {}: {}", frame.cam_id, e),
                Err(_) => debug!("scene deadline expired for {}", frame.cam_id),
            }
        }
    }

    async fn run_speech(&self, audio: &AudioChunk, rec: &mut CamObservations, now: f64) {
        if self.registry.is_dead(Modality::Speech) {
            return;
        }
        // Overlapping windows at the hop cadence, not every tick.
        let due = rec
            .speech_ts
            .map_or(true, |ts| now - ts >= self.cfg.audio_hop_sec);
        if !due {
            return;
        }
        let deadline = Duration::from_millis(self.cfg.deadlines.speech_ms);
        match timeout(deadline, self.registry.speech.transcribe(audio)).await {
            Ok(Ok(segments)) => {
                self.registry.mark_ready(Modality::Speech);
                rec.speech = Some(segments);
                rec.speech_ts = Some(now);
            }
            Ok(Err(e)) if is_unavailable(&e) => {
                debug!("asr unavailable for {}: {}", audio.cam_id, e)
            }
            Ok(Err(e)) => warn!("asr error for {}: {}", audio.cam_id, e),
            Err(_) => debug!("asr deadline expired for {}", audio.cam_id),
        }
    }
}
