//! The ingress adapter: a hidden, subscribe-only participant that turns
//! remote camera tracks into per-cam latest-frame slots and audio rings.
//!
//! Back-pressure is achieved by dropping: only the newest frame is kept per
//! camera, so the analyzer tier always sees current content no matter how
//! far behind it runs.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use rand::Rng;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use autocut_core::{is_camera_identity, AudioChunk, CamId, Frame};

use crate::convert::{canonical_audio, canonical_frame, AUDIO_SAMPLE_RATE};
use crate::room::{IngressError, MediaRoom, RoomEvent, RoomSession, TrackKind, TrackPacket};

#[derive(Debug, Clone)]
pub struct IngressConfig {
    pub camera_prefix: String,
    pub max_cameras: usize,
    /// Audio ring capacity in seconds.
    pub audio_buffer_secs: f64,
    pub backoff_base_ms: u64,
    pub backoff_cap_secs: u64,
    /// Consecutive subscribe failures before a camera is marked degraded.
    pub max_subscribe_failures: u32,
}

impl Default for IngressConfig {
    fn default() -> Self {
        Self {
            camera_prefix: autocut_core::DEFAULT_CAMERA_PREFIX.to_string(),
            max_cameras: 12,
            audio_buffer_secs: 4.0,
            backoff_base_ms: 500,
            backoff_cap_secs: 30,
            max_subscribe_failures: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CameraEvent {
    Joined(CamId),
    Left(CamId),
}

#[derive(Debug, Clone)]
pub struct IngressHealth {
    pub connected: bool,
    pub cameras: usize,
    pub degraded: Vec<CamId>,
}

struct AudioRing {
    samples: VecDeque<i16>,
    capacity: usize,
    last_ts: f64,
}

impl AudioRing {
    fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
            last_ts: 0.0,
        }
    }

    fn push(&mut self, pcm: &[i16], ts: f64) {
        self.samples.extend(pcm.iter().copied());
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
        self.last_ts = ts;
    }

    fn window(&self, window_sec: f64) -> Option<(Vec<i16>, f64)> {
        if self.samples.is_empty() {
            return None;
        }
        let wanted = ((window_sec * AUDIO_SAMPLE_RATE as f64) as usize).max(1);
        let take = wanted.min(self.samples.len());
        let start = self.samples.len() - take;
        Some((self.samples.iter().skip(start).copied().collect(), self.last_ts))
    }
}

struct CamState {
    cam_id: CamId,
    latest: Mutex<Option<Frame>>,
    last_sample_ts: Mutex<f64>,
    audio: Mutex<AudioRing>,
    degraded: AtomicBool,
    gone: AtomicBool,
}

impl CamState {
    fn new(cam_id: CamId, audio_capacity: usize) -> Self {
        Self {
            cam_id,
            latest: Mutex::new(None),
            last_sample_ts: Mutex::new(f64::MIN),
            audio: Mutex::new(AudioRing::new(audio_capacity)),
            degraded: AtomicBool::new(false),
            gone: AtomicBool::new(false),
        }
    }

    fn gone(&self) -> bool {
        self.gone.load(Ordering::Acquire)
    }
}

/// The C1 adapter. Created once, started once (idempotently), shared by
/// handle with the sampler and the server.
pub struct Ingress {
    cfg: IngressConfig,
    cams: RwLock<HashMap<CamId, Arc<CamState>>>,
    events_tx: broadcast::Sender<CameraEvent>,
    started: AtomicBool,
    connected: AtomicBool,
}

impl Ingress {
    pub fn new(cfg: IngressConfig) -> Arc<Self> {
        let (events_tx, _) = broadcast::channel(64);
        Arc::new(Self {
            cfg,
            cams: RwLock::new(HashMap::new()),
            events_tx,
            started: AtomicBool::new(false),
            connected: AtomicBool::new(false),
        })
    }

    /// Connect and start consuming the room. Idempotent: a second call on a
    /// running ingress is a no-op. Fails with `IngressError::Unavailable`
    /// when the SFU refuses the subscribe-only grant.
    pub async fn start(
        self: &Arc<Self>,
        room: Arc<dyn MediaRoom>,
        url: &str,
        token: &str,
    ) -> Result<(), IngressError> {
        if self.started.swap(true, Ordering::SeqCst) {
            debug!("ingress already started");
            return Ok(());
        }
        let session = match room.connect(url, token).await {
            Ok(session) => session,
            Err(e) => {
                self.started.store(false, Ordering::SeqCst);
                return Err(e);
            }
        };
        self.connected.store(true, Ordering::SeqCst);
        info!("ingress connected to room at {}", url);

        let this = Arc::clone(self);
        tokio::spawn(async move {
            this.run_session(Arc::from(session)).await;
        });
        Ok(())
    }

    async fn run_session(self: Arc<Self>, session: Arc<dyn RoomSession>) {
        while let Some(event) = session.next_event().await {
            match event {
                RoomEvent::ParticipantJoined { identity } => {
                    self.handle_join(&identity, &session);
                }
                RoomEvent::ParticipantLeft { identity } => {
                    self.handle_leave(&identity);
                }
            }
        }
        info!("room session closed");
        self.connected.store(false, Ordering::SeqCst);
    }

    fn handle_join(self: &Arc<Self>, identity: &str, session: &Arc<dyn RoomSession>) {
        if !is_camera_identity(identity, &self.cfg.camera_prefix) {
            debug!("ignoring non-camera participant {}", identity);
            return;
        }
        let mut cams = self.cams.write();
        if cams.contains_key(identity) {
            return;
        }
        if cams.len() >= self.cfg.max_cameras {
            warn!(
                "camera {} ignored: at capacity ({} cams)",
                identity, self.cfg.max_cameras
            );
            return;
        }
        let audio_capacity = (self.cfg.audio_buffer_secs * AUDIO_SAMPLE_RATE as f64) as usize;
        let cam = Arc::new(CamState::new(identity.to_string(), audio_capacity));
        cams.insert(identity.to_string(), Arc::clone(&cam));
        drop(cams);

        info!("camera joined: {}", identity);
        let _ = self.events_tx.send(CameraEvent::Joined(identity.to_string()));

        for kind in [TrackKind::Video, TrackKind::Audio] {
            let this = Arc::clone(self);
            let session = Arc::clone(session);
            let cam = Arc::clone(&cam);
            tokio::spawn(async move {
                this.pump_track(session, cam, kind).await;
            });
        }
    }

    fn handle_leave(&self, identity: &str) {
        let removed = self.cams.write().remove(identity);
        if let Some(cam) = removed {
            // Pumps check this flag before every write, so no observation can
            // be tagged with a cam that has already left.
            cam.gone.store(true, Ordering::Release);
            info!("camera left: {}", identity);
            let _ = self.events_tx.send(CameraEvent::Left(identity.to_string()));
        }
    }

    async fn pump_track(
        self: Arc<Self>,
        session: Arc<dyn RoomSession>,
        cam: Arc<CamState>,
        kind: TrackKind,
    ) {
        let mut failures: u32 = 0;
        loop {
            if cam.gone() {
                return;
            }
            match session.subscribe(&cam.cam_id, kind).await {
                Ok(mut track) => {
                    failures = 0;
                    cam.degraded.store(false, Ordering::Release);
                    while let Some(packet) = track.next().await {
                        if cam.gone() {
                            return;
                        }
                        match packet {
                            TrackPacket::Video(raw) => {
                                if let Some(frame) = canonical_frame(&cam.cam_id, &raw) {
                                    *cam.latest.lock() = Some(frame);
                                }
                            }
                            TrackPacket::Audio(raw) => {
                                let pcm =
                                    canonical_audio(&raw.samples, raw.channels, raw.sample_rate);
                                cam.audio.lock().push(&pcm, raw.ts);
                            }
                        }
                    }
                    if cam.gone() {
                        return;
                    }
                    debug!("track ended for {} ({:?}), resubscribing", cam.cam_id, kind);
                }
                Err(e) => {
                    failures += 1;
                    warn!(
                        "subscribe failed for {} ({:?}), attempt {}: {}",
                        cam.cam_id, kind, failures, e
                    );
                    if failures >= self.cfg.max_subscribe_failures {
                        cam.degraded.store(true, Ordering::Release);
                    }
                }
            }
            tokio::time::sleep(self.backoff(failures)).await;
        }
    }

    /// Exponential backoff with jitter, capped. Zero failures (a clean track
    /// end) gets a short fixed delay before resubscribing.
    fn backoff(&self, failures: u32) -> Duration {
        if failures == 0 {
            return Duration::from_millis(200);
        }
        let exp = self.cfg.backoff_base_ms.saturating_mul(1u64 << (failures - 1).min(16));
        let capped = exp.min(self.cfg.backoff_cap_secs * 1000);
        let jitter = rand::thread_rng().gen_range(0..250u64);
        Duration::from_millis(capped + jitter)
    }

    /// Newest frame for `cam_id` if one arrived since the last sample.
    /// Never blocks waiting for a new frame.
    pub fn sample(&self, cam_id: &str) -> Option<Frame> {
        let cam = self.cams.read().get(cam_id).cloned()?;
        if cam.degraded.load(Ordering::Acquire) {
            return None;
        }
        let latest = cam.latest.lock().clone()?;
        let mut last = cam.last_sample_ts.lock();
        if latest.ts > *last {
            *last = latest.ts;
            Some(latest)
        } else {
            None
        }
    }

    /// The most recent `window_sec` of canonical PCM for `cam_id`.
    pub fn audio_window(&self, cam_id: &str, window_sec: f64) -> Option<AudioChunk> {
        let cam = self.cams.read().get(cam_id).cloned()?;
        if cam.degraded.load(Ordering::Acquire) {
            return None;
        }
        let (samples, ts) = cam.audio.lock().window(window_sec)?;
        Some(AudioChunk {
            cam_id: cam_id.to_string(),
            ts,
            sample_rate: AUDIO_SAMPLE_RATE,
            samples: Arc::new(samples),
        })
    }

    /// Cameras currently in the model: those that have delivered at least one
    /// frame, plus degraded ones (they keep their slot and score zero).
    pub fn live_cams(&self) -> Vec<CamId> {
        self.cams
            .read()
            .values()
            .filter(|c| c.latest.lock().is_some() || c.degraded.load(Ordering::Acquire))
            .map(|c| c.cam_id.clone())
            .collect()
    }

    pub fn is_degraded(&self, cam_id: &str) -> bool {
        self.cams
            .read()
            .get(cam_id)
            .is_some_and(|c| c.degraded.load(Ordering::Acquire))
    }

    /// Join/leave notifications in join order.
    pub fn camera_events(&self) -> broadcast::Receiver<CameraEvent> {
        self.events_tx.subscribe()
    }

    pub fn health(&self) -> IngressHealth {
        let cams = self.cams.read();
        IngressHealth {
            connected: self.connected.load(Ordering::Acquire),
            cameras: cams.len(),
            degraded: cams
                .values()
                .filter(|c| c.degraded.load(Ordering::Acquire))
                .map(|c| c.cam_id.clone())
                .collect(),
        }
    }
}
