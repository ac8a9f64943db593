//! In-process rooms: a scripted room for tests and a synthetic room for
//! running the whole pipeline without an SFU.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::room::{
    IngressError, MediaRoom, MediaTrack, RawAudio, RawFrame, RawPixels, RoomEvent, RoomSession,
    TrackKind, TrackPacket,
};

type TrackReceiver = mpsc::UnboundedReceiver<TrackPacket>;

#[derive(Default)]
struct ScriptedShared {
    /// (identity, kind) -> sender feeding the subscribed track.
    senders: Mutex<HashMap<(String, TrackKind), mpsc::UnboundedSender<TrackPacket>>>,
    /// Receivers parked until `subscribe` picks them up.
    pending: Mutex<HashMap<(String, TrackKind), TrackReceiver>>,
    /// (identity, kind) -> remaining forced subscribe failures.
    fail_counts: Mutex<HashMap<(String, TrackKind), u32>>,
    /// When set, `connect` is refused.
    refuse_connect: Mutex<bool>,
}

/// Drives a [`ScriptedRoom`] from test code.
#[derive(Clone)]
pub struct ScriptedHandle {
    events_tx: mpsc::UnboundedSender<RoomEvent>,
    shared: Arc<ScriptedShared>,
}

impl ScriptedHandle {
    pub fn join(&self, identity: &str) {
        for kind in [TrackKind::Video, TrackKind::Audio] {
            let (tx, rx) = mpsc::unbounded_channel();
            self.shared
                .senders
                .lock()
                .insert((identity.to_string(), kind), tx);
            self.shared
                .pending
                .lock()
                .insert((identity.to_string(), kind), rx);
        }
        let _ = self.events_tx.send(RoomEvent::ParticipantJoined {
            identity: identity.to_string(),
        });
    }

    pub fn leave(&self, identity: &str) {
        let mut senders = self.shared.senders.lock();
        for kind in [TrackKind::Video, TrackKind::Audio] {
            senders.remove(&(identity.to_string(), kind));
        }
        let _ = self.events_tx.send(RoomEvent::ParticipantLeft {
            identity: identity.to_string(),
        });
    }

    pub fn push_frame(&self, identity: &str, frame: RawFrame) {
        if let Some(tx) = self
            .shared
            .senders
            .lock()
            .get(&(identity.to_string(), TrackKind::Video))
        {
            let _ = tx.send(TrackPacket::Video(frame));
        }
    }

    pub fn push_audio(&self, identity: &str, audio: RawAudio) {
        if let Some(tx) = self
            .shared
            .senders
            .lock()
            .get(&(identity.to_string(), TrackKind::Audio))
        {
            let _ = tx.send(TrackPacket::Audio(audio));
        }
    }

    /// Make the next `times` subscribe attempts for this track fail.
    pub fn fail_subscribes(&self, identity: &str, kind: TrackKind, times: u32) {
        self.shared
            .fail_counts
            .lock()
            .insert((identity.to_string(), kind), times);
    }

    pub fn refuse_connect(&self, refuse: bool) {
        *self.shared.refuse_connect.lock() = refuse;
    }

    /// A flat 8-bit RGB test frame.
    pub fn rgb_frame(width: u32, height: u32, ts: f64, luma: u8) -> RawFrame {
        RawFrame {
            width,
            height,
            ts,
            pixels: RawPixels::Rgb8(vec![luma; (width * height * 3) as usize]),
        }
    }

    /// A mono f32 tone window at the given amplitude.
    pub fn tone_audio(ts: f64, secs: f64, amplitude: f32) -> RawAudio {
        let rate = 16_000u32;
        let n = (secs * rate as f64) as usize;
        let samples = (0..n)
            .map(|i| amplitude * (i as f32 * 0.2).sin())
            .collect();
        RawAudio {
            sample_rate: rate,
            channels: 1,
            samples,
            ts,
        }
    }
}

/// A room driven entirely by test code through a [`ScriptedHandle`].
pub struct ScriptedRoom {
    shared: Arc<ScriptedShared>,
    events_rx: Mutex<Option<mpsc::UnboundedReceiver<RoomEvent>>>,
}

impl ScriptedRoom {
    pub fn new() -> (Arc<Self>, ScriptedHandle) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(ScriptedShared::default());
        let room = Arc::new(Self {
            shared: Arc::clone(&shared),
            events_rx: Mutex::new(Some(events_rx)),
        });
        (room, ScriptedHandle { events_tx, shared })
    }
}

#[async_trait]
impl MediaRoom for ScriptedRoom {
    async fn connect(
        &self,
        _url: &str,
        _token: &str,
    ) -> Result<Box<dyn RoomSession>, IngressError> {
        if *self.shared.refuse_connect.lock() {
            return Err(IngressError::Unavailable(
                "subscribe-only grant refused".into(),
            ));
        }
        let events_rx = self
            .events_rx
            .lock()
            .take()
            .ok_or_else(|| IngressError::Unavailable("already connected".into()))?;
        Ok(Box::new(ScriptedSession {
            shared: Arc::clone(&self.shared),
            events_rx: tokio::sync::Mutex::new(events_rx),
        }))
    }
}

struct ScriptedSession {
    shared: Arc<ScriptedShared>,
    events_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<RoomEvent>>,
}

#[async_trait]
impl RoomSession for ScriptedSession {
    async fn next_event(&self) -> Option<RoomEvent> {
        self.events_rx.lock().await.recv().await
    }

    async fn subscribe(
        &self,
        identity: &str,
        kind: TrackKind,
    ) -> Result<Box<dyn MediaTrack>, IngressError> {
        let key = (identity.to_string(), kind);
        {
            let mut fails = self.shared.fail_counts.lock();
            if let Some(remaining) = fails.get_mut(&key) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(IngressError::Subscribe {
                        identity: identity.to_string(),
                        reason: "scripted failure".into(),
                    });
                }
            }
        }
        let rx = self.shared.pending.lock().remove(&key).ok_or_else(|| {
            IngressError::UnknownParticipant(identity.to_string())
        })?;
        Ok(Box::new(ScriptedTrack { rx }))
    }
}

struct ScriptedTrack {
    rx: TrackReceiver,
}

#[async_trait]
impl MediaTrack for ScriptedTrack {
    async fn next(&mut self) -> Option<TrackPacket> {
        self.rx.recv().await
    }
}

/// A self-running synthetic room: N cameras publishing a moving test pattern
/// and tone-burst audio. Lets the full pipeline run without any SFU.
pub struct SimRoom {
    pub cameras: usize,
    pub fps: f64,
}

impl SimRoom {
    pub fn new(cameras: usize, fps: f64) -> Arc<Self> {
        Arc::new(Self { cameras, fps })
    }
}

#[async_trait]
impl MediaRoom for SimRoom {
    async fn connect(
        &self,
        _url: &str,
        _token: &str,
    ) -> Result<Box<dyn RoomSession>, IngressError> {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        for i in 0..self.cameras {
            let _ = events_tx.send(RoomEvent::ParticipantJoined {
                identity: format!("cam-sim-{}", i),
            });
        }
        Ok(Box::new(SimSession {
            fps: self.fps,
            events_rx: tokio::sync::Mutex::new(events_rx),
            // Keep the sender alive so the event stream stays open.
            _events_tx: events_tx,
        }))
    }
}

struct SimSession {
    fps: f64,
    events_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<RoomEvent>>,
    _events_tx: mpsc::UnboundedSender<RoomEvent>,
}

#[async_trait]
impl RoomSession for SimSession {
    async fn next_event(&self) -> Option<RoomEvent> {
        self.events_rx.lock().await.recv().await
    }

    async fn subscribe(
        &self,
        identity: &str,
        kind: TrackKind,
    ) -> Result<Box<dyn MediaTrack>, IngressError> {
        let seed = identity.bytes().map(u64::from).sum::<u64>();
        Ok(Box::new(SimTrack {
            kind,
            fps: self.fps,
            seed,
            tick: 0,
        }))
    }
}

struct SimTrack {
    kind: TrackKind,
    fps: f64,
    seed: u64,
    tick: u64,
}

#[async_trait]
impl MediaTrack for SimTrack {
    async fn next(&mut self) -> Option<TrackPacket> {
        self.tick += 1;
        match self.kind {
            TrackKind::Video => {
                tokio::time::sleep(std::time::Duration::from_secs_f64(1.0 / self.fps)).await;
                let (w, h) = (320u32, 180u32);
                let mut data = vec![40u8; (w * h * 3) as usize];
                // A bright box orbits the frame so motion and framing vary
                // per camera over time.
                let phase = (self.tick + self.seed * 7) as f32 * 0.1;
                let cx = ((phase.cos() * 0.3 + 0.5) * w as f32) as i32;
                let cy = ((phase.sin() * 0.3 + 0.5) * h as f32) as i32;
                for dy in -12i32..12 {
                    for dx in -12i32..12 {
                        let x = cx + dx;
                        let y = cy + dy;
                        if (0..w as i32).contains(&x) && (0..h as i32).contains(&y) {
                            let idx = ((y as u32 * w + x as u32) * 3) as usize;
                            data[idx..idx + 3].copy_from_slice(&[230, 230, 230]);
                        }
                    }
                }
                Some(TrackPacket::Video(RawFrame {
                    width: w,
                    height: h,
                    ts: autocut_core::now_ts(),
                    pixels: RawPixels::Rgb8(data),
                }))
            }
            TrackKind::Audio => {
                tokio::time::sleep(std::time::Duration::from_millis(250)).await;
                // Tone bursts: each camera "speaks" on its own cadence.
                let speaking = (self.tick + self.seed) % 16 < 8;
                let amplitude = if speaking { 0.4 } else { 0.005 };
                Some(TrackPacket::Audio(ScriptedHandle::tone_audio(
                    autocut_core::now_ts(),
                    0.25,
                    amplitude,
                )))
            }
        }
    }
}
