//! The SFU capability the core consumes. The concrete transport (WebRTC or
//! otherwise) lives behind these traits; the core only ever sees raw frames
//! and raw audio tagged with a participant identity.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngressError {
    /// The SFU refused the subscribe-only grant or the session is down.
    #[error("ingress unavailable: {0}")]
    Unavailable(String),
    #[error("unknown participant: {0}")]
    UnknownParticipant(String),
    #[error("track subscribe failed for {identity}: {reason}")]
    Subscribe { identity: String, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackKind {
    Video,
    Audio,
}

/// Room membership changes, delivered in join order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomEvent {
    ParticipantJoined { identity: String },
    ParticipantLeft { identity: String },
}

/// Raw video pixels as the transport hands them over. Planes are u16 so
/// high-bit-depth sources pass through unmangled until canonicalization.
#[derive(Debug, Clone)]
pub enum RawPixels {
    /// Tightly packed 8-bit RGB.
    Rgb8(Vec<u8>),
    /// Planar YUV 4:2:0, limited range, BT.709 primaries assumed.
    I420 {
        y: Vec<u16>,
        u: Vec<u16>,
        v: Vec<u16>,
        bit_depth: u8,
    },
}

#[derive(Debug, Clone)]
pub struct RawFrame {
    pub width: u32,
    pub height: u32,
    pub ts: f64,
    pub pixels: RawPixels,
}

#[derive(Debug, Clone)]
pub struct RawAudio {
    pub sample_rate: u32,
    pub channels: u16,
    /// Interleaved f32 samples.
    pub samples: Vec<f32>,
    pub ts: f64,
}

#[derive(Debug, Clone)]
pub enum TrackPacket {
    Video(RawFrame),
    Audio(RawAudio),
}

/// One subscribed remote track.
#[async_trait]
pub trait MediaTrack: Send {
    /// Next packet, or `None` once the publisher is gone.
    async fn next(&mut self) -> Option<TrackPacket>;
}

/// A connected room session with a subscribe-only grant.
#[async_trait]
pub trait RoomSession: Send + Sync {
    /// Next membership event, or `None` when the session closed.
    async fn next_event(&self) -> Option<RoomEvent>;

    async fn subscribe(
        &self,
        identity: &str,
        kind: TrackKind,
    ) -> Result<Box<dyn MediaTrack>, IngressError>;
}

#[async_trait]
pub trait MediaRoom: Send + Sync + 'static {
    async fn connect(&self, url: &str, token: &str)
        -> Result<Box<dyn RoomSession>, IngressError>;
}
