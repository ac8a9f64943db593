pub mod convert;
pub mod room;
pub mod session;
pub mod sim;

pub use convert::{ANALYSIS_HEIGHT, ANALYSIS_WIDTH, AUDIO_SAMPLE_RATE};
pub use room::{
    IngressError, MediaRoom, MediaTrack, RawAudio, RawFrame, RawPixels, RoomEvent, RoomSession,
    TrackKind, TrackPacket,
};
pub use session::{CameraEvent, Ingress, IngressConfig, IngressHealth};
pub use sim::{ScriptedHandle, ScriptedRoom, SimRoom};
