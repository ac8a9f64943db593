pub mod orchestrator;
pub mod template;
pub mod tts;

pub use orchestrator::{Narrator, NarratorConfig};
pub use template::{compose, TemplateBranch};
pub use tts::{HttpTtsConfig, HttpTtsEngine, SilenceTts, TtsAudio, TtsEngine};
