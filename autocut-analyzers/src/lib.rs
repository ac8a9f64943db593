pub mod cache;
pub mod detector;
pub mod disabled;
pub mod mock;
pub mod registry;
pub mod scene;
pub mod scheduler;
pub mod speech;
pub mod tracker;
pub mod traits;

pub use cache::{CamObservations, ObservationCache};
pub use detector::{HttpDetector, HttpDetectorConfig};
pub use disabled::{DisabledDetector, DisabledSceneDescriber, DisabledSpeechRecognizer};
pub use mock::{MockDetector, MockSceneDescriber, MockSpeechRecognizer};
pub use registry::{AnalyzerFault, AnalyzerRegistry, Modality};
pub use scene::{HttpSceneDescriber, HttpSceneDescriberConfig};
pub use scheduler::{Sampler, SamplerConfig};
pub use speech::{EnergySpeechRecognizer, HttpSpeechRecognizer, HttpSpeechRecognizerConfig};
pub use tracker::{CentroidTracker, TrackerConfig};
pub use traits::{
    is_unavailable, AnalyzerState, Detector, FrameMeta, SceneDescriber, SpeechRecognizer, Tracker,
    Unavailable,
};
