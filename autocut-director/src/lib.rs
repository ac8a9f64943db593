pub mod engine;
pub mod features;
pub mod ranker;
pub mod scorer;
pub mod state;

pub use engine::DecisionEngine;
pub use features::{FeatureContext, FeatureSet, SubjectKey, SubjectSighting};
pub use ranker::{Ranker, RankerConfig};
pub use scorer::{Scorer, WeightedSum};
pub use state::{EngineCommand, EngineMode, ProgramShared};
