pub mod advisory;
pub mod generator;
pub mod profile;
pub mod regime;
pub mod scoring;

pub use advisory::HttpAdvisoryClient;
pub use generator::SignalGenerator;
pub use profile::{ProfileFileConfig, StrategyProfile};
pub use regime::{base_threshold, classify_regime, regime_adjustment};
pub use scoring::{score, ScoredCandidate};
