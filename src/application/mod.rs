//! Application layer: price cache, detectors and the engine that ties them.

pub mod cache;
pub mod detector;
pub mod engine;

pub use cache::PriceCache;
pub use detector::{FeeSchedule, Thresholds};
pub use engine::{DetectionEngine, EngineCounters, EngineStatistics};
