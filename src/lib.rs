//! Affect Sentinel - Multi-signal risk and dissonance assessment engine
//!
//! Sentinel fuses a user's spoken words, vocal affect, and personal
//! behavioral history into a single risk classification with an escalation
//! decision: sentiment classification → dissonance calculation → baseline
//! deviation scoring → risk aggregation.
//!
//! ## Components
//!
//! - **Sentiment Classifier**: transcript text → stated valence, with
//!   deflection-phrase override
//! - **Dissonance Calculator**: stated vs vocal valence plus micro-signals →
//!   gap score, truth resolution, interpretation
//! - **Baseline Manager**: per-user rolling feature statistics and deviation
//!   detection
//! - **Risk Aggregator**: weighted composite with fail-safe overrides and an
//!   explainable factor breakdown
//!
//! The engine is decision support, not diagnosis: its failure mode is biased
//! toward over-escalation rather than under-escalation.

pub mod baseline;
pub mod config;
pub mod dissonance;
pub mod error;
pub mod lexicon;
pub mod pipeline;
pub mod risk;
pub mod sentiment;
pub mod types;

pub use baseline::{BaselineManager, IdempotencyKey};
pub use config::EngineConfig;
pub use dissonance::{DissonanceCalculator, VoiceValenceSignal};
pub use error::EngineError;
pub use lexicon::{LexiconSet, PhraseMatcher};
pub use pipeline::{SentinelProcessor, UtteranceRecord};
pub use risk::{RiskAggregator, RiskInput};
pub use sentiment::SentimentClassifier;
pub use types::{
    BaselineState, DeviationRecord, DeviationSeverity, DissonanceResult, EmotionCategory,
    EmotionObservation, FeatureType, Interpretation, MicroSignal, MicroSignals, RiskAssessment,
    RiskLevel, SentimentObservation, UserBaseline, Valence, VoiceFeatureVector,
};

/// Engine version embedded in assessment payloads
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name stamped into emitted reports
pub const PRODUCER_NAME: &str = "affect-sentinel";
