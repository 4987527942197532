//! Core types for the assessment engine
//!
//! This module defines the data structures that flow through each stage of the
//! pipeline: voice features, upstream observations, dissonance results,
//! baseline state, deviation records, and the final risk assessment.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Coarse emotional polarity of a signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Valence {
    Positive,
    Neutral,
    Negative,
}

impl Valence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Valence::Positive => "positive",
            Valence::Neutral => "neutral",
            Valence::Negative => "negative",
        }
    }

    /// True if the two valences sit at opposite ends of the polarity axis
    pub fn is_opposite(&self, other: Valence) -> bool {
        matches!(
            (self, other),
            (Valence::Positive, Valence::Negative) | (Valence::Negative, Valence::Positive)
        )
    }
}

/// Emotion category reported by the external voice/emotion collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmotionCategory {
    Happy,
    Neutral,
    Sad,
    Angry,
    Fear,
    Disgust,
    Surprise,
}

impl EmotionCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmotionCategory::Happy => "happy",
            EmotionCategory::Neutral => "neutral",
            EmotionCategory::Sad => "sad",
            EmotionCategory::Angry => "angry",
            EmotionCategory::Fear => "fear",
            EmotionCategory::Disgust => "disgust",
            EmotionCategory::Surprise => "surprise",
        }
    }
}

/// Acoustic features extracted from one utterance by an external collaborator.
///
/// All values must be finite; the engine rejects NaN/infinite vectors before
/// scoring.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VoiceFeatureVector {
    /// Mean fundamental frequency (Hz)
    pub pitch_mean_hz: f64,
    /// Standard deviation of pitch across the utterance (Hz)
    pub pitch_std_hz: f64,
    /// Pitch range, max minus min (Hz)
    pub pitch_range_hz: f64,
    /// Mean RMS energy (normalized)
    pub energy_mean: f64,
    /// Standard deviation of RMS energy
    pub energy_std: f64,
    /// Speech rate (syllables per second)
    pub speech_rate_sps: f64,
    /// Fraction of the utterance spent in pauses (0-1)
    pub pause_ratio: f64,
    /// Zero-crossing rate (normalized)
    pub zero_crossing_rate: f64,
}

impl VoiceFeatureVector {
    /// Check that every field holds a finite value
    pub fn is_finite(&self) -> bool {
        [
            self.pitch_mean_hz,
            self.pitch_std_hz,
            self.pitch_range_hz,
            self.energy_mean,
            self.energy_std,
            self.speech_rate_sps,
            self.pause_ratio,
            self.zero_crossing_rate,
        ]
        .iter()
        .all(|v| v.is_finite())
    }

    /// Value of the feature used for baseline tracking
    pub fn value_for(&self, feature: FeatureType) -> f64 {
        match feature {
            FeatureType::PitchMean => self.pitch_mean_hz,
            FeatureType::PitchStd => self.pitch_std_hz,
            FeatureType::EnergyMean => self.energy_mean,
            FeatureType::EnergyStd => self.energy_std,
            FeatureType::SpeechRate => self.speech_rate_sps,
            FeatureType::PauseRatio => self.pause_ratio,
        }
    }
}

/// Stated sentiment derived from transcript text
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SentimentObservation {
    pub valence: Valence,
    /// Classifier confidence (0-1)
    pub confidence: f64,
}

/// Vocal emotion reported by the external voice/emotion collaborator
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EmotionObservation {
    pub category: EmotionCategory,
    /// Classifier confidence (0-1)
    pub confidence: f64,
}

/// Low-level acoustic indicator used as corroborating evidence for dissonance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MicroSignal {
    Tremor,
    VoiceCrack,
    FlatProsody,
    Sigh,
    Hesitation,
    HarshVoice,
}

impl MicroSignal {
    pub fn as_str(&self) -> &'static str {
        match self {
            MicroSignal::Tremor => "tremor",
            MicroSignal::VoiceCrack => "voice_crack",
            MicroSignal::FlatProsody => "flat_prosody",
            MicroSignal::Sigh => "sigh",
            MicroSignal::Hesitation => "hesitation",
            MicroSignal::HarshVoice => "harsh_voice",
        }
    }
}

/// Set of micro-signals detected in one utterance
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MicroSignals {
    signals: Vec<MicroSignal>,
}

impl MicroSignals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, signal: MicroSignal) {
        if !self.signals.contains(&signal) {
            self.signals.push(signal);
        }
    }

    pub fn contains(&self, signal: MicroSignal) -> bool {
        self.signals.contains(&signal)
    }

    pub fn count(&self) -> usize {
        self.signals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MicroSignal> {
        self.signals.iter()
    }
}

impl FromIterator<MicroSignal> for MicroSignals {
    fn from_iter<T: IntoIterator<Item = MicroSignal>>(iter: T) -> Self {
        let mut set = MicroSignals::new();
        for s in iter {
            set.insert(s);
        }
        set
    }
}

/// How a stated/voice mismatch is read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interpretation {
    Congruent,
    DefensiveConcealment,
    Exaggeration,
    Minimization,
    MixedSignals,
}

impl Interpretation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Interpretation::Congruent => "congruent",
            Interpretation::DefensiveConcealment => "defensive_concealment",
            Interpretation::Exaggeration => "exaggeration",
            Interpretation::Minimization => "minimization",
            Interpretation::MixedSignals => "mixed_signals",
        }
    }
}

/// Per-utterance dissonance assessment.
///
/// Immutable once produced; the caller owns it and may append it to history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DissonanceResult {
    /// Valence stated in the transcript
    pub stated_valence: Valence,
    /// Confidence of the stated-valence classification (0-1)
    pub stated_confidence: f64,
    /// Valence carried by the voice
    pub voice_valence: Valence,
    /// Confidence of the vocal-valence signal (0-1)
    pub voice_confidence: f64,
    /// Mismatch between stated and vocal valence (0-1)
    pub gap_score: f64,
    /// Reading of the mismatch
    pub interpretation: Interpretation,
    /// Which valence the engine trusts
    pub truth_valence: Valence,
    /// Confidence in the truth resolution (0-1)
    pub truth_confidence: f64,
    /// Micro-signals detected in the feature vector
    pub micro_signals: MicroSignals,
    /// True when an upstream signal was missing and a neutral substitute was
    /// used
    pub low_confidence: bool,
}

/// Feature types tracked against per-user baselines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureType {
    PitchMean,
    PitchStd,
    EnergyMean,
    EnergyStd,
    SpeechRate,
    PauseRatio,
}

impl FeatureType {
    pub const ALL: [FeatureType; 6] = [
        FeatureType::PitchMean,
        FeatureType::PitchStd,
        FeatureType::EnergyMean,
        FeatureType::EnergyStd,
        FeatureType::SpeechRate,
        FeatureType::PauseRatio,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureType::PitchMean => "pitch_mean",
            FeatureType::PitchStd => "pitch_std",
            FeatureType::EnergyMean => "energy_mean",
            FeatureType::EnergyStd => "energy_std",
            FeatureType::SpeechRate => "speech_rate",
            FeatureType::PauseRatio => "pause_ratio",
        }
    }
}

/// Established per-user statistical norm for one feature type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserBaseline {
    pub user_id: String,
    pub feature_type: FeatureType,
    /// Rolling mean over the retention window
    pub mean: f64,
    /// Rolling standard deviation over the retention window
    pub std: f64,
    /// Number of samples currently inside the window
    pub sample_count: u32,
    /// When the baseline first crossed the minimum sample threshold
    pub established_at: DateTime<Utc>,
    /// When the baseline last absorbed a sample
    pub updated_at: DateTime<Utc>,
}

/// Baseline query result.
///
/// `Insufficient` is a sentinel state, not an error: accumulation continues
/// below the minimum sample count, but the baseline is not queryable for
/// deviation until it is established.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum BaselineState {
    Established(UserBaseline),
    Insufficient { sample_count: u32 },
}

impl BaselineState {
    pub fn is_established(&self) -> bool {
        matches!(self, BaselineState::Established(_))
    }

    pub fn sample_count(&self) -> u32 {
        match self {
            BaselineState::Established(b) => b.sample_count,
            BaselineState::Insufficient { sample_count } => *sample_count,
        }
    }
}

/// Severity of a deviation from baseline
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviationSeverity {
    Unknown,
    Low,
    Medium,
    High,
}

impl DeviationSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviationSeverity::Unknown => "unknown",
            DeviationSeverity::Low => "low",
            DeviationSeverity::Medium => "medium",
            DeviationSeverity::High => "high",
        }
    }
}

/// Normalized distance of one observation from a user's baseline.
///
/// Created once per feature per session; never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviationRecord {
    pub user_id: String,
    pub session_id: String,
    pub feature_type: FeatureType,
    /// Baseline mean at detection time, if established
    pub baseline_value: Option<f64>,
    pub current_value: f64,
    /// Normalized deviation (0-1)
    pub deviation_score: f64,
    pub severity: DeviationSeverity,
    pub detected_at: DateTime<Utc>,
}

/// Assessed risk level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }
}

/// One named signal's contribution to the composite score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContributingFactor {
    /// Signal name ("keyword", "dissonance", "emotion", "baseline_deviation")
    pub name: String,
    /// Sub-score in 0-1
    pub sub_score: f64,
    /// Weight applied to the sub-score
    pub weight: f64,
    /// Weighted contribution (sub_score x weight)
    pub weighted: f64,
    /// False when the upstream signal was missing and the factor was
    /// zero-weighted, recorded for transparency
    pub available: bool,
}

/// Final per-utterance risk classification with escalation decision.
///
/// Immutable once produced; only appended to history by an external store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub assessment_id: uuid::Uuid,
    pub user_id: String,
    pub session_id: String,
    /// Weighted composite of all available sub-scores (0-1)
    pub composite_score: f64,
    pub risk_level: RiskLevel,
    pub escalation_required: bool,
    /// Sorted by weighted contribution, descending
    pub contributing_factors: Vec<ContributingFactor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dissonance: Option<DissonanceResult>,
    /// Names of fail-safe overrides that fired
    #[serde(default)]
    pub overrides_applied: Vec<String>,
    pub assessed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valence_opposites() {
        assert!(Valence::Positive.is_opposite(Valence::Negative));
        assert!(Valence::Negative.is_opposite(Valence::Positive));
        assert!(!Valence::Neutral.is_opposite(Valence::Negative));
        assert!(!Valence::Positive.is_opposite(Valence::Positive));
    }

    #[test]
    fn test_micro_signals_dedup() {
        let mut signals = MicroSignals::new();
        signals.insert(MicroSignal::Tremor);
        signals.insert(MicroSignal::Tremor);
        signals.insert(MicroSignal::Sigh);

        assert_eq!(signals.count(), 2);
        assert!(signals.contains(MicroSignal::Tremor));
        assert!(!signals.contains(MicroSignal::Hesitation));
    }

    #[test]
    fn test_feature_vector_finiteness() {
        let mut features = VoiceFeatureVector {
            pitch_mean_hz: 200.0,
            pitch_std_hz: 25.0,
            pitch_range_hz: 120.0,
            energy_mean: 0.5,
            energy_std: 0.1,
            speech_rate_sps: 4.0,
            pause_ratio: 0.2,
            zero_crossing_rate: 0.08,
        };
        assert!(features.is_finite());

        features.pitch_std_hz = f64::NAN;
        assert!(!features.is_finite());
    }

    #[test]
    fn test_severity_ordering() {
        assert!(DeviationSeverity::High > DeviationSeverity::Medium);
        assert!(DeviationSeverity::Medium > DeviationSeverity::Low);
        assert!(DeviationSeverity::Low > DeviationSeverity::Unknown);
    }

    #[test]
    fn test_risk_level_ordering() {
        assert!(RiskLevel::Critical > RiskLevel::High);
        assert!(RiskLevel::High > RiskLevel::Medium);
        assert!(RiskLevel::Medium > RiskLevel::Low);
    }

    #[test]
    fn test_baseline_state_serde_roundtrip() {
        let state = BaselineState::Insufficient { sample_count: 3 };
        let json = serde_json::to_string(&state).unwrap();
        let loaded: BaselineState = serde_json::from_str(&json).unwrap();
        assert_eq!(state, loaded);
        assert!(!loaded.is_established());
        assert_eq!(loaded.sample_count(), 3);
    }
}
