//! Engine configuration
//!
//! Every numeric threshold and weight used by the scoring components lives
//! here as a named, documented field. The defaults below mirror the tuning
//! the engine shipped with; they were chosen empirically without a labeled
//! validation dataset and should be recalibrated against real outcome data
//! before being treated as ground truth.

use serde::{Deserialize, Serialize};

/// Top-level configuration injected into the engine at construction
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub micro_signals: MicroSignalConfig,
    pub dissonance: DissonanceConfig,
    pub baseline: BaselineConfig,
    pub risk: RiskConfig,
    pub sentiment: SentimentConfig,
}

/// Detection thresholds for acoustic micro-signals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MicroSignalConfig {
    /// Pitch std above this indicates tremor (Hz)
    pub tremor_pitch_std_hz: f64,
    /// Pitch range above this indicates voice crack (Hz)
    pub voice_crack_pitch_range_hz: f64,
    /// Pitch std below this indicates flat prosody (Hz)
    pub flat_prosody_pitch_std_hz: f64,
    /// Energy std above this indicates sighing
    pub sigh_energy_std: f64,
    /// Pause ratio above this indicates hesitation
    pub hesitation_pause_ratio: f64,
    /// Zero-crossing rate above this indicates harsh voice
    pub harsh_voice_zcr: f64,
}

impl Default for MicroSignalConfig {
    fn default() -> Self {
        Self {
            tremor_pitch_std_hz: 50.0,
            voice_crack_pitch_range_hz: 200.0,
            flat_prosody_pitch_std_hz: 10.0,
            sigh_energy_std: 0.15,
            hesitation_pause_ratio: 0.3,
            harsh_voice_zcr: 0.15,
        }
    }
}

/// Gap scoring, truth resolution, and interpretation thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DissonanceConfig {
    /// Base gap when stated and voice valence are opposite polarity
    pub gap_opposite_polarity: f64,
    /// Base gap when exactly one side is neutral
    pub gap_one_neutral: f64,
    /// Gap added per detected micro-signal
    pub gap_per_micro_signal: f64,
    /// Cap on the total micro-signal gap contribution
    pub gap_micro_signal_cap: f64,
    /// Minimum micro-signal count for the concealment floor to apply
    pub concealment_min_micro_signals: usize,
    /// Gap floor when a positive statement carries enough micro-signals
    pub concealment_gap_floor: f64,
    /// Below this gap the signals are read as congruent
    pub congruent_gap_threshold: f64,
    /// Gap at or above this is treated as high dissonance
    pub high_gap_threshold: f64,
    /// Truth confidence when the gap is below the congruent threshold
    pub truth_confidence_congruent: f64,
    /// Truth confidence in the moderate gap band
    pub truth_confidence_moderate: f64,
    /// Base truth confidence in the high gap band
    pub truth_confidence_high_base: f64,
    /// Truth confidence added per micro-signal in the high gap band
    pub truth_confidence_per_micro_signal: f64,
    /// Ceiling on truth confidence in the high gap band
    pub truth_confidence_cap: f64,
}

impl Default for DissonanceConfig {
    fn default() -> Self {
        Self {
            gap_opposite_polarity: 0.8,
            gap_one_neutral: 0.4,
            gap_per_micro_signal: 0.1,
            gap_micro_signal_cap: 0.3,
            concealment_min_micro_signals: 2,
            concealment_gap_floor: 0.7,
            congruent_gap_threshold: 0.3,
            high_gap_threshold: 0.6,
            truth_confidence_congruent: 0.9,
            truth_confidence_moderate: 0.75,
            truth_confidence_high_base: 0.6,
            truth_confidence_per_micro_signal: 0.1,
            truth_confidence_cap: 0.95,
        }
    }
}

/// Baseline retention and deviation scoring parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaselineConfig {
    /// Samples below this count leave the baseline unestablished
    pub min_samples: u32,
    /// Rolling retention window in days
    pub window_days: i64,
    /// Divisor applied to the raw sigma distance before clamping to 0-1
    pub deviation_normalizer: f64,
    /// Deviation score below this maps to low severity
    pub severity_low_max: f64,
    /// Deviation score above this maps to high severity
    pub severity_medium_max: f64,
}

impl Default for BaselineConfig {
    fn default() -> Self {
        Self {
            min_samples: 10,
            window_days: 30,
            deviation_normalizer: 2.0,
            severity_low_max: 0.3,
            severity_medium_max: 0.6,
        }
    }
}

/// Composite weighting, emotion mapping, and risk level thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    /// Weight on the crisis-keyword sub-score (1.5x the others by default)
    pub keyword_weight: f64,
    /// Weight on the dissonance sub-score
    pub dissonance_weight: f64,
    /// Weight on the emotion sub-score
    pub emotion_weight: f64,
    /// Weight on the baseline-deviation sub-score
    pub deviation_weight: f64,
    /// Gap multiplier for concealment / mixed-signal interpretations
    pub dissonance_amplification: f64,
    /// Ceiling on the dissonance sub-score when signals are congruent
    pub congruent_contribution_cap: f64,
    /// Gap at or above this arms the post-decision calm override
    pub calm_gap_threshold: f64,
    /// Base risk per emotion category, scaled by confidence
    pub emotion_base_risk: EmotionRiskMap,
    /// Composite below this is low risk
    pub level_medium_threshold: f64,
    /// Composite at or above this is high risk
    pub level_high_threshold: f64,
    /// Composite at or above this is critical risk
    pub level_critical_threshold: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            keyword_weight: 1.5,
            dissonance_weight: 1.0,
            emotion_weight: 1.0,
            deviation_weight: 1.0,
            dissonance_amplification: 1.25,
            congruent_contribution_cap: 0.1,
            calm_gap_threshold: 0.6,
            emotion_base_risk: EmotionRiskMap::default(),
            level_medium_threshold: 0.4,
            level_high_threshold: 0.6,
            level_critical_threshold: 0.8,
        }
    }
}

/// Fixed base risk values per emotion category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmotionRiskMap {
    pub happy: f64,
    pub neutral: f64,
    pub sad: f64,
    pub angry: f64,
    pub fear: f64,
    pub disgust: f64,
    pub surprise: f64,
}

impl Default for EmotionRiskMap {
    fn default() -> Self {
        Self {
            happy: 0.0,
            neutral: 0.1,
            sad: 0.6,
            angry: 0.6,
            fear: 0.7,
            disgust: 0.5,
            surprise: 0.3,
        }
    }
}

impl EmotionRiskMap {
    pub fn base_risk(&self, category: crate::types::EmotionCategory) -> f64 {
        use crate::types::EmotionCategory::*;
        match category {
            Happy => self.happy,
            Neutral => self.neutral,
            Sad => self.sad,
            Angry => self.angry,
            Fear => self.fear,
            Disgust => self.disgust,
            Surprise => self.surprise,
        }
    }
}

/// Stated-valence classification confidences and cache sizing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SentimentConfig {
    /// Confidence assigned when a deflection phrase forces positive valence
    pub deflection_confidence: f64,
    /// Confidence assigned on an explicit positive or negative phrase match
    pub explicit_confidence: f64,
    /// Confidence assigned when no phrase table matches
    pub default_confidence: f64,
    /// Capacity of the memoization cache for classified transcripts
    pub cache_capacity: usize,
}

impl Default for SentimentConfig {
    fn default() -> Self {
        Self {
            deflection_confidence: 0.6,
            explicit_confidence: 0.8,
            default_confidence: 0.5,
            cache_capacity: 1000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_tuning() {
        let config = EngineConfig::default();

        assert_eq!(config.baseline.min_samples, 10);
        assert_eq!(config.baseline.window_days, 30);
        assert!((config.risk.keyword_weight - 1.5).abs() < f64::EPSILON);
        assert!((config.dissonance.concealment_gap_floor - 0.7).abs() < f64::EPSILON);
        assert!((config.micro_signals.tremor_pitch_std_hz - 50.0).abs() < f64::EPSILON);
        assert_eq!(config.sentiment.cache_capacity, 1000);
    }

    #[test]
    fn test_partial_config_deserialization() {
        // Deployments override individual fields; the rest fall back to defaults
        let json = r#"{"baseline": {"min_samples": 5}, "risk": {"keyword_weight": 2.0}}"#;
        let config: EngineConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.baseline.min_samples, 5);
        assert!((config.risk.keyword_weight - 2.0).abs() < f64::EPSILON);
        assert_eq!(config.baseline.window_days, 30);
        assert!((config.risk.dissonance_weight - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_emotion_risk_ordering() {
        let map = EmotionRiskMap::default();
        use crate::types::EmotionCategory::*;

        assert!(map.base_risk(Fear) > map.base_risk(Sad));
        assert!(map.base_risk(Sad) > map.base_risk(Neutral));
        assert!(map.base_risk(Neutral) > map.base_risk(Happy));
    }
}
