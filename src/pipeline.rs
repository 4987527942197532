//! Pipeline orchestration
//!
//! This module provides the public API of the engine. One utterance flows
//! through sentiment classification, dissonance calculation, baseline
//! deviation scoring, and risk aggregation in a single synchronous pass.
//! Baseline updates are folded in out-of-band after a session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info_span;

use crate::baseline::{BaselineManager, IdempotencyKey};
use crate::config::EngineConfig;
use crate::dissonance::{DissonanceCalculator, VoiceValenceSignal};
use crate::error::EngineError;
use crate::lexicon::LexiconSet;
use crate::risk::{RiskAggregator, RiskInput};
use crate::sentiment::SentimentClassifier;
use crate::types::{
    BaselineState, DeviationRecord, DissonanceResult, EmotionObservation, FeatureType,
    RiskAssessment, Valence, VoiceFeatureVector,
};

/// One utterance with all upstream signals the caller collected.
///
/// `voice_valence`/`voice_confidence` and `emotion` are optional: an upstream
/// failure is represented by their absence and degrades the assessment
/// instead of failing it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UtteranceRecord {
    pub user_id: String,
    pub session_id: String,
    pub transcript: String,
    pub voice_features: VoiceFeatureVector,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice_valence: Option<Valence>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice_confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emotion: Option<EmotionObservation>,
}

/// Stateful processor composing the four engine components.
///
/// The assessment path is pure computation; only the baseline manager holds
/// shared mutable state, and it serializes its own updates. One processor can
/// therefore be shared across threads and sessions.
pub struct SentinelProcessor {
    dissonance: DissonanceCalculator,
    classifier: SentimentClassifier,
    baselines: BaselineManager,
    aggregator: RiskAggregator,
}

impl Default for SentinelProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl SentinelProcessor {
    /// Create a processor with default configuration and English lexicon
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default(), LexiconSet::english())
    }

    /// Create a processor with explicit configuration and phrase tables
    pub fn with_config(config: EngineConfig, lexicon: LexiconSet) -> Self {
        let classifier = SentimentClassifier::new(config.sentiment.clone(), lexicon.clone());
        let dissonance =
            DissonanceCalculator::new(config.micro_signals.clone(), config.dissonance.clone());
        let baselines = BaselineManager::new(config.baseline.clone());
        let aggregator = RiskAggregator::new(config.risk.clone(), lexicon.crisis, lexicon.finality);
        Self {
            dissonance,
            classifier,
            baselines,
            aggregator,
        }
    }

    /// Assess stated/voice dissonance for one utterance.
    ///
    /// The voice valence pair is optional; a missing signal degrades to a
    /// low-confidence result rather than an error.
    pub fn assess_dissonance(
        &self,
        transcript: &str,
        voice_valence: Option<Valence>,
        voice_confidence: Option<f64>,
        voice_features: &VoiceFeatureVector,
    ) -> Result<DissonanceResult, EngineError> {
        validate_transcript(transcript)?;
        validate_features(voice_features)?;

        let stated = Some(self.classifier.classify(transcript));
        let voice = voice_signal(voice_valence, voice_confidence);
        Ok(self.dissonance.assess(stated, voice, voice_features))
    }

    /// Run the full assessment pipeline for one utterance.
    ///
    /// Stages: validate -> stated sentiment -> dissonance -> per-feature
    /// baseline deviations -> risk aggregation. The whole pass runs inside a
    /// span carrying the user/session identity, so every degraded-input and
    /// override log line downstream is attributable.
    pub fn assess_utterance(
        &self,
        record: &UtteranceRecord,
    ) -> Result<RiskAssessment, EngineError> {
        let span = info_span!(
            "assess_utterance",
            user_id = %record.user_id,
            session_id = %record.session_id
        );
        let _guard = span.enter();

        validate_transcript(&record.transcript)?;
        validate_features(&record.voice_features)?;

        let stated = Some(self.classifier.classify(&record.transcript));
        let voice = voice_signal(record.voice_valence, record.voice_confidence);
        let dissonance = self.dissonance.assess(stated, voice, &record.voice_features);

        let deviations = self.session_deviations(
            &record.user_id,
            &record.session_id,
            &record.voice_features,
        );

        Ok(self.aggregator.assess(RiskInput {
            transcript: &record.transcript,
            dissonance: Some(&dissonance),
            emotion: record.emotion,
            deviations: &deviations,
            user_id: &record.user_id,
            session_id: &record.session_id,
        }))
    }

    /// Deviation records for every tracked feature of one utterance
    pub fn session_deviations(
        &self,
        user_id: &str,
        session_id: &str,
        features: &VoiceFeatureVector,
    ) -> Vec<DeviationRecord> {
        FeatureType::ALL
            .iter()
            .map(|&feature| {
                self.baselines
                    .deviation(user_id, session_id, feature, features.value_for(feature))
            })
            .collect()
    }

    /// Fold one utterance's features into the user's rolling baselines.
    ///
    /// `sample_sequence` identifies the utterance within the session; replays
    /// with the same `(session_id, sample_sequence)` never double-count.
    pub fn fold_session_features(
        &self,
        user_id: &str,
        session_id: &str,
        features: &VoiceFeatureVector,
        observed_at: DateTime<Utc>,
        sample_sequence: u32,
    ) -> Result<(), EngineError> {
        validate_features(features)?;
        for &feature in FeatureType::ALL.iter() {
            self.baselines.update(
                user_id,
                feature,
                features.value_for(feature),
                observed_at,
                IdempotencyKey::new(session_id, sample_sequence),
            )?;
        }
        Ok(())
    }

    /// Incorporate a single baseline sample (external collaborator surface)
    pub fn update_baseline(
        &self,
        user_id: &str,
        feature_type: FeatureType,
        value: f64,
        observed_at: DateTime<Utc>,
        key: IdempotencyKey,
    ) -> Result<BaselineState, EngineError> {
        self.baselines
            .update(user_id, feature_type, value, observed_at, key)
    }

    /// Current baseline for a user/feature, or the insufficient-data sentinel
    pub fn get_baseline(&self, user_id: &str, feature_type: FeatureType) -> BaselineState {
        self.baselines.get_baseline(user_id, feature_type)
    }

    /// Score one observation against the user's baseline
    pub fn get_deviation(
        &self,
        user_id: &str,
        session_id: &str,
        feature_type: FeatureType,
        current_value: f64,
    ) -> DeviationRecord {
        self.baselines
            .deviation(user_id, session_id, feature_type, current_value)
    }

    /// Save baseline state for the persistence collaborator
    pub fn save_baselines(&self) -> Result<String, EngineError> {
        self.baselines.to_json()
    }

    /// Restore baseline state from a saved snapshot
    pub fn load_baselines(&self, json: &str) -> Result<(), EngineError> {
        self.baselines.load_json(json)
    }
}

fn voice_signal(
    valence: Option<Valence>,
    confidence: Option<f64>,
) -> Option<VoiceValenceSignal> {
    match (valence, confidence) {
        (Some(valence), Some(confidence)) => Some(VoiceValenceSignal {
            valence,
            confidence,
        }),
        _ => None,
    }
}

fn validate_transcript(transcript: &str) -> Result<(), EngineError> {
    if transcript.trim().is_empty() {
        return Err(EngineError::InvalidInput("empty transcript".to_string()));
    }
    Ok(())
}

fn validate_features(features: &VoiceFeatureVector) -> Result<(), EngineError> {
    if !features.is_finite() {
        return Err(EngineError::InvalidInput(
            "voice feature vector contains non-finite values".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EmotionCategory, Interpretation, RiskLevel};
    use pretty_assertions::assert_eq;

    fn quiet_features() -> VoiceFeatureVector {
        VoiceFeatureVector {
            pitch_mean_hz: 180.0,
            pitch_std_hz: 25.0,
            pitch_range_hz: 100.0,
            energy_mean: 0.5,
            energy_std: 0.08,
            speech_rate_sps: 4.0,
            pause_ratio: 0.15,
            zero_crossing_rate: 0.08,
        }
    }

    fn distressed_features() -> VoiceFeatureVector {
        VoiceFeatureVector {
            pitch_std_hz: 55.0,     // tremor
            energy_std: 0.2,        // sigh
            pause_ratio: 0.4,       // hesitation
            ..quiet_features()
        }
    }

    fn make_record(transcript: &str, features: VoiceFeatureVector) -> UtteranceRecord {
        UtteranceRecord {
            user_id: "user-1".to_string(),
            session_id: "session-1".to_string(),
            transcript: transcript.to_string(),
            voice_features: features,
            voice_valence: Some(Valence::Negative),
            voice_confidence: Some(0.85),
            emotion: Some(EmotionObservation {
                category: EmotionCategory::Sad,
                confidence: 0.8,
            }),
        }
    }

    #[test]
    fn test_concealment_pipeline() {
        // "I'm fine" over a distressed voice with three micro-signals
        let processor = SentinelProcessor::new();
        let record = make_record("I'm fine", distressed_features());

        let assessment = processor.assess_utterance(&record).unwrap();

        let dissonance = assessment.dissonance.as_ref().unwrap();
        assert!(dissonance.gap_score >= 0.7);
        assert_eq!(dissonance.interpretation, Interpretation::DefensiveConcealment);
        assert_eq!(dissonance.truth_valence, Valence::Negative);
        assert!(dissonance.truth_confidence >= 0.85);
        assert_eq!(dissonance.micro_signals.count(), 3);
    }

    #[test]
    fn test_crisis_phrase_floors_risk() {
        let processor = SentinelProcessor::new();
        let mut record = make_record("I want to end it", quiet_features());
        record.voice_valence = None;
        record.voice_confidence = None;
        record.emotion = None;

        let assessment = processor.assess_utterance(&record).unwrap();
        assert!(assessment.risk_level >= RiskLevel::High);
        assert!(assessment.escalation_required);
    }

    #[test]
    fn test_degraded_dissonance_log_carries_identity() {
        use std::sync::{Arc, Mutex};
        use tracing_subscriber::fmt::MakeWriter;

        #[derive(Clone, Default)]
        struct Capture(Arc<Mutex<Vec<u8>>>);

        impl std::io::Write for Capture {
            fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
                self.0.lock().unwrap().extend_from_slice(buf);
                Ok(buf.len())
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        impl<'a> MakeWriter<'a> for Capture {
            type Writer = Capture;
            fn make_writer(&'a self) -> Capture {
                self.clone()
            }
        }

        let capture = Capture::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(capture.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::INFO)
            .finish();

        let processor = SentinelProcessor::new();
        let mut record = make_record("hello there", quiet_features());
        record.user_id = "user-7".to_string();
        record.session_id = "session-9".to_string();
        record.voice_valence = None;
        record.voice_confidence = None;

        tracing::subscriber::with_default(subscriber, || {
            processor.assess_utterance(&record).unwrap();
        });

        let logs = String::from_utf8(capture.0.lock().unwrap().clone()).unwrap();
        assert!(logs.contains("voice_missing=true"));
        assert!(logs.contains("user-7"));
        assert!(logs.contains("session-9"));
    }

    #[test]
    fn test_empty_transcript_rejected() {
        let processor = SentinelProcessor::new();
        let record = make_record("   ", quiet_features());

        assert!(processor.assess_utterance(&record).is_err());
    }

    #[test]
    fn test_non_finite_features_rejected() {
        let processor = SentinelProcessor::new();
        let mut features = quiet_features();
        features.energy_mean = f64::INFINITY;
        let record = make_record("hello there", features);

        assert!(processor.assess_utterance(&record).is_err());
    }

    #[test]
    fn test_assess_dissonance_operation() {
        let processor = SentinelProcessor::new();

        let result = processor
            .assess_dissonance(
                "I'm fine",
                Some(Valence::Negative),
                Some(0.85),
                &distressed_features(),
            )
            .unwrap();

        assert_eq!(result.stated_valence, Valence::Positive);
        assert!((result.stated_confidence - 0.6).abs() < 1e-9);
        assert!(!result.low_confidence);
    }

    #[test]
    fn test_missing_voice_signal_degrades() {
        let processor = SentinelProcessor::new();

        let result = processor
            .assess_dissonance("a quiet day", None, None, &quiet_features())
            .unwrap();

        assert!(result.low_confidence);
        assert_eq!(result.voice_valence, Valence::Neutral);
        assert_eq!(result.voice_confidence, 0.0);
    }

    #[test]
    fn test_baseline_fold_and_deviation() {
        let processor = SentinelProcessor::new();
        let now = Utc::now();

        // Twelve utterances of quiet speech establish the baseline
        for i in 0..12 {
            processor
                .fold_session_features("user-1", "session-1", &quiet_features(), now, i)
                .unwrap();
        }

        let state = processor.get_baseline("user-1", FeatureType::PitchMean);
        assert!(state.is_established());
        assert_eq!(state.sample_count(), 12);

        // Identical history means any shifted feature is maximally deviant
        let record = processor.get_deviation("user-1", "session-2", FeatureType::PitchMean, 260.0);
        assert_eq!(record.deviation_score, 1.0);
    }

    #[test]
    fn test_fold_is_idempotent_per_sequence() {
        let processor = SentinelProcessor::new();
        let now = Utc::now();

        processor
            .fold_session_features("user-1", "session-1", &quiet_features(), now, 0)
            .unwrap();
        processor
            .fold_session_features("user-1", "session-1", &quiet_features(), now, 0)
            .unwrap();

        let state = processor.get_baseline("user-1", FeatureType::EnergyMean);
        assert_eq!(state.sample_count(), 1);
    }

    #[test]
    fn test_baseline_snapshot_roundtrip() {
        let processor = SentinelProcessor::new();
        let now = Utc::now();
        for i in 0..12 {
            processor
                .fold_session_features("user-1", "session-1", &quiet_features(), now, i)
                .unwrap();
        }

        let snapshot = processor.save_baselines().unwrap();

        let restored = SentinelProcessor::new();
        restored.load_baselines(&snapshot).unwrap();

        let state = restored.get_baseline("user-1", FeatureType::PauseRatio);
        assert!(state.is_established());
        assert_eq!(state.sample_count(), 12);
    }

    #[test]
    fn test_established_deviation_feeds_risk() {
        let processor = SentinelProcessor::new();
        let now = Utc::now();
        for i in 0..12 {
            processor
                .fold_session_features("user-1", "session-1", &quiet_features(), now, i)
                .unwrap();
        }

        // Session 2 arrives with a sharply shifted voice
        let record = make_record("nothing much to say", distressed_features());
        let assessment = processor.assess_utterance(&record).unwrap();

        let deviation_factor = assessment
            .contributing_factors
            .iter()
            .find(|f| f.name == "baseline_deviation")
            .unwrap();
        assert!(deviation_factor.sub_score > 0.0);
    }

    #[test]
    fn test_utterance_record_serde() {
        let record = make_record("I'm fine", quiet_features());
        let json = serde_json::to_string(&record).unwrap();
        let loaded: UtteranceRecord = serde_json::from_str(&json).unwrap();

        assert_eq!(loaded.transcript, "I'm fine");
        assert_eq!(loaded.voice_valence, Some(Valence::Negative));
    }
}
