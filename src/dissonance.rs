//! Dissonance calculation
//!
//! Compares what was said (stated valence) against how it was said (vocal
//! valence plus acoustic micro-signals) and produces a gap score, a truth
//! resolution, and an interpretation. The rules here are deterministic and
//! reproduce the deployed scoring exactly.

use tracing::warn;

use crate::config::{DissonanceConfig, MicroSignalConfig};
use crate::types::{
    DissonanceResult, Interpretation, MicroSignal, MicroSignals, SentimentObservation, Valence,
    VoiceFeatureVector,
};

/// Vocal valence + confidence supplied by the external emotion collaborator
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoiceValenceSignal {
    pub valence: Valence,
    pub confidence: f64,
}

/// Dissonance calculator configured with named thresholds
#[derive(Debug, Clone)]
pub struct DissonanceCalculator {
    micro_config: MicroSignalConfig,
    config: DissonanceConfig,
}

impl DissonanceCalculator {
    pub fn new(micro_config: MicroSignalConfig, config: DissonanceConfig) -> Self {
        Self {
            micro_config,
            config,
        }
    }

    /// Assess dissonance for one utterance.
    ///
    /// A missing stated or voice signal is substituted with neutral at
    /// confidence 0 and the result is marked low-confidence; computation is
    /// never aborted on partial input.
    pub fn assess(
        &self,
        stated: Option<SentimentObservation>,
        voice: Option<VoiceValenceSignal>,
        features: &VoiceFeatureVector,
    ) -> DissonanceResult {
        let low_confidence = stated.is_none() || voice.is_none();
        if low_confidence {
            warn!(
                stated_missing = stated.is_none(),
                voice_missing = voice.is_none(),
                "dissonance input missing, substituting neutral at confidence 0"
            );
        }

        let stated = stated.unwrap_or(SentimentObservation {
            valence: Valence::Neutral,
            confidence: 0.0,
        });
        let voice = voice.unwrap_or(VoiceValenceSignal {
            valence: Valence::Neutral,
            confidence: 0.0,
        });

        let micro_signals = detect_micro_signals(features, &self.micro_config);
        let gap_score = compute_gap_score(
            stated.valence,
            voice.valence,
            micro_signals.count(),
            &self.config,
        );
        let (truth_valence, truth_confidence) =
            resolve_truth(gap_score, voice.valence, micro_signals.count(), &self.config);
        let interpretation = interpret(gap_score, stated.valence, voice.valence, &self.config);

        DissonanceResult {
            stated_valence: stated.valence,
            stated_confidence: stated.confidence,
            voice_valence: voice.valence,
            voice_confidence: voice.confidence,
            gap_score,
            interpretation,
            truth_valence,
            truth_confidence,
            micro_signals,
            low_confidence,
        }
    }
}

/// Detect acoustic micro-signals in a feature vector.
///
/// Each signal is an independent threshold check; the thresholds are named
/// configuration, not literals.
pub fn detect_micro_signals(
    features: &VoiceFeatureVector,
    config: &MicroSignalConfig,
) -> MicroSignals {
    let mut signals = MicroSignals::new();

    if features.pitch_std_hz > config.tremor_pitch_std_hz {
        signals.insert(MicroSignal::Tremor);
    }
    if features.pitch_range_hz > config.voice_crack_pitch_range_hz {
        signals.insert(MicroSignal::VoiceCrack);
    }
    if features.pitch_std_hz < config.flat_prosody_pitch_std_hz {
        signals.insert(MicroSignal::FlatProsody);
    }
    if features.energy_std > config.sigh_energy_std {
        signals.insert(MicroSignal::Sigh);
    }
    if features.pause_ratio > config.hesitation_pause_ratio {
        signals.insert(MicroSignal::Hesitation);
    }
    if features.zero_crossing_rate > config.harsh_voice_zcr {
        signals.insert(MicroSignal::HarshVoice);
    }

    signals
}

/// Compute the stated/voice gap score.
///
/// Base: 0 for matching valence, `gap_opposite_polarity` for opposite
/// polarity, `gap_one_neutral` when exactly one side is neutral. Micro-signal
/// evidence adds `gap_per_micro_signal` each, capped. A positive statement
/// carrying at least `concealment_min_micro_signals` is floored at
/// `concealment_gap_floor`: concealment cannot score low.
pub fn compute_gap_score(
    stated: Valence,
    voice: Valence,
    micro_signal_count: usize,
    config: &DissonanceConfig,
) -> f64 {
    let base = if stated == voice {
        0.0
    } else if stated.is_opposite(voice) {
        config.gap_opposite_polarity
    } else {
        config.gap_one_neutral
    };

    let micro_bonus = (config.gap_per_micro_signal * micro_signal_count as f64)
        .min(config.gap_micro_signal_cap);
    let mut gap = base + micro_bonus;

    if stated == Valence::Positive && micro_signal_count >= config.concealment_min_micro_signals {
        gap = gap.max(config.concealment_gap_floor);
    }

    gap.clamp(0.0, 1.0)
}

/// Resolve which signal to trust.
///
/// The voice is always trusted; the gap band sets the confidence, and in the
/// high band each micro-signal adds corroborating confidence up to a cap.
pub fn resolve_truth(
    gap_score: f64,
    voice: Valence,
    micro_signal_count: usize,
    config: &DissonanceConfig,
) -> (Valence, f64) {
    let confidence = if gap_score < config.congruent_gap_threshold {
        config.truth_confidence_congruent
    } else if gap_score < config.high_gap_threshold {
        config.truth_confidence_moderate
    } else {
        (config.truth_confidence_high_base
            + config.truth_confidence_per_micro_signal * micro_signal_count as f64)
            .min(config.truth_confidence_cap)
    };

    (voice, confidence)
}

/// Interpretation rule table, evaluated in order.
///
/// A neutral/negative pairing in either direction reads as minimization:
/// words downplaying a negative voice, or negative words the voice does not
/// yet carry.
pub fn interpret(
    gap_score: f64,
    stated: Valence,
    voice: Valence,
    config: &DissonanceConfig,
) -> Interpretation {
    if gap_score < config.congruent_gap_threshold {
        return Interpretation::Congruent;
    }
    match (stated, voice) {
        (Valence::Positive, Valence::Negative) => Interpretation::DefensiveConcealment,
        (Valence::Negative, Valence::Positive) => Interpretation::Exaggeration,
        (Valence::Neutral, Valence::Negative) | (Valence::Negative, Valence::Neutral) => {
            Interpretation::Minimization
        }
        _ => Interpretation::MixedSignals,
    }
}
